//! Derived table status (桌台状态推导)
//!
//! Nothing here is stored: status and views are recomputed from the draft,
//! kitchen tickets, bill and reservations every time they are asked for.

use chrono::NaiveDate;
use serde::Serialize;
use shared::models::{DiningTable, Reservation, ReservationStatus, TableStatus};
use shared::types::EntityId;

use crate::orders::money;
use crate::store::StoreState;

/// Draft, tickets or bill hold the table
pub(crate) fn is_occupied(state: &StoreState, table_id: &EntityId) -> bool {
    state.drafts.get(table_id).is_some_and(|d| !d.is_empty())
        || state.tickets_for(table_id).next().is_some()
        || state.bills.get(table_id).is_some_and(|b| !b.is_empty())
}

/// Confirmed reservations holding the table on `date`, by time
pub(crate) fn confirmed_reservations<'a>(
    state: &'a StoreState,
    table_id: &EntityId,
    date: NaiveDate,
) -> Vec<&'a Reservation> {
    let mut found: Vec<&Reservation> = state
        .reservations
        .values()
        .filter(|r| r.status == ReservationStatus::Confirmed && r.holds_table(table_id, date))
        .collect();
    found.sort_by(|a, b| a.time.cmp(&b.time));
    found
}

/// Occupied beats Reserved beats Free
pub(crate) fn derive_status(state: &StoreState, table: &DiningTable, date: NaiveDate) -> TableStatus {
    if is_occupied(state, &table.id) {
        TableStatus::Occupied
    } else if table.is_manually_reserved || !confirmed_reservations(state, &table.id, date).is_empty() {
        TableStatus::Reserved
    } else {
        TableStatus::Free
    }
}

/// Earliest ms timestamp the table has been in use since
pub(crate) fn occupied_since(state: &StoreState, table_id: &EntityId) -> Option<i64> {
    let draft_opened = state
        .drafts
        .get(table_id)
        .filter(|d| !d.is_empty())
        .and_then(|d| d.opened_at);
    let first_ticket = state
        .tickets_for(table_id)
        .map(|t| t.created_at.timestamp_millis())
        .min();
    match (draft_opened, first_ticket) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Table summary for floor views
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub table: DiningTable,
    pub status: TableStatus,
    /// Σ quantity of draft lines
    pub draft_items: i32,
    pub draft_total: f64,
    pub ticket_count: usize,
    pub bill_total: f64,
    pub bill_outstanding: f64,
    /// Unix millis
    pub occupied_since: Option<i64>,
    pub elapsed_minutes: Option<i64>,
    /// Next confirmed reservation for the table on the view date
    pub next_reservation: Option<Reservation>,
}

pub(crate) fn build_view(state: &StoreState, table: &DiningTable, date: NaiveDate, time: &str, now_ms: i64) -> TableView {
    let draft = state.drafts.get(&table.id);
    let bill = state.bills.get(&table.id);
    let since = occupied_since(state, &table.id);
    let next_reservation = confirmed_reservations(state, &table.id, date)
        .into_iter()
        .find(|r| r.time.as_str() >= time)
        .cloned();

    TableView {
        table: table.clone(),
        status: derive_status(state, table, date),
        draft_items: draft.map(|d| d.items.iter().map(|i| i.quantity).sum()).unwrap_or(0),
        draft_total: draft
            .map(|d| money::to_f64(money::items_total(&d.items)))
            .unwrap_or(0.0),
        ticket_count: state.tickets_for(&table.id).count(),
        bill_total: bill.map(|b| money::to_f64(money::bill_total(b))).unwrap_or(0.0),
        bill_outstanding: bill
            .map(|b| money::to_f64(money::bill_outstanding(b)))
            .unwrap_or(0.0),
        occupied_since: since,
        elapsed_minutes: since.map(|s| shared::util::elapsed_minutes(s, now_ms)),
        next_reservation,
    }
}
