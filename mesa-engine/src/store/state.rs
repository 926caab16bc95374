//! In-memory entity cache

use mesa_client::Collection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared::message::EntityKind;
use shared::models::{DiningTable, EventBudget, EventMenu, Reservation, VenueInfo};
use shared::order::{Bill, ItemStatus, KitchenTicket, OrderDraft, OrderItem};
use shared::types::EntityId;
use std::collections::{BTreeMap, HashMap};

use super::ledger::Ledger;

/// Everything the terminal knows, guarded by one lock
#[derive(Debug, Default)]
pub struct StoreState {
    /// Floor layout in insertion order (terminal-local)
    pub tables: Vec<DiningTable>,
    /// Draft orders by table (terminal-local)
    pub drafts: HashMap<EntityId, OrderDraft>,
    /// Bills by table (terminal-local)
    pub bills: HashMap<EntityId, Bill>,
    pub tickets: BTreeMap<EntityId, KitchenTicket>,
    pub reservations: BTreeMap<EntityId, Reservation>,
    pub events: BTreeMap<EntityId, EventBudget>,
    pub menus: BTreeMap<EntityId, EventMenu>,
    pub venue: VenueInfo,
    pub ledger: Ledger,
}

impl StoreState {
    pub fn table(&self, id: &EntityId) -> Option<&DiningTable> {
        self.tables.iter().find(|t| &t.id == id)
    }

    pub fn table_mut(&mut self, id: &EntityId) -> Option<&mut DiningTable> {
        self.tables.iter_mut().find(|t| &t.id == id)
    }

    pub fn tickets_for<'a>(&'a self, table_id: &'a EntityId) -> impl Iterator<Item = &'a KitchenTicket> + 'a {
        self.tickets.values().filter(move |t| &t.table_id == table_id)
    }

    /// Put items back at the front of a table's draft as editable lines
    pub fn restore_to_draft(&mut self, table_id: &EntityId, items: &[OrderItem]) {
        let draft = self.drafts.entry(table_id.clone()).or_default();
        let restored = items.iter().cloned().map(|mut item| {
            item.item_status = ItemStatus::Draft;
            item
        });
        let mut merged: Vec<OrderItem> = restored.collect();
        merged.append(&mut draft.items);
        draft.items = merged;
        draft.version += 1;
        if draft.opened_at.is_none() {
            draft.opened_at = Some(shared::util::now_millis());
        }
    }
}

/// Entity that lives in a remote collection
pub(crate) trait Synced:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const COLLECTION: Collection;
    const KIND: EntityKind;
    /// Failed inserts stay in the ledger for retry
    const KEEP_FAILED_INSERT: bool = true;

    fn id(&self) -> &EntityId;
    fn slot(state: &StoreState) -> &BTreeMap<EntityId, Self>;
    fn slot_mut(state: &mut StoreState) -> &mut BTreeMap<EntityId, Self>;

    /// Undo the local half of an insert whose remote half failed
    fn revert_insert(state: &mut StoreState, entity: &Self) {
        Self::slot_mut(state).remove(entity.id());
    }

    /// Other entity touched by [`Synced::revert_insert`]
    fn revert_notice(_entity: &Self) -> Option<(EntityKind, EntityId)> {
        None
    }
}

impl Synced for Reservation {
    const COLLECTION: Collection = Collection::Reservations;
    const KIND: EntityKind = EntityKind::Reservation;

    fn id(&self) -> &EntityId {
        &self.id
    }
    fn slot(state: &StoreState) -> &BTreeMap<EntityId, Self> {
        &state.reservations
    }
    fn slot_mut(state: &mut StoreState) -> &mut BTreeMap<EntityId, Self> {
        &mut state.reservations
    }
}

impl Synced for EventBudget {
    const COLLECTION: Collection = Collection::Agenda;
    const KIND: EntityKind = EntityKind::EventBudget;

    fn id(&self) -> &EntityId {
        &self.id
    }
    fn slot(state: &StoreState) -> &BTreeMap<EntityId, Self> {
        &state.events
    }
    fn slot_mut(state: &mut StoreState) -> &mut BTreeMap<EntityId, Self> {
        &mut state.events
    }
}

impl Synced for EventMenu {
    const COLLECTION: Collection = Collection::EventMenus;
    const KIND: EntityKind = EntityKind::EventMenu;

    fn id(&self) -> &EntityId {
        &self.id
    }
    fn slot(state: &StoreState) -> &BTreeMap<EntityId, Self> {
        &state.menus
    }
    fn slot_mut(state: &mut StoreState) -> &mut BTreeMap<EntityId, Self> {
        &mut state.menus
    }
}

impl Synced for KitchenTicket {
    const COLLECTION: Collection = Collection::KitchenTickets;
    const KIND: EntityKind = EntityKind::KitchenTicket;
    // items go back to the draft instead
    const KEEP_FAILED_INSERT: bool = false;

    fn id(&self) -> &EntityId {
        &self.id
    }
    fn slot(state: &StoreState) -> &BTreeMap<EntityId, Self> {
        &state.tickets
    }
    fn slot_mut(state: &mut StoreState) -> &mut BTreeMap<EntityId, Self> {
        &mut state.tickets
    }

    fn revert_insert(state: &mut StoreState, ticket: &Self) {
        state.tickets.remove(&ticket.id);
        state.restore_to_draft(&ticket.table_id, &ticket.items);
    }

    fn revert_notice(ticket: &Self) -> Option<(EntityKind, EntityId)> {
        Some((EntityKind::Draft, ticket.table_id.clone()))
    }
}

// ========== Patch helpers ==========

/// Serialize an entity to its camelCase object form
pub(crate) fn to_object<T: Serialize>(entity: &T) -> Option<Map<String, Value>> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Overlay field-set patches onto an entity
///
/// A patch that would produce an invalid entity is skipped and logged.
pub(crate) fn overlay<'a, T, I>(entity: T, patches: I) -> T
where
    T: Serialize + DeserializeOwned,
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    let mut current = entity;
    for patch in patches {
        let Some(mut object) = to_object(&current) else {
            return current;
        };
        for (key, value) in patch {
            object.insert(key.clone(), value.clone());
        }
        match serde_json::from_value::<T>(Value::Object(object)) {
            Ok(next) => current = next,
            Err(e) => tracing::warn!(error = %e, "Skipping patch that does not fit entity"),
        }
    }
    current
}

/// Fields of `current` that differ from `sent` (ignoring server-owned ones)
pub(crate) fn diff_fields(sent: &Map<String, Value>, current: &Map<String, Value>) -> Map<String, Value> {
    current
        .iter()
        .filter(|(key, _)| key.as_str() != "id" && key.as_str() != "createdAt")
        .filter(|(key, value)| sent.get(*key) != Some(*value))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use shared::order::ProductRef;

    fn reservation() -> Reservation {
        Reservation {
            id: EntityId::from(1),
            customer_name: "Pilar".into(),
            phone: String::new(),
            people: 2,
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            time: "13:30".into(),
            table_id: None,
            notes: None,
            status: Default::default(),
            tags: Default::default(),
            created_at: None,
        }
    }

    #[test]
    fn test_overlay_applies_in_order() {
        let p1 = json!({ "people": 4 }).as_object().cloned().unwrap();
        let p2 = json!({ "people": 6, "time": "14:00" }).as_object().cloned().unwrap();
        let result = overlay(reservation(), [&p1, &p2]);
        assert_eq!(result.people, 6);
        assert_eq!(result.time, "14:00");
        assert_eq!(result.customer_name, "Pilar");
    }

    #[test]
    fn test_overlay_skips_invalid_patch() {
        let bad = json!({ "people": "muchos" }).as_object().cloned().unwrap();
        let result = overlay(reservation(), [&bad]);
        assert_eq!(result.people, 2);
    }

    #[test]
    fn test_diff_fields_ignores_server_fields() {
        let sent = to_object(&reservation()).unwrap();
        let mut edited = reservation();
        edited.people = 5;
        edited.id = EntityId::from(77);
        let diff = diff_fields(&sent, &to_object(&edited).unwrap());
        assert_eq!(diff.len(), 1);
        assert_eq!(diff["people"], 5);
    }

    #[test]
    fn test_restore_to_draft_prepends() {
        let mut state = StoreState::default();
        let table = EntityId::from(1);
        let product = ProductRef {
            id: EntityId::from(3),
            name: "Vermut".into(),
            price: 3.0,
        };
        let existing = OrderItem::from_product(&product, Default::default());
        state.drafts.entry(table.clone()).or_default().items.push(existing.clone());

        let mut sent = OrderItem::from_product(&product, Default::default());
        sent.item_status = ItemStatus::Sent;
        state.restore_to_draft(&table, std::slice::from_ref(&sent));

        let draft = &state.drafts[&table];
        assert_eq!(draft.items.len(), 2);
        assert_eq!(draft.items[0].unique_id, sent.unique_id);
        assert_eq!(draft.items[0].item_status, ItemStatus::Draft);
        assert_eq!(draft.items[1].unique_id, existing.unique_id);
    }
}
