//! Kitchen tickets (厨房单)

use chrono::Utc;
use serde_json::{Map, Value};
use shared::message::{ChangeAction, EntityKind};
use shared::order::{ItemStatus, KitchenTicket, TicketStatus};
use shared::types::EntityId;

use crate::store::{Commit, EntityStore, StoreError, StoreResult, stage_insert, stage_update};

impl EntityStore {
    /// Dispatch the whole draft as one kitchen ticket
    ///
    /// `expected_version` guards against sending a draft that changed since
    /// the caller last looked at it. The ticket is committed remotely as a
    /// single row; if that insert fails the ticket is dropped and its items
    /// go back to the front of the draft.
    pub fn send_order(&self, table_id: &EntityId, expected_version: Option<u64>) -> StoreResult<Commit<KitchenTicket>> {
        let terminal_id = self.terminal_id().to_string();
        let (ticket, op_id) = self.write(|s| -> StoreResult<_> {
            let table_name = s
                .table(table_id)
                .map(|t| t.name.clone())
                .ok_or_else(|| StoreError::not_found(EntityKind::Table, table_id))?;
            let draft = s.drafts.entry(table_id.clone()).or_default();
            if let Some(expected) = expected_version.filter(|v| *v != draft.version) {
                return Err(StoreError::StaleDraft {
                    table: table_id.clone(),
                    expected,
                    current: draft.version,
                });
            }
            if draft.is_empty() {
                return Err(StoreError::EmptyOrder(table_id.clone()));
            }

            let items = std::mem::take(&mut draft.items)
                .into_iter()
                .map(|mut item| {
                    item.item_status = ItemStatus::Sent;
                    item
                })
                .collect();
            draft.version += 1;
            draft.opened_at = None;

            let ticket = KitchenTicket {
                id: EntityId::local(),
                table_id: table_id.clone(),
                table_name,
                items,
                created_at: Utc::now(),
                status: TicketStatus::Pending,
                terminal_id: Some(terminal_id),
            };
            let op_id = stage_insert(s, &ticket)?;
            Ok((ticket, op_id))
        })?;

        tracing::info!(
            table_id = %table_id,
            ticket_id = %ticket.id,
            items = ticket.items.len(),
            "Order sent to kitchen"
        );
        self.emit(EntityKind::Draft, ChangeAction::Updated, Some(table_id.clone()));
        self.emit(EntityKind::KitchenTicket, ChangeAction::Created, Some(ticket.id.clone()));
        Ok(self.launch(ticket, Some(op_id)))
    }

    /// Tickets of one table, oldest first
    pub fn tickets_for_table(&self, table_id: &EntityId) -> Vec<KitchenTicket> {
        let mut tickets: Vec<KitchenTicket> = self.read(|s| s.tickets_for(table_id).cloned().collect());
        tickets.sort_by_key(|t| t.created_at);
        tickets
    }

    /// Every open ticket, oldest first (kitchen display)
    pub fn kitchen_tickets(&self) -> Vec<KitchenTicket> {
        let mut tickets: Vec<KitchenTicket> = self.read(|s| s.tickets.values().cloned().collect());
        tickets.sort_by_key(|t| t.created_at);
        tickets
    }

    /// Move a ticket forward; Ready and Served mark every item Ready
    pub fn set_ticket_status(&self, ticket_id: &EntityId, status: TicketStatus) -> StoreResult<Commit<KitchenTicket>> {
        let current = self
            .read(|s| s.tickets.get(ticket_id).cloned())
            .ok_or_else(|| StoreError::not_found(EntityKind::KitchenTicket, ticket_id))?;
        if status < current.status {
            return Err(StoreError::transition(EntityKind::KitchenTicket, current.status, status));
        }
        if status == current.status {
            return Ok(Commit::Local(current));
        }

        let mut items = current.items.clone();
        for item in &mut items {
            item.item_status = ItemStatus::Ready;
        }
        let patch = ticket_patch(status, &items)?;
        tracing::debug!(ticket_id = %ticket_id, from = ?current.status, to = ?status, "Ticket status changed");
        self.begin_update::<KitchenTicket>(ticket_id, patch)
    }

    /// Mark one item Ready; the ticket follows once every item is
    pub fn mark_item_ready(&self, ticket_id: &EntityId, unique_id: &str) -> StoreResult<Commit<KitchenTicket>> {
        let (ticket, op_id) = self.write(|s| -> StoreResult<_> {
            let ticket = s
                .tickets
                .get(ticket_id)
                .ok_or_else(|| StoreError::not_found(EntityKind::KitchenTicket, ticket_id))?;
            let mut items = ticket.items.clone();
            let item = items
                .iter_mut()
                .find(|i| i.unique_id == unique_id)
                .ok_or_else(|| StoreError::not_found(EntityKind::KitchenTicket, unique_id))?;
            item.item_status = ItemStatus::Ready;

            let all_ready = items.iter().all(|i| i.item_status == ItemStatus::Ready);
            let status = match ticket.status {
                TicketStatus::Pending if all_ready => TicketStatus::Ready,
                other => other,
            };
            let patch = ticket_patch(status, &items)?;
            stage_update::<KitchenTicket>(s, ticket_id, patch)
        })?;
        self.emit(EntityKind::KitchenTicket, ChangeAction::Updated, Some(ticket_id.clone()));
        Ok(self.launch(ticket, op_id))
    }
}

fn ticket_patch(status: TicketStatus, items: &[shared::order::OrderItem]) -> StoreResult<Map<String, Value>> {
    let mut patch = Map::new();
    let encode = |e: serde_json::Error| StoreError::Internal(format!("ticket patch: {}", e));
    patch.insert("status".into(), serde_json::to_value(status).map_err(encode)?);
    patch.insert("items".into(), serde_json::to_value(items).map_err(encode)?);
    Ok(patch)
}
