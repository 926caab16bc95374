//! Remote refetch + merge
//!
//! A change signal carries no payload: the collection is re-fetched and
//! merged with local intent from the ledger. Running a merge twice over the
//! same remote rows yields the same cache, so signals may arrive late,
//! duplicated or out of order.

use mesa_client::{ClientError, Collection};
use shared::error::ErrorCode;
use shared::message::{ChangeAction, EntityKind, SyncFailure, SyncOp};
use shared::models::{EventBudget, EventMenu, Reservation, VenueInfo};
use shared::order::KitchenTicket;
use shared::types::EntityId;
use std::collections::{BTreeMap, HashSet};

use super::ledger::{OpAction, OpId};
use super::state::{StoreState, Synced, overlay};
use super::{EntityStore, StoreError, StoreResult, SyncError};

impl EntityStore {
    /// Fetch every collection
    ///
    /// Keeps going past a failing collection; returns the first error.
    pub async fn load_all(&self) -> StoreResult<()> {
        let mut first_error = None;
        for collection in Collection::ALL {
            if let Err(e) = self.refresh(collection).await {
                first_error.get_or_insert(e);
            }
        }
        tracing::info!(
            reservations = self.read(|s| s.reservations.len()),
            events = self.read(|s| s.events.len()),
            menus = self.read(|s| s.menus.len()),
            tickets = self.read(|s| s.tickets.len()),
            "Initial load finished"
        );
        first_error.map_or(Ok(()), Err)
    }

    /// Re-fetch one collection and merge it into the cache
    pub async fn refresh(&self, collection: Collection) -> StoreResult<()> {
        match collection {
            Collection::Reservations => self.merge_remote::<Reservation>().await,
            Collection::Agenda => self.merge_remote::<EventBudget>().await,
            Collection::EventMenus => self.merge_remote::<EventMenu>().await,
            Collection::KitchenTickets => self.merge_remote::<KitchenTicket>().await,
            Collection::VenueInfo => self.refresh_venue().await,
        }
    }

    async fn merge_remote<T: Synced>(&self) -> StoreResult<()> {
        let rows: Vec<T> = self
            .inner
            .remote
            .fetch_all(T::COLLECTION)
            .await
            .map_err(|e| self.fetch_failed(T::COLLECTION, T::KIND, e))?;

        let changed = self.write(|s| {
            let merged = merge_rows(s, rows);
            if &merged == T::slot(s) {
                false
            } else {
                *T::slot_mut(s) = merged;
                true
            }
        });

        tracing::debug!(collection = %T::COLLECTION, changed, "Merged remote rows");
        if changed {
            self.emit(T::KIND, ChangeAction::Reloaded, None);
        }
        Ok(())
    }

    async fn refresh_venue(&self) -> StoreResult<()> {
        let rows: Vec<VenueInfo> = self
            .inner
            .remote
            .fetch_all(Collection::VenueInfo)
            .await
            .map_err(|e| self.fetch_failed(Collection::VenueInfo, EntityKind::VenueInfo, e))?;
        let venue = rows.into_iter().next().unwrap_or_default();

        let changed = self.write(|s| {
            if s.venue == venue {
                false
            } else {
                s.venue = venue;
                true
            }
        });
        if changed {
            self.emit(EntityKind::VenueInfo, ChangeAction::Reloaded, None);
        }
        Ok(())
    }

    fn fetch_failed(&self, collection: Collection, kind: EntityKind, err: ClientError) -> StoreError {
        let message = err.to_string();
        self.report_sync_failure(SyncFailure {
            op: SyncOp::Fetch,
            kind,
            id: None,
            code: ErrorCode::SyncFailed,
            message: message.clone(),
            reverted: false,
        });
        StoreError::Sync(SyncError {
            op_id: OpId::next(),
            op: SyncOp::Fetch,
            kind,
            id: EntityId::new(collection.table_name()),
            message,
            reverted: false,
        })
    }
}

/// Remote rows, plus pending update patches, minus pending deletes, plus
/// pending local inserts
fn merge_rows<T: Synced>(state: &StoreState, rows: Vec<T>) -> BTreeMap<EntityId, T> {
    let ledger = &state.ledger;
    let deleted: HashSet<&EntityId> = ledger
        .for_collection(T::COLLECTION)
        .filter(|op| matches!(op.action, OpAction::Delete))
        .map(|op| &op.entity_id)
        .collect();

    let mut merged = BTreeMap::new();
    for row in rows {
        let id = row.id().clone();
        if deleted.contains(&id) {
            continue;
        }
        let entity = overlay(row, ledger.patches_for(T::COLLECTION, &id, None));
        merged.insert(id, entity);
    }

    for op in ledger.for_collection(T::COLLECTION) {
        if !matches!(op.action, OpAction::Insert { .. }) {
            continue;
        }
        if let Some(local) = T::slot(state).get(&op.entity_id) {
            merged.insert(op.entity_id.clone(), local.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ledger::PendingOp;
    use chrono::NaiveDate;
    use serde_json::json;

    fn reservation(id: EntityId, people: i32) -> Reservation {
        Reservation {
            id,
            customer_name: "Iñaki".into(),
            phone: String::new(),
            people,
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            time: "20:30".into(),
            table_id: None,
            notes: None,
            status: Default::default(),
            tags: Default::default(),
            created_at: None,
        }
    }

    fn push(state: &mut StoreState, id: &EntityId, action: OpAction) -> OpId {
        state.ledger.push(PendingOp::new(
            Collection::Reservations,
            EntityKind::Reservation,
            id.clone(),
            action,
        ))
    }

    #[test]
    fn test_merge_overlays_pending_patch() {
        let mut state = StoreState::default();
        let id = EntityId::from(1);
        push(
            &mut state,
            &id,
            OpAction::Update {
                patch: json!({ "people": 8 }).as_object().cloned().unwrap(),
            },
        );

        let merged = merge_rows(&state, vec![reservation(id.clone(), 2)]);
        assert_eq!(merged[&id].people, 8);
    }

    #[test]
    fn test_merge_suppresses_pending_delete() {
        let mut state = StoreState::default();
        let id = EntityId::from(1);
        push(&mut state, &id, OpAction::Delete);

        let merged = merge_rows(&state, vec![reservation(id.clone(), 2), reservation(EntityId::from(2), 3)]);
        assert!(!merged.contains_key(&id));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_merge_keeps_local_insert() {
        let mut state = StoreState::default();
        let local = reservation(EntityId::local(), 4);
        state.reservations.insert(local.id.clone(), local.clone());
        push(
            &mut state,
            &local.id,
            OpAction::Insert {
                payload: serde_json::Map::new(),
            },
        );

        let merged = merge_rows(&state, vec![reservation(EntityId::from(9), 2)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&local.id], local);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut state = StoreState::default();
        let rows = vec![reservation(EntityId::from(1), 2), reservation(EntityId::from(2), 5)];
        let first = merge_rows(&state, rows.clone());
        state.reservations = first.clone();
        let second = merge_rows(&state, rows);
        assert_eq!(first, second);
    }
}
