//! TableLifecycle - 桌台生命周期
//!
//! Floor layout, derived status, close and delete. Tables, drafts and bills
//! are terminal-local; only the kitchen tickets removed on close reach the
//! remote store.

mod status;

pub use status::TableView;

use chrono::NaiveDate;
use shared::message::{ChangeAction, EntityKind};
use shared::models::{DiningTable, DiningTableCreate, TableStatus, Zone};
use shared::order::KitchenTicket;
use shared::types::EntityId;

use crate::store::{Commit, EntityStore, StoreError, StoreResult, stage_delete};

/// Zone used when a table is added without one
pub const DEFAULT_ZONE: &str = "Sala";

/// Remote half of a table close
pub struct TableClosure {
    pub table_id: EntityId,
    /// One delete per kitchen ticket that was on the table
    pub tickets: Vec<Commit<KitchenTicket>>,
}

impl TableClosure {
    /// Wait for every ticket delete; returns the first failure
    pub async fn wait(self) -> StoreResult<()> {
        let mut first_error = None;
        for commit in self.tickets {
            if let Err(e) = commit.wait().await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl EntityStore {
    // ========== Queries ==========

    pub fn tables(&self) -> Vec<DiningTable> {
        self.read(|s| s.tables.clone())
    }

    pub fn table(&self, id: &EntityId) -> Option<DiningTable> {
        self.read(|s| s.table(id).cloned())
    }

    /// Distinct zones in the order their first table was added
    pub fn zones(&self) -> Vec<Zone> {
        self.read(|s| {
            let mut zones: Vec<Zone> = Vec::new();
            for table in &s.tables {
                match zones.iter_mut().find(|z| z.name == table.zone) {
                    Some(zone) => zone.table_ids.push(table.id.clone()),
                    None => zones.push(Zone {
                        name: table.zone.clone(),
                        table_ids: vec![table.id.clone()],
                    }),
                }
            }
            zones
        })
    }

    /// Status as of today
    pub fn table_status(&self, id: &EntityId) -> StoreResult<TableStatus> {
        self.table_status_on(id, shared::util::today())
    }

    pub fn table_status_on(&self, id: &EntityId, date: NaiveDate) -> StoreResult<TableStatus> {
        self.read(|s| {
            let table = s
                .table(id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Table, id))?;
            Ok(status::derive_status(s, table, date))
        })
    }

    pub fn table_view(&self, id: &EntityId) -> StoreResult<TableView> {
        let (date, time, now) = view_clock();
        self.read(|s| {
            let table = s
                .table(id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Table, id))?;
            Ok(status::build_view(s, table, date, &time, now))
        })
    }

    pub fn table_views(&self) -> Vec<TableView> {
        let (date, time, now) = view_clock();
        self.read(|s| {
            s.tables
                .iter()
                .map(|t| status::build_view(s, t, date, &time, now))
                .collect()
        })
    }

    // ========== Layout ==========

    pub fn add_table(&self, input: DiningTableCreate) -> StoreResult<DiningTable> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("table name is required".into()));
        }
        let zone = match input.zone.trim() {
            "" => DEFAULT_ZONE,
            zone => zone,
        };
        let table = DiningTable {
            id: EntityId::from(shared::util::snowflake_id()),
            name: name.to_string(),
            zone: zone.to_string(),
            is_manually_reserved: false,
        };
        self.write(|s| s.tables.push(table.clone()));
        tracing::info!(table_id = %table.id, name = %table.name, zone = %table.zone, "Table added");
        self.emit(EntityKind::Table, ChangeAction::Created, Some(table.id.clone()));
        Ok(table)
    }

    pub fn rename_table(&self, id: &EntityId, name: &str) -> StoreResult<DiningTable> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("table name is required".into()));
        }
        let table = self.write(|s| -> StoreResult<DiningTable> {
            let table = s
                .table_mut(id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Table, id))?;
            table.name = name.to_string();
            Ok(table.clone())
        })?;
        self.emit(EntityKind::Table, ChangeAction::Updated, Some(id.clone()));
        Ok(table)
    }

    pub fn set_manual_reserved(&self, id: &EntityId, reserved: bool) -> StoreResult<DiningTable> {
        let table = self.write(|s| -> StoreResult<DiningTable> {
            let table = s
                .table_mut(id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Table, id))?;
            table.is_manually_reserved = reserved;
            Ok(table.clone())
        })?;
        tracing::debug!(table_id = %id, reserved, "Manual reservation flag set");
        self.emit(EntityKind::Table, ChangeAction::Updated, Some(id.clone()));
        Ok(table)
    }

    /// Remove a table from the layout; refused while it holds anything
    pub fn delete_table(&self, id: &EntityId) -> StoreResult<DiningTable> {
        let removed = self.write(|s| -> StoreResult<DiningTable> {
            let index = s
                .tables
                .iter()
                .position(|t| &t.id == id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Table, id))?;
            if status::is_occupied(s, id) {
                return Err(StoreError::TableBusy(id.clone()));
            }
            s.drafts.remove(id);
            s.bills.remove(id);
            Ok(s.tables.remove(index))
        })?;
        tracing::info!(table_id = %id, name = %removed.name, "Table deleted");
        self.emit(EntityKind::Table, ChangeAction::Deleted, Some(id.clone()));
        Ok(removed)
    }

    // ========== Close ==========

    /// Clear draft, kitchen tickets, bill and manual flag in one step
    ///
    /// Destructive: callers confirm with the operator first. The local half
    /// is applied before this returns; ticket deletes are committed remotely
    /// through the returned [`TableClosure`].
    pub fn close_table(&self, id: &EntityId) -> StoreResult<TableClosure> {
        let (staged, had_bill) = self.write(|s| -> StoreResult<_> {
            if s.table(id).is_none() {
                return Err(StoreError::not_found(EntityKind::Table, id));
            }
            let ticket_ids: Vec<EntityId> = s.tickets_for(id).map(|t| t.id.clone()).collect();
            let mut staged = Vec::with_capacity(ticket_ids.len());
            for ticket_id in ticket_ids {
                staged.push(stage_delete::<KitchenTicket>(s, &ticket_id)?);
            }
            if let Some(draft) = s.drafts.get_mut(id) {
                draft.items.clear();
                draft.version += 1;
                draft.opened_at = None;
            }
            let had_bill = s.bills.remove(id).is_some();
            if let Some(table) = s.table_mut(id) {
                table.is_manually_reserved = false;
            }
            Ok((staged, had_bill))
        })?;

        tracing::info!(table_id = %id, tickets = staged.len(), had_bill, "Table closed");
        for (ticket, _) in &staged {
            self.emit(EntityKind::KitchenTicket, ChangeAction::Deleted, Some(ticket.id.clone()));
        }
        self.emit(EntityKind::Draft, ChangeAction::Updated, Some(id.clone()));
        if had_bill {
            self.emit(EntityKind::Bill, ChangeAction::Deleted, Some(id.clone()));
        }
        self.emit(EntityKind::Table, ChangeAction::Updated, Some(id.clone()));

        let tickets = staged
            .into_iter()
            .map(|(ticket, op_id)| self.launch(ticket, op_id))
            .collect();
        Ok(TableClosure {
            table_id: id.clone(),
            tickets,
        })
    }
}

/// (today, "HH:MM" now, unix millis now) on the terminal clock
fn view_clock() -> (NaiveDate, String, i64) {
    let now = chrono::Local::now();
    (now.date_naive(), now.format("%H:%M").to_string(), now.timestamp_millis())
}
