//! ReservationLifecycle - 预订生命周期
//!
//! ```text
//! Confirmed ──seat──► Seated ──finalize──► Finalized
//!     │                 │
//!     └──cancel / no_show (any non-terminal) ──► Cancelled | NoShow
//! ```
//!
//! Terminal states admit no transition. Deletion is a hard removal in any
//! state.

use chrono::{NaiveDate, NaiveTime};
use shared::message::{ChangeAction, EntityKind};
use shared::models::{Reservation, ReservationCreate, ReservationStatus, ReservationUpdate};
use shared::types::EntityId;

use crate::store::{Commit, EntityStore, StoreError, StoreResult, to_object};

/// Whether `from → to` is an allowed reservation transition
pub fn can_transition(from: ReservationStatus, to: ReservationStatus) -> bool {
    use ReservationStatus::*;
    match (from, to) {
        (Confirmed, Seated) | (Seated, Finalized) => true,
        (from, Cancelled | NoShow) => !from.is_terminal(),
        _ => false,
    }
}

/// Parse "H:MM" / "HH:MM" into zero-padded "HH:MM"
pub fn normalize_time(raw: &str) -> StoreResult<String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| StoreError::Validation(format!("time must be HH:MM, got '{}'", raw)))
}

fn validate_name(name: &str) -> StoreResult<()> {
    if name.trim().is_empty() {
        return Err(StoreError::Validation("customer name is required".into()));
    }
    Ok(())
}

fn validate_people(people: i32) -> StoreResult<()> {
    if people < 1 {
        return Err(StoreError::Validation(format!("people must be at least 1, got {}", people)));
    }
    Ok(())
}

impl EntityStore {
    // ========== Queries ==========

    /// All reservations by date, then time
    pub fn reservations(&self) -> Vec<Reservation> {
        let mut all: Vec<Reservation> = self.read(|s| s.reservations.values().cloned().collect());
        all.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time.cmp(&b.time)));
        all
    }

    pub fn reservation(&self, id: &EntityId) -> Option<Reservation> {
        self.read(|s| s.reservations.get(id).cloned())
    }

    /// Reservations on `date`, ascending by time
    pub fn reservations_for_date(&self, date: NaiveDate) -> Vec<Reservation> {
        let mut found: Vec<Reservation> = self.read(|s| {
            s.reservations
                .values()
                .filter(|r| r.date == date)
                .cloned()
                .collect()
        });
        found.sort_by(|a, b| a.time.cmp(&b.time));
        found
    }

    /// Reservations holding `table_id` on `date`, ascending by time
    pub fn reservations_for_table(&self, table_id: &EntityId, date: NaiveDate) -> Vec<Reservation> {
        let mut found: Vec<Reservation> = self.read(|s| {
            s.reservations
                .values()
                .filter(|r| r.holds_table(table_id, date))
                .cloned()
                .collect()
        });
        found.sort_by(|a, b| a.time.cmp(&b.time));
        found
    }

    // ========== Mutations ==========

    pub fn create_reservation(&self, input: ReservationCreate) -> StoreResult<Commit<Reservation>> {
        validate_name(&input.customer_name)?;
        validate_people(input.people)?;
        let time = normalize_time(&input.time)?;

        let reservation = Reservation {
            id: EntityId::local(),
            customer_name: input.customer_name.trim().to_string(),
            phone: input.phone.trim().to_string(),
            people: input.people,
            date: input.date,
            time,
            table_id: input.table_id,
            notes: input.notes.filter(|n| !n.trim().is_empty()),
            status: ReservationStatus::Confirmed,
            tags: input.tags,
            created_at: None,
        };
        tracing::info!(
            id = %reservation.id,
            date = %reservation.date,
            time = %reservation.time,
            people = reservation.people,
            table_id = ?reservation.table_id.as_ref().map(EntityId::as_str),
            "Reservation created"
        );
        self.begin_insert(reservation)
    }

    /// Field-set update; status changes go through the lifecycle methods
    pub fn update_reservation(&self, id: &EntityId, update: ReservationUpdate) -> StoreResult<Commit<Reservation>> {
        if let Some(name) = &update.customer_name {
            validate_name(name)?;
        }
        if let Some(people) = update.people {
            validate_people(people)?;
        }
        let time = update.time.as_deref().map(normalize_time).transpose()?;

        let mut patch = to_object(&update).unwrap_or_default();
        if let Some(time) = time {
            patch.insert("time".into(), time.into());
        }
        if patch.is_empty() {
            return Err(StoreError::Validation("nothing to update".into()));
        }
        self.begin_update(id, patch)
    }

    pub fn set_reservation_status(&self, id: &EntityId, status: ReservationStatus) -> StoreResult<Commit<Reservation>> {
        let mut seated_table = None;
        let commit = self.begin_edit::<Reservation>(id, |r| {
            if !can_transition(r.status, status) {
                return Err(StoreError::transition(EntityKind::Reservation, r.status, status));
            }
            r.status = status;
            if status == ReservationStatus::Seated {
                seated_table = r.table_id.clone();
            }
            Ok(())
        })?;
        tracing::info!(id = %id, status = ?status, "Reservation status changed");

        // the guest is at the table now
        if let Some(table_id) = seated_table {
            let cleared = self.write(|s| match s.table_mut(&table_id) {
                Some(table) if table.is_manually_reserved => {
                    table.is_manually_reserved = false;
                    true
                }
                _ => false,
            });
            if cleared {
                self.emit(EntityKind::Table, ChangeAction::Updated, Some(table_id));
            }
        }
        Ok(commit)
    }

    pub fn seat_reservation(&self, id: &EntityId) -> StoreResult<Commit<Reservation>> {
        self.set_reservation_status(id, ReservationStatus::Seated)
    }

    pub fn finalize_reservation(&self, id: &EntityId) -> StoreResult<Commit<Reservation>> {
        self.set_reservation_status(id, ReservationStatus::Finalized)
    }

    pub fn cancel_reservation(&self, id: &EntityId) -> StoreResult<Commit<Reservation>> {
        self.set_reservation_status(id, ReservationStatus::Cancelled)
    }

    pub fn mark_no_show(&self, id: &EntityId) -> StoreResult<Commit<Reservation>> {
        self.set_reservation_status(id, ReservationStatus::NoShow)
    }

    pub fn delete_reservation(&self, id: &EntityId) -> StoreResult<Commit<Reservation>> {
        tracing::info!(id = %id, "Reservation deleted");
        self.begin_delete(id)
    }

    pub fn add_reservation_tag(&self, id: &EntityId, tag: &str) -> StoreResult<Commit<Reservation>> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(StoreError::Validation("tag must not be empty".into()));
        }
        self.begin_edit::<Reservation>(id, |r| {
            r.tags.insert(tag.to_string());
            Ok(())
        })
    }

    pub fn remove_reservation_tag(&self, id: &EntityId, tag: &str) -> StoreResult<Commit<Reservation>> {
        self.begin_edit::<Reservation>(id, |r| {
            r.tags.remove(tag.trim());
            Ok(())
        })
    }
}
