//! Reservation Model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::EntityId;

/// Reservation status (预订状态)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    #[default]
    Confirmed,
    Seated,
    Finalized,
    NoShow,
    Cancelled,
}

impl ReservationStatus {
    /// Terminal states admit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::NoShow | Self::Cancelled)
    }
}

/// Reservation entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: EntityId,
    pub customer_name: String,
    #[serde(default)]
    pub phone: String,
    pub people: i32,
    /// Calendar date (YYYY-MM-DD)
    pub date: NaiveDate,
    /// Local wall-clock time, zero-padded "HH:MM" so it orders lexicographically
    pub time: String,
    #[serde(default)]
    pub table_id: Option<EntityId>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: ReservationStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Whether this reservation holds `table_id` on `date`
    pub fn holds_table(&self, table_id: &EntityId, date: NaiveDate) -> bool {
        self.date == date && self.table_id.as_ref() == Some(table_id)
    }
}

/// Create reservation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationCreate {
    pub customer_name: String,
    #[serde(default)]
    pub phone: String,
    pub people: i32,
    pub date: NaiveDate,
    pub time: String,
    #[serde(default)]
    pub table_id: Option<EntityId>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Update reservation payload
///
/// Only the fields that are `Some` form the update's field set; status is
/// changed through the lifecycle operations, never through a plain update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub people: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// `Some(None)` clears the table assignment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<Option<EntityId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_serializes_only_present_fields() {
        let update = ReservationUpdate {
            people: Some(6),
            table_id: Some(None),
            ..Default::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        let map = value.as_object().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["people"], 6);
        assert!(map["tableId"].is_null());
    }

    #[test]
    fn holds_table_normalizes_ids() {
        let reservation: Reservation = serde_json::from_value(serde_json::json!({
            "id": 1,
            "customerName": "Marta",
            "people": 4,
            "date": "2026-10-16",
            "time": "21:00",
            "tableId": "05"
        }))
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert!(reservation.holds_table(&EntityId::from(5), date));
        assert!(!reservation.holds_table(&EntityId::from(5), date.succ_opt().unwrap()));
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
    }
}
