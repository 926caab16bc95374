//! Event / Budget Model (宴会预算)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::EntityId;

/// Event booking status
///
/// Operators may set any status directly to correct mistakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    #[default]
    Draft,
    Confirmed,
    Celebrated,
    Paid,
}

/// Deposit sub-state, independent of [`EventStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    #[default]
    Pending,
    Paid,
    Returned,
}

/// A menu chosen for the event; `unit_price` is frozen when selected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedMenu {
    pub menu_id: EntityId,
    pub quantity: i32,
    pub unit_price: f64,
}

/// Preparation checklist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTask {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// Event / budget entity (`agenda` collection)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBudget {
    pub id: EntityId,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub guests: i32,
    #[serde(default)]
    pub is_venue_only: bool,
    #[serde(default)]
    pub venue_price: f64,
    #[serde(default)]
    pub selected_menus: Vec<SelectedMenu>,
    /// Fractional rate, e.g. 0.10 for 10%
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub has_vat: bool,
    /// Derived; recomputed on every write
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub deposit_amount: f64,
    #[serde(default)]
    pub deposit_status: DepositStatus,
    #[serde(default)]
    pub tasks: Vec<EventTask>,
    #[serde(default)]
    pub client_nif: String,
    #[serde(default)]
    pub client_address: String,
    /// Fiscal invoice number; assigned at most once
    #[serde(default)]
    pub invoice_number: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Create event payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBudgetCreate {
    pub name: String,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub guests: i32,
    #[serde(default)]
    pub is_venue_only: bool,
    #[serde(default)]
    pub venue_price: f64,
    #[serde(default)]
    pub selected_menus: Vec<SelectedMenu>,
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub has_vat: bool,
    #[serde(default)]
    pub deposit_amount: f64,
    #[serde(default)]
    pub client_nif: String,
    #[serde(default)]
    pub client_address: String,
}

/// Update event payload (field-set patch)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBudgetUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guests: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_venue_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_menus: Option<Vec<SelectedMenu>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_vat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_nif: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_address: Option<String>,
}

/// Kind of deposit movement being printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositMovement {
    Received,
    Returned,
}

/// Deposit transaction record handed to the print collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositReceipt {
    pub event_id: EntityId,
    pub event_name: String,
    pub client_nif: String,
    pub amount: f64,
    pub movement: DepositMovement,
    pub recorded_at: DateTime<Utc>,
}
