//! Table bill (账单)

use serde::{Deserialize, Serialize};

use super::types::OrderItem;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Other,
}

/// A dispatched item confirmed for payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillLine {
    pub item: OrderItem,
    #[serde(default)]
    pub paid_quantity: i32,
}

impl BillLine {
    pub fn unpaid_quantity(&self) -> i32 {
        (self.item.quantity - self.paid_quantity).max(0)
    }
}

/// Quantity of one bill line covered by a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidLine {
    pub unique_id: String,
    pub quantity: i32,
}

/// Partial or full payment recorded against the bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPayment {
    pub id: String,
    pub amount: f64,
    pub method: PaymentMethod,
    pub lines: Vec<PaidLine>,
    pub paid_at: i64,
}

/// Per-table bill; cleared when the table is closed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub lines: Vec<BillLine>,
    #[serde(default)]
    pub payments: Vec<BillPayment>,
}

impl Bill {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.lines.iter().any(|l| l.item.unique_id == unique_id)
    }

    pub fn line_mut(&mut self, unique_id: &str) -> Option<&mut BillLine> {
        self.lines.iter_mut().find(|l| l.item.unique_id == unique_id)
    }

    /// Fully paid once every line has no unpaid quantity left
    pub fn is_settled(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(|l| l.unpaid_quantity() == 0)
    }
}
