//! Table bill and partial payments (账单与分单支付)

use rust_decimal::Decimal;
use shared::message::{ChangeAction, EntityKind};
use shared::order::{Bill, BillLine, BillPayment, KitchenTicket, PaidLine, PaymentMethod};
use shared::types::EntityId;
use std::collections::BTreeMap;

use super::money;
use crate::store::{EntityStore, StoreError, StoreResult};

impl EntityStore {
    pub fn bill(&self, table_id: &EntityId) -> Option<Bill> {
        self.read(|s| s.bills.get(table_id).cloned())
    }

    pub fn bill_total(&self, table_id: &EntityId) -> f64 {
        self.read(|s| {
            s.bills
                .get(table_id)
                .map(|b| money::to_f64(money::bill_total(b)))
                .unwrap_or(0.0)
        })
    }

    pub fn bill_outstanding(&self, table_id: &EntityId) -> f64 {
        self.read(|s| {
            s.bills
                .get(table_id)
                .map(|b| money::to_f64(money::bill_outstanding(b)))
                .unwrap_or(0.0)
        })
    }

    /// Bring every dispatched item of the table onto the bill
    ///
    /// Items already on the bill are not added twice, so asking again after
    /// another send only appends the new items.
    pub fn request_bill(&self, table_id: &EntityId) -> StoreResult<Bill> {
        let (bill, added, created) = self.write(|s| -> StoreResult<_> {
            if s.table(table_id).is_none() {
                return Err(StoreError::not_found(EntityKind::Table, table_id));
            }
            let mut tickets: Vec<&KitchenTicket> = s.tickets_for(table_id).collect();
            tickets.sort_by_key(|t| t.created_at);
            let items: Vec<_> = tickets.iter().flat_map(|t| t.items.iter().cloned()).collect();

            let created = !s.bills.contains_key(table_id);
            let bill = s.bills.entry(table_id.clone()).or_default();
            let mut added = 0;
            for item in items {
                if !bill.contains(&item.unique_id) {
                    bill.lines.push(BillLine {
                        item,
                        paid_quantity: 0,
                    });
                    added += 1;
                }
            }
            if bill.is_empty() {
                s.bills.remove(table_id);
                return Err(StoreError::EmptyBill(table_id.clone()));
            }
            Ok((bill.clone(), added, created))
        })?;

        tracing::info!(table_id = %table_id, lines = bill.lines.len(), added, "Bill requested");
        if added > 0 {
            let action = if created {
                ChangeAction::Created
            } else {
                ChangeAction::Updated
            };
            self.emit(EntityKind::Bill, action, Some(table_id.clone()));
        }
        Ok(bill)
    }

    /// Pay part of the bill: `(unique_id, quantity)` per line
    pub fn pay_bill_lines(
        &self,
        table_id: &EntityId,
        lines: &[(String, i32)],
        method: PaymentMethod,
    ) -> StoreResult<BillPayment> {
        if lines.is_empty() {
            return Err(StoreError::InvalidPayment("no bill lines selected".into()));
        }
        // duplicates add up
        let mut requested: BTreeMap<&str, i32> = BTreeMap::new();
        for (unique_id, quantity) in lines {
            if *quantity <= 0 {
                return Err(StoreError::InvalidPayment(format!(
                    "quantity must be positive, got {} for {}",
                    quantity, unique_id
                )));
            }
            *requested.entry(unique_id.as_str()).or_default() += quantity;
        }

        let payment = self.write(|s| -> StoreResult<BillPayment> {
            let bill = s
                .bills
                .get_mut(table_id)
                .ok_or_else(|| StoreError::EmptyBill(table_id.clone()))?;

            // validate everything before touching anything
            for (unique_id, quantity) in &requested {
                let line = bill
                    .lines
                    .iter()
                    .find(|l| l.item.unique_id == *unique_id)
                    .ok_or_else(|| StoreError::not_found(EntityKind::Bill, unique_id))?;
                if *quantity > line.unpaid_quantity() {
                    return Err(StoreError::Overpayment {
                        unique_id: unique_id.to_string(),
                        requested: *quantity,
                        unpaid: line.unpaid_quantity(),
                    });
                }
            }

            let mut amount = Decimal::ZERO;
            let mut paid = Vec::with_capacity(requested.len());
            for (unique_id, quantity) in &requested {
                if let Some(line) = bill.line_mut(unique_id) {
                    line.paid_quantity += quantity;
                    amount += money::to_decimal(line.item.price) * Decimal::from(*quantity);
                    paid.push(PaidLine {
                        unique_id: unique_id.to_string(),
                        quantity: *quantity,
                    });
                }
            }
            let payment = BillPayment {
                id: uuid::Uuid::new_v4().to_string(),
                amount: money::to_f64(amount),
                method,
                lines: paid,
                paid_at: shared::util::now_millis(),
            };
            bill.payments.push(payment.clone());
            Ok(payment)
        })?;

        tracing::info!(
            table_id = %table_id,
            payment_id = %payment.id,
            amount = payment.amount,
            method = ?payment.method,
            "Bill payment recorded"
        );
        self.emit(EntityKind::Bill, ChangeAction::Updated, Some(table_id.clone()));
        Ok(payment)
    }

    /// Pay everything still unpaid
    pub fn pay_bill_in_full(&self, table_id: &EntityId, method: PaymentMethod) -> StoreResult<BillPayment> {
        let lines: Vec<(String, i32)> = self
            .read(|s| s.bills.get(table_id).cloned())
            .ok_or_else(|| StoreError::EmptyBill(table_id.clone()))?
            .lines
            .iter()
            .filter(|l| l.unpaid_quantity() > 0)
            .map(|l| (l.item.unique_id.clone(), l.unpaid_quantity()))
            .collect();
        if lines.is_empty() {
            return Err(StoreError::InvalidPayment("bill is already settled".into()));
        }
        self.pay_bill_lines(table_id, &lines, method)
    }
}
