//! Plain-text document renderer
//!
//! Lays out event invoices and deposit receipts as fixed-width text, the
//! form a receipt printer or a log line takes.

use chrono::{DateTime, Utc};
use shared::models::{DepositMovement, DepositReceipt, EventBudget, EventMenu, VenueInfo};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::orders::money;
use shared::types::EntityId;

/// Fixed-width renderer
///
/// Common widths:
/// - 58mm paper: 32 characters
/// - 80mm paper: 48 characters
pub struct DocumentRenderer {
    width: usize,
}

impl Default for DocumentRenderer {
    fn default() -> Self {
        Self::new(48)
    }
}

impl DocumentRenderer {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(24) }
    }

    /// Render an event invoice; `menus` resolves selected menu names
    pub fn render_event(&self, event: &EventBudget, venue: &VenueInfo, menus: &BTreeMap<EntityId, EventMenu>) -> String {
        let mut out = String::new();
        self.header(&mut out, venue);

        match event.invoice_number {
            Some(number) => self.line(&mut out, &format!("FACTURA N. {}", number)),
            None => self.line(&mut out, "PRESUPUESTO"),
        }
        self.line(&mut out, &format!("{} - {}", event.name, event.date.format("%d/%m/%Y")));
        if !event.client_nif.is_empty() {
            self.line(&mut out, &format!("NIF: {}", event.client_nif));
        }
        if !event.client_address.is_empty() {
            self.line(&mut out, &event.client_address);
        }
        self.separator(&mut out);

        if event.is_venue_only {
            self.amount_line(&mut out, "Alquiler de espacio", event.venue_price);
        } else {
            for selected in &event.selected_menus {
                let name = menus
                    .get(&selected.menu_id)
                    .map(|m| m.name.as_str())
                    .unwrap_or("Menu");
                let subtotal = money::to_f64(money::to_decimal(selected.unit_price) * rust_decimal::Decimal::from(selected.quantity));
                self.amount_line(&mut out, &format!("{} x{} @{:.2}", name, selected.quantity, selected.unit_price), subtotal);
            }
        }

        self.separator(&mut out);
        if event.has_vat {
            self.amount_line(&mut out, &format!("IVA {:.0}%", event.tax_rate * 100.0), money::event_tax(event));
        }
        self.amount_line(&mut out, "TOTAL", event.total);
        if event.deposit_amount > 0.0 {
            self.amount_line(&mut out, &format!("Deposito ({:?})", event.deposit_status), event.deposit_amount);
        }
        out
    }

    pub fn render_deposit(&self, receipt: &DepositReceipt, venue: &VenueInfo) -> String {
        let mut out = String::new();
        self.header(&mut out, venue);
        let title = match receipt.movement {
            DepositMovement::Received => "DEPOSITO RECIBIDO",
            DepositMovement::Returned => "DEPOSITO DEVUELTO",
        };
        self.line(&mut out, title);
        self.line(&mut out, &receipt.event_name);
        if !receipt.client_nif.is_empty() {
            self.line(&mut out, &format!("NIF: {}", receipt.client_nif));
        }
        self.line(&mut out, &format_timestamp(receipt.recorded_at));
        self.separator(&mut out);
        self.amount_line(&mut out, "IMPORTE", receipt.amount);
        out
    }

    fn header(&self, out: &mut String, venue: &VenueInfo) {
        if !venue.name.is_empty() {
            self.line(out, &venue.name);
        }
        if !venue.address.is_empty() {
            self.line(out, &venue.address);
        }
        if !venue.nif.is_empty() {
            self.line(out, &format!("NIF: {}", venue.nif));
        }
        self.separator(out);
    }

    fn line(&self, out: &mut String, text: &str) {
        let clipped: String = text.chars().take(self.width).collect();
        let _ = writeln!(out, "{}", clipped);
    }

    fn separator(&self, out: &mut String) {
        let _ = writeln!(out, "{}", "-".repeat(self.width));
    }

    /// Label left, amount right-aligned
    fn amount_line(&self, out: &mut String, label: &str, amount: f64) {
        let value = format!("{:.2}", amount);
        let room = self.width.saturating_sub(value.len() + 1);
        let label: String = label.chars().take(room).collect();
        let _ = writeln!(out, "{:<room$} {}", label, value, room = room);
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}
