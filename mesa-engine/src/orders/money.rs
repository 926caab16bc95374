//! Money calculation utilities using rust_decimal for precision
//!
//! All totals are summed as `Decimal` and converted back to `f64` (rounded
//! half away from zero to 2 places) only when stored or displayed.

use rust_decimal::prelude::*;
use shared::models::{EventBudget, SelectedMenu};
use shared::order::{Bill, OrderItem};

use crate::store::{StoreError, StoreResult};

const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed unit price (€1,000,000)
pub const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line
pub const MAX_QUANTITY: i32 = 9999;

#[inline]
fn require_finite(value: f64, field_name: &str) -> StoreResult<()> {
    if !value.is_finite() {
        return Err(StoreError::Validation(format!(
            "{} must be a finite number, got {}",
            field_name, value
        )));
    }
    Ok(())
}

/// Non-negative, finite and below [`MAX_PRICE`]
pub fn validate_amount(value: f64, field_name: &str) -> StoreResult<()> {
    require_finite(value, field_name)?;
    if value < 0.0 {
        return Err(StoreError::Validation(format!(
            "{} must be non-negative, got {}",
            field_name, value
        )));
    }
    if value > MAX_PRICE {
        return Err(StoreError::Validation(format!(
            "{} exceeds maximum allowed ({}), got {}",
            field_name, MAX_PRICE, value
        )));
    }
    Ok(())
}

pub fn validate_quantity(quantity: i32) -> StoreResult<()> {
    if quantity <= 0 {
        return Err(StoreError::Validation(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(StoreError::Validation(format!(
            "quantity exceeds maximum allowed ({}), got {}",
            MAX_QUANTITY, quantity
        )));
    }
    Ok(())
}

/// Fractional tax rate in `[0, 1]`
pub fn validate_tax_rate(rate: f64) -> StoreResult<()> {
    require_finite(rate, "tax rate")?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(StoreError::Validation(format!(
            "tax rate must be between 0 and 1, got {}",
            rate
        )));
    }
    Ok(())
}

/// Convert f64 to Decimal for calculation
///
/// Non-finite input is logged and treated as zero.
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_else(|| {
        tracing::error!(value = ?value, "Non-finite f64 in monetary calculation, defaulting to zero");
        Decimal::ZERO
    })
}

/// Convert Decimal back to f64, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    let rounded = value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    rounded.to_f64().unwrap_or_else(|| {
        tracing::error!(value = %rounded, "Decimal out of f64 range, defaulting to zero");
        0.0
    })
}

// ========== Orders ==========

pub fn line_total(item: &OrderItem) -> Decimal {
    to_decimal(item.price) * Decimal::from(item.quantity)
}

/// Σ(price × quantity)
pub fn items_total<'a>(items: impl IntoIterator<Item = &'a OrderItem>) -> Decimal {
    items.into_iter().map(line_total).sum()
}

pub fn bill_total(bill: &Bill) -> Decimal {
    items_total(bill.lines.iter().map(|l| &l.item))
}

/// Value of the quantities already paid
pub fn bill_paid(bill: &Bill) -> Decimal {
    bill.lines
        .iter()
        .map(|l| to_decimal(l.item.price) * Decimal::from(l.paid_quantity.min(l.item.quantity)))
        .sum()
}

pub fn bill_outstanding(bill: &Bill) -> Decimal {
    (bill_total(bill) - bill_paid(bill)).max(Decimal::ZERO)
}

// ========== Events ==========

/// Venue price alone, or Σ(unit price × quantity) over the selected menus
pub fn event_subtotal(is_venue_only: bool, venue_price: f64, menus: &[SelectedMenu]) -> Decimal {
    if is_venue_only {
        return to_decimal(venue_price);
    }
    menus
        .iter()
        .map(|m| to_decimal(m.unit_price) * Decimal::from(m.quantity))
        .sum()
}

/// Subtotal, with tax applied when the event carries VAT
pub fn event_total(event: &EventBudget) -> f64 {
    let subtotal = event_subtotal(event.is_venue_only, event.venue_price, &event.selected_menus);
    let total = if event.has_vat {
        subtotal * (Decimal::ONE + to_decimal(event.tax_rate))
    } else {
        subtotal
    };
    to_f64(total)
}

/// Tax portion of the event total
pub fn event_tax(event: &EventBudget) -> f64 {
    if !event.has_vat {
        return 0.0;
    }
    let subtotal = event_subtotal(event.is_venue_only, event.venue_price, &event.selected_menus);
    to_f64(subtotal * to_decimal(event.tax_rate))
}

/// Reject money fields an event must never carry
pub fn validate_event(event: &EventBudget) -> StoreResult<()> {
    if event.guests < 0 {
        return Err(StoreError::Validation(format!(
            "guests must be non-negative, got {}",
            event.guests
        )));
    }
    validate_amount(event.venue_price, "venue price")?;
    validate_amount(event.deposit_amount, "deposit amount")?;
    validate_tax_rate(event.tax_rate)?;
    for menu in &event.selected_menus {
        validate_amount(menu.unit_price, "menu unit price")?;
        validate_quantity(menu.quantity)?;
    }
    Ok(())
}
