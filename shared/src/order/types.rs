//! Order line item types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::EntityId;

/// Modifier selections: group name → chosen option (e.g. "Punto" → "Al punto")
pub type Modifiers = BTreeMap<String, String>;

/// Item lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// 草稿 - not yet dispatched, freely editable
    #[default]
    Draft,
    /// 已送厨 - dispatched on a kitchen ticket, immutable
    Sent,
    /// 已出餐 - kitchen marked it ready
    Ready,
}

/// What "add item" does when the draft already holds the same configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Bump the quantity of a matching draft line without a note
    #[default]
    MergeMatching,
    /// Always append a new line
    AlwaysNewLine,
}

impl std::str::FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "merge_matching" | "merge" => Ok(Self::MergeMatching),
            "always_new_line" | "new_line" => Ok(Self::AlwaysNewLine),
            other => Err(format!("unknown merge policy: {}", other)),
        }
    }
}

/// Catalog product as seen at the moment it is added to an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub id: EntityId,
    pub name: String,
    pub price: f64,
}

/// Order line item
///
/// `price`, `name` and `selected_modifiers` are copied from the catalog when
/// the item is added and never follow later catalog changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Fresh per add-to-order action
    pub unique_id: String,
    pub product_id: EntityId,
    pub name: String,
    pub price: f64,
    pub quantity: i32,
    #[serde(default)]
    pub selected_modifiers: Modifiers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub item_status: ItemStatus,
}

impl OrderItem {
    /// Build a new draft line from a catalog product
    pub fn from_product(product: &ProductRef, modifiers: Modifiers) -> Self {
        Self {
            unique_id: uuid::Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            quantity: 1,
            selected_modifiers: modifiers,
            notes: None,
            item_status: ItemStatus::Draft,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.item_status == ItemStatus::Draft
    }

    /// Same product, same frozen price, same modifiers
    pub fn same_configuration(&self, product: &ProductRef, modifiers: &Modifiers) -> bool {
        self.product_id == product.id
            && self.price == product.price
            && &self.selected_modifiers == modifiers
    }
}

/// Per-table draft order (草稿订单)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub items: Vec<OrderItem>,
    /// Bumped on every mutation; callers pass it back to detect a stale view
    pub version: u64,
    /// When the first item of the current draft was added (Unix millis)
    #[serde(default)]
    pub opened_at: Option<i64>,
}

impl OrderDraft {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, unique_id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.unique_id == unique_id)
    }

    pub fn position(&self, unique_id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.unique_id == unique_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: f64) -> ProductRef {
        ProductRef {
            id: EntityId::from(10),
            name: "Croquetas".to_string(),
            price,
        }
    }

    #[test]
    fn each_add_gets_a_fresh_unique_id() {
        let a = OrderItem::from_product(&product(8.5), Modifiers::new());
        let b = OrderItem::from_product(&product(8.5), Modifiers::new());
        assert_ne!(a.unique_id, b.unique_id);
        assert_eq!(a.item_status, ItemStatus::Draft);
        assert_eq!(a.quantity, 1);
    }

    #[test]
    fn same_configuration_compares_price_and_modifiers() {
        let mut mods = Modifiers::new();
        mods.insert("Salsa".to_string(), "Brava".to_string());
        let item = OrderItem::from_product(&product(8.5), mods.clone());

        assert!(item.same_configuration(&product(8.5), &mods));
        assert!(!item.same_configuration(&product(9.0), &mods));
        assert!(!item.same_configuration(&product(8.5), &Modifiers::new()));
    }

    #[test]
    fn merge_policy_parses() {
        assert_eq!("merge_matching".parse(), Ok(MergePolicy::MergeMatching));
        assert_eq!("Always-New-Line".parse(), Ok(MergePolicy::AlwaysNewLine));
        assert!("sometimes".parse::<MergePolicy>().is_err());
    }
}
