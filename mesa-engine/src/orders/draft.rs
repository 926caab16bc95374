//! Draft order editing

use shared::message::{ChangeAction, EntityKind};
use shared::order::{MergePolicy, Modifiers, OrderDraft, OrderItem, ProductRef};
use shared::types::EntityId;

use super::money;
use crate::store::{EntityStore, StoreError, StoreResult, StoreState};

/// Where an item of a table currently lives
enum ItemLocation {
    Draft,
    Dispatched,
    Missing,
}

fn locate(state: &StoreState, table_id: &EntityId, unique_id: &str) -> ItemLocation {
    if state
        .drafts
        .get(table_id)
        .is_some_and(|d| d.find(unique_id).is_some_and(OrderItem::is_draft))
    {
        return ItemLocation::Draft;
    }
    let in_ticket = state
        .tickets_for(table_id)
        .any(|t| t.items.iter().any(|i| i.unique_id == unique_id));
    let in_bill = state.bills.get(table_id).is_some_and(|b| b.contains(unique_id));
    if in_ticket || in_bill {
        ItemLocation::Dispatched
    } else {
        ItemLocation::Missing
    }
}

impl EntityStore {
    /// Current draft of a table (empty when nothing was added)
    pub fn draft(&self, table_id: &EntityId) -> StoreResult<OrderDraft> {
        self.read(|s| {
            if s.table(table_id).is_none() {
                return Err(StoreError::not_found(EntityKind::Table, table_id));
            }
            Ok(s.drafts.get(table_id).cloned().unwrap_or_default())
        })
    }

    pub fn draft_total(&self, table_id: &EntityId) -> f64 {
        self.read(|s| {
            s.drafts
                .get(table_id)
                .map(|d| money::to_f64(money::items_total(&d.items)))
                .unwrap_or(0.0)
        })
    }

    /// Draft total while a draft is open, bill total otherwise
    pub fn display_total(&self, table_id: &EntityId) -> f64 {
        self.read(|s| match s.drafts.get(table_id) {
            Some(draft) if !draft.is_empty() => money::to_f64(money::items_total(&draft.items)),
            _ => s
                .bills
                .get(table_id)
                .map(|b| money::to_f64(money::bill_total(b)))
                .unwrap_or(0.0),
        })
    }

    /// Add one unit of a product to the table's draft
    ///
    /// Name, price and modifiers are frozen on the line. Under
    /// [`MergePolicy::MergeMatching`] a matching note-less draft line gets its
    /// quantity bumped instead of a new line being appended.
    pub fn add_item(
        &self,
        table_id: &EntityId,
        product: &ProductRef,
        modifiers: Option<Modifiers>,
    ) -> StoreResult<OrderItem> {
        if product.name.trim().is_empty() {
            return Err(StoreError::Validation("product name is required".into()));
        }
        money::validate_amount(product.price, "price")?;
        let modifiers = modifiers.unwrap_or_default();
        let policy = self.merge_policy();

        let item = self.edit_draft(table_id, |draft| {
            let matching = match policy {
                MergePolicy::MergeMatching => draft.items.iter_mut().find(|i| {
                    i.is_draft() && i.notes.is_none() && i.same_configuration(product, &modifiers)
                }),
                MergePolicy::AlwaysNewLine => None,
            };
            match matching {
                Some(line) => {
                    money::validate_quantity(line.quantity + 1)?;
                    line.quantity += 1;
                    Ok(line.clone())
                }
                None => {
                    let line = OrderItem::from_product(product, modifiers);
                    draft.items.push(line.clone());
                    Ok(line)
                }
            }
        })?;

        tracing::debug!(
            table_id = %table_id,
            product_id = %product.id,
            unique_id = %item.unique_id,
            quantity = item.quantity,
            "Item added to draft"
        );
        Ok(item)
    }

    pub fn remove_item(&self, table_id: &EntityId, unique_id: &str) -> StoreResult<OrderItem> {
        self.edit_item(table_id, unique_id, |draft, index| Ok(Some(draft.items.remove(index))))
            .and_then(|removed| removed.ok_or_else(|| StoreError::Internal("removed item vanished".into())))
    }

    /// Adjust quantity by `delta`; at zero or below the line is removed
    ///
    /// Returns the updated line, or `None` when it was removed.
    pub fn change_quantity(&self, table_id: &EntityId, unique_id: &str, delta: i32) -> StoreResult<Option<OrderItem>> {
        self.edit_item(table_id, unique_id, |draft, index| {
            let quantity = draft.items[index].quantity.saturating_add(delta);
            if quantity <= 0 {
                draft.items.remove(index);
                return Ok(None);
            }
            money::validate_quantity(quantity)?;
            draft.items[index].quantity = quantity;
            Ok(Some(draft.items[index].clone()))
        })
    }

    /// Set or clear (empty text) the line note
    pub fn set_note(&self, table_id: &EntityId, unique_id: &str, text: &str) -> StoreResult<OrderItem> {
        let note = Some(text.trim()).filter(|t| !t.is_empty()).map(str::to_string);
        self.edit_item(table_id, unique_id, |draft, index| {
            draft.items[index].notes = note;
            Ok(Some(draft.items[index].clone()))
        })
        .and_then(|item| item.ok_or_else(|| StoreError::Internal("noted item vanished".into())))
    }

    /// Mutate one draft line; dispatched lines are immutable
    fn edit_item<R>(
        &self,
        table_id: &EntityId,
        unique_id: &str,
        f: impl FnOnce(&mut OrderDraft, usize) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let location = self.read(|s| locate(s, table_id, unique_id));
        match location {
            ItemLocation::Dispatched => return Err(StoreError::ImmutableItem(unique_id.to_string())),
            ItemLocation::Missing => return Err(StoreError::not_found(EntityKind::Draft, unique_id)),
            ItemLocation::Draft => {}
        }
        self.edit_draft(table_id, |draft| {
            let index = draft
                .position(unique_id)
                .ok_or_else(|| StoreError::not_found(EntityKind::Draft, unique_id))?;
            f(draft, index)
        })
    }

    /// Apply `f` to a table's draft under the write lock
    ///
    /// Bumps the version and keeps `opened_at` in step with emptiness. No
    /// notice is emitted when `f` fails.
    fn edit_draft<R>(&self, table_id: &EntityId, f: impl FnOnce(&mut OrderDraft) -> StoreResult<R>) -> StoreResult<R> {
        let result = self.write(|s| -> StoreResult<R> {
            if s.table(table_id).is_none() {
                return Err(StoreError::not_found(EntityKind::Table, table_id));
            }
            let draft = s.drafts.entry(table_id.clone()).or_default();
            let mut working = draft.clone();
            let result = f(&mut working)?;
            working.version = draft.version + 1;
            if working.is_empty() {
                working.opened_at = None;
            } else if working.opened_at.is_none() {
                working.opened_at = Some(shared::util::now_millis());
            }
            *draft = working;
            Ok(result)
        })?;
        self.emit(EntityKind::Draft, ChangeAction::Updated, Some(table_id.clone()));
        Ok(result)
    }
}
