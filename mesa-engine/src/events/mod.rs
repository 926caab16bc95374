//! EventBudgetLifecycle - 宴会预算生命周期
//!
//! Events carry a derived `total` that is recomputed on every write:
//! `subtotal × (1 + tax_rate)` with VAT, `subtotal` without, where the
//! subtotal is the venue price for venue-only events and the frozen menu
//! prices times quantities otherwise.
//!
//! - status: any value may be set directly
//! - deposit: `Pending → Paid → Returned`, a receipt is printed on each step
//! - invoice number: drawn once, see [`invoice`]

mod invoice;
mod menus;

use chrono::Utc;
use shared::message::EntityKind;
use shared::models::{
    DepositMovement, DepositReceipt, DepositStatus, EventBudget, EventBudgetCreate, EventBudgetUpdate,
    EventStatus, EventTask, SelectedMenu,
};
use shared::types::EntityId;

use crate::orders::money;
use crate::store::{Commit, EntityStore, StoreError, StoreResult, apply_patch, to_object};

/// Recompute the derived total and validate money fields
fn finish(event: &mut EventBudget) -> StoreResult<()> {
    if event.name.trim().is_empty() {
        return Err(StoreError::Validation("event name is required".into()));
    }
    money::validate_event(event)?;
    event.total = money::event_total(event);
    Ok(())
}

impl EntityStore {
    // ========== Queries ==========

    /// All events by date
    pub fn events(&self) -> Vec<EventBudget> {
        let mut all: Vec<EventBudget> = self.read(|s| s.events.values().cloned().collect());
        all.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
        all
    }

    pub fn event(&self, id: &EntityId) -> Option<EventBudget> {
        self.read(|s| s.events.get(id).cloned())
    }

    // ========== Mutations ==========

    pub fn create_event(&self, input: EventBudgetCreate) -> StoreResult<Commit<EventBudget>> {
        let date = input
            .date
            .ok_or_else(|| StoreError::Validation("event date is required".into()))?;
        let mut event = EventBudget {
            id: EntityId::local(),
            name: input.name.trim().to_string(),
            date,
            guests: input.guests,
            is_venue_only: input.is_venue_only,
            venue_price: input.venue_price,
            selected_menus: input.selected_menus,
            tax_rate: input.tax_rate,
            has_vat: input.has_vat,
            total: 0.0,
            status: EventStatus::Draft,
            deposit_amount: input.deposit_amount,
            deposit_status: DepositStatus::Pending,
            tasks: Vec::new(),
            client_nif: input.client_nif.trim().to_string(),
            client_address: input.client_address.trim().to_string(),
            invoice_number: None,
            created_at: None,
        };
        finish(&mut event)?;
        tracing::info!(id = %event.id, name = %event.name, date = %event.date, total = event.total, "Event created");
        self.begin_insert(event)
    }

    /// Field-set update; the total is recomputed and sent along
    pub fn update_event(&self, id: &EntityId, update: EventBudgetUpdate) -> StoreResult<Commit<EventBudget>> {
        let patch = to_object(&update).unwrap_or_default();
        if patch.is_empty() {
            return Err(StoreError::Validation("nothing to update".into()));
        }
        self.edit_event(id, |event| {
            *event = apply_patch(event, &patch)?;
            Ok(())
        })
    }

    /// Set any status directly
    pub fn set_event_status(&self, id: &EntityId, status: EventStatus) -> StoreResult<Commit<EventBudget>> {
        tracing::info!(id = %id, status = ?status, "Event status set");
        self.edit_event(id, |event| {
            event.status = status;
            Ok(())
        })
    }

    /// Move the deposit forward and print the receipt
    pub fn set_deposit_status(&self, id: &EntityId, status: DepositStatus) -> StoreResult<Commit<EventBudget>> {
        let movement = match status {
            DepositStatus::Paid => DepositMovement::Received,
            // no step leads back to pending; rejected below
            DepositStatus::Returned | DepositStatus::Pending => DepositMovement::Returned,
        };
        let commit = self.edit_event(id, |event| {
            let allowed = matches!(
                (event.deposit_status, status),
                (DepositStatus::Pending, DepositStatus::Paid) | (DepositStatus::Paid, DepositStatus::Returned)
            );
            if !allowed {
                return Err(StoreError::DepositTransition {
                    from: format!("{:?}", event.deposit_status),
                    to: format!("{:?}", status),
                });
            }
            event.deposit_status = status;
            Ok(())
        })?;

        let event = commit.local();
        let receipt = DepositReceipt {
            event_id: event.id.clone(),
            event_name: event.name.clone(),
            client_nif: event.client_nif.clone(),
            amount: event.deposit_amount,
            movement,
            recorded_at: Utc::now(),
        };
        tracing::info!(id = %id, movement = ?movement, amount = receipt.amount, "Deposit movement recorded");
        let venue = self.venue_info();
        let printer = self.inner.printer.clone();
        tokio::spawn(async move { printer.print_deposit(receipt, venue).await });
        Ok(commit)
    }

    pub fn delete_event(&self, id: &EntityId) -> StoreResult<Commit<EventBudget>> {
        tracing::info!(id = %id, "Event deleted");
        self.begin_delete(id)
    }

    // ========== Tasks ==========

    pub fn add_event_task(&self, id: &EntityId, text: &str) -> StoreResult<Commit<EventBudget>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::Validation("task text is required".into()));
        }
        self.edit_event(id, |event| {
            event.tasks.push(EventTask {
                id: uuid::Uuid::new_v4().to_string(),
                text: text.to_string(),
                completed: false,
            });
            Ok(())
        })
    }

    pub fn toggle_event_task(&self, id: &EntityId, task_id: &str) -> StoreResult<Commit<EventBudget>> {
        self.edit_event(id, |event| {
            let task = event
                .tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or_else(|| StoreError::not_found(EntityKind::EventBudget, task_id))?;
            task.completed = !task.completed;
            Ok(())
        })
    }

    pub fn remove_event_task(&self, id: &EntityId, task_id: &str) -> StoreResult<Commit<EventBudget>> {
        self.edit_event(id, |event| {
            let before = event.tasks.len();
            event.tasks.retain(|t| t.id != task_id);
            if event.tasks.len() == before {
                return Err(StoreError::not_found(EntityKind::EventBudget, task_id));
            }
            Ok(())
        })
    }

    // ========== Menus ==========

    /// Select a menu for `quantity` guests; 0 removes it
    ///
    /// The unit price is frozen from the menu when first selected; changing
    /// the quantity later keeps it.
    pub fn select_event_menu(&self, id: &EntityId, menu_id: &EntityId, quantity: i32) -> StoreResult<Commit<EventBudget>> {
        if quantity < 0 {
            return Err(StoreError::Validation(format!("quantity must not be negative, got {}", quantity)));
        }
        let menu = self
            .event_menu(menu_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::EventMenu, menu_id))?;

        self.edit_event(id, |event| {
            let position = event.selected_menus.iter().position(|m| &m.menu_id == menu_id);
            match (position, quantity) {
                (Some(index), 0) => {
                    event.selected_menus.remove(index);
                }
                (Some(index), quantity) => event.selected_menus[index].quantity = quantity,
                (None, 0) => {}
                (None, quantity) => {
                    if menu_id.is_local() {
                        return Err(StoreError::Validation("menu is not saved yet".into()));
                    }
                    if !menu.active {
                        return Err(StoreError::Validation(format!("menu '{}' is inactive", menu.name)));
                    }
                    event.selected_menus.push(SelectedMenu {
                        menu_id: menu_id.clone(),
                        quantity,
                        unit_price: menu.price_per_person,
                    });
                }
            }
            Ok(())
        })
    }

    /// Every event edit goes through here so the total never goes stale
    fn edit_event(
        &self,
        id: &EntityId,
        edit: impl FnOnce(&mut EventBudget) -> StoreResult<()>,
    ) -> StoreResult<Commit<EventBudget>> {
        self.begin_edit::<EventBudget>(id, |event| {
            edit(event)?;
            finish(event)
        })
    }
}
