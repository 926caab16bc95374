//! Invoice numbering and event printing (发票号分配)

use mesa_client::Collection;
use serde_json::{Map, Value};
use shared::message::{ChangeAction, EntityKind};
use shared::models::{EventBudget, VenueInfo};
use shared::types::EntityId;

use crate::printing::EventDocument;
use crate::store::{EntityStore, StoreError, StoreResult, absorb_stored};

impl EntityStore {
    /// Venue record from the `venue_info` collection (default until loaded)
    pub fn venue_info(&self) -> VenueInfo {
        self.read(|s| s.venue.clone())
    }

    /// Give the event a fiscal invoice number, at most once
    ///
    /// An event that already has a number keeps it and the counter is not
    /// touched. Draws are serialized per store, so concurrent calls for the
    /// same event draw exactly once. Across terminals the remote row is
    /// re-read before drawing and the number is written only while the
    /// remote column is still empty; if another terminal won, its number is
    /// adopted. If the counter fails the event is left as it was. A number
    /// drawn but not stored is kept and reused by the next call.
    pub async fn assign_invoice_number(&self, id: &EntityId) -> StoreResult<i64> {
        let mut draws = self.inner.invoice_draws.lock().await;

        if let Some(number) = self.local_invoice_number(id)? {
            draws.remove(id);
            tracing::debug!(id = %id, invoice_number = number, "Invoice number already assigned");
            return Ok(number);
        }

        // another terminal may have assigned one since our last refetch
        if !id.is_local() {
            self.refresh(Collection::Agenda).await?;
            if let Some(number) = self.local_invoice_number(id)? {
                draws.remove(id);
                tracing::info!(id = %id, invoice_number = number, "Invoice number assigned by another terminal");
                return Ok(number);
            }
        }

        let number = match draws.get(id) {
            Some(&number) => {
                tracing::info!(id = %id, invoice_number = number, "Reusing drawn invoice number");
                number
            }
            None => {
                let number = self.inner.invoice_counter.next_invoice_number().await.map_err(|e| {
                    tracing::error!(id = %id, error = %e, "Invoice counter failed");
                    StoreError::InvoiceAssignment(e.to_string())
                })?;
                draws.insert(id.clone(), number);
                number
            }
        };

        if id.is_local() {
            // not visible to other terminals yet; the pending insert carries it
            let commit = self.begin_edit::<EventBudget>(id, |event| {
                event.invoice_number = Some(number);
                Ok(())
            })?;
            draws.remove(id);
            tracing::info!(id = %id, invoice_number = number, "Invoice number assigned");
            commit.wait().await?;
            return Ok(number);
        }

        let assigned = self.store_invoice_number(id, number).await?;
        draws.remove(id);
        Ok(assigned)
    }

    fn local_invoice_number(&self, id: &EntityId) -> StoreResult<Option<i64>> {
        self.read(|s| s.events.get(id).map(|e| e.invoice_number))
            .ok_or_else(|| StoreError::not_found(EntityKind::EventBudget, id))
    }

    /// Write-once remote write of a drawn number
    async fn store_invoice_number(&self, id: &EntityId, number: i64) -> StoreResult<i64> {
        let mut patch = Map::new();
        patch.insert("invoiceNumber".to_string(), Value::from(number));

        let stored: Option<EventBudget> = self
            .inner
            .remote
            .patch_if_unset(Collection::Agenda, id, "invoiceNumber", &patch)
            .await
            .map_err(|e| {
                tracing::error!(id = %id, invoice_number = number, error = %e, "Drawn invoice number could not be stored");
                StoreError::InvoiceAssignment(format!("invoice number {} not stored: {}", number, e))
            })?;

        match stored {
            Some(stored) => {
                self.write(|s| absorb_stored(s, id, stored));
                tracing::info!(id = %id, invoice_number = number, "Invoice number assigned");
                self.emit(EntityKind::EventBudget, ChangeAction::Updated, Some(id.clone()));
                Ok(number)
            }
            None => {
                // lost the race: the remote number stands
                self.refresh(Collection::Agenda).await?;
                let winner = self.local_invoice_number(id)?.ok_or_else(|| {
                    StoreError::InvoiceAssignment(format!("event {} has no stored invoice number", id))
                })?;
                tracing::warn!(
                    id = %id,
                    drawn = number,
                    invoice_number = winner,
                    "Invoice number already set remotely; drawn number unused"
                );
                Ok(winner)
            }
        }
    }

    /// Assign the invoice number, then hand the event to the printer
    pub async fn print_event_invoice(&self, id: &EntityId) -> StoreResult<i64> {
        let number = self.assign_invoice_number(id).await?;
        let document = self.read(|s| -> StoreResult<EventDocument> {
            let event = s
                .events
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::not_found(EntityKind::EventBudget, id))?;
            let menus = event
                .selected_menus
                .iter()
                .filter_map(|m| s.menus.get(&m.menu_id).map(|menu| (m.menu_id.clone(), menu.clone())))
                .collect();
            Ok(EventDocument {
                event,
                venue: s.venue.clone(),
                menus,
            })
        })?;

        let printer = self.inner.printer.clone();
        tokio::spawn(async move { printer.print_event(document).await });
        Ok(number)
    }
}
