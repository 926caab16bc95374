//! Print collaborator
//!
//! Finalized event invoices and deposit receipts are handed to a
//! [`PrintService`]. Printing is fire-and-forget: the store spawns the call
//! and never waits on it or fails because of it.

pub mod renderer;

pub use renderer::DocumentRenderer;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::models::{DepositReceipt, EventBudget, EventMenu, VenueInfo};
use shared::types::EntityId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything needed to print an event invoice
#[derive(Debug, Clone, PartialEq)]
pub struct EventDocument {
    pub event: EventBudget,
    pub venue: VenueInfo,
    /// Menus referenced by the event, for line names
    pub menus: BTreeMap<EntityId, EventMenu>,
}

#[async_trait]
pub trait PrintService: Send + Sync {
    async fn print_event(&self, document: EventDocument);
    async fn print_deposit(&self, receipt: DepositReceipt, venue: VenueInfo);
}

/// Default printer: renders the document into the log
#[derive(Debug, Default)]
pub struct LogPrinter;

#[async_trait]
impl PrintService for LogPrinter {
    async fn print_event(&self, document: EventDocument) {
        let text = DocumentRenderer::default().render_event(&document.event, &document.venue, &document.menus);
        tracing::info!(
            event_id = %document.event.id,
            invoice_number = ?document.event.invoice_number,
            "Event invoice printed\n{}",
            text
        );
    }

    async fn print_deposit(&self, receipt: DepositReceipt, venue: VenueInfo) {
        let text = DocumentRenderer::default().render_deposit(&receipt, &venue);
        tracing::info!(
            event_id = %receipt.event_id,
            movement = ?receipt.movement,
            amount = receipt.amount,
            "Deposit receipt printed\n{}",
            text
        );
    }
}

/// Printed document kept by [`MemoryPrinter`]
#[derive(Debug, Clone, PartialEq)]
pub enum PrintJob {
    Event(EventDocument),
    Deposit { receipt: DepositReceipt, venue: VenueInfo },
}

/// Records every job (打印记录，测试用)
#[derive(Debug, Default, Clone)]
pub struct MemoryPrinter {
    jobs: Arc<Mutex<Vec<PrintJob>>>,
}

impl MemoryPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<PrintJob> {
        self.jobs.lock().clone()
    }
}

#[async_trait]
impl PrintService for MemoryPrinter {
    async fn print_event(&self, document: EventDocument) {
        self.jobs.lock().push(PrintJob::Event(document));
    }

    async fn print_deposit(&self, receipt: DepositReceipt, venue: VenueInfo) {
        self.jobs.lock().push(PrintJob::Deposit { receipt, venue });
    }
}
