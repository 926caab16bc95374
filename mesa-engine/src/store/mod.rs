//! EntityStore - 终端本地实体缓存
//!
//! Authoritative in-memory cache of tables, drafts, kitchen tickets, bills,
//! reservations, events and event menus for one terminal.
//!
//! # Mutation Flow
//!
//! ```text
//! mutation(input)
//!     ├─ 1. Validate locally (no network)
//!     ├─ 2. Apply to cache under the write lock (optimistic)
//!     ├─ 3. Record PendingOp in the ledger (OpId)
//!     ├─ 4. Notify observers
//!     └─ 5. Spawn remote commit ──► confirm: reconcile server fields
//!                                  └► fail: revert insert / flag update+delete
//! ```
//!
//! The remote half runs on its own task: dropping the caller's future never
//! cancels a write already handed to the remote.
//!
//! Remote-origin changes arrive as change signals and trigger a full
//! re-fetch of the collection, merged with local intent from the ledger
//! (see [`merge`]).

mod commit;
mod error;
pub mod ledger;
pub mod listener;
mod merge;
pub mod observers;
mod state;

pub use commit::Commit;
pub use error::{StoreError, StoreResult, SyncError};
pub use ledger::{OpAction, OpId, OpStatus, PendingOp};
pub use listener::SyncListener;
pub use observers::{ObserverRegistry, StoreEvent, Subscription};
pub use state::StoreState;

pub(crate) use commit::{absorb_stored, apply_patch, stage_delete, stage_insert, stage_update};
pub(crate) use state::to_object;

use mesa_client::{Collection, InvoiceCounter, RemoteStore, RemoteSyncClient};
use parking_lot::RwLock;
use shared::message::{ChangeAction, ChangeNotice, EntityKind, SyncFailure};
use shared::models::{DiningTable, EventBudget, EventMenu, Reservation};
use shared::order::{KitchenTicket, MergePolicy};
use shared::types::EntityId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, broadcast};

use crate::core::{Config, TableSeed};
use crate::printing::{LogPrinter, PrintService};

/// Change broadcast channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Construction options
#[derive(Clone)]
pub struct StoreOptions {
    /// Written on every kitchen ticket this terminal sends
    pub terminal_id: String,
    pub merge_policy: MergePolicy,
    /// Initial floor layout; seeded tables get ids `1..=n` in order so every
    /// terminal configured with the same layout agrees on table ids
    pub tables: Vec<TableSeed>,
    pub printer: Arc<dyn PrintService>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            terminal_id: "terminal-1".to_string(),
            merge_policy: MergePolicy::default(),
            tables: Vec::new(),
            printer: Arc::new(LogPrinter),
        }
    }
}

impl StoreOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            terminal_id: config.terminal_id.clone(),
            merge_policy: config.merge_policy,
            tables: config.tables.clone(),
            ..Default::default()
        }
    }
}

pub(crate) struct StoreInner {
    pub(crate) state: RwLock<StoreState>,
    pub(crate) remote: RemoteSyncClient,
    pub(crate) observers: ObserverRegistry,
    pub(crate) event_tx: broadcast::Sender<ChangeNotice>,
    pub(crate) invoice_counter: Arc<dyn InvoiceCounter>,
    /// Serializes invoice number draws; holds numbers drawn but not yet stored
    pub(crate) invoice_draws: Mutex<HashMap<EntityId, i64>>,
    pub(crate) printer: Arc<dyn PrintService>,
    pub(crate) terminal_id: String,
    pub(crate) merge_policy: MergePolicy,
    revision: AtomicU64,
}

/// Terminal entity store; cheap to clone
#[derive(Clone)]
pub struct EntityStore {
    pub(crate) inner: Arc<StoreInner>,
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("terminal_id", &self.inner.terminal_id)
            .field("revision", &self.revision())
            .field("observers", &self.inner.observers)
            .finish()
    }
}

impl EntityStore {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        invoice_counter: Arc<dyn InvoiceCounter>,
        options: StoreOptions,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = StoreState {
            tables: seed_tables(&options.tables),
            ..Default::default()
        };
        tracing::info!(
            terminal_id = %options.terminal_id,
            tables = state.tables.len(),
            merge_policy = ?options.merge_policy,
            "EntityStore created"
        );
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(state),
                remote: RemoteSyncClient::new(remote),
                observers: ObserverRegistry::new(),
                event_tx,
                invoice_counter,
                invoice_draws: Mutex::new(HashMap::new()),
                printer: options.printer,
                terminal_id: options.terminal_id,
                merge_policy: options.merge_policy,
                revision: AtomicU64::new(0),
            }),
        }
    }

    pub fn terminal_id(&self) -> &str {
        &self.inner.terminal_id
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.inner.merge_policy
    }

    /// Monotonic change counter
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::SeqCst)
    }

    // ========== Observers ==========

    /// Observe changes to one entity kind; drop the handle to unsubscribe
    pub fn subscribe<F>(&self, kind: EntityKind, callback: F) -> Subscription
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(kind, callback)
    }

    /// Observe remote write failures
    pub fn subscribe_sync_errors<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncFailure) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe_sync_errors(callback)
    }

    /// Async stream of every change notice
    pub fn change_notices(&self) -> broadcast::Receiver<ChangeNotice> {
        self.inner.event_tx.subscribe()
    }

    // ========== Ledger ==========

    /// Remote writes not yet confirmed, oldest first
    pub fn pending_ops(&self) -> Vec<PendingOp> {
        self.read(|s| s.ledger.all().to_vec())
    }

    /// Whether an entity has a failed remote write waiting for retry/discard
    pub fn is_flagged(&self, id: &EntityId) -> bool {
        self.read(|s| s.ledger.is_flagged(id))
    }

    /// Re-issue a failed operation
    pub async fn retry(&self, op_id: OpId) -> StoreResult<()> {
        let collection = self.read(|s| match s.ledger.get(op_id) {
            Some(op) if op.is_failed() => Ok(op.collection),
            Some(_) => Err(StoreError::Validation(format!("operation {} is still in flight", op_id))),
            None => Err(StoreError::Internal(format!("unknown operation {}", op_id))),
        })?;
        tracing::info!(op_id = %op_id, collection = %collection, "Retrying failed operation");
        match collection {
            Collection::Reservations => self.retry_typed::<Reservation>(op_id).await,
            Collection::Agenda => self.retry_typed::<EventBudget>(op_id).await,
            Collection::EventMenus => self.retry_typed::<EventMenu>(op_id).await,
            Collection::KitchenTickets => self.retry_typed::<KitchenTicket>(op_id).await,
            Collection::VenueInfo => Err(StoreError::Internal("venue info is read-only".into())),
        }
    }

    /// Drop a failed operation and restore remote truth for its collection
    pub async fn discard(&self, op_id: OpId) -> StoreResult<()> {
        let removed = self.write(|s| match s.ledger.get(op_id) {
            Some(op) if op.is_failed() => Ok(s.ledger.remove(op_id)),
            Some(_) => Err(StoreError::Validation(format!("operation {} is still in flight", op_id))),
            None => Ok(None),
        })?;
        let Some(op) = removed else {
            return Ok(());
        };
        tracing::info!(op_id = %op_id, kind = %op.kind, id = %op.entity_id, "Discarded failed operation");
        self.refresh(op.collection).await
    }

    // ========== Internals ==========

    pub(crate) fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let state = self.inner.state.read();
        f(&state)
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.inner.state.write();
        f(&mut state)
    }

    /// Publish a change notice; never call with the state lock held
    pub(crate) fn emit(&self, kind: EntityKind, action: ChangeAction, id: Option<EntityId>) {
        let revision = self.inner.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let notice = ChangeNotice {
            kind,
            action,
            id,
            revision,
        };
        // No receivers is fine
        let _ = self.inner.event_tx.send(notice.clone());
        self.inner.observers.publish(&notice);
    }

    pub(crate) fn report_sync_failure(&self, failure: SyncFailure) {
        tracing::error!(
            op = %failure.op,
            kind = %failure.kind,
            id = ?failure.id.as_ref().map(EntityId::as_str),
            reverted = failure.reverted,
            error = %failure.message,
            "Remote sync failed"
        );
        self.inner.observers.publish_sync_failure(&failure);
    }
}

/// Seeded tables get positional ids
fn seed_tables(layout: &[TableSeed]) -> Vec<DiningTable> {
    layout
        .iter()
        .enumerate()
        .map(|(index, seed)| DiningTable {
            id: EntityId::from(index as i64 + 1),
            name: seed.name.clone(),
            zone: seed.zone.clone(),
            is_manually_reserved: false,
        })
        .collect()
}
