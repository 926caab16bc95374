//! In-memory remote store
//!
//! A single [`MemoryStore`] shared by several engine instances simulates
//! several terminals against one backend. Writes are serialized by an
//! internal lock, every write broadcasts a [`ChangeSignal`], and failures can
//! be injected per operation.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shared::message::SyncOp;
use shared::types::EntityId;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::store::{ChangeSignal, Collection, RemoteStore, Row};
use crate::{ClientError, ClientResult};

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// Injected failure: fail the next matching operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FailureRule {
    op: SyncOp,
    collection: Option<Collection>,
}

#[derive(Debug)]
struct MemoryInner {
    rows: Mutex<HashMap<Collection, Vec<Row>>>,
    next_id: AtomicI64,
    changes: broadcast::Sender<ChangeSignal>,
    failures: Mutex<VecDeque<FailureRule>>,
    offline: AtomicBool,
    latency_ms: AtomicI64,
    calls: AtomicUsize,
}

/// In-process remote store
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                rows: Mutex::new(HashMap::new()),
                next_id: AtomicI64::new(1),
                changes,
                failures: Mutex::new(VecDeque::new()),
                offline: AtomicBool::new(false),
                latency_ms: AtomicI64::new(0),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    // ========== Test controls ==========

    /// Fail the next `op` on any collection
    pub fn fail_next(&self, op: SyncOp) {
        self.inner.failures.lock().push_back(FailureRule { op, collection: None });
    }

    /// Fail the next `op` on one collection
    pub fn fail_next_on(&self, op: SyncOp, collection: Collection) {
        self.inner.failures.lock().push_back(FailureRule {
            op,
            collection: Some(collection),
        });
    }

    /// Reject every request while offline
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every request by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as i64, Ordering::SeqCst);
    }

    /// Number of requests served (including failed ones)
    pub fn call_count(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a collection's rows
    pub fn rows(&self, collection: Collection) -> Vec<Row> {
        self.inner
            .rows
            .lock()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Write a row directly, as if another terminal had inserted it
    pub fn seed(&self, collection: Collection, row: Row) -> Row {
        let stored = self.store_new_row(collection, row);
        self.notify(collection);
        stored
    }

    /// Emit a change signal without changing anything (duplicate delivery)
    pub fn notify(&self, collection: Collection) {
        // No receivers is fine
        let _ = self.inner.changes.send(ChangeSignal { collection });
    }

    // ========== Internals ==========

    async fn enter(&self, op: SyncOp, collection: Collection) -> ClientResult<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency as u64)).await;
        }

        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable("memory store offline".to_string()));
        }

        let mut failures = self.inner.failures.lock();
        let hit = failures
            .iter()
            .position(|r| r.op == op && r.collection.is_none_or(|c| c == collection));
        if let Some(index) = hit {
            failures.remove(index);
            return Err(ClientError::Unavailable(format!(
                "injected {} failure on {}",
                op, collection
            )));
        }
        Ok(())
    }

    fn store_new_row(&self, collection: Collection, mut row: Row) -> Row {
        let needs_id = match row.get("id") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => EntityId::new(s).is_local(),
            Some(_) => false,
        };
        if needs_id {
            let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
            row.insert("id".to_string(), Value::from(id));
        }
        if row.get("created_at").is_none_or(Value::is_null) {
            row.insert(
                "created_at".to_string(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        self.inner
            .rows
            .lock()
            .entry(collection)
            .or_default()
            .push(row.clone());
        row
    }
}

fn row_id(row: &Row) -> Option<EntityId> {
    match row.get("id")? {
        Value::Number(n) => n.as_i64().map(EntityId::from),
        Value::String(s) => Some(EntityId::new(s)),
        _ => None,
    }
}

fn find_row<'a>(
    rows: &'a mut HashMap<Collection, Vec<Row>>,
    collection: Collection,
    id: &EntityId,
) -> ClientResult<&'a mut Row> {
    rows.get_mut(&collection)
        .and_then(|rows| rows.iter_mut().find(|r| row_id(r).as_ref() == Some(id)))
        .ok_or_else(|| ClientError::NotFound(format!("{}/{}", collection, id)))
}

fn apply_row_patch(row: &mut Row, patch: Row) {
    for (key, value) in patch {
        if key != "id" {
            row.insert(key, value);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, collection: Collection) -> ClientResult<Vec<Row>> {
        self.enter(SyncOp::Fetch, collection).await?;
        Ok(self.rows(collection))
    }

    async fn insert(&self, collection: Collection, row: Row) -> ClientResult<Row> {
        self.enter(SyncOp::Insert, collection).await?;
        let stored = self.store_new_row(collection, row);
        self.notify(collection);
        Ok(stored)
    }

    async fn update(&self, collection: Collection, id: &EntityId, patch: Row) -> ClientResult<Row> {
        self.enter(SyncOp::Update, collection).await?;
        let updated = {
            let mut rows = self.inner.rows.lock();
            let row = find_row(&mut rows, collection, id)?;
            apply_row_patch(row, patch);
            row.clone()
        };
        self.notify(collection);
        Ok(updated)
    }

    async fn update_if_null(
        &self,
        collection: Collection,
        id: &EntityId,
        column: &str,
        patch: Row,
    ) -> ClientResult<Option<Row>> {
        self.enter(SyncOp::Update, collection).await?;
        let updated = {
            let mut rows = self.inner.rows.lock();
            let Ok(row) = find_row(&mut rows, collection, id) else {
                return Ok(None);
            };
            if !row.get(column).is_none_or(Value::is_null) {
                return Ok(None);
            }
            apply_row_patch(row, patch);
            row.clone()
        };
        self.notify(collection);
        Ok(Some(updated))
    }

    async fn delete(&self, collection: Collection, id: &EntityId) -> ClientResult<()> {
        self.enter(SyncOp::Delete, collection).await?;
        {
            let mut rows = self.inner.rows.lock();
            if let Some(rows) = rows.get_mut(&collection) {
                rows.retain(|r| row_id(r).as_ref() != Some(id));
            }
        }
        self.notify(collection);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeSignal> {
        self.inner.changes.subscribe()
    }
}
