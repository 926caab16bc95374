//! 集成测试公共工具

#![allow(dead_code)]

use mesa_client::{MemoryInvoiceCounter, MemoryStore};
use mesa_engine::{EntityStore, MemoryPrinter, StoreOptions, TableSeed};
use shared::order::{MergePolicy, ProductRef};
use shared::types::EntityId;
use std::sync::Arc;
use std::time::Duration;

/// One terminal wired to a shared in-memory backend
pub struct Terminal {
    pub store: EntityStore,
    pub remote: MemoryStore,
    pub counter: Arc<MemoryInvoiceCounter>,
    pub printer: MemoryPrinter,
}

pub fn layout() -> Vec<TableSeed> {
    [("Sala", "1"), ("Sala", "2"), ("Terraza", "T1"), ("Barra", "B1")]
        .into_iter()
        .map(|(zone, name)| TableSeed {
            zone: zone.into(),
            name: name.into(),
        })
        .collect()
}

pub fn terminal() -> Terminal {
    terminal_on(MemoryStore::new(), "terminal-1", MergePolicy::MergeMatching)
}

pub fn terminal_with_policy(policy: MergePolicy) -> Terminal {
    terminal_on(MemoryStore::new(), "terminal-1", policy)
}

/// A second terminal against the same backend
pub fn terminal_on(remote: MemoryStore, terminal_id: &str, policy: MergePolicy) -> Terminal {
    terminal_sharing(
        remote,
        terminal_id,
        policy,
        Arc::new(MemoryInvoiceCounter::starting_at(1000)),
    )
}

/// A terminal sharing both the backend and the invoice counter
pub fn terminal_sharing(
    remote: MemoryStore,
    terminal_id: &str,
    policy: MergePolicy,
    counter: Arc<MemoryInvoiceCounter>,
) -> Terminal {
    let printer = MemoryPrinter::new();
    let store = EntityStore::new(
        Arc::new(remote.clone()),
        counter.clone(),
        StoreOptions {
            terminal_id: terminal_id.to_string(),
            merge_policy: policy,
            tables: layout(),
            printer: Arc::new(printer.clone()),
        },
    );
    Terminal {
        store,
        remote,
        counter,
        printer,
    }
}

pub fn table(n: i64) -> EntityId {
    EntityId::from(n)
}

pub fn product(id: i64, name: &str, price: f64) -> ProductRef {
    ProductRef {
        id: EntityId::from(id),
        name: name.to_string(),
        price,
    }
}

/// Wait until every spawned commit has been reconciled or flagged
pub async fn settle(store: &EntityStore) {
    for _ in 0..1000 {
        if store.pending_ops().iter().all(|op| op.is_failed()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("commits did not settle: {:?}", store.pending_ops());
}

/// Poll `check` until it holds
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached");
}
