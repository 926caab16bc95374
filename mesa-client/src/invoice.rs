//! Invoice numbering collaborator
//!
//! Fiscal invoice numbers come from one monotonically increasing counter
//! shared by every terminal. Callers must draw at most one number per event.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use crate::{ClientError, ClientResult, HttpStore};

/// Shared invoice counter
#[async_trait]
pub trait InvoiceCounter: Send + Sync + fmt::Debug {
    /// Draw the next number; each successful call consumes one
    async fn next_invoice_number(&self) -> ClientResult<i64>;
}

/// Counter backed by a remote procedure on the HTTP store
#[derive(Debug, Clone)]
pub struct HttpInvoiceCounter {
    store: HttpStore,
    rpc: String,
}

impl HttpInvoiceCounter {
    pub fn new(store: HttpStore, rpc: impl Into<String>) -> Self {
        Self {
            store,
            rpc: rpc.into(),
        }
    }
}

#[async_trait]
impl InvoiceCounter for HttpInvoiceCounter {
    async fn next_invoice_number(&self) -> ClientResult<i64> {
        let value: Value = self.store.rpc(&self.rpc, &serde_json::json!({})).await?;
        parse_counter_value(&value)
    }
}

/// The RPC may answer with a bare number or a one-row result
fn parse_counter_value(value: &Value) -> ClientResult<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ClientError::InvalidResponse(format!("invoice number {} is not an integer", n))),
        Value::Array(rows) if rows.len() == 1 => parse_counter_value(&rows[0]),
        Value::Object(map) if map.len() == 1 => match map.values().next() {
            Some(inner) => parse_counter_value(inner),
            None => Err(ClientError::InvalidResponse("empty invoice number".to_string())),
        },
        other => Err(ClientError::InvalidResponse(format!(
            "unexpected invoice number payload: {}",
            other
        ))),
    }
}

/// In-process counter
#[derive(Debug)]
pub struct MemoryInvoiceCounter {
    next: AtomicI64,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryInvoiceCounter {
    /// Counter whose first number is `first`
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Number of times the counter was asked for a number
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for MemoryInvoiceCounter {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

#[async_trait]
impl InvoiceCounter for MemoryInvoiceCounter {
    async fn next_invoice_number(&self) -> ClientResult<i64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable("invoice counter unavailable".to_string()));
        }
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }
}
