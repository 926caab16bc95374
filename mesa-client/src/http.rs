//! HTTP backend for the remote store
//!
//! Talks to a PostgREST-style REST API (`{base}/rest/v1/{collection}`).
//! Change notifications come from a polling watcher that fingerprints each
//! collection and emits a [`ChangeSignal`] whenever the fingerprint moves.

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::types::EntityId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::store::{ChangeSignal, Collection, RemoteStore, Row};
use crate::{ClientConfig, ClientError, ClientResult};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// HTTP client for the remote store
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
    changes: broadcast::Sender<ChangeSignal>,
    /// Last seen fingerprint per collection
    fingerprints: Arc<DashMap<Collection, u64>>,
}

impl HttpStore {
    /// Create a new HTTP store from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            poll_interval: config.poll_interval,
            changes,
            fingerprints: Arc::new(DashMap::new()),
        })
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.table_name())
    }

    fn row_url(&self, collection: Collection, id: &EntityId) -> String {
        format!("{}?id=eq.{}", self.collection_url(collection), id)
    }

    /// Attach `apikey` + bearer headers
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request
                .header("apikey", key)
                .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", key)),
            None => request,
        }
    }

    /// Call a remote procedure (`{base}/rest/v1/rpc/{name}`)
    pub async fn rpc<T: DeserializeOwned, B: Serialize>(&self, name: &str, body: &B) -> ClientResult<T> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, name);
        let response = self.authorize(self.client.post(&url).json(body)).send().await?;
        Self::handle_response(response).await
    }

    /// Handle the HTTP response
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            return match status {
                StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                StatusCode::FORBIDDEN => Err(ClientError::Forbidden(text)),
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(text)),
                StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                    Err(ClientError::Validation(text))
                }
                StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
                    Err(ClientError::Unavailable(text))
                }
                _ => Err(ClientError::Internal(text)),
            };
        }

        response.json().await.map_err(Into::into)
    }

    /// PostgREST returns the affected rows as an array
    fn first_row(rows: Vec<Row>, what: &str) -> ClientResult<Row> {
        rows.into_iter()
            .next()
            .ok_or_else(|| ClientError::InvalidResponse(format!("{} returned no row", what)))
    }

    // ========== Change watcher ==========

    /// Spawn the polling change watcher
    ///
    /// The first poll only records fingerprints; later polls emit a signal
    /// for each collection whose contents moved.
    pub fn spawn_watcher(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            tracing::info!(interval_ms = store.poll_interval.as_millis() as u64, "Change watcher started");
            let mut interval = tokio::time::interval(store.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Change watcher received shutdown signal");
                        break;
                    }
                    _ = interval.tick() => {
                        store.poll_once().await;
                    }
                }
            }
        })
    }

    async fn poll_once(&self) {
        for collection in Collection::ALL {
            let rows = match self.select(collection).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::debug!(collection = %collection, error = %e, "Change poll failed");
                    continue;
                }
            };
            let fingerprint = fingerprint(&rows);
            let previous = self.fingerprints.insert(collection, fingerprint);
            if matches!(previous, Some(p) if p != fingerprint) {
                tracing::debug!(collection = %collection, "Remote change detected");
                // No receivers is fine
                let _ = self.changes.send(ChangeSignal { collection });
            }
        }
    }
}

/// Order-insensitive content hash of a collection
fn fingerprint(rows: &[Row]) -> u64 {
    let mut hashes: Vec<u64> = rows
        .iter()
        .map(|row| {
            let mut hasher = DefaultHasher::new();
            Value::Object(row.clone()).to_string().hash(&mut hasher);
            hasher.finish()
        })
        .collect();
    hashes.sort_unstable();
    let mut hasher = DefaultHasher::new();
    hashes.hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn select(&self, collection: Collection) -> ClientResult<Vec<Row>> {
        let url = format!("{}?select=*", self.collection_url(collection));
        let response = self.authorize(self.client.get(&url)).send().await?;
        Self::handle_response(response).await
    }

    async fn insert(&self, collection: Collection, row: Row) -> ClientResult<Row> {
        let response = self
            .authorize(self.client.post(self.collection_url(collection)))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        let rows: Vec<Row> = Self::handle_response(response).await?;
        Self::first_row(rows, "insert")
    }

    async fn update(&self, collection: Collection, id: &EntityId, patch: Row) -> ClientResult<Row> {
        let response = self
            .authorize(self.client.patch(self.row_url(collection, id)))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        let rows: Vec<Row> = Self::handle_response(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound(format!("{}/{}", collection, id)))
    }

    async fn update_if_null(
        &self,
        collection: Collection,
        id: &EntityId,
        column: &str,
        patch: Row,
    ) -> ClientResult<Option<Row>> {
        let url = format!("{}&{}=is.null", self.row_url(collection, id), column);
        let response = self
            .authorize(self.client.patch(&url))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        let rows: Vec<Row> = Self::handle_response(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, collection: Collection, id: &EntityId) -> ClientResult<()> {
        let response = self
            .authorize(self.client.delete(self.row_url(collection, id)))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await?;
        match status {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(text)),
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            _ => Err(ClientError::Internal(text)),
        }
    }

    fn changes(&self) -> broadcast::Receiver<ChangeSignal> {
        self.changes.subscribe()
    }
}
