//! Typed remote sync client
//!
//! Speaks entity types on top of a [`RemoteStore`]; every row crossing the
//! boundary goes through [`crate::wire`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared::types::EntityId;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::store::{ChangeSignal, Collection, RemoteStore};
use crate::{ClientResult, wire};

/// Typed CRUD + change subscription against the remote store
#[derive(Debug, Clone)]
pub struct RemoteSyncClient {
    remote: Arc<dyn RemoteStore>,
}

impl RemoteSyncClient {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Fetch and decode a whole collection
    ///
    /// Rows that cannot be decoded are skipped and logged.
    pub async fn fetch_all<T: DeserializeOwned>(&self, collection: Collection) -> ClientResult<Vec<T>> {
        let rows = self.remote.select(collection).await?;
        let total = rows.len();
        let mut entities = Vec::with_capacity(total);
        for row in rows {
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            match wire::from_row::<T>(row) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    tracing::warn!(collection = %collection, id = %id, error = %e, "Skipping undecodable row");
                }
            }
        }
        tracing::debug!(collection = %collection, total, decoded = entities.len(), "Fetched collection");
        Ok(entities)
    }

    /// Insert an entity; returns it with server-assigned fields
    ///
    /// Locally minted ids are not sent; the remote assigns the real one.
    pub async fn create<T>(&self, collection: Collection, entity: &T) -> ClientResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut row = wire::to_row(entity)?;
        let local_id = matches!(row.get("id"), Some(Value::String(s)) if EntityId::new(s).is_local());
        if local_id {
            row.remove("id");
        }
        if row.get("created_at").is_some_and(Value::is_null) {
            row.remove("created_at");
        }
        let stored = self.remote.insert(collection, row).await?;
        wire::from_row(stored)
    }

    /// Apply a camelCase field-set patch; returns the stored entity
    pub async fn patch<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &EntityId,
        patch: &Map<String, Value>,
    ) -> ClientResult<T> {
        let row = wire::encode_object(patch);
        let stored = self.remote.update(collection, id, row).await?;
        wire::from_row(stored)
    }

    /// Patch a write-once field; `None` if the remote already holds a value
    pub async fn patch_if_unset<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &EntityId,
        field: &str,
        patch: &Map<String, Value>,
    ) -> ClientResult<Option<T>> {
        let row = wire::encode_object(patch);
        let column = wire::camel_to_snake(field);
        match self.remote.update_if_null(collection, id, &column, row).await? {
            Some(stored) => wire::from_row(stored).map(Some),
            None => Ok(None),
        }
    }

    pub async fn remove(&self, collection: Collection, id: &EntityId) -> ClientResult<()> {
        self.remote.delete(collection, id).await
    }

    pub fn changes(&self) -> broadcast::Receiver<ChangeSignal> {
        self.remote.changes()
    }
}
