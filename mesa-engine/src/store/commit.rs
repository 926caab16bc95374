//! Two-phase commit machinery
//!
//! `stage_*` functions apply the local half of a mutation inside a write
//! lock and record the op in the ledger; [`EntityStore::launch`] spawns the
//! remote half. The remote half reconciles into the store on its own task.

use mesa_client::ClientError;
use serde_json::{Map, Value};
use shared::error::ErrorCode;
use shared::message::{ChangeAction, SyncFailure};
use shared::types::EntityId;
use std::fmt;
use tokio::task::JoinHandle;

use super::ledger::{OpAction, OpId, OpStatus, PendingOp};
use super::state::{StoreState, Synced, diff_fields, overlay, to_object};
use super::{EntityStore, StoreError, StoreResult, SyncError};

/// Handle on a mutation whose local half is applied
pub enum Commit<T> {
    /// Nothing to send (terminal-local entity or unconfirmed local id)
    Local(T),
    Remote {
        op_id: OpId,
        local: T,
        handle: JoinHandle<StoreResult<Option<T>>>,
    },
}

impl<T: fmt::Debug> fmt::Debug for Commit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Commit::Local(v) => f.debug_tuple("Local").field(v).finish(),
            Commit::Remote { op_id, local, .. } => f
                .debug_struct("Remote")
                .field("op_id", op_id)
                .field("local", local)
                .finish_non_exhaustive(),
        }
    }
}

impl<T> Commit<T> {
    /// The value as applied locally
    pub fn local(&self) -> &T {
        match self {
            Commit::Local(v) => v,
            Commit::Remote { local, .. } => local,
        }
    }

    pub fn op_id(&self) -> Option<OpId> {
        match self {
            Commit::Local(_) => None,
            Commit::Remote { op_id, .. } => Some(*op_id),
        }
    }

    /// Wait for the remote half; returns the reconciled value
    pub async fn wait(self) -> StoreResult<T> {
        match self {
            Commit::Local(v) => Ok(v),
            Commit::Remote { local, handle, .. } => match handle.await {
                Ok(Ok(Some(confirmed))) => Ok(confirmed),
                Ok(Ok(None)) => Ok(local),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(StoreError::Internal(format!("commit task failed: {}", e))),
            },
        }
    }
}

// ========== Local half ==========

/// Insert locally and record the op
pub(crate) fn stage_insert<T: Synced>(state: &mut StoreState, entity: &T) -> StoreResult<OpId> {
    let payload = to_object(entity)
        .ok_or_else(|| StoreError::Internal(format!("{} is not an object", T::KIND)))?;
    let id = entity.id().clone();
    T::slot_mut(state).insert(id.clone(), entity.clone());
    Ok(state.ledger.push(PendingOp::new(
        T::COLLECTION,
        T::KIND,
        id,
        OpAction::Insert { payload },
    )))
}

/// Apply a field-set patch locally and record the op
///
/// Entities still carrying a local id are not patched remotely: the
/// in-flight insert picks the edit up when it is confirmed.
pub(crate) fn stage_update<T: Synced>(
    state: &mut StoreState,
    id: &EntityId,
    patch: Map<String, Value>,
) -> StoreResult<(T, Option<OpId>)> {
    let current = T::slot(state)
        .get(id)
        .cloned()
        .ok_or_else(|| StoreError::not_found(T::KIND, id))?;
    let updated = apply_patch(&current, &patch)?;
    T::slot_mut(state).insert(id.clone(), updated.clone());
    if id.is_local() {
        return Ok((updated, None));
    }
    let op_id = state.ledger.push(PendingOp::new(
        T::COLLECTION,
        T::KIND,
        id.clone(),
        OpAction::Update { patch },
    ));
    Ok((updated, Some(op_id)))
}

/// Remove locally and record the op
pub(crate) fn stage_delete<T: Synced>(state: &mut StoreState, id: &EntityId) -> StoreResult<(T, Option<OpId>)> {
    let removed = T::slot_mut(state)
        .remove(id)
        .ok_or_else(|| StoreError::not_found(T::KIND, id))?;
    state.ledger.drop_failed_updates(T::COLLECTION, id);
    if id.is_local() {
        // confirm_insert issues the remote delete once the row has an id
        return Ok((removed, None));
    }
    let op_id = state.ledger.push(PendingOp::new(T::COLLECTION, T::KIND, id.clone(), OpAction::Delete));
    Ok((removed, Some(op_id)))
}

/// Patch an entity through its camelCase object form
pub(crate) fn apply_patch<T: Synced>(entity: &T, patch: &Map<String, Value>) -> StoreResult<T> {
    let mut object = to_object(entity)
        .ok_or_else(|| StoreError::Internal(format!("{} is not an object", T::KIND)))?;
    for (key, value) in patch {
        if key == "id" {
            return Err(StoreError::Validation("id cannot be patched".into()));
        }
        object.insert(key.clone(), value.clone());
    }
    serde_json::from_value(Value::Object(object))
        .map_err(|e| StoreError::Validation(format!("invalid {} patch: {}", T::KIND, e)))
}

/// Remote row wins, then still-pending patches go on top
///
/// `None` if the entity was deleted locally meanwhile.
pub(crate) fn absorb_stored<T: Synced>(state: &mut StoreState, id: &EntityId, stored: T) -> Option<T> {
    if !T::slot(state).contains_key(id) {
        return None;
    }
    let pending: Vec<Map<String, Value>> = state
        .ledger
        .patches_for(T::COLLECTION, id, None)
        .cloned()
        .collect();
    let merged = overlay(stored, pending.iter());
    T::slot_mut(state).insert(id.clone(), merged.clone());
    Some(merged)
}

impl EntityStore {
    // ========== Convenience: lock + stage + notify + launch ==========

    pub(crate) fn begin_insert<T: Synced>(&self, entity: T) -> StoreResult<Commit<T>> {
        let op_id = self.write(|s| stage_insert(s, &entity))?;
        self.emit(T::KIND, ChangeAction::Created, Some(entity.id().clone()));
        Ok(self.launch(entity, Some(op_id)))
    }

    pub(crate) fn begin_update<T: Synced>(&self, id: &EntityId, patch: Map<String, Value>) -> StoreResult<Commit<T>> {
        let (updated, op_id) = self.write(|s| stage_update::<T>(s, id, patch))?;
        self.emit(T::KIND, ChangeAction::Updated, Some(id.clone()));
        Ok(self.launch(updated, op_id))
    }

    /// Edit a copy under the lock; only the fields that changed are sent
    pub(crate) fn begin_edit<T: Synced>(
        &self,
        id: &EntityId,
        edit: impl FnOnce(&mut T) -> StoreResult<()>,
    ) -> StoreResult<Commit<T>> {
        let staged = self.write(|s| -> StoreResult<Result<(T, Option<OpId>), T>> {
            let current = T::slot(s)
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::not_found(T::KIND, id))?;
            let mut next = current.clone();
            edit(&mut next)?;
            let before = to_object(&current).unwrap_or_default();
            let after = to_object(&next).unwrap_or_default();
            let patch = diff_fields(&before, &after);
            if patch.is_empty() {
                return Ok(Err(current));
            }
            stage_update::<T>(s, id, patch).map(Ok)
        })?;
        match staged {
            Ok((updated, op_id)) => {
                self.emit(T::KIND, ChangeAction::Updated, Some(id.clone()));
                Ok(self.launch(updated, op_id))
            }
            // nothing changed
            Err(unchanged) => Ok(Commit::Local(unchanged)),
        }
    }

    pub(crate) fn begin_delete<T: Synced>(&self, id: &EntityId) -> StoreResult<Commit<T>> {
        let (removed, op_id) = self.write(|s| stage_delete::<T>(s, id))?;
        self.emit(T::KIND, ChangeAction::Deleted, Some(id.clone()));
        Ok(self.launch(removed, op_id))
    }

    /// Spawn the remote half of a staged op
    pub(crate) fn launch<T: Synced>(&self, local: T, op_id: Option<OpId>) -> Commit<T> {
        match op_id {
            None => Commit::Local(local),
            Some(op_id) => Commit::Remote {
                op_id,
                local,
                handle: self.spawn_commit::<T>(op_id),
            },
        }
    }

    pub(crate) fn spawn_commit<T: Synced>(&self, op_id: OpId) -> JoinHandle<StoreResult<Option<T>>> {
        let store = self.clone();
        tokio::spawn(async move { store.run_commit::<T>(op_id).await })
    }

    // ========== Remote half ==========

    async fn run_commit<T: Synced>(&self, op_id: OpId) -> StoreResult<Option<T>> {
        let Some(op) = self.read(|s| s.ledger.get(op_id).cloned()) else {
            return Ok(None);
        };
        let remote = &self.inner.remote;

        match &op.action {
            OpAction::Insert { payload } => {
                let entity: T = serde_json::from_value(Value::Object(payload.clone()))
                    .map_err(|e| StoreError::Internal(format!("corrupt insert payload: {}", e)))?;
                match remote.create(T::COLLECTION, &entity).await {
                    Ok(stored) => Ok(Some(self.confirm_insert(&op, payload, stored))),
                    Err(e) => Err(self.fail_insert::<T>(&op, e)),
                }
            }
            OpAction::Update { patch } => {
                match remote.patch::<T>(T::COLLECTION, &op.entity_id, patch).await {
                    Ok(stored) => Ok(self.confirm_update(&op, stored)),
                    Err(e) => Err(self.fail_op(&op, e)),
                }
            }
            OpAction::Delete => match remote.remove(T::COLLECTION, &op.entity_id).await {
                // already gone remotely
                Ok(()) | Err(ClientError::NotFound(_)) => {
                    self.write(|s| s.ledger.remove(op.id));
                    tracing::debug!(kind = %op.kind, id = %op.entity_id, "Delete confirmed");
                    self.emit(T::KIND, ChangeAction::Confirmed, Some(op.entity_id.clone()));
                    Ok(None)
                }
                Err(e) => Err(self.fail_op(&op, e)),
            },
        }
    }

    /// Re-key the local entity under its remote id and keep edits made
    /// while the insert was in flight
    fn confirm_insert<T: Synced>(&self, op: &PendingOp, sent: &Map<String, Value>, stored: T) -> T {
        let local_id = op.entity_id.clone();
        let remote_id = stored.id().clone();

        let (result, follow_up) = self.write(|s| {
            s.ledger.remove(op.id);
            match T::slot_mut(s).remove(&local_id) {
                Some(current) => {
                    let edits = to_object(&current)
                        .map(|c| diff_fields(sent, &c))
                        .unwrap_or_default();
                    let merged = overlay(stored.clone(), [&edits]);
                    T::slot_mut(s).insert(remote_id.clone(), merged.clone());
                    let follow_up = (!edits.is_empty()).then(|| {
                        s.ledger.push(PendingOp::new(
                            T::COLLECTION,
                            T::KIND,
                            remote_id.clone(),
                            OpAction::Update { patch: edits },
                        ))
                    });
                    (merged, follow_up)
                }
                None => {
                    // deleted locally while in flight
                    let follow_up = s.ledger.push(PendingOp::new(
                        T::COLLECTION,
                        T::KIND,
                        remote_id.clone(),
                        OpAction::Delete,
                    ));
                    (stored.clone(), Some(follow_up))
                }
            }
        });

        tracing::debug!(kind = %T::KIND, local_id = %local_id, id = %remote_id, "Insert confirmed");
        self.emit(T::KIND, ChangeAction::Confirmed, Some(remote_id));

        if let Some(op_id) = follow_up {
            // outcome is reported through the failure path
            drop(self.spawn_commit::<T>(op_id));
        }
        result
    }

    /// Revert the local insert
    fn fail_insert<T: Synced>(&self, op: &PendingOp, err: ClientError) -> StoreError {
        let message = err.to_string();
        let reverted = self.write(|s| {
            let current = T::slot(s).get(&op.entity_id).cloned();
            match &current {
                Some(entity) if T::KEEP_FAILED_INSERT => {
                    if let Some(entry) = s.ledger.get_mut(op.id) {
                        if let Some(payload) = to_object(entity) {
                            entry.action = OpAction::Insert { payload };
                        }
                        entry.status = OpStatus::Failed {
                            message: message.clone(),
                        };
                    }
                }
                _ => {
                    s.ledger.remove(op.id);
                }
            }
            if let Some(entity) = &current {
                T::revert_insert(s, entity);
            }
            current
        });

        self.emit(T::KIND, ChangeAction::Failed, Some(op.entity_id.clone()));
        if let Some((kind, id)) = reverted.as_ref().and_then(T::revert_notice) {
            self.emit(kind, ChangeAction::Updated, Some(id));
        }
        self.sync_error(op, message, true)
    }

    /// Keep the local change and flag it
    fn fail_op(&self, op: &PendingOp, err: ClientError) -> StoreError {
        let message = err.to_string();
        self.write(|s| s.ledger.mark_failed(op.id, message.clone()));
        self.emit(op.kind, ChangeAction::Failed, Some(op.entity_id.clone()));
        self.sync_error(op, message, false)
    }

    fn sync_error(&self, op: &PendingOp, message: String, reverted: bool) -> StoreError {
        let sync_op = op.action.sync_op();
        self.report_sync_failure(SyncFailure {
            op: sync_op,
            kind: op.kind,
            id: Some(op.entity_id.clone()),
            code: ErrorCode::SyncFailed,
            message: message.clone(),
            reverted,
        });
        StoreError::Sync(SyncError {
            op_id: op.id,
            op: sync_op,
            kind: op.kind,
            id: op.entity_id.clone(),
            message,
            reverted,
        })
    }

    fn confirm_update<T: Synced>(&self, op: &PendingOp, stored: T) -> Option<T> {
        let merged = self.write(|s| {
            s.ledger.remove(op.id);
            absorb_stored(s, &op.entity_id, stored)
        });
        self.emit(T::KIND, ChangeAction::Confirmed, Some(op.entity_id.clone()));
        merged
    }

    /// Re-issue a failed op of a known entity type
    pub(crate) async fn retry_typed<T: Synced>(&self, op_id: OpId) -> StoreResult<()> {
        let restored = self.write(|s| -> StoreResult<Option<EntityId>> {
            let op = s
                .ledger
                .get_mut(op_id)
                .ok_or_else(|| StoreError::Internal(format!("unknown operation {}", op_id)))?;
            op.status = OpStatus::InFlight;
            let action = op.action.clone();
            let entity_id = op.entity_id.clone();
            if let OpAction::Insert { payload } = action {
                let entity: T = serde_json::from_value(Value::Object(payload))
                    .map_err(|e| StoreError::Internal(format!("corrupt insert payload: {}", e)))?;
                T::slot_mut(s).insert(entity_id.clone(), entity);
                return Ok(Some(entity_id));
            }
            Ok(None)
        })?;
        if let Some(id) = restored {
            self.emit(T::KIND, ChangeAction::Created, Some(id));
        }

        match self.spawn_commit::<T>(op_id).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(StoreError::Internal(format!("commit task failed: {}", e))),
        }
    }
}
