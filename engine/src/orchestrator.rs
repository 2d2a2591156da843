//! Sync orchestrator - commits user mutations.
//!
//! # Protocol
//!
//! 1. Resolve the session user (none: configuration error, nothing written)
//! 2. Under the record lock, read the current state and stamp the new one
//! 3. Release the lock; if the user is entitled and online, push once
//! 4. Map the push result onto `Synced` or `Pending`
//! 5. Under the record lock again, write payload and status in one
//!    transaction unless a newer local write landed meanwhile
//!
//! Remote failures are logged and degrade to `Pending`. Only storage and
//! context errors reach the caller.

use crate::{
    remote::{PushKind, PushOutcome, RemotePush},
    services::{Eligibility, SyncServices},
    CommitError, CreateOp, Operation, RecordKey, SyncStatus, SyncableRecord, UpdateOp, User,
};
use std::sync::Arc;

/// Applies creates and updates to the local store, pushing to the remote
/// store when allowed.
#[derive(Debug, Clone)]
pub struct SyncOrchestrator {
    services: Arc<SyncServices>,
}

impl SyncOrchestrator {
    pub fn new(services: Arc<SyncServices>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<SyncServices> {
        &self.services
    }

    /// Create a record in `collection`.
    pub async fn create(
        &self,
        collection: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<SyncableRecord, CommitError> {
        self.commit(CreateOp::new(collection, payload).into()).await
    }

    /// Replace the payload of an existing record. The active flag is kept.
    pub async fn update(
        &self,
        collection: impl Into<String>,
        id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<SyncableRecord, CommitError> {
        self.commit(UpdateOp::new(collection, id, payload).into())
            .await
    }

    /// Soft-delete a record.
    pub async fn deactivate(
        &self,
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<SyncableRecord, CommitError> {
        self.commit(UpdateOp::deactivate(collection, id).into())
            .await
    }

    /// Undo a soft delete.
    pub async fn reactivate(
        &self,
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<SyncableRecord, CommitError> {
        self.commit(UpdateOp::reactivate(collection, id).into())
            .await
    }

    /// Commit one mutation. Makes exactly one local write and at most one
    /// remote call.
    pub async fn commit(&self, op: Operation) -> Result<SyncableRecord, CommitError> {
        let result = self.apply(op).await;
        self.services.locks.prune();
        result
    }

    async fn apply(&self, op: Operation) -> Result<SyncableRecord, CommitError> {
        let user = self
            .services
            .session
            .current_user()
            .ok_or_else(CommitError::no_active_user)?;

        let mut record = match op {
            Operation::Create(op) => self.prepare_create(&user, op),
            Operation::Update(op) => self.prepare_update(&user, op).await?,
        };

        let status = match self.services.eligibility(&user) {
            Eligibility::Eligible => self.push(&record, &user).await,
            reason => {
                tracing::debug!(record = %record.key(), ?reason, "remote push skipped");
                SyncStatus::Pending
            }
        };

        match status {
            SyncStatus::Synced => record.mark_synced(record.updated_at),
            SyncStatus::Pending => record.set_status(SyncStatus::Pending),
        }

        let key = record.key();
        let committed = self.write_unless_superseded(record).await?;
        self.services.retries.clear(&key);

        tracing::debug!(
            record = %key,
            status = ?committed.sync_status,
            version = committed.version,
            "record committed"
        );
        Ok(committed)
    }

    fn prepare_create(&self, user: &User, op: CreateOp) -> SyncableRecord {
        let id = self.services.ids.new_id();
        let now = self.services.clock.now();
        SyncableRecord::new(id, op.collection, user.id.clone(), op.payload, now)
    }

    async fn prepare_update(
        &self,
        user: &User,
        op: UpdateOp,
    ) -> Result<SyncableRecord, CommitError> {
        let key = RecordKey::new(op.collection.clone(), op.id.clone());
        let _guard = self.services.locks.lock(&key).await;

        let mut record = self
            .services
            .store
            .get(&op.collection, &op.id)?
            .ok_or(CommitError::RecordNotFound {
                collection: op.collection,
                id: op.id,
            })?;

        if record.owner_id != user.id {
            return Err(CommitError::OwnerMismatch {
                id: record.id,
                owner: record.owner_id,
                user: user.id.clone(),
            });
        }

        let payload = op.payload.unwrap_or_else(|| record.payload.clone());
        let active = op.active.unwrap_or(record.active);
        let now = self.services.clock.now();
        record.apply_edit(payload, active, now);
        Ok(record)
    }

    async fn push(&self, record: &SyncableRecord, user: &User) -> SyncStatus {
        let kind = PushKind::for_record(record);
        let push = RemotePush::from_record(record, user);

        match self.services.remote.push(kind, &push).await {
            PushOutcome::Pushed(_) => SyncStatus::Synced,
            PushOutcome::Failed(err) => {
                tracing::warn!(
                    record = %record.key(),
                    ?kind,
                    error = %err,
                    "remote push failed, record left pending"
                );
                SyncStatus::Pending
            }
        }
    }

    /// Write `record` unless the store already holds a newer local write,
    /// in which case the newer record stands and is returned.
    async fn write_unless_superseded(
        &self,
        record: SyncableRecord,
    ) -> Result<SyncableRecord, CommitError> {
        let key = record.key();
        let _guard = self.services.locks.lock(&key).await;

        let mut committed = None;
        self.services.store.write(&mut |txn| {
            let mut next = record.clone();
            match txn.get(&key) {
                Some(mut current) if current.updated_at > next.updated_at => {
                    tracing::debug!(record = %key, "commit superseded by a newer local write");
                    if next.sync_status.is_synced() && current.last_synced_at.is_none() {
                        current.last_synced_at = next.last_synced_at;
                        txn.put(current.clone());
                    }
                    committed = Some(current);
                }
                Some(current) => {
                    next.version = current.version + 1;
                    next.last_synced_at = next.last_synced_at.max(current.last_synced_at);
                    txn.put(next.clone());
                    committed = Some(next);
                }
                None => {
                    txn.put(next.clone());
                    committed = Some(next);
                }
            }
            Ok(())
        })?;

        Ok(committed.unwrap_or(record))
    }
}
