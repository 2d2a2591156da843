//! Record types for syncable entities.

use crate::{CollectionName, RecordId, Timestamp, UserId, Version};
use serde::{Deserialize, Serialize};

/// Whether the local copy of a record matches the remote copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Local copy is known to match the remote copy as of `updated_at`
    Synced,
    /// A remote push is owed
    Pending,
}

impl SyncStatus {
    /// The worklist marker that accompanies this status.
    ///
    /// Every record written by the engine derives `needs_upload` from here,
    /// which keeps the two fields coupled.
    pub fn needs_upload(self) -> bool {
        matches!(self, SyncStatus::Pending)
    }

    pub fn is_synced(self) -> bool {
        matches!(self, SyncStatus::Synced)
    }
}

/// Key of a record in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    pub collection: CollectionName,
    pub id: RecordId,
}

impl RecordKey {
    pub fn new(collection: impl Into<CollectionName>, id: impl Into<RecordId>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A syncable record in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncableRecord {
    /// Client-generated identifier, shared with the remote store
    pub id: RecordId,
    /// Collection (entity kind) this record belongs to
    pub collection: CollectionName,
    /// Owning user, never empty
    pub owner_id: UserId,
    /// Domain fields, opaque to the sync core
    pub payload: serde_json::Value,
    /// Soft delete flag
    pub active: bool,
    /// When the record was first created (milliseconds since epoch)
    pub created_at: Timestamp,
    /// When the record was last written locally (milliseconds since epoch)
    pub updated_at: Timestamp,
    pub sync_status: SyncStatus,
    pub needs_upload: bool,
    /// Incremented on every local write
    pub version: Version,
    /// Last successful push; `None` if the remote store has never seen it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<Timestamp>,
}

impl SyncableRecord {
    /// Create a new, never-pushed record.
    pub fn new(
        id: impl Into<RecordId>,
        collection: impl Into<CollectionName>,
        owner_id: impl Into<UserId>,
        payload: serde_json::Value,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            owner_id: owner_id.into(),
            payload,
            active: true,
            created_at: timestamp,
            updated_at: timestamp,
            sync_status: SyncStatus::Pending,
            needs_upload: true,
            version: 1,
            last_synced_at: None,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.collection.clone(), self.id.clone())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the remote store has ever acknowledged this record.
    pub fn is_known_remotely(&self) -> bool {
        self.last_synced_at.is_some()
    }

    /// Check the status/worklist coupling.
    pub fn is_consistent(&self) -> bool {
        self.needs_upload == self.sync_status.needs_upload()
    }

    /// Set the sync status and the matching worklist marker together.
    pub fn set_status(&mut self, status: SyncStatus) {
        self.sync_status = status;
        self.needs_upload = status.needs_upload();
    }

    /// Record a successful push of the current local state.
    pub fn mark_synced(&mut self, timestamp: Timestamp) {
        self.set_status(SyncStatus::Synced);
        self.last_synced_at = Some(timestamp);
    }

    /// Replace the domain fields as a local edit.
    pub fn apply_edit(&mut self, payload: serde_json::Value, active: bool, timestamp: Timestamp) {
        self.payload = payload;
        self.active = active;
        self.updated_at = timestamp;
        self.version += 1;
    }
}
