//! Snapshot types for persisting and restoring the local store.
//!
//! Snapshots are the on-disk form of [`MemoryStore`](crate::MemoryStore).
//! They use `BTreeMap` so the serialized output has a deterministic order.

use crate::{error::StoreResult, CollectionName, RecordId, StoreError, SyncableRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time copy of every local record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// All records organized by collection, then by record ID
    pub records: BTreeMap<CollectionName, BTreeMap<RecordId, SyncableRecord>>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreSnapshot {
    pub fn new() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            records: BTreeMap::new(),
        }
    }

    /// Add a record to the snapshot.
    pub fn add_record(&mut self, record: SyncableRecord) {
        self.records
            .entry(record.collection.clone())
            .or_default()
            .insert(record.id.clone(), record);
    }

    pub fn get_record(&self, collection: &str, id: &str) -> Option<&SyncableRecord> {
        self.records.get(collection)?.get(id)
    }

    /// Count total records across all collections.
    pub fn record_count(&self) -> usize {
        self.records.values().map(|c| c.len()).sum()
    }

    /// Count records still owed to the remote store.
    pub fn pending_count(&self) -> usize {
        self.iter_records().filter(|r| r.needs_upload).count()
    }

    /// Iterate over every record in key order.
    pub fn iter_records(&self) -> impl Iterator<Item = &SyncableRecord> {
        self.records.values().flat_map(|c| c.values())
    }

    /// Check that the snapshot can be loaded.
    pub fn validate(&self) -> StoreResult<()> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(StoreError::Corrupted(format!(
                "unsupported snapshot format {}, expected {}",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        for (collection, records) in &self.records {
            for (id, record) in records {
                if &record.collection != collection || &record.id != id {
                    return Err(StoreError::Corrupted(format!(
                        "record {} filed under {}/{}",
                        record.key(),
                        collection,
                        id
                    )));
                }
                if record.owner_id.is_empty() {
                    return Err(StoreError::Corrupted(format!(
                        "record {} has no owner",
                        record.key()
                    )));
                }
                if !record.is_consistent() {
                    return Err(StoreError::Corrupted(format!(
                        "record {} has needsUpload={} with status {:?}",
                        record.key(),
                        record.needs_upload,
                        record.sync_status
                    )));
                }
            }
        }

        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON and validate.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Load a snapshot file. A missing file is an empty snapshot.
    pub fn read_from(path: &Path) -> StoreResult<Self> {
        match fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the snapshot to `path` atomically: a sibling temp file is
    /// written and synced, then renamed over the target.
    pub fn write_to(&self, path: &Path) -> StoreResult<()> {
        let json = self.to_json()?;
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
