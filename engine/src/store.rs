//! Local store - the on-device source of truth.
//!
//! Every read the application makes goes to a [`LocalStore`]. Writes run as
//! transactions: all `put`s inside one [`LocalStore::write`] call land
//! together or not at all.

use crate::{
    error::StoreResult, snapshot::StoreSnapshot, RecordKey, StoreError, SyncableRecord,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Typed predicate for [`LocalStore::query`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    collection: Option<String>,
    owner_id: Option<String>,
    needs_upload: Option<bool>,
    include_inactive: bool,
}

impl RecordFilter {
    /// Every active record.
    pub fn all() -> Self {
        Self::default()
    }

    /// The reconciliation worklist of a user, including soft-deleted records
    /// whose deactivation is still owed to the remote store.
    pub fn upload_worklist(owner_id: impl Into<String>) -> Self {
        Self::all()
            .owned_by(owner_id)
            .needs_upload(true)
            .include_inactive()
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn owned_by(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn needs_upload(mut self, needs_upload: bool) -> Self {
        self.needs_upload = Some(needs_upload);
        self
    }

    /// Include soft-deleted records.
    pub fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    pub fn matches(&self, record: &SyncableRecord) -> bool {
        if !self.include_inactive && !record.is_active() {
            return false;
        }
        if let Some(collection) = &self.collection {
            if &record.collection != collection {
                return false;
            }
        }
        if let Some(owner) = &self.owner_id {
            if &record.owner_id != owner {
                return false;
            }
        }
        if let Some(needs_upload) = self.needs_upload {
            if record.needs_upload != needs_upload {
                return false;
            }
        }
        true
    }
}

/// Mutations staged inside one [`LocalStore::write`] call.
pub trait WriteTxn {
    /// Read a record, seeing writes staged earlier in this transaction.
    fn get(&self, key: &RecordKey) -> Option<SyncableRecord>;

    /// Stage a full replacement of the record at its key.
    fn put(&mut self, record: SyncableRecord);
}

/// Write closure handed to [`LocalStore::write`].
pub type WriteFn<'a> = dyn FnMut(&mut dyn WriteTxn) -> StoreResult<()> + Send + 'a;

/// The embedded store holding the authoritative local copy of every record.
pub trait LocalStore: Send + Sync {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<SyncableRecord>>;

    /// Matching records in key order.
    fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<SyncableRecord>>;

    /// Run `f` as one atomic transaction. If `f` or the commit fails,
    /// nothing it staged becomes visible.
    fn write(&self, f: &mut WriteFn<'_>) -> StoreResult<()>;

    /// Write a single record.
    fn put(&self, record: SyncableRecord) -> StoreResult<()> {
        let mut record = Some(record);
        self.write(&mut |txn| {
            if let Some(record) = record.take() {
                txn.put(record);
            }
            Ok(())
        })
    }
}

struct MemoryTxn<'a> {
    base: &'a BTreeMap<RecordKey, SyncableRecord>,
    staged: BTreeMap<RecordKey, SyncableRecord>,
}

impl WriteTxn for MemoryTxn<'_> {
    fn get(&self, key: &RecordKey) -> Option<SyncableRecord> {
        self.staged
            .get(key)
            .or_else(|| self.base.get(key))
            .cloned()
    }

    fn put(&mut self, record: SyncableRecord) {
        self.staged.insert(record.key(), record);
    }
}

/// In-memory [`LocalStore`], optionally persisted to a snapshot file.
///
/// With a backing file, each transaction writes the full post-commit
/// snapshot before the in-memory state changes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<RecordKey, SyncableRecord>>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create a volatile store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by `path`, restoring any existing snapshot.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = StoreSnapshot::read_from(&path)?;
        let store = Self::from_snapshot(snapshot)?;
        Ok(Self {
            path: Some(path),
            ..store
        })
    }

    /// Build a volatile store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        snapshot.validate()?;
        let records = snapshot
            .iter_records()
            .map(|r| (r.key(), r.clone()))
            .collect();
        Ok(Self {
            records: RwLock::new(records),
            path: None,
        })
    }

    /// Export the current state.
    pub fn export_state(&self) -> StoreResult<StoreSnapshot> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        let mut snapshot = StoreSnapshot::new();
        for record in records.values() {
            snapshot.add_record(record.clone());
        }
        Ok(snapshot)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of stored records, including soft-deleted ones.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.records.read().map_err(|_| StoreError::Poisoned)?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn check_staged(staged: &BTreeMap<RecordKey, SyncableRecord>) -> StoreResult<()> {
        for record in staged.values() {
            if record.owner_id.is_empty() {
                return Err(StoreError::Aborted(format!(
                    "record {} has no owner",
                    record.key()
                )));
            }
            if !record.is_consistent() {
                return Err(StoreError::Aborted(format!(
                    "record {} has needsUpload={} with status {:?}",
                    record.key(),
                    record.needs_upload,
                    record.sync_status
                )));
            }
        }
        Ok(())
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<SyncableRecord>> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(&RecordKey::new(collection, id)).cloned())
    }

    fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<SyncableRecord>> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn write(&self, f: &mut WriteFn<'_>) -> StoreResult<()> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;

        let staged = {
            let mut txn = MemoryTxn {
                base: &*records,
                staged: BTreeMap::new(),
            };
            f(&mut txn)?;
            txn.staged
        };

        if staged.is_empty() {
            return Ok(());
        }
        Self::check_staged(&staged)?;

        if let Some(path) = &self.path {
            let mut snapshot = StoreSnapshot::new();
            for (key, record) in records.iter() {
                if !staged.contains_key(key) {
                    snapshot.add_record(record.clone());
                }
            }
            for record in staged.values() {
                snapshot.add_record(record.clone());
            }
            snapshot.write_to(path)?;
        }

        records.extend(staged);
        Ok(())
    }
}
