//! Reconciliation sweep - flushes records left pending.
//!
//! # Algorithm
//!
//! 1. Load the session user's `needs_upload` records, oldest `updated_at`
//!    first
//! 2. Before each record: stop if cancelled; stop if the user is offline or
//!    not entitled (remaining records stay pending for the next sweep)
//! 3. Skip records still backing off or dead-lettered
//! 4. Snapshot the record under its lock, release, push, reacquire
//! 5. Mark `Synced` only if the record is unchanged since the snapshot;
//!    otherwise discard the result and let the next sweep push the newer
//!    state
//! 6. A failed push leaves the record pending and the sweep moves on
//!
//! Retry bookkeeping lives here, not on the record, so a record's status
//! and worklist marker stay coupled.

use crate::{
    remote::{PushKind, PushOutcome, RemotePush},
    services::{Eligibility, SyncServices},
    store::RecordFilter,
    RecordKey, RemoteError, SyncableRecord, Timestamp, User,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-record backoff and dead-letter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure, doubled per further failure
    pub base_delay: Duration,
    /// Upper bound for the delay
    pub max_delay: Duration,
    /// Consecutive failures after which a record is parked; `None` never parks
    pub dead_letter_after: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(900),
            dead_letter_after: Some(8),
        }
    }
}

impl RetryPolicy {
    /// Retry on every sweep and never park a record.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            dead_letter_after: None,
        }
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    pub fn delay_after(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn is_dead(&self, failures: u32) -> bool {
        self.dead_letter_after.is_some_and(|limit| failures >= limit)
    }
}

/// Retry bookkeeping of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryState {
    pub failures: u32,
    pub next_attempt_at: Timestamp,
    pub last_error: String,
    pub dead: bool,
}

/// Retry state of every record whose last push failed.
#[derive(Debug, Default)]
pub struct RetryBook {
    entries: DashMap<RecordKey, RetryState>,
}

impl RetryBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RecordKey) -> Option<RetryState> {
        self.entries.get(key).map(|state| state.value().clone())
    }

    /// Forget a record's failures.
    pub fn clear(&self, key: &RecordKey) -> bool {
        self.entries.remove(key).is_some()
    }

    fn record_failure(
        &self,
        key: &RecordKey,
        now: Timestamp,
        policy: &RetryPolicy,
        error: &RemoteError,
    ) -> RetryState {
        let mut entry = self.entries.entry(key.clone()).or_insert(RetryState {
            failures: 0,
            next_attempt_at: now,
            last_error: String::new(),
            dead: false,
        });
        entry.failures += 1;
        let delay = u64::try_from(policy.delay_after(entry.failures).as_millis()).unwrap_or(u64::MAX);
        entry.next_attempt_at = now.saturating_add(delay);
        entry.last_error = error.to_string();
        entry.dead = policy.is_dead(entry.failures);
        entry.value().clone()
    }

    fn dead_letters(&self) -> Vec<RecordKey> {
        let mut keys: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.dead)
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }
}

/// Why a sweep stopped before its worklist was exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbortReason {
    NoActiveUser,
    Offline,
    NotEntitled,
    Cancelled,
    Storage(String),
}

/// Counts from one sweep, for observability only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// Records a push was attempted for
    pub attempted: usize,
    /// Records now marked synced
    pub succeeded: usize,
    /// Records whose push failed
    pub failed: usize,
    /// Pushed records edited locally while the push was in flight
    pub superseded: usize,
    /// Records skipped because they are backing off or dead-lettered
    pub deferred: usize,
    /// Records that crossed the dead-letter threshold in this sweep
    pub dead_lettered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortReason>,
}

enum Readiness {
    Ready,
    BackingOff,
    Dead,
}

/// Pushes pending records of the session user.
#[derive(Debug)]
pub struct Reconciler {
    services: Arc<SyncServices>,
    policy: RetryPolicy,
}

impl Reconciler {
    pub fn new(services: Arc<SyncServices>, policy: RetryPolicy) -> Self {
        Self { services, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one sweep to completion.
    pub async fn reconcile(&self) -> ReconciliationReport {
        self.reconcile_with_cancel(&CancellationToken::new()).await
    }

    /// Run one sweep, stopping between records once `cancel` fires.
    pub async fn reconcile_with_cancel(&self, cancel: &CancellationToken) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        let Some(user) = self.services.session.current_user() else {
            report.aborted = Some(AbortReason::NoActiveUser);
            return report;
        };

        let mut worklist = match self
            .services
            .store
            .query(&RecordFilter::upload_worklist(user.id.clone()))
        {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(error = %err, "failed to load reconciliation worklist");
                report.aborted = Some(AbortReason::Storage(err.to_string()));
                return report;
            }
        };
        worklist.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.key().cmp(&b.key()))
        });

        for candidate in worklist {
            if cancel.is_cancelled() {
                report.aborted = Some(AbortReason::Cancelled);
                break;
            }
            match self.services.eligibility(&user) {
                Eligibility::Eligible => {}
                Eligibility::Offline => {
                    report.aborted = Some(AbortReason::Offline);
                    break;
                }
                Eligibility::NotEntitled(_) => {
                    report.aborted = Some(AbortReason::NotEntitled);
                    break;
                }
            }

            let key = candidate.key();
            match self.readiness(&key) {
                Readiness::Ready => {}
                Readiness::BackingOff | Readiness::Dead => {
                    report.deferred += 1;
                    continue;
                }
            }

            if let Err(reason) = self.reconcile_record(&key, &user, &mut report).await {
                report.aborted = Some(reason);
                break;
            }
        }
        self.services.locks.prune();

        tracing::info!(
            user_id = %user.id,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            superseded = report.superseded,
            deferred = report.deferred,
            aborted = ?report.aborted,
            "reconciliation sweep finished"
        );
        report
    }

    async fn reconcile_record(
        &self,
        key: &RecordKey,
        user: &User,
        report: &mut ReconciliationReport,
    ) -> Result<(), AbortReason> {
        let snapshot = {
            let _guard = self.services.locks.lock(key).await;
            match self.services.store.get(&key.collection, &key.id) {
                Ok(Some(record)) if record.needs_upload => record,
                // Synced by a concurrent commit since the worklist was read.
                Ok(_) => return Ok(()),
                Err(err) => return Err(AbortReason::Storage(err.to_string())),
            }
        };

        report.attempted += 1;
        match self.push(&snapshot, user).await {
            PushOutcome::Pushed(_) => match self.commit_synced(&snapshot).await {
                Ok(true) => {
                    self.services.retries.clear(key);
                    report.succeeded += 1;
                    tracing::debug!(record = %key, "record reconciled");
                }
                Ok(false) => {
                    report.superseded += 1;
                    tracing::debug!(record = %key, "push result discarded, record changed meanwhile");
                }
                Err(err) => {
                    tracing::error!(record = %key, error = %err, "failed to commit reconciled record");
                    return Err(AbortReason::Storage(err.to_string()));
                }
            },
            PushOutcome::Failed(err) => {
                report.failed += 1;
                let now = self.services.clock.now();
                let state = self
                    .services
                    .retries
                    .record_failure(key, now, &self.policy, &err);
                if state.dead && self.policy.dead_letter_after == Some(state.failures) {
                    report.dead_lettered += 1;
                    tracing::warn!(
                        record = %key,
                        failures = state.failures,
                        error = %err,
                        "record dead-lettered"
                    );
                } else {
                    tracing::warn!(
                        record = %key,
                        failures = state.failures,
                        error = %err,
                        "reconciliation push failed"
                    );
                }
            }
        }
        Ok(())
    }

    fn readiness(&self, key: &RecordKey) -> Readiness {
        match self.services.retries.get(key) {
            None => Readiness::Ready,
            Some(state) if state.dead => Readiness::Dead,
            Some(state) if state.next_attempt_at > self.services.clock.now() => {
                Readiness::BackingOff
            }
            Some(_) => Readiness::Ready,
        }
    }

    /// Push a record, recovering from a lost acknowledgement (create of a
    /// record that already exists) or a lost remote copy (update of a
    /// record the remote store does not have).
    async fn push(&self, record: &SyncableRecord, user: &User) -> PushOutcome {
        let push = RemotePush::from_record(record, user);
        let kind = PushKind::for_record(record);
        let remote = &self.services.remote;

        match remote.push(kind, &push).await {
            PushOutcome::Failed(RemoteError::AlreadyExists(_)) if kind == PushKind::Create => {
                tracing::debug!(record = %record.key(), "already exists remotely, updating instead");
                remote.push(PushKind::Update, &push).await
            }
            PushOutcome::Failed(RemoteError::NotFound(_)) if kind == PushKind::Update => {
                tracing::debug!(record = %record.key(), "missing remotely, creating instead");
                remote.push(PushKind::Create, &push).await
            }
            outcome => outcome,
        }
    }

    /// Mark the record synced if it still is the revision that was pushed.
    async fn commit_synced(&self, pushed: &SyncableRecord) -> crate::error::StoreResult<bool> {
        let key = pushed.key();
        let _guard = self.services.locks.lock(&key).await;
        let now = self.services.clock.now();

        let mut applied = false;
        self.services.store.write(&mut |txn| {
            if let Some(mut current) = txn.get(&key) {
                if current.version == pushed.version && current.updated_at == pushed.updated_at {
                    current.mark_synced(now);
                    txn.put(current);
                    applied = true;
                } else if current.last_synced_at.is_none() {
                    // The remote copy exists now; the next push must update it.
                    current.last_synced_at = Some(now);
                    txn.put(current);
                }
            }
            Ok(())
        })?;
        Ok(applied)
    }

    /// Return a dead-lettered record to the worklist.
    pub fn revive(&self, collection: &str, id: &str) -> bool {
        self.services.retries.clear(&RecordKey::new(collection, id))
    }

    /// Records parked after too many consecutive failures.
    pub fn dead_letters(&self) -> Vec<RecordKey> {
        self.services.retries.dead_letters()
    }

    /// Retry state of a record, if its last push failed.
    pub fn retry_state(&self, collection: &str, id: &str) -> Option<RetryState> {
        self.services.retries.get(&RecordKey::new(collection, id))
    }
}
