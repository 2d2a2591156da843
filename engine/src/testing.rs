//! Test doubles shared by the unit tests.

use crate::{
    clock::ManualClock,
    context::{Session, Tier, User, WatchConnectivity},
    error::StoreResult,
    reconcile::{Reconciler, RetryPolicy},
    remote::{PushKind, RemoteAck, RemoteClient, RemotePush},
    services::SyncServices,
    store::{LocalStore, MemoryStore, RecordFilter, WriteFn},
    RemoteError, StoreError, SyncOrchestrator, SyncableRecord,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RemoteCall {
    pub kind: PushKind,
    pub push: RemotePush,
}

/// Remote client that records calls and fails on demand.
#[derive(Debug, Default)]
pub(crate) struct ScriptedRemote {
    calls: Mutex<Vec<RemoteCall>>,
    failures: Mutex<VecDeque<RemoteError>>,
    failing: AtomicBool,
}

impl ScriptedRemote {
    pub fn fail_next(&self, err: RemoteError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, kind: PushKind, push: &RemotePush) -> Result<RemoteAck, RemoteError> {
        self.calls.lock().unwrap().push(RemoteCall {
            kind,
            push: push.clone(),
        });
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection refused".into()));
        }
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(RemoteAck {
            id: push.id.clone(),
            revision: None,
        })
    }
}

#[async_trait]
impl RemoteClient for ScriptedRemote {
    async fn create_remote(&self, push: &RemotePush) -> Result<RemoteAck, RemoteError> {
        self.answer(PushKind::Create, push)
    }

    async fn update_remote(&self, _id: &str, push: &RemotePush) -> Result<RemoteAck, RemoteError> {
        self.answer(PushKind::Update, push)
    }
}

/// Store whose writes always fail.
#[derive(Debug, Default)]
pub(crate) struct FullDiskStore;

impl LocalStore for FullDiskStore {
    fn get(&self, _collection: &str, _id: &str) -> StoreResult<Option<SyncableRecord>> {
        Ok(None)
    }

    fn query(&self, _filter: &RecordFilter) -> StoreResult<Vec<SyncableRecord>> {
        Ok(Vec::new())
    }

    fn write(&self, _f: &mut WriteFn<'_>) -> StoreResult<()> {
        Err(StoreError::Io(std::io::Error::other("no space left on device")))
    }
}

/// Route `tracing` output through the test harness. Honours `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) struct Harness {
    pub services: Arc<SyncServices>,
    pub store: Arc<MemoryStore>,
    pub remote: Arc<ScriptedRemote>,
    pub session: Arc<Session>,
    pub connectivity: Arc<WatchConnectivity>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(tier: Tier, online: bool) -> Self {
        Self::build(tier, online, None)
    }

    pub fn with_failing_store(tier: Tier, online: bool) -> Self {
        Self::build(tier, online, Some(Arc::new(FullDiskStore)))
    }

    fn build(tier: Tier, online: bool, store_override: Option<Arc<dyn LocalStore>>) -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(ScriptedRemote::default());
        let session = Arc::new(Session::signed_in(User::new("u-1", "remote-1", tier)));
        let connectivity = Arc::new(WatchConnectivity::new(online));
        let clock = Arc::new(ManualClock::new(1_000));

        let services = SyncServices::new(
            store_override.unwrap_or_else(|| store.clone() as Arc<dyn LocalStore>),
            remote.clone(),
            session.clone(),
            connectivity.clone(),
        )
        .with_clock(clock.clone());

        Self {
            services: Arc::new(services),
            store,
            remote,
            session,
            connectivity,
            clock,
        }
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(self.services.clone())
    }

    pub fn reconciler(&self, policy: RetryPolicy) -> Reconciler {
        Reconciler::new(self.services.clone(), policy)
    }
}
