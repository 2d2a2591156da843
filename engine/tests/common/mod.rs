//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use offsync_engine::{
    ManualClock, MemoryStore, PushKind, Reconciler, RemoteAck, RemoteClient, RemoteError,
    RemotePush, RetryPolicy, Session, SyncOrchestrator, SyncServices, Tier, User,
    WatchConnectivity,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const USER_ID: &str = "user-1";
pub const REMOTE_USER_ID: &str = "remote-user-1";

/// In-memory stand-in for the remote store. Keeps the pushed records keyed
/// by id and answers like a real one: creating an existing id or updating a
/// missing one is an error.
#[derive(Debug, Default)]
pub struct FakeRemote {
    records: Mutex<BTreeMap<String, RemotePush>>,
    calls: Mutex<Vec<(PushKind, RemotePush)>>,
    failing: AtomicBool,
    pause: Mutex<Option<Arc<PausePoint>>>,
    served: AtomicUsize,
}

/// Holds the next remote call until released.
#[derive(Debug, Default)]
pub struct PausePoint {
    pub entered: Notify,
    pub release: Notify,
}

impl FakeRemote {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Pause the next call until the returned point is released.
    pub fn pause_next(&self) -> Arc<PausePoint> {
        let point = Arc::new(PausePoint::default());
        *self.pause.lock().unwrap() = Some(point.clone());
        point
    }

    pub fn calls(&self) -> Vec<(PushKind, RemotePush)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stored(&self, id: &str) -> Option<RemotePush> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub fn stored_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Put a record on the remote side without going through a push.
    pub fn seed(&self, push: RemotePush) {
        self.records.lock().unwrap().insert(push.id.clone(), push);
    }

    async fn serve(&self, kind: PushKind, push: &RemotePush) -> Result<RemoteAck, RemoteError> {
        self.calls.lock().unwrap().push((kind, push.clone()));

        let pause = self.pause.lock().unwrap().take();
        if let Some(point) = pause {
            point.entered.notify_one();
            point.release.notified().await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection reset".into()));
        }

        let mut records = self.records.lock().unwrap();
        match kind {
            PushKind::Create if records.contains_key(&push.id) => {
                return Err(RemoteError::AlreadyExists(push.id.clone()))
            }
            PushKind::Update if !records.contains_key(&push.id) => {
                return Err(RemoteError::NotFound(push.id.clone()))
            }
            _ => {}
        }
        records.insert(push.id.clone(), push.clone());
        let revision = self.served.fetch_add(1, Ordering::SeqCst) + 1;

        Ok(RemoteAck {
            id: push.id.clone(),
            revision: Some(revision.to_string()),
        })
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn create_remote(&self, push: &RemotePush) -> Result<RemoteAck, RemoteError> {
        self.serve(PushKind::Create, push).await
    }

    async fn update_remote(&self, _id: &str, push: &RemotePush) -> Result<RemoteAck, RemoteError> {
        self.serve(PushKind::Update, push).await
    }
}

pub struct Fixture {
    pub services: Arc<SyncServices>,
    pub store: Arc<MemoryStore>,
    pub remote: Arc<FakeRemote>,
    pub session: Arc<Session>,
    pub connectivity: Arc<WatchConnectivity>,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    pub fn new(tier: Tier, online: bool) -> Self {
        Self::with_store(MemoryStore::new(), tier, online)
    }

    pub fn with_store(store: MemoryStore, tier: Tier, online: bool) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let store = Arc::new(store);
        let remote = Arc::new(FakeRemote::default());
        let session = Arc::new(Session::signed_in(User::new(USER_ID, REMOTE_USER_ID, tier)));
        let connectivity = Arc::new(WatchConnectivity::new(online));
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));

        let services = SyncServices::new(
            store.clone(),
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

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.services.clone(), RetryPolicy::immediate())
    }
}
