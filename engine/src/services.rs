//! Dependencies shared by the orchestrator and the reconciler.

use crate::{
    clock::{Clock, SystemClock},
    context::{
        ConnectivityOracle, EntitlementGate, IdGenerator, Session, User, UserTierGate,
        UuidGenerator,
    },
    lock::RecordLocks,
    reconcile::RetryBook,
    remote::RemoteClient,
    store::LocalStore,
    Tier,
};
use std::sync::Arc;

/// Whether a remote push may be attempted right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Offline,
    NotEntitled(Tier),
}

impl Eligibility {
    pub fn is_eligible(self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Handles to every collaborator, injected once and shared.
pub struct SyncServices {
    pub store: Arc<dyn LocalStore>,
    pub remote: Arc<dyn RemoteClient>,
    pub session: Arc<Session>,
    pub connectivity: Arc<dyn ConnectivityOracle>,
    pub entitlements: Arc<dyn EntitlementGate>,
    pub ids: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
    pub(crate) locks: RecordLocks,
    pub(crate) retries: RetryBook,
}

impl SyncServices {
    /// Wire the required collaborators. Entitlements default to the
    /// session user's own tier, ids to UUID v4 and time to the system clock.
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteClient>,
        session: Arc<Session>,
        connectivity: Arc<dyn ConnectivityOracle>,
    ) -> Self {
        Self {
            store,
            remote,
            session,
            connectivity,
            entitlements: Arc::new(UserTierGate),
            ids: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock::new()),
            locks: RecordLocks::new(),
            retries: RetryBook::new(),
        }
    }

    pub fn with_entitlements(mut self, entitlements: Arc<dyn EntitlementGate>) -> Self {
        self.entitlements = entitlements;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Consult the entitlement gate and the connectivity oracle afresh.
    pub fn eligibility(&self, user: &User) -> Eligibility {
        let tier = self.entitlements.tier_of(user);
        if !tier.allows_remote_sync() {
            return Eligibility::NotEntitled(tier);
        }
        if !self.connectivity.is_online() {
            return Eligibility::Offline;
        }
        Eligibility::Eligible
    }
}

impl std::fmt::Debug for SyncServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncServices")
            .field("session", &self.session)
            .field("locks", &self.locks.len())
            .finish_non_exhaustive()
    }
}
