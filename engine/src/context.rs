//! Collaborators consulted on every write: who is signed in, whether the
//! device is online, what the user's tier allows, and where new ids come
//! from.
//!
//! Everything here is injected into the orchestrator and reconciler. The
//! engine reads these on each call and never caches an answer.

use crate::{RecordId, UserId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Account tier gating remote sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Paid,
}

impl Tier {
    pub fn allows_remote_sync(self) -> bool {
        matches!(self, Tier::Paid)
    }
}

/// The signed-in user, as far as sync is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Local identifier, stored as `owner_id` on records
    pub id: UserId,
    /// Identifier of the same user in the remote store
    pub remote_id: String,
    pub tier: Tier,
}

impl User {
    pub fn new(id: impl Into<UserId>, remote_id: impl Into<String>, tier: Tier) -> Self {
        Self {
            id: id.into(),
            remote_id: remote_id.into(),
            tier,
        }
    }
}

/// Holds the current user.
#[derive(Debug)]
pub struct Session {
    user: watch::Sender<Option<User>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session with nobody signed in.
    pub fn new() -> Self {
        let (user, _) = watch::channel(None);
        Self { user }
    }

    pub fn signed_in(user: User) -> Self {
        let session = Self::new();
        session.sign_in(user);
        session
    }

    pub fn sign_in(&self, user: User) {
        tracing::debug!(user_id = %user.id, "session user set");
        self.user.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        self.user.send_replace(None);
    }

    pub fn current_user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }
}

/// Reports whether the device can currently reach the network.
pub trait ConnectivityOracle: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity fed by the platform through [`WatchConnectivity::set_online`].
#[derive(Debug)]
pub struct WatchConnectivity {
    online: watch::Sender<bool>,
}

impl WatchConnectivity {
    pub fn new(online: bool) -> Self {
        let (online, _) = watch::channel(online);
        Self { online }
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.online.send_replace(online);
        if previous != online {
            tracing::info!(online, "connectivity changed");
        }
    }

    /// Subscribe to connectivity changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }
}

impl ConnectivityOracle for WatchConnectivity {
    fn is_online(&self) -> bool {
        *self.online.borrow()
    }
}

/// Determines whether a user's tier permits remote sync.
pub trait EntitlementGate: Send + Sync {
    fn tier_of(&self, user: &User) -> Tier;
}

/// Trusts the tier carried on the session user.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserTierGate;

impl EntitlementGate for UserTierGate {
    fn tier_of(&self, user: &User) -> Tier {
        user.tier
    }
}

/// Tier registry updated at runtime, e.g. after a purchase.
///
/// Users without an entry fall back to the tier on the [`User`].
#[derive(Debug)]
pub struct AccountTiers {
    tiers: DashMap<UserId, Tier>,
    upgrades: watch::Sender<u64>,
}

impl Default for AccountTiers {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountTiers {
    pub fn new() -> Self {
        let (upgrades, _) = watch::channel(0);
        Self {
            tiers: DashMap::new(),
            upgrades,
        }
    }

    /// Set a user's tier. Moving onto a sync-enabled tier from one that was
    /// not notifies upgrade subscribers.
    pub fn set_tier(&self, user: &User, tier: Tier) {
        let previous = self
            .tiers
            .insert(user.id.clone(), tier)
            .unwrap_or(user.tier);
        if tier.allows_remote_sync() && !previous.allows_remote_sync() {
            tracing::info!(user_id = %user.id, "entitlement upgraded");
            self.upgrades.send_modify(|generation| *generation += 1);
        }
    }

    pub fn clear(&self, user_id: &str) {
        self.tiers.remove(user_id);
    }

    /// Receives a new value after every upgrade.
    pub fn subscribe_upgrades(&self) -> watch::Receiver<u64> {
        self.upgrades.subscribe()
    }
}

impl EntitlementGate for AccountTiers {
    fn tier_of(&self, user: &User) -> Tier {
        self.tiers
            .get(&user.id)
            .map(|tier| *tier)
            .unwrap_or(user.tier)
    }
}

/// Source of identifiers for new records.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> RecordId;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> RecordId {
        uuid::Uuid::new_v4().to_string()
    }
}
