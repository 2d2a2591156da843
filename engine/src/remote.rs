//! Remote store contract.
//!
//! A remote call either succeeds or fails with a [`RemoteError`]. The engine
//! turns that into a [`PushOutcome`] and decides the record's status from
//! it; remote errors never propagate to callers of `commit`.

use crate::{CollectionName, RecordId, RemoteError, SyncableRecord, Timestamp, User};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What is sent to the remote store for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePush {
    pub id: RecordId,
    pub collection: CollectionName,
    /// The owner's identifier in the remote store
    pub owner_remote_id: String,
    pub payload: serde_json::Value,
    pub active: bool,
    pub updated_at: Timestamp,
}

impl RemotePush {
    pub fn from_record(record: &SyncableRecord, owner: &User) -> Self {
        Self {
            id: record.id.clone(),
            collection: record.collection.clone(),
            owner_remote_id: owner.remote_id.clone(),
            payload: record.payload.clone(),
            active: record.active,
            updated_at: record.updated_at,
        }
    }
}

/// Acknowledgement returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAck {
    pub id: RecordId,
    /// Remote-side revision, if the store keeps one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

/// Which remote call a push needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushKind {
    Create,
    Update,
}

impl PushKind {
    /// A record the remote store has never acknowledged is created there,
    /// even when the local change was an update.
    pub fn for_record(record: &SyncableRecord) -> Self {
        if record.is_known_remotely() {
            PushKind::Update
        } else {
            PushKind::Create
        }
    }
}

/// Result of one push attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Pushed(RemoteAck),
    Failed(RemoteError),
}

impl PushOutcome {
    pub fn is_pushed(&self) -> bool {
        matches!(self, PushOutcome::Pushed(_))
    }
}

impl From<Result<RemoteAck, RemoteError>> for PushOutcome {
    fn from(result: Result<RemoteAck, RemoteError>) -> Self {
        match result {
            Ok(ack) => PushOutcome::Pushed(ack),
            Err(err) => PushOutcome::Failed(err),
        }
    }
}

/// Network-accessible authoritative store.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn create_remote(&self, push: &RemotePush) -> Result<RemoteAck, RemoteError>;

    async fn update_remote(&self, id: &str, push: &RemotePush) -> Result<RemoteAck, RemoteError>;

    /// Issue the call matching `kind`.
    async fn push(&self, kind: PushKind, push: &RemotePush) -> PushOutcome {
        match kind {
            PushKind::Create => self.create_remote(push).await.into(),
            PushKind::Update => self.update_remote(&push.id, push).await.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tier;
    use serde_json::json;

    #[test]
    fn push_kind_follows_remote_knowledge() {
        let mut record = SyncableRecord::new("b-1", "budgets", "u-1", json!({}), 1000);
        assert_eq!(PushKind::for_record(&record), PushKind::Create);

        record.mark_synced(1100);
        assert_eq!(PushKind::for_record(&record), PushKind::Update);
    }

    #[test]
    fn push_carries_remote_owner() {
        let record = SyncableRecord::new("b-1", "budgets", "u-1", json!({"amount": 5}), 1000);
        let owner = User::new("u-1", "remote-7", Tier::Paid);
        let push = RemotePush::from_record(&record, &owner);

        assert_eq!(push.id, "b-1");
        assert_eq!(push.owner_remote_id, "remote-7");
        assert_eq!(push.payload, json!({"amount": 5}));
        assert!(push.active);
    }

    #[test]
    fn outcome_from_result() {
        let ok: PushOutcome = Ok(RemoteAck {
            id: "b-1".into(),
            revision: None,
        })
        .into();
        assert!(ok.is_pushed());

        let failed: PushOutcome = Err(RemoteError::Timeout).into();
        assert_eq!(failed, PushOutcome::Failed(RemoteError::Timeout));
    }
}
