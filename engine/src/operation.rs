//! Operation types for expressing user mutations.
//!
//! A commit is driven by an operation rather than a loose `is_create` flag,
//! so create and update carry exactly the fields they need.

use crate::{CollectionName, RecordId};
use serde::{Deserialize, Serialize};

/// Create a new record. The engine assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOp {
    /// Target collection
    pub collection: CollectionName,
    /// Initial payload
    pub payload: serde_json::Value,
}

impl CreateOp {
    pub fn new(collection: impl Into<CollectionName>, payload: serde_json::Value) -> Self {
        Self {
            collection: collection.into(),
            payload,
        }
    }
}

/// Update an existing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOp {
    /// Record ID to update
    pub id: RecordId,
    /// Target collection
    pub collection: CollectionName,
    /// New payload (full replacement); `None` keeps the current payload
    pub payload: Option<serde_json::Value>,
    /// Active flag after the update; `None` keeps the current flag
    pub active: Option<bool>,
}

impl UpdateOp {
    pub fn new(
        collection: impl Into<CollectionName>,
        id: impl Into<RecordId>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            payload: Some(payload),
            active: None,
        }
    }

    /// Soft delete: keep the payload, clear the active flag.
    pub fn deactivate(collection: impl Into<CollectionName>, id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            payload: None,
            active: Some(false),
        }
    }

    /// Undo a soft delete, keeping the payload.
    pub fn reactivate(collection: impl Into<CollectionName>, id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            payload: None,
            active: Some(true),
        }
    }
}

/// A mutation handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Create(CreateOp),
    Update(UpdateOp),
}

impl Operation {
    pub fn is_create(&self) -> bool {
        matches!(self, Operation::Create(_))
    }

    /// Get the collection this operation targets.
    pub fn collection(&self) -> &CollectionName {
        match self {
            Operation::Create(op) => &op.collection,
            Operation::Update(op) => &op.collection,
        }
    }

    /// The target record ID, known only for updates.
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            Operation::Create(_) => None,
            Operation::Update(op) => Some(&op.id),
        }
    }
}

impl From<CreateOp> for Operation {
    fn from(op: CreateOp) -> Self {
        Operation::Create(op)
    }
}

impl From<UpdateOp> for Operation {
    fn from(op: UpdateOp) -> Self {
        Operation::Update(op)
    }
}
