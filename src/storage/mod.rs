// ============================================================================
// Graph Storage
// ============================================================================
//
// The storage collaborator consumed by the cascade engine: transactions plus
// idempotent node and relationship primitives. `MemoryGraphStore` is the
// in-process implementation used by tests and embedded callers.
//
// ============================================================================

pub mod memory;

use crate::core::{Result, Value};
use crate::transaction::{RelationshipKey, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use memory::{MemoryGraphStore, StoreStats};

/// A committed node as seen by readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNode {
    pub id: String,
    pub label: String,
    pub properties: BTreeMap<String, Value>,
}

/// Transactional graph storage.
///
/// Every write is scoped to a transaction obtained from
/// [`GraphStore::begin_transaction`]; nothing becomes visible to
/// [`GraphStore::fetch_node`] before [`GraphStore::commit`].
pub trait GraphStore: Send + Sync {
    fn begin_transaction(&self) -> Result<TransactionId>;

    fn commit(&self, tx: TransactionId) -> Result<()>;

    fn rollback(&self, tx: TransactionId) -> Result<()>;

    /// Creates a node and returns its generated id.
    fn create_node(
        &self,
        tx: TransactionId,
        label: &str,
        properties: &BTreeMap<String, Value>,
    ) -> Result<String>;

    /// Overwrites the given properties, leaving the others untouched.
    fn update_node(
        &self,
        tx: TransactionId,
        id: &str,
        properties: &BTreeMap<String, Value>,
    ) -> Result<()>;

    /// Deletes a node together with its relationships.
    fn delete_node(&self, tx: TransactionId, id: &str) -> Result<()>;

    /// Creates the relationship unless it already exists. Returns whether it
    /// was created.
    fn merge_relationship(&self, tx: TransactionId, relationship: &RelationshipKey)
    -> Result<bool>;

    fn fetch_node(&self, id: &str) -> Result<Option<StoredNode>>;
}
