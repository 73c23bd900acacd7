use super::{GraphStore, StoredNode};
use crate::core::{OgmError, Result, Value};
use crate::transaction::{Change, RelationshipKey, Transaction, TransactionId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;
use tracing::{Level, event};
use uuid::Uuid;

/// Counters over the lifetime of a [`MemoryGraphStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub commits: usize,
    pub rollbacks: usize,
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub nodes_deleted: usize,
    pub relationships_created: usize,
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: HashMap<String, StoredNode>,
    relationships: BTreeSet<RelationshipKey>,
    transactions: HashMap<TransactionId, Transaction>,
    stats: StoreStats,
}

impl GraphState {
    fn active(&mut self, tx: TransactionId) -> Result<&mut Transaction> {
        self.transactions
            .get_mut(&tx)
            .ok_or_else(|| OgmError::Transaction(format!("Transaction {} not found", tx)))
    }

    /// Whether `id` exists from the point of view of transaction `tx`.
    fn node_visible(&self, tx: TransactionId, id: &str) -> bool {
        let mut visible = self.nodes.contains_key(id);
        if let Some(transaction) = self.transactions.get(&tx) {
            for change in transaction.changes() {
                match change {
                    Change::CreateNode { id: created, .. } if created == id => visible = true,
                    Change::DeleteNode { id: deleted } if deleted == id => visible = false,
                    _ => {}
                }
            }
        }
        visible
    }

    fn apply(&mut self, change: Change) {
        match change {
            Change::CreateNode {
                id,
                label,
                properties,
            } => {
                self.nodes.insert(
                    id.clone(),
                    StoredNode {
                        id,
                        label,
                        properties,
                    },
                );
                self.stats.nodes_created += 1;
            }
            Change::UpdateNode { id, properties } => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.properties.extend(properties);
                    self.stats.nodes_updated += 1;
                }
            }
            Change::DeleteNode { id } => {
                if self.nodes.remove(&id).is_some() {
                    self.relationships
                        .retain(|rel| rel.from != id && rel.to != id);
                    self.stats.nodes_deleted += 1;
                }
            }
            Change::MergeRelationship { relationship } => {
                if self.nodes.contains_key(&relationship.from)
                    && self.nodes.contains_key(&relationship.to)
                    && self.relationships.insert(relationship)
                {
                    self.stats.relationships_created += 1;
                }
            }
        }
    }
}

/// In-memory transactional graph.
///
/// Writes are staged per transaction and applied in order on commit; a
/// rollback drops them without touching committed state.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    state: RwLock<GraphState>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(self.state.read()?.stats)
    }

    pub fn node_count(&self) -> Result<usize> {
        Ok(self.state.read()?.nodes.len())
    }

    pub fn nodes_with_label(&self, label: &str) -> Result<Vec<StoredNode>> {
        let state = self.state.read()?;
        let mut nodes: Vec<StoredNode> = state
            .nodes
            .values()
            .filter(|node| node.label == label)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    pub fn relationships(&self) -> Result<Vec<RelationshipKey>> {
        Ok(self.state.read()?.relationships.iter().cloned().collect())
    }

    pub fn has_relationship(&self, from: &str, to: &str, rel_type: &str) -> Result<bool> {
        Ok(self
            .state
            .read()?
            .relationships
            .contains(&RelationshipKey::new(from, to, rel_type)))
    }

    pub fn active_transactions(&self) -> Result<usize> {
        Ok(self.state.read()?.transactions.len())
    }

    /// Committed graph as JSON, for diagnostics.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let state = self.state.read()?;
        let nodes: BTreeMap<&String, &StoredNode> = state.nodes.iter().collect();
        Ok(serde_json::json!({
            "nodes": nodes,
            "relationships": state.relationships,
            "stats": state.stats,
        }))
    }
}

impl GraphStore for MemoryGraphStore {
    fn begin_transaction(&self) -> Result<TransactionId> {
        let id = TransactionId::new();
        self.state
            .write()?
            .transactions
            .insert(id, Transaction::new(id));
        event!(Level::DEBUG, tx = %id, "graph transaction started");
        Ok(id)
    }

    fn commit(&self, tx: TransactionId) -> Result<()> {
        let mut state = self.state.write()?;
        let changes = state.active(tx)?.commit()?;
        state.transactions.remove(&tx);

        let change_count = changes.len();
        for change in changes {
            state.apply(change);
        }
        state.stats.commits += 1;
        event!(Level::DEBUG, tx = %tx, change_count, "graph transaction committed");
        Ok(())
    }

    fn rollback(&self, tx: TransactionId) -> Result<()> {
        let mut state = self.state.write()?;
        state.active(tx)?.rollback()?;
        state.transactions.remove(&tx);
        state.stats.rollbacks += 1;
        event!(Level::DEBUG, tx = %tx, "graph transaction rolled back");
        Ok(())
    }

    fn create_node(
        &self,
        tx: TransactionId,
        label: &str,
        properties: &BTreeMap<String, Value>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.state.write()?.active(tx)?.record_change(Change::CreateNode {
            id: id.clone(),
            label: label.to_string(),
            properties: properties.clone(),
        })?;
        Ok(id)
    }

    fn update_node(
        &self,
        tx: TransactionId,
        id: &str,
        properties: &BTreeMap<String, Value>,
    ) -> Result<()> {
        let mut state = self.state.write()?;
        if !state.node_visible(tx, id) {
            return Err(OgmError::Storage(format!("Node '{}' not found", id)));
        }
        state.active(tx)?.record_change(Change::UpdateNode {
            id: id.to_string(),
            properties: properties.clone(),
        })
    }

    fn delete_node(&self, tx: TransactionId, id: &str) -> Result<()> {
        let mut state = self.state.write()?;
        if !state.node_visible(tx, id) {
            return Err(OgmError::Storage(format!("Node '{}' not found", id)));
        }
        state
            .active(tx)?
            .record_change(Change::DeleteNode { id: id.to_string() })
    }

    fn merge_relationship(
        &self,
        tx: TransactionId,
        relationship: &RelationshipKey,
    ) -> Result<bool> {
        let mut state = self.state.write()?;
        for endpoint in [&relationship.from, &relationship.to] {
            if !state.node_visible(tx, endpoint) {
                return Err(OgmError::Storage(format!(
                    "Cannot relate missing node '{}'",
                    endpoint
                )));
            }
        }

        if state.relationships.contains(relationship) {
            return Ok(false);
        }
        let transaction = state.active(tx)?;
        let staged = transaction.changes().iter().any(|change| {
            matches!(change, Change::MergeRelationship { relationship: staged } if staged == relationship)
        });
        if staged {
            return Ok(false);
        }

        transaction.record_change(Change::MergeRelationship {
            relationship: relationship.clone(),
        })?;
        Ok(true)
    }

    fn fetch_node(&self, id: &str) -> Result<Option<StoredNode>> {
        Ok(self.state.read()?.nodes.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(name: &str) -> BTreeMap<String, Value> {
        let mut properties = BTreeMap::new();
        properties.insert("name".to_string(), Value::from(name));
        properties
    }

    #[test]
    fn test_writes_are_invisible_until_commit() {
        let store = MemoryGraphStore::new();
        let tx = store.begin_transaction().unwrap();
        let id = store.create_node(tx, "Student", &props("Chris")).unwrap();

        assert!(store.fetch_node(&id).unwrap().is_none());
        store.commit(tx).unwrap();

        let node = store.fetch_node(&id).unwrap().unwrap();
        assert_eq!(node.label, "Student");
        assert_eq!(node.properties["name"], Value::from("Chris"));
        assert_eq!(store.stats().unwrap().commits, 1);
    }

    #[test]
    fn test_rollback_discards_staged_writes() {
        let store = MemoryGraphStore::new();
        let tx = store.begin_transaction().unwrap();
        store.create_node(tx, "Student", &props("Chris")).unwrap();
        store.rollback(tx).unwrap();

        assert_eq!(store.node_count().unwrap(), 0);
        let stats = store.stats().unwrap();
        assert_eq!(stats.commits, 0);
        assert_eq!(stats.rollbacks, 1);
        assert_eq!(store.active_transactions().unwrap(), 0);
    }

    #[test]
    fn test_merge_relationship_is_idempotent() {
        let store = MemoryGraphStore::new();
        let tx = store.begin_transaction().unwrap();
        let a = store.create_node(tx, "Student", &props("Chris")).unwrap();
        let b = store.create_node(tx, "Lesson", &props("Math")).unwrap();
        let rel = RelationshipKey::new(&a, &b, "LESSONS");

        assert!(store.merge_relationship(tx, &rel).unwrap());
        assert!(!store.merge_relationship(tx, &rel).unwrap());
        store.commit(tx).unwrap();

        let tx = store.begin_transaction().unwrap();
        assert!(!store.merge_relationship(tx, &rel).unwrap());
        store.commit(tx).unwrap();

        assert_eq!(store.relationships().unwrap(), vec![rel]);
        assert_eq!(store.stats().unwrap().relationships_created, 1);
    }

    #[test]
    fn test_delete_detaches_relationships() {
        let store = MemoryGraphStore::new();
        let tx = store.begin_transaction().unwrap();
        let a = store.create_node(tx, "Student", &props("Chris")).unwrap();
        let b = store.create_node(tx, "Lesson", &props("Math")).unwrap();
        store
            .merge_relationship(tx, &RelationshipKey::new(&a, &b, "LESSONS"))
            .unwrap();
        store.commit(tx).unwrap();

        let tx = store.begin_transaction().unwrap();
        store.delete_node(tx, &b).unwrap();
        assert!(store.update_node(tx, &b, &props("Science")).is_err());
        store.commit(tx).unwrap();

        assert!(store.fetch_node(&b).unwrap().is_none());
        assert!(store.relationships().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_transaction_is_rejected() {
        let store = MemoryGraphStore::new();
        let tx = store.begin_transaction().unwrap();
        store.commit(tx).unwrap();
        assert!(store.create_node(tx, "Student", &props("Chris")).is_err());
        assert!(store.rollback(tx).is_err());
    }

    #[test]
    fn test_json_dump() {
        let store = MemoryGraphStore::new();
        let tx = store.begin_transaction().unwrap();
        store.create_node(tx, "Exam", &props("Midterm")).unwrap();
        store.commit(tx).unwrap();

        let dump = store.to_json().unwrap();
        assert_eq!(dump["stats"]["nodes_created"], 1);
        assert_eq!(dump["nodes"].as_object().unwrap().len(), 1);
    }
}
