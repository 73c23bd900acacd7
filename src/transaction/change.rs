// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Command Pattern for staged graph writes. Each Change is recorded during the
// cascade, applied on COMMIT and discarded on ROLLBACK.
//
// ============================================================================

use crate::core::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A directed, typed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipKey {
    pub from: String,
    pub to: String,
    pub rel_type: String,
}

impl RelationshipKey {
    pub fn new(from: &str, to: &str, rel_type: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            rel_type: rel_type.to_string(),
        }
    }
}

/// A single staged change in a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    CreateNode {
        id: String,
        label: String,
        properties: BTreeMap<String, Value>,
    },

    /// Only the changed properties are carried.
    UpdateNode {
        id: String,
        properties: BTreeMap<String, Value>,
    },

    /// Deletes the node and detaches every relationship touching it.
    DeleteNode { id: String },

    MergeRelationship { relationship: RelationshipKey },
}

impl Change {
    /// Node id this change writes, for relationship merges the start node.
    pub fn node_id(&self) -> &str {
        match self {
            Change::CreateNode { id, .. } => id,
            Change::UpdateNode { id, .. } => id,
            Change::DeleteNode { id } => id,
            Change::MergeRelationship { relationship } => &relationship.from,
        }
    }

    pub fn is_relationship_write(&self) -> bool {
        matches!(self, Change::MergeRelationship { .. })
    }

    pub fn is_node_write(&self) -> bool {
        !self.is_relationship_write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_classification() {
        let merge = Change::MergeRelationship {
            relationship: RelationshipKey::new("a", "b", "LESSONS"),
        };
        assert!(merge.is_relationship_write());
        assert_eq!(merge.node_id(), "a");

        let delete = Change::DeleteNode { id: "b".into() };
        assert!(delete.is_node_write());
        assert_eq!(delete.node_id(), "b");
    }
}
