use super::RecordRef;
use crate::reflection::Cardinality;

/// The already-loaded snapshot of one association on one record.
#[derive(Debug, Clone)]
pub enum Materialization {
    Single(Option<RecordRef>),
    /// Insertion ordered. Duplicates are kept if the loader produced them.
    Collection(Vec<RecordRef>),
}

impl Materialization {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Materialization::Single(_) => Cardinality::Single,
            Materialization::Collection(_) => Cardinality::Collection,
        }
    }

    pub fn records(&self) -> Vec<RecordRef> {
        match self {
            Materialization::Single(target) => target.iter().cloned().collect(),
            Materialization::Collection(targets) => targets.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Materialization::Single(target) => usize::from(target.is_some()),
            Materialization::Collection(targets) => targets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, record: &RecordRef) -> bool {
        match self {
            Materialization::Single(target) => target.as_ref().is_some_and(|t| t.ptr_eq(record)),
            Materialization::Collection(targets) => targets.iter().any(|t| t.ptr_eq(record)),
        }
    }
}

/// A materialization plus the owner key its relationship query was scoped on.
#[derive(Debug, Clone)]
pub(crate) struct LoadedAssociation {
    pub(crate) target: Materialization,
    pub(crate) scope_key: Option<String>,
}
