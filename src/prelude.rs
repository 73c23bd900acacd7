//! Recommended imports grouped by abstraction level.
//!
//! `dx` covers declaring models and saving object graphs.
//! `advanced` is an escape hatch for custom stores and association runtimes.

pub mod dx {
    //! Everyday surface: schema declaration, records and the engine.
    pub use crate::{
        CascadeEngine, Direction, ModelBuilder, OgmError, Record, RecordRef, Result, SaveOutcome,
        Schema, Value, in_memory,
    };
}

pub mod advanced {
    //! Collaborator traits and the pieces the engine is built from.
    pub use crate::cascade::{AssociationRuntime, CascadeConfig, CascadeContext, LoadedAssociations};
    pub use crate::storage::{GraphStore, StoredNode};
    pub use crate::transaction::{RelationshipKey, TransactionId};
}
