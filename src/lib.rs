// ============================================================================
// RustOGM Library
// ============================================================================
//
// Object-graph mapping with cascading persistence: records bound to graph
// nodes, associations bound to relationships, and an engine that validates,
// saves and destroys whole loaded object graphs in one transaction.
//
// ============================================================================

pub mod cascade;
pub mod core;
pub mod model;
pub mod prelude;
pub mod record;
pub mod reflection;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use cascade::{CascadeConfig, CascadeContext, CascadeEngine, DetachedFailure, SaveOutcome};
pub use core::{OgmError, RecordErrors, Result, Value};
pub use model::{LifecycleEvent, Model, ModelBuilder, Schema};
pub use record::{Materialization, Record, RecordRef};
pub use reflection::{AssociationReflection, Cardinality, Direction, ReflectionRegistry};
pub use storage::{GraphStore, MemoryGraphStore};

/// Builds a cascade engine over an in-memory graph.
///
/// # Examples
///
/// ```
/// use rustogm::{ModelBuilder, Record, RecordRef, Schema};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = Schema::builder()
///     .model(ModelBuilder::new("Student").has_many("lessons", |a| a.target("Lesson").autosave(true)))?
///     .model(ModelBuilder::new("Lesson").validates_presence_of("subject"))?
///     .build();
/// let (engine, store) = rustogm::in_memory(schema);
///
/// let student = RecordRef::new(Record::new("Student").with("name", "Chris"));
/// student.push_target("lessons", RecordRef::new(Record::new("Lesson").with("subject", "Math")))?;
///
/// assert!(engine.save(&student)?.is_saved());
/// assert_eq!(store.relationships()?.len(), 1);
/// # Ok(())
/// # }
/// ```
pub fn in_memory(schema: Schema) -> (CascadeEngine, std::sync::Arc<MemoryGraphStore>) {
    let store = std::sync::Arc::new(MemoryGraphStore::new());
    let engine = CascadeEngine::new(schema, store.clone());
    (engine, store)
}
