// ============================================================================
// Association Reflection
// ============================================================================
//
// Per-model, immutable metadata about declared associations. Descriptors are
// built once when a model type is defined and are read-only afterwards.
//
// ============================================================================

pub mod descriptor;
pub mod registry;

pub use descriptor::{AssociationBuilder, AssociationReflection, Cardinality, Direction};
pub use registry::ReflectionRegistry;
