// ============================================================================
// Model Types
// ============================================================================
//
// A model type bundles its own validators, ordered lifecycle callback chains
// and the table of per-association autosave/validate entry points. Models are
// declared with `ModelBuilder` and frozen into a `Schema`.
//
// ============================================================================

pub mod callbacks;
pub mod definition;
pub mod schema;

pub use callbacks::{CallbackChain, CallbackFn, LifecycleEvent, NamedCallback};
pub use definition::{LinkHook, Model, ModelBuilder, ValidatorFn};
pub use schema::{Schema, SchemaBuilder};
