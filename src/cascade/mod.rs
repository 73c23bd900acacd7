// ============================================================================
// Cascading Persistence
// ============================================================================
//
// Given a root record about to be saved, walks its loaded associations and
// decides what to validate, insert, save and destroy. Every step runs inside
// the transaction of the top-level call; a failing autosave step requests a
// rollback on that transaction instead of unwinding.
//
// Association entry points are re-entrant through cyclic object graphs, so
// each runs under the owning record's RecursionGuard.
//
// ============================================================================

mod collection;
pub mod config;
pub mod context;
pub mod engine;
mod lifecycle;
pub mod outcome;
pub mod runtime;
mod single;
mod validation;

pub use config::CascadeConfig;
pub use context::{CascadeContext, DetachedFailure};
pub use engine::CascadeEngine;
pub use outcome::SaveOutcome;
pub use runtime::{AssociationRuntime, LoadedAssociations};
