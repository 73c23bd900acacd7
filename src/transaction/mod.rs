// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Design Patterns Used:
// - State Pattern: Transaction state management (Active, Committed, Aborted)
// - Command Pattern: Staged graph writes applied on commit
//
// ============================================================================

pub mod change;
pub mod state;

pub use change::{Change, RelationshipKey};
pub use state::{Transaction, TransactionId, TransactionState};
