pub mod guard;
pub mod materialization;
#[allow(clippy::module_inception)]
pub mod record;

pub use guard::{GuardToken, RecursionGuard};
pub use materialization::Materialization;
pub use record::{Record, RecordRef};
pub(crate) use record::RecordState;
