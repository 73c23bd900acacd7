pub mod error;
pub mod errors;
pub mod value;

pub use error::{OgmError, Result};
pub use errors::RecordErrors;
pub use value::Value;
