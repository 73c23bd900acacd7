use thiserror::Error;

#[derive(Error, Debug)]
pub enum OgmError {
    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    #[error("Model '{0}' already defined")]
    ModelExists(String),

    #[error("Association '{association}' not found on model '{model}'")]
    AssociationNotFound { model: String, association: String },

    #[error("Association '{association}' already declared on model '{model}'")]
    DuplicateAssociation { model: String, association: String },

    #[error("Association '{association}' is not loaded on this {model} record")]
    AssociationNotLoaded { model: String, association: String },

    #[error("Association '{association}' on model '{model}' is not a {expected} association")]
    CardinalityMismatch {
        model: String,
        association: String,
        expected: &'static str,
    },

    #[error("Cannot {operation} a destroyed {model} record")]
    RecordDestroyed {
        model: String,
        operation: &'static str,
    },

    #[error("Record '{0}' not found in the store")]
    RecordNotFound(String),

    #[error("No active transaction: {0}")]
    NoActiveTransaction(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

impl OgmError {
    /// Errors raised by misuse of the mapping API rather than by the store.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::ModelNotFound(_)
                | Self::ModelExists(_)
                | Self::AssociationNotFound { .. }
                | Self::DuplicateAssociation { .. }
                | Self::AssociationNotLoaded { .. }
                | Self::CardinalityMismatch { .. }
                | Self::RecordDestroyed { .. }
                | Self::NoActiveTransaction(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OgmError>;

impl<T> From<std::sync::PoisonError<T>> for OgmError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_programming_errors_are_classified() {
        let err = OgmError::AssociationNotFound {
            model: "Student".into(),
            association: "pets".into(),
        };
        assert!(err.is_programming_error());
        assert_eq!(
            err.to_string(),
            "Association 'pets' not found on model 'Student'"
        );

        assert!(!OgmError::Storage("disk full".into()).is_programming_error());
    }
}
