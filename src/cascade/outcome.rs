use super::DetachedFailure;
use crate::core::RecordErrors;
use serde::Serialize;

/// Result of a top-level [`CascadeEngine::save`](super::CascadeEngine::save).
///
/// Storage and programming errors are returned as `Err` instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// Committed. Non-autosave associated records that failed to save are
    /// listed but did not fail the save.
    Saved {
        detached_failures: Vec<DetachedFailure>,
    },
    /// The root failed validation; nothing was written.
    Invalid { errors: RecordErrors },
    /// A cascade step failed or a `before_save` callback halted; every write
    /// was rolled back.
    RolledBack { reason: String },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, SaveOutcome::Invalid { .. })
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self, SaveOutcome::RolledBack { .. })
    }

    pub fn errors(&self) -> Option<&RecordErrors> {
        match self {
            SaveOutcome::Invalid { errors } => Some(errors),
            _ => None,
        }
    }

    pub fn detached_failures(&self) -> &[DetachedFailure] {
        match self {
            SaveOutcome::Saved { detached_failures } => detached_failures,
            _ => &[],
        }
    }

    /// The outcome as a JSON report.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        let saved = SaveOutcome::Saved {
            detached_failures: Vec::new(),
        };
        assert!(saved.is_saved());
        assert!(saved.errors().is_none());

        let mut errors = RecordErrors::new();
        errors.add("name", "can't be blank");
        let invalid = SaveOutcome::Invalid { errors };
        assert!(invalid.is_invalid());
        assert_eq!(invalid.errors().unwrap().get("name"), ["can't be blank"]);
        assert!(invalid.detached_failures().is_empty());
    }

    #[test]
    fn test_json_report() {
        let outcome = SaveOutcome::RolledBack {
            reason: "could not insert associated record through 'lessons'".into(),
        };
        let report = outcome.to_json();
        assert_eq!(report["status"], "rolled_back");
        assert!(report["reason"].as_str().unwrap().contains("lessons"));
    }
}
