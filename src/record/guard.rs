use super::RecordRef;
use std::collections::HashMap;
use std::sync::PoisonError;

/// Per-record map of callback name to "currently executing".
///
/// Prevents a validate/save entry point from re-entering itself on the same
/// record while walking a cyclic object graph.
#[derive(Debug, Clone, Default)]
pub struct RecursionGuard {
    executing: HashMap<String, bool>,
}

impl RecursionGuard {
    pub fn is_executing(&self, callback: &str) -> bool {
        self.executing.get(callback).copied().unwrap_or(false)
    }

    /// Names of callbacks currently marked as executing.
    pub fn executing(&self) -> Vec<&str> {
        self.executing
            .iter()
            .filter(|(_, active)| **active)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub(crate) fn try_enter(&mut self, callback: &str) -> bool {
        if self.is_executing(callback) {
            return false;
        }
        self.executing.insert(callback.to_string(), true);
        true
    }

    pub(crate) fn exit(&mut self, callback: &str) {
        self.executing.insert(callback.to_string(), false);
    }
}

/// Scoped acquisition of a [`RecursionGuard`] entry.
///
/// The flag is cleared when the token drops, on success, on an `Err` return and
/// on unwind alike.
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct GuardToken {
    record: RecordRef,
    callback: String,
}

impl GuardToken {
    pub(crate) fn acquire(record: &RecordRef, callback: &str) -> crate::core::Result<Option<Self>> {
        let entered = record.write()?.guard_mut().try_enter(callback);
        Ok(entered.then(|| Self {
            record: record.clone(),
            callback: callback.to_string(),
        }))
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        let mut record = self
            .record
            .inner()
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        record.guard_mut().exit(&self.callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    #[test]
    fn test_second_acquire_is_refused_until_release() {
        let record = RecordRef::new(Record::new("Lesson"));

        let token = GuardToken::acquire(&record, "validate_associated_records_for_exams")
            .unwrap()
            .expect("first acquire");
        assert!(
            GuardToken::acquire(&record, "validate_associated_records_for_exams")
                .unwrap()
                .is_none()
        );
        // Other callback names are independent.
        assert!(
            GuardToken::acquire(&record, "autosave_associated_records_for_exams")
                .unwrap()
                .is_some()
        );

        drop(token);
        assert!(record.read().unwrap().guard().executing().is_empty());
        assert!(
            GuardToken::acquire(&record, "validate_associated_records_for_exams")
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_released_on_early_error_return() {
        fn failing(record: &RecordRef) -> crate::core::Result<()> {
            let _token = GuardToken::acquire(record, "autosave_associated_records_for_exams")?;
            Err(crate::core::OgmError::Storage("boom".into()))
        }

        let record = RecordRef::new(Record::new("Lesson"));
        assert!(failing(&record).is_err());
        assert!(
            !record
                .read()
                .unwrap()
                .guard()
                .is_executing("autosave_associated_records_for_exams")
        );
    }
}
