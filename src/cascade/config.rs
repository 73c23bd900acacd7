/// Cascade engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeConfig {
    /// Message added under the association name when a non-autosave
    /// association holds an invalid record
    pub invalid_association_message: String,

    /// Joins association and field in copied error keys (`lessons.name`)
    pub nested_attribute_separator: String,

    /// Restore the in-memory state of every touched record on rollback
    pub restore_state_on_rollback: bool,
}

impl CascadeConfig {
    /// Create a configuration with the default messages
    pub fn new() -> Self {
        Self {
            invalid_association_message: "is invalid".to_string(),
            nested_attribute_separator: ".".to_string(),
            restore_state_on_rollback: true,
        }
    }

    /// Set the generic invalid-association message
    pub fn invalid_association_message(mut self, message: &str) -> Self {
        self.invalid_association_message = message.to_string();
        self
    }

    /// Set the separator used in nested error keys
    pub fn nested_attribute_separator(mut self, separator: &str) -> Self {
        self.nested_attribute_separator = separator.to_string();
        self
    }

    /// Enable or disable in-memory state restoration on rollback
    pub fn restore_state_on_rollback(mut self, restore: bool) -> Self {
        self.restore_state_on_rollback = restore;
        self
    }

    /// Error key for `field` of a record reached through `association`
    pub fn nested_key(&self, association: &str, field: &str) -> String {
        format!("{}{}{}", association, self.nested_attribute_separator, field)
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CascadeConfig::default();
        assert_eq!(config.invalid_association_message, "is invalid");
        assert_eq!(config.nested_key("lessons", "name"), "lessons.name");
        assert!(config.restore_state_on_rollback);
    }

    #[test]
    fn test_builder_pattern() {
        let config = CascadeConfig::new()
            .invalid_association_message("has problems")
            .nested_attribute_separator("/")
            .restore_state_on_rollback(false);

        assert_eq!(config.invalid_association_message, "has problems");
        assert_eq!(config.nested_key("exams", "title"), "exams/title");
        assert!(!config.restore_state_on_rollback);
    }
}
