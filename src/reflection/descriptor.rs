use serde::{Deserialize, Serialize};
use std::fmt;

/// How many target records an association holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// `has_one`
    Single,
    /// `has_many`
    Collection,
}

impl Cardinality {
    pub fn macro_name(&self) -> &'static str {
        match self {
            Cardinality::Single => "has_one",
            Cardinality::Collection => "has_many",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.macro_name())
    }
}

/// Orientation of the relationship relative to the owning node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Immutable metadata for one declared association.
///
/// Built once when a model type is defined and shared through `Arc` by every
/// record of that type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationReflection {
    name: String,
    owner_model: String,
    cardinality: Cardinality,
    direction: Direction,
    relationship_type: String,
    target_models: Vec<String>,
    relationship_class: Option<String>,
    autosave: Option<bool>,
    cascade_validate: bool,
    foreign_key: String,
    primary_key: Option<String>,
    through: Option<String>,
}

impl AssociationReflection {
    pub fn has_many(owner_model: &str, name: &str) -> AssociationBuilder {
        AssociationBuilder::new(owner_model, name, Cardinality::Collection)
    }

    pub fn has_one(owner_model: &str, name: &str) -> AssociationBuilder {
        AssociationBuilder::new(owner_model, name, Cardinality::Single)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_model(&self) -> &str {
        &self.owner_model
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_collection(&self) -> bool {
        self.cardinality == Cardinality::Collection
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The graph relationship type, e.g. `LESSONS`.
    pub fn relationship_type(&self) -> &str {
        &self.relationship_type
    }

    pub fn target_models(&self) -> &[String] {
        &self.target_models
    }

    /// Name of the first target model.
    pub fn class_name(&self) -> Option<&str> {
        self.target_models.first().map(String::as_str)
    }

    pub fn relationship_class(&self) -> Option<&str> {
        self.relationship_class.as_deref()
    }

    /// `None` when autosave was never configured, `Some(false)` when it was
    /// explicitly turned off.
    pub fn autosave(&self) -> Option<bool> {
        self.autosave
    }

    pub fn cascade_on_save(&self) -> bool {
        self.autosave == Some(true)
    }

    /// Explicit `autosave: false` disables linking entirely.
    pub fn autosave_disabled(&self) -> bool {
        self.autosave == Some(false)
    }

    pub fn cascade_validate(&self) -> bool {
        self.cascade_validate
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Association that writes this relationship, when it is derived.
    pub fn through(&self) -> Option<&str> {
        self.through.as_deref()
    }

    pub fn is_through(&self) -> bool {
        self.through.is_some()
    }

    pub fn save_callback_name(&self) -> String {
        format!("autosave_associated_records_for_{}", self.name)
    }

    pub fn validation_callback_name(&self) -> String {
        format!("validate_associated_records_for_{}", self.name)
    }
}

/// Builder for [`AssociationReflection`].
#[derive(Debug, Clone)]
pub struct AssociationBuilder {
    reflection: AssociationReflection,
}

impl AssociationBuilder {
    fn new(owner_model: &str, name: &str, cardinality: Cardinality) -> Self {
        Self {
            reflection: AssociationReflection {
                name: name.to_string(),
                owner_model: owner_model.to_string(),
                cardinality,
                direction: Direction::Outgoing,
                relationship_type: name.to_uppercase(),
                target_models: Vec::new(),
                relationship_class: None,
                autosave: None,
                cascade_validate: true,
                foreign_key: format!("{}_id", snake_case(owner_model)),
                primary_key: None,
                through: None,
            },
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.reflection.direction = direction;
        self
    }

    pub fn relationship_type(mut self, relationship_type: &str) -> Self {
        self.reflection.relationship_type = relationship_type.to_string();
        self
    }

    pub fn target(mut self, model: &str) -> Self {
        self.reflection.target_models.push(model.to_string());
        self
    }

    pub fn relationship_class(mut self, class_name: &str) -> Self {
        self.reflection.relationship_class = Some(class_name.to_string());
        self
    }

    pub fn autosave(mut self, autosave: bool) -> Self {
        self.reflection.autosave = Some(autosave);
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.reflection.cascade_validate = validate;
        self
    }

    pub fn foreign_key(mut self, field: &str) -> Self {
        self.reflection.foreign_key = field.to_string();
        self
    }

    pub fn primary_key(mut self, field: &str) -> Self {
        self.reflection.primary_key = Some(field.to_string());
        self
    }

    pub fn through(mut self, association: &str) -> Self {
        self.reflection.through = Some(association.to_string());
        self
    }

    pub fn build(self) -> AssociationReflection {
        self.reflection
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let reflection = AssociationReflection::has_many("Student", "lessons")
            .target("Lesson")
            .build();

        assert!(reflection.is_collection());
        assert_eq!(reflection.autosave(), None);
        assert!(!reflection.cascade_on_save());
        assert!(!reflection.autosave_disabled());
        assert!(reflection.cascade_validate());
        assert_eq!(reflection.relationship_type(), "LESSONS");
        assert_eq!(reflection.class_name(), Some("Lesson"));
        assert_eq!(reflection.foreign_key(), "student_id");
        assert_eq!(
            reflection.save_callback_name(),
            "autosave_associated_records_for_lessons"
        );
    }

    #[test]
    fn test_foreign_key_from_camel_case_owner() {
        let reflection = AssociationReflection::has_one("ReportCard", "top_student")
            .autosave(false)
            .build();
        assert_eq!(reflection.foreign_key(), "report_card_id");
        assert!(reflection.autosave_disabled());
        assert_eq!(reflection.cardinality().to_string(), "has_one");
    }
}
