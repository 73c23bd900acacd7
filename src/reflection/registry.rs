use super::{AssociationReflection, Cardinality};
use crate::core::{OgmError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Associations of one model in declaration order.
#[derive(Debug, Clone, Default)]
struct ModelReflections {
    ordered: Vec<Arc<AssociationReflection>>,
    by_name: HashMap<String, usize>,
}

/// Association metadata for every model type.
///
/// Copy-on-write: registering clones the inner map and swaps the `Arc`, so
/// readers holding an older registry never observe a partial update and never
/// take a lock.
#[derive(Debug, Clone, Default)]
pub struct ReflectionRegistry {
    models: Arc<HashMap<String, ModelReflections>>,
}

impl ReflectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a NEW registry containing `reflection`; `self` is consumed.
    pub fn with_association(
        mut self,
        reflection: impl Into<Arc<AssociationReflection>>,
    ) -> Result<Self> {
        self.register(reflection)?;
        Ok(self)
    }

    pub fn register(
        &mut self,
        reflection: impl Into<Arc<AssociationReflection>>,
    ) -> Result<Arc<AssociationReflection>> {
        let reflection = reflection.into();
        let model = reflection.owner_model().to_string();
        let name = reflection.name().to_string();

        if self
            .models
            .get(&model)
            .is_some_and(|entries| entries.by_name.contains_key(&name))
        {
            return Err(OgmError::DuplicateAssociation {
                model,
                association: name,
            });
        }

        let mut models = (*self.models).clone();
        let entries = models.entry(model).or_default();
        entries.by_name.insert(name, entries.ordered.len());
        entries.ordered.push(reflection.clone());
        self.models = Arc::new(models);

        Ok(reflection)
    }

    /// Looks up a declared association. An unknown name is a programming error.
    pub fn lookup(&self, model: &str, name: &str) -> Result<Arc<AssociationReflection>> {
        self.reflect_on_association(model, name)
            .cloned()
            .ok_or_else(|| OgmError::AssociationNotFound {
                model: model.to_string(),
                association: name.to_string(),
            })
    }

    pub fn reflect_on_association(
        &self,
        model: &str,
        name: &str,
    ) -> Option<&Arc<AssociationReflection>> {
        let entries = self.models.get(model)?;
        entries
            .by_name
            .get(name)
            .and_then(|index| entries.ordered.get(*index))
    }

    /// All associations of `model`, optionally restricted to one cardinality.
    pub fn all_for(
        &self,
        model: &str,
        cardinality: Option<Cardinality>,
    ) -> Vec<Arc<AssociationReflection>> {
        let Some(entries) = self.models.get(model) else {
            return Vec::new();
        };
        entries
            .ordered
            .iter()
            .filter(|reflection| cardinality.is_none_or(|c| reflection.cardinality() == c))
            .cloned()
            .collect()
    }

    pub fn models(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn association_count(&self, model: &str) -> usize {
        self.models
            .get(model)
            .map(|entries| entries.ordered.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lessons() -> AssociationReflection {
        AssociationReflection::has_many("Student", "lessons")
            .target("Lesson")
            .autosave(true)
            .build()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ReflectionRegistry::new().with_association(lessons()).unwrap();

        let found = registry.lookup("Student", "lessons").unwrap();
        assert_eq!(found.name(), "lessons");
        assert!(found.cascade_on_save());
    }

    #[test]
    fn test_unknown_association_is_an_error() {
        let registry = ReflectionRegistry::new().with_association(lessons()).unwrap();

        let err = registry.lookup("Student", "pets").unwrap_err();
        assert!(matches!(err, OgmError::AssociationNotFound { .. }));
        assert!(registry.lookup("Professor", "lessons").is_err());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let registry = ReflectionRegistry::new().with_association(lessons()).unwrap();
        let err = registry.with_association(lessons()).unwrap_err();
        assert!(matches!(err, OgmError::DuplicateAssociation { .. }));
    }

    #[test]
    fn test_all_for_filters_by_cardinality_in_declaration_order() {
        let registry = ReflectionRegistry::new()
            .with_association(AssociationReflection::has_many("Lesson", "students").build())
            .unwrap()
            .with_association(AssociationReflection::has_one("Lesson", "top_student").build())
            .unwrap()
            .with_association(AssociationReflection::has_many("Lesson", "exams").build())
            .unwrap();

        let all: Vec<_> = registry
            .all_for("Lesson", None)
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(all, vec!["students", "top_student", "exams"]);

        let singles = registry.all_for("Lesson", Some(Cardinality::Single));
        assert_eq!(singles.len(), 1);
        assert_eq!(singles[0].name(), "top_student");
        assert!(registry.all_for("Nobody", None).is_empty());
    }

    #[test]
    fn test_older_copy_is_unaffected_by_registration() {
        let before = ReflectionRegistry::new().with_association(lessons()).unwrap();
        let mut after = before.clone();
        after
            .register(AssociationReflection::has_one("Student", "mentor").build())
            .unwrap();

        assert_eq!(before.association_count("Student"), 1);
        assert_eq!(after.association_count("Student"), 2);
    }
}
