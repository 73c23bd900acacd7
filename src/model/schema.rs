use super::{Model, ModelBuilder};
use crate::core::{OgmError, Result};
use crate::reflection::{AssociationReflection, Cardinality, ReflectionRegistry};
use std::collections::HashMap;
use std::sync::Arc;

/// Frozen set of model types and their association metadata.
///
/// Built once through [`SchemaBuilder`]; shareable across threads afterwards.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    models: HashMap<String, Arc<Model>>,
    reflections: ReflectionRegistry,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn model(&self, name: &str) -> Result<&Arc<Model>> {
        self.models
            .get(name)
            .ok_or_else(|| OgmError::ModelNotFound(name.to_string()))
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn reflections(&self) -> &ReflectionRegistry {
        &self.reflections
    }

    pub fn reflect_on_association(&self, model: &str, name: &str) -> Result<Arc<AssociationReflection>> {
        self.reflections.lookup(model, name)
    }

    pub fn reflect_on_all_associations(
        &self,
        model: &str,
        cardinality: Option<Cardinality>,
    ) -> Vec<Arc<AssociationReflection>> {
        self.reflections.all_for(model, cardinality)
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Adds a model type and registers its associations.
    pub fn model(mut self, builder: ModelBuilder) -> Result<Self> {
        let (model, associations) = builder.into_parts();
        if self.schema.models.contains_key(model.name()) {
            return Err(OgmError::ModelExists(model.name().to_string()));
        }

        for reflection in associations {
            self.schema.reflections.register(reflection)?;
        }
        self.schema
            .models
            .insert(model.name().to_string(), Arc::new(model));
        Ok(self)
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school() -> Schema {
        Schema::builder()
            .model(
                ModelBuilder::new("Student")
                    .has_many("lessons", |a| a.target("Lesson").autosave(true)),
            )
            .unwrap()
            .model(
                ModelBuilder::new("Lesson")
                    .has_many("students", |a| a.target("Student").autosave(true))
                    .has_one("top_student", |a| a.target("Student").autosave(true)),
            )
            .unwrap()
            .build()
    }

    #[test]
    fn test_schema_exposes_models_and_reflections() {
        let schema = school();
        assert_eq!(schema.model_names(), vec!["Lesson", "Student"]);
        assert_eq!(schema.model("Student").unwrap().name(), "Student");

        let top = schema.reflect_on_association("Lesson", "top_student").unwrap();
        assert_eq!(top.cardinality(), Cardinality::Single);
        assert_eq!(
            schema
                .reflect_on_all_associations("Lesson", Some(Cardinality::Collection))
                .len(),
            1
        );
    }

    #[test]
    fn test_unknown_model_is_an_error() {
        let err = school().model("Professor").unwrap_err();
        assert!(matches!(err, OgmError::ModelNotFound(name) if name == "Professor"));
    }

    #[test]
    fn test_duplicate_model_is_rejected() {
        let err = Schema::builder()
            .model(ModelBuilder::new("Exam"))
            .unwrap()
            .model(ModelBuilder::new("Exam"))
            .unwrap_err();
        assert!(matches!(err, OgmError::ModelExists(_)));
    }

    #[test]
    fn test_duplicate_association_is_rejected() {
        let err = Schema::builder()
            .model(
                ModelBuilder::new("Exam")
                    .has_many("lessons", |a| a)
                    .has_many("lessons", |a| a.autosave(true)),
            )
            .unwrap_err();
        assert!(matches!(err, OgmError::DuplicateAssociation { .. }));
    }
}
