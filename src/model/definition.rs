use super::callbacks::{CallbackChain, CallbackFn, LifecycleEvent};
use crate::cascade::CascadeContext;
use crate::core::{RecordErrors, Result};
use crate::record::{Record, RecordRef};
use crate::reflection::{AssociationBuilder, AssociationReflection};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A model's own validation rule. Adds messages to `errors` when `record` is
/// invalid.
pub type ValidatorFn = Arc<dyn Fn(&Record, &mut RecordErrors) + Send + Sync>;

/// Runs before a relationship of an association is created. Returning `false`
/// skips that one relationship.
pub type LinkHook = Arc<dyn Fn(&Record, &Record) -> bool + Send + Sync>;

pub const BEFORE_SAVE_COLLECTION_ASSOCIATION: &str = "before_save_collection_association";

/// A model type: validators, lifecycle callbacks and the dispatch table of
/// per-association autosave and validation entry points.
pub struct Model {
    name: String,
    validators: Vec<ValidatorFn>,
    callbacks: CallbackChain,
    association_methods: HashMap<String, CallbackFn>,
    link_hooks: HashMap<String, LinkHook>,
}

impl Model {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            validators: Vec::new(),
            callbacks: CallbackChain::new(),
            association_methods: HashMap::new(),
            link_hooks: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validators(&self) -> &[ValidatorFn] {
        &self.validators
    }

    pub fn callbacks(&self) -> &CallbackChain {
        &self.callbacks
    }

    pub fn link_hook(&self, association: &str) -> Option<&LinkHook> {
        self.link_hooks.get(association)
    }

    /// Whether an association entry point such as
    /// `autosave_associated_records_for_lessons` is defined.
    pub fn defines_method(&self, method: &str) -> bool {
        self.association_methods.contains_key(method)
    }

    pub fn association_method(&self, method: &str) -> Option<&CallbackFn> {
        self.association_methods.get(method)
    }

    pub fn add_validator(&mut self, validator: ValidatorFn) {
        self.validators.push(validator);
    }

    pub fn add_callback(&mut self, event: LifecycleEvent, name: &str, callback: CallbackFn) -> bool {
        self.callbacks.register(event, name, callback)
    }

    pub fn set_link_hook(&mut self, association: &str, hook: LinkHook) {
        self.link_hooks.insert(association.to_string(), hook);
    }

    /// Defines the autosave and validation entry points for `reflection` and
    /// hooks them into the lifecycle.
    ///
    /// Entry points already defined are left alone, so calling this again for
    /// the same association registers nothing new.
    pub fn add_autosave_association_callbacks(&mut self, reflection: &Arc<AssociationReflection>) {
        let save_method = reflection.save_callback_name();
        let validation_method = reflection.validation_callback_name();

        if !self.defines_method(&save_method) {
            if reflection.is_collection() {
                let before_save: CallbackFn =
                    Arc::new(|ctx: &mut CascadeContext<'_>, record: &RecordRef| {
                        ctx.before_save_collection_association(record)
                    });
                self.callbacks.register(
                    LifecycleEvent::BeforeSave,
                    BEFORE_SAVE_COLLECTION_ASSOCIATION,
                    before_save,
                );
            }

            let owned = reflection.clone();
            let method: CallbackFn = Arc::new(move |ctx: &mut CascadeContext<'_>, record: &RecordRef| {
                ctx.autosave_associated_records_for(record, &owned)
            });
            self.association_methods
                .insert(save_method.clone(), method.clone());
            // Two callbacks rather than one after-save, so association saves
            // run in declaration order relative to the model's own
            // after_create/after_update callbacks.
            self.callbacks
                .register(LifecycleEvent::AfterCreate, &save_method, method.clone());
            self.callbacks
                .register(LifecycleEvent::AfterUpdate, &save_method, method);
        }

        if reflection.cascade_validate() && !self.defines_method(&validation_method) {
            let owned = reflection.clone();
            let method: CallbackFn = Arc::new(move |ctx: &mut CascadeContext<'_>, record: &RecordRef| {
                ctx.validate_associated_records_for(record, &owned)
            });
            self.association_methods
                .insert(validation_method.clone(), method.clone());
            self.callbacks
                .register(LifecycleEvent::Validate, &validation_method, method);
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.association_methods.keys().collect();
        methods.sort();
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("validators", &self.validators.len())
            .field("callbacks", &self.callbacks)
            .field("association_methods", &methods)
            .finish()
    }
}

/// Declares a model type.
///
/// Callbacks and associations are hooked into the lifecycle in the order they
/// are declared.
///
/// # Examples
///
/// ```
/// use rustogm::model::ModelBuilder;
///
/// let student = ModelBuilder::new("Student")
///     .validates_presence_of("name")
///     .has_many("lessons", |a| a.target("Lesson").autosave(true));
/// ```
pub struct ModelBuilder {
    model: Model,
    associations: Vec<Arc<AssociationReflection>>,
}

impl ModelBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            model: Model::new(name),
            associations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Record, &mut RecordErrors) + Send + Sync + 'static,
    {
        self.model.add_validator(Arc::new(validator));
        self
    }

    /// Rejects blank values of `field` with "can't be blank".
    pub fn validates_presence_of(self, field: &str) -> Self {
        let field = field.to_string();
        self.validate(move |record, errors| {
            if record.get(&field).is_blank() {
                errors.add(field.as_str(), "can't be blank");
            }
        })
    }

    pub fn before_save<F>(self, name: &str, callback: F) -> Self
    where
        F: Fn(&mut CascadeContext<'_>, &RecordRef) -> Result<bool> + Send + Sync + 'static,
    {
        self.on(LifecycleEvent::BeforeSave, name, callback)
    }

    pub fn after_create<F>(self, name: &str, callback: F) -> Self
    where
        F: Fn(&mut CascadeContext<'_>, &RecordRef) -> Result<bool> + Send + Sync + 'static,
    {
        self.on(LifecycleEvent::AfterCreate, name, callback)
    }

    pub fn after_update<F>(self, name: &str, callback: F) -> Self
    where
        F: Fn(&mut CascadeContext<'_>, &RecordRef) -> Result<bool> + Send + Sync + 'static,
    {
        self.on(LifecycleEvent::AfterUpdate, name, callback)
    }

    fn on<F>(mut self, event: LifecycleEvent, name: &str, callback: F) -> Self
    where
        F: Fn(&mut CascadeContext<'_>, &RecordRef) -> Result<bool> + Send + Sync + 'static,
    {
        self.model.add_callback(event, name, Arc::new(callback));
        self
    }

    pub fn has_many(
        self,
        name: &str,
        configure: impl FnOnce(AssociationBuilder) -> AssociationBuilder,
    ) -> Self {
        let builder = AssociationReflection::has_many(self.model.name(), name);
        self.declare(configure(builder).build())
    }

    pub fn has_one(
        self,
        name: &str,
        configure: impl FnOnce(AssociationBuilder) -> AssociationBuilder,
    ) -> Self {
        let builder = AssociationReflection::has_one(self.model.name(), name);
        self.declare(configure(builder).build())
    }

    pub fn before_link<F>(mut self, association: &str, hook: F) -> Self
    where
        F: Fn(&Record, &Record) -> bool + Send + Sync + 'static,
    {
        self.model.set_link_hook(association, Arc::new(hook));
        self
    }

    fn declare(mut self, reflection: AssociationReflection) -> Self {
        let reflection = Arc::new(reflection);
        self.model.add_autosave_association_callbacks(&reflection);
        self.associations.push(reflection);
        self
    }

    pub(crate) fn into_parts(self) -> (Model, Vec<Arc<AssociationReflection>>) {
        (self.model, self.associations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lessons() -> Arc<AssociationReflection> {
        Arc::new(
            AssociationReflection::has_many("Student", "lessons")
                .target("Lesson")
                .autosave(true)
                .build(),
        )
    }

    #[test]
    fn test_collection_callbacks_are_hooked_into_lifecycle() {
        let mut model = Model::new("Student");
        model.add_autosave_association_callbacks(&lessons());

        let callbacks = model.callbacks();
        assert_eq!(
            callbacks.names(LifecycleEvent::BeforeSave),
            vec![BEFORE_SAVE_COLLECTION_ASSOCIATION]
        );
        assert_eq!(
            callbacks.names(LifecycleEvent::AfterCreate),
            vec!["autosave_associated_records_for_lessons"]
        );
        assert_eq!(
            callbacks.names(LifecycleEvent::AfterUpdate),
            vec!["autosave_associated_records_for_lessons"]
        );
        assert_eq!(
            callbacks.names(LifecycleEvent::Validate),
            vec!["validate_associated_records_for_lessons"]
        );
        assert!(model.defines_method("autosave_associated_records_for_lessons"));
    }

    #[test]
    fn test_registration_twice_defines_nothing_new() {
        let reflection = lessons();
        let mut model = Model::new("Student");
        model.add_autosave_association_callbacks(&reflection);
        model.add_autosave_association_callbacks(&reflection);

        for event in [
            LifecycleEvent::BeforeSave,
            LifecycleEvent::AfterCreate,
            LifecycleEvent::AfterUpdate,
            LifecycleEvent::Validate,
        ] {
            assert_eq!(model.callbacks().callbacks(event).len(), 1, "{}", event);
        }
    }

    #[test]
    fn test_single_association_skips_before_save_snapshot() {
        let reflection = Arc::new(
            AssociationReflection::has_one("Lesson", "top_student")
                .validate(false)
                .build(),
        );
        let mut model = Model::new("Lesson");
        model.add_autosave_association_callbacks(&reflection);

        assert!(model.callbacks().names(LifecycleEvent::BeforeSave).is_empty());
        assert!(model.callbacks().names(LifecycleEvent::Validate).is_empty());
        assert!(!model.defines_method("validate_associated_records_for_top_student"));
    }

    #[test]
    fn test_builder_keeps_declaration_order() {
        let (model, associations) = ModelBuilder::new("Student")
            .after_create("welcome", |_ctx, _record| Ok(true))
            .has_many("lessons", |a| a.target("Lesson").autosave(true))
            .after_create("notify", |_ctx, _record| Ok(true))
            .into_parts();

        assert_eq!(
            model.callbacks().names(LifecycleEvent::AfterCreate),
            vec!["welcome", "autosave_associated_records_for_lessons", "notify"]
        );
        assert_eq!(associations.len(), 1);
        assert_eq!(associations[0].owner_model(), "Student");
    }

    #[test]
    fn test_presence_validator() {
        let (model, _) = ModelBuilder::new("Lesson")
            .validates_presence_of("subject")
            .into_parts();
        let mut errors = RecordErrors::new();
        (model.validators()[0])(&Record::new("Lesson"), &mut errors);
        assert_eq!(errors.get("subject"), ["can't be blank"]);
    }
}
