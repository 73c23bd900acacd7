use super::guard::{GuardToken, RecursionGuard};
use super::materialization::{LoadedAssociation, Materialization};
use crate::core::{RecordErrors, Result, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

static NULL: Value = Value::Null;

/// An in-memory domain entity bound to a graph node.
#[derive(Debug, Clone)]
pub struct Record {
    model: String,
    id: Option<String>,
    properties: BTreeMap<String, Value>,
    /// Last saved value of every field in `changed`.
    original: BTreeMap<String, Value>,
    changed: BTreeSet<String>,
    new_record: bool,
    destroyed: bool,
    marked_for_destruction: bool,
    destroyed_by_association: Option<String>,
    new_record_before_save: Option<bool>,
    errors: RecordErrors,
    associations: HashMap<String, LoadedAssociation>,
    guard: RecursionGuard,
}

impl Record {
    /// A record that has never been persisted.
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            id: None,
            properties: BTreeMap::new(),
            original: BTreeMap::new(),
            changed: BTreeSet::new(),
            new_record: true,
            destroyed: false,
            marked_for_destruction: false,
            destroyed_by_association: None,
            new_record_before_save: None,
            errors: RecordErrors::new(),
            associations: HashMap::new(),
            guard: RecursionGuard::default(),
        }
    }

    /// A record loaded from the store, with no pending changes.
    pub fn persisted(model: &str, id: impl Into<String>, properties: BTreeMap<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            properties,
            new_record: false,
            ..Self::new(model)
        }
    }

    /// Sets a property on a new record, recording it as a change.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_new(&self) -> bool {
        self.new_record
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_persisted(&self) -> bool {
        !(self.new_record || self.destroyed)
    }

    // ------------------------------------------------------------------
    // Properties and dirty tracking
    // ------------------------------------------------------------------

    pub fn get(&self, field: &str) -> &Value {
        self.properties.get(field).unwrap_or(&NULL)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        let current = self.get(field).clone();

        if self.changed.contains(field) {
            if self.original.get(field) == Some(&value) {
                self.changed.remove(field);
                self.original.remove(field);
            }
        } else if current != value {
            self.original.insert(field.to_string(), current);
            self.changed.insert(field.to_string());
        }

        self.properties.insert(field.to_string(), value);
    }

    /// Whether any persisted field differs from its last saved value.
    pub fn changed(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn changed_fields(&self) -> Vec<&str> {
        self.changed.iter().map(String::as_str).collect()
    }

    pub fn attribute_changed(&self, field: &str) -> bool {
        self.changed.contains(field)
    }

    /// Last saved value of a changed field.
    pub fn attribute_was(&self, field: &str) -> &Value {
        self.original.get(field).unwrap_or_else(|| self.get(field))
    }

    pub(crate) fn changed_properties(&self) -> BTreeMap<String, Value> {
        self.changed
            .iter()
            .map(|field| (field.clone(), self.get(field).clone()))
            .collect()
    }

    pub(crate) fn apply_changes(&mut self) {
        self.changed.clear();
        self.original.clear();
    }

    pub(crate) fn mark_created(&mut self, id: String) {
        self.id = Some(id);
        self.new_record = false;
        self.apply_changes();
    }

    pub(crate) fn reload_properties(&mut self, properties: BTreeMap<String, Value>) {
        self.properties = properties;
        self.apply_changes();
        self.marked_for_destruction = false;
        self.destroyed_by_association = None;
    }

    // ------------------------------------------------------------------
    // Destruction
    // ------------------------------------------------------------------

    /// Flags this record to be destroyed by the next save of a parent whose
    /// association to it has autosave enabled. Nothing is deleted yet.
    pub fn mark_for_destruction(&mut self) {
        self.marked_for_destruction = true;
    }

    pub fn marked_for_destruction(&self) -> bool {
        self.marked_for_destruction
    }

    /// Association through which this record is being destroyed.
    pub fn destroyed_by_association(&self) -> Option<&str> {
        self.destroyed_by_association.as_deref()
    }

    pub(crate) fn set_destroyed_by_association(&mut self, association: &str) {
        self.destroyed_by_association = Some(association.to_string());
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.destroyed = true;
        self.marked_for_destruction = false;
    }

    pub fn new_record_before_save(&self) -> Option<bool> {
        self.new_record_before_save
    }

    pub(crate) fn set_new_record_before_save(&mut self, was_new: bool) {
        self.new_record_before_save = Some(was_new);
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    pub fn errors(&self) -> &RecordErrors {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut RecordErrors {
        &mut self.errors
    }

    pub(crate) fn replace_errors(&mut self, errors: RecordErrors) {
        self.errors = errors;
    }

    // ------------------------------------------------------------------
    // Loaded associations
    // ------------------------------------------------------------------

    pub fn load_one(&mut self, association: &str, target: Option<RecordRef>) {
        self.load(association, Materialization::Single(target));
    }

    pub fn load_many(&mut self, association: &str, targets: Vec<RecordRef>) {
        self.load(association, Materialization::Collection(targets));
    }

    pub fn load(&mut self, association: &str, target: Materialization) {
        let scope_key = self.id.clone();
        self.associations
            .insert(association.to_string(), LoadedAssociation { target, scope_key });
    }

    /// Appends to a collection, materializing it as empty first if needed.
    pub fn push_target(&mut self, association: &str, target: RecordRef) {
        let scope_key = self.id.clone();
        let entry = self
            .associations
            .entry(association.to_string())
            .or_insert_with(|| LoadedAssociation {
                target: Materialization::Collection(Vec::new()),
                scope_key,
            });
        match &mut entry.target {
            Materialization::Collection(targets) => targets.push(target),
            Materialization::Single(slot) => *slot = Some(target),
        }
    }

    pub fn unload(&mut self, association: &str) {
        self.associations.remove(association);
    }

    pub fn materialization(&self, association: &str) -> Option<&Materialization> {
        self.associations.get(association).map(|loaded| &loaded.target)
    }

    pub fn loaded_associations(&self) -> Vec<&str> {
        self.associations.keys().map(String::as_str).collect()
    }

    /// Owner id the association's relationship query is keyed on.
    pub fn association_scope(&self, association: &str) -> Option<&str> {
        self.associations
            .get(association)
            .and_then(|loaded| loaded.scope_key.as_deref())
    }

    pub(crate) fn reset_association_scope(&mut self, association: &str) -> bool {
        let id = self.id.clone();
        match self.associations.get_mut(association) {
            Some(loaded) => {
                loaded.scope_key = id;
                true
            }
            None => false,
        }
    }

    pub fn guard(&self) -> &RecursionGuard {
        &self.guard
    }

    pub(crate) fn guard_mut(&mut self) -> &mut RecursionGuard {
        &mut self.guard
    }

    // ------------------------------------------------------------------
    // Transaction state
    // ------------------------------------------------------------------

    pub(crate) fn transaction_state(&self) -> RecordState {
        RecordState {
            id: self.id.clone(),
            properties: self.properties.clone(),
            original: self.original.clone(),
            changed: self.changed.clone(),
            new_record: self.new_record,
            destroyed: self.destroyed,
            marked_for_destruction: self.marked_for_destruction,
            destroyed_by_association: self.destroyed_by_association.clone(),
            new_record_before_save: self.new_record_before_save,
        }
    }

    pub(crate) fn restore_transaction_state(&mut self, state: RecordState) {
        self.id = state.id;
        self.properties = state.properties;
        self.original = state.original;
        self.changed = state.changed;
        self.new_record = state.new_record;
        self.destroyed = state.destroyed;
        self.marked_for_destruction = state.marked_for_destruction;
        self.destroyed_by_association = state.destroyed_by_association;
        self.new_record_before_save = state.new_record_before_save;
    }
}

/// Snapshot taken before a record is first touched inside a transaction.
#[derive(Debug, Clone)]
pub(crate) struct RecordState {
    id: Option<String>,
    properties: BTreeMap<String, Value>,
    original: BTreeMap<String, Value>,
    changed: BTreeSet<String>,
    new_record: bool,
    destroyed: bool,
    marked_for_destruction: bool,
    destroyed_by_association: Option<String>,
    new_record_before_save: Option<bool>,
}

/// Shared handle to a [`Record`].
///
/// Object graphs may be cyclic, so records are shared rather than owned by
/// their parents. Locks are only held for the duration of a single read or
/// update and never across a cascade step.
#[derive(Clone)]
pub struct RecordRef(Arc<RwLock<Record>>);

impl RecordRef {
    pub fn new(record: Record) -> Self {
        Self(Arc::new(RwLock::new(record)))
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, Record>> {
        Ok(self.0.read()?)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Record>> {
        Ok(self.0.write()?)
    }

    pub(crate) fn inner(&self) -> &RwLock<Record> {
        &self.0
    }

    /// Runs `f` against a shared borrow of the record.
    pub fn with<R>(&self, f: impl FnOnce(&Record) -> R) -> Result<R> {
        Ok(f(&*self.read()?))
    }

    /// Runs `f` against an exclusive borrow of the record.
    pub fn update<R>(&self, f: impl FnOnce(&mut Record) -> R) -> Result<R> {
        Ok(f(&mut *self.write()?))
    }

    pub fn ptr_eq(&self, other: &RecordRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity of the shared record, for visited sets.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn enter_guard(&self, callback: &str) -> Result<Option<GuardToken>> {
        GuardToken::acquire(self, callback)
    }

    pub fn model(&self) -> Result<String> {
        self.with(|r| r.model().to_string())
    }

    pub fn id(&self) -> Result<Option<String>> {
        self.with(|r| r.id().map(str::to_string))
    }

    pub fn get(&self, field: &str) -> Result<Value> {
        self.with(|r| r.get(field).clone())
    }

    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        self.update(|r| r.set(field, value))
    }

    pub fn is_new(&self) -> Result<bool> {
        self.with(Record::is_new)
    }

    pub fn is_destroyed(&self) -> Result<bool> {
        self.with(Record::is_destroyed)
    }

    pub fn errors(&self) -> Result<RecordErrors> {
        self.with(|r| r.errors().clone())
    }

    pub fn mark_for_destruction(&self) -> Result<()> {
        self.update(Record::mark_for_destruction)
    }

    pub fn load_many(&self, association: &str, targets: Vec<RecordRef>) -> Result<()> {
        self.update(|r| r.load_many(association, targets))
    }

    pub fn load_one(&self, association: &str, target: Option<RecordRef>) -> Result<()> {
        self.update(|r| r.load_one(association, target))
    }

    pub fn push_target(&self, association: &str, target: RecordRef) -> Result<()> {
        self.update(|r| r.push_target(association, target))
    }
}

impl From<Record> for RecordRef {
    fn from(record: Record) -> Self {
        Self::new(record)
    }
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Ok(record) => f
                .debug_struct("RecordRef")
                .field("model", &record.model)
                .field("id", &record.id)
                .field("new_record", &record.new_record)
                .finish(),
            Err(_) => f.write_str("RecordRef(<locked>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted_lesson() -> Record {
        let mut properties = BTreeMap::new();
        properties.insert("subject".to_string(), Value::from("Math"));
        properties.insert("level".to_string(), Value::from(101));
        Record::persisted("Lesson", "lesson-1", properties)
    }

    #[test]
    fn test_new_record_defaults() {
        let record = Record::new("Student").with("name", "Chris");
        assert!(record.is_new());
        assert!(!record.is_persisted());
        assert!(record.changed());
        assert_eq!(record.get("name"), &Value::from("Chris"));
        assert!(record.get("missing").is_null());
    }

    #[test]
    fn test_dirty_tracking_detects_and_reverts_changes() {
        let mut lesson = persisted_lesson();
        assert!(!lesson.changed());

        lesson.set("level", 102);
        assert!(lesson.attribute_changed("level"));
        assert_eq!(lesson.attribute_was("level"), &Value::from(101));

        lesson.set("level", 101);
        assert!(!lesson.changed());

        lesson.set("subject", "Math");
        assert!(!lesson.attribute_changed("subject"));
    }

    #[test]
    fn test_apply_changes_clears_dirty_state() {
        let mut lesson = persisted_lesson();
        lesson.set("level", 102);
        assert_eq!(lesson.changed_properties().len(), 1);

        lesson.apply_changes();
        assert!(!lesson.changed());
        assert_eq!(lesson.get("level"), &Value::from(102));
    }

    #[test]
    fn test_reload_clears_destruction_marks() {
        let mut lesson = persisted_lesson();
        lesson.mark_for_destruction();
        lesson.set_destroyed_by_association("lessons");
        lesson.set("level", 300);

        lesson.reload_properties(persisted_lesson().properties().clone());
        assert!(!lesson.marked_for_destruction());
        assert!(lesson.destroyed_by_association().is_none());
        assert_eq!(lesson.get("level"), &Value::from(101));
        assert!(!lesson.changed());
    }

    #[test]
    fn test_transaction_state_round_trip() {
        let mut student = Record::new("Student").with("name", "Chris");
        let state = student.transaction_state();

        student.mark_created("node-1".into());
        assert!(!student.is_new());

        student.restore_transaction_state(state);
        assert!(student.is_new());
        assert!(student.id().is_none());
        assert!(student.attribute_changed("name"));
    }

    #[test]
    fn test_push_target_materializes_collection() {
        let student = RecordRef::new(Record::new("Student"));
        let lesson = RecordRef::new(persisted_lesson());
        student.push_target("lessons", lesson.clone()).unwrap();
        student.push_target("lessons", lesson.clone()).unwrap();

        let record = student.read().unwrap();
        let loaded = record.materialization("lessons").unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&lesson));
    }

    #[test]
    fn test_identity_follows_shared_handle() {
        let a = RecordRef::new(Record::new("Student"));
        let b = a.clone();
        let c = RecordRef::new(Record::new("Student"));
        assert!(a.ptr_eq(&b));
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), c.identity());
    }
}
