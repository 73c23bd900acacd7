#![allow(dead_code)]

use rustogm::core::{OgmError, Result, Value};
use rustogm::model::{ModelBuilder, Schema};
use rustogm::reflection::Direction;
use rustogm::storage::{GraphStore, MemoryGraphStore, StoredNode};
use rustogm::transaction::{RelationshipKey, TransactionId};
use rustogm::{CascadeEngine, Record, RecordRef};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// One call made against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Begin,
    Commit,
    Rollback,
    Create { label: String },
    Update { id: String, fields: Vec<String> },
    Delete { id: String },
    Merge { rel_type: String, created: bool },
}

/// `MemoryGraphStore` that records every call and can refuse to create
/// nodes of one label.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryGraphStore,
    calls: Mutex<Vec<StoreCall>>,
    failing_label: Mutex<Option<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryGraphStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_creates_of(&self, label: Option<&str>) {
        *self.failing_label.lock().unwrap() = label.map(str::to_string);
    }

    pub fn creates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Create { label } => Some(label),
                _ => None,
            })
            .collect()
    }

    pub fn update_count(&self) -> usize {
        self.count(|call| matches!(call, StoreCall::Update { .. }))
    }

    pub fn delete_count(&self) -> usize {
        self.count(|call| matches!(call, StoreCall::Delete { .. }))
    }

    pub fn merges_created(&self) -> usize {
        self.count(|call| matches!(call, StoreCall::Merge { created: true, .. }))
    }

    pub fn commit_count(&self) -> usize {
        self.count(|call| matches!(call, StoreCall::Commit))
    }

    pub fn rollback_count(&self) -> usize {
        self.count(|call| matches!(call, StoreCall::Rollback))
    }

    fn count(&self, predicate: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    fn push(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl GraphStore for RecordingStore {
    fn begin_transaction(&self) -> Result<TransactionId> {
        self.push(StoreCall::Begin);
        self.inner.begin_transaction()
    }

    fn commit(&self, tx: TransactionId) -> Result<()> {
        self.push(StoreCall::Commit);
        self.inner.commit(tx)
    }

    fn rollback(&self, tx: TransactionId) -> Result<()> {
        self.push(StoreCall::Rollback);
        self.inner.rollback(tx)
    }

    fn create_node(
        &self,
        tx: TransactionId,
        label: &str,
        properties: &BTreeMap<String, Value>,
    ) -> Result<String> {
        if self.failing_label.lock().unwrap().as_deref() == Some(label) {
            return Err(OgmError::Storage(format!("refusing to create {}", label)));
        }
        self.push(StoreCall::Create {
            label: label.to_string(),
        });
        self.inner.create_node(tx, label, properties)
    }

    fn update_node(
        &self,
        tx: TransactionId,
        id: &str,
        properties: &BTreeMap<String, Value>,
    ) -> Result<()> {
        self.push(StoreCall::Update {
            id: id.to_string(),
            fields: properties.keys().cloned().collect(),
        });
        self.inner.update_node(tx, id, properties)
    }

    fn delete_node(&self, tx: TransactionId, id: &str) -> Result<()> {
        self.push(StoreCall::Delete { id: id.to_string() });
        self.inner.delete_node(tx, id)
    }

    fn merge_relationship(&self, tx: TransactionId, relationship: &RelationshipKey) -> Result<bool> {
        let created = self.inner.merge_relationship(tx, relationship)?;
        self.push(StoreCall::Merge {
            rel_type: relationship.rel_type.clone(),
            created,
        });
        Ok(created)
    }

    fn fetch_node(&self, id: &str) -> Result<Option<StoredNode>> {
        self.inner.fetch_node(id)
    }
}

/// Students enrol in lessons, lessons hold exams and a top student, exams
/// refer back to lessons without autosave.
pub fn school_models() -> Vec<ModelBuilder> {
    vec![
        ModelBuilder::new("Student")
            .validates_presence_of("name")
            .has_many("lessons", |a| {
                a.target("Lesson")
                    .relationship_type("ENROLLED_IN")
                    .autosave(true)
            }),
        ModelBuilder::new("Lesson")
            .validates_presence_of("subject")
            .has_many("students", |a| {
                a.target("Student")
                    .direction(Direction::Incoming)
                    .relationship_type("ENROLLED_IN")
                    .autosave(true)
            })
            .has_many("exams", |a| a.target("Exam").autosave(true))
            .has_one("top_student", |a| a.target("Student").autosave(true)),
        ModelBuilder::new("Exam")
            .validates_presence_of("title")
            .has_many("lessons", |a| a.target("Lesson")),
    ]
}

pub fn schema_of(models: Vec<ModelBuilder>) -> Schema {
    models
        .into_iter()
        .try_fold(Schema::builder(), |builder, model| builder.model(model))
        .unwrap()
        .build()
}

pub fn engine_for(models: Vec<ModelBuilder>) -> (CascadeEngine, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::new());
    let engine = CascadeEngine::new(schema_of(models), store.clone());
    (engine, store)
}

pub fn school() -> (CascadeEngine, Arc<RecordingStore>) {
    engine_for(school_models())
}

pub fn student(name: &str) -> RecordRef {
    RecordRef::new(Record::new("Student").with("name", name))
}

pub fn lesson(subject: &str) -> RecordRef {
    RecordRef::new(Record::new("Lesson").with("subject", subject))
}

pub fn exam(title: &str) -> RecordRef {
    RecordRef::new(Record::new("Exam").with("title", title))
}

/// Saves `record` on its own and forgets the calls it took.
pub fn persist(engine: &CascadeEngine, store: &RecordingStore, record: &RecordRef) {
    assert!(engine.save(record).unwrap().is_saved());
    store.clear_calls();
}

pub fn id_of(record: &RecordRef) -> String {
    record.id().unwrap().expect("record has been saved")
}

pub fn no_guard_active(record: &RecordRef) -> bool {
    record.read().unwrap().guard().executing().is_empty()
}
