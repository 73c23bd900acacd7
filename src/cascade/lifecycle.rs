use super::CascadeContext;
use crate::core::{OgmError, RecordErrors, Result};
use crate::model::LifecycleEvent;
use crate::record::{Record, RecordRef};
use crate::reflection::{AssociationReflection, Direction};
use crate::transaction::RelationshipKey;
use log::warn;
use tracing::{Level, event};

const VALIDATION_GUARD: &str = "valid";

impl CascadeContext<'_> {
    /// Persists `record` through its full lifecycle: validation, `before_save`
    /// callbacks, the node write and the `after_create`/`after_update` chain,
    /// which is where associations cascade.
    ///
    /// Returns `Ok(false)` when validation fails, a `before_save` callback
    /// halts, or a rollback was requested along the way.
    pub fn save_record(&mut self, record: &RecordRef, validate: bool) -> Result<bool> {
        let (model_name, destroyed) = record.with(|r| (r.model().to_string(), r.is_destroyed()))?;
        if destroyed {
            return Err(OgmError::RecordDestroyed {
                model: model_name,
                operation: "save",
            });
        }
        let model = self.engine.schema().model(&model_name)?.clone();

        if validate && !self.valid(record)? {
            event!(Level::DEBUG, model = %model_name, "record failed validation");
            return Ok(false);
        }

        self.remember(record)?;
        // Taken for every model, not only those with collection associations.
        self.capture_new_record_before_save(record)?;
        for callback in model.callbacks().callbacks(LifecycleEvent::BeforeSave) {
            if !(callback.callback)(self, record)? {
                event!(Level::DEBUG, model = %model_name, callback = %callback.name, "save halted");
                if self.halted_by.is_none() {
                    self.halted_by = Some(callback.name.clone());
                }
                return Ok(false);
            }
        }

        let event = if self.write_node(record)? {
            LifecycleEvent::AfterCreate
        } else {
            LifecycleEvent::AfterUpdate
        };
        for callback in model.callbacks().callbacks(event) {
            (callback.callback)(self, record)?;
            if self.rollback_requested() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Creates or updates the record's node and clears its dirty state.
    /// Returns whether the node was created.
    fn write_node(&mut self, record: &RecordRef) -> Result<bool> {
        let tx = self.transaction_id()?;
        let engine = self.engine;
        let store = engine.store();
        let (model, id, is_new, properties) = record.with(|r| {
            let properties = if r.is_new() {
                r.properties().clone()
            } else {
                r.changed_properties()
            };
            (
                r.model().to_string(),
                r.id().map(str::to_string),
                r.is_new(),
                properties,
            )
        })?;

        if is_new {
            let id = store.create_node(tx, &model, &properties)?;
            event!(Level::DEBUG, model = %model, id = %id, "node created");
            record.update(|r| r.mark_created(id))?;
            return Ok(true);
        }

        if !properties.is_empty() {
            let id = id.ok_or_else(|| {
                OgmError::Storage(format!("persisted {} record has no id", model))
            })?;
            store.update_node(tx, &id, &properties)?;
            event!(Level::DEBUG, model = %model, id = %id, fields = properties.len(), "node updated");
        }
        record.update(Record::apply_changes)?;
        Ok(false)
    }

    /// Runs the record's own validators and then its association validation
    /// entry points. Errors from the previous run are discarded.
    pub fn valid(&mut self, record: &RecordRef) -> Result<bool> {
        let (model_name, destroyed) = record.with(|r| (r.model().to_string(), r.is_destroyed()))?;
        if destroyed {
            return Err(OgmError::RecordDestroyed {
                model: model_name,
                operation: "validate",
            });
        }

        // Reached again through a cycle: keep the errors gathered so far.
        let Some(_token) = record.enter_guard(VALIDATION_GUARD)? else {
            return record.with(|r| r.errors().is_empty());
        };

        let model = self.engine.schema().model(&model_name)?.clone();
        let mut errors = RecordErrors::new();
        record.with(|r| {
            for validator in model.validators() {
                validator(r, &mut errors);
            }
        })?;
        record.update(|r| r.replace_errors(errors))?;

        for callback in model.callbacks().callbacks(LifecycleEvent::Validate) {
            (callback.callback)(self, record)?;
        }
        record.with(|r| r.errors().is_empty())
    }

    /// Saves `target` and relates it to `owner` through `association`.
    ///
    /// A `before_link` hook returning `false` skips this one target and still
    /// reports success.
    pub fn insert_record(
        &mut self,
        owner: &RecordRef,
        association: &AssociationReflection,
        target: &RecordRef,
        validate: bool,
    ) -> Result<bool> {
        let owner_model = owner.model()?;
        let model = self.engine.schema().model(&owner_model)?.clone();
        if let Some(hook) = model.link_hook(association.name()) {
            let allowed = if owner.ptr_eq(target) {
                let record = owner.read()?;
                hook(&*record, &*record)
            } else {
                let (owner_record, target_record) = (owner.read()?, target.read()?);
                hook(&*owner_record, &*target_record)
            };
            if !allowed {
                warn!(
                    "{}.{}: before_link refused the relationship, skipping record",
                    owner_model,
                    association.name()
                );
                return Ok(true);
            }
        }

        if !self.save_record(target, validate)? || self.rollback_requested() {
            return Ok(false);
        }
        if !association.is_through() {
            self.link(owner, association, target)?;
        }
        Ok(true)
    }

    /// Merges the relationship between `owner` and `target`, oriented by the
    /// association's direction. Returns whether a new relationship was created.
    pub fn link(
        &mut self,
        owner: &RecordRef,
        association: &AssociationReflection,
        target: &RecordRef,
    ) -> Result<bool> {
        let tx = self.transaction_id()?;
        let owner_id = persisted_id(owner)?;
        let target_id = persisted_id(target)?;
        let relationship = match association.direction() {
            Direction::Outgoing | Direction::Both => {
                RelationshipKey::new(&owner_id, &target_id, association.relationship_type())
            }
            Direction::Incoming => {
                RelationshipKey::new(&target_id, &owner_id, association.relationship_type())
            }
        };
        let created = self.engine.store().merge_relationship(tx, &relationship)?;
        event!(
            Level::DEBUG,
            rel_type = %relationship.rel_type,
            from = %relationship.from,
            to = %relationship.to,
            created,
            "relationship merged"
        );
        Ok(created)
    }

    /// Destroys `target` on behalf of `owner`'s association.
    pub fn destroy_associated(
        &mut self,
        owner: &RecordRef,
        association: &AssociationReflection,
        target: &RecordRef,
    ) -> Result<()> {
        event!(
            Level::DEBUG,
            owner = %owner.model()?,
            association = %association.name(),
            "destroying record marked for destruction"
        );
        self.remember(target)?;
        target.update(|r| r.set_destroyed_by_association(association.name()))?;
        self.destroy_record(target)
    }

    /// Deletes the record's node, if it has one, and marks it destroyed.
    pub fn destroy_record(&mut self, record: &RecordRef) -> Result<()> {
        let tx = self.transaction_id()?;
        self.remember(record)?;
        let id = record.with(|r| if r.is_new() { None } else { r.id().map(str::to_string) })?;
        if let Some(id) = id {
            self.engine.store().delete_node(tx, &id)?;
        }
        record.update(Record::mark_destroyed)?;
        Ok(())
    }
}

fn persisted_id(record: &RecordRef) -> Result<String> {
    record.with(|r| r.id().map(str::to_string))?.ok_or_else(|| {
        OgmError::Storage("cannot relate a record that has not been saved".to_string())
    })
}
