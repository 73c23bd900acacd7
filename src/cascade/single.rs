use super::CascadeContext;
use crate::core::{Result, Value};
use crate::record::{Record, RecordRef};
use crate::reflection::AssociationReflection;

impl CascadeContext<'_> {
    /// Saves the loaded target of a has-one association after its owner was
    /// written, keeping the target's foreign key in step with the owner.
    pub fn save_has_one_association(
        &mut self,
        record: &RecordRef,
        association: &AssociationReflection,
    ) -> Result<bool> {
        self.non_cyclic(record, &association.save_callback_name(), |ctx| {
            let engine = ctx.engine;
            let runtime = engine.runtime();
            if !runtime.is_loaded(record, association)? {
                return Ok(true);
            }
            let Some(target) = runtime.materialized_targets(record, association)?.into_iter().next()
            else {
                return Ok(true);
            };

            let (destroyed, marked) =
                target.with(|r| (r.is_destroyed(), r.marked_for_destruction()))?;
            if destroyed {
                return Ok(true);
            }
            if association.cascade_on_save() && marked {
                ctx.destroy_associated(record, association, &target)?;
                return Ok(true);
            }
            if association.autosave_disabled() {
                return Ok(true);
            }

            let (key, owner_was_new) = record.with(|r| {
                let key = match association.primary_key() {
                    Some(field) => r.get(field).clone(),
                    None => r.id().map(Value::from).unwrap_or_default(),
                };
                (key, r.new_record_before_save().unwrap_or_else(|| r.is_new()))
            })?;

            let changed = association.cascade_on_save() && engine.changed_for_cascade(&target)?;
            if !(changed || owner_was_new || ctx.record_changed(association, &target, &key)?) {
                return Ok(true);
            }

            ctx.remember(&target)?;
            if !association.is_through() {
                target.set(association.foreign_key(), key)?;
            }

            let saved = ctx.save_record(&target, !association.cascade_on_save())?;
            if ctx.rollback_requested() {
                return Ok(false);
            }
            if !saved {
                if association.cascade_on_save() {
                    ctx.request_rollback(format!(
                        "could not save associated record through '{}'",
                        association.name()
                    ));
                    return Ok(false);
                }
                ctx.record_detached_failure(record, association, &target)?;
                return Ok(true);
            }

            if !association.is_through() {
                ctx.link(record, association, &target)?;
            }
            Ok(true)
        })
    }

    /// Whether the target's foreign key no longer matches the owner's key.
    pub fn record_changed(
        &self,
        association: &AssociationReflection,
        target: &RecordRef,
        key: &Value,
    ) -> Result<bool> {
        let foreign_key = association.foreign_key();
        target.with(|r: &Record| {
            r.is_new() || r.get(foreign_key) != key || r.attribute_changed(foreign_key)
        })
    }
}
