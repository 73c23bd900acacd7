use super::CascadeContext;
use crate::core::Result;
use crate::record::{Record, RecordRef};
use crate::reflection::AssociationReflection;
use tracing::{Level, event};

impl CascadeContext<'_> {
    /// `before_save` callback of every model with a collection association:
    /// remembers whether the record was new before its node is written.
    pub fn before_save_collection_association(&mut self, record: &RecordRef) -> Result<bool> {
        self.capture_new_record_before_save(record)?;
        Ok(true)
    }

    /// Save entry point registered as `autosave_associated_records_for_<name>`
    /// on `after_create` and `after_update`.
    pub fn autosave_associated_records_for(
        &mut self,
        record: &RecordRef,
        association: &AssociationReflection,
    ) -> Result<bool> {
        if association.is_collection() {
            self.save_collection_association(record, association)
        } else {
            self.save_has_one_association(record, association)
        }
    }

    /// Destroys, inserts or saves the loaded records of a collection
    /// association after its owner was written.
    pub fn save_collection_association(
        &mut self,
        record: &RecordRef,
        association: &AssociationReflection,
    ) -> Result<bool> {
        self.non_cyclic(record, &association.save_callback_name(), |ctx| {
            if !ctx.engine.runtime().is_loaded(record, association)? {
                return Ok(true);
            }
            let parent_was_new =
                record.with(|r| r.new_record_before_save().unwrap_or_else(|| r.is_new()))?;
            let mut records = ctx.records_to_consider(record, association, true)?;

            if association.cascade_on_save() {
                let mut kept = Vec::with_capacity(records.len());
                for target in records {
                    if target.with(Record::marked_for_destruction)? {
                        ctx.destroy_associated(record, association, &target)?;
                    } else {
                        kept.push(target);
                    }
                }
                records = kept;
            }

            for target in records {
                if target.is_destroyed()? {
                    continue;
                }

                if !association.autosave_disabled() && (parent_was_new || target.is_new()?) {
                    if association.cascade_on_save() {
                        if !ctx.insert_record(record, association, &target, false)? {
                            ctx.request_rollback(format!(
                                "could not insert associated record through '{}'",
                                association.name()
                            ));
                            return Ok(false);
                        }
                    } else if !association.is_through()
                        && !ctx.insert_record(record, association, &target, true)?
                        && !ctx.rollback_requested()
                    {
                        ctx.record_detached_failure(record, association, &target)?;
                    }
                } else if association.cascade_on_save() && !ctx.save_record(&target, false)? {
                    ctx.request_rollback(format!(
                        "could not save associated record through '{}'",
                        association.name()
                    ));
                    return Ok(false);
                }

                if ctx.rollback_requested() {
                    return Ok(false);
                }
            }

            if !ctx.engine.runtime().reset_scope(record, association)? {
                event!(Level::TRACE, association = %association.name(), "association scope not reset");
            }
            Ok(true)
        })
    }
}
