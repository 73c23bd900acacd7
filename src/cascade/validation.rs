use super::CascadeContext;
use crate::core::Result;
use crate::record::RecordRef;
use crate::reflection::AssociationReflection;

impl CascadeContext<'_> {
    /// Validation entry point registered as
    /// `validate_associated_records_for_<name>`.
    pub fn validate_associated_records_for(
        &mut self,
        record: &RecordRef,
        association: &AssociationReflection,
    ) -> Result<bool> {
        self.non_cyclic(record, &association.validation_callback_name(), |ctx| {
            if association.is_collection() {
                ctx.validate_collection_association(record, association)
            } else {
                ctx.validate_single_association(record, association)
            }
        })
    }

    pub fn validate_single_association(
        &mut self,
        record: &RecordRef,
        association: &AssociationReflection,
    ) -> Result<bool> {
        let engine = self.engine;
        let runtime = engine.runtime();
        if !runtime.is_loaded(record, association)? {
            return Ok(true);
        }
        match runtime.materialized_targets(record, association)?.first() {
            Some(target) => self.association_valid(record, association, target),
            None => Ok(true),
        }
    }

    /// Validates every record worth considering. All of them are visited so
    /// each contributes its errors.
    pub fn validate_collection_association(
        &mut self,
        record: &RecordRef,
        association: &AssociationReflection,
    ) -> Result<bool> {
        let mut all_valid = true;
        for target in self.records_to_consider(record, association, false)? {
            all_valid &= self.association_valid(record, association, &target)?;
        }
        Ok(all_valid)
    }

    /// Validates one associated record and reports its failure on `owner`.
    ///
    /// Autosave associations copy each nested message under
    /// `<association>.<field>`; others add one generic message under the
    /// association name.
    pub fn association_valid(
        &mut self,
        owner: &RecordRef,
        association: &AssociationReflection,
        target: &RecordRef,
    ) -> Result<bool> {
        let skip = target.with(|r| r.is_destroyed() || r.marked_for_destruction())?;
        if skip || self.valid(target)? {
            return Ok(true);
        }

        let engine = self.engine;
        let config = engine.config();
        if association.cascade_on_save() {
            let nested: Vec<(String, String)> = target.with(|r| {
                r.errors()
                    .iter()
                    .map(|(field, message)| (config.nested_key(association.name(), field), message.to_string()))
                    .collect()
            })?;
            owner.update(|r| {
                for (key, message) in nested {
                    r.errors_mut().add_unique(key, message);
                }
            })?;
        } else {
            owner.update(|r| {
                r.errors_mut()
                    .add_unique(association.name(), config.invalid_association_message.as_str());
            })?;
        }
        Ok(false)
    }

    /// The associated records a cascade should look at.
    ///
    /// Everything loaded when the parent is new, otherwise only records
    /// changed for cascade (autosave) or new records. Saves judge "new" by the
    /// snapshot taken before the parent was written.
    pub fn records_to_consider(
        &mut self,
        record: &RecordRef,
        association: &AssociationReflection,
        for_save: bool,
    ) -> Result<Vec<RecordRef>> {
        let engine = self.engine;
        let runtime = engine.runtime();
        if !runtime.is_loaded(record, association)? {
            return Ok(Vec::new());
        }
        let targets = runtime.materialized_targets(record, association)?;

        let parent_new = record.with(|r| {
            if for_save {
                r.new_record_before_save().unwrap_or_else(|| r.is_new())
            } else {
                r.is_new()
            }
        })?;
        if parent_new {
            return Ok(targets);
        }

        let mut considered = Vec::with_capacity(targets.len());
        for target in targets {
            let keep = if association.cascade_on_save() {
                engine.changed_for_cascade(&target)?
            } else {
                target.is_new()?
            };
            if keep {
                considered.push(target);
            }
        }
        Ok(considered)
    }
}
