use crate::core::{OgmError, Result};
use crate::record::RecordRef;
use crate::reflection::AssociationReflection;

/// Access to the already-materialized side of an association.
///
/// The engine never loads anything itself; it only looks at what a runtime
/// reports as loaded.
pub trait AssociationRuntime: Send + Sync {
    fn is_loaded(&self, owner: &RecordRef, association: &AssociationReflection) -> Result<bool>;

    /// Loaded targets in insertion order. Asking for an association that was
    /// never loaded is an error, distinct from an empty association.
    fn materialized_targets(
        &self,
        owner: &RecordRef,
        association: &AssociationReflection,
    ) -> Result<Vec<RecordRef>>;

    /// Re-keys the association's relationship query on the owner's current
    /// id. Returns `false` when the runtime does not support it.
    fn reset_scope(&self, _owner: &RecordRef, _association: &AssociationReflection) -> Result<bool> {
        Ok(false)
    }
}

/// Runtime backed by the materializations stored on each record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadedAssociations;

impl AssociationRuntime for LoadedAssociations {
    fn is_loaded(&self, owner: &RecordRef, association: &AssociationReflection) -> Result<bool> {
        owner.with(|record| record.materialization(association.name()).is_some())
    }

    fn materialized_targets(
        &self,
        owner: &RecordRef,
        association: &AssociationReflection,
    ) -> Result<Vec<RecordRef>> {
        let record = owner.read()?;
        match record.materialization(association.name()) {
            Some(loaded) if loaded.cardinality() == association.cardinality() => Ok(loaded.records()),
            Some(_) => Err(OgmError::CardinalityMismatch {
                model: record.model().to_string(),
                association: association.name().to_string(),
                expected: association.cardinality().macro_name(),
            }),
            None => Err(OgmError::AssociationNotLoaded {
                model: record.model().to_string(),
                association: association.name().to_string(),
            }),
        }
    }

    fn reset_scope(&self, owner: &RecordRef, association: &AssociationReflection) -> Result<bool> {
        owner.update(|record| record.reset_association_scope(association.name()))
    }
}
