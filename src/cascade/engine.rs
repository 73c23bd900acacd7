use super::context::CascadeTransaction;
use super::{AssociationRuntime, CascadeConfig, CascadeContext, LoadedAssociations, SaveOutcome};
use crate::core::{OgmError, Result};
use crate::model::Schema;
use crate::record::RecordRef;
use crate::reflection::AssociationReflection;
use crate::storage::GraphStore;
use crate::transaction::TransactionId;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// Cascading persistence over a [`Schema`] and a [`GraphStore`].
///
/// Every top-level call runs in its own store transaction.
pub struct CascadeEngine {
    schema: Arc<Schema>,
    store: Arc<dyn GraphStore>,
    runtime: Arc<dyn AssociationRuntime>,
    config: CascadeConfig,
}

impl CascadeEngine {
    pub fn new(schema: impl Into<Arc<Schema>>, store: Arc<dyn GraphStore>) -> Self {
        Self {
            schema: schema.into(),
            store,
            runtime: Arc::new(LoadedAssociations),
            config: CascadeConfig::default(),
        }
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn AssociationRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_config(mut self, config: CascadeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &dyn GraphStore {
        self.store.as_ref()
    }

    pub fn runtime(&self) -> &dyn AssociationRuntime {
        self.runtime.as_ref()
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Saves `record` and everything its autosave associations reach, in one
    /// transaction.
    pub fn save(&self, record: &RecordRef) -> Result<SaveOutcome> {
        let model = record.model()?;
        let span = info_span!("cascade.save", model = %model);
        let _enter = span.enter();

        let tx = self.store.begin_transaction()?;
        let mut ctx = CascadeContext::new(self, Some(CascadeTransaction::new(tx)));
        let result = ctx.save_record(record, true);
        let (transaction, halted_by) = ctx.into_transaction();
        let transaction = transaction
            .ok_or_else(|| OgmError::Transaction(format!("transaction {} was lost", tx)))?;

        let saved = match result {
            Ok(saved) => saved,
            Err(err) => {
                event!(Level::ERROR, error = %err, "cascade save failed");
                self.abort(tx, transaction)?;
                return Err(err);
            }
        };

        if saved && transaction.rollback_reason.is_none() {
            if let Err(err) = self.store.commit(tx) {
                event!(Level::ERROR, error = %err, "cascade commit failed");
                self.restore(transaction)?;
                return Err(err);
            }
            event!(Level::DEBUG, "cascade save committed");
            return Ok(SaveOutcome::Saved {
                detached_failures: transaction.detached_failures,
            });
        }

        let reason = transaction.rollback_reason.clone();
        self.abort(tx, transaction)?;

        if let Some(reason) = reason {
            return Ok(SaveOutcome::RolledBack { reason });
        }
        if let Some(callback) = halted_by {
            return Ok(SaveOutcome::RolledBack {
                reason: format!("before_save callback '{}' halted the save", callback),
            });
        }
        Ok(SaveOutcome::Invalid {
            errors: record.errors()?,
        })
    }

    /// Deletes `record`'s node in its own transaction. Destroying a destroyed
    /// record does nothing.
    pub fn destroy(&self, record: &RecordRef) -> Result<()> {
        if record.is_destroyed()? {
            return Ok(());
        }
        let model = record.model()?;
        let span = info_span!("cascade.destroy", model = %model);
        let _enter = span.enter();

        let tx = self.store.begin_transaction()?;
        let mut ctx = CascadeContext::new(self, Some(CascadeTransaction::new(tx)));
        let result = ctx.destroy_record(record);
        let (transaction, _) = ctx.into_transaction();
        let transaction = transaction
            .ok_or_else(|| OgmError::Transaction(format!("transaction {} was lost", tx)))?;

        match result.and_then(|()| self.store.commit(tx)) {
            Ok(()) => {
                event!(Level::DEBUG, "record destroyed");
                Ok(())
            }
            Err(err) => {
                event!(Level::ERROR, error = %err, "cascade destroy failed");
                self.abort(tx, transaction)?;
                Err(err)
            }
        }
    }

    /// Runs `record`'s own and association validations without writing.
    pub fn validate(&self, record: &RecordRef) -> Result<bool> {
        CascadeContext::new(self, None).valid(record)
    }

    /// Whether saving `record` would write anything: it is new, changed,
    /// marked for destruction, or an already-loaded record reachable through
    /// autosave associations is. Never loads.
    pub fn changed_for_cascade(&self, record: &RecordRef) -> Result<bool> {
        let mut visited = HashSet::new();
        self.changed_for_cascade_from(record, &mut visited)
    }

    fn changed_for_cascade_from(&self, record: &RecordRef, visited: &mut HashSet<usize>) -> Result<bool> {
        if !visited.insert(record.identity()) {
            return Ok(false);
        }
        let (model, dirty) = record.with(|r| {
            (
                r.model().to_string(),
                r.is_new() || r.changed() || r.marked_for_destruction(),
            )
        })?;
        if dirty {
            return Ok(true);
        }

        for association in self.schema.reflect_on_all_associations(&model, None) {
            if !association.cascade_on_save() || !self.runtime.is_loaded(record, &association)? {
                continue;
            }
            for target in self.runtime.materialized_targets(record, &association)? {
                if self.changed_for_cascade_from(&target, visited)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// The loaded records of `association` a validation of `record` would
    /// look at.
    pub fn records_to_consider(&self, record: &RecordRef, association: &str) -> Result<Vec<RecordRef>> {
        let reflection = self.reflection_for(record, association)?;
        CascadeContext::new(self, None).records_to_consider(record, &reflection, false)
    }

    /// Re-reads `record`'s properties from the store, dropping unsaved changes
    /// and any pending destruction.
    pub fn reload(&self, record: &RecordRef) -> Result<()> {
        let id = record
            .id()?
            .ok_or_else(|| OgmError::RecordNotFound("record has never been saved".into()))?;
        let node = self
            .store
            .fetch_node(&id)?
            .ok_or_else(|| OgmError::RecordNotFound(id.clone()))?;
        record.update(|r| r.reload_properties(node.properties))?;
        event!(Level::DEBUG, id = %id, "record reloaded");
        Ok(())
    }

    fn reflection_for(&self, record: &RecordRef, association: &str) -> Result<Arc<AssociationReflection>> {
        let model = record.model()?;
        self.schema.reflect_on_association(&model, association)
    }

    fn abort(&self, tx: TransactionId, transaction: CascadeTransaction) -> Result<()> {
        if let Err(err) = self.store.rollback(tx) {
            event!(Level::ERROR, error = %err, tx = %tx, "store rollback failed");
        }
        self.restore(transaction)
    }

    fn restore(&self, transaction: CascadeTransaction) -> Result<()> {
        if self.config.restore_state_on_rollback {
            transaction.restore()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CascadeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeEngine")
            .field("schema", &self.schema.model_names())
            .field("config", &self.config)
            .finish()
    }
}
