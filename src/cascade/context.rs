use super::CascadeEngine;
use crate::core::{OgmError, RecordErrors, Result};
use crate::record::{Record, RecordRef, RecordState};
use crate::reflection::AssociationReflection;
use crate::transaction::TransactionId;
use log::warn;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{Level, event};

/// An associated record that failed to save without failing its parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetachedFailure {
    pub owner_model: String,
    pub association: String,
    pub target_model: String,
    pub errors: RecordErrors,
}

/// Transaction handle carried through one top-level save or destroy.
#[derive(Debug)]
pub(crate) struct CascadeTransaction {
    pub(crate) id: TransactionId,
    pub(crate) rollback_reason: Option<String>,
    pub(crate) detached_failures: Vec<DetachedFailure>,
    /// First snapshot of every record written in this transaction.
    pub(crate) touched: Vec<(RecordRef, RecordState)>,
    seen: HashSet<usize>,
    /// Whether each record was new when its outermost save began.
    new_before_save: HashMap<usize, bool>,
}

impl CascadeTransaction {
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            rollback_reason: None,
            detached_failures: Vec::new(),
            touched: Vec::new(),
            seen: HashSet::new(),
            new_before_save: HashMap::new(),
        }
    }

    /// Puts every touched record back the way it was before the transaction.
    pub(crate) fn restore(self) -> Result<()> {
        for (record, state) in self.touched.into_iter().rev() {
            record.update(|r| r.restore_transaction_state(state))?;
        }
        Ok(())
    }
}

/// State threaded through one cascade: the engine, the transaction handle and
/// the name of a `before_save` callback that halted the save, if any.
///
/// Lifecycle callbacks receive the context so they can cascade further or
/// request a rollback.
pub struct CascadeContext<'a> {
    pub(super) engine: &'a CascadeEngine,
    pub(super) transaction: Option<CascadeTransaction>,
    pub(super) halted_by: Option<String>,
}

impl<'a> CascadeContext<'a> {
    pub(crate) fn new(engine: &'a CascadeEngine, transaction: Option<CascadeTransaction>) -> Self {
        Self {
            engine,
            transaction,
            halted_by: None,
        }
    }

    pub fn engine(&self) -> &'a CascadeEngine {
        self.engine
    }

    pub fn transaction_id(&self) -> Result<TransactionId> {
        self.transaction
            .as_ref()
            .map(|transaction| transaction.id)
            .ok_or_else(|| {
                OgmError::NoActiveTransaction("writes need a save or destroy in progress".into())
            })
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Asks for the current transaction to be rolled back. Only the first
    /// reason is kept.
    pub fn request_rollback(&mut self, reason: impl Into<String>) {
        let Some(transaction) = self.transaction.as_mut() else {
            return;
        };
        if transaction.rollback_reason.is_none() {
            let reason = reason.into();
            event!(Level::WARN, tx = %transaction.id, reason = %reason, "cascade rollback requested");
            transaction.rollback_reason = Some(reason);
        }
    }

    pub fn rollback_requested(&self) -> bool {
        self.transaction
            .as_ref()
            .is_some_and(|transaction| transaction.rollback_reason.is_some())
    }

    pub fn rollback_reason(&self) -> Option<&str> {
        self.transaction
            .as_ref()
            .and_then(|transaction| transaction.rollback_reason.as_deref())
    }

    pub fn halted_by(&self) -> Option<&str> {
        self.halted_by.as_deref()
    }

    pub fn detached_failures(&self) -> &[DetachedFailure] {
        self.transaction
            .as_ref()
            .map(|transaction| transaction.detached_failures.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn into_transaction(self) -> (Option<CascadeTransaction>, Option<String>) {
        (self.transaction, self.halted_by)
    }

    /// Snapshots `record` the first time it is written in this transaction.
    pub(crate) fn remember(&mut self, record: &RecordRef) -> Result<()> {
        let Some(transaction) = self.transaction.as_mut() else {
            return Ok(());
        };
        if transaction.seen.insert(record.identity()) {
            let state = record.with(Record::transaction_state)?;
            transaction.touched.push((record.clone(), state));
        }
        Ok(())
    }

    /// Stores on `record` whether it was new when its first save in this
    /// transaction began. Saves re-entered through a cycle keep that value.
    pub(crate) fn capture_new_record_before_save(&mut self, record: &RecordRef) -> Result<bool> {
        let is_new = record.is_new()?;
        let was_new = match self.transaction.as_mut() {
            Some(transaction) => *transaction
                .new_before_save
                .entry(record.identity())
                .or_insert(is_new),
            None => is_new,
        };
        record.update(|r| r.set_new_record_before_save(was_new))?;
        Ok(was_new)
    }

    /// Runs `f` unless `callback` is already executing on `record`, in which
    /// case it reports success without doing anything.
    pub(crate) fn non_cyclic(
        &mut self,
        record: &RecordRef,
        callback: &str,
        f: impl FnOnce(&mut Self) -> Result<bool>,
    ) -> Result<bool> {
        let Some(_token) = record.enter_guard(callback)? else {
            event!(Level::TRACE, callback, "skipping re-entrant association callback");
            return Ok(true);
        };
        f(self)
    }

    pub(crate) fn record_detached_failure(
        &mut self,
        owner: &RecordRef,
        association: &AssociationReflection,
        target: &RecordRef,
    ) -> Result<()> {
        let failure = DetachedFailure {
            owner_model: owner.model()?,
            association: association.name().to_string(),
            target_model: target.model()?,
            errors: target.errors()?,
        };
        warn!(
            "{}.{}: associated {} record was not saved: {}",
            failure.owner_model,
            failure.association,
            failure.target_model,
            failure.errors.full_messages().join(", ")
        );
        if let Some(transaction) = self.transaction.as_mut() {
            transaction.detached_failures.push(failure);
        }
        Ok(())
    }
}
