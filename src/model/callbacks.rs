use crate::cascade::CascadeContext;
use crate::core::Result;
use crate::record::RecordRef;
use std::fmt;
use std::sync::Arc;

/// A lifecycle callback. Returning `Ok(false)` from a `before_save` callback
/// halts the save; the return value of the other events is informational.
pub type CallbackFn =
    Arc<dyn Fn(&mut CascadeContext<'_>, &RecordRef) -> Result<bool> + Send + Sync>;

/// Points in a record's save lifecycle callbacks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    BeforeSave,
    AfterCreate,
    AfterUpdate,
    Validate,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::BeforeSave => write!(f, "before_save"),
            LifecycleEvent::AfterCreate => write!(f, "after_create"),
            LifecycleEvent::AfterUpdate => write!(f, "after_update"),
            LifecycleEvent::Validate => write!(f, "validate"),
        }
    }
}

#[derive(Clone)]
pub struct NamedCallback {
    pub name: String,
    pub callback: CallbackFn,
}

impl fmt::Debug for NamedCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamedCallback").field(&self.name).finish()
    }
}

/// Ordered callbacks per lifecycle event. A name is registered at most once
/// per event.
#[derive(Debug, Clone, Default)]
pub struct CallbackChain {
    before_save: Vec<NamedCallback>,
    after_create: Vec<NamedCallback>,
    after_update: Vec<NamedCallback>,
    validate: Vec<NamedCallback>,
}

impl CallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `callback` to `event`. Returns `false` and leaves the chain
    /// unchanged when `name` is already registered for that event.
    pub fn register(&mut self, event: LifecycleEvent, name: &str, callback: CallbackFn) -> bool {
        let chain = self.chain_mut(event);
        if chain.iter().any(|existing| existing.name == name) {
            return false;
        }
        chain.push(NamedCallback {
            name: name.to_string(),
            callback,
        });
        true
    }

    pub fn callbacks(&self, event: LifecycleEvent) -> &[NamedCallback] {
        match event {
            LifecycleEvent::BeforeSave => &self.before_save,
            LifecycleEvent::AfterCreate => &self.after_create,
            LifecycleEvent::AfterUpdate => &self.after_update,
            LifecycleEvent::Validate => &self.validate,
        }
    }

    pub fn names(&self, event: LifecycleEvent) -> Vec<&str> {
        self.callbacks(event)
            .iter()
            .map(|callback| callback.name.as_str())
            .collect()
    }

    pub fn contains(&self, event: LifecycleEvent, name: &str) -> bool {
        self.callbacks(event).iter().any(|callback| callback.name == name)
    }

    fn chain_mut(&mut self, event: LifecycleEvent) -> &mut Vec<NamedCallback> {
        match event {
            LifecycleEvent::BeforeSave => &mut self.before_save,
            LifecycleEvent::AfterCreate => &mut self.after_create,
            LifecycleEvent::AfterUpdate => &mut self.after_update,
            LifecycleEvent::Validate => &mut self.validate,
        }
    }
}
