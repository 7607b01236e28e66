mod property;
pub mod registry;

use std::fmt;

use serde_json::Value;
use thiserror::Error;

pub use property::{PropertyDescriptor, PropertyType, PropertyValue};
pub use registry::{ActionKind, ActionRegistry, RegistryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Done,
    Blocking,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ActionError {
    message: String,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A single configurable step of a verb, run against the host context `C`.
pub trait Action<C> {
    fn execute(&mut self, ctx: &mut C) -> Result<ActionStatus, ActionError>;

    // `None` means unset; unset properties are never written out.
    fn property(&self, _name: &str) -> Option<PropertyValue> {
        None
    }

    fn set_property(&mut self, name: &str, _value: PropertyValue) -> Result<(), ActionError> {
        Err(ActionError::new(format!("property '{name}' is not settable")))
    }

    fn as_cancellable_mut(&mut self) -> Option<&mut dyn Cancellable> {
        None
    }

    fn as_resumable(&self) -> Option<&dyn ResumableState> {
        None
    }

    fn as_resumable_mut(&mut self) -> Option<&mut dyn ResumableState> {
        None
    }
}

pub trait Cancellable {
    fn cancel(&mut self);
}

/// Progress an action accumulates while executing and that must survive a save.
pub trait ResumableState {
    fn capture_runtime_state(&self) -> Value;
    fn apply_runtime_state(&mut self, payload: &Value) -> Result<(), ActionError>;
}

pub struct ActionInstance<C> {
    kind: String,
    action: Box<dyn Action<C>>,
}

impl<C> ActionInstance<C> {
    pub fn new(kind: impl Into<String>, action: Box<dyn Action<C>>) -> Self {
        Self {
            kind: kind.into(),
            action,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn action(&self) -> &dyn Action<C> {
        self.action.as_ref()
    }

    pub fn action_mut(&mut self) -> &mut dyn Action<C> {
        self.action.as_mut()
    }
}

impl<C> fmt::Debug for ActionInstance<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionInstance")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
