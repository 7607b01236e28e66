//! Verb interpreter: named, ordered scripts of configurable actions that can
//! suspend on asynchronous effects and persist both their authored structure
//! and their live progress.

pub mod action;
mod config;
pub mod save;
pub mod verb;

#[cfg(test)]
mod testing;

pub use action::{
    Action, ActionError, ActionInstance, ActionKind, ActionRegistry, ActionStatus, Cancellable,
    PropertyDescriptor, PropertyType, PropertyValue, RegistryError, ResumableState,
};
pub use config::{FailurePolicy, InterpreterConfig, ParseFailurePolicyError};
pub use save::{read_runtime_save, write_runtime_save, SaveError, SAVE_VERSION};
pub use verb::catalog::{CatalogError, CatalogLoadFailure, CatalogLoadReport, VerbCatalog};
pub use verb::codec::{SerializationError, SerializationMode, VerbCodec};
pub use verb::{Verb, VerbError, VerbState, NOT_STARTED_IP};

/// Verb ids the host triggers from standard interactions.
pub mod verbs {
    pub const LOOKAT: &str = "lookat";
    pub const PICKUP: &str = "pickup";
    pub const LEAVE: &str = "leave";
    pub const TALKTO: &str = "talkto";
    pub const USE: &str = "use";
    pub const GOTO: &str = "goto";
    pub const TEST: &str = "test";
    pub const INIT: &str = "init";
}
