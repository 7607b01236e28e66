pub mod catalog;
pub mod codec;

use std::fmt;

use thiserror::Error;
use tracing::{debug, error};

use crate::action::{ActionError, ActionInstance, ActionStatus};
use crate::config::{FailurePolicy, InterpreterConfig};

/// Instruction pointer value of a verb that has not run yet.
pub const NOT_STARTED_IP: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbState {
    NotStarted,
    Suspended { ip: usize },
    Finished,
}

#[derive(Debug, Error)]
pub enum VerbError {
    #[error("verb '{verb}' is suspended at step {ip}; cancel it before running again")]
    AlreadyRunning { verb: String, ip: usize },
    #[error("verb '{verb}' is not suspended and cannot be resumed")]
    NotSuspended { verb: String },
    #[error("verb '{verb}' step {index} ({kind}) failed: {source}")]
    ActionFailed {
        verb: String,
        index: usize,
        kind: String,
        #[source]
        source: ActionError,
    },
}

/// A named, ordered script of actions with an instruction pointer.
pub struct Verb<C> {
    id: String,
    actions: Vec<ActionInstance<C>>,
    ip: i64,
    config: InterpreterConfig,
}

impl<C> Verb<C> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            actions: Vec::new(),
            ip: NOT_STARTED_IP,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn config(&self) -> InterpreterConfig {
        self.config
    }

    pub fn set_config(&mut self, config: InterpreterConfig) {
        self.config = config;
    }

    pub fn add(&mut self, action: ActionInstance<C>) {
        self.actions.push(action);
        self.ip = NOT_STARTED_IP;
    }

    pub fn actions(&self) -> &[ActionInstance<C>] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn ip(&self) -> i64 {
        self.ip
    }

    pub fn state(&self) -> VerbState {
        match self.current_index() {
            Some(ip) => VerbState::Suspended { ip },
            None if self.ip == NOT_STARTED_IP => VerbState::NotStarted,
            None => VerbState::Finished,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state() == VerbState::Finished
    }

    pub fn run(&mut self, ctx: &mut C) -> Result<VerbState, VerbError> {
        if let VerbState::Suspended { ip } = self.state() {
            return Err(VerbError::AlreadyRunning {
                verb: self.id.clone(),
                ip,
            });
        }
        debug!(verb = %self.id, steps = self.actions.len(), "verb_started");
        self.ip = 0;
        self.step(ctx)
    }

    // Late completion signals after a cancel land on a finished verb and are ignored.
    pub fn resume(&mut self, ctx: &mut C) -> Result<VerbState, VerbError> {
        match self.state() {
            VerbState::Finished => {
                debug!(verb = %self.id, "verb_resume_ignored_finished");
                Ok(VerbState::Finished)
            }
            VerbState::NotStarted => Err(VerbError::NotSuspended {
                verb: self.id.clone(),
            }),
            VerbState::Suspended { .. } => {
                self.ip += 1;
                self.step(ctx)
            }
        }
    }

    pub fn cancel(&mut self) {
        if self.is_finished() {
            return;
        }
        let mut cancelled = 0usize;
        for instance in &mut self.actions {
            if let Some(action) = instance.action_mut().as_cancellable_mut() {
                action.cancel();
                cancelled += 1;
            }
        }
        debug!(verb = %self.id, ip = self.ip, cancelled, "verb_cancelled");
        self.ip = self.actions.len() as i64;
    }

    fn step(&mut self, ctx: &mut C) -> Result<VerbState, VerbError> {
        while let Some(index) = self.current_index() {
            let instance = &mut self.actions[index];
            debug!(verb = %self.id, ip = index, kind = instance.kind(), "verb_step");

            match instance.action_mut().execute(ctx) {
                Ok(ActionStatus::Done) => self.ip += 1,
                Ok(ActionStatus::Blocking) => {
                    debug!(verb = %self.id, ip = index, "verb_suspended");
                    return Ok(VerbState::Suspended { ip: index });
                }
                Err(source) => {
                    error!(
                        verb = %self.id,
                        ip = index,
                        kind = instance.kind(),
                        error = %source,
                        "action_failed"
                    );
                    match self.config.failure_policy {
                        FailurePolicy::ContinueOnError => self.ip += 1,
                        FailurePolicy::AbortOnError => {
                            let kind = instance.kind().to_string();
                            self.cancel();
                            return Err(VerbError::ActionFailed {
                                verb: self.id.clone(),
                                index,
                                kind,
                                source,
                            });
                        }
                    }
                }
            }
        }

        debug!(verb = %self.id, "verb_finished");
        Ok(VerbState::Finished)
    }

    fn current_index(&self) -> Option<usize> {
        usize::try_from(self.ip)
            .ok()
            .filter(|index| *index < self.actions.len())
    }

    pub(crate) fn actions_mut(&mut self) -> &mut [ActionInstance<C>] {
        &mut self.actions
    }

    pub(crate) fn set_ip(&mut self, ip: i64) {
        self.ip = ip;
    }

    pub(crate) fn replace_actions(&mut self, actions: Vec<ActionInstance<C>>) {
        self.actions = actions;
        self.ip = NOT_STARTED_IP;
    }
}

impl<C> fmt::Debug for Verb<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verb")
            .field("id", &self.id)
            .field("ip", &self.ip)
            .field("steps", &self.actions.len())
            .finish_non_exhaustive()
    }
}
