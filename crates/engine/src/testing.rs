//! Action kinds shared by the crate's unit tests.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::{json, Value};

use crate::action::{
    Action, ActionError, ActionKind, ActionRegistry, ActionStatus, Cancellable,
    PropertyDescriptor, PropertyType, PropertyValue, ResumableState,
};

const BASE_PROPERTIES: &[PropertyDescriptor] =
    &[PropertyDescriptor::new("comment", PropertyType::Text)];

/// Execution context that records what ran.
#[derive(Debug, Default)]
pub(crate) struct Trace {
    pub(crate) executed: Vec<String>,
}

#[derive(Default)]
pub(crate) struct Note {
    comment: Option<String>,
    text: Option<String>,
    repeat: Option<i64>,
    loud: Option<bool>,
}

impl Action<Trace> for Note {
    fn execute(&mut self, ctx: &mut Trace) -> Result<ActionStatus, ActionError> {
        ctx.executed
            .push(format!("note:{}", self.text.as_deref().unwrap_or_default()));
        Ok(ActionStatus::Done)
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "comment" => self.comment.clone().map(PropertyValue::Text),
            "text" => self.text.clone().map(PropertyValue::Text),
            "repeat" => self.repeat.map(PropertyValue::Int),
            "loud" => self.loud.map(PropertyValue::Bool),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), ActionError> {
        match name {
            "comment" => self.comment = value.into_text(),
            "text" => self.text = value.into_text(),
            "repeat" => self.repeat = value.as_int(),
            "loud" => self.loud = value.as_bool(),
            _ => return Err(ActionError::new(format!("no property '{name}'"))),
        }
        Ok(())
    }
}

pub(crate) struct Pause {
    seconds: Option<f64>,
    elapsed: f64,
    cancels: Rc<Cell<usize>>,
}

impl Action<Trace> for Pause {
    fn execute(&mut self, ctx: &mut Trace) -> Result<ActionStatus, ActionError> {
        ctx.executed.push("pause".to_string());
        self.elapsed += self.seconds.unwrap_or_default();
        Ok(ActionStatus::Blocking)
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "seconds" => self.seconds.map(PropertyValue::Float),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), ActionError> {
        match name {
            "seconds" => self.seconds = value.as_float(),
            _ => return Err(ActionError::new(format!("no property '{name}'"))),
        }
        Ok(())
    }

    fn as_cancellable_mut(&mut self) -> Option<&mut dyn Cancellable> {
        Some(self)
    }

    fn as_resumable(&self) -> Option<&dyn ResumableState> {
        Some(self)
    }

    fn as_resumable_mut(&mut self) -> Option<&mut dyn ResumableState> {
        Some(self)
    }
}

impl Cancellable for Pause {
    fn cancel(&mut self) {
        self.cancels.set(self.cancels.get() + 1);
    }
}

impl ResumableState for Pause {
    fn capture_runtime_state(&self) -> Value {
        json!({ "elapsed": self.elapsed })
    }

    fn apply_runtime_state(&mut self, payload: &Value) -> Result<(), ActionError> {
        self.elapsed = payload
            .get("elapsed")
            .and_then(Value::as_f64)
            .ok_or_else(|| ActionError::new("missing numeric 'elapsed'"))?;
        Ok(())
    }
}

impl Pause {
    pub(crate) fn elapsed_of(action: &dyn Action<Trace>) -> Option<f64> {
        action
            .as_resumable()
            .and_then(|state| state.capture_runtime_state().get("elapsed")?.as_f64())
    }
}

pub(crate) struct Broken;

impl Action<Trace> for Broken {
    fn execute(&mut self, ctx: &mut Trace) -> Result<ActionStatus, ActionError> {
        ctx.executed.push("broken".to_string());
        Err(ActionError::new("boom"))
    }
}

/// Registry with `note`, `pause` and `broken`, plus the counter bumped by
/// every `pause` cancellation.
pub(crate) fn registry() -> (ActionRegistry<Trace>, Rc<Cell<usize>>) {
    let cancels = Rc::new(Cell::new(0));
    let pause_cancels = Rc::clone(&cancels);
    let mut registry = ActionRegistry::new();
    registry
        .register(
            ActionKind::new("note", Note::default)
                .extends(BASE_PROPERTIES)
                .property("text", PropertyType::Text)
                .property("repeat", PropertyType::Int)
                .property("loud", PropertyType::Bool),
        )
        .expect("register note");
    registry
        .register(
            ActionKind::new("pause", move || Pause {
                seconds: None,
                elapsed: 0.0,
                cancels: Rc::clone(&pause_cancels),
            })
            .property("seconds", PropertyType::Float),
        )
        .expect("register pause");
    registry
        .register(ActionKind::new("broken", || Broken))
        .expect("register broken");
    (registry, cancels)
}
