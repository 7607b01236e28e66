use serde_json::{json, Value};
use verb_engine::{
    Action, ActionError, ActionKind, ActionRegistry, ActionStatus, Cancellable,
    PropertyDescriptor, PropertyType, PropertyValue, RegistryError, ResumableState,
};

use super::world::DemoWorld;

const DEFAULT_VOLUME: f64 = 1.0;
const TEXT_STYLES: &[&str] = &["plain", "bubble", "subtitle"];

/// Properties every demo kind accepts.
const COMMON_PROPERTIES: &[PropertyDescriptor] =
    &[PropertyDescriptor::new("comment", PropertyType::Text)];

pub(crate) fn build_registry() -> Result<ActionRegistry<DemoWorld>, RegistryError> {
    let mut registry = ActionRegistry::new();
    registry.register(
        ActionKind::new("sound", PlaySound::default)
            .extends(COMMON_PROPERTIES)
            .property("sound", PropertyType::Text)
            .property("volume", PropertyType::Float),
    )?;
    registry.register(
        ActionKind::new("wait", Wait::default)
            .extends(COMMON_PROPERTIES)
            .property("time", PropertyType::Float),
    )?;
    registry.register(
        ActionKind::new("text", ShowText::default)
            .extends(COMMON_PROPERTIES)
            .property("text", PropertyType::Text)
            .property("actor", PropertyType::Text)
            .property("style", PropertyType::Choice(TEXT_STYLES)),
    )?;
    registry.register(
        ActionKind::new("set_state", SetState::default)
            .extends(COMMON_PROPERTIES)
            .property("actor", PropertyType::Text)
            .property("state", PropertyType::Text),
    )?;
    registry.register(ActionKind::new("fail", Fail::default).extends(COMMON_PROPERTIES))?;
    Ok(registry)
}

fn unknown_property(name: &str) -> ActionError {
    ActionError::new(format!("no property '{name}'"))
}

#[derive(Debug, Default)]
struct PlaySound {
    comment: Option<String>,
    sound: Option<String>,
    volume: Option<f64>,
}

impl Action<DemoWorld> for PlaySound {
    fn execute(&mut self, ctx: &mut DemoWorld) -> Result<ActionStatus, ActionError> {
        let sound = self
            .sound
            .as_deref()
            .ok_or_else(|| ActionError::new("sound is not set"))?;
        ctx.play_sound(sound, self.volume.unwrap_or(DEFAULT_VOLUME));
        Ok(ActionStatus::Done)
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "comment" => self.comment.clone().map(PropertyValue::Text),
            "sound" => self.sound.clone().map(PropertyValue::Text),
            "volume" => self.volume.map(PropertyValue::Float),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), ActionError> {
        match name {
            "comment" => self.comment = value.into_text(),
            "sound" => self.sound = value.into_text(),
            "volume" => {
                let volume = value.as_float().unwrap_or(DEFAULT_VOLUME);
                if !(0.0..=1.0).contains(&volume) {
                    return Err(ActionError::new("volume must be within 0..=1"));
                }
                self.volume = Some(volume);
            }
            _ => return Err(unknown_property(name)),
        }
        Ok(())
    }
}

/// Arms the world timer and suspends the verb until it fires.
#[derive(Debug, Default)]
struct Wait {
    comment: Option<String>,
    time: Option<f64>,
    started_at: Option<f64>,
}

impl Action<DemoWorld> for Wait {
    fn execute(&mut self, ctx: &mut DemoWorld) -> Result<ActionStatus, ActionError> {
        let time = self.time.unwrap_or_default();
        if time <= 0.0 {
            return Ok(ActionStatus::Done);
        }
        self.started_at = Some(ctx.clock());
        ctx.schedule_resume(time);
        Ok(ActionStatus::Blocking)
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "comment" => self.comment.clone().map(PropertyValue::Text),
            "time" => self.time.map(PropertyValue::Float),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), ActionError> {
        match name {
            "comment" => self.comment = value.into_text(),
            "time" => {
                let time = value.as_float().unwrap_or_default();
                if time < 0.0 {
                    return Err(ActionError::new("time must be >= 0"));
                }
                self.time = Some(time);
            }
            _ => return Err(unknown_property(name)),
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

impl Cancellable for Wait {
    fn cancel(&mut self) {
        self.started_at = None;
    }
}

impl ResumableState for Wait {
    fn capture_runtime_state(&self) -> Value {
        json!({ "started_at": self.started_at })
    }

    fn apply_runtime_state(&mut self, payload: &Value) -> Result<(), ActionError> {
        self.started_at = match payload.get("started_at") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_f64()
                    .ok_or_else(|| ActionError::new("started_at must be a number"))?,
            ),
        };
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ShowText {
    comment: Option<String>,
    text: Option<String>,
    actor: Option<String>,
    style: Option<String>,
}

impl Action<DemoWorld> for ShowText {
    fn execute(&mut self, ctx: &mut DemoWorld) -> Result<ActionStatus, ActionError> {
        ctx.show_text(self.actor.as_deref(), self.text.as_deref().unwrap_or_default());
        Ok(ActionStatus::Done)
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "comment" => self.comment.clone().map(PropertyValue::Text),
            "text" => self.text.clone().map(PropertyValue::Text),
            "actor" => self.actor.clone().map(PropertyValue::Text),
            "style" => self.style.clone().map(PropertyValue::Text),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), ActionError> {
        match name {
            "comment" => self.comment = value.into_text(),
            "text" => self.text = value.into_text(),
            "actor" => self.actor = value.into_text(),
            "style" => self.style = value.into_text(),
            _ => return Err(unknown_property(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SetState {
    comment: Option<String>,
    actor: Option<String>,
    state: Option<String>,
}

impl Action<DemoWorld> for SetState {
    fn execute(&mut self, ctx: &mut DemoWorld) -> Result<ActionStatus, ActionError> {
        let (Some(actor), Some(state)) = (self.actor.as_deref(), self.state.as_deref()) else {
            return Err(ActionError::new("set_state needs both actor and state"));
        };
        ctx.set_actor_state(actor, state);
        Ok(ActionStatus::Done)
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "comment" => self.comment.clone().map(PropertyValue::Text),
            "actor" => self.actor.clone().map(PropertyValue::Text),
            "state" => self.state.clone().map(PropertyValue::Text),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), ActionError> {
        match name {
            "comment" => self.comment = value.into_text(),
            "actor" => self.actor = value.into_text(),
            "state" => self.state = value.into_text(),
            _ => return Err(unknown_property(name)),
        }
        Ok(())
    }
}

/// Always errors; lets authored scripts exercise the failure policy.
#[derive(Debug, Default)]
struct Fail {
    comment: Option<String>,
}

impl Action<DemoWorld> for Fail {
    fn execute(&mut self, _ctx: &mut DemoWorld) -> Result<ActionStatus, ActionError> {
        Err(ActionError::new(
            self.comment
                .clone()
                .unwrap_or_else(|| "fail step executed".to_string()),
        ))
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "comment" => self.comment.clone().map(PropertyValue::Text),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), ActionError> {
        match name {
            "comment" => self.comment = value.into_text(),
            _ => return Err(unknown_property(name)),
        }
        Ok(())
    }
}
