use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const TIMER_TOLERANCE_SECONDS: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    Sound { name: String, volume: f64 },
    Text { actor: Option<String>, text: String },
    State { actor: String, state: String },
}

#[derive(Debug, Default)]
pub(crate) struct DemoWorld {
    clock: f64,
    resume_at: Option<f64>,
    actor_states: BTreeMap<String, String>,
    effects: Vec<Effect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WorldSnapshot {
    clock: f64,
    resume_at: Option<f64>,
    #[serde(default)]
    actor_states: BTreeMap<String, String>,
}

impl DemoWorld {
    pub(crate) fn clock(&self) -> f64 {
        self.clock
    }

    pub(crate) fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub(crate) fn actor_state(&self, actor: &str) -> Option<&str> {
        self.actor_states.get(actor).map(String::as_str)
    }

    pub(crate) fn has_pending_timer(&self) -> bool {
        self.resume_at.is_some()
    }

    pub(crate) fn schedule_resume(&mut self, delay_seconds: f64) {
        let at = self.clock + delay_seconds.max(0.0);
        debug!(clock = self.clock, at, "timer_armed");
        self.resume_at = Some(at);
    }

    pub(crate) fn advance(&mut self, dt_seconds: f64) -> bool {
        self.clock += dt_seconds;
        match self.resume_at {
            Some(at) if self.clock + TIMER_TOLERANCE_SECONDS >= at => {
                self.resume_at = None;
                debug!(clock = self.clock, "timer_fired");
                true
            }
            _ => false,
        }
    }

    pub(crate) fn play_sound(&mut self, name: &str, volume: f64) {
        info!(clock = self.clock, sound = name, volume, "sound_played");
        self.effects.push(Effect::Sound {
            name: name.to_string(),
            volume,
        });
    }

    pub(crate) fn show_text(&mut self, actor: Option<&str>, text: &str) {
        info!(clock = self.clock, actor = actor.unwrap_or("-"), text, "text_shown");
        self.effects.push(Effect::Text {
            actor: actor.map(str::to_string),
            text: text.to_string(),
        });
    }

    pub(crate) fn set_actor_state(&mut self, actor: &str, state: &str) {
        self.actor_states
            .insert(actor.to_string(), state.to_string());
        info!(clock = self.clock, actor, state, "actor_state_changed");
        self.effects.push(Effect::State {
            actor: actor.to_string(),
            state: state.to_string(),
        });
    }

    pub(crate) fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            clock: self.clock,
            resume_at: self.resume_at,
            actor_states: self.actor_states.clone(),
        }
    }

    // The effect log is not part of a snapshot.
    pub(crate) fn restore(&mut self, snapshot: WorldSnapshot) {
        self.clock = snapshot.clock;
        self.resume_at = snapshot.resume_at;
        self.actor_states = snapshot.actor_states;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_fires_once_at_deadline() {
        let mut world = DemoWorld::default();
        world.schedule_resume(0.3);

        assert!(!world.advance(0.1));
        assert!(!world.advance(0.1));
        assert!(world.advance(0.1));
        assert!(!world.has_pending_timer());
        assert!(!world.advance(0.1));
    }

    #[test]
    fn snapshot_restores_clock_timer_and_states() {
        let mut world = DemoWorld::default();
        world.advance(1.0);
        world.schedule_resume(2.0);
        world.set_actor_state("door", "open");
        let snapshot = world.snapshot();

        let mut restored = DemoWorld::default();
        restored.play_sound("click", 1.0);
        restored.restore(snapshot);

        assert_eq!(restored.clock(), 1.0);
        assert!(restored.has_pending_timer());
        assert_eq!(restored.actor_state("door"), Some("open"));
        assert_eq!(restored.effects().len(), 1);
    }
}
