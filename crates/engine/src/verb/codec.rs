//! Reads and writes verbs in one of two independent shapes.
//!
//! Definition mode carries authored structure (`id` plus each action's kind
//! and configured properties) and rebuilds the action list from scratch.
//! Runtime mode carries live state (`ip` plus the payloads of resumable
//! actions) and is applied onto an action list that already exists.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::action::registry::KIND_KEY;
use crate::action::{ActionError, ActionRegistry, RegistryError};

use super::{Verb, NOT_STARTED_IP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationMode {
    Definition,
    Runtime,
}

impl fmt::Display for SerializationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationMode::Definition => f.write_str("definition"),
            SerializationMode::Runtime => f.write_str("runtime"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("malformed {mode} payload at {path}: {message}")]
    Malformed {
        mode: SerializationMode,
        path: String,
        message: String,
    },
    #[error("action {index}: {source}")]
    Action {
        index: usize,
        #[source]
        source: RegistryError,
    },
    #[error("action {index} property '{property}': unsupported value {value} (expected string, number or bool)")]
    UnsupportedPropertyValue {
        index: usize,
        property: String,
        value: String,
    },
    #[error("instruction pointer {ip} out of range for {len} actions")]
    IpOutOfRange { ip: i64, len: usize },
    #[error("action {index} ({kind}) rejected runtime state: {source}")]
    RuntimeState {
        index: usize,
        kind: String,
        #[source]
        source: ActionError,
    },
}

impl SerializationError {
    /// The registry error behind a failed definition read, if any.
    pub fn registry_error(&self) -> Option<&RegistryError> {
        match self {
            SerializationError::Action { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct DefinitionPayload {
    id: String,
    actions: Vec<Map<String, Value>>,
}

#[derive(Deserialize)]
struct RuntimePayload {
    ip: i64,
    actions: Vec<Value>,
}

pub struct VerbCodec<'r, C> {
    registry: &'r ActionRegistry<C>,
}

impl<'r, C> VerbCodec<'r, C> {
    pub fn new(registry: &'r ActionRegistry<C>) -> Self {
        Self { registry }
    }

    pub fn write(&self, verb: &Verb<C>, mode: SerializationMode) -> Result<Value, SerializationError> {
        match mode {
            SerializationMode::Definition => self.write_definition(verb),
            SerializationMode::Runtime => Ok(write_runtime(verb)),
        }
    }

    pub fn read(
        &self,
        verb: &mut Verb<C>,
        mode: SerializationMode,
        payload: &Value,
    ) -> Result<(), SerializationError> {
        match mode {
            SerializationMode::Definition => self.read_definition(verb, payload),
            SerializationMode::Runtime => read_runtime(verb, payload),
        }
    }

    /// Builds a fresh verb from a definition payload.
    pub fn decode_definition(&self, payload: &Value) -> Result<Verb<C>, SerializationError> {
        let mut verb = Verb::new(String::new());
        self.read_definition(&mut verb, payload)?;
        Ok(verb)
    }

    fn write_definition(&self, verb: &Verb<C>) -> Result<Value, SerializationError> {
        let mut actions = Vec::with_capacity(verb.len());
        for (index, instance) in verb.actions().iter().enumerate() {
            let descriptors = self
                .registry
                .properties_of(instance.kind())
                .map_err(|source| SerializationError::Action { index, source })?;

            let mut entry = Map::new();
            entry.insert(KIND_KEY.to_string(), Value::String(instance.kind().to_string()));
            for descriptor in descriptors {
                if let Some(value) = instance.action().property(descriptor.name) {
                    entry.insert(descriptor.name.to_string(), value.to_json());
                }
            }
            actions.push(Value::Object(entry));
        }

        let mut root = Map::new();
        root.insert("id".to_string(), Value::String(verb.id().to_string()));
        root.insert("actions".to_string(), Value::Array(actions));
        Ok(Value::Object(root))
    }

    fn read_definition(&self, verb: &mut Verb<C>, payload: &Value) -> Result<(), SerializationError> {
        let parsed = parse_payload::<DefinitionPayload>(SerializationMode::Definition, payload)?;

        let mut actions = Vec::with_capacity(parsed.actions.len());
        for (index, entry) in parsed.actions.iter().enumerate() {
            let kind = match entry.get(KIND_KEY) {
                None | Some(Value::Null) => {
                    debug!(verb = %parsed.id, index, "definition_entry_without_kind_skipped");
                    continue;
                }
                Some(Value::String(kind)) => kind,
                Some(other) => {
                    return Err(SerializationError::Malformed {
                        mode: SerializationMode::Definition,
                        path: format!("actions[{index}].{KIND_KEY}"),
                        message: format!("expected a string, got {other}"),
                    })
                }
            };

            let mut instance = self
                .registry
                .create(kind)
                .map_err(|source| SerializationError::Action { index, source })?;
            for (name, value) in entry.iter().filter(|(name, _)| name.as_str() != KIND_KEY) {
                self.registry
                    .descriptor_required(kind, name)
                    .map_err(|source| SerializationError::Action { index, source })?;
                let Some(raw) = property_text(index, name, value)? else {
                    continue;
                };
                self.registry
                    .set_property(&mut instance, name, &raw)
                    .map_err(|source| SerializationError::Action { index, source })?;
            }
            actions.push(instance);
        }

        debug!(verb = %parsed.id, steps = actions.len(), "verb_definition_read");
        verb.set_id(parsed.id);
        verb.replace_actions(actions);
        Ok(())
    }
}

pub(crate) fn write_runtime<C>(verb: &Verb<C>) -> Value {
    let actions = verb
        .actions()
        .iter()
        .filter_map(|instance| instance.action().as_resumable())
        .map(|state| state.capture_runtime_state())
        .collect::<Vec<_>>();

    let mut root = Map::new();
    root.insert("ip".to_string(), Value::from(verb.ip()));
    root.insert("actions".to_string(), Value::Array(actions));
    Value::Object(root)
}

pub(crate) fn read_runtime<C>(verb: &mut Verb<C>, payload: &Value) -> Result<(), SerializationError> {
    let parsed = parse_payload::<RuntimePayload>(SerializationMode::Runtime, payload)?;
    let len = verb.len();
    if parsed.ip < NOT_STARTED_IP || parsed.ip > len as i64 {
        return Err(SerializationError::IpOutOfRange { ip: parsed.ip, len });
    }
    verb.set_ip(parsed.ip);

    // Entries line up with resumable actions only; whichever side runs out first ends the walk.
    let mut entries = parsed.actions.iter();
    let mut applied = 0usize;
    for (index, instance) in verb.actions_mut().iter_mut().enumerate() {
        let Some(state) = instance.action_mut().as_resumable_mut() else {
            continue;
        };
        let Some(entry) = entries.next() else {
            break;
        };
        if let Err(source) = state.apply_runtime_state(entry) {
            return Err(SerializationError::RuntimeState {
                index,
                kind: instance.kind().to_string(),
                source,
            });
        }
        applied += 1;
    }

    debug!(verb = %verb.id(), ip = parsed.ip, applied, "verb_runtime_read");
    Ok(())
}

fn parse_payload<T: DeserializeOwned>(
    mode: SerializationMode,
    payload: &Value,
) -> Result<T, SerializationError> {
    serde_path_to_error::deserialize::<_, T>(payload).map_err(|error| SerializationError::Malformed {
        mode,
        path: error_path(error.path()),
        message: error.into_inner().to_string(),
    })
}

/// Display form of a deserialization error location; the document root is `<root>`.
pub(crate) fn error_path(path: &serde_path_to_error::Path) -> String {
    let path = path.to_string();
    if path.is_empty() || path == "." {
        "<root>".to_string()
    } else {
        path
    }
}

/// String form of a definition property value; `None` for null (treated as unset).
fn property_text(index: usize, name: &str, value: &Value) -> Result<Option<String>, SerializationError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        Value::Number(number) => Ok(Some(number.to_string())),
        Value::Bool(flag) => Ok(Some(flag.to_string())),
        Value::Array(_) | Value::Object(_) => Err(SerializationError::UnsupportedPropertyValue {
            index,
            property: name.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{registry, Pause, Trace};
    use crate::verb::VerbState;

    fn definition() -> Value {
        json!({
            "id": "use",
            "actions": [
                {"kind": "note", "comment": "greet", "text": "hello", "repeat": 2, "loud": true},
                {"kind": "pause", "seconds": 2.0},
                {"kind": "note", "text": "bye"}
            ]
        })
    }

    #[test]
    fn definition_read_builds_configured_actions() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);

        let verb = codec.decode_definition(&definition()).expect("read");

        assert_eq!(verb.id(), "use");
        let kinds = verb
            .actions()
            .iter()
            .map(|instance| instance.kind())
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec!["note", "pause", "note"]);
        assert_eq!(verb.ip(), NOT_STARTED_IP);
    }

    #[test]
    fn definition_round_trip_is_structurally_identical() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let verb = codec.decode_definition(&definition()).expect("read");

        let first = codec
            .write(&verb, SerializationMode::Definition)
            .expect("write");
        let reread = codec.decode_definition(&first).expect("reread");
        let second = codec
            .write(&reread, SerializationMode::Definition)
            .expect("rewrite");

        assert_eq!(first, second);
        assert_eq!(first, definition());
    }

    #[test]
    fn definition_write_omits_unset_properties_and_orders_inherited_first() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let mut verb = Verb::new("look");
        verb.add(
            registry
                .build("note", &[("text", "a"), ("comment", "c")])
                .expect("build"),
        );

        let written = codec
            .write(&verb, SerializationMode::Definition)
            .expect("write");

        let entry = written["actions"][0].as_object().expect("entry");
        let keys = entry.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(keys, vec!["kind", "comment", "text"]);
    }

    #[test]
    fn definition_entry_without_kind_is_skipped() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let payload = json!({
            "id": "use",
            "actions": [{"text": "orphan"}, {"kind": "note"}]
        });

        let verb = codec.decode_definition(&payload).expect("read");

        assert_eq!(verb.len(), 1);
    }

    #[test]
    fn unknown_kind_fails_load_and_adds_nothing() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let mut verb = codec.decode_definition(&definition()).expect("read");
        let payload = json!({
            "id": "use",
            "actions": [{"kind": "note"}, {"kind": "nonexistent"}]
        });

        let err = codec
            .read(&mut verb, SerializationMode::Definition, &payload)
            .expect_err("unknown kind");

        assert!(matches!(
            err.registry_error(),
            Some(RegistryError::UnknownActionKind { kind }) if kind == "nonexistent"
        ));
        assert!(matches!(err, SerializationError::Action { index: 1, .. }));
        assert_eq!(verb.len(), 3);
    }

    #[test]
    fn unknown_property_and_bad_value_fail_load() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);

        let unknown = json!({"id": "v", "actions": [{"kind": "note", "volume": 3}]});
        let err = codec.decode_definition(&unknown).expect_err("unknown");
        assert!(matches!(
            err.registry_error(),
            Some(RegistryError::UnknownProperty { .. })
        ));

        let invalid = json!({"id": "v", "actions": [{"kind": "note", "repeat": "many"}]});
        let err = codec.decode_definition(&invalid).expect_err("invalid");
        assert!(matches!(
            err.registry_error(),
            Some(RegistryError::InvalidPropertyValue { .. })
        ));
    }

    #[test]
    fn null_property_is_treated_as_unset() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let payload = json!({"id": "v", "actions": [{"kind": "note", "text": null}]});

        let verb = codec.decode_definition(&payload).expect("read");

        assert_eq!(verb.actions()[0].action().property("text"), None);
    }

    #[test]
    fn null_value_on_undeclared_property_still_fails_load() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let payload = json!({"id": "v", "actions": [{"kind": "note", "bogus": null}]});

        let err = codec.decode_definition(&payload).expect_err("undeclared");

        assert!(matches!(
            err.registry_error(),
            Some(RegistryError::UnknownProperty { ref property, .. }) if property == "bogus"
        ));
    }

    #[test]
    fn nested_property_value_is_rejected() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let payload = json!({"id": "v", "actions": [{"kind": "note", "text": ["a"]}]});

        let err = codec.decode_definition(&payload).expect_err("nested");

        assert!(matches!(
            err,
            SerializationError::UnsupportedPropertyValue { index: 0, .. }
        ));
    }

    #[test]
    fn malformed_definition_reports_path() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);

        let err = codec
            .decode_definition(&json!({"id": "v", "actions": [{"kind": "note"}, 5]}))
            .expect_err("malformed");
        assert!(err.to_string().contains("actions[1]"), "{err}");

        let err = codec
            .decode_definition(&json!({"actions": []}))
            .expect_err("missing id");
        assert!(err.to_string().contains("missing field `id`"), "{err}");
    }

    #[test]
    fn runtime_write_contains_only_resumable_payloads() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let mut verb = codec.decode_definition(&definition()).expect("read");
        verb.run(&mut Trace::default()).expect("run");

        let written = codec.write(&verb, SerializationMode::Runtime).expect("write");

        assert_eq!(written, json!({"ip": 1, "actions": [{"elapsed": 2.0}]}));
    }

    #[test]
    fn runtime_round_trip_restores_ip_and_progress() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let mut original = codec.decode_definition(&definition()).expect("read");
        original.run(&mut Trace::default()).expect("run");
        let saved = codec
            .write(&original, SerializationMode::Runtime)
            .expect("write");

        let mut restored = codec.decode_definition(&definition()).expect("fresh");
        codec
            .read(&mut restored, SerializationMode::Runtime, &saved)
            .expect("read runtime");

        assert_eq!(restored.ip(), 1);
        assert_eq!(restored.state(), VerbState::Suspended { ip: 1 });
        assert_eq!(Pause::elapsed_of(restored.actions()[1].action()), Some(2.0));

        let mut trace = Trace::default();
        assert_eq!(
            restored.resume(&mut trace).expect("resume"),
            VerbState::Finished
        );
        assert_eq!(trace.executed, vec!["note:bye"]);
    }

    #[test]
    fn runtime_read_ignores_surplus_entries_and_actions() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let payload = json!({
            "id": "v",
            "actions": [{"kind": "pause"}, {"kind": "note"}, {"kind": "pause"}]
        });

        let mut verb = codec.decode_definition(&payload).expect("read");
        codec
            .read(
                &mut verb,
                SerializationMode::Runtime,
                &json!({"ip": 0, "actions": [{"elapsed": 4.0}]}),
            )
            .expect("short payload");
        assert_eq!(Pause::elapsed_of(verb.actions()[0].action()), Some(4.0));
        assert_eq!(Pause::elapsed_of(verb.actions()[2].action()), Some(0.0));

        codec
            .read(
                &mut verb,
                SerializationMode::Runtime,
                &json!({"ip": 3, "actions": [{"elapsed": 1.0}, {"elapsed": 2.0}, {"elapsed": 9.0}]}),
            )
            .expect("long payload");
        assert_eq!(Pause::elapsed_of(verb.actions()[2].action()), Some(2.0));
        assert!(verb.is_finished());
    }

    #[test]
    fn runtime_read_never_constructs_actions() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let mut verb = Verb::<Trace>::new("empty");

        codec
            .read(
                &mut verb,
                SerializationMode::Runtime,
                &json!({"ip": 0, "actions": [{"elapsed": 1.0}]}),
            )
            .expect("read");

        assert!(verb.is_empty());
        assert!(verb.is_finished());
    }

    #[test]
    fn runtime_read_rejects_out_of_range_ip_without_mutation() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let mut verb = codec.decode_definition(&definition()).expect("read");

        for ip in [-2, 4] {
            let err = codec
                .read(
                    &mut verb,
                    SerializationMode::Runtime,
                    &json!({"ip": ip, "actions": []}),
                )
                .expect_err("out of range");
            assert!(matches!(err, SerializationError::IpOutOfRange { len: 3, .. }));
        }
        assert_eq!(verb.ip(), NOT_STARTED_IP);
    }

    #[test]
    fn runtime_read_reports_shape_mismatch() {
        let (registry, _) = registry();
        let codec = VerbCodec::new(&registry);
        let mut verb = codec.decode_definition(&definition()).expect("read");

        let err = codec
            .read(&mut verb, SerializationMode::Runtime, &json!({"ip": "one", "actions": []}))
            .expect_err("bad ip");
        assert!(matches!(
            err,
            SerializationError::Malformed { mode: SerializationMode::Runtime, ref path, .. } if path == "ip"
        ));

        let err = codec
            .read(
                &mut verb,
                SerializationMode::Runtime,
                &json!({"ip": 1, "actions": [{"elapsed": "soon"}]}),
            )
            .expect_err("bad state");
        assert!(matches!(
            err,
            SerializationError::RuntimeState { index: 1, ref kind, .. } if kind == "pause"
        ));
    }
}
