use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::action::ActionRegistry;
use crate::config::InterpreterConfig;

use super::codec::{error_path, SerializationError, SerializationMode, VerbCodec};
use super::Verb;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("malformed catalog payload at {path}: {message}")]
    Malformed { path: String, message: String },
    #[error("verb '{id}' is defined more than once")]
    DuplicateVerbId { id: String },
    #[error("runtime state references unknown verb '{id}'")]
    UnknownVerb { id: String },
    #[error("verb '{id}': {source}")]
    Verb {
        id: String,
        #[source]
        source: SerializationError,
    },
}

/// Outcome of loading a definition catalog; failures are per verb.
#[derive(Debug, Default)]
pub struct CatalogLoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<CatalogLoadFailure>,
}

impl CatalogLoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct CatalogLoadFailure {
    /// Position in the payload's `verbs` array.
    pub index: usize,
    /// The verb id when the entry carried one.
    pub id: Option<String>,
    pub error: CatalogError,
}

#[derive(Deserialize)]
struct DefinitionCatalog {
    verbs: Vec<Value>,
}

#[derive(Deserialize)]
struct RuntimeCatalog {
    verbs: Map<String, Value>,
}

/// Owning table of verbs keyed by id.
pub struct VerbCatalog<C> {
    verbs: BTreeMap<String, Verb<C>>,
    config: InterpreterConfig,
}

impl<C> Default for VerbCatalog<C> {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

impl<C> VerbCatalog<C> {
    pub fn new(config: InterpreterConfig) -> Self {
        Self {
            verbs: BTreeMap::new(),
            config,
        }
    }

    pub fn config(&self) -> InterpreterConfig {
        self.config
    }

    /// Inserts `verb`, replacing any verb with the same id.
    pub fn insert(&mut self, mut verb: Verb<C>) -> Option<Verb<C>> {
        verb.set_config(self.config);
        self.verbs.insert(verb.id().to_string(), verb)
    }

    pub fn get(&self, id: &str) -> Option<&Verb<C>> {
        self.verbs.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Verb<C>> {
        self.verbs.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Verb<C>> {
        self.verbs.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.verbs.contains_key(id)
    }

    /// Verb ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.verbs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.verbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    /// Loads `{"verbs": [<definition>, ...]}`.
    ///
    /// A verb that fails to load is reported and skipped; the rest of the
    /// catalog still loads. Only a malformed envelope fails the whole call.
    pub fn load_definitions(
        &mut self,
        payload: &Value,
        registry: &ActionRegistry<C>,
    ) -> Result<CatalogLoadReport, CatalogError> {
        let parsed = parse_catalog::<DefinitionCatalog>(payload)?;
        let codec = VerbCodec::new(registry);
        let mut report = CatalogLoadReport::default();
        let mut seen = Vec::<String>::new();

        for (index, entry) in parsed.verbs.iter().enumerate() {
            let entry_id = entry.get("id").and_then(Value::as_str).map(str::to_string);
            match codec.decode_definition(entry) {
                Ok(verb) if seen.iter().any(|id| id == verb.id()) => {
                    report.failed.push(CatalogLoadFailure {
                        index,
                        id: entry_id,
                        error: CatalogError::DuplicateVerbId {
                            id: verb.id().to_string(),
                        },
                    });
                }
                Ok(verb) => {
                    seen.push(verb.id().to_string());
                    report.loaded.push(verb.id().to_string());
                    self.insert(verb);
                }
                Err(source) => {
                    let id = entry_id.clone().unwrap_or_else(|| format!("verbs[{index}]"));
                    warn!(verb = %id, error = %source, "verb_definition_rejected");
                    report.failed.push(CatalogLoadFailure {
                        index,
                        id: entry_id,
                        error: CatalogError::Verb { id, source },
                    });
                }
            }
        }

        debug!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "verb_catalog_loaded"
        );
        Ok(report)
    }

    /// Writes every verb in definition mode, ordered by id.
    pub fn write_definitions(&self, registry: &ActionRegistry<C>) -> Result<Value, CatalogError> {
        let codec = VerbCodec::new(registry);
        let mut verbs = Vec::with_capacity(self.verbs.len());
        for (id, verb) in &self.verbs {
            let written = codec
                .write(verb, SerializationMode::Definition)
                .map_err(|source| CatalogError::Verb {
                    id: id.clone(),
                    source,
                })?;
            verbs.push(written);
        }
        let mut root = Map::new();
        root.insert("verbs".to_string(), Value::Array(verbs));
        Ok(Value::Object(root))
    }

    /// Writes `{"verbs": {id: <runtime payload>}}` for every verb.
    pub fn write_runtime(&self) -> Value {
        let verbs = self
            .verbs
            .iter()
            .map(|(id, verb)| (id.clone(), super::codec::write_runtime(verb)))
            .collect::<Map<_, _>>();
        let mut root = Map::new();
        root.insert("verbs".to_string(), Value::Object(verbs));
        Value::Object(root)
    }

    /// Applies runtime state onto verbs that already exist in the catalog.
    pub fn read_runtime(&mut self, payload: &Value) -> Result<(), CatalogError> {
        let parsed = parse_catalog::<RuntimeCatalog>(payload)?;
        if let Some(id) = parsed.verbs.keys().find(|id| !self.verbs.contains_key(*id)) {
            return Err(CatalogError::UnknownVerb { id: id.clone() });
        }
        for (id, state) in &parsed.verbs {
            if let Some(verb) = self.verbs.get_mut(id) {
                super::codec::read_runtime(verb, state).map_err(|source| CatalogError::Verb {
                    id: id.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}

fn parse_catalog<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, CatalogError> {
    serde_path_to_error::deserialize::<_, T>(payload).map_err(|error| CatalogError::Malformed {
        path: error_path(error.path()),
        message: error.into_inner().to_string(),
    })
}
