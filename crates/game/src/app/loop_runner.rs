use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use verb_engine::{
    read_runtime_save, verbs, write_runtime_save, ActionRegistry, CatalogError, InterpreterConfig,
    RegistryError, SaveError, VerbCatalog, VerbError, VerbState,
};

use super::actions::build_registry;
use super::bootstrap::{AppWiring, DemoConfig, SavePlan};
use super::world::{DemoWorld, Effect, WorldSnapshot};

const FIXED_DT_SECONDS: f64 = 0.1;
const MAX_TICKS: u64 = 600;

#[derive(Debug, Error)]
pub(crate) enum DemoError {
    #[error("failed to read verb catalog {path}: {source}")]
    ReadCatalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse verb catalog {path}: {source}")]
    ParseCatalog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to register demo action kinds: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Save(#[from] SaveError),
    #[error(transparent)]
    Verb(#[from] VerbError),
    #[error("verb '{0}' is not in the catalog")]
    UnknownVerb(String),
    #[error("verb '{verb}' is suspended at step {ip} with nothing scheduled to resume it")]
    Stalled { verb: String, ip: usize },
    #[error("verb '{verb}' did not finish within {ticks} ticks")]
    TickCapReached { verb: String, ticks: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunSummary {
    pub(crate) verb: String,
    pub(crate) ticks: u64,
    pub(crate) clock: f64,
    pub(crate) transcript: Vec<String>,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_demo(&app.catalog_path, &app.demo) {
        Ok(summary) => {
            for line in &summary.transcript {
                debug!(line = %line, "transcript");
            }
            info!(
                verb = %summary.verb,
                ticks = summary.ticks,
                clock = summary.clock,
                "demo_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "demo_failed");
            ExitCode::FAILURE
        }
    }
}

fn run_demo(catalog_path: &Path, demo: &DemoConfig) -> Result<RunSummary, DemoError> {
    let definitions = read_definitions(catalog_path)?;
    let mut session = Session::load(definitions, demo.interpreter)?;
    if demo.verb_id != verbs::INIT && session.catalog.contains(verbs::INIT) {
        session.run_verb(verbs::INIT, None)?;
    }
    session.run_verb(&demo.verb_id, demo.save.as_ref())
}

fn read_definitions(path: &Path) -> Result<Value, DemoError> {
    let raw = fs::read_to_string(path).map_err(|source| DemoError::ReadCatalog {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| DemoError::ParseCatalog {
        path: path.to_path_buf(),
        source,
    })
}

/// Registry, loaded verbs and the world they act on.
pub(crate) struct Session {
    registry: ActionRegistry<DemoWorld>,
    definitions: Value,
    config: InterpreterConfig,
    catalog: VerbCatalog<DemoWorld>,
    world: DemoWorld,
}

impl Session {
    pub(crate) fn load(definitions: Value, config: InterpreterConfig) -> Result<Self, DemoError> {
        let registry = build_registry()?;
        let catalog = load_catalog(&definitions, &registry, config)?;
        Ok(Self {
            registry,
            definitions,
            config,
            catalog,
            world: DemoWorld::default(),
        })
    }

    pub(crate) fn world(&self) -> &DemoWorld {
        &self.world
    }

    /// Runs `verb_id` and ticks the world until it finishes.
    pub(crate) fn run_verb(
        &mut self,
        verb_id: &str,
        save: Option<&SavePlan>,
    ) -> Result<RunSummary, DemoError> {
        let mut state = self
            .catalog
            .get_mut(verb_id)
            .ok_or_else(|| DemoError::UnknownVerb(verb_id.to_string()))?
            .run(&mut self.world)?;
        let mut ticks = 0u64;

        while let VerbState::Suspended { ip } = state {
            if !self.world.has_pending_timer() {
                return Err(DemoError::Stalled {
                    verb: verb_id.to_string(),
                    ip,
                });
            }
            if ticks >= MAX_TICKS {
                return Err(DemoError::TickCapReached {
                    verb: verb_id.to_string(),
                    ticks,
                });
            }
            ticks += 1;

            if let Some(plan) = save.filter(|plan| plan.at_tick == ticks) {
                self.save_and_reload(&plan.path)?;
            }
            if self.world.advance(FIXED_DT_SECONDS) {
                state = self
                    .catalog
                    .get_mut(verb_id)
                    .ok_or_else(|| DemoError::UnknownVerb(verb_id.to_string()))?
                    .resume(&mut self.world)?;
            }
        }

        Ok(RunSummary {
            verb: verb_id.to_string(),
            ticks,
            clock: self.world.clock(),
            transcript: transcript(self.world.effects()),
        })
    }

    /// Round-trips runtime state through disk into a catalog rebuilt from
    /// the authored definitions.
    fn save_and_reload(&mut self, path: &Path) -> Result<(), DemoError> {
        write_runtime_save(path, &self.catalog, &self.world.snapshot())?;

        let mut catalog = load_catalog(&self.definitions, &self.registry, self.config)?;
        let snapshot: WorldSnapshot = read_runtime_save(path, &mut catalog)?;
        self.catalog = catalog;
        self.world.restore(snapshot);
        info!(path = %path.display(), clock = self.world.clock(), "demo_reloaded");
        Ok(())
    }
}

fn load_catalog(
    definitions: &Value,
    registry: &ActionRegistry<DemoWorld>,
    config: InterpreterConfig,
) -> Result<VerbCatalog<DemoWorld>, DemoError> {
    let mut catalog = VerbCatalog::new(config);
    let report = catalog.load_definitions(definitions, registry)?;
    for failure in &report.failed {
        warn!(
            index = failure.index,
            verb = failure.id.as_deref().unwrap_or("<unnamed>"),
            error = %failure.error,
            "verb_skipped"
        );
    }
    info!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        "verb_catalog_ready"
    );
    Ok(catalog)
}

fn transcript(effects: &[Effect]) -> Vec<String> {
    effects
        .iter()
        .map(|effect| match effect {
            Effect::Sound { name, volume } => format!("sound {name} @{volume}"),
            Effect::Text { actor, text } => {
                format!("{}: {text}", actor.as_deref().unwrap_or("narrator"))
            }
            Effect::State { actor, state } => format!("{actor} -> {state}"),
        })
        .collect()
}
