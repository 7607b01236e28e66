use std::path::{Path, PathBuf};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use verb_engine::{verbs, FailurePolicy, InterpreterConfig};

use super::paths::{resolve_app_paths, AppPaths, StartupError};

const FAILURE_POLICY_ENV_VAR: &str = "VERBSCRIPT_FAILURE_POLICY";
const VERB_ENV_VAR: &str = "VERBSCRIPT_VERB";
const SAVE_AT_TICK_ENV_VAR: &str = "VERBSCRIPT_SAVE_AT_TICK";
const CATALOG_FILE_NAME: &str = "verbs.json";
const SAVE_FILE_NAME: &str = "demo_runtime.json";

pub(crate) struct AppWiring {
    pub(crate) catalog_path: PathBuf,
    pub(crate) demo: DemoConfig,
}

#[derive(Debug, Clone)]
pub(crate) struct DemoConfig {
    pub(crate) verb_id: String,
    pub(crate) interpreter: InterpreterConfig,
    pub(crate) save: Option<SavePlan>,
}

/// Saves runtime state at `at_tick`, reloads it into a fresh catalog and keeps going.
#[derive(Debug, Clone)]
pub(crate) struct SavePlan {
    pub(crate) at_tick: u64,
    pub(crate) path: PathBuf,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Verb Demo Startup ===");

    let paths = resolve_app_paths()?;
    let demo = DemoConfig {
        verb_id: verb_from_env(),
        interpreter: InterpreterConfig {
            failure_policy: failure_policy_from_env(),
        },
        save: save_plan_from_env(&paths),
    };
    info!(
        root = %paths.root.display(),
        verb = %demo.verb_id,
        policy = ?demo.interpreter.failure_policy,
        save_at_tick = ?demo.save.as_ref().map(|plan| plan.at_tick),
        "demo_configured"
    );

    Ok(AppWiring {
        catalog_path: paths.scripts_dir.join(CATALOG_FILE_NAME),
        demo,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn verb_from_env() -> String {
    parse_verb(std::env::var(VERB_ENV_VAR).ok().as_deref())
}

fn failure_policy_from_env() -> FailurePolicy {
    parse_failure_policy(std::env::var(FAILURE_POLICY_ENV_VAR).ok().as_deref())
}

fn save_plan_from_env(paths: &AppPaths) -> Option<SavePlan> {
    parse_save_plan(
        std::env::var(SAVE_AT_TICK_ENV_VAR).ok().as_deref(),
        &paths.saves_dir(),
    )
}

fn parse_verb(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|raw| !raw.is_empty())
        .unwrap_or(verbs::USE)
        .to_string()
}

fn parse_failure_policy(raw: Option<&str>) -> FailurePolicy {
    let Some(raw) = raw else {
        return FailurePolicy::default();
    };
    raw.parse().unwrap_or_else(|error| {
        warn!(var = FAILURE_POLICY_ENV_VAR, %error, "env_value_ignored");
        FailurePolicy::default()
    })
}

fn parse_save_plan(raw: Option<&str>, saves_dir: &Path) -> Option<SavePlan> {
    let raw = raw?;
    match raw.trim().parse::<u64>() {
        Ok(at_tick) if at_tick > 0 => Some(SavePlan {
            at_tick,
            path: saves_dir.join(SAVE_FILE_NAME),
        }),
        _ => {
            warn!(var = SAVE_AT_TICK_ENV_VAR, value = %raw, "env_value_ignored");
            None
        }
    }
}
