mod atomic_io;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::verb::catalog::{CatalogError, VerbCatalog};
use crate::verb::codec::error_path;

use atomic_io::write_text_atomic;

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to encode save: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write save {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read save {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse save {path} at {at}: {message}")]
    Parse {
        path: PathBuf,
        at: String,
        message: String,
    },
    #[error("save {path} has version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("failed to restore verbs from {path}: {source}")]
    Restore {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },
}

#[derive(Serialize)]
struct RuntimeSaveOut<'a, H> {
    save_version: u32,
    host: &'a H,
    #[serde(flatten)]
    catalog: Value,
}

#[derive(Deserialize)]
struct RuntimeSaveIn<H> {
    save_version: u32,
    host: H,
    #[serde(flatten)]
    catalog: Value,
}

/// Writes the runtime state of every verb in `catalog`, plus a host-defined
/// section, to `path`.
pub fn write_runtime_save<C, H: Serialize>(
    path: &Path,
    catalog: &VerbCatalog<C>,
    host: &H,
) -> Result<(), SaveError> {
    let save = RuntimeSaveOut {
        save_version: SAVE_VERSION,
        host,
        catalog: catalog.write_runtime(),
    };
    let json = serde_json::to_string_pretty(&save).map_err(SaveError::Encode)?;
    write_text_atomic(path, &json).map_err(|source| SaveError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), verbs = catalog.len(), "runtime_saved");
    Ok(())
}

/// Restores runtime state onto a catalog already rebuilt from definitions and
/// returns the host section.
pub fn read_runtime_save<C, H: DeserializeOwned>(
    path: &Path,
    catalog: &mut VerbCatalog<C>,
) -> Result<H, SaveError> {
    let raw = fs::read_to_string(path).map_err(|source| SaveError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let save = parse_runtime_save::<H>(path, &raw)?;
    if save.save_version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            path: path.to_path_buf(),
            found: save.save_version,
            expected: SAVE_VERSION,
        });
    }
    catalog
        .read_runtime(&save.catalog)
        .map_err(|source| SaveError::Restore {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), verbs = catalog.len(), "runtime_loaded");
    Ok(save.host)
}

fn parse_runtime_save<H: DeserializeOwned>(
    path: &Path,
    raw: &str,
) -> Result<RuntimeSaveIn<H>, SaveError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, RuntimeSaveIn<H>>(&mut deserializer).map_err(|error| {
        SaveError::Parse {
            path: path.to_path_buf(),
            at: error_path(error.path()),
            message: error.into_inner().to_string(),
        }
    })
}
