use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

const ROOT_ENV_VAR: &str = "VERBSCRIPT_ROOT";

#[derive(Debug, Clone)]
pub(crate) struct AppPaths {
    pub(crate) root: PathBuf,
    pub(crate) scripts_dir: PathBuf,
    pub(crate) cache_dir: PathBuf,
}

impl AppPaths {
    pub(crate) fn under(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            scripts_dir: root.join("assets").join("scripts"),
            cache_dir: root.join("cache"),
        }
    }

    pub(crate) fn saves_dir(&self) -> PathBuf {
        self.cache_dir.join("saves")
    }
}

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error("cannot locate the running executable: {0}")]
    Executable(#[source] std::io::Error),
    #[error("VERBSCRIPT_ROOT={0} is not a verbscript root (needs Cargo.toml and assets/)")]
    InvalidRoot(PathBuf),
    #[error("no verbscript root above {0}; set VERBSCRIPT_ROOT")]
    RootNotFound(PathBuf),
    #[error("cannot create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match env::var_os(ROOT_ENV_VAR) {
        Some(raw) => root_from_override(Path::new(&raw))?,
        None => {
            let exe = env::current_exe().map_err(StartupError::Executable)?;
            find_root_above(&exe)?
        }
    };
    let paths = AppPaths::under(&root);
    fs::create_dir_all(&paths.cache_dir).map_err(|source| StartupError::CreateDir {
        path: paths.cache_dir.clone(),
        source,
    })?;
    Ok(paths)
}

fn root_from_override(raw: &Path) -> Result<PathBuf, StartupError> {
    let root = fs::canonicalize(raw).unwrap_or_else(|_| raw.to_path_buf());
    if is_root(&root) {
        Ok(root)
    } else {
        Err(StartupError::InvalidRoot(root))
    }
}

fn find_root_above(start: &Path) -> Result<PathBuf, StartupError> {
    start
        .ancestors()
        .skip(1)
        .find(|candidate| is_root(candidate))
        .map(Path::to_path_buf)
        .ok_or_else(|| StartupError::RootNotFound(start.to_path_buf()))
}

fn is_root(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("assets").is_dir()
}
