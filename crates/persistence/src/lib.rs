use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub mod codec;
pub mod document;
pub mod persister;
pub mod registry;
pub mod session;
pub mod slots;
pub mod store;
pub mod transition;
mod types;

pub use codec::{CodecError, Snapshot, SnapshotField, SnapshotReader, SnapshotWriter};
pub use document::{deserialize, serialize, DocumentError, SAVE_VERSION};
pub use persister::{persister_handle, Persistable, PersisterHandle, WeakPersister};
pub use registry::{BatchReport, PersisterRegistry, RegisterOutcome, RegistryEntry};
pub use session::{DestinationTag, SessionMetadata, SpawnPoint, TransitionKind, ZoneRestart};
pub use slots::{
    verify_file_extension, SaveFileError, SaveSlots, DEFAULT_SLOT_NAME, SAVE_FILE_EXTENSION,
};
pub use store::{SnapshotStore, StoreKey, StoredSnapshot};
pub use transition::{
    Anchor, AnchorRegistry, AnchorResolution, FadeDirection, FadeStatus, LoadStatus,
    SceneController, SceneLoader, ScreenFader, SlotActionError, TransitionConfig,
    TransitionError, TransitionHost, TransitionOutcome, TransitionPhase, TransitionPoll,
    TransitionRequest, TransitionSubject,
};
pub use types::{DataSettings, PersistenceTag, PersistenceTier, Vec3};

pub const SAVE_DIR_ENV_VAR: &str = "PERSIST_SAVE_DIR";
pub const SAVE_SLOT_ENV_VAR: &str = "PERSIST_SAVE_SLOT";
pub const SLOW_LOAD_ENV_VAR: &str = "PERSIST_SLOW_LOAD_MS";

#[derive(Debug, Clone)]
pub struct SaveConfig {
    pub save_dir: PathBuf,
    pub slot_name: String,
    pub transition: TransitionConfig,
}

impl SaveConfig {
    pub fn slots(&self) -> SaveSlots {
        SaveSlots::new(&self.save_dir)
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current working directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("failed to create save directory at {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{var} does not name a usable save slot: {name:?}")]
    InvalidSlotName { var: &'static str, name: String },
}

/// Resolves save locations from the process environment, creating the save
/// directory if needed.
pub fn resolve_save_config() -> Result<SaveConfig, StartupError> {
    let cwd = env::current_dir().map_err(StartupError::CurrentDir)?;
    resolve_save_config_with(|var| env::var(var), &cwd)
}

fn resolve_save_config_with(
    lookup: impl Fn(&'static str) -> Result<String, env::VarError>,
    cwd: &Path,
) -> Result<SaveConfig, StartupError> {
    let save_dir = match read_var(&lookup, SAVE_DIR_ENV_VAR)? {
        Some(raw) => {
            let raw = PathBuf::from(raw);
            if raw.is_absolute() {
                raw
            } else {
                cwd.join(raw)
            }
        }
        None => cwd.join("saves"),
    };
    fs::create_dir_all(&save_dir).map_err(|source| StartupError::CreateSaveDir {
        path: save_dir.clone(),
        source,
    })?;

    let slot_name =
        read_var(&lookup, SAVE_SLOT_ENV_VAR)?.unwrap_or_else(|| DEFAULT_SLOT_NAME.to_string());
    if SaveSlots::new(&save_dir).path_for(&slot_name).is_err() {
        return Err(StartupError::InvalidSlotName {
            var: SAVE_SLOT_ENV_VAR,
            name: slot_name,
        });
    }

    Ok(SaveConfig {
        save_dir: normalize_path(&save_dir),
        slot_name: slot_name.trim().to_string(),
        transition: TransitionConfig {
            slow_load_warning: resolve_slow_load_warning(&lookup),
        },
    })
}

/// Unset and blank variables read as `None`.
fn read_var(
    lookup: &impl Fn(&'static str) -> Result<String, env::VarError>,
    var: &'static str,
) -> Result<Option<String>, StartupError> {
    match lookup(var) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(StartupError::EnvVar { var, source }),
    }
}

fn resolve_slow_load_warning(
    lookup: &impl Fn(&'static str) -> Result<String, env::VarError>,
) -> Option<Duration> {
    let fallback = TransitionConfig::default().slow_load_warning;
    match lookup(SLOW_LOAD_ENV_VAR) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(0) => None,
            Ok(ms) => Some(Duration::from_millis(ms)),
            Err(_) => {
                warn!(
                    env_var = SLOW_LOAD_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-load env var value; falling back to default"
                );
                fallback
            }
        },
        Err(env::VarError::NotPresent) => fallback,
        Err(err) => {
            warn!(
                env_var = SLOW_LOAD_ENV_VAR,
                error = %err,
                "unable to read slow-load env var; falling back to default"
            );
            fallback
        }
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
