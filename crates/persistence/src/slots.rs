use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::document::{self, DocumentError};
use crate::session::SessionMetadata;
use crate::store::SnapshotStore;

pub const SAVE_FILE_EXTENSION: &str = ".json";
pub const DEFAULT_SLOT_NAME: &str = "savedata";

#[derive(Debug, Error)]
pub enum SaveFileError {
    #[error("invalid save slot name {name:?}")]
    InvalidSlotName { name: String },
    #[error("save slot not found at {path}")]
    NotFound { path: PathBuf },
    #[error("failed to read save slot at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write save slot at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to list save slots in {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("save slot at {path} is unusable: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
}

/// Normalises `file_name` so it ends in `extension`.
///
/// A name without an extension gets one appended, a matching extension (compared
/// case-insensitively) is kept as written and any other extension is replaced.
/// Blank names and blank extensions pass through untouched.
pub fn verify_file_extension(file_name: &str, extension: &str) -> String {
    if file_name.is_empty() {
        return String::new();
    }
    let file_name = file_name.strip_suffix('.').unwrap_or(file_name);
    if extension.is_empty() {
        return file_name.to_string();
    }

    let extension = extension.to_lowercase();
    let extension = if extension.starts_with('.') {
        extension
    } else {
        format!(".{extension}")
    };

    match file_name.rfind('.') {
        None => format!("{file_name}{extension}"),
        Some(dot) if file_name[dot..].to_lowercase() == extension => file_name.to_string(),
        Some(dot) => format!("{}{extension}", &file_name[..dot]),
    }
}

/// One directory of save documents, one file per named slot.
#[derive(Debug, Clone)]
pub struct SaveSlots {
    directory: PathBuf,
}

impl SaveSlots {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn path_for(&self, slot_name: &str) -> Result<PathBuf, SaveFileError> {
        let trimmed = slot_name.trim();
        let is_invalid = trimmed.is_empty()
            || trimmed == "."
            || trimmed == ".."
            || trimmed.contains(['/', '\\']);
        if is_invalid {
            return Err(SaveFileError::InvalidSlotName {
                name: slot_name.to_string(),
            });
        }
        Ok(self
            .directory
            .join(verify_file_extension(trimmed, SAVE_FILE_EXTENSION)))
    }

    pub fn exists(&self, slot_name: &str) -> bool {
        self.path_for(slot_name)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    pub fn write(
        &self,
        slot_name: &str,
        store: &SnapshotStore,
        session: &SessionMetadata,
    ) -> Result<PathBuf, SaveFileError> {
        let path = self.path_for(slot_name)?;
        let text = document::serialize(store, session).map_err(|source| {
            SaveFileError::Document {
                path: path.clone(),
                source,
            }
        })?;
        write_text_replacing(&path, &text).map_err(|source| SaveFileError::Write {
            path: path.clone(),
            source,
        })?;
        info!(
            path = %path.display(),
            persister_count = store.len(),
            scene = %session.scene_name,
            "save_slot_written"
        );
        Ok(path)
    }

    /// Reads and validates a slot. Nothing is applied here, so a failure leaves
    /// the caller's state exactly as it was.
    pub fn read(&self, slot_name: &str) -> Result<(SnapshotStore, SessionMetadata), SaveFileError> {
        let path = self.path_for(slot_name)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(SaveFileError::NotFound { path });
            }
            Err(source) => return Err(SaveFileError::Read { path, source }),
        };
        let (store, session) =
            document::deserialize(&raw).map_err(|source| SaveFileError::Document {
                path: path.clone(),
                source,
            })?;
        info!(
            path = %path.display(),
            persister_count = store.len(),
            scene = %session.scene_name,
            "save_slot_read"
        );
        Ok((store, session))
    }

    pub fn delete(&self, slot_name: &str) -> Result<bool, SaveFileError> {
        let path = self.path_for(slot_name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SaveFileError::Write { path, source }),
        }
    }

    /// Slot names (file stems) present in the directory, sorted.
    pub fn list(&self) -> Result<Vec<String>, SaveFileError> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SaveFileError::List {
                    path: self.directory.clone(),
                    source,
                })
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SaveFileError::List {
                path: self.directory.clone(),
                source,
            })?;
            let path = entry.path();
            let is_save = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| format!(".{}", ext.to_lowercase()) == SAVE_FILE_EXTENSION);
            if !is_save || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Writes through a sibling `.tmp` file and renames it over the target so a
/// crash mid-write never leaves a half-written slot behind.
fn write_text_replacing(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = sibling_tmp_path(path);
    fs::write(&tmp_path, text.as_bytes())?;

    if let Err(error) = fs::rename(&tmp_path, path) {
        // Some platforms refuse to rename over an existing file.
        if path.exists() {
            if let Err(remove_error) = fs::remove_file(path) {
                let _ = fs::remove_file(&tmp_path);
                return Err(remove_error);
            }
            if let Err(retry_error) = fs::rename(&tmp_path, path) {
                let _ = fs::remove_file(&tmp_path);
                return Err(retry_error);
            }
            return Ok(());
        }
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "save".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::codec::Snapshot;
    use crate::store::StoreKey;
    use crate::types::PersistenceTier;

    fn sample() -> (SnapshotStore, SessionMetadata) {
        let mut store = SnapshotStore::new();
        store.put(
            StoreKey::new("chest7", PersistenceTier::CrossSession),
            "Chest",
            Snapshot::from_iter(["True"]),
        );
        (store, SessionMetadata::starting_in("Zone1"))
    }

    #[test]
    fn extension_is_appended_kept_or_replaced() {
        assert_eq!(
            verify_file_extension("Project1 SaveData", ".json"),
            "Project1 SaveData.json"
        );
        assert_eq!(verify_file_extension("slot.JSON", "json"), "slot.JSON");
        assert_eq!(verify_file_extension("slot.txt", ".json"), "slot.json");
        assert_eq!(verify_file_extension("slot.", ".json"), "slot.json");
        assert_eq!(verify_file_extension("", ".json"), "");
        assert_eq!(verify_file_extension("slot.txt", ""), "slot.txt");
    }

    #[test]
    fn write_then_read_returns_same_state() {
        let temp = TempDir::new().expect("temp");
        let slots = SaveSlots::new(temp.path().join("saves"));
        let (store, session) = sample();

        let path = slots.write("slot1", &store, &session).expect("write");
        assert_eq!(path, temp.path().join("saves").join("slot1.json"));
        assert!(slots.exists("slot1"));
        assert!(!path.with_file_name("slot1.json.tmp").exists());

        let (read_store, read_session) = slots.read("slot1.json").expect("read");
        assert_eq!(read_store, store);
        assert_eq!(read_session, session);
    }

    #[test]
    fn overwrite_replaces_previous_slot() {
        let temp = TempDir::new().expect("temp");
        let slots = SaveSlots::new(temp.path());
        let (mut store, session) = sample();
        slots.write("slot1", &store, &session).expect("first write");

        store.reset();
        slots.write("slot1", &store, &session).expect("second write");
        let (read_store, _) = slots.read("slot1").expect("read");
        assert!(read_store.is_empty());
    }

    #[test]
    fn missing_slot_is_not_found() {
        let temp = TempDir::new().expect("temp");
        let slots = SaveSlots::new(temp.path());
        let error = slots.read("nothing").expect_err("missing");
        assert!(matches!(error, SaveFileError::NotFound { .. }));
    }

    #[test]
    fn corrupt_slot_reports_document_error() {
        let temp = TempDir::new().expect("temp");
        let slots = SaveSlots::new(temp.path());
        fs::write(temp.path().join("slot1.json"), "{\"save_version\": 1").expect("corrupt");

        let error = slots.read("slot1").expect_err("corrupt");
        assert!(matches!(
            error,
            SaveFileError::Document {
                source: DocumentError::Malformed { .. },
                ..
            }
        ));
    }

    #[test]
    fn slot_names_cannot_escape_directory() {
        let slots = SaveSlots::new("saves");
        for name in ["", "  ", "..", "../evil", "a/b", "a\\b"] {
            assert!(
                matches!(
                    slots.path_for(name),
                    Err(SaveFileError::InvalidSlotName { .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn list_and_delete_slots() {
        let temp = TempDir::new().expect("temp");
        let slots = SaveSlots::new(temp.path());
        assert!(slots.list().expect("empty list").is_empty());

        let (store, session) = sample();
        slots.write("b", &store, &session).expect("write b");
        slots.write("a", &store, &session).expect("write a");
        fs::write(temp.path().join("notes.txt"), "ignored").expect("notes");

        assert_eq!(slots.list().expect("list"), vec!["a", "b"]);
        assert!(slots.delete("a").expect("delete"));
        assert!(!slots.delete("a").expect("delete again"));
        assert_eq!(slots.list().expect("list"), vec!["b"]);
    }
}
