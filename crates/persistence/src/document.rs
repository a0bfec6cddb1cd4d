use std::collections::HashMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::codec::Snapshot;
use crate::session::{DestinationTag, SessionMetadata, SpawnPoint, TransitionKind, ZoneRestart};
use crate::store::{SnapshotStore, StoreKey};
use crate::types::{PersistenceTag, PersistenceTier};

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed save document at {path}: {message}")]
    Malformed { path: String, message: String },
    #[error("save state cannot be written ({path}): {message}")]
    Unwritable { path: String, message: String },
    #[error("failed to encode save document: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SaveDocument {
    save_version: u32,
    scene_name: String,
    reset_input_on_transition: bool,
    destination: DestinationTag,
    transition_kind: TransitionKind,
    #[serde(default)]
    spawn: Option<SpawnPoint>,
    #[serde(default)]
    zone_restart: Option<ZoneRestartRecord>,
    persisters: Vec<PersisterRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ZoneRestartRecord {
    scene_name: String,
    destination: DestinationTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PersisterRecord {
    kind_name: String,
    tag: PersistenceTag,
    tier: PersistenceTier,
    values: Vec<String>,
}

struct ValidationFailure {
    path: String,
    message: String,
}

fn validation_err(path: impl Into<String>, message: impl Into<String>) -> ValidationFailure {
    ValidationFailure {
        path: path.into(),
        message: message.into(),
    }
}

fn expected_actual(
    path: impl Into<String>,
    expected: impl Display,
    actual: impl Display,
) -> ValidationFailure {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

/// Encodes every store entry plus the session as one pretty-printed JSON document.
pub fn serialize(store: &SnapshotStore, session: &SessionMetadata) -> Result<String, DocumentError> {
    let document = SaveDocument {
        save_version: SAVE_VERSION,
        scene_name: session.scene_name.clone(),
        reset_input_on_transition: session.reset_input_on_transition,
        destination: session.destination,
        transition_kind: session.transition_kind,
        spawn: session.spawn,
        zone_restart: Some(ZoneRestartRecord {
            scene_name: session.zone_restart.scene_name.clone(),
            destination: session.zone_restart.destination,
        }),
        persisters: store
            .iter()
            .map(|(key, stored)| PersisterRecord {
                kind_name: stored.kind_name.clone(),
                tag: key.tag.clone(),
                tier: key.tier,
                values: stored.snapshot.fields().to_vec(),
            })
            .collect(),
    };

    validate_document(&document).map_err(|failure| DocumentError::Unwritable {
        path: failure.path,
        message: failure.message,
    })?;
    serde_json::to_string_pretty(&document).map_err(DocumentError::Encode)
}

/// Parses a document produced by [`serialize`]. Either the whole document is
/// accepted or nothing is returned. Records repeating a (tag, tier) pair
/// overwrite the earlier record.
pub fn deserialize(raw: &str) -> Result<(SnapshotStore, SessionMetadata), DocumentError> {
    let document = parse_document(raw)?;
    validate_document(&document).map_err(|failure| DocumentError::Malformed {
        path: failure.path,
        message: failure.message,
    })?;

    let mut store = SnapshotStore::new();
    let mut seen_at = HashMap::with_capacity(document.persisters.len());
    for (index, record) in document.persisters.into_iter().enumerate() {
        let key = StoreKey::new(record.tag, record.tier);
        if let Some(first_index) = seen_at.insert(key.clone(), index) {
            warn!(
                tag = %key.tag,
                tier = ?key.tier,
                first_index,
                index,
                "save_record_duplicate"
            );
        }
        store.put(key, record.kind_name, Snapshot::new(record.values));
    }

    let zone_restart = match document.zone_restart {
        Some(record) => ZoneRestart {
            scene_name: record.scene_name,
            destination: record.destination,
        },
        None => ZoneRestart {
            scene_name: document.scene_name.clone(),
            destination: DestinationTag::A,
        },
    };
    let session = SessionMetadata {
        scene_name: document.scene_name,
        reset_input_on_transition: document.reset_input_on_transition,
        destination: document.destination,
        transition_kind: document.transition_kind,
        spawn: document.spawn,
        zone_restart,
    };
    Ok((store, session))
}

fn parse_document(raw: &str) -> Result<SaveDocument, DocumentError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SaveDocument>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        DocumentError::Malformed {
            path,
            message: error.into_inner().to_string(),
        }
    })
}

fn validate_document(document: &SaveDocument) -> Result<(), ValidationFailure> {
    if document.save_version > SAVE_VERSION {
        return Err(expected_actual(
            "save_version",
            format!("at most {SAVE_VERSION}"),
            document.save_version,
        ));
    }
    if document.scene_name.is_empty() {
        return Err(expected_actual("scene_name", "a scene name", "empty string"));
    }
    if let Some(spawn) = &document.spawn {
        if !spawn.position.is_finite() {
            return Err(expected_actual(
                "spawn.position",
                "finite coordinates",
                format!("{:?}", spawn.position),
            ));
        }
    }
    if let Some(zone_restart) = &document.zone_restart {
        if zone_restart.scene_name.is_empty() {
            return Err(expected_actual(
                "zone_restart.scene_name",
                "a scene name",
                "empty string",
            ));
        }
    }

    for (index, record) in document.persisters.iter().enumerate() {
        if record.kind_name.is_empty() {
            return Err(expected_actual(
                format!("persisters[{index}].kind_name"),
                "a kind name",
                "empty string",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::codec::SnapshotWriter;
    use crate::types::Vec3;

    fn sample_session() -> SessionMetadata {
        let mut session = SessionMetadata::starting_in("Zone1");
        session.record_transition("Zone2", false, DestinationTag::B, TransitionKind::DifferentZone);
        session.spawn = Some(SpawnPoint {
            facing_left: true,
            position: Vec3::new(12.5, -3.0, 0.0),
        });
        session.zone_restart = ZoneRestart {
            scene_name: "Zone2".to_string(),
            destination: DestinationTag::B,
        };
        session
    }

    fn sample_store() -> SnapshotStore {
        let mut store = SnapshotStore::new();
        store.put(
            StoreKey::new("hub_door", PersistenceTier::CrossSession),
            "HubDoor",
            SnapshotWriter::new().push_raw("door_unlock_2").finish(),
        );
        store.put(
            StoreKey::new("staff_pickup", PersistenceTier::CrossScene),
            "WeaponPickup",
            SnapshotWriter::new()
                .push_raw("")
                .push(&false)
                .push(&false)
                .finish(),
        );
        store
    }

    fn sample_json() -> serde_json::Value {
        let raw = serialize(&sample_store(), &sample_session()).expect("serialize");
        serde_json::from_str(&raw).expect("json")
    }

    #[test]
    fn store_and_session_roundtrip() {
        let store = sample_store();
        let session = sample_session();
        let raw = serialize(&store, &session).expect("serialize");
        let (decoded_store, decoded_session) = deserialize(&raw).expect("deserialize");
        assert_eq!(decoded_store, store);
        assert_eq!(decoded_session, session);
    }

    #[test]
    fn empty_store_without_spawn_roundtrips() {
        let store = SnapshotStore::new();
        let session = SessionMetadata::starting_in("Hub");
        let raw = serialize(&store, &session).expect("serialize");
        let (decoded_store, decoded_session) = deserialize(&raw).expect("deserialize");
        assert!(decoded_store.is_empty());
        assert_eq!(decoded_session, session);
    }

    #[test]
    fn records_of_different_widths_stay_separate() {
        let raw = serialize(&sample_store(), &sample_session()).expect("serialize");
        let (store, _) = deserialize(&raw).expect("deserialize");

        let door = store
            .get(&StoreKey::new("hub_door", PersistenceTier::CrossSession))
            .expect("door");
        assert_eq!(door.kind_name, "HubDoor");
        assert_eq!(door.snapshot.fields(), ["door_unlock_2"]);

        let pickup = store
            .get(&StoreKey::new("staff_pickup", PersistenceTier::CrossScene))
            .expect("pickup");
        assert_eq!(pickup.kind_name, "WeaponPickup");
        assert_eq!(pickup.snapshot.fields(), ["", "False", "False"]);
    }

    #[test]
    fn document_is_self_describing() {
        let value = sample_json();
        assert_eq!(value["save_version"], json!(SAVE_VERSION));
        assert_eq!(value["scene_name"], json!("Zone2"));
        assert_eq!(value["transition_kind"], json!("DifferentZone"));
        assert_eq!(value["persisters"][0]["kind_name"], json!("HubDoor"));
        assert_eq!(value["persisters"][0]["tier"], json!("CrossSession"));
        assert_eq!(value["persisters"][1]["values"], json!(["", "False", "False"]));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut value = sample_json();
        value["written_by"] = json!("newer build");
        value["persisters"][0]["checksum"] = json!("abc");
        let raw = serde_json::to_string(&value).expect("json");

        let (store, session) = deserialize(&raw).expect("forward compatible");
        assert_eq!(store, sample_store());
        assert_eq!(session, sample_session());
    }

    #[test]
    fn missing_required_field_reports_path() {
        let mut value = sample_json();
        value
            .as_object_mut()
            .expect("document object")
            .remove("scene_name");
        let raw = serde_json::to_string(&value).expect("json");

        let error = deserialize(&raw).expect_err("missing field should fail");
        let message = error.to_string();
        assert!(message.contains("malformed save document"));
        assert!(message.contains("scene_name"));
        assert!(message.contains("missing field"));
    }

    #[test]
    fn type_mismatch_reports_nested_path() {
        let mut value = sample_json();
        value["persisters"][1]["values"] = json!([1, 2, 3]);
        let raw = serde_json::to_string(&value).expect("json");

        let error = deserialize(&raw).expect_err("type mismatch should fail");
        match error {
            DocumentError::Malformed { path, .. } => {
                assert!(path.starts_with("persisters[1].values"), "path was {path}");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let mut value = sample_json();
        value["persisters"][0]["tier"] = json!("Forever");
        let raw = serde_json::to_string(&value).expect("json");

        let error = deserialize(&raw).expect_err("unknown tier");
        assert!(error.to_string().contains("persisters[0].tier"));
        assert!(error.to_string().contains("unknown variant"));
    }

    #[test]
    fn missing_optional_fields_fall_back() {
        let mut value = sample_json();
        let object = value.as_object_mut().expect("document object");
        object.remove("spawn");
        object.remove("zone_restart");
        let raw = serde_json::to_string(&value).expect("json");

        let (_, session) = deserialize(&raw).expect("optional fields");
        assert!(session.spawn.is_none());
        assert_eq!(session.zone_restart.scene_name, "Zone2");
        assert_eq!(session.zone_restart.destination, DestinationTag::A);
    }

    #[test]
    fn repeated_record_keeps_the_last_one() {
        let mut value = sample_json();
        let mut repeat = value["persisters"][0].clone();
        repeat["values"] = json!(["door_open"]);
        value["persisters"]
            .as_array_mut()
            .expect("persisters array")
            .push(repeat);
        let raw = serde_json::to_string(&value).expect("json");

        let (store, _) = deserialize(&raw).expect("later record wins");
        assert_eq!(store.len(), 2);
        let door = store
            .get(&StoreKey::new("hub_door", PersistenceTier::CrossSession))
            .expect("door");
        assert_eq!(door.snapshot.fields(), ["door_open"]);
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut value = sample_json();
        value["save_version"] = json!(SAVE_VERSION + 1);
        let raw = serde_json::to_string(&value).expect("json");

        let error = deserialize(&raw).expect_err("future version");
        assert!(error.to_string().contains("save_version"));
    }

    #[test]
    fn garbage_text_is_malformed() {
        let error = deserialize("not json at all").expect_err("garbage");
        assert!(matches!(error, DocumentError::Malformed { .. }));
    }

    #[test]
    fn non_finite_spawn_cannot_be_written() {
        let mut session = sample_session();
        session.spawn = Some(SpawnPoint {
            facing_left: false,
            position: Vec3::new(f32::NAN, 0.0, 0.0),
        });
        let error = serialize(&SnapshotStore::new(), &session).expect_err("nan spawn");
        assert!(matches!(error, DocumentError::Unwritable { .. }));
    }
}
