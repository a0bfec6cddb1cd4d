use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistenceTag(String);

impl PersistenceTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersistenceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersistenceTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for PersistenceTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// How far a persister's snapshot travels.
///
/// `Local` snapshots are dropped when the scene that produced them is torn down,
/// `CrossScene` snapshots live for the whole process and `CrossSession` snapshots
/// are the ones a save slot is expected to carry across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PersistenceTier {
    Local,
    CrossScene,
    CrossSession,
}

impl PersistenceTier {
    pub const ALL: [PersistenceTier; 3] = [
        PersistenceTier::Local,
        PersistenceTier::CrossScene,
        PersistenceTier::CrossSession,
    ];

    pub fn survives_scene_unload(self) -> bool {
        !matches!(self, PersistenceTier::Local)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataSettings {
    pub tag: PersistenceTag,
    pub tier: PersistenceTier,
}

impl DataSettings {
    pub fn new(tag: impl Into<PersistenceTag>, tier: PersistenceTier) -> Self {
        Self {
            tag: tag.into(),
            tier,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}
