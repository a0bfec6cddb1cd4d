use serde::{Deserialize, Serialize};

use crate::types::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestinationTag {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    SameScene,
    DifferentZone,
    DifferentNonGameplayScene,
}

impl TransitionKind {
    pub fn changes_scene(self) -> bool {
        !matches!(self, TransitionKind::SameScene)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub facing_left: bool,
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRestart {
    pub scene_name: String,
    pub destination: DestinationTag,
}

/// Where the session is and how it got there.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMetadata {
    pub scene_name: String,
    pub reset_input_on_transition: bool,
    pub destination: DestinationTag,
    pub transition_kind: TransitionKind,
    pub spawn: Option<SpawnPoint>,
    pub zone_restart: ZoneRestart,
}

impl SessionMetadata {
    /// A fresh session standing in `scene_name`. Restarting the zone returns to
    /// destination `A` until a zone transition says otherwise.
    pub fn starting_in(scene_name: impl Into<String>) -> Self {
        let scene_name = scene_name.into();
        Self {
            zone_restart: ZoneRestart {
                scene_name: scene_name.clone(),
                destination: DestinationTag::A,
            },
            scene_name,
            reset_input_on_transition: true,
            destination: DestinationTag::A,
            transition_kind: TransitionKind::SameScene,
            spawn: None,
        }
    }

    pub fn record_transition(
        &mut self,
        scene_name: &str,
        reset_input_on_transition: bool,
        destination: DestinationTag,
        transition_kind: TransitionKind,
    ) {
        self.scene_name = scene_name.to_string();
        self.reset_input_on_transition = reset_input_on_transition;
        self.destination = destination;
        self.transition_kind = transition_kind;
    }
}
