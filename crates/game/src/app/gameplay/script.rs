use std::path::PathBuf;

use persistence::{
    AnchorRegistry, AnchorResolution, DestinationTag, SaveSlots, SceneController, SceneLoader,
    SpawnPoint, TransitionKind, TransitionOutcome, TransitionPoll, TransitionRequest,
    TransitionSubject,
};
use tracing::{info, warn};

use super::host::GameWorld;

pub(crate) const MAX_POLLS_PER_TRANSITION: u32 = 1_000;
pub(crate) const STAFF_PICKUP_TAG: &str = "staff_pickup";
pub(crate) const HUB_DOOR_TAG: &str = "hub_door_main";
pub(crate) const ZONE2_KEY_TAG: &str = "zone2_key_pickup";

pub(crate) type ScriptResult<T> = Result<T, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScriptStep {
    PickUp(&'static str),
    ShowDoor(&'static str),
    Travel {
        scene: &'static str,
        destination: DestinationTag,
    },
    RestartZone,
    Save,
    Load,
}

/// Hub to zone 2 and back, saving in the hub and reloading from zone 2.
pub(crate) fn default_script() -> Vec<ScriptStep> {
    vec![
        ScriptStep::PickUp(STAFF_PICKUP_TAG),
        ScriptStep::Travel {
            scene: "Zone2",
            destination: DestinationTag::A,
        },
        ScriptStep::PickUp(ZONE2_KEY_TAG),
        ScriptStep::RestartZone,
        ScriptStep::Travel {
            scene: "Zone1",
            destination: DestinationTag::B,
        },
        ScriptStep::ShowDoor(HUB_DOOR_TAG),
        ScriptStep::Save,
        ScriptStep::Travel {
            scene: "Zone2",
            destination: DestinationTag::A,
        },
        ScriptStep::Load,
    ]
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SessionSummary {
    pub(crate) transitions: u32,
    pub(crate) restored: usize,
    pub(crate) missing_anchors: u32,
    pub(crate) saved_to: Option<PathBuf>,
    pub(crate) final_scene: String,
}

/// Registers the start zone's objects and puts the player on anchor `A`.
pub(crate) fn enter_start_zone(controller: &mut SceneController, world: &mut GameWorld) {
    for handle in world.zones.enumerate_persisters() {
        controller.register_persister(&handle);
    }
    match world.zones.find_anchor(DestinationTag::A) {
        Some(anchor) => {
            world.player.set_position(anchor.position);
            world.player.set_facing(anchor.facing_left);
            controller.set_checkpoint(SpawnPoint {
                facing_left: anchor.facing_left,
                position: anchor.position,
            });
        }
        None => warn!(
            zone = world.zones.active_scene(),
            "start_zone_has_no_anchor_a"
        ),
    }
    world.player.gain_control();
    info!(
        zone = world.zones.active_scene(),
        persisters = controller.registry().len(),
        "start_zone_entered"
    );
}

pub(crate) fn run_script(
    controller: &mut SceneController,
    world: &mut GameWorld,
    slots: &SaveSlots,
    slot_name: &str,
    steps: &[ScriptStep],
) -> ScriptResult<SessionSummary> {
    let mut summary = SessionSummary::default();

    for step in steps {
        info!(step = ?step, zone = world.zones.active_scene(), "script_step");
        match *step {
            ScriptStep::PickUp(tag) => pick_up(world, tag),
            ScriptStep::ShowDoor(tag) => show_door(world, tag),
            ScriptStep::Travel { scene, destination } => {
                let kind = if scene == world.zones.active_scene() {
                    TransitionKind::SameScene
                } else {
                    TransitionKind::DifferentZone
                };
                controller
                    .request_transition(TransitionRequest {
                        scene_name: scene.to_string(),
                        reset_inputs: true,
                        destination,
                        kind,
                    })
                    .map_err(|error| format!("travel to {scene}: {error}"))?;
                let outcome = drive_transition(controller, world)?;
                record(&mut summary, &outcome);
            }
            ScriptStep::RestartZone => {
                controller
                    .request_restart_zone()
                    .map_err(|error| format!("restart zone: {error}"))?;
                let outcome = drive_transition(controller, world)?;
                record(&mut summary, &outcome);
            }
            ScriptStep::Save => {
                let path = controller
                    .save_to_slot(slots, slot_name)
                    .map_err(|error| format!("save slot '{slot_name}': {error}"))?;
                summary.saved_to = Some(path);
            }
            ScriptStep::Load => {
                controller
                    .load_from_slot(slots, slot_name)
                    .map_err(|error| format!("load slot '{slot_name}': {error}"))?;
                let outcome = drive_transition(controller, world)?;
                record(&mut summary, &outcome);
            }
        }
    }

    summary.final_scene = world.zones.active_scene().to_string();
    Ok(summary)
}

/// Polls the controller once per tick until the active transition finishes.
pub(crate) fn drive_transition(
    controller: &mut SceneController,
    world: &mut GameWorld,
) -> ScriptResult<TransitionOutcome> {
    for _ in 0..MAX_POLLS_PER_TRANSITION {
        match controller.poll(world) {
            TransitionPoll::Finished(outcome) => {
                info!(
                    zone = %outcome.scene_name,
                    anchor = ?outcome.anchor,
                    saved = outcome.save_report.succeeded,
                    restored = outcome.load_report.succeeded,
                    unmatched = outcome.load_report.unmatched,
                    "zone_arrived"
                );
                return Ok(outcome);
            }
            TransitionPoll::InProgress(_) => {}
            TransitionPoll::Idle => return Err("no transition in progress".to_string()),
        }
    }
    Err(format!(
        "transition did not finish within {MAX_POLLS_PER_TRANSITION} polls (phase {:?})",
        controller.phase()
    ))
}

fn record(summary: &mut SessionSummary, outcome: &TransitionOutcome) {
    summary.transitions += 1;
    summary.restored += outcome.load_report.succeeded;
    if matches!(outcome.anchor, AnchorResolution::Missing(_)) {
        summary.missing_anchors += 1;
    }
}

fn pick_up(world: &mut GameWorld, tag: &str) {
    let Some(pickup) = world.zones.weapon_pickup(tag) else {
        warn!(tag, zone = world.zones.active_scene(), "pickup_missing");
        return;
    };
    let mut pickup = pickup.borrow_mut();
    if !pickup.pick_up() {
        info!(tag, sprite = pickup.sprite_key(), "pickup_already_taken");
        return;
    }
    world.player.keys_held += 1;
    info!(
        tag,
        sprite = pickup.sprite_key(),
        motes = pickup.motes_playing(),
        interactable = pickup.interactable(),
        keys_held = world.player.keys_held,
        "pickup_taken"
    );
}

fn show_door(world: &mut GameWorld, tag: &str) {
    let Some(door) = world.zones.hub_door(tag) else {
        warn!(tag, zone = world.zones.active_scene(), "door_missing");
        return;
    };
    let mut door = door.borrow_mut();
    door.show_keys_held(world.player.keys_held);
    info!(
        tag,
        sprite = door.sprite_key(),
        unlocked = door.is_unlocked(),
        "door_updated"
    );
}
