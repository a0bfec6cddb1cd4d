use persistence::{
    DataSettings, DestinationTag, Persistable, PersistenceTier, SaveSlots, SceneController,
    SceneLoader, SessionMetadata, SnapshotWriter, TransitionConfig, Vec3,
};
use tempfile::TempDir;

use super::persisters::{HubDoor, WeaponPickup, HUB_DOOR_LOCKED_SPRITE};
use super::script::{ScriptStep, HUB_DOOR_TAG, STAFF_PICKUP_TAG, ZONE2_KEY_TAG};
use super::*;

fn bundled_world() -> GameWorld {
    build_world().expect("bundled zone layouts are valid")
}

fn controller_for(world: &GameWorld) -> SceneController {
    SceneController::new(
        SessionMetadata::starting_in(world.zones.active_scene()),
        TransitionConfig::default(),
    )
}

fn staff(world: &GameWorld) -> std::rc::Rc<std::cell::RefCell<WeaponPickup>> {
    world
        .zones
        .weapon_pickup(STAFF_PICKUP_TAG)
        .expect("staff pickup in zone 1")
}

#[test]
fn bundled_layouts_start_in_zone1() {
    let world = bundled_world();
    assert_eq!(world.zones.active_scene(), "Zone1");
    assert_eq!(world.zones.enumerate_persisters().len(), 2);
    assert!(world.zones.hub_door(HUB_DOOR_TAG).is_some());
}

#[test]
fn layout_errors_carry_json_path() {
    let error = parse_zone_layouts(
        r#"{ "start_zone": "Zone1", "zones": [ { "name": "Zone1", "anchors": [ { "destination": "Q", "position": { "x": 0, "y": 0, "z": 0 } } ] } ] }"#,
    )
    .expect_err("unknown destination");
    assert!(error.contains("zones[0].anchors[0].destination"), "{error}");
}

#[test]
fn layout_validation_rejects_duplicates_and_unknown_start() {
    let duplicate_tag = r#"{
        "start_zone": "Zone1",
        "zones": [ { "name": "Zone1", "objects": [
            { "kind": "hub_door", "tag": "door", "tier": "Local", "unlock_sprites": [] },
            { "kind": "hub_door", "tag": "door", "tier": "Local", "unlock_sprites": [] }
        ] } ]
    }"#;
    let error = parse_zone_layouts(duplicate_tag).expect_err("duplicate tag");
    assert!(error.contains("objects[1].tag"), "{error}");

    let unknown_start = r#"{ "start_zone": "Nowhere", "zones": [ { "name": "Zone1" } ] }"#;
    let error = parse_zone_layouts(unknown_start).expect_err("unknown start zone");
    assert!(error.contains("start_zone"), "{error}");
}

#[test]
fn weapon_pickup_snapshot_has_three_fields() {
    let mut pickup = WeaponPickup::new(
        DataSettings::new("staff", PersistenceTier::CrossScene),
        "staff_on_pedestal".to_string(),
        "pedestal_empty".to_string(),
    );
    assert!(pickup.pick_up());
    assert!(!pickup.pick_up());

    let snapshot = pickup.produce_snapshot();
    assert_eq!(snapshot.fields(), ["pedestal_empty", "False", "False"]);

    let mut fresh = WeaponPickup::new(
        DataSettings::new("staff", PersistenceTier::CrossScene),
        "staff_on_pedestal".to_string(),
        "pedestal_empty".to_string(),
    );
    fresh.consume_snapshot(&snapshot).expect("consume");
    assert_eq!(fresh, pickup);
}

#[test]
fn weapon_pickup_rejects_short_snapshot_without_changing() {
    let mut pickup = WeaponPickup::new(
        DataSettings::new("staff", PersistenceTier::CrossScene),
        "staff_on_pedestal".to_string(),
        "pedestal_empty".to_string(),
    );
    let before = pickup.clone();
    let short = SnapshotWriter::new().push(&"pedestal_empty".to_string()).finish();
    assert!(pickup.consume_snapshot(&short).is_err());
    assert_eq!(pickup, before);
}

#[test]
fn hub_door_advances_with_keys_and_round_trips() {
    let mut door = HubDoor::new(
        DataSettings::new("door", PersistenceTier::CrossSession),
        vec!["stage_1".to_string(), "open".to_string()],
    );
    door.show_keys_held(0);
    assert_eq!(door.sprite_key(), HUB_DOOR_LOCKED_SPRITE);
    door.show_keys_held(1);
    assert_eq!(door.sprite_key(), "stage_1");
    assert!(!door.is_unlocked());
    door.show_keys_held(5);
    assert!(door.is_unlocked());

    let snapshot = door.produce_snapshot();
    assert_eq!(snapshot.fields(), ["open"]);
    let mut fresh = HubDoor::new(
        DataSettings::new("door", PersistenceTier::CrossSession),
        vec!["stage_1".to_string(), "open".to_string()],
    );
    fresh.consume_snapshot(&snapshot).expect("consume");
    assert!(fresh.is_unlocked());
}

#[test]
fn taken_pickup_stays_taken_after_round_trip_to_zone2() {
    let mut world = bundled_world();
    let mut controller = controller_for(&world);
    enter_start_zone(&mut controller, &mut world);
    let temp = TempDir::new().expect("temp");
    let slots = SaveSlots::new(temp.path());

    let summary = run_script(
        &mut controller,
        &mut world,
        &slots,
        "slot1",
        &[
            ScriptStep::PickUp(STAFF_PICKUP_TAG),
            ScriptStep::Travel {
                scene: "Zone2",
                destination: DestinationTag::A,
            },
            ScriptStep::Travel {
                scene: "Zone1",
                destination: DestinationTag::B,
            },
        ],
    )
    .expect("script");

    assert_eq!(summary.transitions, 2);
    assert_eq!(summary.final_scene, "Zone1");
    let staff = staff(&world);
    assert!(!staff.borrow().interactable());
    assert!(!staff.borrow().motes_playing());
    assert_eq!(staff.borrow().sprite_key(), "pedestal_empty");
    assert_eq!(world.player.position, Vec3::new(24.0, 3.0, 0.0));
    assert!(world.player.facing_left);
    assert!(world.player.has_control);
}

#[test]
fn local_shortcut_resets_when_zone2_restarts() {
    let mut world = bundled_world();
    let mut controller = controller_for(&world);
    enter_start_zone(&mut controller, &mut world);
    let temp = TempDir::new().expect("temp");
    let slots = SaveSlots::new(temp.path());

    run_script(
        &mut controller,
        &mut world,
        &slots,
        "slot1",
        &[
            ScriptStep::Travel {
                scene: "Zone2",
                destination: DestinationTag::A,
            },
            ScriptStep::PickUp(ZONE2_KEY_TAG),
        ],
    )
    .expect("enter zone 2");
    world
        .zones
        .hub_door("zone2_shortcut")
        .expect("shortcut")
        .borrow_mut()
        .show_keys_held(1);

    run_script(
        &mut controller,
        &mut world,
        &slots,
        "slot1",
        &[ScriptStep::RestartZone],
    )
    .expect("restart");

    let shortcut = world.zones.hub_door("zone2_shortcut").expect("shortcut");
    assert_eq!(shortcut.borrow().sprite_key(), HUB_DOOR_LOCKED_SPRITE);
    let key = world.zones.weapon_pickup(ZONE2_KEY_TAG).expect("key");
    assert!(!key.borrow().interactable());
    assert_eq!(world.player.position, Vec3::new(-6.0, 1.0, 0.0));
}

#[test]
fn default_script_restores_saved_hub_state() {
    let mut world = bundled_world();
    let mut controller = controller_for(&world);
    enter_start_zone(&mut controller, &mut world);
    let temp = TempDir::new().expect("temp");
    let slots = SaveSlots::new(temp.path());

    let summary = run_script(
        &mut controller,
        &mut world,
        &slots,
        "slot1",
        &default_script(),
    )
    .expect("default script");

    assert_eq!(summary.transitions, 5);
    assert_eq!(summary.restored, 6);
    assert_eq!(summary.missing_anchors, 0);
    assert_eq!(summary.saved_to, Some(temp.path().join("slot1.json")));
    assert_eq!(summary.final_scene, "Zone1");

    let door = world.zones.hub_door(HUB_DOOR_TAG).expect("door");
    assert_eq!(door.borrow().sprite_key(), "hub_door_key_2");
    assert!(!staff(&world).borrow().interactable());
    assert_eq!(world.player.position, Vec3::new(24.0, 3.0, 0.0));
    assert_eq!(controller.session().scene_name, "Zone1");
}

#[test]
fn loading_a_missing_slot_fails_cleanly() {
    let mut world = bundled_world();
    let mut controller = controller_for(&world);
    enter_start_zone(&mut controller, &mut world);
    let temp = TempDir::new().expect("temp");
    let slots = SaveSlots::new(temp.path());

    let error = run_script(
        &mut controller,
        &mut world,
        &slots,
        "never_saved",
        &[ScriptStep::Load],
    )
    .expect_err("no slot");
    assert!(error.contains("never_saved"), "{error}");
    assert!(!controller.is_transitioning());
    assert_eq!(world.zones.active_scene(), "Zone1");
}
