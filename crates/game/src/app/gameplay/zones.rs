use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use persistence::{
    Anchor, AnchorRegistry, DataSettings, DestinationTag, LoadStatus, PersistenceTag,
    PersistenceTier, PersisterHandle, SceneLoader, Vec3,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::persisters::{HubDoor, WeaponPickup};

pub(crate) const ZONES_JSON: &str = include_str!("../../../assets/zones.json");

pub(crate) type LayoutResult<T> = Result<T, String>;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ZoneLayouts {
    pub(crate) start_zone: String,
    pub(crate) zones: Vec<ZoneLayout>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ZoneLayout {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) load_ticks: u32,
    #[serde(default)]
    pub(crate) anchors: Vec<AnchorDef>,
    #[serde(default)]
    pub(crate) objects: Vec<ObjectDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnchorDef {
    pub(crate) destination: DestinationTag,
    pub(crate) position: Vec3,
    #[serde(default)]
    pub(crate) facing_left: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum ObjectDef {
    HubDoor {
        tag: PersistenceTag,
        tier: PersistenceTier,
        unlock_sprites: Vec<String>,
    },
    WeaponPickup {
        tag: PersistenceTag,
        tier: PersistenceTier,
        sprite_key: String,
        taken_sprite_key: String,
    },
}

impl ObjectDef {
    fn tag(&self) -> &PersistenceTag {
        match self {
            ObjectDef::HubDoor { tag, .. } | ObjectDef::WeaponPickup { tag, .. } => tag,
        }
    }
}

pub(crate) fn parse_zone_layouts(raw: &str) -> LayoutResult<ZoneLayouts> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let layouts = match serde_path_to_error::deserialize::<_, ZoneLayouts>(&mut deserializer) {
        Ok(layouts) => layouts,
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                return Err(format!("parse zone layouts: {source}"));
            }
            return Err(format!("parse zone layouts at {path}: {source}"));
        }
    };
    validate_zone_layouts(&layouts)?;
    Ok(layouts)
}

fn validate_zone_layouts(layouts: &ZoneLayouts) -> LayoutResult<()> {
    let mut names = HashSet::new();
    for (zone_index, zone) in layouts.zones.iter().enumerate() {
        if zone.name.trim().is_empty() {
            return Err(format!("validation failed at zones[{zone_index}].name: empty"));
        }
        if !names.insert(zone.name.as_str()) {
            return Err(format!(
                "validation failed at zones[{zone_index}].name: duplicate zone '{}'",
                zone.name
            ));
        }

        let mut destinations = HashSet::new();
        for (anchor_index, anchor) in zone.anchors.iter().enumerate() {
            let path = format!("zones[{zone_index}].anchors[{anchor_index}]");
            if !destinations.insert(anchor.destination) {
                return Err(format!(
                    "validation failed at {path}.destination: duplicate {:?}",
                    anchor.destination
                ));
            }
            if !anchor.position.is_finite() {
                return Err(format!("validation failed at {path}.position: not finite"));
            }
        }

        let mut tags = HashSet::new();
        for (object_index, object) in zone.objects.iter().enumerate() {
            if !tags.insert(object.tag()) {
                return Err(format!(
                    "validation failed at zones[{zone_index}].objects[{object_index}].tag: duplicate '{}'",
                    object.tag()
                ));
            }
        }
    }

    if !names.contains(layouts.start_zone.as_str()) {
        return Err(format!(
            "validation failed at start_zone: unknown zone '{}'",
            layouts.start_zone
        ));
    }
    Ok(())
}

/// A live object placed by the active zone.
#[derive(Debug, Clone)]
pub(crate) enum SceneObject {
    Door(Rc<RefCell<HubDoor>>),
    Pickup(Rc<RefCell<WeaponPickup>>),
}

impl SceneObject {
    fn spawn(def: &ObjectDef) -> Self {
        match def {
            ObjectDef::HubDoor {
                tag,
                tier,
                unlock_sprites,
            } => SceneObject::Door(Rc::new(RefCell::new(HubDoor::new(
                DataSettings::new(tag.clone(), *tier),
                unlock_sprites.clone(),
            )))),
            ObjectDef::WeaponPickup {
                tag,
                tier,
                sprite_key,
                taken_sprite_key,
            } => SceneObject::Pickup(Rc::new(RefCell::new(WeaponPickup::new(
                DataSettings::new(tag.clone(), *tier),
                sprite_key.clone(),
                taken_sprite_key.clone(),
            )))),
        }
    }

    fn handle(&self) -> PersisterHandle {
        match self {
            SceneObject::Door(door) => {
                let handle: PersisterHandle = door.clone();
                handle
            }
            SceneObject::Pickup(pickup) => {
                let handle: PersisterHandle = pickup.clone();
                handle
            }
        }
    }

    fn has_tag(&self, tag: &str) -> bool {
        let handle = self.handle();
        let persister = handle.borrow();
        let matches = persister.data_settings().tag.as_str() == tag;
        matches
    }
}

#[derive(Debug)]
struct PendingLoad {
    scene_name: String,
    remaining_ticks: u32,
}

/// In-memory scene loader over the zone layouts. Loading a zone takes the
/// layout's `load_ticks` polls and instantiates fresh objects every time.
#[derive(Debug)]
pub(crate) struct ZoneCatalog {
    layouts: HashMap<String, ZoneLayout>,
    active: String,
    live: Vec<SceneObject>,
    pending: Option<PendingLoad>,
}

impl ZoneCatalog {
    pub(crate) fn new(layouts: ZoneLayouts) -> Self {
        let mut catalog = Self {
            layouts: layouts
                .zones
                .into_iter()
                .map(|zone| (zone.name.clone(), zone))
                .collect(),
            active: String::new(),
            live: Vec::new(),
            pending: None,
        };
        catalog.instantiate(&layouts.start_zone);
        catalog
    }

    pub(crate) fn hub_door(&self, tag: &str) -> Option<Rc<RefCell<HubDoor>>> {
        self.live.iter().find_map(|object| match object {
            SceneObject::Door(door) if object.has_tag(tag) => Some(door.clone()),
            _ => None,
        })
    }

    pub(crate) fn weapon_pickup(&self, tag: &str) -> Option<Rc<RefCell<WeaponPickup>>> {
        self.live.iter().find_map(|object| match object {
            SceneObject::Pickup(pickup) if object.has_tag(tag) => Some(pickup.clone()),
            _ => None,
        })
    }

    fn instantiate(&mut self, scene_name: &str) {
        self.live = match self.layouts.get(scene_name) {
            Some(layout) => layout.objects.iter().map(SceneObject::spawn).collect(),
            None => {
                warn!(zone = scene_name, "zone_unknown_loaded_empty");
                Vec::new()
            }
        };
        self.active = scene_name.to_string();
        info!(
            zone = scene_name,
            objects = self.live.len(),
            "zone_instantiated"
        );
    }
}

impl SceneLoader for ZoneCatalog {
    fn active_scene(&self) -> &str {
        &self.active
    }

    fn unload(&mut self, scene_name: &str) {
        debug!(zone = scene_name, dropped_objects = self.live.len(), "zone_unloaded");
        self.live.clear();
    }

    fn begin_load(&mut self, scene_name: &str) {
        let remaining_ticks = self
            .layouts
            .get(scene_name)
            .map_or(0, |layout| layout.load_ticks);
        self.pending = Some(PendingLoad {
            scene_name: scene_name.to_string(),
            remaining_ticks,
        });
    }

    fn poll_load(&mut self) -> LoadStatus {
        let Some(pending) = self.pending.as_mut() else {
            return LoadStatus::Ready;
        };
        if pending.remaining_ticks > 0 {
            pending.remaining_ticks -= 1;
            return LoadStatus::Pending;
        }
        if let Some(pending) = self.pending.take() {
            self.instantiate(&pending.scene_name);
        }
        LoadStatus::Ready
    }

    fn enumerate_persisters(&self) -> Vec<PersisterHandle> {
        self.live.iter().map(SceneObject::handle).collect()
    }
}

impl AnchorRegistry for ZoneCatalog {
    fn find_anchor(&self, destination: DestinationTag) -> Option<Anchor> {
        let layout = self.layouts.get(&self.active)?;
        layout
            .anchors
            .iter()
            .find(|anchor| anchor.destination == destination)
            .map(|anchor| Anchor {
                position: anchor.position,
                facing_left: anchor.facing_left,
            })
    }
}
