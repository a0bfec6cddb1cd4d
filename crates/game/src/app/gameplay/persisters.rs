use persistence::{
    CodecError, DataSettings, Persistable, PersistenceTag, PersistenceTier, Snapshot,
    SnapshotWriter,
};

pub(crate) const HUB_DOOR_LOCKED_SPRITE: &str = "hub_door_locked";

/// Door whose sprite advances one stage per key the player holds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HubDoor {
    settings: DataSettings,
    unlock_sprites: Vec<String>,
    sprite_key: String,
}

impl HubDoor {
    pub(crate) fn new(settings: DataSettings, unlock_sprites: Vec<String>) -> Self {
        Self {
            settings,
            unlock_sprites,
            sprite_key: HUB_DOOR_LOCKED_SPRITE.to_string(),
        }
    }

    pub(crate) fn sprite_key(&self) -> &str {
        &self.sprite_key
    }

    /// Shows the stage matching `keys_held`. Holding no keys leaves the door as it is.
    pub(crate) fn show_keys_held(&mut self, keys_held: usize) {
        let stage = keys_held.min(self.unlock_sprites.len());
        if stage == 0 {
            return;
        }
        self.sprite_key = self.unlock_sprites[stage - 1].clone();
    }

    pub(crate) fn is_unlocked(&self) -> bool {
        self.unlock_sprites
            .last()
            .is_some_and(|open| *open == self.sprite_key)
    }
}

impl Persistable for HubDoor {
    fn data_settings(&self) -> &DataSettings {
        &self.settings
    }

    fn set_data_settings(&mut self, tag: PersistenceTag, tier: PersistenceTier) {
        self.settings = DataSettings { tag, tier };
    }

    fn kind_name(&self) -> &'static str {
        "HubDoor"
    }

    fn produce_snapshot(&self) -> Snapshot {
        SnapshotWriter::new().push(&self.sprite_key).finish()
    }

    fn consume_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), CodecError> {
        let mut reader = snapshot.reader();
        let sprite_key: String = reader.read()?;
        reader.finish()?;
        self.sprite_key = sprite_key;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WeaponPickup {
    settings: DataSettings,
    sprite_key: String,
    taken_sprite_key: String,
    motes_playing: bool,
    interactable: bool,
}

impl WeaponPickup {
    pub(crate) fn new(settings: DataSettings, sprite_key: String, taken_sprite_key: String) -> Self {
        Self {
            settings,
            sprite_key,
            taken_sprite_key,
            motes_playing: true,
            interactable: true,
        }
    }

    pub(crate) fn sprite_key(&self) -> &str {
        &self.sprite_key
    }

    pub(crate) fn motes_playing(&self) -> bool {
        self.motes_playing
    }

    pub(crate) fn interactable(&self) -> bool {
        self.interactable
    }

    /// Returns false when the pickup was already taken.
    pub(crate) fn pick_up(&mut self) -> bool {
        if !self.interactable {
            return false;
        }
        self.sprite_key = self.taken_sprite_key.clone();
        self.motes_playing = false;
        self.interactable = false;
        true
    }
}

impl Persistable for WeaponPickup {
    fn data_settings(&self) -> &DataSettings {
        &self.settings
    }

    fn set_data_settings(&mut self, tag: PersistenceTag, tier: PersistenceTier) {
        self.settings = DataSettings { tag, tier };
    }

    fn kind_name(&self) -> &'static str {
        "WeaponPickup"
    }

    fn produce_snapshot(&self) -> Snapshot {
        SnapshotWriter::new()
            .push(&self.sprite_key)
            .push(&self.motes_playing)
            .push(&self.interactable)
            .finish()
    }

    // Restoring only ever switches effects off; a fresh pickup already has them on.
    fn consume_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), CodecError> {
        let mut reader = snapshot.reader();
        let sprite_key: String = reader.read()?;
        let motes_playing: bool = reader.read()?;
        let interactable: bool = reader.read()?;
        reader.finish()?;

        self.sprite_key = sprite_key;
        if !motes_playing {
            self.motes_playing = false;
        }
        if !interactable {
            self.interactable = false;
        }
        Ok(())
    }
}
