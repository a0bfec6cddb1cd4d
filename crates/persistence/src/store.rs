use std::collections::HashMap;

use crate::codec::Snapshot;
use crate::types::{PersistenceTag, PersistenceTier};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    pub tag: PersistenceTag,
    pub tier: PersistenceTier,
}

impl StoreKey {
    pub fn new(tag: impl Into<PersistenceTag>, tier: PersistenceTier) -> Self {
        Self {
            tag: tag.into(),
            tier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub kind_name: String,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotStore {
    entries: HashMap<StoreKey, StoredSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the snapshot previously stored under the same key, if any.
    pub fn put(
        &mut self,
        key: StoreKey,
        kind_name: impl Into<String>,
        snapshot: Snapshot,
    ) -> Option<StoredSnapshot> {
        self.entries.insert(
            key,
            StoredSnapshot {
                kind_name: kind_name.into(),
                snapshot,
            },
        )
    }

    pub fn get(&self, key: &StoreKey) -> Option<&StoredSnapshot> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &StoreKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &StoreKey) -> Option<StoredSnapshot> {
        self.entries.remove(key)
    }

    pub fn clear_tier(&mut self, tier: PersistenceTier) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.tier != tier);
        before - self.entries.len()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tier of some stored entry for `tag`, checked from the shortest-lived tier up.
    pub fn saved_tier(&self, tag: &PersistenceTag) -> Option<PersistenceTier> {
        PersistenceTier::ALL
            .into_iter()
            .find(|tier| self.contains(&StoreKey::new(tag.clone(), *tier)))
    }

    pub fn count_tier(&self, tier: PersistenceTier) -> usize {
        self.entries.keys().filter(|key| key.tier == tier).count()
    }

    /// Entries ordered by tag then tier, so anything written from them is stable.
    pub fn iter(&self) -> impl Iterator<Item = (&StoreKey, &StoredSnapshot)> {
        let mut sorted = self.entries.iter().collect::<Vec<_>>();
        sorted.sort_by(|(left, _), (right, _)| left.cmp(right));
        sorted.into_iter()
    }
}
