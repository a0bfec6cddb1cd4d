use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::persister::{PersisterHandle, WeakPersister};
use crate::store::{SnapshotStore, StoreKey};
use crate::types::{PersistenceTag, PersistenceTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Inserted,
    /// The tag was held by the same object or by one that no longer exists.
    Replaced,
    /// A different, still-live object held the tag and no longer takes part in
    /// save/load.
    Shadowed,
    /// The object was mutably borrowed elsewhere, so its tag could not be read.
    Busy,
}

/// Per-entry tallies from one `save_all` or `load_all` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub unmatched: usize,
    pub stale: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.unmatched + self.stale + self.failed
    }
}

pub struct RegistryEntry {
    tier: PersistenceTier,
    kind_name: &'static str,
    handle: WeakPersister,
}

impl RegistryEntry {
    pub fn tier(&self) -> PersistenceTier {
        self.tier
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind_name
    }

    pub fn upgrade(&self) -> Option<PersisterHandle> {
        self.handle.upgrade()
    }

    pub fn is_stale(&self) -> bool {
        self.handle.strong_count() == 0
    }
}

/// Live persisters keyed by tag. Holds only weak references: the scene owns the
/// objects and may drop them without unregistering.
#[derive(Default)]
pub struct PersisterRegistry {
    entries: HashMap<PersistenceTag, RegistryEntry>,
}

impl PersisterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: &PersisterHandle) -> RegisterOutcome {
        let Ok(persister) = handle.try_borrow() else {
            warn!("persister_register_busy");
            return RegisterOutcome::Busy;
        };
        let settings = persister.data_settings().clone();
        let kind_name = persister.kind_name();
        drop(persister);

        let weak = Rc::downgrade(handle);
        let outcome = match self.entries.get(&settings.tag) {
            None => RegisterOutcome::Inserted,
            Some(existing) if existing.is_stale() || Weak::ptr_eq(&existing.handle, &weak) => {
                RegisterOutcome::Replaced
            }
            Some(existing) => {
                warn!(
                    tag = %settings.tag,
                    previous_kind = existing.kind_name,
                    kind = kind_name,
                    "persister_tag_shadowed"
                );
                RegisterOutcome::Shadowed
            }
        };

        self.entries.insert(
            settings.tag,
            RegistryEntry {
                tier: settings.tier,
                kind_name,
                handle: weak,
            },
        );
        outcome
    }

    pub fn unregister(&mut self, tag: &PersistenceTag) -> bool {
        self.entries.remove(tag).is_some()
    }

    pub fn lookup(&self, tag: &PersistenceTag) -> Option<&RegistryEntry> {
        self.entries.get(tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save_all(&self, store: &mut SnapshotStore) -> BatchReport {
        let mut report = BatchReport::default();
        for (tag, entry) in &self.entries {
            let Some(handle) = entry.upgrade() else {
                debug!(tag = %tag, kind = entry.kind_name, "persister_stale_skipped");
                report.stale += 1;
                continue;
            };
            let Ok(persister) = handle.try_borrow() else {
                warn!(tag = %tag, kind = entry.kind_name, "persister_save_busy");
                report.failed += 1;
                continue;
            };
            let snapshot = persister.produce_snapshot();
            store.put(
                StoreKey::new(tag.clone(), entry.tier),
                entry.kind_name,
                snapshot,
            );
            report.succeeded += 1;
        }
        report
    }

    pub fn load_all(&self, store: &SnapshotStore) -> BatchReport {
        let mut report = BatchReport::default();
        for (tag, entry) in &self.entries {
            let Some(handle) = entry.upgrade() else {
                debug!(tag = %tag, kind = entry.kind_name, "persister_stale_skipped");
                report.stale += 1;
                continue;
            };
            let Some(stored) = store.get(&StoreKey::new(tag.clone(), entry.tier)) else {
                report.unmatched += 1;
                continue;
            };
            if stored.kind_name != entry.kind_name {
                warn!(
                    tag = %tag,
                    stored_kind = %stored.kind_name,
                    kind = entry.kind_name,
                    "persister_kind_mismatch"
                );
                report.failed += 1;
                continue;
            }
            let Ok(mut persister) = handle.try_borrow_mut() else {
                warn!(tag = %tag, kind = entry.kind_name, "persister_load_busy");
                report.failed += 1;
                continue;
            };
            match persister.consume_snapshot(&stored.snapshot) {
                Ok(()) => report.succeeded += 1,
                Err(error) => {
                    warn!(
                        tag = %tag,
                        kind = entry.kind_name,
                        error = %error,
                        "persister_load_failed"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Drops entries whose tier does not outlive the scene.
    pub fn clear(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.tier.survives_scene_unload());
        before - self.entries.len()
    }

    pub fn prune_stale(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_stale());
        before - self.entries.len()
    }
}
