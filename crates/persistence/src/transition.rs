use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::persister::PersisterHandle;
use crate::registry::{BatchReport, PersisterRegistry, RegisterOutcome};
use crate::session::{DestinationTag, SessionMetadata, SpawnPoint, TransitionKind, ZoneRestart};
use crate::slots::{SaveFileError, SaveSlots};
use crate::store::{SnapshotStore, StoreKey};
use crate::types::{PersistenceTag, PersistenceTier, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    Out,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeStatus {
    Pending,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub position: Vec3,
    pub facing_left: bool,
}

pub trait SceneLoader {
    fn active_scene(&self) -> &str;
    fn unload(&mut self, scene_name: &str);
    fn begin_load(&mut self, scene_name: &str);
    fn poll_load(&mut self) -> LoadStatus;
    /// Every persister present in the scene that finished loading.
    fn enumerate_persisters(&self) -> Vec<PersisterHandle>;
}

pub trait AnchorRegistry {
    fn find_anchor(&self, destination: DestinationTag) -> Option<Anchor>;
}

pub trait TransitionSubject {
    fn release_control(&mut self, reset_inputs: bool);
    fn gain_control(&mut self);
    fn set_position(&mut self, position: Vec3);
    fn set_facing(&mut self, facing_left: bool);
}

pub trait ScreenFader {
    fn begin_fade(&mut self, direction: FadeDirection);
    fn poll_fade(&mut self) -> FadeStatus;
}

/// Everything outside the persistence core that a transition drives.
pub trait TransitionHost {
    fn loader(&mut self) -> &mut dyn SceneLoader;
    fn anchors(&self) -> &dyn AnchorRegistry;
    fn subject(&mut self) -> &mut dyn TransitionSubject;
    fn fader(&mut self) -> &mut dyn ScreenFader;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    ReleasingControl,
    FadingOut,
    Unloading,
    Loading,
    ReconcilingPersisters,
    ApplyingSpawn,
    FadingIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub scene_name: String,
    pub reset_inputs: bool,
    pub destination: DestinationTag,
    pub kind: TransitionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorResolution {
    Anchor(DestinationTag),
    SavedSpawn,
    Missing(DestinationTag),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub scene_name: String,
    pub kind: TransitionKind,
    pub save_report: BatchReport,
    pub load_report: BatchReport,
    pub anchor: AnchorResolution,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPoll {
    Idle,
    InProgress(TransitionPhase),
    Finished(TransitionOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("a transition to {scene_name} is already in progress")]
    AlreadyTransitioning { scene_name: String },
    #[error("transition target scene name is empty")]
    EmptySceneName,
}

#[derive(Debug, Error)]
pub enum SlotActionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    SaveFile(#[from] SaveFileError),
}

#[derive(Debug, Clone)]
pub struct TransitionConfig {
    /// Scene loads taking longer than this log one warning. Loads are never
    /// abandoned: once unloading has started the transition must finish.
    pub slow_load_warning: Option<Duration>,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            slow_load_warning: Some(Duration::from_secs(10)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TransitionOrigin {
    Gameplay,
    SaveFile { spawn: Option<SpawnPoint> },
}

struct ActiveTransition {
    request: TransitionRequest,
    origin: TransitionOrigin,
    phase: TransitionPhase,
    save_report: BatchReport,
    load_report: BatchReport,
    anchor: Option<AnchorResolution>,
    load_started_at: Option<Instant>,
    slow_load_warned: bool,
}

/// Owns the registry, the snapshot store and the session, and sequences scene
/// transitions over them one at a time.
pub struct SceneController {
    registry: PersisterRegistry,
    store: SnapshotStore,
    session: SessionMetadata,
    config: TransitionConfig,
    active: Option<ActiveTransition>,
}

impl SceneController {
    pub fn new(session: SessionMetadata, config: TransitionConfig) -> Self {
        Self {
            registry: PersisterRegistry::new(),
            store: SnapshotStore::new(),
            session,
            config,
            active: None,
        }
    }

    pub fn registry(&self) -> &PersisterRegistry {
        &self.registry
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn session(&self) -> &SessionMetadata {
        &self.session
    }

    pub fn is_transitioning(&self) -> bool {
        self.active.is_some()
    }

    pub fn phase(&self) -> TransitionPhase {
        self.active
            .as_ref()
            .map_or(TransitionPhase::Idle, |active| active.phase)
    }

    pub fn register_persister(&mut self, handle: &PersisterHandle) -> RegisterOutcome {
        self.registry.register(handle)
    }

    pub fn unregister_persister(&mut self, tag: &PersistenceTag) -> bool {
        self.registry.unregister(tag)
    }

    pub fn save_all(&mut self) -> BatchReport {
        self.registry.save_all(&mut self.store)
    }

    pub fn load_all(&mut self) -> BatchReport {
        self.registry.load_all(&self.store)
    }

    pub fn set_checkpoint(&mut self, spawn: SpawnPoint) {
        self.session.spawn = Some(spawn);
    }

    pub fn request_transition(&mut self, request: TransitionRequest) -> Result<(), TransitionError> {
        self.ensure_idle()?;
        if request.scene_name.is_empty() {
            return Err(TransitionError::EmptySceneName);
        }

        self.session.record_transition(
            &request.scene_name,
            request.reset_inputs,
            request.destination,
            request.kind,
        );
        let save_report = self.registry.save_all(&mut self.store);
        info!(
            scene = %request.scene_name,
            destination = ?request.destination,
            kind = ?request.kind,
            saved = save_report.succeeded,
            stale = save_report.stale,
            "transition_started"
        );
        self.active = Some(ActiveTransition::new(
            request,
            TransitionOrigin::Gameplay,
            save_report,
        ));
        Ok(())
    }

    /// Sends the player back to where the current zone was entered.
    pub fn request_restart_zone(&mut self) -> Result<(), TransitionError> {
        let ZoneRestart {
            scene_name,
            destination,
        } = self.session.zone_restart.clone();
        self.request_transition(TransitionRequest {
            scene_name,
            reset_inputs: true,
            destination,
            kind: TransitionKind::DifferentZone,
        })
    }

    /// Installs a parsed save and travels to the scene it was taken in.
    ///
    /// The current store and session are replaced only once the request is
    /// accepted; a rejected request leaves them untouched.
    pub fn request_load_document(
        &mut self,
        store: SnapshotStore,
        session: SessionMetadata,
    ) -> Result<(), TransitionError> {
        self.ensure_idle()?;
        if session.scene_name.is_empty() {
            return Err(TransitionError::EmptySceneName);
        }

        let request = TransitionRequest {
            scene_name: session.scene_name.clone(),
            reset_inputs: session.reset_input_on_transition,
            destination: session.destination,
            kind: TransitionKind::DifferentZone,
        };
        let spawn = session.spawn;
        self.store = store;
        self.session = session;
        info!(
            scene = %request.scene_name,
            persister_count = self.store.len(),
            has_spawn = spawn.is_some(),
            "transition_from_save_started"
        );
        self.active = Some(ActiveTransition::new(
            request,
            TransitionOrigin::SaveFile { spawn },
            BatchReport::default(),
        ));
        Ok(())
    }

    /// Flushes live persisters and writes the store and session to a slot.
    pub fn save_to_slot(
        &mut self,
        slots: &SaveSlots,
        slot_name: &str,
    ) -> Result<PathBuf, SlotActionError> {
        self.ensure_idle()?;
        let report = self.save_all();
        debug!(saved = report.succeeded, stale = report.stale, "save_slot_flush");
        Ok(slots.write(slot_name, &self.store, &self.session)?)
    }

    pub fn load_from_slot(
        &mut self,
        slots: &SaveSlots,
        slot_name: &str,
    ) -> Result<(), SlotActionError> {
        self.ensure_idle()?;
        let (store, session) = slots.read(slot_name)?;
        Ok(self.request_load_document(store, session)?)
    }

    /// Advances the active transition until it has to wait on the host or ends.
    pub fn poll<H: TransitionHost + ?Sized>(&mut self, host: &mut H) -> TransitionPoll {
        loop {
            let Some(active) = self.active.as_mut() else {
                return TransitionPoll::Idle;
            };

            match active.phase {
                TransitionPhase::Idle | TransitionPhase::ReleasingControl => {
                    if active.request.kind == TransitionKind::SameScene {
                        let current = host.loader().active_scene();
                        if active.request.scene_name != current {
                            warn!(
                                requested = %active.request.scene_name,
                                active = current,
                                "transition_same_scene_renamed"
                            );
                            active.request.scene_name = current.to_string();
                            self.session.scene_name = current.to_string();
                        }
                    }
                    host.subject().release_control(active.request.reset_inputs);
                    host.fader().begin_fade(FadeDirection::Out);
                    active.enter(TransitionPhase::FadingOut);
                }
                TransitionPhase::FadingOut => {
                    if host.fader().poll_fade() == FadeStatus::Pending {
                        return TransitionPoll::InProgress(TransitionPhase::FadingOut);
                    }
                    if active.request.kind.changes_scene() {
                        active.enter(TransitionPhase::Unloading);
                    } else {
                        active.enter(TransitionPhase::ApplyingSpawn);
                    }
                }
                TransitionPhase::Unloading => {
                    let dropped = self.registry.clear();
                    if active.origin == TransitionOrigin::Gameplay {
                        for tier in PersistenceTier::ALL {
                            if !tier.survives_scene_unload() {
                                self.store.clear_tier(tier);
                            }
                        }
                    }
                    let loader = host.loader();
                    let current = loader.active_scene().to_string();
                    loader.unload(&current);
                    loader.begin_load(&active.request.scene_name);
                    debug!(
                        unloaded = %current,
                        loading = %active.request.scene_name,
                        dropped_local_persisters = dropped,
                        "transition_scene_swap"
                    );
                    active.load_started_at = Some(Instant::now());
                    active.enter(TransitionPhase::Loading);
                }
                TransitionPhase::Loading => {
                    if host.loader().poll_load() == LoadStatus::Pending {
                        active.warn_if_slow(self.config.slow_load_warning);
                        return TransitionPoll::InProgress(TransitionPhase::Loading);
                    }
                    active.enter(TransitionPhase::ReconcilingPersisters);
                }
                TransitionPhase::ReconcilingPersisters => {
                    let from_save = matches!(active.origin, TransitionOrigin::SaveFile { .. });
                    for handle in host.loader().enumerate_persisters() {
                        if from_save {
                            adopt_saved_tier(&handle, &self.store);
                        }
                        self.registry.register(&handle);
                    }
                    let pruned = self.registry.prune_stale();
                    active.load_report = self.registry.load_all(&self.store);
                    debug!(
                        restored = active.load_report.succeeded,
                        unmatched = active.load_report.unmatched,
                        failed = active.load_report.failed,
                        pruned_stale = pruned,
                        "transition_persisters_reconciled"
                    );
                    active.enter(TransitionPhase::ApplyingSpawn);
                }
                TransitionPhase::ApplyingSpawn => {
                    let resolution = apply_spawn(active, &mut self.session, host);
                    active.anchor = Some(resolution);
                    host.fader().begin_fade(FadeDirection::In);
                    active.enter(TransitionPhase::FadingIn);
                }
                TransitionPhase::FadingIn => {
                    if host.fader().poll_fade() == FadeStatus::Pending {
                        return TransitionPoll::InProgress(TransitionPhase::FadingIn);
                    }
                    host.subject().gain_control();
                    let Some(finished) = self.active.take() else {
                        return TransitionPoll::Idle;
                    };
                    let outcome = finished.into_outcome();
                    info!(
                        scene = %outcome.scene_name,
                        anchor = ?outcome.anchor,
                        restored = outcome.load_report.succeeded,
                        "transition_finished"
                    );
                    return TransitionPoll::Finished(outcome);
                }
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), TransitionError> {
        match &self.active {
            Some(active) => {
                warn!(
                    scene = %active.request.scene_name,
                    phase = ?active.phase,
                    "transition_request_rejected"
                );
                Err(TransitionError::AlreadyTransitioning {
                    scene_name: active.request.scene_name.clone(),
                })
            }
            None => Ok(()),
        }
    }
}

/// Moves an object onto the tier its tag was saved under when the save has no
/// entry for its authored tier.
fn adopt_saved_tier(handle: &PersisterHandle, store: &SnapshotStore) {
    let Ok(mut persister) = handle.try_borrow_mut() else {
        return;
    };
    let settings = persister.data_settings().clone();
    if store.contains(&StoreKey::new(settings.tag.clone(), settings.tier)) {
        return;
    }
    let Some(saved) = store.saved_tier(&settings.tag) else {
        return;
    };
    debug!(
        tag = %settings.tag,
        authored = ?settings.tier,
        saved = ?saved,
        "persister_tier_adopted"
    );
    persister.set_data_settings(settings.tag, saved);
}

fn apply_spawn<H: TransitionHost + ?Sized>(
    active: &ActiveTransition,
    session: &mut SessionMetadata,
    host: &mut H,
) -> AnchorResolution {
    if let TransitionOrigin::SaveFile { spawn: Some(spawn) } = active.origin {
        let subject = host.subject();
        subject.set_position(spawn.position);
        subject.set_facing(spawn.facing_left);
        return AnchorResolution::SavedSpawn;
    }

    let destination = active.request.destination;
    let Some(anchor) = host.anchors().find_anchor(destination) else {
        warn!(
            scene = %active.request.scene_name,
            destination = ?destination,
            "transition_anchor_missing"
        );
        return AnchorResolution::Missing(destination);
    };

    let spawn = SpawnPoint {
        facing_left: anchor.facing_left,
        position: anchor.position,
    };
    session.spawn = Some(spawn);
    if active.request.kind == TransitionKind::DifferentZone {
        session.zone_restart = ZoneRestart {
            scene_name: active.request.scene_name.clone(),
            destination,
        };
    }
    let subject = host.subject();
    subject.set_position(spawn.position);
    subject.set_facing(spawn.facing_left);
    AnchorResolution::Anchor(destination)
}

impl ActiveTransition {
    fn new(request: TransitionRequest, origin: TransitionOrigin, save_report: BatchReport) -> Self {
        Self {
            request,
            origin,
            phase: TransitionPhase::ReleasingControl,
            save_report,
            load_report: BatchReport::default(),
            anchor: None,
            load_started_at: None,
            slow_load_warned: false,
        }
    }

    fn enter(&mut self, phase: TransitionPhase) {
        debug!(from = ?self.phase, to = ?phase, "transition_phase");
        self.phase = phase;
    }

    fn warn_if_slow(&mut self, threshold: Option<Duration>) {
        let (Some(threshold), Some(started_at)) = (threshold, self.load_started_at) else {
            return;
        };
        let elapsed = started_at.elapsed();
        if !self.slow_load_warned && elapsed >= threshold {
            self.slow_load_warned = true;
            warn!(
                scene = %self.request.scene_name,
                elapsed_ms = elapsed.as_millis() as u64,
                "transition_load_slow"
            );
        }
    }

    fn into_outcome(self) -> TransitionOutcome {
        TransitionOutcome {
            anchor: self
                .anchor
                .unwrap_or(AnchorResolution::Missing(self.request.destination)),
            scene_name: self.request.scene_name,
            kind: self.request.kind,
            save_report: self.save_report,
            load_report: self.load_report,
        }
    }
}
