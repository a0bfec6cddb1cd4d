use persistence::{
    AnchorRegistry, FadeDirection, FadeStatus, SceneLoader, ScreenFader, TransitionHost,
    TransitionSubject, Vec3,
};
use tracing::debug;

use super::zones::ZoneCatalog;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Player {
    pub(crate) position: Vec3,
    pub(crate) facing_left: bool,
    pub(crate) has_control: bool,
    pub(crate) input_resets: u32,
    pub(crate) keys_held: usize,
}

impl TransitionSubject for Player {
    fn release_control(&mut self, reset_inputs: bool) {
        self.has_control = false;
        if reset_inputs {
            self.input_resets += 1;
        }
    }

    fn gain_control(&mut self) {
        self.has_control = true;
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn set_facing(&mut self, facing_left: bool) {
        self.facing_left = facing_left;
    }
}

/// Screen fade that completes after a fixed number of polls.
#[derive(Debug, Clone)]
pub(crate) struct TickFader {
    ticks_per_fade: u32,
    remaining: u32,
}

impl TickFader {
    pub(crate) fn new(ticks_per_fade: u32) -> Self {
        Self {
            ticks_per_fade,
            remaining: 0,
        }
    }
}

impl ScreenFader for TickFader {
    fn begin_fade(&mut self, direction: FadeDirection) {
        debug!(direction = ?direction, ticks = self.ticks_per_fade, "fade_started");
        self.remaining = self.ticks_per_fade;
    }

    fn poll_fade(&mut self) -> FadeStatus {
        if self.remaining == 0 {
            return FadeStatus::Done;
        }
        self.remaining -= 1;
        FadeStatus::Pending
    }
}

/// Everything the scene controller drives while the game runs.
#[derive(Debug)]
pub(crate) struct GameWorld {
    pub(crate) zones: ZoneCatalog,
    pub(crate) player: Player,
    pub(crate) fader: TickFader,
}

impl TransitionHost for GameWorld {
    fn loader(&mut self) -> &mut dyn SceneLoader {
        &mut self.zones
    }

    fn anchors(&self) -> &dyn AnchorRegistry {
        &self.zones
    }

    fn subject(&mut self) -> &mut dyn TransitionSubject {
        &mut self.player
    }

    fn fader(&mut self) -> &mut dyn ScreenFader {
        &mut self.fader
    }
}
