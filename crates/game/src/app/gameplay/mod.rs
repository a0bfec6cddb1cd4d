mod host;
mod persisters;
mod script;
mod zones;

use host::{Player, TickFader};
use zones::{parse_zone_layouts, LayoutResult, ZoneCatalog, ZONES_JSON};

pub(crate) use host::GameWorld;
pub(crate) use script::{default_script, enter_start_zone, run_script};

pub(crate) const FADE_TICKS: u32 = 12;

/// Builds the world for the bundled zone layouts.
pub(crate) fn build_world() -> LayoutResult<GameWorld> {
    let layouts = parse_zone_layouts(ZONES_JSON)?;
    Ok(GameWorld {
        zones: ZoneCatalog::new(layouts),
        player: Player::default(),
        fader: TickFader::new(FADE_TICKS),
    })
}

#[cfg(test)]
mod tests;
