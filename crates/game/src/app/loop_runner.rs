use std::process::ExitCode;

use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::gameplay::{default_script, enter_start_zone, run_script};

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut controller,
        mut world,
    } = app;
    let slots = config.slots();

    enter_start_zone(&mut controller, &mut world);
    match run_script(
        &mut controller,
        &mut world,
        &slots,
        &config.slot_name,
        &default_script(),
    ) {
        Ok(summary) => {
            info!(
                transitions = summary.transitions,
                restored = summary.restored,
                missing_anchors = summary.missing_anchors,
                saved_to = ?summary.saved_to,
                final_zone = %summary.final_scene,
                "session_finished"
            );
            info!(
                position = ?world.player.position,
                facing_left = world.player.facing_left,
                has_control = world.player.has_control,
                input_resets = world.player.input_resets,
                keys_held = world.player.keys_held,
                "player_final_state"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "session_failed");
            ExitCode::FAILURE
        }
    }
}
