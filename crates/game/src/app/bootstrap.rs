use persistence::{resolve_save_config, SaveConfig, SceneController, SceneLoader, SessionMetadata};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{self, GameWorld};

pub(crate) struct AppWiring {
    pub(crate) config: SaveConfig,
    pub(crate) controller: SceneController,
    pub(crate) world: GameWorld,
}

pub(crate) fn build_app() -> Result<AppWiring, String> {
    init_tracing();
    info!("=== Persistence Host Startup ===");

    let config = resolve_save_config().map_err(|err| err.to_string())?;
    let world = gameplay::build_world()?;
    let session = SessionMetadata::starting_in(world.zones.active_scene());
    let controller = SceneController::new(session, config.transition.clone());
    info!(
        save_dir = %config.save_dir.display(),
        slot = %config.slot_name,
        slow_load_warning_ms = config
            .transition
            .slow_load_warning
            .map(|threshold| threshold.as_millis() as u64),
        start_zone = world.zones.active_scene(),
        "startup_config_resolved"
    );

    Ok(AppWiring {
        config,
        controller,
        world,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
