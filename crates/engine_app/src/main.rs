//! # engine_app: frame driver
//!
//! Runs the renderer's ECS without a window: builds the demo scene, then
//! steps every system once per frame at a fixed rate.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `ENGINE_CONFIG` (defaults if unset).
//! 2. Populate the world and register the scene's systems.
//! 3. Enter the fixed-timestep tick loop.

mod config;
mod scene;
mod tick;

use anyhow::Result;
use engine_ecs::World;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use scene::SharedStats;
use tick::TickLoop;

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let config = AppConfig::from_env()?;
    info!(?config, "engine driver starting");

    let mut world = World::new();
    scene::populate(&mut world, config.entity_count)?;
    let stats = SharedStats::default();
    let systems = scene::systems(&mut world, stats.clone())?;
    info!(
        entities = world.entity_count(),
        systems = systems.len(),
        "scene ready"
    );

    let mut tick_loop = TickLoop::new(config.tick_config(), world, systems);
    tick_loop.run();

    let stats = stats.borrow();
    info!(
        ticks = tick_loop.tick_id(),
        entities = tick_loop.world().entity_count(),
        draws = stats.draws,
        tinted = stats.tinted,
        extent = stats.extent,
        respawned = stats.respawned,
        "engine driver shut down"
    );
    Ok(())
}
