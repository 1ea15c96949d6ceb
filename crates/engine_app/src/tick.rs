//! Fixed-timestep frame loop.
//!
//! Each frame runs every registered system once through
//! [`World::update_systems`], which also applies the frame's deferred
//! commands.

use std::time::{Duration, Instant};

use engine_ecs::{SystemList, World};
use tracing::{debug, info, warn};

/// Frame pacing for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

/// Owns the world and its systems and steps them frame by frame.
#[derive(Debug)]
pub struct TickLoop {
    config: TickConfig,
    world: World,
    systems: SystemList,
}

impl TickLoop {
    #[must_use]
    pub fn new(config: TickConfig, world: World, systems: SystemList) -> Self {
        Self {
            config,
            world,
            systems,
        }
    }

    /// Number of frames run so far.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.world.tick()
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Runs one frame with timestep `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        debug!(
            tick_id = self.world.tick() + 1,
            dt,
            systems = self.systems.len(),
            entities = self.world.entity_count(),
            "tick start"
        );
        self.world.update_systems(&mut self.systems, dt);
    }

    /// Runs the configured number of frames, or forever, sleeping off
    /// whatever is left of each frame's budget.
    pub fn run(&mut self) {
        let tick_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick(tick_duration.as_secs_f32());

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id(),
                    elapsed_ms = saturating_millis(elapsed),
                    budget_ms = saturating_millis(tick_duration),
                    "tick exceeded time budget"
                );
            }
        }
    }
}

/// Whole milliseconds in `duration`, clamped to `u64::MAX`.
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
