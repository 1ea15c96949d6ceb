//! Driver configuration.
//!
//! Loaded from the JSON file named by [`CONFIG_ENV`]; every field is
//! optional and falls back to [`AppConfig::default`].

use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::tick::TickConfig;

/// The environment variable holding the config file path.
pub const CONFIG_ENV: &str = "ENGINE_CONFIG";

/// Settings for the demo driver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Target frames per second.
    pub tick_rate: f64,
    /// Frames to run before exiting (0 = unlimited).
    pub max_ticks: u64,
    /// Entities in the demo scene.
    pub entity_count: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 600,
            entity_count: 64,
        }
    }
}

impl AppConfig {
    /// Loads the file named by `ENGINE_CONFIG`, or the defaults if unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Loads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Parses and validates a JSON config document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the tick loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.tick_rate.is_finite() && self.tick_rate > 0.0,
            "tick_rate must be a positive number, got {}",
            self.tick_rate
        );
        Ok(())
    }

    /// Tick loop settings derived from this configuration.
    #[must_use]
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            tick_rate: self.tick_rate,
            max_ticks: self.max_ticks,
        }
    }
}
