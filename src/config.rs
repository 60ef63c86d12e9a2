//! TOML configuration for the control loop, refresh task and bindings
//!
//! Missing fields fall back to defaults so a partial file still loads.
//! [`HidConfig::ensure_default_config`] writes a complete default file on
//! first start.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::controller::{
    Axis, Button, Gamepad, LoopSettings, RefreshSettings, DEFAULT_TRIGGER_THRESHOLD,
};

/// Longest accepted gap between control loop stats lines (one day)
pub const MAX_STATS_INTERVAL_SECS: i64 = 86_400;
use crate::event::{Condition, DebounceKind};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read or write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// How a binding turns a button level into a boolean
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BindingTrigger {
    /// True while held
    #[default]
    Level,
    /// True on the tick the button goes down
    Rising,
    /// True on the tick the button comes up
    Falling,
}

/// One gamepad port and the size of its raw signal tables
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct GamepadConfig {
    pub port: u8,
    pub button_count: usize,
    pub axis_count: usize,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            port: 0,
            button_count: Button::ALL.len(),
            axis_count: Axis::COUNT,
        }
    }
}

/// A named button binding evaluated by the event loop
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct BindingConfig {
    pub name: String,
    pub port: u8,
    pub button: Button,
    #[serde(default)]
    pub trigger: BindingTrigger,
    /// Overrides [`HidConfig::debounce_ticks`] for this binding
    #[serde(default)]
    pub debounce_ticks: Option<u32>,
}

impl BindingConfig {
    /// Build the condition for this binding on `gamepad`
    ///
    /// Debouncing is applied to the raw level before edge detection.
    pub fn condition(&self, gamepad: &Gamepad, default_debounce: u32) -> Condition {
        let ticks = self.debounce_ticks.unwrap_or(default_debounce);
        let mut cond = gamepad.button_condition(self.button);
        if ticks > 1 {
            cond = cond.debounce(ticks, DebounceKind::Both);
        }
        match self.trigger {
            BindingTrigger::Level => cond,
            BindingTrigger::Rising => cond.rising(),
            BindingTrigger::Falling => cond.falling(),
        }
    }
}

/// Top-level configuration
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HidConfig {
    /// Control loop period in milliseconds
    pub loop_period_ms: u64,
    /// I/O refresh period in milliseconds
    pub refresh_interval_ms: u64,
    /// Seconds between control loop stats log lines, 1 to one day
    pub stats_interval_secs: i64,
    /// How long consumer threads block waiting for new data
    pub wait_timeout_ms: u64,
    /// Threshold for the left trigger of the first gamepad and other
    /// trigger conditions
    pub trigger_threshold: f64,
    /// Default debounce length in ticks; 0 or 1 disables debouncing
    pub debounce_ticks: u32,
    pub gamepads: Vec<GamepadConfig>,
    pub bindings: Vec<BindingConfig>,
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            loop_period_ms: 20,
            refresh_interval_ms: 20,
            stats_interval_secs: 30,
            wait_timeout_ms: 100,
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
            debounce_ticks: 0,
            gamepads: vec![GamepadConfig::default()],
            bindings: vec![BindingConfig {
                name: "south-pressed".to_string(),
                port: 0,
                button: Button::South,
                trigger: BindingTrigger::Rising,
                debounce_ticks: None,
            }],
        }
    }
}

impl HidConfig {
    /// `<config dir>/hid-events/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hid-events").join("config.toml"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: HidConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }

    /// Write the default config to `path` unless a file already exists
    ///
    /// Returns whether a file was written.
    pub async fn ensure_default_config(path: &Path) -> Result<bool, ConfigError> {
        if tokio::fs::try_exists(path).await? {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, Self::default().to_toml_string()?).await?;
        info!("Wrote default config to {}", path.display());
        Ok(true)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_period_ms == 0 {
            return Err(ConfigError::Invalid("loop_period_ms must be > 0".into()));
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_ms must be > 0".into(),
            ));
        }
        if !(1..=MAX_STATS_INTERVAL_SECS).contains(&self.stats_interval_secs) {
            return Err(ConfigError::Invalid(format!(
                "stats_interval_secs {} outside [1, {}]",
                self.stats_interval_secs, MAX_STATS_INTERVAL_SECS
            )));
        }
        if !(-1.0..=1.0).contains(&self.trigger_threshold) {
            return Err(ConfigError::Invalid(format!(
                "trigger_threshold {} outside [-1, 1]",
                self.trigger_threshold
            )));
        }
        for pad in &self.gamepads {
            if pad.button_count == 0 && pad.axis_count == 0 {
                return Err(ConfigError::Invalid(format!(
                    "gamepad on port {} has no signals",
                    pad.port
                )));
            }
        }
        if let Some(first) = self.gamepads.first() {
            if Axis::LeftTrigger.index() >= first.axis_count {
                return Err(ConfigError::Invalid(format!(
                    "gamepad on port {} needs at least {} axes for its left trigger",
                    first.port,
                    Axis::LeftTrigger.index() + 1
                )));
            }
        }
        for binding in &self.bindings {
            let Some(pad) = self.gamepads.iter().find(|p| p.port == binding.port) else {
                return Err(ConfigError::Invalid(format!(
                    "binding '{}' refers to unconfigured port {}",
                    binding.name, binding.port
                )));
            };
            if binding.button.index() >= pad.button_count {
                return Err(ConfigError::Invalid(format!(
                    "binding '{}' uses {:?} but gamepad on port {} has {} buttons",
                    binding.name, binding.button, pad.port, pad.button_count
                )));
            }
        }
        Ok(())
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            loop_period_ms: self.loop_period_ms,
            stats_interval_secs: self.stats_interval_secs,
        }
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            refresh_interval_ms: self.refresh_interval_ms,
        }
    }
}
