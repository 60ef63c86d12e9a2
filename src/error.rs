//! Crate-level error type
//!
//! Each subsystem owns its own error enum; [`HidError`] aggregates them so
//! conditions and loop actions can propagate any of them with `?`.

use crate::config::ConfigError;
use crate::controller::input_source::InputError;
use crate::wakeup::RegistryError;

/// Errors surfaced by the HID event layer
#[derive(Debug, thiserror::Error)]
pub enum HidError {
    /// Sampling or edge-query failure
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Wakeup registry or wait primitive failure
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration load or validation failure
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A user-supplied condition or loop action failed
    #[error("Action '{name}' failed: {reason}")]
    Action { name: String, reason: String },
}

impl HidError {
    pub fn action(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Action {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
