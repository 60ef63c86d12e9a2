//! Edge-detected HID input and wakeup notification for robot control loops
//!
//! - [`wakeup`] - registry of wait handles signaled once per I/O refresh
//! - [`controller`] - gamepads, edge latches, refresh task and control loop
//! - [`event`] - per-tick event loop and composable conditions
//! - [`config`] - TOML configuration

pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod wakeup;

pub use error::HidError;
