//! Controller subsystem for edge-detected gamepad input
//!
//! Implements a two-rate pipeline:
//!
//! 1. [`refresh`] - I/O refresh task latching snapshots and waking waiters
//! 2. [`gamepad`] - Named buttons/axes with [`edge_detector`] latches
//! 3. [`control_loop`] - Fixed-rate poll → tick → periodic cycle
//!
//! # Architecture
//!
//! ```text
//! Hardware ──► RefreshHandle ──► LatchedInput ──► Gamepad::poll ──► EventLoop::tick
//!                   │            (snapshot)       (edge latches)     (conditions)
//!                   └──wakeup()──► blocked consumer threads
//! ```

pub mod control_loop;
pub mod edge_detector;
pub mod gamepad;
pub mod input_source;
pub mod refresh;

pub use control_loop::{
    run_cycle, ControlLoop, ControlLoopHandle, CycleStats, LoopSettings, PollSummary,
};
pub use edge_detector::{Edge, EdgeDetector, EdgeState};
pub use gamepad::{Axis, Button, Gamepad, GamepadTelemetry, DEFAULT_TRIGGER_THRESHOLD};
pub use input_source::{InputError, InputSnapshot, InputSource, LatchedInput, SignalKind};
pub use refresh::{DataWaiter, RefreshHandle, RefreshSettings};
