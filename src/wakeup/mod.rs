//! Wakeup subsystem for threads blocked on new hardware data
//!
//! Two pieces:
//!
//! 1. [`registry`] - [`WakeupRegistry`], the lock-guarded multiset of wait
//!    handles that the I/O-refresh thread signals once per cycle
//! 2. [`event_table`] - [`EventTable`], an in-process wait primitive that
//!    hands out [`WaitHandle`]s and lets threads block on them
//!
//! ```text
//! Refresh thread ──wakeup()──► WakeupRegistry ──set_event()──► EventTable
//!                                                                 │
//!                          consumer threads ◄──wait()─────────────┘
//! ```

pub mod event_table;
pub mod registry;

pub use event_table::EventTable;
pub use registry::WakeupRegistry;

use std::fmt;

/// Opaque handle naming a platform blocking primitive
///
/// The registry never creates or destroys the primitive behind a handle,
/// it only stores and signals it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaitHandle(pub u32);

impl fmt::Display for WaitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

/// Platform signal primitive driven by [`WakeupRegistry::wakeup`]
///
/// Implementations must not block indefinitely.
pub trait EventSignal: Send + Sync {
    fn set_event(&self, handle: WaitHandle) -> Result<(), RegistryError>;
}

/// Registry and wait primitive errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry was closed; no mutation happened
    #[error("Invalid state: wakeup registry is closed")]
    Closed,

    /// The wait primitive does not know this handle
    #[error("Unknown wait handle: {0}")]
    UnknownHandle(WaitHandle),
}
