use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{EventSignal, RegistryError, WaitHandle};

/// Outstanding handles plus the closed flag, guarded together
#[derive(Debug, Default)]
struct RegistryState {
    handles: SmallVec<[WaitHandle; 4]>,
    closed: bool,
}

/// Thread-safe multiset of wait handles
///
/// Consumers `add` their handle before blocking and `remove` it afterwards;
/// the refresh thread calls [`wakeup`](Self::wakeup) once per cycle. All
/// operations take the same lock, and `wakeup` keeps it for the whole
/// iteration so it sees a consistent membership.
///
/// Duplicate handles are allowed. [`remove`](Self::remove) drops every
/// occurrence of a handle.
pub struct WakeupRegistry {
    state: Mutex<RegistryState>,
    signal: Arc<dyn EventSignal>,
}

impl WakeupRegistry {
    pub fn new(signal: Arc<dyn EventSignal>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            signal,
        }
    }

    /// Record `handle` as outstanding
    pub fn add(&self, handle: WaitHandle) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RegistryError::Closed);
        }
        state.handles.push(handle);
        debug!("Registered {} ({} outstanding)", handle, state.handles.len());
        Ok(())
    }

    /// Remove every occurrence of `handle`, returning how many were dropped
    pub fn remove(&self, handle: WaitHandle) -> Result<usize, RegistryError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RegistryError::Closed);
        }
        let before = state.handles.len();
        state.handles.retain(|h| *h != handle);
        let removed = before - state.handles.len();
        if removed > 0 {
            debug!("Removed {} x{}", handle, removed);
        }
        Ok(removed)
    }

    /// Signal every registered handle, returning how many were signaled
    ///
    /// Signal failures are logged and skipped so one stale handle cannot
    /// keep the others asleep.
    pub fn wakeup(&self) -> Result<usize, RegistryError> {
        let state = self.state.lock();
        if state.closed {
            return Err(RegistryError::Closed);
        }
        let mut signaled = 0;
        for handle in state.handles.iter() {
            match self.signal.set_event(*handle) {
                Ok(()) => signaled += 1,
                Err(e) => warn!("Failed to signal {}: {}", handle, e),
            }
        }
        Ok(signaled)
    }

    /// Mark the registry destroyed and drop all handles
    pub fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            info!(
                "Closing wakeup registry with {} outstanding handles",
                state.handles.len()
            );
            state.handles.clear();
            state.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of outstanding registrations of `handle`
    pub fn count(&self, handle: WaitHandle) -> usize {
        self.state
            .lock()
            .handles
            .iter()
            .filter(|h| **h == handle)
            .count()
    }

    pub fn contains(&self, handle: WaitHandle) -> bool {
        self.count(handle) > 0
    }
}

impl std::fmt::Debug for WakeupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WakeupRegistry")
            .field("handles", &state.handles)
            .field("closed", &state.closed)
            .finish()
    }
}
