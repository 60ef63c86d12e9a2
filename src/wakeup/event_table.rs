use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{EventSignal, RegistryError, WaitHandle};

#[derive(Debug)]
struct EventEntry {
    signaled: bool,
    manual_reset: bool,
}

#[derive(Debug)]
struct TableState {
    next_id: u32,
    events: HashMap<WaitHandle, EventEntry>,
}

/// In-process wait primitive handing out [`WaitHandle`]s
///
/// Auto-reset events clear themselves when one waiter consumes the signal;
/// manual-reset events stay signaled until [`reset_event`](Self::reset_event).
/// Destroying an event wakes every waiter with [`RegistryError::UnknownHandle`].
#[derive(Debug)]
pub struct EventTable {
    state: Mutex<TableState>,
    changed: Condvar,
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                next_id: 1,
                events: HashMap::new(),
            }),
            changed: Condvar::new(),
        }
    }

    pub fn create_event(&self, manual_reset: bool, initial_state: bool) -> WaitHandle {
        let mut state = self.state.lock();
        // ids wrap; skip any still held by a live event
        let mut id = state.next_id;
        while state.events.contains_key(&WaitHandle(id)) {
            id = next_id(id);
        }
        let handle = WaitHandle(id);
        state.next_id = next_id(id);
        state.events.insert(
            handle,
            EventEntry {
                signaled: initial_state,
                manual_reset,
            },
        );
        debug!("Created {} (manual_reset: {})", handle, manual_reset);
        handle
    }

    pub fn destroy_event(&self, handle: WaitHandle) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        state
            .events
            .remove(&handle)
            .ok_or(RegistryError::UnknownHandle(handle))?;
        self.changed.notify_all();
        debug!("Destroyed {}", handle);
        Ok(())
    }

    pub fn reset_event(&self, handle: WaitHandle) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        let entry = state
            .events
            .get_mut(&handle)
            .ok_or(RegistryError::UnknownHandle(handle))?;
        entry.signaled = false;
        Ok(())
    }

    pub fn is_signaled(&self, handle: WaitHandle) -> Result<bool, RegistryError> {
        self.state
            .lock()
            .events
            .get(&handle)
            .map(|e| e.signaled)
            .ok_or(RegistryError::UnknownHandle(handle))
    }

    /// Block until `handle` is signaled or `timeout` elapses
    ///
    /// Returns `Ok(true)` when signaled and `Ok(false)` on timeout. A timeout
    /// too large to express as a deadline (e.g. `Duration::MAX`) waits
    /// without one.
    pub fn wait(&self, handle: WaitHandle, timeout: Duration) -> Result<bool, RegistryError> {
        let mut state = self.state.lock();
        if take_signal(&mut state, handle)? {
            return Ok(true);
        }
        let deadline = Instant::now().checked_add(timeout);
        loop {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        // one last look, the signal may have raced the timeout
                        return take_signal(&mut state, handle);
                    }
                }
                None => self.changed.wait(&mut state),
            }
            if take_signal(&mut state, handle)? {
                return Ok(true);
            }
        }
    }
}

fn next_id(id: u32) -> u32 {
    id.wrapping_add(1).max(1)
}

// Consumes the signal of an auto-reset event
fn take_signal(state: &mut TableState, handle: WaitHandle) -> Result<bool, RegistryError> {
    let entry = state
        .events
        .get_mut(&handle)
        .ok_or(RegistryError::UnknownHandle(handle))?;
    if !entry.signaled {
        return Ok(false);
    }
    if !entry.manual_reset {
        entry.signaled = false;
    }
    Ok(true)
}

impl EventSignal for EventTable {
    fn set_event(&self, handle: WaitHandle) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        let entry = state
            .events
            .get_mut(&handle)
            .ok_or(RegistryError::UnknownHandle(handle))?;
        entry.signaled = true;
        self.changed.notify_all();
        Ok(())
    }
}
