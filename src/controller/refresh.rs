//! I/O refresh task and the consumer side of the wakeup registry
//!
//! The refresh task latches a fresh [`InputSnapshot`] every period and then
//! signals every thread waiting on new data. Consumers use a [`DataWaiter`]
//! to block until that happens.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::input_source::{InputSnapshot, LatchedInput};
use crate::wakeup::{EventTable, RegistryError, WaitHandle, WakeupRegistry};

/// Refresh task settings
#[derive(Clone, Debug)]
pub struct RefreshSettings {
    /// Time between snapshots in milliseconds
    pub refresh_interval_ms: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 20,
        }
    }
}

/// Handle to the spawned refresh task
pub struct RefreshHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    cycles: Arc<AtomicU64>,
}

impl RefreshHandle {
    /// Spawn the refresh task on the current tokio runtime
    ///
    /// `sample` is called once per cycle; `None` means the hardware had
    /// nothing new and the previous snapshot stays latched. Waiters are
    /// woken either way. The task stops on cancellation or once the
    /// registry is closed.
    pub fn spawn<F>(
        settings: RefreshSettings,
        input: Arc<LatchedInput>,
        registry: Arc<WakeupRegistry>,
        mut sample: F,
    ) -> Self
    where
        F: FnMut() -> Option<InputSnapshot> + Send + 'static,
    {
        info!("Spawning refresh task with settings: {:?}", settings);
        let cancel = CancellationToken::new();
        let cycles = Arc::new(AtomicU64::new(0));

        let task = {
            let cancel = cancel.clone();
            let cycles = cycles.clone();
            tokio::spawn(async move {
                let mut timer = tokio::time::interval(Duration::from_millis(
                    settings.refresh_interval_ms.max(1),
                ));
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Refresh task cancelled");
                            break;
                        }
                        _ = timer.tick() => {}
                    }

                    if let Some(snapshot) = sample() {
                        input.publish(snapshot);
                    }

                    match registry.wakeup() {
                        Ok(signaled) => debug!("Refresh woke {} waiters", signaled),
                        Err(RegistryError::Closed) => {
                            info!("Wakeup registry closed, stopping refresh task");
                            break;
                        }
                        Err(e) => warn!("Wakeup failed: {}", e),
                    }
                    cycles.fetch_add(1, Ordering::Relaxed);
                }
            })
        };

        Self {
            cancel,
            task,
            cycles,
        }
    }

    /// Completed refresh cycles
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the task and wait for it to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Refresh task ended abnormally: {}", e);
        }
    }
}

/// Blocks a consumer thread until the next refresh
///
/// Owns one auto-reset event in the [`EventTable`]; the event is destroyed
/// when the waiter is dropped.
pub struct DataWaiter {
    table: Arc<EventTable>,
    registry: Arc<WakeupRegistry>,
    handle: WaitHandle,
}

impl DataWaiter {
    pub fn new(table: Arc<EventTable>, registry: Arc<WakeupRegistry>) -> Self {
        let handle = table.create_event(false, false);
        Self {
            table,
            registry,
            handle,
        }
    }

    pub fn handle(&self) -> WaitHandle {
        self.handle
    }

    /// Wait for new data; `Ok(false)` on timeout
    ///
    /// The handle is registered only for the duration of the wait.
    pub fn wait_for_data(&self, timeout: Duration) -> Result<bool, RegistryError> {
        self.registry.add(self.handle)?;
        let woke = self.table.wait(self.handle, timeout);
        match self.registry.remove(self.handle) {
            Ok(_) | Err(RegistryError::Closed) => {}
            Err(e) => return Err(e),
        }
        woke
    }
}

impl Drop for DataWaiter {
    fn drop(&mut self) {
        if let Err(e) = self.table.destroy_event(self.handle) {
            debug!("Waiter event already gone: {}", e);
        }
    }
}
