use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::condition::Condition;
use crate::error::HidError;

/// Zero-argument action run once per tick
pub type LoopAction = Box<dyn FnMut() -> Result<(), HidError> + Send>;

/// Identifies one registration for later removal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConditionToken(u64);

/// Outcome of one [`EventLoop::tick`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Actions invoked this tick
    pub executed: usize,
    /// Actions that returned an error
    pub failed: usize,
}

struct Registration {
    token: ConditionToken,
    name: String,
    action: LoopAction,
}

/// Last value produced by an observed condition
///
/// Cheap to clone; readers (dashboards, application code) see the value
/// from the most recent tick.
#[derive(Clone, Debug, Default)]
pub struct ConditionProbe(Arc<AtomicBool>);

impl ConditionProbe {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Ordered set of actions polled once per control-loop tick
///
/// Actions run in registration order, each exactly once per
/// [`tick`](Self::tick). A failing action is logged and counted; the rest of
/// the tick still runs. The loop is single-threaded: callers serialize ticks.
#[derive(Default)]
pub struct EventLoop {
    registrations: Vec<Registration>,
    next_token: u64,
    ticks: u64,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action; it runs from the next tick on
    pub fn register(
        &mut self,
        name: impl Into<String>,
        action: impl FnMut() -> Result<(), HidError> + Send + 'static,
    ) -> ConditionToken {
        let token = ConditionToken(self.next_token);
        self.next_token += 1;
        let name = name.into();
        debug!("Registering loop action '{}' as {:?}", name, token);
        self.registrations.push(Registration {
            token,
            name,
            action: Box::new(action),
        });
        token
    }

    /// Evaluate `condition` every tick and run `on_true` whenever it holds
    pub fn bind(
        &mut self,
        name: impl Into<String>,
        mut condition: Condition,
        mut on_true: impl FnMut() + Send + 'static,
    ) -> ConditionToken {
        self.register(name, move || {
            if condition.evaluate()? {
                on_true();
            }
            Ok(())
        })
    }

    /// Evaluate `condition` every tick, publishing its value through a probe
    pub fn observe(
        &mut self,
        name: impl Into<String>,
        mut condition: Condition,
    ) -> (ConditionToken, ConditionProbe) {
        let probe = ConditionProbe::default();
        let cell = probe.0.clone();
        let token = self.register(name, move || {
            let value = condition.evaluate()?;
            cell.store(value, Ordering::Release);
            Ok(())
        });
        (token, probe)
    }

    /// Drop one registration; returns whether it existed
    pub fn remove(&mut self, token: ConditionToken) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.token != token);
        let removed = self.registrations.len() != before;
        if removed {
            debug!("Removed loop action {:?}", token);
        }
        removed
    }

    /// Run every registered action once, in registration order
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        for registration in self.registrations.iter_mut() {
            report.executed += 1;
            if let Err(e) = (registration.action)() {
                report.failed += 1;
                warn!(
                    "Loop action '{}' failed on tick {}: {}",
                    registration.name, self.ticks, e
                );
            }
        }
        self.ticks += 1;
        report
    }

    /// Remove every registration
    pub fn clear(&mut self) {
        info!("Clearing {} loop actions", self.registrations.len());
        self.registrations.clear();
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Ticks run since construction
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(|r| r.name.as_str())
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("actions", &self.names().collect::<Vec<_>>())
            .field("ticks", &self.ticks)
            .finish()
    }
}
