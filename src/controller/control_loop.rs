use chrono::Local;
use statum::{machine, state};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::gamepad::Gamepad;
use crate::error::HidError;
use crate::event::{EventLoop, TickReport};

/// User code run after every tick with access to the polled gamepads
pub type PeriodicHook = Box<dyn FnMut(&mut [Gamepad]) -> Result<(), HidError> + Send>;

// Summary of one poll pass, carried into the ticking state
#[derive(Clone, Debug, Default)]
pub struct PollSummary {
    pub edges: usize,
    pub disconnected: usize,
    /// Gamepads whose poll returned an error
    pub failed: usize,
}

/// Control loop settings
#[derive(Clone, Debug)]
pub struct LoopSettings {
    pub loop_period_ms: u64,
    pub stats_interval_secs: i64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            loop_period_ms: 20,
            stats_interval_secs: 30,
        }
    }
}

/// Running totals since the loop was created
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub edges: u64,
    pub failed_actions: u64,
    pub poll_failures: u64,
}

#[state]
#[derive(Debug, Clone)]
pub enum CycleState {
    Waiting,
    Polled(PollSummary),
    Ticked,
}

#[machine]
pub struct ControlLoop<S: CycleState> {
    // Devices polled at the start of every cycle
    gamepads: Vec<Gamepad>,

    // Conditions evaluated once per cycle
    event_loop: EventLoop,

    // Application code run after the tick
    periodic: Option<PeriodicHook>,

    settings: LoopSettings,

    stats: CycleStats,
}

impl<S: CycleState> ControlLoop<S> {
    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn event_loop_mut(&mut self) -> &mut EventLoop {
        &mut self.event_loop
    }

    pub fn gamepads(&self) -> &[Gamepad] {
        &self.gamepads
    }

    pub fn gamepads_mut(&mut self) -> &mut [Gamepad] {
        &mut self.gamepads
    }

    pub fn cycles(&self) -> u64 {
        self.stats.cycles
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }
}

impl ControlLoop<Waiting> {
    pub fn create(
        gamepads: Vec<Gamepad>,
        event_loop: EventLoop,
        settings: Option<LoopSettings>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        info!(
            "Creating control loop: {} gamepads, {} loop actions, {:?}",
            gamepads.len(),
            event_loop.len(),
            settings
        );
        Self::new(gamepads, event_loop, None, settings, CycleStats::default())
    }

    /// Install the hook run after every tick
    pub fn with_periodic(
        mut self,
        hook: impl FnMut(&mut [Gamepad]) -> Result<(), HidError> + Send + 'static,
    ) -> Self {
        self.periodic = Some(Box::new(hook));
        self
    }

    /// Sample every gamepad and latch its edges
    ///
    /// A gamepad whose read fails is logged and counted; the others are
    /// still polled and the cycle goes on.
    pub fn poll_inputs(mut self) -> ControlLoop<Polled> {
        let mut summary = PollSummary::default();
        for pad in self.gamepads.iter_mut() {
            if !pad.is_connected() {
                summary.disconnected += 1;
            }
            match pad.poll() {
                Ok(edges) => summary.edges += edges,
                Err(e) => {
                    summary.failed += 1;
                    warn!("Polling gamepad {} failed: {}", pad.port(), e);
                }
            }
        }
        if summary.edges > 0 {
            debug!("Poll latched {} edges", summary.edges);
        }
        self.transition_with(summary)
    }
}

impl ControlLoop<Polled> {
    /// Evaluate every registered condition once
    pub fn run_tick(mut self) -> (ControlLoop<Ticked>, TickReport) {
        let summary = self.get_state_data().cloned().unwrap_or_default();
        self.stats.edges += summary.edges as u64;
        self.stats.poll_failures += summary.failed as u64;
        if summary.disconnected > 0 {
            debug!("{} gamepads disconnected this cycle", summary.disconnected);
        }
        let report = self.event_loop.tick();
        self.stats.failed_actions += report.failed as u64;
        (self.transition(), report)
    }
}

impl ControlLoop<Ticked> {
    /// Run the periodic hook and return to waiting
    pub fn finish_cycle(mut self) -> ControlLoop<Waiting> {
        if let Some(hook) = self.periodic.as_mut() {
            if let Err(e) = hook(&mut self.gamepads) {
                warn!("Periodic hook failed: {}", e);
            }
        }
        self.stats.cycles += 1;
        self.transition()
    }
}

/// Run one full Waiting → Polled → Ticked → Waiting cycle
pub fn run_cycle(control: ControlLoop<Waiting>) -> (ControlLoop<Waiting>, TickReport) {
    let (ticked, report) = control.poll_inputs().run_tick();
    (ticked.finish_cycle(), report)
}

/// Handle to a control loop running on the tokio runtime
pub struct ControlLoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<ControlLoop<Waiting>>,
}

impl ControlLoopHandle {
    pub fn spawn(control: ControlLoop<Waiting>) -> Self {
        let cancel = CancellationToken::new();
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(run_control_loop(control, cancel))
        };
        info!("Control loop task started");
        Self { cancel, task }
    }

    /// Stop after the current cycle and hand the loop back
    pub async fn shutdown(self) -> Result<ControlLoop<Waiting>, HidError> {
        self.cancel.cancel();
        self.task.await.map_err(|e| {
            error!("Control loop task ended abnormally: {}", e);
            HidError::action("control-loop", e.to_string())
        })
    }
}

async fn run_control_loop(
    mut control: ControlLoop<Waiting>,
    cancel: CancellationToken,
) -> ControlLoop<Waiting> {
    let period = Duration::from_millis(control.settings().loop_period_ms.max(1));
    let stats_interval =
        chrono::Duration::try_seconds(control.settings().stats_interval_secs.max(1))
            .unwrap_or(chrono::Duration::MAX);
    info!("Starting control loop with {:?} period", period);

    let mut timer = tokio::time::interval(period);
    let mut last_stats_time = Local::now();
    let mut last_stats = control.stats;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Control loop cancelled after {} cycles", control.cycles());
                return control;
            }
            _ = timer.tick() => {}
        }

        let (next, report) = run_cycle(control);
        control = next;
        if report.failed > 0 {
            debug!("{} of {} actions failed this tick", report.failed, report.executed);
        }

        let now = Local::now();
        if now - last_stats_time > stats_interval {
            let elapsed = (now - last_stats_time).num_seconds().max(1);
            let cycles = control.stats.cycles - last_stats.cycles;
            info!(
                "Control loop stats: {} cycles, {} edges, {} failed actions, {} poll failures in {} seconds ({:.2} cycles/sec)",
                cycles,
                control.stats.edges - last_stats.edges,
                control.stats.failed_actions - last_stats.failed_actions,
                control.stats.poll_failures - last_stats.poll_failures,
                elapsed,
                cycles as f64 / elapsed as f64
            );
            last_stats = control.stats;
            last_stats_time = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::gamepad::{Axis, Button};
    use crate::controller::input_source::{InputError, InputSource, LatchedInput, SignalKind};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    // Fails every button read while `failing` is set
    struct FlakySource {
        failing: AtomicBool,
    }

    impl InputSource for FlakySource {
        fn button(&self, index: usize) -> Result<bool, InputError> {
            if self.failing.load(Ordering::Relaxed) {
                return Err(InputError::OutOfRange {
                    kind: SignalKind::Button,
                    index,
                    count: 0,
                });
            }
            Ok(false)
        }

        fn axis(&self, _index: usize) -> Result<f64, InputError> {
            Ok(0.0)
        }

        fn button_count(&self) -> usize {
            2
        }

        fn axis_count(&self) -> usize {
            0
        }
    }

    fn setup() -> (ControlLoop<Waiting>, Arc<LatchedInput>) {
        let input = Arc::new(LatchedInput::new(Button::ALL.len(), Axis::COUNT));
        let pad = Gamepad::new(0, input.clone());
        let control = ControlLoop::create(vec![pad], EventLoop::new(), None);
        (control, input)
    }

    #[test]
    fn test_cycle_polls_then_ticks_then_runs_hook() {
        let (mut control, input) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));

        let seen = order.clone();
        let cond = control.gamepads()[0].button_condition(Button::South);
        control
            .event_loop_mut()
            .bind("south", cond, move || seen.lock().push("tick"));

        let seen = order.clone();
        let mut control = control.with_periodic(move |pads| {
            if pads[0].button_pressed(Button::South)? {
                seen.lock().push("pressed");
            }
            Ok(())
        });

        input.update(|s| s.buttons[Button::South.index()] = true);
        for _ in 0..2 {
            let (next, report) = run_cycle(control);
            assert_eq!(report.executed, 1);
            control = next;
        }
        assert_eq!(*order.lock(), vec!["tick", "pressed", "tick"]);
        assert_eq!(control.cycles(), 2);
    }

    #[test]
    fn test_failing_gamepad_does_not_stop_cycle() {
        let flaky = Arc::new(FlakySource {
            failing: AtomicBool::new(true),
        });
        let input = Arc::new(LatchedInput::new(Button::ALL.len(), Axis::COUNT));
        let pads = vec![Gamepad::new(0, flaky.clone()), Gamepad::new(1, input.clone())];
        let presses = Arc::new(Mutex::new(0u32));
        let seen = presses.clone();
        let mut control = ControlLoop::create(pads, EventLoop::new(), None).with_periodic(
            move |pads| {
                if pads[1].button_pressed(Button::South)? {
                    *seen.lock() += 1;
                }
                Ok(())
            },
        );

        input.update(|s| s.buttons[Button::South.index()] = true);
        for _ in 0..3 {
            control = run_cycle(control).0;
        }
        assert_eq!(control.cycles(), 3);
        assert_eq!(control.stats().poll_failures, 3);
        assert_eq!(*presses.lock(), 1);

        flaky.failing.store(false, Ordering::Relaxed);
        control = run_cycle(control).0;
        assert_eq!(control.stats().poll_failures, 3);
        assert_eq!(control.cycles(), 4);
    }

    #[test]
    fn test_poll_summary_counts_failures() {
        let flaky = Arc::new(FlakySource {
            failing: AtomicBool::new(true),
        });
        let control = ControlLoop::create(vec![Gamepad::new(3, flaky)], EventLoop::new(), None);
        let polled = control.poll_inputs();
        let summary = polled.get_state_data().cloned().unwrap_or_default();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.edges, 0);
    }

    #[tokio::test]
    async fn test_spawned_loop_survives_failing_gamepad() {
        let flaky = Arc::new(FlakySource {
            failing: AtomicBool::new(true),
        });
        let settings = LoopSettings {
            loop_period_ms: 5,
            stats_interval_secs: i64::MAX,
        };
        let control =
            ControlLoop::create(vec![Gamepad::new(0, flaky)], EventLoop::new(), Some(settings));

        let handle = ControlLoopHandle::spawn(control);
        tokio::time::sleep(Duration::from_millis(60)).await;
        let control = handle.shutdown().await.unwrap();
        assert!(control.cycles() > 1);
        assert_eq!(control.stats().poll_failures, control.cycles());
    }

    #[tokio::test]
    async fn test_spawned_loop_shuts_down() {
        let (mut control, _input) = setup();
        let ticks = Arc::new(Mutex::new(0u32));
        let counter = ticks.clone();
        control.event_loop_mut().register("count", move || {
            *counter.lock() += 1;
            Ok(())
        });

        let handle = ControlLoopHandle::spawn(control);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let control = handle.shutdown().await.unwrap();
        assert!(control.cycles() > 0);
        assert_eq!(*ticks.lock() as u64, control.cycles());
    }
}
