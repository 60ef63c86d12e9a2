use color_eyre::{eyre::eyre, Result};
use hid_events::config::HidConfig;
use hid_events::controller::{
    Axis, Button, ControlLoop, ControlLoopHandle, DataWaiter, Gamepad, InputSnapshot,
    LatchedInput, RefreshHandle,
};
use hid_events::event::EventLoop;
use hid_events::wakeup::{EventTable, WakeupRegistry};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = load_config().await?;
    info!("Running with config: {:?}", config);

    // One latched snapshot buffer per configured port
    let inputs: Vec<(u8, Arc<LatchedInput>)> = config
        .gamepads
        .iter()
        .map(|p| (p.port, Arc::new(LatchedInput::new(p.button_count, p.axis_count))))
        .collect();
    let gamepads: Vec<Gamepad> = inputs
        .iter()
        .map(|(port, input)| Gamepad::new(*port, input.clone()))
        .collect();

    let mut event_loop = EventLoop::new();
    for binding in &config.bindings {
        let pad = gamepads
            .iter()
            .find(|p| p.port() == binding.port)
            .ok_or_else(|| eyre!("No gamepad on port {}", binding.port))?;
        let name = binding.name.clone();
        let cond = binding.condition(pad, config.debounce_ticks);
        event_loop.bind(binding.name.clone(), cond, move || {
            info!("Binding '{}' fired", name)
        });
    }
    let trigger_probe = gamepads.first().map(|pad| {
        event_loop
            .observe("left-trigger", pad.left_trigger(config.trigger_threshold))
            .1
    });

    let table = Arc::new(EventTable::new());
    let registry = Arc::new(WakeupRegistry::new(table.clone()));

    // Without a hardware backend the refresh task replays a synthetic pattern
    let (demo_port, demo_input) = inputs
        .first()
        .cloned()
        .ok_or_else(|| eyre!("No gamepads configured"))?;
    let mut step: u64 = 0;
    let refresh = RefreshHandle::spawn(
        config.refresh_settings(),
        demo_input.clone(),
        registry.clone(),
        move || {
            step += 1;
            Some(demo_snapshot(&demo_input, step))
        },
    );
    info!("Refresh task driving demo input on port {}", demo_port);

    let stop = Arc::new(AtomicBool::new(false));
    let consumer = {
        let waiter = DataWaiter::new(table.clone(), registry.clone());
        let stop = stop.clone();
        let timeout = Duration::from_millis(config.wait_timeout_ms);
        std::thread::spawn(move || {
            let mut refreshes = 0u64;
            while !stop.load(Ordering::Relaxed) {
                match waiter.wait_for_data(timeout) {
                    Ok(true) => refreshes += 1,
                    Ok(false) => debug!("No new data within {:?}", timeout),
                    Err(e) => {
                        warn!("Consumer stopping: {}", e);
                        break;
                    }
                }
            }
            info!("Consumer saw {} refreshes", refreshes);
        })
    };

    let control = ControlLoop::create(gamepads, event_loop, Some(config.loop_settings()))
        .with_periodic(move |pads| {
            if trigger_probe.as_ref().is_some_and(|p| p.get()) {
                debug!("Left trigger above threshold");
            }
            for pad in pads.iter_mut() {
                if pad.button_released(Button::South)? {
                    debug!("Port {} south released", pad.port());
                }
            }
            Ok(())
        });
    let control = ControlLoopHandle::spawn(control);

    info!("Running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    let control = control.shutdown().await?;
    info!("Control loop finished: {:?}", control.stats());
    refresh.shutdown().await;
    stop.store(true, Ordering::Relaxed);
    registry.close();
    consumer
        .join()
        .map_err(|_| eyre!("Consumer thread panicked"))?;

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn load_config() -> Result<HidConfig> {
    let path = match std::env::args().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => {
            let path = HidConfig::default_config_path()
                .ok_or_else(|| eyre!("No config directory on this platform"))?;
            HidConfig::ensure_default_config(&path).await?;
            path
        }
    };
    info!("Loading config from {}", path.display());
    HidConfig::load(&path)
        .await
        .map_err(|e| eyre!("Failed to load {}: {}", path.display(), e))
}

// South toggles every 25 refreshes, left trigger sweeps 0 → 1
fn demo_snapshot(input: &LatchedInput, step: u64) -> InputSnapshot {
    let mut snapshot = input.snapshot();
    snapshot.connected = true;
    if let Some(south) = snapshot.buttons.get_mut(Button::South.index()) {
        *south = (step / 25) % 2 == 1;
    }
    if let Some(trigger) = snapshot.axes.get_mut(Axis::LeftTrigger.index()) {
        *trigger = (step % 100) as f64 / 100.0;
    }
    snapshot
}
