use hid_events::controller::{Axis, Button, EdgeDetector, Gamepad, InputSnapshot, LatchedInput};
use hid_events::event::{Condition, DebounceKind, EventLoop};
use hid_events::HidError;
use parking_lot::Mutex;
use std::sync::Arc;

fn gamepad() -> (Gamepad, Arc<LatchedInput>) {
    let input = Arc::new(LatchedInput::new(Button::ALL.len(), Axis::COUNT));
    (Gamepad::new(0, input.clone()), input)
}

#[test]
fn test_edge_sequence_press_then_release() {
    let mut det = EdgeDetector::new(1);
    let samples = [false, false, true, true, false];
    let mut pressed_at = Vec::new();

    for (step, sample) in samples.iter().enumerate() {
        det.update(0, *sample).unwrap();
        if det.query_pressed(0).unwrap() {
            pressed_at.push(step + 1);
            assert!(!det.query_pressed(0).unwrap());
        }
    }
    assert_eq!(pressed_at, vec![3]);
    assert!(det.query_released(0).unwrap());
    assert!(!det.query_released(0).unwrap());
}

#[test]
fn test_threshold_then_rising_edge() {
    let (pad, input) = gamepad();
    let axis = Axis::RightTrigger;
    let mut event_loop = EventLoop::new();
    let (_, level) = event_loop.observe("level", pad.axis_greater_than(axis, 0.5));
    let (_, rising) = event_loop.observe("rising", pad.axis_greater_than(axis, 0.5).rising());

    let mut levels = Vec::new();
    let mut edges = Vec::new();
    for value in [0.0, 0.3, 0.6, 0.4] {
        input.publish(
            InputSnapshot::new(Button::ALL.len(), Axis::COUNT).with_axis(axis.index(), value),
        );
        event_loop.tick();
        levels.push(level.get());
        edges.push(rising.get());
    }
    assert_eq!(levels, vec![false, false, true, false]);
    assert_eq!(edges, vec![false, false, true, false]);
}

#[test]
fn test_tick_order_for_any_count() {
    for k in [0usize, 1, 2, 10, 64] {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut event_loop = EventLoop::new();
        for id in 0..k {
            let seen = seen.clone();
            event_loop.register(format!("p{}", id), move || {
                seen.lock().push(id);
                Ok(())
            });
        }
        for round in 1..=3 {
            let report = event_loop.tick();
            assert_eq!(report.executed, k);
            let expected: Vec<usize> = (0..round).flat_map(|_| 0..k).collect();
            assert_eq!(*seen.lock(), expected);
        }
    }
}

#[test]
fn test_failing_condition_is_isolated() {
    let (pad, input) = gamepad();
    let hits = Arc::new(Mutex::new(Vec::new()));
    let mut event_loop = EventLoop::new();

    let h = hits.clone();
    event_loop.bind("ok-before", pad.button_condition(Button::East), move || {
        h.lock().push("before")
    });
    // index far outside the device fails every tick
    event_loop.bind(
        "bad",
        Condition::button(pad.source(), 500),
        || unreachable!("bad condition never evaluates true"),
    );
    event_loop.register("explicit", || Err(HidError::action("explicit", "nope")));
    let h = hits.clone();
    event_loop.bind("ok-after", pad.button_condition(Button::East), move || {
        h.lock().push("after")
    });

    input.update(|s| s.buttons[Button::East.index()] = true);
    let report = event_loop.tick();
    assert_eq!(report.executed, 4);
    assert_eq!(report.failed, 2);
    assert_eq!(*hits.lock(), vec!["before", "after"]);
}

#[test]
fn test_debounced_button_ignores_chatter() {
    let (pad, input) = gamepad();
    let mut event_loop = EventLoop::new();
    let fired = Arc::new(Mutex::new(0));
    let f = fired.clone();
    event_loop.bind(
        "debounced-press",
        pad.button_condition(Button::West)
            .debounce(3, DebounceKind::Both)
            .rising(),
        move || *f.lock() += 1,
    );

    let chatter = [true, false, true, false, true, true, true, true, false];
    for level in chatter {
        input.update(|s| s.buttons[Button::West.index()] = level);
        event_loop.tick();
    }
    assert_eq!(*fired.lock(), 1);
}

#[test]
fn test_queries_are_stable_while_disconnected() {
    let (mut pad, input) = gamepad();
    input.update(|s| s.buttons[Button::Guide.index()] = true);
    pad.poll().unwrap();
    input.update(|s| s.connected = false);
    for _ in 0..3 {
        pad.poll().unwrap();
        assert!(pad.polled_button(Button::Guide).unwrap());
    }
    assert!(pad.button_pressed(Button::Guide).unwrap());
    assert!(!pad.button_pressed(Button::Guide).unwrap());
}
