//! Gamepad facade over a raw [`InputSource`]
//!
//! Maps named buttons and axes onto raw indices, feeds every button into an
//! [`EdgeDetector`] once per [`poll`](Gamepad::poll), and hands out
//! [`Condition`]s for event-loop bindings.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::edge_detector::EdgeDetector;
use super::input_source::{InputError, InputSource};
use crate::event::Condition;

/// Threshold used by the trigger conditions when none is given
pub const DEFAULT_TRIGGER_THRESHOLD: f64 = 0.5;

/// Digital buttons, in raw index order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    South,
    East,
    West,
    North,
    Back,
    Guide,
    Start,
    LeftStick,
    RightStick,
    LeftShoulder,
    RightShoulder,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Misc1,
    RightPaddle1,
    LeftPaddle1,
    RightPaddle2,
    LeftPaddle2,
    Touchpad,
    Misc2,
    Misc3,
    Misc4,
    Misc5,
    Misc6,
}

impl Button {
    pub const ALL: [Button; 26] = [
        Button::South,
        Button::East,
        Button::West,
        Button::North,
        Button::Back,
        Button::Guide,
        Button::Start,
        Button::LeftStick,
        Button::RightStick,
        Button::LeftShoulder,
        Button::RightShoulder,
        Button::DpadUp,
        Button::DpadDown,
        Button::DpadLeft,
        Button::DpadRight,
        Button::Misc1,
        Button::RightPaddle1,
        Button::LeftPaddle1,
        Button::RightPaddle2,
        Button::LeftPaddle2,
        Button::Touchpad,
        Button::Misc2,
        Button::Misc3,
        Button::Misc4,
        Button::Misc5,
        Button::Misc6,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Analog axes at their raw indices; index 2 is unused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    LeftX = 0,
    LeftY = 1,
    RightX = 3,
    RightY = 4,
    /// Bound to [0, 1] rather than [-1, 1]
    LeftTrigger = 5,
    /// Bound to [0, 1] rather than [-1, 1]
    RightTrigger = 6,
}

impl Axis {
    /// Size of the raw axis table covering every named axis
    pub const COUNT: usize = 7;

    pub const ALL: [Axis; 6] = [
        Axis::LeftX,
        Axis::LeftY,
        Axis::RightX,
        Axis::RightY,
        Axis::LeftTrigger,
        Axis::RightTrigger,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Read-only view for dashboards
#[derive(Clone, Debug, PartialEq)]
pub struct GamepadTelemetry {
    pub port: u8,
    pub connected: bool,
    pub axes: Vec<(Axis, f64)>,
    pub buttons: Vec<(Button, bool)>,
}

/// One gamepad on one port
pub struct Gamepad {
    port: u8,
    source: Arc<dyn InputSource>,
    edges: EdgeDetector,
}

impl Gamepad {
    pub fn new(port: u8, source: Arc<dyn InputSource>) -> Self {
        let button_count = source.button_count();
        if button_count < Button::ALL.len() {
            warn!(
                "Gamepad on port {} exposes only {} buttons, named buttons past that will fail",
                port, button_count
            );
        }
        info!(
            "Gamepad on port {}: {} buttons, {} axes",
            port,
            button_count,
            source.axis_count()
        );
        Self {
            port,
            edges: EdgeDetector::new(button_count),
            source,
        }
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn source(&self) -> Arc<dyn InputSource> {
        self.source.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.source.is_connected()
    }

    /// Sample every button once and update the edge latches
    ///
    /// A disconnected device is skipped; latches and levels keep their last
    /// values. Returns the number of edges seen this cycle.
    pub fn poll(&mut self) -> Result<usize, InputError> {
        if !self.source.is_connected() {
            debug!("Gamepad {} disconnected, skipping poll", self.port);
            return Ok(0);
        }
        let mut edges = 0;
        for index in 0..self.edges.signal_count() {
            let sample = self.source.button(index)?;
            if self.edges.update(index, sample)?.is_some() {
                edges += 1;
            }
        }
        Ok(edges)
    }

    /// Current level straight from the source
    pub fn button(&self, button: Button) -> Result<bool, InputError> {
        self.source.button(button.index())
    }

    /// Whether `button` was pressed since the last check
    pub fn button_pressed(&mut self, button: Button) -> Result<bool, InputError> {
        self.edges.query_pressed(button.index())
    }

    /// Whether `button` was released since the last check
    pub fn button_released(&mut self, button: Button) -> Result<bool, InputError> {
        self.edges.query_released(button.index())
    }

    pub fn raw_button_pressed(&mut self, index: usize) -> Result<bool, InputError> {
        self.edges.query_pressed(index)
    }

    pub fn raw_button_released(&mut self, index: usize) -> Result<bool, InputError> {
        self.edges.query_released(index)
    }

    /// Level seen by the last poll
    pub fn polled_button(&self, button: Button) -> Result<bool, InputError> {
        self.edges.query_current(button.index())
    }

    pub fn axis(&self, axis: Axis) -> Result<f64, InputError> {
        self.source.axis(axis.index())
    }

    pub fn left_x(&self) -> Result<f64, InputError> {
        self.axis(Axis::LeftX)
    }

    pub fn left_y(&self) -> Result<f64, InputError> {
        self.axis(Axis::LeftY)
    }

    pub fn right_x(&self) -> Result<f64, InputError> {
        self.axis(Axis::RightX)
    }

    pub fn right_y(&self) -> Result<f64, InputError> {
        self.axis(Axis::RightY)
    }

    pub fn left_trigger_axis(&self) -> Result<f64, InputError> {
        self.axis(Axis::LeftTrigger)
    }

    pub fn right_trigger_axis(&self) -> Result<f64, InputError> {
        self.axis(Axis::RightTrigger)
    }

    pub fn button_condition(&self, button: Button) -> Condition {
        Condition::button(self.source.clone(), button.index())
    }

    /// True while the left trigger is strictly above `threshold`
    pub fn left_trigger(&self, threshold: f64) -> Condition {
        self.axis_greater_than(Axis::LeftTrigger, threshold)
    }

    /// True while the right trigger is strictly above `threshold`
    pub fn right_trigger(&self, threshold: f64) -> Condition {
        self.axis_greater_than(Axis::RightTrigger, threshold)
    }

    pub fn axis_greater_than(&self, axis: Axis, threshold: f64) -> Condition {
        Condition::axis_greater_than(self.source.clone(), axis.index(), threshold)
    }

    pub fn axis_less_than(&self, axis: Axis, threshold: f64) -> Condition {
        Condition::axis_less_than(self.source.clone(), axis.index(), threshold)
    }

    /// Snapshot of every named signal the source exposes
    pub fn telemetry(&self) -> GamepadTelemetry {
        let axes = Axis::ALL
            .iter()
            .filter_map(|a| self.axis(*a).ok().map(|v| (*a, v)))
            .collect();
        let buttons = Button::ALL
            .iter()
            .filter_map(|b| self.button(*b).ok().map(|v| (*b, v)))
            .collect();
        GamepadTelemetry {
            port: self.port,
            connected: self.is_connected(),
            axes,
            buttons,
        }
    }
}

impl std::fmt::Debug for Gamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gamepad")
            .field("port", &self.port)
            .field("edges", &self.edges)
            .finish()
    }
}
