//! Sampling collaborator between the hardware I/O layer and the event core
//!
//! The core only ever asks an [`InputSource`] for one boolean or axis value
//! by index. [`LatchedInput`] is the reference implementation: the refresh
//! thread publishes whole [`InputSnapshot`]s and readers always see one
//! consistent snapshot per poll cycle.

use parking_lot::RwLock;
use std::fmt;
use tracing::debug;

/// Which family of signals an index belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Button,
    Axis,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Button => write!(f, "button"),
            SignalKind::Axis => write!(f, "axis"),
        }
    }
}

/// Sampling errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    /// Index outside the device's supported range
    #[error("{kind} index {index} out of range (device has {count})")]
    OutOfRange {
        kind: SignalKind,
        index: usize,
        count: usize,
    },
}

pub(crate) fn check_index(kind: SignalKind, index: usize, count: usize) -> Result<(), InputError> {
    if index < count {
        Ok(())
    } else {
        Err(InputError::OutOfRange { kind, index, count })
    }
}

/// Raw per-cycle sample access keyed by index
pub trait InputSource: Send + Sync {
    fn button(&self, index: usize) -> Result<bool, InputError>;

    fn axis(&self, index: usize) -> Result<f64, InputError>;

    fn button_count(&self) -> usize;

    fn axis_count(&self) -> usize;

    /// Connection status; the event core does not act on it
    fn is_connected(&self) -> bool {
        true
    }
}

/// One latched sample of every signal on a device
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputSnapshot {
    pub buttons: Vec<bool>,
    pub axes: Vec<f64>,
    pub connected: bool,
}

impl InputSnapshot {
    pub fn new(button_count: usize, axis_count: usize) -> Self {
        Self {
            buttons: vec![false; button_count],
            axes: vec![0.0; axis_count],
            connected: true,
        }
    }

    pub fn with_button(mut self, index: usize, pressed: bool) -> Self {
        if let Some(b) = self.buttons.get_mut(index) {
            *b = pressed;
        }
        self
    }

    pub fn with_axis(mut self, index: usize, value: f64) -> Self {
        if let Some(a) = self.axes.get_mut(index) {
            *a = value;
        }
        self
    }
}

/// Snapshot buffer written by the refresh thread, read by the control loop
#[derive(Debug)]
pub struct LatchedInput {
    button_count: usize,
    axis_count: usize,
    current: RwLock<InputSnapshot>,
}

impl LatchedInput {
    pub fn new(button_count: usize, axis_count: usize) -> Self {
        Self {
            button_count,
            axis_count,
            current: RwLock::new(InputSnapshot::new(button_count, axis_count)),
        }
    }

    /// Replace the latched snapshot
    ///
    /// Snapshots shorter than the device are padded with released buttons
    /// and centered axes; longer ones are truncated.
    pub fn publish(&self, mut snapshot: InputSnapshot) {
        snapshot.buttons.resize(self.button_count, false);
        snapshot.axes.resize(self.axis_count, 0.0);
        debug!(
            "Publishing snapshot ({} buttons pressed)",
            snapshot.buttons.iter().filter(|b| **b).count()
        );
        *self.current.write() = snapshot;
    }

    /// Mutate the latched snapshot in place
    pub fn update(&self, f: impl FnOnce(&mut InputSnapshot)) {
        let mut guard = self.current.write();
        f(&mut guard);
        guard.buttons.resize(self.button_count, false);
        guard.axes.resize(self.axis_count, 0.0);
    }

    pub fn snapshot(&self) -> InputSnapshot {
        self.current.read().clone()
    }
}

impl InputSource for LatchedInput {
    fn button(&self, index: usize) -> Result<bool, InputError> {
        check_index(SignalKind::Button, index, self.button_count)?;
        Ok(self.current.read().buttons[index])
    }

    fn axis(&self, index: usize) -> Result<f64, InputError> {
        check_index(SignalKind::Axis, index, self.axis_count)?;
        Ok(self.current.read().axes[index])
    }

    fn button_count(&self) -> usize {
        self.button_count
    }

    fn axis_count(&self) -> usize {
        self.axis_count
    }

    fn is_connected(&self) -> bool {
        self.current.read().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_read() {
        let input = LatchedInput::new(4, 2);
        input.publish(InputSnapshot::new(4, 2).with_button(2, true).with_axis(1, 0.75));
        assert_eq!(input.button(2), Ok(true));
        assert_eq!(input.button(0), Ok(false));
        assert_eq!(input.axis(1), Ok(0.75));
    }

    #[test]
    fn test_out_of_range() {
        let input = LatchedInput::new(4, 2);
        assert_eq!(
            input.button(4),
            Err(InputError::OutOfRange {
                kind: SignalKind::Button,
                index: 4,
                count: 4
            })
        );
        assert!(input.axis(2).is_err());
    }

    #[test]
    fn test_short_snapshot_is_padded() {
        let input = LatchedInput::new(4, 2);
        input.publish(InputSnapshot {
            buttons: vec![true],
            axes: vec![],
            connected: false,
        });
        assert_eq!(input.button(0), Ok(true));
        assert_eq!(input.button(3), Ok(false));
        assert_eq!(input.axis(1), Ok(0.0));
        assert!(!input.is_connected());
    }
}
