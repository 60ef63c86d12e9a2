//! Rising/falling edge latches over per-cycle boolean samples
//!
//! Each signal index gets an [`EdgeState`] the first time it is touched.
//! Latches are read-and-clear: a transition is reported to exactly one query
//! no matter how slowly the application polls.

use std::collections::HashMap;
use tracing::debug;

use super::input_source::{check_index, InputError, SignalKind};

/// Edge bookkeeping for one boolean signal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeState {
    previous: bool,
    pressed_latch: bool,
    released_latch: bool,
}

impl EdgeState {
    /// Feed one fresh sample, returning the transition it caused (if any)
    pub fn update(&mut self, sample: bool) -> Option<Edge> {
        let edge = match (self.previous, sample) {
            (false, true) => {
                self.pressed_latch = true;
                Some(Edge::Rising)
            }
            (true, false) => {
                self.released_latch = true;
                Some(Edge::Falling)
            }
            _ => None,
        };
        self.previous = sample;
        edge
    }

    pub fn take_pressed(&mut self) -> bool {
        std::mem::take(&mut self.pressed_latch)
    }

    pub fn take_released(&mut self) -> bool {
        std::mem::take(&mut self.released_latch)
    }

    pub fn current(&self) -> bool {
        self.previous
    }
}

/// Direction of a boolean transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    /// false → true
    Rising,
    /// true → false
    Falling,
}

/// Edge latches for every signal of one input device
#[derive(Clone, Debug)]
pub struct EdgeDetector {
    signal_count: usize,
    states: HashMap<usize, EdgeState>,
}

impl EdgeDetector {
    pub fn new(signal_count: usize) -> Self {
        Self {
            signal_count,
            states: HashMap::new(),
        }
    }

    pub fn signal_count(&self) -> usize {
        self.signal_count
    }

    fn state_mut(&mut self, index: usize) -> Result<&mut EdgeState, InputError> {
        check_index(SignalKind::Button, index, self.signal_count)?;
        Ok(self.states.entry(index).or_default())
    }

    /// Record this cycle's sample for `index`
    pub fn update(&mut self, index: usize, sample: bool) -> Result<Option<Edge>, InputError> {
        let edge = self.state_mut(index)?.update(sample);
        if let Some(edge) = edge {
            debug!("Signal {} edge: {:?}", index, edge);
        }
        Ok(edge)
    }

    /// Whether `index` went false → true since the last call; clears the latch
    pub fn query_pressed(&mut self, index: usize) -> Result<bool, InputError> {
        Ok(self.state_mut(index)?.take_pressed())
    }

    /// Whether `index` went true → false since the last call; clears the latch
    pub fn query_released(&mut self, index: usize) -> Result<bool, InputError> {
        Ok(self.state_mut(index)?.take_released())
    }

    /// Last sampled level of `index`; repeatable
    pub fn query_current(&self, index: usize) -> Result<bool, InputError> {
        check_index(SignalKind::Button, index, self.signal_count)?;
        Ok(self
            .states
            .get(&index)
            .map(EdgeState::current)
            .unwrap_or(false))
    }

    /// Forget every latch and level, e.g. after a reconnect
    pub fn reset(&mut self) {
        self.states.clear();
    }

    /// Number of signals that have state attached
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release_sequence() {
        let mut det = EdgeDetector::new(4);
        let samples = [false, false, true, true, false];

        for (step, sample) in samples.iter().enumerate() {
            det.update(1, *sample).unwrap();
            if step == 2 {
                assert!(det.query_pressed(1).unwrap());
                assert!(!det.query_pressed(1).unwrap());
            }
        }
        assert!(det.query_released(1).unwrap());
        assert!(!det.query_released(1).unwrap());
    }

    #[test]
    fn test_latch_survives_slow_polling() {
        let mut det = EdgeDetector::new(2);
        det.update(0, true).unwrap();
        det.update(0, false).unwrap();
        det.update(0, false).unwrap();
        // both edges happened between queries, both are reported once
        assert!(det.query_pressed(0).unwrap());
        assert!(det.query_released(0).unwrap());
        assert!(!det.query_pressed(0).unwrap());
        assert!(!det.query_released(0).unwrap());
    }

    #[test]
    fn test_query_current_is_repeatable() {
        let mut det = EdgeDetector::new(2);
        det.update(0, true).unwrap();
        for _ in 0..5 {
            assert!(det.query_current(0).unwrap());
        }
        det.update(0, false).unwrap();
        for _ in 0..5 {
            assert!(!det.query_current(0).unwrap());
        }
    }

    #[test]
    fn test_no_update_keeps_last_values() {
        let mut det = EdgeDetector::new(2);
        det.update(0, true).unwrap();
        assert!(det.query_current(0).unwrap());
        assert!(det.query_current(0).unwrap());
        assert!(det.query_pressed(0).unwrap());
    }

    #[test]
    fn test_out_of_range_leaves_state_alone() {
        let mut det = EdgeDetector::new(2);
        det.update(1, true).unwrap();
        assert!(matches!(
            det.update(2, true),
            Err(InputError::OutOfRange { index: 2, count: 2, .. })
        ));
        assert!(det.query_pressed(5).is_err());
        assert!(det.query_pressed(1).unwrap());
        assert_eq!(det.tracked(), 1);
    }

    #[test]
    fn test_state_created_lazily() {
        let mut det = EdgeDetector::new(8);
        assert_eq!(det.tracked(), 0);
        assert!(!det.query_current(3).unwrap());
        assert_eq!(det.tracked(), 0);
        assert!(!det.query_pressed(3).unwrap());
        assert_eq!(det.tracked(), 1);
    }

    #[test]
    fn test_update_reports_edge() {
        let mut state = EdgeState::default();
        assert_eq!(state.update(false), None);
        assert_eq!(state.update(true), Some(Edge::Rising));
        assert_eq!(state.update(true), None);
        assert_eq!(state.update(false), Some(Edge::Falling));
    }

    #[test]
    fn test_reset() {
        let mut det = EdgeDetector::new(2);
        det.update(0, true).unwrap();
        det.reset();
        assert!(!det.query_pressed(0).unwrap());
        assert!(!det.query_current(0).unwrap());
    }
}
