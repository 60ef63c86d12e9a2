//! Composable boolean conditions
//!
//! A [`Condition`] is evaluated once per event-loop tick. Primitive variants
//! read hardware through an [`InputSource`]; derived variants wrap another
//! condition and carry their own state (edge latch, debounce counter), so the
//! same instance must not be evaluated more than once per tick.

use std::fmt;
use std::sync::Arc;

use crate::controller::edge_detector::{Edge, EdgeState};
use crate::controller::input_source::InputSource;
use crate::error::HidError;

type Predicate = Box<dyn FnMut() -> Result<bool, HidError> + Send>;

/// Strict comparison applied to an axis sample
///
/// No hysteresis: a value sitting exactly on the threshold is false, and a
/// value oscillating around it will chatter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

impl Comparison {
    pub fn apply(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::LessThan => value < threshold,
        }
    }
}

/// Which transitions a debouncer delays
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DebounceKind {
    /// Delay false → true only
    #[default]
    Rising,
    /// Delay true → false only
    Falling,
    /// Delay both directions
    Both,
}

/// Tick-counting debouncer
///
/// The output only changes once the input has disagreed with it for
/// `ticks` consecutive evaluations. Transitions not covered by `kind` pass
/// through immediately.
#[derive(Clone, Debug)]
pub struct Debouncer {
    ticks: u32,
    kind: DebounceKind,
    baseline: bool,
    counter: u32,
}

impl Debouncer {
    pub fn new(ticks: u32, kind: DebounceKind) -> Self {
        Self {
            ticks: ticks.max(1),
            kind,
            baseline: false,
            counter: 0,
        }
    }

    pub fn calculate(&mut self, input: bool) -> bool {
        if input == self.baseline {
            self.counter = 0;
            return self.baseline;
        }

        let delayed = match self.kind {
            DebounceKind::Rising => input,
            DebounceKind::Falling => !input,
            DebounceKind::Both => true,
        };
        if !delayed {
            self.baseline = input;
            self.counter = 0;
            return self.baseline;
        }

        self.counter += 1;
        if self.counter >= self.ticks {
            self.baseline = input;
            self.counter = 0;
        }
        self.baseline
    }
}

/// A boolean signal built from hardware samples and combinators
pub enum Condition {
    /// Level of one raw button
    Raw {
        source: Arc<dyn InputSource>,
        button: usize,
    },
    /// Axis sample compared against a fixed threshold
    ThresholdOf {
        source: Arc<dyn InputSource>,
        axis: usize,
        threshold: f64,
        comparison: Comparison,
    },
    /// Inner condition filtered through a [`Debouncer`]
    Debounced {
        inner: Box<Condition>,
        debouncer: Debouncer,
    },
    /// True on the evaluation where the inner condition made `edge`
    EdgeOf {
        inner: Box<Condition>,
        edge: Edge,
        state: EdgeState,
    },
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    /// Arbitrary user predicate
    Custom(Predicate),
}

impl Condition {
    pub fn button(source: Arc<dyn InputSource>, button: usize) -> Self {
        Condition::Raw { source, button }
    }

    pub fn axis_greater_than(source: Arc<dyn InputSource>, axis: usize, threshold: f64) -> Self {
        Condition::ThresholdOf {
            source,
            axis,
            threshold,
            comparison: Comparison::GreaterThan,
        }
    }

    pub fn axis_less_than(source: Arc<dyn InputSource>, axis: usize, threshold: f64) -> Self {
        Condition::ThresholdOf {
            source,
            axis,
            threshold,
            comparison: Comparison::LessThan,
        }
    }

    pub fn custom(f: impl FnMut() -> Result<bool, HidError> + Send + 'static) -> Self {
        Condition::Custom(Box::new(f))
    }

    pub fn debounce(self, ticks: u32, kind: DebounceKind) -> Self {
        Condition::Debounced {
            inner: Box::new(self),
            debouncer: Debouncer::new(ticks, kind),
        }
    }

    pub fn rising(self) -> Self {
        self.edge(Edge::Rising)
    }

    pub fn falling(self) -> Self {
        self.edge(Edge::Falling)
    }

    fn edge(self, edge: Edge) -> Self {
        Condition::EdgeOf {
            inner: Box::new(self),
            edge,
            state: EdgeState::default(),
        }
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    pub fn and(self, other: Condition) -> Self {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Sample and combine, advancing any combinator state by one step
    ///
    /// `And`/`Or` evaluate both operands every time so stateful operands
    /// never miss a step.
    pub fn evaluate(&mut self) -> Result<bool, HidError> {
        match self {
            Condition::Raw { source, button } => Ok(source.button(*button)?),
            Condition::ThresholdOf {
                source,
                axis,
                threshold,
                comparison,
            } => Ok(comparison.apply(source.axis(*axis)?, *threshold)),
            Condition::Debounced { inner, debouncer } => {
                let input = inner.evaluate()?;
                Ok(debouncer.calculate(input))
            }
            Condition::EdgeOf { inner, edge, state } => {
                let sample = inner.evaluate()?;
                state.update(sample);
                // read-and-clear both latches so a stale opposite edge never lingers
                let pressed = state.take_pressed();
                let released = state.take_released();
                Ok(match edge {
                    Edge::Rising => pressed,
                    Edge::Falling => released,
                })
            }
            Condition::Not(inner) => Ok(!inner.evaluate()?),
            Condition::And(a, b) => {
                let a = a.evaluate()?;
                let b = b.evaluate()?;
                Ok(a && b)
            }
            Condition::Or(a, b) => {
                let a = a.evaluate()?;
                let b = b.evaluate()?;
                Ok(a || b)
            }
            Condition::Custom(f) => f(),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Raw { button, .. } => write!(f, "Raw(button {})", button),
            Condition::ThresholdOf {
                axis,
                threshold,
                comparison,
                ..
            } => write!(f, "ThresholdOf(axis {} {:?} {})", axis, comparison, threshold),
            Condition::Debounced { inner, debouncer } => f
                .debug_struct("Debounced")
                .field("inner", inner)
                .field("ticks", &debouncer.ticks)
                .field("kind", &debouncer.kind)
                .finish(),
            Condition::EdgeOf { inner, edge, .. } => write!(f, "EdgeOf({:?}, {:?})", edge, inner),
            Condition::Not(inner) => write!(f, "Not({:?})", inner),
            Condition::And(a, b) => write!(f, "And({:?}, {:?})", a, b),
            Condition::Or(a, b) => write!(f, "Or({:?}, {:?})", a, b),
            Condition::Custom(_) => write!(f, "Custom"),
        }
    }
}
