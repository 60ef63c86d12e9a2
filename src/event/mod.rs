//! Per-tick condition evaluation
//!
//! [`EventLoop`] owns an ordered list of actions and runs each once per
//! tick. Actions are usually built from [`Condition`]s, which compose raw
//! button levels and axis thresholds with edge, debounce and boolean
//! combinators.

pub mod condition;
pub mod event_loop;

pub use condition::{Comparison, Condition, DebounceKind, Debouncer};
pub use event_loop::{ConditionProbe, ConditionToken, EventLoop, LoopAction, TickReport};
