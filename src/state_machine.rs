//! Chat orchestration state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! The runtime feeds observed [`Event`]s in and executes the returned
//! [`Effect`]s.

mod effect;
pub mod event;
pub mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ChatContext, ChatState, ErrorKind, ToolCall};
pub use transition::{transition, TransitionError};
