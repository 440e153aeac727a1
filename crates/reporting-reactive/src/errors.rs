//! Error types for reactive primitives.

use crate::async_state::StatePhase;

/// Errors raised by reactive primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactiveError {
    /// A cell was asked to perform a transition its current phase forbids.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// Phase the cell was in when the transition was requested
        from: StatePhase,
        /// Phase the caller tried to move to
        to: StatePhase,
    },
}

impl ReactiveError {
    /// Create an invalid transition error
    pub fn invalid_transition(from: StatePhase, to: StatePhase) -> Self {
        Self::InvalidTransition { from, to }
    }
}
