//! Unit of work state.

use crate::error::{CoreError, CoreResult};
use crate::types::UowId;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// State of a unit of work.
///
/// `Committed` and `Aborted` are terminal and mutually exclusive; a unit
/// reaches exactly one of them, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UowState {
    /// Open and accepting operations.
    Open,
    /// Committed: its writes were merged one level up.
    Committed,
    /// Aborted: its writes were discarded.
    Aborted,
}

impl UowState {
    /// Returns whether this state is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl fmt::Display for UowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

const STATE_OPEN: u8 = 0;
const STATE_COMMITTED: u8 = 1;
const STATE_ABORTED: u8 = 2;

/// Shared state cell for one unit of work.
///
/// The arena node and every handle hold the same cell, so the state stays
/// readable after a finished tree is torn out of the arena. Transitions
/// happen under the arena lock; the atomic only makes unlocked reads from
/// handles well defined.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(STATE_OPEN))
    }

    pub(crate) fn get(&self) -> UowState {
        match self.0.load(Ordering::Acquire) {
            STATE_COMMITTED => UowState::Committed,
            STATE_ABORTED => UowState::Aborted,
            _ => UowState::Open,
        }
    }

    pub(crate) fn set(&self, state: UowState) {
        let raw = match state {
            UowState::Open => STATE_OPEN,
            UowState::Committed => STATE_COMMITTED,
            UowState::Aborted => STATE_ABORTED,
        };
        self.0.store(raw, Ordering::Release);
    }

    /// Errors with [`CoreError::AlreadyTerminal`] unless the state is open.
    pub(crate) fn ensure_open(&self, uow: UowId) -> CoreResult<()> {
        match self.get() {
            UowState::Open => Ok(()),
            state => Err(CoreError::already_terminal(uow, state)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cell_is_open() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), UowState::Open);
        assert!(!cell.get().is_terminal());
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(UowState::Committed.is_terminal());
        assert!(UowState::Aborted.is_terminal());
        assert!(!UowState::Open.is_terminal());
    }

    #[test]
    fn ensure_open_names_the_state() {
        let cell = StateCell::new();
        cell.set(UowState::Committed);
        let err = cell.ensure_open(UowId::new(3)).unwrap_err();
        assert_eq!(err.to_string(), "unit of work uow:3 is already committed");

        cell.set(UowState::Aborted);
        let err = cell.ensure_open(UowId::new(3)).unwrap_err();
        assert_eq!(err.to_string(), "unit of work uow:3 is already aborted");
    }

    #[test]
    fn display_names() {
        assert_eq!(UowState::Open.to_string(), "open");
        assert_eq!(UowState::Committed.to_string(), "committed");
        assert_eq!(UowState::Aborted.to_string(), "aborted");
    }
}
