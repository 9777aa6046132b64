//! Write state machine
//!
//! ```text
//! Idle -> Erasing -> Programming -> Verifying -> Done
//!   \________\___________\_____________\-------> Failed
//! ```
//!
//! `Done` may return to `Idle` for the next region. `Failed` is terminal:
//! nothing is written through a session once a write has failed.

use core::fmt;

use crate::error::{Error, Result};

/// Phase of a region write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteState {
    /// No write in progress
    #[default]
    Idle,
    /// Erasing covering sectors
    Erasing,
    /// Programming pages
    Programming,
    /// Reading back and comparing
    Verifying,
    /// The last write was verified
    Done,
    /// A write failed; the session refuses further writes
    Failed,
}

impl WriteState {
    /// Check if `self -> to` is a legal transition
    pub fn can_transition(self, to: WriteState) -> bool {
        use WriteState::*;
        matches!(
            (self, to),
            (Idle, Erasing)
                | (Erasing, Programming)
                | (Programming, Verifying)
                | (Verifying, Done)
                | (Done, Idle)
                | (Idle | Erasing | Programming | Verifying, Failed)
        )
    }

    /// Check if no further transition is possible
    pub fn is_terminal(self) -> bool {
        self == WriteState::Failed
    }

    /// Move to `to`, rejecting illegal transitions
    pub fn advance(&mut self, to: WriteState) -> Result<()> {
        if !self.can_transition(to) {
            return Err(Error::InvalidStateTransition { from: *self, to });
        }
        log::trace!("write state {} -> {}", self, to);
        *self = to;
        Ok(())
    }
}

impl fmt::Display for WriteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Erasing => "erasing",
            Self::Programming => "programming",
            Self::Verifying => "verifying",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
