//! High-level flash operations
//!
//! This module provides the session type that erases, programs, verifies and
//! reads regions of the boot flash.

mod engine;
mod progress;
mod state;

pub use engine::{FlashSession, WriteReport};
pub use progress::{NoProgress, WriteProgress};
pub use state::WriteState;
