//! RD board flash protocol
//!
//! This module contains the wire format of the RD board's SPI interface and
//! the command sequences used by the engine.

mod command;
pub mod opcodes;
mod rd;

pub use command::Command;
pub use rd::*;
