//! rdflash-core - Region programming engine for the RD boot flash
//!
//! This crate contains everything needed to reprogram the SPI NOR flash that
//! holds the FPGA boot images of the RD module: the region map, the chip
//! identity guard, block protection reconciliation, the
//! erase-program-verify engine and the multiboot jump sector encoder.
//!
//! It is `no_std` compatible (it needs `alloc`). The `std` feature adds
//! TOML layout loading, a sleeping [`transport::StdDelay`] and
//! `std::error::Error` implementations.
//!
//! # Example
//!
//! ```ignore
//! use rdflash_core::config::FlashConfig;
//! use rdflash_core::flash::{FlashSession, NoProgress};
//! use rdflash_core::transport::StdDelay;
//!
//! let config = FlashConfig::current();
//! let mut session = FlashSession::new(transport, StdDelay, &config);
//!
//! session.verify_identity()?;
//! let primary = config.layout.region("primary")?;
//! session.reconcile_protection(&[primary])?;
//! session.write_region(primary, &image, &mut NoProgress)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bpr;
pub mod config;
pub mod error;
pub mod flash;
pub mod identity;
pub mod jump;
pub mod layout;
pub mod plan;
pub mod protocol;
pub mod transport;

pub use error::{Error, Result};
