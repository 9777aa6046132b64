//! Block protection register support
//!
//! # Overview
//!
//! The SST26 family protects its array with an 80-bit volatile Block
//! Protection Register (BPR). Each bit locks one block against writes or,
//! for the 8 KiB blocks at both ends of the array, against reads.
//!
//! The power-on state locks everything. Before a region can be erased the
//! bits covering it must be cleared, and only those: other regions (the
//! golden image in particular) keep their protection.
//!
//! # Example
//!
//! ```ignore
//! use rdflash_core::bpr::{reconcile, BlockMap};
//!
//! let map = BlockMap::sst26vf032b();
//! let result = reconcile(&mut transport, map.baseline(), &[primary])?;
//! if result.too_loose {
//!     println!("protection is looser than needed");
//! }
//! ```

mod bitmap;
mod blocks;
mod reconcile;

pub use bitmap::ProtectionBitmap;
pub use blocks::{BlockMap, LockFlags, ProtectionBlock};
pub use reconcile::{reconcile, target_bitmap, Reconciliation};
