//! Flash layout support
//!
//! A layout names the regions of the boot flash and binds each of them to
//! the protection mask that unlocks it. Layouts can be:
//!
//! - One of the built-in presets ([`presets::legacy`], [`presets::current`])
//! - Loaded from TOML files (with the `std` feature)
//!
//! ```ignore
//! let layout = Layout::from_toml_file("board.toml", &BlockMap::default())?;
//! let golden = layout.region("golden")?;
//! ```

pub mod presets;
mod types;

#[cfg(feature = "std")]
mod toml;

pub use types::*;
