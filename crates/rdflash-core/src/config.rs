//! Device and board configuration
//!
//! A [`FlashConfig`] is built once at start-up and borrowed by every
//! component. It never changes afterwards.

use crate::bpr::BlockMap;
use crate::error::Result;
use crate::layout::{presets, Layout};

/// Size constants of the flash array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Erase granularity in bytes
    pub sector_size: u32,
    /// Program granularity in bytes
    pub page_size: u32,
    /// Total size in bytes
    pub chip_size: u32,
}

impl Geometry {
    /// SST26VF032B: 4 KiB sectors, 256 byte pages, 4 MiB
    pub const SST26VF032B: Self = Self {
        sector_size: 4096,
        page_size: 256,
        chip_size: 4 * 1024 * 1024,
    };

    /// Number of sectors needed to hold `len` bytes
    pub fn sectors_for(&self, len: usize) -> u32 {
        (len as u32).div_ceil(self.sector_size)
    }
}

/// Fixed worst-case latencies, in microseconds
///
/// The board offers no status register, so every erase and program is
/// followed by a fixed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Wait after each sector erase
    pub sector_erase_us: u32,
    /// Wait after each page program
    pub page_program_us: u32,
}

impl Timing {
    /// Datasheet maximums of the SST26VF032B
    pub const SST26VF032B: Self = Self {
        sector_erase_us: 25_000,
        page_program_us: 1_500,
    };
}

/// Everything the engine needs to know about the board
#[derive(Debug, Clone)]
pub struct FlashConfig {
    /// Array geometry
    pub geometry: Geometry,
    /// Completion delays
    pub timing: Timing,
    /// Identity code the device must report
    pub expected_id: [u8; 3],
    /// Default chunk size of read-back and dumps
    pub read_chunk: usize,
    /// Block-to-bit mapping of the protection register
    pub block_map: BlockMap,
    /// Region table
    pub layout: Layout,
}

impl FlashConfig {
    /// Identity code of the SST26VF032B
    pub const SST26VF032B_ID: [u8; 3] = [0xBF, 0x26, 0x42];

    /// Default read chunk size
    pub const DEFAULT_READ_CHUNK: usize = 1024;

    /// Build a configuration around `layout` and validate it
    pub fn with_layout(layout: Layout) -> Result<Self> {
        let config = Self {
            geometry: Geometry::SST26VF032B,
            timing: Timing::SST26VF032B,
            expected_id: Self::SST26VF032B_ID,
            read_chunk: Self::DEFAULT_READ_CHUNK,
            block_map: BlockMap::sst26vf032b(),
            layout,
        };
        config.layout.validate(&config.geometry)?;
        Ok(config)
    }

    /// Configuration with the legacy region table
    pub fn legacy() -> Self {
        Self::preset(presets::legacy(&BlockMap::sst26vf032b()))
    }

    /// Configuration with the packed region table
    pub fn current() -> Self {
        Self::preset(presets::current(&BlockMap::sst26vf032b()))
    }

    // Presets are checked by the layout tests.
    fn preset(layout: Layout) -> Self {
        Self {
            geometry: Geometry::SST26VF032B,
            timing: Timing::SST26VF032B,
            expected_id: Self::SST26VF032B_ID,
            read_chunk: Self::DEFAULT_READ_CHUNK,
            block_map: BlockMap::sst26vf032b(),
            layout,
        }
    }

    /// Select a preset by name or load a TOML layout file
    #[cfg(feature = "std")]
    pub fn from_layout_arg(arg: &str) -> Result<Self> {
        match presets::by_name(arg, &BlockMap::sst26vf032b()) {
            Some(layout) => Self::with_layout(layout),
            None => Self::from_toml_file(arg),
        }
    }

    /// Load the region table from a TOML file
    #[cfg(feature = "std")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let layout = Layout::from_toml_file(path, &BlockMap::sst26vf032b())?;
        Self::with_layout(layout)
    }

    /// Override the read chunk size
    pub fn with_read_chunk(mut self, chunk: usize) -> Self {
        self.read_chunk = chunk.max(1);
        self
    }
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self::current()
    }
}
