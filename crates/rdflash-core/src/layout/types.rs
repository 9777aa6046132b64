//! Layout types
//!
//! Core types for the region table. They work in no_std environments.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::bpr::ProtectionBitmap;
use crate::config::Geometry;
use crate::error::{Error, Result};

/// A named region within the flash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Name of the region
    pub name: String,
    /// Start address (inclusive)
    pub start: u32,
    /// End address (exclusive)
    pub end: u32,
    /// Mask ANDed into the protection target when this region is written
    pub protection_mask: ProtectionBitmap,
}

impl Region {
    /// Create a new region
    pub fn new(
        name: impl Into<String>,
        start: u32,
        end: u32,
        protection_mask: ProtectionBitmap,
    ) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            protection_mask,
        }
    }

    /// Get the size of this region in bytes
    pub fn size(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Check if an address is within this region
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr < self.end
    }

    /// Check if this region overlaps with another
    pub fn overlaps(&self, other: &Region) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if both ends are aligned to the given boundary
    pub fn is_aligned(&self, alignment: u32) -> bool {
        self.start.is_multiple_of(alignment) && self.end.is_multiple_of(alignment)
    }
}

/// Where the multiboot jump page lives and where it points by default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpLayout {
    /// Region holding the jump page
    pub region: String,
    /// Offset of the page inside that region
    pub page_offset: u32,
    /// Region whose start is the default jump target
    pub default_target: String,
}

impl Default for JumpLayout {
    fn default() -> Self {
        Self {
            region: String::from("jump"),
            page_offset: 0xF00,
            default_target: String::from("golden"),
        }
    }
}

/// Source of the layout information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutSource {
    /// Built-in table with a gap between primary and golden
    Legacy,
    /// Built-in packed table
    Current,
    /// Layout loaded from a TOML file
    Toml,
}

impl fmt::Display for LayoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Current => write!(f, "current"),
            Self::Toml => write!(f, "toml"),
        }
    }
}

/// A flash layout containing named regions
#[derive(Debug, Clone)]
pub struct Layout {
    /// Optional name for this layout
    pub name: Option<String>,
    /// Expected chip size (for validation)
    pub chip_size: Option<u32>,
    /// Source of this layout
    pub source: LayoutSource,
    /// Regions in this layout, sorted by address
    pub regions: Vec<Region>,
    /// Placement of the jump page
    pub jump: JumpLayout,
}

impl Layout {
    /// Create a layout with a specific source
    pub fn with_source(source: LayoutSource) -> Self {
        Self {
            name: None,
            chip_size: None,
            source,
            regions: Vec::new(),
            jump: JumpLayout::default(),
        }
    }

    /// Add a region to the layout
    pub fn add_region(&mut self, region: Region) {
        self.regions.push(region);
    }

    /// Find a region by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&Region> {
        self.regions
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Find a region by name, failing with [`Error::RegionNotFound`]
    pub fn region(&self, name: &str) -> Result<&Region> {
        self.find(name).ok_or(Error::RegionNotFound)
    }

    /// Region that holds the jump page
    pub fn jump_region(&self) -> Result<&Region> {
        self.region(&self.jump.region)
    }

    /// Default jump target address
    pub fn default_jump_target(&self) -> Result<u32> {
        Ok(self.region(&self.jump.default_target)?.start)
    }

    /// Get the number of regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Check if the layout is empty
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Sort regions by start address
    pub fn sort_by_address(&mut self) {
        self.regions.sort_by_key(|r| r.start);
    }

    /// Validate the layout against the device geometry
    pub fn validate(&self, geometry: &Geometry) -> core::result::Result<(), LayoutError> {
        if let Some(expected) = self.chip_size {
            if expected != geometry.chip_size {
                return Err(LayoutError::ChipSizeMismatch {
                    expected,
                    actual: geometry.chip_size,
                });
            }
        }

        for region in &self.regions {
            if region.start >= region.end {
                return Err(LayoutError::InvalidRegion);
            }
            if region.end > geometry.chip_size {
                return Err(LayoutError::RegionOutOfBounds);
            }
            if !region.is_aligned(geometry.sector_size) {
                return Err(LayoutError::Misaligned);
            }
        }

        for (i, r1) in self.regions.iter().enumerate() {
            for r2 in self.regions.iter().skip(i + 1) {
                if r1.overlaps(r2) {
                    return Err(LayoutError::OverlappingRegions);
                }
                if r1.name.eq_ignore_ascii_case(&r2.name) {
                    return Err(LayoutError::DuplicateRegionName);
                }
            }
        }

        let jump = self
            .find(&self.jump.region)
            .ok_or(LayoutError::JumpRegionMissing)?;
        let page_end = self.jump.page_offset.checked_add(geometry.page_size);
        if !self.jump.page_offset.is_multiple_of(geometry.page_size)
            || page_end.is_none_or(|end| end > jump.size())
        {
            return Err(LayoutError::JumpPageOutOfRange);
        }
        if self.find(&self.jump.default_target).is_none() {
            return Err(LayoutError::JumpTargetMissing);
        }

        Ok(())
    }
}

/// Errors that can occur when working with layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// Region extends beyond chip size
    RegionOutOfBounds,
    /// Region has invalid bounds (start >= end)
    InvalidRegion,
    /// Region does not start and end on a sector boundary
    Misaligned,
    /// Two regions overlap
    OverlappingRegions,
    /// Two regions have the same name
    DuplicateRegionName,
    /// Chip size doesn't match expected
    ChipSizeMismatch {
        /// Expected chip size
        expected: u32,
        /// Actual chip size
        actual: u32,
    },
    /// The jump page names a region that does not exist
    JumpRegionMissing,
    /// The jump page does not fit in its region or is not page aligned
    JumpPageOutOfRange,
    /// The default jump target names a region that does not exist
    JumpTargetMissing,
    /// An explicit protection mask is not ten hex bytes
    InvalidMask,
    /// Failed to parse layout file
    ParseError,
    /// I/O error
    IoError,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegionOutOfBounds => write!(f, "region extends beyond chip size"),
            Self::InvalidRegion => write!(f, "invalid region bounds"),
            Self::Misaligned => write!(f, "region is not sector aligned"),
            Self::OverlappingRegions => write!(f, "overlapping regions"),
            Self::DuplicateRegionName => write!(f, "duplicate region name"),
            Self::ChipSizeMismatch { expected, actual } => {
                write!(
                    f,
                    "chip size mismatch: expected {} bytes, got {} bytes",
                    expected, actual
                )
            }
            Self::JumpRegionMissing => write!(f, "jump region not found"),
            Self::JumpPageOutOfRange => write!(f, "jump page does not fit its region"),
            Self::JumpTargetMissing => write!(f, "default jump target region not found"),
            Self::InvalidMask => write!(f, "protection mask must be 10 hex bytes"),
            Self::ParseError => write!(f, "failed to parse layout"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LayoutError {}
