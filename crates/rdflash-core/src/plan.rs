//! Operation plan
//!
//! Everything a run will do is collected into an [`OperationPlan`] and
//! checked before the device is touched. A rejected plan performs no
//! exchange at all.
//!
//! The plan is generic over the file handle type `P` (a path in the CLI) so
//! that this crate stays free of `std`.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{Conflict, Error, Result};
use crate::layout::{Layout, Region};

/// Write one region from a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest<P> {
    /// Region name
    pub region: String,
    /// Where the image comes from
    pub source: P,
}

/// Dump one region (or the whole chip) to a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRequest<P> {
    /// Region name, `None` for the whole chip
    pub region: Option<String>,
    /// Where the bytes go
    pub output: P,
    /// Prepend a timestamp line
    pub timestamp: bool,
}

/// Where the jump page should point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    /// Start of the layout's default target region
    Default,
    /// Explicit address
    Address(u32),
}

impl JumpTarget {
    /// Address to hand to the encoder, `None` for the layout default
    pub fn address(self) -> Option<u32> {
        match self {
            JumpTarget::Default => None,
            JumpTarget::Address(addr) => Some(addr),
        }
    }
}

/// All operations requested for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan<P> {
    /// Regions to write
    pub writes: Vec<WriteRequest<P>>,
    /// Regions to dump
    pub dumps: Vec<DumpRequest<P>>,
    /// Jump page to write
    pub jump: Option<JumpTarget>,
}

impl<P> Default for OperationPlan<P> {
    fn default() -> Self {
        Self {
            writes: Vec::new(),
            dumps: Vec::new(),
            jump: None,
        }
    }
}

impl<P: PartialEq> OperationPlan<P> {
    /// Create an empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the plan erases anything
    pub fn is_destructive(&self) -> bool {
        !self.writes.is_empty() || self.jump.is_some()
    }

    /// Reject plans that cannot run as a whole
    pub fn validate(&self, layout: &Layout) -> Result<()> {
        for write in &self.writes {
            layout.region(&write.region)?;
        }
        for dump in &self.dumps {
            if let Some(name) = &dump.region {
                layout.region(name)?;
            }
        }

        if self.is_destructive() && !self.dumps.is_empty() {
            return Err(Error::ConflictingOperationRequested(Conflict::ReadAndWrite));
        }

        for (i, a) in self.writes.iter().enumerate() {
            if self.writes[i + 1..]
                .iter()
                .any(|b| a.region.eq_ignore_ascii_case(&b.region))
            {
                return Err(Error::ConflictingOperationRequested(Conflict::DuplicateWrite));
            }
        }

        if self.jump.is_some()
            && self
                .writes
                .iter()
                .any(|w| w.region.eq_ignore_ascii_case(&layout.jump.region))
        {
            return Err(Error::ConflictingOperationRequested(
                Conflict::JumpRegionWrittenTwice,
            ));
        }

        for (i, a) in self.dumps.iter().enumerate() {
            if self.dumps[i + 1..].iter().any(|b| a.output == b.output) {
                return Err(Error::ConflictingOperationRequested(Conflict::DuplicateOutput));
            }
        }

        Ok(())
    }

    /// Every region whose protection has to be lifted, jump region included
    pub fn regions_to_unlock<'l>(&self, layout: &'l Layout) -> Result<Vec<&'l Region>> {
        let mut regions = self
            .writes
            .iter()
            .map(|w| layout.region(&w.region))
            .collect::<Result<Vec<_>>>()?;
        if self.jump.is_some() {
            regions.push(layout.jump_region()?);
        }
        Ok(regions)
    }
}
