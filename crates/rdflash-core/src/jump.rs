//! Multiboot jump page
//!
//! The FPGA boot loader reads one 256-byte page at the end of the flash to
//! decide which image to load. The page is erased flash (`0xFF`) except for
//! a short header:
//!
//! | offset | bytes | content                         |
//! |--------|-------|---------------------------------|
//! | 0      | 2     | preamble `BD B3`                |
//! | 2      | 4     | control `C4`, 3 reserved `00`   |
//! | 6      | 4     | jump opcode `03`, 3 reserved `00` |
//! | 10     | 3     | target address, big-endian      |
//!
//! Another vendor tool has been seen writing a bit-reversed variant of this
//! page. It is not produced or recognised here.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};
use crate::flash::{FlashSession, NoProgress, WriteProgress, WriteReport};
use crate::transport::{Delay, Transport};

/// Length of the jump page
pub const JUMP_PAGE_LEN: usize = 256;

const PREAMBLE: [u8; 2] = [0xBD, 0xB3];
const CONTROL: u8 = 0xC4;
const JUMP_OPCODE: u8 = 0x03;

/// Largest address the 3-byte target field can hold
pub const MAX_TARGET: u32 = 0x00FF_FFFF;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct JumpHeader {
    preamble: [u8; 2],
    control: u8,
    control_reserved: [u8; 3],
    opcode: u8,
    opcode_reserved: [u8; 3],
    target: [u8; 3],
}

impl JumpHeader {
    fn new(target: u32) -> Self {
        Self {
            preamble: PREAMBLE,
            control: CONTROL,
            control_reserved: [0; 3],
            opcode: JUMP_OPCODE,
            opcode_reserved: [0; 3],
            target: [(target >> 16) as u8, (target >> 8) as u8, target as u8],
        }
    }

    fn is_valid(&self) -> bool {
        self.preamble == PREAMBLE
            && self.control == CONTROL
            && self.control_reserved == [0; 3]
            && self.opcode == JUMP_OPCODE
            && self.opcode_reserved == [0; 3]
    }

    fn target(&self) -> u32 {
        u32::from_be_bytes([0, self.target[0], self.target[1], self.target[2]])
    }
}

/// Build the jump page for `target`
pub fn encode(target: u32) -> Result<[u8; JUMP_PAGE_LEN]> {
    if target > MAX_TARGET {
        return Err(Error::AddressOutOfBounds);
    }
    let mut page = [0xFF; JUMP_PAGE_LEN];
    let header = JumpHeader::new(target);
    page[..core::mem::size_of::<JumpHeader>()].copy_from_slice(header.as_bytes());
    Ok(page)
}

/// Extract the target of a jump page, if `page` holds one
pub fn decode(page: &[u8]) -> Option<u32> {
    let (header, _) = JumpHeader::read_from_prefix(page).ok()?;
    header.is_valid().then(|| header.target())
}

impl<T: Transport, D: Delay> FlashSession<'_, T, D> {
    /// Write the jump page pointing at `target`
    ///
    /// Without a target the start of the layout's default target region is
    /// used. The sector holding the page is erased, so nothing else should
    /// live in the jump region. Protection of the jump region must already be
    /// reconciled.
    pub fn write_jump_sector<P: WriteProgress>(
        &mut self,
        target: Option<u32>,
        progress: &mut P,
    ) -> Result<WriteReport> {
        let layout = &self.config().layout;
        let target = match target {
            Some(addr) => addr,
            None => layout.default_jump_target()?,
        };
        if target >= self.config().geometry.chip_size {
            return Err(Error::AddressOutOfBounds);
        }
        let region = layout.jump_region()?;
        let page = encode(target)?;
        log::info!(
            "Writing jump page at 0x{:06X} -> 0x{:06X}",
            region.start + layout.jump.page_offset,
            target
        );
        self.write_at(region, layout.jump.page_offset, &page, progress)
    }

    /// Read the jump page back and decode its target
    pub fn read_jump_target(&mut self) -> Result<Option<u32>> {
        let layout = &self.config().layout;
        let addr = layout.jump_region()?.start + layout.jump.page_offset;
        let page = self.read_range(addr, JUMP_PAGE_LEN, &mut NoProgress)?;
        Ok(decode(&page))
    }
}
