//! Command sequences for the RD board
//!
//! Each function performs exactly the exchanges it names. Waiting for erase
//! and program completion is left to the caller since the board offers no
//! status register to poll.

use crate::bpr::ProtectionBitmap;
use crate::error::{Error, Result};
use crate::transport::{exchange_checked, Transport};

use super::command::Command;
use super::opcodes;

/// Run one command and return its response bytes
pub fn execute<T: Transport + ?Sized>(
    transport: &mut T,
    cmd: &Command<'_>,
) -> Result<alloc::vec::Vec<u8>> {
    let rx = exchange_checked(transport, &cmd.encode())?;
    Ok(cmd.response(&rx).to_vec())
}

/// Read the 3-byte identity code of the flash
pub fn read_identity<T: Transport + ?Sized>(transport: &mut T) -> Result<[u8; 3]> {
    let id = execute(transport, &Command::read_reg(opcodes::RDID, opcodes::ID_LEN))?;
    Ok([id[0], id[1], id[2]])
}

/// Send the Write Enable command
pub fn write_enable<T: Transport + ?Sized>(transport: &mut T) -> Result<()> {
    execute(transport, &Command::simple(opcodes::WREN)).map(|_| ())
}

/// Issue a sector erase at `addr`
///
/// Does not send WREN and does not wait.
pub fn sector_erase<T: Transport + ?Sized>(transport: &mut T, addr: u32) -> Result<()> {
    execute(transport, &Command::erase(opcodes::SE, addr)).map(|_| ())
}

/// Issue a page program of `data` at `addr`
///
/// Does not send WREN and does not wait. `data` must not cross a page
/// boundary.
pub fn page_program<T: Transport + ?Sized>(transport: &mut T, addr: u32, data: &[u8]) -> Result<()> {
    execute(transport, &Command::write(opcodes::PP, addr, data)).map(|_| ())
}

/// Read `buf.len()` bytes starting at `addr` in a single exchange
pub fn read<T: Transport + ?Sized>(transport: &mut T, addr: u32, buf: &mut [u8]) -> Result<()> {
    let data = execute(transport, &Command::read(opcodes::READ, addr, buf.len()))?;
    buf.copy_from_slice(&data);
    Ok(())
}

/// Read the volatile block protection register
pub fn read_bpr<T: Transport + ?Sized>(transport: &mut T) -> Result<ProtectionBitmap> {
    let raw = execute(transport, &Command::read_reg(opcodes::RBPR, opcodes::BPR_LEN))?;
    ProtectionBitmap::from_slice(&raw).ok_or(Error::TransportFailure {
        requested: opcodes::BPR_LEN,
        received: raw.len(),
    })
}

/// Write the block protection register
///
/// Automatically sends WREN before writing.
pub fn write_bpr<T: Transport + ?Sized>(
    transport: &mut T,
    bitmap: &ProtectionBitmap,
) -> Result<()> {
    write_enable(transport)?;
    execute(transport, &Command::write_reg(opcodes::WBPR, bitmap.as_bytes())).map(|_| ())
}

/// Read the version number of the running RD firmware
pub fn read_firmware_version<T: Transport + ?Sized>(transport: &mut T) -> Result<u8> {
    let cmd = Command::simple(0x00).with_subsystem(opcodes::SUBSYSTEM_VERSION);
    let rx = exchange_checked(transport, &cmd.encode())?;
    Ok(rx[1])
}
