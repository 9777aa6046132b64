//! Command structure for a single exchange

use alloc::vec;
use alloc::vec::Vec;

use super::opcodes::{ADDR_LEN, PREFIX_LEN, SUBSYSTEM_FLASH};

/// A single exchange with the RD board
///
/// The encoded transfer buffer is laid out as
/// `subsystem, opcode, [addr23..16, addr15..8, addr7..0], payload, response space`.
/// The lifetime parameter `'a` ties the command to the payload it borrows.
#[derive(Debug, Clone, Copy)]
pub struct Command<'a> {
    /// Subsystem select byte
    pub subsystem: u8,

    /// Opcode byte (for the version subsystem this is response space)
    pub opcode: u8,

    /// 24-bit address, sent big-endian
    pub address: Option<u32>,

    /// Bytes sent after the header
    pub payload: &'a [u8],

    /// Number of bytes to clock in after the payload
    pub response_len: usize,
}

impl<'a> Command<'a> {
    /// Create a flash command with no address, payload or response (e.g. WREN)
    pub fn simple(opcode: u8) -> Self {
        Self {
            subsystem: SUBSYSTEM_FLASH,
            opcode,
            address: None,
            payload: &[],
            response_len: 0,
        }
    }

    /// Create a register read with no address (e.g. RDID, RBPR)
    pub fn read_reg(opcode: u8, len: usize) -> Self {
        Self {
            response_len: len,
            ..Self::simple(opcode)
        }
    }

    /// Create a register write with no address (e.g. WBPR)
    pub fn write_reg(opcode: u8, data: &'a [u8]) -> Self {
        Self {
            payload: data,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed read (READ)
    pub fn read(opcode: u8, addr: u32, len: usize) -> Self {
        Self {
            address: Some(addr),
            response_len: len,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed write (PP)
    pub fn write(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            address: Some(addr),
            payload: data,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed command with no data (SE)
    pub fn erase(opcode: u8, addr: u32) -> Self {
        Self {
            address: Some(addr),
            ..Self::simple(opcode)
        }
    }

    /// Select a different subsystem
    pub fn with_subsystem(mut self, subsystem: u8) -> Self {
        self.subsystem = subsystem;
        self
    }

    /// Length of subsystem + opcode + address
    pub fn header_len(&self) -> usize {
        PREFIX_LEN + if self.address.is_some() { ADDR_LEN } else { 0 }
    }

    /// Total length of the exchange
    pub fn total_len(&self) -> usize {
        self.header_len() + self.payload.len() + self.response_len
    }

    /// Build the transfer buffer for this command
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.total_len()];
        buf[0] = self.subsystem;
        buf[1] = self.opcode;
        if let Some(addr) = self.address {
            buf[2] = (addr >> 16) as u8;
            buf[3] = (addr >> 8) as u8;
            buf[4] = addr as u8;
        }
        let header_len = self.header_len();
        buf[header_len..header_len + self.payload.len()].copy_from_slice(self.payload);
        buf
    }

    /// Slice the response bytes out of a received buffer
    pub fn response<'r>(&self, rx: &'r [u8]) -> &'r [u8] {
        let start = self.header_len() + self.payload.len();
        &rx[start..start + self.response_len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::opcodes;

    #[test]
    fn test_encode_identity_query() {
        let cmd = Command::read_reg(opcodes::RDID, 3);
        assert_eq!(cmd.encode(), vec![0x02, 0x9F, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_address_big_endian() {
        let cmd = Command::erase(opcodes::SE, 0x0B_1000);
        assert_eq!(cmd.encode(), vec![0x02, 0x20, 0x0B, 0x10, 0x00]);
    }

    #[test]
    fn test_encode_page_program() {
        let data = [0xAA, 0x55];
        let cmd = Command::write(opcodes::PP, 0x3F_FF00, &data);
        assert_eq!(cmd.encode(), vec![0x02, 0x02, 0x3F, 0xFF, 0x00, 0xAA, 0x55]);
    }

    #[test]
    fn test_response_slice() {
        let cmd = Command::read(opcodes::READ, 0x100, 4);
        let rx = [0, 0, 0, 0, 0, 1, 2, 3, 4];
        assert_eq!(cmd.total_len(), 9);
        assert_eq!(cmd.response(&rx), &[1, 2, 3, 4]);
    }
}
