//! Subsystem select codes and flash opcodes
//!
//! The first byte of every exchange selects a subsystem inside the RD
//! firmware; for the flash subsystem the second byte is passed straight to
//! the SST26 SPI flash.

// ============================================================================
// Subsystems
// ============================================================================

/// Flash subsystem: remaining bytes are forwarded to the SPI flash
pub const SUBSYSTEM_FLASH: u8 = 0x02;
/// Firmware version register
pub const SUBSYSTEM_VERSION: u8 = 0x07;

// ============================================================================
// Flash opcodes
// ============================================================================

/// Read JEDEC ID (manufacturer, memory type, device)
pub const RDID: u8 = 0x9F;
/// Write Enable - required before any erase, program or BPR write
pub const WREN: u8 = 0x06;
/// Erase one 4 KiB sector
pub const SE: u8 = 0x20;
/// Program up to one page
pub const PP: u8 = 0x02;
/// Read data
pub const READ: u8 = 0x03;
/// Read Block Protection Register
pub const RBPR: u8 = 0x72;
/// Write Block Protection Register
pub const WBPR: u8 = 0x42;

// ============================================================================
// Sizes
// ============================================================================

/// Length of the subsystem + opcode prefix
pub const PREFIX_LEN: usize = 2;
/// Length of the address field
pub const ADDR_LEN: usize = 3;
/// Length of the identity response
pub const ID_LEN: usize = 3;
/// Length of the block protection register
pub const BPR_LEN: usize = 10;
