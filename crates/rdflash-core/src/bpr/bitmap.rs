//! The 80-bit block protection bitmap

use core::fmt;
use core::ops::{BitAnd, Not};

use crate::protocol::opcodes::BPR_LEN;

/// Contents of the SST26 block protection register
///
/// Stored in wire order: byte 0 holds bits 79..72 and byte 9 holds bits
/// 7..0. A set bit means the corresponding block is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtectionBitmap([u8; BPR_LEN]);

impl ProtectionBitmap {
    /// Number of bits in the register
    pub const BITS: u8 = (BPR_LEN * 8) as u8;

    /// Bitmap with every bit set
    pub const ALL_SET: Self = Self([0xFF; BPR_LEN]);

    /// Bitmap with every bit clear
    pub const NONE: Self = Self([0x00; BPR_LEN]);

    /// Create a bitmap from register bytes in wire order
    pub const fn new(bytes: [u8; BPR_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a bitmap from a slice, which must be exactly 10 bytes long
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; BPR_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Parse ten hex bytes such as `"55 00 BF FF FF FF FF FF FC 00"`
    ///
    /// Separators (spaces, `_`, `:`) and `0x` prefixes are optional.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let mut bytes = [0u8; BPR_LEN];
        let mut count = 0usize;
        let mut high: Option<u8> = None;
        let mut chars = s.trim().chars().peekable();

        while let Some(c) = chars.next() {
            if c == '0' && matches!(chars.peek(), Some('x') | Some('X')) && high.is_none() {
                chars.next();
                continue;
            }
            if c.is_whitespace() || c == '_' || c == ':' || c == ',' {
                if high.is_some() {
                    return None;
                }
                continue;
            }
            let nibble = c.to_digit(16)? as u8;
            match high.take() {
                None => high = Some(nibble),
                Some(h) => {
                    if count == BPR_LEN {
                        return None;
                    }
                    bytes[count] = (h << 4) | nibble;
                    count += 1;
                }
            }
        }

        if count == BPR_LEN && high.is_none() {
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// Register bytes in wire order
    pub fn as_bytes(&self) -> &[u8; BPR_LEN] {
        &self.0
    }

    fn locate(bit: u8) -> (usize, u8) {
        debug_assert!(bit < Self::BITS);
        (BPR_LEN - 1 - (bit / 8) as usize, bit % 8)
    }

    /// Value of bit `bit` (0..80)
    pub fn bit(&self, bit: u8) -> bool {
        let (byte, shift) = Self::locate(bit);
        (self.0[byte] >> shift) & 1 != 0
    }

    /// Set bit `bit`
    pub fn set_bit(&mut self, bit: u8) {
        let (byte, shift) = Self::locate(bit);
        self.0[byte] |= 1 << shift;
    }

    /// Clear bit `bit`
    pub fn clear_bit(&mut self, bit: u8) {
        let (byte, shift) = Self::locate(bit);
        self.0[byte] &= !(1 << shift);
    }

    /// True if no bit is set
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Number of set bits
    pub fn count(&self) -> u32 {
        self.0.iter().map(|b| b.count_ones()).sum()
    }
}

impl Default for ProtectionBitmap {
    fn default() -> Self {
        Self::NONE
    }
}

impl BitAnd for ProtectionBitmap {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        let mut out = self.0;
        for (o, r) in out.iter_mut().zip(rhs.0) {
            *o &= r;
        }
        Self(out)
    }
}

impl Not for ProtectionBitmap {
    type Output = Self;

    fn not(self) -> Self {
        Self(self.0.map(|b| !b))
    }
}

impl fmt::Display for ProtectionBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "0x{:02X}", b)?;
        }
        Ok(())
    }
}
