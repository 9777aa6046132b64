//! Chip identity guard
//!
//! Every destructive operation is preceded by an identity check. A device
//! that does not answer with the expected code is never touched.

use crate::error::{Error, Result};
use crate::protocol;
use crate::transport::Transport;

/// Read the identity and fail unless it equals `expected`
pub fn verify_identity<T: Transport + ?Sized>(transport: &mut T, expected: [u8; 3]) -> Result<()> {
    let found = protocol::read_identity(transport)?;
    if found != expected {
        log::error!(
            "bad chip id: {:02X} {:02X} {:02X}",
            found[0],
            found[1],
            found[2]
        );
        return Err(Error::HardwareIdentityMismatch { expected, found });
    }
    log::debug!(
        "chip id OK: {:02X} {:02X} {:02X}",
        found[0],
        found[1],
        found[2]
    );
    Ok(())
}
