//! CLI command implementations
//!
//! Every command runs on a [`FlashSession`](rdflash_core::flash::FlashSession)
//! over whatever transport was selected, so the same code drives real
//! hardware and the emulator.

pub mod bpr;
pub mod info;
pub mod layout;
pub mod progress;
pub mod read;
pub mod write;

/// Format a byte count as B, KiB or MiB
pub fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 && bytes.is_multiple_of(1024 * 1024) {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes.is_multiple_of(1024) {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
