//! Progress reporting
//!
//! Callbacks are advisory. The engine never depends on what a reporter
//! does with them.

use super::WriteReport;

/// Callback for progress reporting during writes and dumps
pub trait WriteProgress {
    /// Called when starting to erase `sectors` sectors
    fn erasing(&mut self, sectors: usize);

    /// Called after each sector is erased
    fn erase_progress(&mut self, sectors_erased: usize);

    /// Called when starting to program `bytes` bytes
    fn writing(&mut self, bytes: usize);

    /// Called after each page is programmed
    fn write_progress(&mut self, bytes_written: usize);

    /// Called when starting to read `bytes` bytes (verify or dump)
    fn reading(&mut self, bytes: usize);

    /// Called after each chunk is read
    fn read_progress(&mut self, bytes_read: usize);

    /// Called when a write has been verified
    fn complete(&mut self, report: &WriteReport);
}

/// A no-op progress reporter
pub struct NoProgress;

impl WriteProgress for NoProgress {
    fn erasing(&mut self, _sectors: usize) {}
    fn erase_progress(&mut self, _sectors_erased: usize) {}
    fn writing(&mut self, _bytes: usize) {}
    fn write_progress(&mut self, _bytes_written: usize) {}
    fn reading(&mut self, _bytes: usize) {}
    fn read_progress(&mut self, _bytes_read: usize) {}
    fn complete(&mut self, _report: &WriteReport) {}
}
