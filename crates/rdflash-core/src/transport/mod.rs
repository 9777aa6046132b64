//! Transport and delay abstractions
//!
//! The RD board exposes its flash behind a single SPI chip select. Every
//! protocol step is one full-duplex exchange: the host clocks out N bytes and
//! receives N bytes back. There is no busy flag to poll, so completion of
//! erase and program operations is awaited with fixed delays provided by a
//! [`Delay`] implementation.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{Error, Result};

/// Full-duplex byte exchange with the RD board
///
/// Implementations must return exactly as many bytes as they were given.
/// Anything else is reported as [`Error::TransportFailure`] by
/// [`exchange_checked`]; transports are never retried.
///
/// ## Example: emulator
///
/// ```ignore
/// impl Transport for Emulator {
///     fn exchange(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
///         let mut rx = vec![0u8; tx.len()];
///         self.handle(tx, &mut rx);
///         Ok(rx)
///     }
/// }
/// ```
pub trait Transport {
    /// Perform one exchange, returning the bytes clocked in
    fn exchange(&mut self, tx: &[u8]) -> Result<Vec<u8>>;

    /// Short name used in log messages
    fn name(&self) -> &'static str {
        "transport"
    }

    /// Largest single exchange this transport can carry, in bytes
    fn max_exchange_len(&self) -> usize {
        usize::MAX
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        (**self).exchange(tx)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn max_exchange_len(&self) -> usize {
        (**self).max_exchange_len()
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        (**self).exchange(tx)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn max_exchange_len(&self) -> usize {
        (**self).max_exchange_len()
    }
}

/// Exchange `tx` and insist on a full-length response
///
/// Both TX and RX are hex-dumped at trace level.
pub fn exchange_checked<T: Transport + ?Sized>(transport: &mut T, tx: &[u8]) -> Result<Vec<u8>> {
    trace_dump("TX", tx);
    let rx = transport.exchange(tx)?;
    if rx.len() < tx.len() {
        log::error!(
            "{}: short response ({} of {} bytes)",
            transport.name(),
            rx.len(),
            tx.len()
        );
        return Err(Error::TransportFailure {
            requested: tx.len(),
            received: rx.len(),
        });
    }
    trace_dump("RX", &rx);
    Ok(rx)
}

/// Hex dump a buffer at trace level, 32 bytes per line
fn trace_dump(prefix: &str, buf: &[u8]) {
    if !log::log_enabled!(log::Level::Trace) {
        return;
    }
    for line in buf.chunks(32) {
        let mut hex = alloc::string::String::with_capacity(line.len() * 3);
        for b in line {
            use core::fmt::Write;
            let _ = write!(hex, "{:02X} ", b);
        }
        let ascii: alloc::string::String = line
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect();
        log::trace!("{} | {:<96} |{}|", prefix, hex, ascii);
    }
}

/// Fixed-delay capability used to wait for erase and program completion
pub trait Delay {
    /// Block for at least `us` microseconds
    fn delay_us(&mut self, us: u32);
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

impl<D: Delay + ?Sized> Delay for Box<D> {
    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Delay that returns immediately
///
/// Useful with emulated transports where operations complete instantly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn delay_us(&mut self, _us: u32) {}
}

/// Delay backed by `std::thread::sleep`
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

#[cfg(feature = "std")]
impl Delay for StdDelay {
    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

/// Delay that records every request instead of sleeping
///
/// The total is what a real run would have spent waiting.
#[derive(Debug, Default, Clone)]
pub struct RecordingDelay {
    /// Every requested delay in microseconds, in order
    pub requests: Vec<u32>,
}

impl RecordingDelay {
    /// Sum of all requested delays in microseconds
    pub fn total_us(&self) -> u64 {
        self.requests.iter().map(|&us| us as u64).sum()
    }
}

impl Delay for RecordingDelay {
    fn delay_us(&mut self, us: u32) {
        self.requests.push(us);
    }
}
