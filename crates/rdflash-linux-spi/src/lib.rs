//! rdflash-linux-spi - Linux spidev transport
//!
//! This crate talks to the RD board's flash controller through the
//! `/dev/spidevX.Y` character device. Every protocol exchange is a single
//! full-duplex `SPI_IOC_MESSAGE(1)` transfer.
//!
//! # Usage with rdflash CLI
//!
//! ```bash
//! # Defaults: /dev/spidev32765.0, mode 3, 1 MHz
//! rdflash info -p linux_spi
//!
//! # Specify device and SPI speed in kHz
//! rdflash info -p linux_spi:dev=/dev/spidev1.0,spispeed=500
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to the device node

pub mod device;
pub mod error;

pub use device::{mode, parse_options, LinuxSpi, LinuxSpiConfig, DEFAULT_DEVICE};
pub use error::{LinuxSpiError, Result};

/// Open a spidev transport from CLI options
///
/// # Options
///
/// - `dev=/dev/spidev32765.0` - device path
/// - `spispeed=1000` - speed in kHz
/// - `mode=3` - SPI mode 0-3
pub fn open_linux_spi(
    options: &[(&str, &str)],
) -> std::result::Result<LinuxSpi, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    Ok(LinuxSpi::open(&config)?)
}
