//! Transport registration and dispatch
//!
//! This module provides a centralized registry for all transports, with
//! support for feature-gated inclusion and dynamic help text generation.

use rdflash_core::transport::{Delay, Transport};

/// Transport used when `-p` is not given
#[cfg(feature = "linux-spi")]
pub const DEFAULT_TRANSPORT: &str = "linux_spi";
#[cfg(not(feature = "linux-spi"))]
pub const DEFAULT_TRANSPORT: &str = "dummy";

/// Information about a transport
pub struct TransportInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available transports (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_transports() -> Vec<TransportInfo> {
    let mut transports = Vec::new();

    #[cfg(feature = "linux-spi")]
    transports.push(TransportInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        description: "Linux spidev interface (dev=/dev/spidevX.Y,spispeed=<kHz>,mode=<0-3>)",
    });

    #[cfg(feature = "dummy")]
    transports.push(TransportInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory RD board emulator (image=<file>,id=<hex>,fw=<n>,bpr=<hex>)",
    });

    transports
}

/// Generate help text listing all available transports
pub fn transport_help() -> String {
    let transports = available_transports();

    if transports.is_empty() {
        return "No transports available (recompile with transport features enabled)".to_string();
    }

    let mut help = String::from("Available transports:\n");
    for t in &transports {
        help.push_str(&format!("  {:10} - {}\n", t.name, t.description));
    }
    help
}

/// Generate a short list of transport names for CLI help
pub fn transport_names_short() -> String {
    let transports = available_transports();
    let names: Vec<&str> = transports.iter().map(|t| t.name).collect();
    names.join(", ")
}

/// Resolve a name or alias to the canonical transport name
pub fn find_transport(name: &str) -> Option<&'static str> {
    available_transports()
        .into_iter()
        .find(|t| t.name == name || t.aliases.iter().any(|a| *a == name))
        .map(|t| t.name)
}

/// An opened transport together with the delay it needs
pub struct OpenTransport {
    pub transport: Box<dyn Transport>,
    pub delay: Box<dyn Delay>,
}

/// Open the transport described by `spec`
///
/// The string can be just the name (e.g., "dummy") or include options
/// (e.g., "linux_spi:dev=/dev/spidev1.0,spispeed=500").
pub fn open_transport(spec: &str) -> Result<OpenTransport, Box<dyn std::error::Error>> {
    let (name, options) = parse_transport_string(spec);

    let canonical_name = match find_transport(name) {
        Some(n) => n,
        None => return Err(unknown_transport_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "linux-spi")]
        "linux_spi" => {
            log::info!("Opening Linux SPI transport...");

            let spi = rdflash_linux_spi::open_linux_spi(&options).map_err(|e| {
                format!(
                    "Failed to open Linux SPI transport: {}\n\
                     Make sure the device exists and you have read/write permissions.",
                    e
                )
            })?;

            Ok(OpenTransport {
                transport: Box::new(spi),
                delay: Box::new(rdflash_core::transport::StdDelay),
            })
        }

        #[cfg(feature = "dummy")]
        "dummy" => {
            let rd = open_dummy(&options)?;
            Ok(OpenTransport {
                transport: Box::new(rd),
                delay: Box::new(rdflash_core::transport::NoDelay),
            })
        }

        _ => Err(unknown_transport_error(name)),
    }
}

/// Build the emulator, preloading `image=<file>` if given
#[cfg(feature = "dummy")]
pub fn open_dummy(
    options: &[(&str, &str)],
) -> Result<rdflash_dummy::DummyRd, Box<dyn std::error::Error>> {
    use rdflash_dummy::{parse_options, DummyRd};

    let config =
        parse_options(options).map_err(|e| format!("Invalid dummy parameters: {}", e))?;

    let rd = match options.iter().find(|(k, _)| *k == "image") {
        Some((_, path)) => {
            let data = std::fs::read(path)
                .map_err(|e| format!("Failed to read dummy image {}: {}", path, e))?;
            log::info!("dummy: preloaded {} bytes from {}", data.len(), path);
            DummyRd::with_data(config, &data)
        }
        None => DummyRd::new(config),
    };
    Ok(rd)
}

/// Parse a transport string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_transport_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

fn unknown_transport_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown transport: {}\n\n", name);
    msg.push_str(&transport_help());
    msg.into()
}
