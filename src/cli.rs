//! CLI argument parsing

use crate::transports;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the transport argument
fn transport_help() -> String {
    format!(
        "Transport to use [available: {}]",
        transports::transport_names_short()
    )
}

#[derive(Parser)]
#[command(name = "rdflash")]
#[command(author, version, about = "RD board boot flash programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Region layout: "legacy", "current" or a TOML layout file
    #[arg(long, global = true, default_value = "current")]
    pub layout: String,

    /// Transport, optionally with options (e.g. linux_spi:dev=/dev/spidev32765.0)
    #[arg(short = 'p', long, global = true, default_value = transports::DEFAULT_TRANSPORT, help = transport_help())]
    pub transport: String,

    /// Bytes per read command during verify and dumps
    #[arg(long, global = true, value_parser = parse_hex_u32)]
    pub chunk_size: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show identity, firmware version, protection and jump target
    Info {
        /// Decode the protection register block by block
        #[arg(long)]
        decode: bool,
    },

    /// Write images into regions
    Write {
        /// Region to write (repeat together with --input)
        #[arg(short, long, required = true)]
        region: Vec<String>,

        /// Image for the matching --region
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Also write the jump page, optionally to an explicit address
        #[arg(long, num_args = 0..=1, value_parser = parse_hex_u32)]
        jump: Option<Option<u32>>,
    },

    /// Write only the jump page
    Jump {
        /// Boot address (defaults to the start of the golden region)
        #[arg(long, value_parser = parse_hex_u32)]
        target: Option<u32>,
    },

    /// Dump a region or the whole chip to a file
    Read {
        /// Region to dump
        #[arg(short, long, required_unless_present = "all", conflicts_with = "all")]
        region: Option<String>,

        /// Dump the whole chip
        #[arg(long)]
        all: bool,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Prepend a timestamp line to the output
        #[arg(long)]
        timestamp: bool,
    },

    /// Show the protection register, optionally unlocking regions
    Bpr {
        /// Regions to unlock (comma-separated)
        #[arg(long, value_delimiter = ',')]
        regions: Vec<String>,
    },

    /// Show the active region layout
    Layout {
        /// Print as TOML instead of a table
        #[arg(long)]
        toml: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x0B0000"), Ok(0x0B_0000));
        assert_eq!(parse_hex_u32("0X20"), Ok(0x20));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("golden").is_err());
    }

    #[test]
    fn test_write_with_bare_jump() {
        let cli = Cli::try_parse_from([
            "rdflash", "write", "--region", "golden", "--input", "g.bin", "--jump",
        ])
        .unwrap();
        match cli.command {
            Commands::Write { region, input, jump } => {
                assert_eq!(region, ["golden"]);
                assert_eq!(input, [PathBuf::from("g.bin")]);
                assert_eq!(jump, Some(None));
            }
            _ => panic!("expected write"),
        }
    }

    #[test]
    fn test_write_with_jump_address() {
        let cli = Cli::try_parse_from([
            "rdflash", "-p", "dummy", "write", "-r", "primary", "-i", "p.bin", "--jump", "0x0",
        ])
        .unwrap();
        assert_eq!(cli.transport, "dummy");
        match cli.command {
            Commands::Write { jump, .. } => assert_eq!(jump, Some(Some(0))),
            _ => panic!("expected write"),
        }
    }

    #[test]
    fn test_read_requires_region_or_all() {
        assert!(Cli::try_parse_from(["rdflash", "read", "-o", "out.bin"]).is_err());
        assert!(
            Cli::try_parse_from(["rdflash", "read", "--all", "-r", "primary", "-o", "x"]).is_err()
        );
        assert!(Cli::try_parse_from(["rdflash", "read", "--all", "-o", "x"]).is_ok());
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "rdflash", "bpr", "--regions", "primary,golden", "--layout", "legacy", "-vv",
            "--chunk-size", "0x100",
        ])
        .unwrap();
        assert_eq!(cli.layout, "legacy");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.chunk_size, Some(0x100));
        match cli.command {
            Commands::Bpr { regions } => assert_eq!(regions, ["primary", "golden"]),
            _ => panic!("expected bpr"),
        }
    }
}
