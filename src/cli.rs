//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse an element size of 1, 2 or 4 bytes
fn parse_elem_size(s: &str) -> Result<u8, String> {
    match s {
        "1" => Ok(1),
        "2" => Ok(2),
        "4" => Ok(4),
        _ => Err(format!("Element size must be 1, 2 or 4, got {}", s)),
    }
}

#[derive(Parser)]
#[command(name = "qpsram")]
#[command(author, version, about = "QSPI PSRAM transfer tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to profile database directory or file (contains .ron files)
    /// Defaults to looking in ./profiles/ and /usr/share/qpsram/profiles/
    #[arg(long, global = true)]
    pub profile_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Device profile name
    #[arg(short, long, default_value = "APS6404L-3SQR")]
    pub device: String,

    /// Backing file for the emulated memory array, loaded before and saved
    /// after the command
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Move data with DMA chains instead of the blocking FIFO path
    #[arg(long)]
    pub dma: bool,

    /// Largest DMA chunk in bytes (defaults to the profile page size)
    #[arg(long, value_parser = parse_hex_u32)]
    pub dma_chunk: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the device and show its profile
    Info {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Read PSRAM contents to file
    Read {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Device offset to start at (hex, e.g., 0x1000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Number of bytes to read (defaults to the rest of the device)
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: Option<u32>,

        /// Element size in bytes
        #[arg(long, value_parser = parse_elem_size, default_value = "1")]
        elem_size: u8,
    },

    /// Write file to PSRAM
    Write {
        #[command(flatten)]
        device: DeviceArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Device offset to start at (hex, e.g., 0x1000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Element size in bytes
        #[arg(long, value_parser = parse_elem_size, default_value = "1")]
        elem_size: u8,

        /// Verify after writing
        #[arg(long, default_value = "true")]
        verify: bool,
    },

    /// Exercise transfers and device commands against the emulator
    Selftest {
        #[command(flatten)]
        device: DeviceArgs,

        /// Bytes per transfer pattern
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0x10000")]
        length: u32,
    },

    /// List known device profiles
    ListDevices {
        /// Filter by vendor name
        #[arg(long)]
        vendor: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex_u32("0XFF"), Ok(0xFF));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_parse_elem_size() {
        assert_eq!(parse_elem_size("4"), Ok(4));
        assert!(parse_elem_size("3").is_err());
    }

    #[test]
    fn test_cli_parses_write() {
        let cli = Cli::parse_from([
            "qpsram", "-v", "write", "-i", "data.bin", "-a", "0x400", "--dma",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Write {
                device, address, ..
            } => {
                assert_eq!(address, 0x400);
                assert!(device.dma);
                assert_eq!(device.device, "APS6404L-3SQR");
            }
            _ => panic!("expected write"),
        }
    }
}
