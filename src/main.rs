//! qpsram - QSPI PSRAM transfer tool
//!
//! Drives the `qpsram-core` transfer engine against an emulated PSRAM chip
//! and QSPI controller. Every command brings the device up exactly as
//! firmware would, then moves data through the blocking FIFO path or a
//! chained DMA transfer.
//!
//! The emulated memory array can be backed by an image file with
//! `--image`, so a `write` followed by a `read` sees the same data.

mod cli;
mod commands;
mod session;

use clap::Parser;
use cli::{Cli, Commands, DeviceArgs};
use qpsram_core::profile::ProfileDatabase;
use session::Session;
use std::path::{Path, PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let db = match load_profile_database(cli.profile_db.as_deref()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load profile database: {}", e);
            std::process::exit(1);
        }
    };

    log::debug!("Loaded {} device profiles", db.len());

    let result = match cli.command {
        Commands::Info { device } => {
            let mut session = open_session(&db, &device)?;
            commands::run_info(&mut session, &db)
        }
        Commands::Read {
            device,
            output,
            address,
            length,
            elem_size,
        } => {
            let mut session = open_session(&db, &device)?;
            commands::run_read(&mut session, &output, address, length, elem_size)
        }
        Commands::Write {
            device,
            input,
            address,
            elem_size,
            verify,
        } => {
            let mut session = open_session(&db, &device)?;
            commands::run_write(&mut session, &input, address, elem_size, verify)
        }
        Commands::Selftest { device, length } => {
            let mut session = open_session(&db, &device)?;
            println!(
                "Selftest on {} ({})",
                device.device,
                if device.dma { "DMA" } else { "blocking" }
            );
            commands::run_selftest(&mut session, length)
        }
        Commands::ListDevices { vendor } => {
            commands::list_devices(&db, vendor.as_deref());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn open_session(
    db: &ProfileDatabase,
    args: &DeviceArgs,
) -> Result<Session, Box<dyn std::error::Error>> {
    let profile = db
        .find_by_name(&args.device)
        .ok_or_else(|| format!("Unknown device: {}", args.device))?;
    log::info!("Using device profile {}", args.device);
    Session::open(profile, args)
}

/// Load the profile database from the specified path or default locations
///
/// The built-in profiles are used when no RON files are found.
fn load_profile_database(
    path: Option<&Path>,
) -> Result<ProfileDatabase, Box<dyn std::error::Error>> {
    let mut db = ProfileDatabase::new();

    if let Some(path) = path {
        // User specified a path
        if path.is_dir() {
            db.load_dir(path)?;
        } else if path.is_file() {
            db.load_file(path)?;
        } else {
            return Err(format!("Profile database path not found: {}", path.display()).into());
        }
    } else {
        // Try default locations, first one wins
        let default_paths = [
            PathBuf::from("profiles"),
            PathBuf::from("/usr/share/qpsram/profiles"),
            PathBuf::from("/usr/local/share/qpsram/profiles"),
        ];

        for dir in &default_paths {
            if !dir.is_dir() {
                continue;
            }
            match db.load_dir(dir) {
                Ok(count) => {
                    log::debug!("Loaded {} profiles from {}", count, dir.display());
                    break;
                }
                Err(e) => {
                    log::warn!("Failed to load profiles from {}: {}", dir.display(), e);
                }
            }
        }
    }

    if db.is_empty() {
        log::debug!("No profile files found, using built-in profiles");
        db = ProfileDatabase::with_builtins();
    }

    Ok(db)
}
