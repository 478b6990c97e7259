//! qpsram-core - Transfer engine for QSPI-attached PSRAM
//!
//! This crate drives an external PSRAM chip through a Quad-SPI controller that
//! switches between a hardware "auto" mode (memory-mapped loads and stores)
//! and a software "manual" mode (explicit command sequences). It is designed
//! to be `no_std` compatible so it can run directly on the microcontroller.
//!
//! The controller and DMA register layouts are not part of this crate. They
//! are reached through the [`controller::QspiController`] and
//! [`controller::DmaController`] traits.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`, the RON
//!   profile database and `std::error::Error`)
//! - `alloc` - Enable heap allocation
//!
//! # Example
//!
//! ```ignore
//! use qpsram_core::{EngineConfig, Psram, profile::APS6404L_3SQR};
//!
//! let mut psram = Psram::init(qspi, dma, APS6404L_3SQR, EngineConfig::default())?;
//! psram.write_blocking(0x0A00_0000, &[1, 2, 3, 4], 1, 4)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod bus;
pub mod controller;
pub mod error;
pub mod profile;
pub mod psram;
pub mod shared;
pub mod transfer;

pub use error::{Error, Result};
pub use psram::{EngineConfig, Psram};
pub use shared::SharedPsram;
