//! QSPI bus types
//!
//! Bus widths, address widths, element sizes, the PSRAM command set and the
//! two command/address phase encodings.

mod address;
pub mod opcodes;
mod phase;
mod width;

pub use address::AddressWidth;
pub use phase::{packed_header, swap_address, PhaseEncoding, MAX_PACKED_HEADER};
pub use width::{BusWidth, ElementSize};

/// Direction of a data phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Data flows from the device into memory
    Read,
    /// Data flows from memory to the device
    Write,
}
