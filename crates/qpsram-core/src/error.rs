//! Error types for qpsram-core
//!
//! This module provides a no_std compatible error type shared by the blocking
//! and DMA transfer paths and the device commands.

use core::fmt;

/// Core error type - no_std compatible, Copy so it can cross the ISR boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Argument errors
    /// Element size is not 1, 2 or 4 bytes
    InvalidSize,
    /// Buffer address is null
    NullBuffer,
    /// Buffer is shorter than `count * elem_size`
    BufferTooSmall,
    /// Address range lies outside the device density
    OutOfRange,

    // State errors
    /// A DMA transfer is already in flight
    Busy,
    /// Device is not initialized (or is sleeping)
    NotInitialized,

    // Device errors
    /// Read ID does not match the device profile
    DeviceMismatch {
        /// Manufacturer ID returned by the device
        manufacturer: u8,
        /// Known-good-die byte returned by the device
        kgd: u8,
    },
    /// Device profile is inconsistent
    InvalidProfile,

    // Hardware errors
    /// A hardware status condition was not reached in time
    Timeout,
    /// DMA channel configuration was rejected
    DmaConfig,
    /// A chunk of a chained DMA transfer could not be issued
    Failed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSize => write!(f, "element size must be 1, 2 or 4 bytes"),
            Self::NullBuffer => write!(f, "buffer address is null"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::OutOfRange => write!(f, "address range outside PSRAM density"),
            Self::Busy => write!(f, "DMA transfer in progress"),
            Self::NotInitialized => write!(f, "PSRAM not initialized"),
            Self::DeviceMismatch { manufacturer, kgd } => write!(
                f,
                "device ID mismatch: MFID 0x{:02X}, KGD 0x{:02X}",
                manufacturer, kgd
            ),
            Self::InvalidProfile => write!(f, "invalid device profile"),
            Self::Timeout => write!(f, "QSPI controller timed out"),
            Self::DmaConfig => write!(f, "DMA channel configuration failed"),
            Self::Failed => write!(f, "DMA transfer failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_display_mismatch() {
        let err = Error::DeviceMismatch {
            manufacturer: 0x0D,
            kgd: 0x55,
        };
        assert_eq!(
            err.to_string(),
            "device ID mismatch: MFID 0x0D, KGD 0x55"
        );
    }
}
