//! Command/address phase encodings
//!
//! A PSRAM transaction starts with a command and address (optionally an extra
//! byte and read wait cycles). Devices whose command and address use the same
//! bus width accept the whole header as one flat byte stream; others need each
//! phase sent separately with a bus width switch in between.

use heapless::Vec;

use super::{AddressWidth, BusWidth};
use crate::profile::{DeviceProfile, ProfileFeatures};

/// Largest packed header: command, 4 address bytes and 4 dummy bytes
pub const MAX_PACKED_HEADER: usize = 9;

/// How the command and address phases are put on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseEncoding {
    /// Command and address sent as separate phases, each at its own width
    Split {
        /// Width of the command phase
        cmd_width: BusWidth,
        /// Width of the address phase
        addr_width: BusWidth,
    },
    /// Command, address and dummy bytes sent as one byte stream
    Packed {
        /// Width used for the whole header
        flat_width: BusWidth,
    },
}

impl PhaseEncoding {
    /// Select the encoding for a device profile
    ///
    /// Packing is only possible when command and address share a width and
    /// the profile needs neither a 16-bit command nor an extra byte.
    pub fn for_profile(profile: &DeviceProfile) -> Self {
        let widths = &profile.widths;
        let needs_split = widths.instruction != widths.address
            || profile
                .features
                .intersects(ProfileFeatures::CMD_16BIT | ProfileFeatures::EXTRA_BYTE);

        if needs_split {
            Self::Split {
                cmd_width: widths.instruction,
                addr_width: widths.address,
            }
        } else {
            Self::Packed {
                flat_width: widths.instruction,
            }
        }
    }

    /// Returns true for the split encoding
    pub const fn is_split(&self) -> bool {
        matches!(self, Self::Split { .. })
    }
}

/// Swap the outer bytes of a 24-bit address
///
/// Used by devices that expect the address phase least significant byte
/// first when the controller shifts the word out MSB first.
pub const fn swap_address(addr: u32) -> u32 {
    ((addr >> 16) & 0xFF) | (addr & 0xFF00) | ((addr & 0xFF) << 16)
}

/// Build a packed header: `[cmd, address MSB first, dummy bytes]`
pub fn packed_header(
    cmd: u8,
    addr: u32,
    address_width: AddressWidth,
    dummy_bytes: u8,
) -> Vec<u8, MAX_PACKED_HEADER> {
    let mut header = Vec::new();
    let mut addr_bytes = [0u8; 4];
    let n = address_width.encode(addr, &mut addr_bytes);

    // Capacity covers the largest address and dummy_bytes is checked when
    // the profile is validated.
    let _ = header.push(cmd);
    let _ = header.extend_from_slice(&addr_bytes[..n]);
    for _ in 0..dummy_bytes {
        let _ = header.push(0);
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::APS6404L_3SQR;

    #[test]
    fn test_swap_address() {
        assert_eq!(swap_address(0x12_3456), 0x56_3412);
        assert_eq!(swap_address(swap_address(0xAB_CDEF)), 0xAB_CDEF);
    }

    #[test]
    fn test_packed_header_with_dummy() {
        let header = packed_header(0x0B, 0x0A12_3456, AddressWidth::Bits24, 1);
        assert_eq!(header.as_slice(), &[0x0B, 0x12, 0x34, 0x56, 0x00]);
    }

    #[test]
    fn test_encoding_for_profile() {
        let mut profile = APS6404L_3SQR;
        profile.widths.instruction = BusWidth::Quad;
        profile.widths.address = BusWidth::Quad;
        assert_eq!(
            PhaseEncoding::for_profile(&profile),
            PhaseEncoding::Packed {
                flat_width: BusWidth::Quad
            }
        );

        profile.widths.instruction = BusWidth::Single;
        assert_eq!(
            PhaseEncoding::for_profile(&profile),
            PhaseEncoding::Split {
                cmd_width: BusWidth::Single,
                addr_width: BusWidth::Quad
            }
        );

        profile.widths.instruction = BusWidth::Quad;
        profile.features |= ProfileFeatures::CMD_16BIT;
        assert!(PhaseEncoding::for_profile(&profile).is_split());
    }
}
