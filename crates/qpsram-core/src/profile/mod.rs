//! PSRAM device profiles
//!
//! This module provides the `DeviceProfile` type, the feature flags that
//! describe device quirks, and built-in profiles for the supported parts.
//! With the `std` feature, profiles can also be loaded from RON files.

#[cfg(feature = "std")]
mod database;
mod features;
mod types;

#[cfg(feature = "std")]
pub use database::{NamedProfile, ProfileDatabase, ProfileDbError};
pub use features::ProfileFeatures;
pub use types::{
    DeviceId, DeviceProfile, PhaseWidths, ReadIdResponse, WrapSize, MAX_CHIP_SELECTS,
};

use crate::bus::{opcodes, AddressWidth, BusWidth};

/// AP Memory manufacturer ID
pub const APMEMORY_MFID: u8 = 0x0D;
/// Known-good-die pass value for AP Memory parts
pub const APMEMORY_KGD_PASS: u8 = 0x5D;
/// Memory-mapped window of the PSRAM controller
pub const PSRAM_BASE_ADDRESS: u32 = 0x0A00_0000;

const APMEMORY_QPI_FEATURES: ProfileFeatures = ProfileFeatures::QPI
    .union(ProfileFeatures::HALF_SLEEP)
    .union(ProfileFeatures::BURST_TOGGLE)
    .union(ProfileFeatures::MODE_REG_WRAP);

/// APS6404L-3SQR, 64 Mbit, QPI
pub const APS6404L_3SQR: DeviceProfile = DeviceProfile {
    id: DeviceId {
        manufacturer: APMEMORY_MFID,
        kgd: APMEMORY_KGD_PASS,
    },
    base_address: PSRAM_BASE_ADDRESS,
    density_bits: 64 * 1024 * 1024,
    page_size: 16,
    burst_wrap: 1024,
    toggle_wrap: 32,
    read_opcode: opcodes::FAST_READ_QUAD,
    write_opcode: opcodes::QUAD_WRITE,
    cmd_ext: 0,
    widths: PhaseWidths::uniform(BusWidth::Quad),
    address_width: AddressWidth::Bits24,
    read_dummy_cycles: 6,
    chip_select: 0,
    interface: BusWidth::Quad,
    features: APMEMORY_QPI_FEATURES,
};

/// APS6404L-3SQR driven over single-wire SPI with Fast Read
pub const APS6404L_3SQR_SPI: DeviceProfile = DeviceProfile {
    read_opcode: opcodes::FAST_READ,
    write_opcode: opcodes::WRITE,
    widths: PhaseWidths::uniform(BusWidth::Single),
    read_dummy_cycles: 8,
    interface: BusWidth::Single,
    features: APMEMORY_QPI_FEATURES.difference(ProfileFeatures::BURST_TOGGLE),
    ..APS6404L_3SQR
};

/// APS1604M-3SQR, 16 Mbit, QPI
pub const APS1604M_3SQR: DeviceProfile = DeviceProfile {
    density_bits: 16 * 1024 * 1024,
    ..APS6404L_3SQR
};

/// A built-in profile with its part name
#[derive(Debug, Clone, Copy)]
pub struct BuiltinProfile {
    /// Part name
    pub name: &'static str,
    /// Profile
    pub profile: DeviceProfile,
}

/// Profiles compiled into the crate
pub const BUILTIN_PROFILES: &[BuiltinProfile] = &[
    BuiltinProfile {
        name: "APS6404L-3SQR",
        profile: APS6404L_3SQR,
    },
    BuiltinProfile {
        name: "APS6404L-3SQR-SPI",
        profile: APS6404L_3SQR_SPI,
    },
    BuiltinProfile {
        name: "APS1604M-3SQR",
        profile: APS1604M_3SQR,
    },
];

/// Find a built-in profile by name (case-insensitive)
pub fn find_builtin(name: &str) -> Option<&'static BuiltinProfile> {
    BUILTIN_PROFILES
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
}
