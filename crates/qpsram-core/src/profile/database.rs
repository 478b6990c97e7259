//! Profile database for runtime loading and lookup
//!
//! This module provides the `ProfileDatabase` type for loading device
//! profiles from RON files at runtime.

use alloc::{string::String, vec::Vec};
use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

use super::types::{DeviceId, DeviceProfile, PhaseWidths};
use super::{find_builtin, ProfileFeatures, BUILTIN_PROFILES, PSRAM_BASE_ADDRESS};
use crate::bus::{AddressWidth, BusWidth};

/// Error type for profile database operations
#[derive(Debug, Error)]
pub enum ProfileDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A profile failed validation
    #[error("Profile {0} is invalid")]
    Invalid(String),
}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Density with human-readable units (for RON parsing)
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub enum Density {
    /// Density in bytes
    B(u32),
    /// Density in kibibytes
    KiB(u32),
    /// Density in mebibytes
    MiB(u32),
    /// Density in megabits, as PSRAM parts are usually sold
    Mbit(u32),
}

impl Density {
    fn to_bits(self) -> u32 {
        match self {
            Density::B(n) => n * 8,
            Density::KiB(n) => n * 1024 * 8,
            Density::MiB(n) => n * 1024 * 1024 * 8,
            Density::Mbit(n) => n * 1024 * 1024,
        }
    }
}

/// Feature flags in RON format
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(default)]
struct FeaturesDef {
    byte_swap: bool,
    cmd_16bit: bool,
    extra_byte: bool,
    qpi: bool,
    half_sleep: bool,
    burst_toggle: bool,
    mode_register_wrap: bool,
}

impl From<FeaturesDef> for ProfileFeatures {
    fn from(def: FeaturesDef) -> Self {
        let mut f = ProfileFeatures::empty();
        f.set(ProfileFeatures::BYTE_SWAP, def.byte_swap);
        f.set(ProfileFeatures::CMD_16BIT, def.cmd_16bit);
        f.set(ProfileFeatures::EXTRA_BYTE, def.extra_byte);
        f.set(ProfileFeatures::QPI, def.qpi);
        f.set(ProfileFeatures::HALF_SLEEP, def.half_sleep);
        f.set(ProfileFeatures::BURST_TOGGLE, def.burst_toggle);
        f.set(ProfileFeatures::MODE_REG_WRAP, def.mode_register_wrap);
        f
    }
}

/// Single device definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct DeviceDef {
    name: String,
    kgd: u8,
    density: Density,
    #[serde(default = "default_base_address")]
    base_address: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
    #[serde(default)]
    burst_wrap: u32,
    #[serde(default)]
    toggle_wrap: u32,
    read_opcode: u8,
    write_opcode: u8,
    #[serde(default)]
    cmd_ext: u8,
    widths: PhaseWidths,
    #[serde(default)]
    address_width: AddressWidth,
    #[serde(default)]
    read_dummy_cycles: u8,
    #[serde(default)]
    chip_select: u8,
    #[serde(default)]
    interface: BusWidth,
    #[serde(default)]
    features: FeaturesDef,
}

fn default_base_address() -> u32 {
    PSRAM_BASE_ADDRESS
}

fn default_page_size() -> u32 {
    16
}

/// Vendor definition containing multiple devices
#[derive(Debug, Clone, serde::Deserialize)]
struct VendorDef {
    vendor: String,
    manufacturer_id: u8,
    devices: Vec<DeviceDef>,
}

// ============================================================================
// Profile database
// ============================================================================

/// A device profile with its vendor and part name
#[derive(Debug, Clone)]
pub struct NamedProfile {
    /// Vendor name
    pub vendor: String,
    /// Part name
    pub name: String,
    /// Profile
    pub profile: DeviceProfile,
}

/// Runtime profile database
#[derive(Debug, Clone, Default)]
pub struct ProfileDatabase {
    profiles: Vec<NamedProfile>,
}

impl ProfileDatabase {
    /// Create an empty profile database
    pub fn new() -> Self {
        Self {
            profiles: Vec::new(),
        }
    }

    /// Create a database holding the built-in profiles
    pub fn with_builtins() -> Self {
        let profiles = BUILTIN_PROFILES
            .iter()
            .map(|p| NamedProfile {
                vendor: String::from("AP Memory"),
                name: String::from(p.name),
                profile: p.profile,
            })
            .collect();
        Self { profiles }
    }

    /// Load device definitions from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, ProfileDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load device definitions from a RON string
    pub fn load_ron(&mut self, content: &str) -> Result<usize, ProfileDbError> {
        let vendor_def: VendorDef = ron::from_str(content)?;
        let count = vendor_def.devices.len();

        for def in vendor_def.devices {
            let profile = DeviceProfile {
                id: DeviceId {
                    manufacturer: vendor_def.manufacturer_id,
                    kgd: def.kgd,
                },
                base_address: def.base_address,
                density_bits: def.density.to_bits(),
                page_size: def.page_size,
                burst_wrap: def.burst_wrap,
                toggle_wrap: def.toggle_wrap,
                read_opcode: def.read_opcode,
                write_opcode: def.write_opcode,
                cmd_ext: def.cmd_ext,
                widths: def.widths,
                address_width: def.address_width,
                read_dummy_cycles: def.read_dummy_cycles,
                chip_select: def.chip_select,
                interface: def.interface,
                features: def.features.into(),
            };
            if profile.validate().is_err() {
                return Err(ProfileDbError::Invalid(def.name));
            }
            self.profiles.push(NamedProfile {
                vendor: vendor_def.vendor.clone(),
                name: def.name,
                profile,
            });
        }

        Ok(count)
    }

    /// Load all RON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ProfileDbError> {
        let mut total = 0;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "ron") {
                total += self.load_file(&path)?;
            }
        }

        Ok(total)
    }

    /// Get all profiles in the database
    pub fn profiles(&self) -> &[NamedProfile] {
        &self.profiles
    }

    /// Get the number of profiles in the database
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Find a profile by part name (case-insensitive)
    ///
    /// Falls back to the built-in profiles when the name is not loaded.
    pub fn find_by_name(&self, name: &str) -> Option<DeviceProfile> {
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.profile)
            .or_else(|| find_builtin(name).map(|p| p.profile))
    }

    /// Find all profiles matching a Read ID response
    pub fn find_by_id(&self, id: DeviceId) -> impl Iterator<Item = &NamedProfile> {
        self.profiles.iter().filter(move |p| p.profile.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APMEMORY_RON: &str = r#"
(
    vendor: "AP Memory",
    manufacturer_id: 0x0D,
    devices: [
        (
            name: "APS6404L-3SQR",
            kgd: 0x5D,
            density: Mbit(64),
            burst_wrap: 1024,
            toggle_wrap: 32,
            read_opcode: 0xEB,
            write_opcode: 0x38,
            widths: (
                instruction: Quad,
                address: Quad,
                extra_byte: Quad,
                dummy: Quad,
                data: Quad,
            ),
            read_dummy_cycles: 6,
            interface: Quad,
            features: (qpi: true, half_sleep: true, burst_toggle: true, mode_register_wrap: true),
        ),
    ],
)
"#;

    #[test]
    fn test_load_ron_matches_builtin() {
        let mut db = ProfileDatabase::new();
        assert_eq!(db.load_ron(APMEMORY_RON).unwrap(), 1);
        assert_eq!(db.len(), 1);

        let loaded = db.find_by_name("aps6404l-3sqr").unwrap();
        assert_eq!(loaded, super::super::APS6404L_3SQR);
    }

    #[test]
    fn test_find_by_id() {
        let db = ProfileDatabase::with_builtins();
        let id = DeviceId {
            manufacturer: 0x0D,
            kgd: 0x5D,
        };
        assert_eq!(db.find_by_id(id).count(), BUILTIN_PROFILES.len());
    }

    #[test]
    fn test_density_beyond_address_width_rejected() {
        let ron = APMEMORY_RON.replace("Mbit(64)", "Mbit(256)");
        let mut db = ProfileDatabase::new();
        assert!(matches!(
            db.load_ron(&ron),
            Err(ProfileDbError::Invalid(_))
        ));
        assert!(db.is_empty());
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let ron = APMEMORY_RON.replace("burst_wrap: 1024,", "burst_wrap: 1024, page_size: 3,");
        let mut db = ProfileDatabase::new();
        match db.load_ron(&ron) {
            Err(ProfileDbError::Invalid(name)) => assert_eq!(name, "APS6404L-3SQR"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
