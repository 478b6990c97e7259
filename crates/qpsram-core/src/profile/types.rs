//! Device profile types

use super::ProfileFeatures;
use crate::bus::{AddressWidth, BusWidth, MAX_PACKED_HEADER};
use crate::error::{Error, Result};

/// Number of chip selects on the controller
pub const MAX_CHIP_SELECTS: u8 = 4;

/// Identification bytes returned by the Read ID command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceId {
    /// Manufacturer ID
    pub manufacturer: u8,
    /// Known-good-die byte
    pub kgd: u8,
}

/// Full Read ID response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadIdResponse {
    /// Manufacturer ID and known-good-die byte
    pub id: DeviceId,
    /// Extended ID bytes
    pub eid: [u8; 6],
}

impl ReadIdResponse {
    /// Parse the 8 bytes clocked out after the Read ID header
    pub fn from_bytes(bytes: &[u8; 8]) -> Self {
        let mut eid = [0u8; 6];
        eid.copy_from_slice(&bytes[2..]);
        Self {
            id: DeviceId {
                manufacturer: bytes[0],
                kgd: bytes[1],
            },
            eid,
        }
    }
}

/// Bus width of each transaction phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseWidths {
    /// Instruction (command) phase
    pub instruction: BusWidth,
    /// Address phase
    pub address: BusWidth,
    /// Extra byte phase
    pub extra_byte: BusWidth,
    /// Dummy (wait cycle) phase
    pub dummy: BusWidth,
    /// Data phase
    pub data: BusWidth,
}

impl PhaseWidths {
    /// All phases on the same width
    pub const fn uniform(width: BusWidth) -> Self {
        Self {
            instruction: width,
            address: width,
            extra_byte: width,
            dummy: width,
            data: width,
        }
    }
}

/// Burst wrap sizes selectable through the device mode register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapSize {
    /// 16-byte wrap
    Wrap16,
    /// 32-byte wrap
    Wrap32,
    /// 64-byte wrap
    Wrap64,
    /// 512-byte wrap
    Wrap512,
}

impl WrapSize {
    /// Wrap size in bytes
    pub const fn bytes(&self) -> u32 {
        match self {
            Self::Wrap16 => 16,
            Self::Wrap32 => 32,
            Self::Wrap64 => 64,
            Self::Wrap512 => 512,
        }
    }

    /// Mode register field value (bits 6:5)
    pub const fn mode_bits(&self) -> u8 {
        match self {
            Self::Wrap16 => 0,
            Self::Wrap32 => 1,
            Self::Wrap64 => 2,
            Self::Wrap512 => 3,
        }
    }

    /// Look up the wrap size for a byte count
    pub const fn from_bytes(bytes: u32) -> Option<Self> {
        match bytes {
            16 => Some(Self::Wrap16),
            32 => Some(Self::Wrap32),
            64 => Some(Self::Wrap64),
            512 => Some(Self::Wrap512),
            _ => None,
        }
    }
}

/// Static description of a PSRAM device and how it is wired
///
/// A profile is supplied once at init and never changes afterwards. It holds
/// everything the engine needs to sequence commands for the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Expected Read ID bytes
    pub id: DeviceId,
    /// Memory-mapped base address of the device
    pub base_address: u32,
    /// Device density in bits
    pub density_bits: u32,
    /// Largest single manual transfer in bytes
    pub page_size: u32,
    /// Burst wrap boundary in bytes (0 = no wrap)
    pub burst_wrap: u32,
    /// Wrap boundary after a burst length toggle (0 = no toggle)
    pub toggle_wrap: u32,
    /// Read opcode
    pub read_opcode: u8,
    /// Write opcode
    pub write_opcode: u8,
    /// Second command byte when [`ProfileFeatures::CMD_16BIT`] is set
    pub cmd_ext: u8,
    /// Bus width of each phase
    pub widths: PhaseWidths,
    /// Width of the address phase
    pub address_width: AddressWidth,
    /// Wait cycles between address and read data
    pub read_dummy_cycles: u8,
    /// Chip select the device is wired to
    pub chip_select: u8,
    /// Device interface mode: `Single` for SPI, `Quad` for QPI
    pub interface: BusWidth,
    /// Feature flags
    pub features: ProfileFeatures,
}

impl DeviceProfile {
    /// Device size in bytes
    pub const fn size(&self) -> u32 {
        self.density_bits / 8
    }

    /// First address past the end of the device window
    pub const fn end_address(&self) -> u64 {
        self.base_address as u64 + self.size() as u64
    }

    /// Number of dummy bits clocked after the address of a read
    pub const fn read_dummy_bits(&self) -> u32 {
        self.read_dummy_cycles as u32 * self.widths.dummy.lines() as u32
    }

    /// Check that `[addr, addr + len)` lies inside the device window
    pub fn contains(&self, addr: u32, len: u64) -> bool {
        let start = self.base_address as u64;
        let end = self.end_address();
        let addr = addr as u64;
        addr >= start && addr < end && addr + len <= end
    }

    /// Check the profile for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.density_bits == 0 || self.density_bits % 8 != 0 {
            log::error!("profile density {} bits is invalid", self.density_bits);
            return Err(Error::InvalidProfile);
        }
        if self.end_address() > u32::MAX as u64 + 1 {
            log::error!("profile window exceeds the 32-bit address space");
            return Err(Error::InvalidProfile);
        }
        if self.address_width != AddressWidth::Bits32
            && self.size() as u64 > 1u64 << self.address_width.bits()
        {
            log::error!(
                "{} byte device does not fit a {}-bit address",
                self.size(),
                self.address_width.bits()
            );
            return Err(Error::InvalidProfile);
        }
        if self.page_size < 4 || self.page_size % 4 != 0 {
            log::error!("page size {} must be a multiple of 4", self.page_size);
            return Err(Error::InvalidProfile);
        }
        if self.chip_select >= MAX_CHIP_SELECTS {
            log::error!("chip select {} out of range", self.chip_select);
            return Err(Error::InvalidProfile);
        }
        if self.interface == BusWidth::Dual {
            log::error!("device interface must be SPI or QPI");
            return Err(Error::InvalidProfile);
        }
        if self.interface == BusWidth::Quad && !self.features.contains(ProfileFeatures::QPI) {
            log::error!("QPI interface needs the QPI feature");
            return Err(Error::InvalidProfile);
        }
        if self.features.contains(ProfileFeatures::BURST_TOGGLE) && self.toggle_wrap == 0 {
            log::error!("burst toggle needs a toggle wrap size");
            return Err(Error::InvalidProfile);
        }

        if self.read_dummy_bits() > 32 {
            log::error!("{} dummy bits exceed one FIFO word", self.read_dummy_bits());
            return Err(Error::InvalidProfile);
        }

        let packed = self.widths.instruction == self.widths.address
            && !self
                .features
                .intersects(ProfileFeatures::CMD_16BIT | ProfileFeatures::EXTRA_BYTE);
        if packed {
            let dummy_bits = self.read_dummy_bits();
            let header = 1 + self.address_width.bytes() as u32 + dummy_bits / 8;
            if dummy_bits % 8 != 0 || header as usize > MAX_PACKED_HEADER {
                log::error!(
                    "{} dummy bits cannot be packed into the command header",
                    dummy_bits
                );
                return Err(Error::InvalidProfile);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::APS6404L_3SQR;

    #[test]
    fn test_contains() {
        let p = APS6404L_3SQR;
        let base = p.base_address;
        assert!(p.contains(base, 1));
        assert!(p.contains(base, p.size() as u64));
        assert!(!p.contains(base, p.size() as u64 + 1));
        assert!(!p.contains(base - 1, 1));
        assert!(!p.contains(base + p.size(), 0));
        assert!(p.contains(base + p.size() - 4, 4));
    }

    #[test]
    fn test_density_must_fit_address_width() {
        let mut p = APS6404L_3SQR;
        p.density_bits = 128 * 1024 * 1024;
        assert_eq!(p.validate(), Ok(()));

        p.density_bits = 256 * 1024 * 1024;
        assert_eq!(p.validate(), Err(Error::InvalidProfile));

        p.address_width = AddressWidth::Bits32;
        assert_eq!(p.validate(), Ok(()));
    }

    #[test]
    fn test_builtin_profiles_validate() {
        for p in crate::profile::BUILTIN_PROFILES {
            p.profile.validate().unwrap();
        }
    }

    #[test]
    fn test_validate_rejects_unpackable_dummy() {
        let mut p = APS6404L_3SQR;
        // 3 quad cycles = 12 bits, not a whole byte
        p.read_dummy_cycles = 3;
        assert_eq!(p.validate(), Err(Error::InvalidProfile));

        // The same dummy count is fine when phases are split
        p.widths.instruction = BusWidth::Single;
        assert_eq!(p.validate(), Ok(()));
    }

    #[test]
    fn test_read_id_parse() {
        let resp = ReadIdResponse::from_bytes(&[0x0D, 0x5D, 1, 2, 3, 4, 5, 6]);
        assert_eq!(resp.id.manufacturer, 0x0D);
        assert_eq!(resp.id.kgd, 0x5D);
        assert_eq!(resp.eid, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_wrap_size_bytes() {
        assert_eq!(WrapSize::from_bytes(32), Some(WrapSize::Wrap32));
        assert_eq!(WrapSize::from_bytes(1024), None);
        assert_eq!(WrapSize::Wrap512.mode_bits(), 3);
    }
}
