//! Device profile feature flags

use bitflags::bitflags;

bitflags! {
    /// Feature flags for PSRAM devices
    ///
    /// These flags describe protocol quirks and optional commands of a device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProfileFeatures: u32 {
        // Header encoding
        /// Address phase is sent with its outer bytes swapped
        const BYTE_SWAP       = 1 << 0;
        /// Command phase is 16 bits: opcode followed by an extension byte
        const CMD_16BIT       = 1 << 1;
        /// An extra byte phase follows the address
        const EXTRA_BYTE      = 1 << 2;

        // Optional commands
        /// Supports QPI mode (0x35 / 0xF5)
        const QPI             = 1 << 3;
        /// Supports half sleep (0xC0) and CS-pulse wakeup
        const HALF_SLEEP      = 1 << 4;
        /// Supports wrapped burst length toggle (0xC0)
        const BURST_TOGGLE    = 1 << 5;
        /// Wrap size is programmable through the mode register
        const MODE_REG_WRAP   = 1 << 6;
    }
}

impl Default for ProfileFeatures {
    fn default() -> Self {
        ProfileFeatures::empty()
    }
}
