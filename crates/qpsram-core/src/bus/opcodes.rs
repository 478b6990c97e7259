//! PSRAM command opcodes
//!
//! Command set shared by the AP Memory APS1604M/APS6404L family of QSPI
//! PSRAM devices.

// ============================================================================
// Array access
// ============================================================================

/// Read (single-wire, no wait cycles, up to 33 MHz)
pub const READ: u8 = 0x03;
/// Fast Read (single-wire, 8 wait cycles)
pub const FAST_READ: u8 = 0x0B;
/// Fast Read Quad (6 wait cycles in quad mode)
pub const FAST_READ_QUAD: u8 = 0xEB;
/// Write
pub const WRITE: u8 = 0x02;
/// Quad Write
pub const QUAD_WRITE: u8 = 0x38;

// ============================================================================
// Identification and mode register
// ============================================================================

/// Read ID (MFID, KGD and 6 EID bytes after a 24-bit address)
pub const READ_ID: u8 = 0x9F;
/// Mode Register Read
pub const MODE_REG_READ: u8 = 0xB5;
/// Mode Register Write
pub const MODE_REG_WRITE: u8 = 0xB1;

// ============================================================================
// Interface and power control
// ============================================================================

/// Enter QPI mode
pub const ENTER_QPI: u8 = 0x35;
/// Exit QPI mode (only valid in QPI mode)
pub const EXIT_QPI: u8 = 0xF5;
/// Reset Enable
pub const RESET_ENABLE: u8 = 0x66;
/// Reset (must follow Reset Enable)
pub const RESET: u8 = 0x99;
/// Toggle wrapped burst length
pub const BURST_LENGTH_TOGGLE: u8 = 0xC0;
/// Half sleep (shares the opcode with burst toggle, selected by device state)
pub const HALF_SLEEP: u8 = 0xC0;
