//! Controller trait definitions
//!
//! The engine never touches registers directly. A board support layer
//! implements [`QspiController`] for the QSPI block and [`DmaController`] for
//! the DMA block; the in-memory emulator in `qpsram-dummy` implements both.

use bitflags::bitflags;

use crate::bus::{BusWidth, Direction, ElementSize};
use crate::error::{Error, Result};
use crate::profile::DeviceProfile;

/// Depth of the controller's manual-mode FIFO in elements
pub const FIFO_DEPTH: usize = 16;

/// Largest read length that fits the manual transfer length field
pub const MAX_READ_TRIGGER_BYTES: u32 = 32 * 1024 - 4;

/// Largest element count of one DMA descriptor
pub const MAX_DMA_TRANSFER_COUNT: u32 = 1024;

bitflags! {
    /// QSPI controller status flags
    ///
    /// Bit positions follow the controller status register. `CS_RELEASED`
    /// mirrors the chip-select idle bit of the manual configuration register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct QspiStatus: u32 {
        /// A manual transaction is being shifted out
        const BUSY             = 1 << 0;
        /// Receive FIFO holds no data
        const RX_FIFO_EMPTY    = 1 << 7;
        /// The auto-mode state machine is idle
        const AUTO_FSM_IDLE    = 1 << 10;
        /// Auto mode is active on the bus
        const AUTO_MODE_ACTIVE = 1 << 12;
        /// Mode is selected by hardware pins and cannot be switched
        const HW_CONTROLLED    = 1 << 14;
        /// Chip select is released (no manual transaction open)
        const CS_RELEASED      = 1 << 16;
    }
}

impl Default for QspiStatus {
    fn default() -> Self {
        QspiStatus::empty()
    }
}

/// Register-level capabilities of a QSPI controller
///
/// Methods map one-to-one onto register accesses. None of them wait; the
/// engine polls [`QspiController::status`] through `wait_until` instead.
///
/// ## Example
///
/// ```ignore
/// impl QspiController for Qspi2 {
///     fn status(&mut self) -> QspiStatus {
///         QspiStatus::from_bits_truncate(self.regs.status.read())
///     }
///
///     fn push_fifo(&mut self, bits: u8, word: u32) {
///         self.regs.manual_write_data_2.write(bits as u32);
///         self.regs.manual_rd_wr_data.write(word);
///     }
///     // ...
/// }
/// ```
pub trait QspiController {
    /// Read the status flags
    fn status(&mut self) -> QspiStatus;

    /// Check the auto-mode enable bit in the bus mode register
    fn auto_mode_enabled(&mut self) -> bool;

    /// Set or clear the auto-mode enable bit
    fn set_auto_mode(&mut self, enable: bool);

    /// Program the auto-mode read/write configuration for a device
    fn configure_auto(&mut self, profile: &DeviceProfile);

    /// Select the bus width used by manual transactions on a chip select
    fn set_bus_width(&mut self, cs: u8, width: BusWidth);

    /// Load one word into the transmit FIFO, `bits` wide
    fn push_fifo(&mut self, bits: u8, word: u32);

    /// Shift out the loaded FIFO words on a chip select
    fn trigger_write(&mut self, cs: u8);

    /// Start a length-programmed data phase of `len` bytes
    ///
    /// For reads the controller fills the receive FIFO; for writes it
    /// expects the data through the FIFO register (normally from DMA).
    fn trigger_transfer(&mut self, cs: u8, dir: Direction, elem: ElementSize, len: u32);

    /// Take one element from the receive FIFO
    fn pop_fifo(&mut self) -> u32;

    /// Drive chip select low outside of a transaction
    fn assert_cs(&mut self, cs: u8);

    /// Release chip select, ending the manual transaction
    fn deassert_cs(&mut self);

    /// Bus address of the FIFO data register, used as the DMA peripheral side
    fn fifo_address(&self) -> usize;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

/// DMA channel setup for one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaChannelConfig {
    /// Channel number
    pub channel: u8,
    /// Source address
    pub src: usize,
    /// Destination address
    pub dst: usize,
    /// Number of elements to move
    pub count: u32,
    /// Element width
    pub width: ElementSize,
    /// Increment the source address after each element
    pub src_increment: bool,
    /// Increment the destination address after each element
    pub dst_increment: bool,
}

/// Events delivered by the DMA completion interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaEvent {
    /// The channel moved all configured elements
    TransferDone,
    /// The channel stopped on a bus error
    Error,
}

/// Capabilities of the DMA controller used for the data phase
pub trait DmaController {
    /// Configure a channel for one transfer
    fn configure(&mut self, cfg: &DmaChannelConfig) -> Result<()>;

    /// Enable a configured channel
    fn enable(&mut self, channel: u8) -> Result<()>;

    /// Start a channel by software request
    fn trigger(&mut self, channel: u8) -> Result<()>;

    /// Tear down a channel after completion
    fn deinit(&mut self, channel: u8);
}

/// Placeholder for systems without a DMA controller
///
/// Every configuration attempt fails, so only the blocking path is usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDma;

impl DmaController for NoDma {
    fn configure(&mut self, _cfg: &DmaChannelConfig) -> Result<()> {
        Err(Error::DmaConfig)
    }

    fn enable(&mut self, _channel: u8) -> Result<()> {
        Err(Error::DmaConfig)
    }

    fn trigger(&mut self, _channel: u8) -> Result<()> {
        Err(Error::DmaConfig)
    }

    fn deinit(&mut self, _channel: u8) {}
}
