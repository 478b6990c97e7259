//! qpsram-dummy - In-memory PSRAM emulator for testing
//!
//! This crate emulates an AP Memory style QSPI PSRAM chip together with the
//! QSPI controller and DMA controller in front of it. The engine in
//! `qpsram-core` runs against it unchanged, which makes it useful for tests
//! and for the command line tool when no hardware is attached.
//!
//! The emulator decodes every manual transaction bit by bit, applies burst
//! wrap to array accesses, and counts protocol errors (wrong bus width,
//! manual access while auto mode is active, FIFO overflow and the like)
//! instead of failing, so tests can assert that a sequence was clean.

mod chip;
mod decode;
mod dma;

use std::cell::RefCell;
use std::rc::Rc;

use qpsram_core::controller::DmaEvent;
use qpsram_core::profile::{DeviceProfile, ReadIdResponse, APS6404L_3SQR};

pub use chip::{DummyQspi, MODE_REG_POWER_UP};
pub use dma::DummyDma;

use chip::State;

/// Bus address of the emulated QSPI FIFO register
pub const QSPI_FIFO_ADDRESS: usize = 0x1200_0000;

/// Configuration for the dummy PSRAM
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Device the chip behaves as
    pub profile: DeviceProfile,
    /// Bytes returned by Read ID
    pub id: ReadIdResponse,
    /// Status reads before a mode switch or a triggered phase settles
    pub settle_polls: u32,
    /// Keep the busy flag set forever
    pub stuck_busy: bool,
    /// Report the bus mode as pinned by hardware
    pub hw_controlled: bool,
    /// Report a bus error on this DMA trigger (counted from zero)
    pub dma_error_on: Option<u32>,
    /// Address the controller reports for its FIFO register
    pub fifo_address: usize,
}

impl DummyConfig {
    /// Chip answering with the profile's own ID
    pub fn for_profile(profile: DeviceProfile) -> Self {
        Self {
            profile,
            id: ReadIdResponse {
                id: profile.id,
                eid: [0x46, 0x1A, 0x9C, 0x07, 0x31, 0x55],
            },
            settle_polls: 2,
            stuck_busy: false,
            hw_controlled: false,
            dma_error_on: None,
            fifo_address: QSPI_FIFO_ADDRESS,
        }
    }
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self::for_profile(APS6404L_3SQR)
    }
}

/// One manual transaction as decoded by the chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Command opcode
    pub opcode: u8,
    /// Device offset for array reads and writes
    pub address: Option<u32>,
    /// Bytes moved in the data phase
    pub data_len: usize,
}

/// Dummy PSRAM
///
/// Owns the shared emulator state. [`DummyPsram::controller`] and
/// [`DummyPsram::dma`] hand out the two halves the engine drives, while the
/// handle itself stays with the test for inspection.
#[derive(Debug, Clone)]
pub struct DummyPsram {
    state: Rc<RefCell<State>>,
}

impl DummyPsram {
    /// Create a new dummy PSRAM with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::new(config))),
        }
    }

    /// Create a new dummy PSRAM with default configuration (APS6404L)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// QSPI controller side
    pub fn controller(&self) -> DummyQspi {
        DummyQspi {
            state: Rc::clone(&self.state),
        }
    }

    /// DMA controller side
    pub fn dma(&self) -> DummyDma {
        DummyDma {
            state: Rc::clone(&self.state),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> DummyConfig {
        self.state.borrow().config.clone()
    }

    /// Copy `len` bytes of the array starting at device offset `offset`
    pub fn read_memory(&self, offset: u32, len: usize) -> Vec<u8> {
        let s = self.state.borrow();
        let start = offset as usize;
        s.memory[start..start + len].to_vec()
    }

    /// Overwrite the array starting at device offset `offset`
    pub fn fill(&self, offset: u32, data: &[u8]) {
        let mut s = self.state.borrow_mut();
        let start = offset as usize;
        s.memory[start..start + data.len()].copy_from_slice(data);
    }

    /// Load through the memory-mapped window
    ///
    /// Returns `None` unless the controller is in auto mode, as a bus fault
    /// would on hardware.
    pub fn mapped_read(&self, addr: u32, len: usize) -> Option<Vec<u8>> {
        let s = self.state.borrow();
        if !s.auto_mode() || !s.auto_configured {
            return None;
        }
        let profile = &s.config.profile;
        if !profile.contains(addr, len as u64) {
            return None;
        }
        let start = (addr - profile.base_address) as usize;
        Some(s.memory[start..start + len].to_vec())
    }

    /// Transactions decoded so far
    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.borrow().transactions.clone()
    }

    /// Forget the recorded transactions
    pub fn clear_transactions(&self) {
        self.state.borrow_mut().transactions.clear();
    }

    /// Register accesses made by the controller and DMA sides
    pub fn register_accesses(&self) -> usize {
        self.state.borrow().register_accesses
    }

    /// Protocol violations seen so far
    pub fn protocol_errors(&self) -> usize {
        self.state.borrow().protocol_errors
    }

    /// Take the oldest undelivered DMA completion
    pub fn take_completion(&self) -> Option<(DmaEvent, u8)> {
        self.state.borrow_mut().completions.pop_front()
    }

    /// Number of undelivered DMA completions
    pub fn pending_completions(&self) -> usize {
        self.state.borrow().completions.len()
    }

    /// Returns true when the memory-mapped path is enabled
    pub fn is_auto(&self) -> bool {
        self.state.borrow().auto_mode()
    }

    /// Returns true while the chip is in QPI mode
    pub fn is_qpi(&self) -> bool {
        self.state.borrow().qpi
    }

    /// Returns true while the chip is in half sleep
    pub fn is_sleeping(&self) -> bool {
        self.state.borrow().sleeping
    }

    /// Burst wrap size the chip applies
    pub fn wrap_size(&self) -> u32 {
        self.state.borrow().wrap_size
    }

    /// Mode register contents
    pub fn mode_register(&self) -> u8 {
        self.state.borrow().mode_reg
    }

    /// Set or clear a stuck busy flag
    pub fn set_stuck_busy(&self, stuck: bool) {
        self.state.borrow_mut().stuck_busy = stuck;
    }

    /// Time spent in controller delays
    pub fn elapsed_us(&self) -> u64 {
        self.state.borrow().now_us
    }
}
