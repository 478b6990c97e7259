//! Controller abstraction
//!
//! Traits for the QSPI and DMA hardware, bounded status polling, the
//! auto/manual mode arbiter and the manual-mode phase driver.

mod driver;
mod mode;
mod traits;
mod wait;

#[cfg(test)]
pub(crate) mod mock;

pub use driver::PhaseDriver;
pub use mode::{current_mode, enter_auto, enter_manual, restore, BusMode, ManualLease};
pub use traits::{
    DmaChannelConfig, DmaController, DmaEvent, NoDma, QspiController, QspiStatus, FIFO_DEPTH,
    MAX_DMA_TRANSFER_COUNT, MAX_READ_TRIGGER_BYTES,
};
pub use wait::{wait_for_clear, wait_for_set, wait_until, POLL_INTERVAL_US};
