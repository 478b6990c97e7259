//! Sharing the engine with the DMA interrupt handler
//!
//! Mainline code and the completion interrupt both need the engine. Wrapping
//! it in a [`SharedPsram`] placed in a `static` serializes the two through a
//! critical section, so a completion can never run in the middle of a
//! mainline call.
//!
//! ```ignore
//! static PSRAM: SharedPsram<Qspi2, Udma> = SharedPsram::new();
//!
//! #[interrupt]
//! fn UDMA() {
//!     let (event, channel) = udma::pending();
//!     PSRAM.on_dma_complete(event, channel);
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::controller::{DmaController, DmaEvent, QspiController};
use crate::error::{Error, Result};
use crate::psram::Psram;
use crate::transfer::ChainStep;

/// Engine slot shared between mainline code and interrupt handlers
pub struct SharedPsram<C, D> {
    inner: Mutex<RefCell<Option<Psram<C, D>>>>,
}

impl<C, D> SharedPsram<C, D> {
    /// Create an empty slot
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Place an engine in the slot, returning the previous one
    pub fn install(&self, psram: Psram<C, D>) -> Option<Psram<C, D>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(psram))
    }

    /// Remove the engine from the slot
    pub fn take(&self) -> Option<Psram<C, D>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    /// Run `f` on the engine inside a critical section
    pub fn with<R>(&self, f: impl FnOnce(&mut Psram<C, D>) -> R) -> Result<R> {
        critical_section::with(|cs| {
            let mut slot = self.inner.borrow_ref_mut(cs);
            slot.as_mut().map(f).ok_or(Error::NotInitialized)
        })
    }
}

impl<C: QspiController, D: DmaController> SharedPsram<C, D> {
    /// Forward a DMA completion to the installed engine
    pub fn on_dma_complete(&self, event: DmaEvent, channel: u8) -> ChainStep {
        self.with(|psram| psram.on_dma_complete(event, channel))
            .unwrap_or(ChainStep::Ignored)
    }
}

impl<C, D> Default for SharedPsram<C, D> {
    fn default() -> Self {
        Self::new()
    }
}
