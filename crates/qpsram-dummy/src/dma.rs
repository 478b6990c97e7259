//! Emulated DMA controller

use std::cell::RefCell;
use std::rc::Rc;

use qpsram_core::controller::{
    DmaChannelConfig, DmaController, DmaEvent, MAX_DMA_TRANSFER_COUNT,
};
use qpsram_core::error::{Error, Result};

use crate::chip::{Channel, State};

/// Emulated DMA controller
///
/// A trigger moves the data at once and queues the completion event. Tests
/// deliver queued events with [`crate::DummyPsram::take_completion`].
#[derive(Debug, Clone)]
pub struct DummyDma {
    pub(crate) state: Rc<RefCell<State>>,
}

impl DmaController for DummyDma {
    fn configure(&mut self, cfg: &DmaChannelConfig) -> Result<()> {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;

        if cfg.count == 0 || cfg.count > MAX_DMA_TRANSFER_COUNT {
            log::warn!("DMA count {} out of range", cfg.count);
            return Err(Error::DmaConfig);
        }
        let fifo = s.config.fifo_address;
        let to_fifo = cfg.dst == fifo && !cfg.dst_increment && cfg.src_increment;
        let from_fifo = cfg.src == fifo && !cfg.src_increment && cfg.dst_increment;
        if !to_fifo && !from_fifo {
            log::warn!("DMA channel {} does not target the QSPI FIFO", cfg.channel);
            return Err(Error::DmaConfig);
        }

        s.channels.insert(
            cfg.channel,
            Channel {
                cfg: *cfg,
                enabled: false,
            },
        );
        Ok(())
    }

    fn enable(&mut self, channel: u8) -> Result<()> {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        let ch = s.channels.get_mut(&channel).ok_or(Error::DmaConfig)?;
        ch.enabled = true;
        Ok(())
    }

    fn trigger(&mut self, channel: u8) -> Result<()> {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        let ch = s
            .channels
            .get(&channel)
            .copied()
            .filter(|c| c.enabled)
            .ok_or(Error::DmaConfig)?;

        let index = s.dma_triggers;
        s.dma_triggers += 1;
        if s.config.dma_error_on == Some(index) {
            log::debug!("injecting DMA error on channel {}", channel);
            s.aborted = true;
            s.completions.push_back((DmaEvent::Error, channel));
            return Ok(());
        }

        s.run_dma(&ch.cfg);
        s.completions.push_back((DmaEvent::TransferDone, channel));
        Ok(())
    }

    fn deinit(&mut self, channel: u8) {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        s.channels.remove(&channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DummyConfig, DummyPsram};
    use qpsram_core::bus::ElementSize;

    fn config(count: u32, fifo: usize) -> DmaChannelConfig {
        DmaChannelConfig {
            channel: 5,
            src: 0x2000_0000,
            dst: fifo,
            count,
            width: ElementSize::Byte,
            src_increment: true,
            dst_increment: false,
        }
    }

    #[test]
    fn test_count_limits() {
        let dummy = DummyPsram::new_default();
        let fifo = dummy.config().fifo_address;
        let mut dma = dummy.dma();
        assert_eq!(dma.configure(&config(0, fifo)), Err(Error::DmaConfig));
        assert_eq!(dma.configure(&config(1025, fifo)), Err(Error::DmaConfig));
        assert_eq!(dma.configure(&config(1024, fifo)), Ok(()));
    }

    #[test]
    fn test_must_target_fifo() {
        let dummy = DummyPsram::new(DummyConfig::default());
        let mut dma = dummy.dma();
        assert_eq!(dma.configure(&config(4, 0x1234)), Err(Error::DmaConfig));
    }

    #[test]
    fn test_trigger_needs_enable() {
        let dummy = DummyPsram::new_default();
        let fifo = dummy.config().fifo_address;
        let mut dma = dummy.dma();
        dma.configure(&config(4, fifo)).unwrap();
        assert_eq!(dma.trigger(5), Err(Error::DmaConfig));
        assert_eq!(dma.enable(6), Err(Error::DmaConfig));
        assert!(dummy.take_completion().is_none());
    }
}
