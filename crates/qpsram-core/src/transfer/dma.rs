//! DMA transfers with completion chaining
//!
//! A DMA call issues the first chunk and returns. Each completion interrupt
//! tears down the finished chunk and issues the next one from the transfer
//! context until nothing is left; the last completion hands the bus back to
//! auto mode and reports the result through the caller's [`DmaStatus`].

use super::context::{DmaBuffer, DmaState, DmaStatus, TransferContext, TransferState};
use super::planner::{ChunkLimits, ChunkPlanner};
use super::{drive_header, validate_request};
use crate::bus::Direction;
use crate::controller::{
    enter_auto, enter_manual, wait_for_clear, DmaChannelConfig, DmaController, DmaEvent,
    PhaseDriver, QspiController, QspiStatus, MAX_DMA_TRANSFER_COUNT,
};
use crate::error::{Error, Result};
use crate::psram::Psram;

/// Outcome of one completion callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStep {
    /// The event was not for the running chain
    Ignored,
    /// The next chunk has been issued
    Continued,
    /// The chain finished and reported [`DmaState::Done`]
    Completed,
    /// The chain stopped and reported [`DmaState::Fail`]
    Failed,
}

impl<C: QspiController, D: DmaController> Psram<C, D> {
    /// Start a DMA write of `count` elements from `buf` to `addr`
    ///
    /// Returns after the first chunk has been issued. The final outcome is
    /// written to `status` from [`Psram::on_dma_complete`].
    pub fn write_dma(
        &mut self,
        addr: u32,
        buf: DmaBuffer,
        elem_size: u8,
        count: u32,
        status: &'static DmaStatus,
    ) -> Result<()> {
        self.begin_dma(Direction::Write, addr, buf, elem_size, count, status)
    }

    /// Start a DMA read of `count` elements from `addr` into `buf`
    pub fn read_dma(
        &mut self,
        addr: u32,
        buf: DmaBuffer,
        elem_size: u8,
        count: u32,
        status: &'static DmaStatus,
    ) -> Result<()> {
        self.begin_dma(Direction::Read, addr, buf, elem_size, count, status)
    }

    fn begin_dma(
        &mut self,
        dir: Direction,
        addr: u32,
        buf: DmaBuffer,
        elem_size: u8,
        count: u32,
        status: &'static DmaStatus,
    ) -> Result<()> {
        let req = validate_request(&self.profile, addr, (buf.addr(), buf.len()), elem_size, count)?;
        self.ensure_idle()?;
        self.ensure_ready()?;

        if req.bytes == 0 {
            status.set(DmaState::Done);
            return Ok(());
        }

        let channel = match dir {
            Direction::Write => self.config.dma_write_channel,
            Direction::Read => self.config.dma_read_channel,
        };
        let max_bytes = self.config.dma_chunk_bytes.unwrap_or(self.profile.page_size);
        let planner = ChunkPlanner::new(
            req.addr,
            req.bytes,
            self.wrap_size,
            req.elem,
            ChunkLimits::dma(max_bytes, MAX_DMA_TRANSFER_COUNT),
        )
        .wrap_origin(self.profile.base_address);
        log::debug!(
            "DMA {:?} {} bytes at 0x{:08x} on channel {}",
            dir,
            req.bytes,
            req.addr,
            channel
        );

        self.ctx = TransferContext {
            state: TransferState::running(dir),
            planner: Some(planner),
            buffer: buf.addr(),
            channel,
            status: Some(status),
        };

        if let Err(e) = self.issue_chunk() {
            log::warn!("failed to start DMA {:?}: {}", dir, e);
            self.ctrl.deassert_cs();
            self.dma.deinit(channel);
            if let Err(e) = enter_auto(&mut self.ctrl, self.config.timeout_us) {
                log::warn!("failed to restore auto mode: {}", e);
            }
            self.ctx.clear();
            return Err(e);
        }
        Ok(())
    }

    /// Issue the next chunk of the running chain
    fn issue_chunk(&mut self) -> Result<()> {
        let dir = self.ctx.state.direction().ok_or(Error::Failed)?;
        let planner = self.ctx.planner.as_mut().ok_or(Error::Failed)?;
        let elem = planner.element_size();
        let chunk = planner.next().ok_or(Error::Failed)?;

        let channel = self.ctx.channel;
        let host = self.ctx.buffer + chunk.offset as usize;
        let fifo = self.ctrl.fifo_address();
        let cfg = match dir {
            Direction::Write => DmaChannelConfig {
                channel,
                src: host,
                dst: fifo,
                count: chunk.elements,
                width: elem,
                src_increment: true,
                dst_increment: false,
            },
            Direction::Read => DmaChannelConfig {
                channel,
                src: fifo,
                dst: host,
                count: chunk.elements,
                width: elem,
                src_increment: false,
                dst_increment: true,
            },
        };
        log::trace!(
            "DMA chunk {} bytes at 0x{:08x}, {} left",
            chunk.bytes,
            chunk.addr,
            self.ctx.remaining()
        );

        self.dma.configure(&cfg)?;
        self.dma.enable(channel)?;

        let timeout_us = self.config.timeout_us;
        enter_manual(&mut self.ctrl, timeout_us)?;
        let mut drv = PhaseDriver::new(&mut self.ctrl, self.profile.chip_select, timeout_us);
        let offset = chunk.addr - self.profile.base_address;
        drive_header(&mut drv, &self.profile, self.encoding, dir, offset)?;
        drv.start_stream(dir, elem, self.profile.widths.data, chunk.bytes);

        self.dma.trigger(channel)
    }

    /// Handle a DMA completion interrupt
    ///
    /// Call this from the DMA interrupt handler for every event on the
    /// engine's channels. Events for other channels, or arriving while no
    /// chain is running, are ignored.
    pub fn on_dma_complete(&mut self, event: DmaEvent, channel: u8) -> ChainStep {
        if !self.ctx.state.is_running() {
            log::warn!("spurious DMA {:?} on channel {}", event, channel);
            return ChainStep::Ignored;
        }
        if channel != self.ctx.channel {
            log::trace!("DMA event on foreign channel {}", channel);
            return ChainStep::Ignored;
        }

        let timeout_us = self.config.timeout_us;
        let settled = wait_for_clear(&mut self.ctrl, timeout_us, "QSPI idle", QspiStatus::BUSY);
        self.ctrl.deassert_cs();
        self.dma.deinit(channel);

        if event == DmaEvent::Error {
            log::error!("DMA error on channel {}", channel);
            return self.fail_chain();
        }
        if let Err(e) = settled {
            log::error!("DMA chunk did not finish: {}", e);
            return self.fail_chain();
        }

        if self.ctx.remaining() > 0 {
            match self.issue_chunk() {
                Ok(()) => ChainStep::Continued,
                Err(e) => {
                    log::error!("failed to issue next DMA chunk: {}", e);
                    self.ctrl.deassert_cs();
                    self.dma.deinit(channel);
                    self.fail_chain()
                }
            }
        } else {
            self.complete_chain()
        }
    }

    fn complete_chain(&mut self) -> ChainStep {
        if let Err(e) = enter_auto(&mut self.ctrl, self.config.timeout_us) {
            log::warn!("failed to restore auto mode: {}", e);
            self.ctx.finish(TransferState::Failed, DmaState::Fail);
            return ChainStep::Failed;
        }
        self.ctx.finish(TransferState::Idle, DmaState::Done);
        log::debug!("DMA transfer done");
        ChainStep::Completed
    }

    fn fail_chain(&mut self) -> ChainStep {
        if let Err(e) = enter_auto(&mut self.ctrl, self.config.timeout_us) {
            log::warn!("failed to restore auto mode: {}", e);
        }
        self.ctx.finish(TransferState::Failed, DmaState::Fail);
        ChainStep::Failed
    }
}
