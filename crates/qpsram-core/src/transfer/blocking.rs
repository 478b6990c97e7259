//! Blocking transfers through the CPU-serviced FIFO

use super::planner::{Chunk, ChunkLimits, ChunkPlanner};
use super::{drive_header, validate_request, Request};
use crate::bus::{BusWidth, Direction, ElementSize};
use crate::controller::{DmaController, ManualLease, PhaseDriver, QspiController};
use crate::error::Result;
use crate::psram::Psram;

impl<C: QspiController, D: DmaController> Psram<C, D> {
    /// Write `count` elements of `elem_size` bytes from `buf` to `addr`
    ///
    /// `addr` is an absolute address inside the device window. Elements are
    /// taken from `buf` in little-endian byte order. Returns once every
    /// chunk has been shifted out; the controller is left in the mode it
    /// was in before the call.
    pub fn write_blocking(
        &mut self,
        addr: u32,
        buf: &[u8],
        elem_size: u8,
        count: u32,
    ) -> Result<()> {
        let req = validate_request(
            &self.profile,
            addr,
            (buf.as_ptr() as usize, buf.len()),
            elem_size,
            count,
        )?;
        self.ensure_idle()?;
        self.ensure_ready()?;

        self.run_blocking(Direction::Write, req, |drv, chunk, elem, width| {
            let start = chunk.offset as usize;
            let data = &buf[start..start + chunk.bytes as usize];
            drv.pump_write(data, elem, width, false)
        })
    }

    /// Read `count` elements of `elem_size` bytes from `addr` into `buf`
    pub fn read_blocking(
        &mut self,
        addr: u32,
        buf: &mut [u8],
        elem_size: u8,
        count: u32,
    ) -> Result<()> {
        let req = validate_request(
            &self.profile,
            addr,
            (buf.as_ptr() as usize, buf.len()),
            elem_size,
            count,
        )?;
        self.ensure_idle()?;
        self.ensure_ready()?;

        self.run_blocking(Direction::Read, req, |drv, chunk, elem, width| {
            let start = chunk.offset as usize;
            let data = &mut buf[start..start + chunk.bytes as usize];
            drv.pump_read(data, elem, width, false)
        })
    }

    fn run_blocking<F>(&mut self, dir: Direction, req: Request, mut data_phase: F) -> Result<()>
    where
        F: FnMut(&mut PhaseDriver<'_, C>, &Chunk, ElementSize, BusWidth) -> Result<()>,
    {
        if req.bytes == 0 {
            return Ok(());
        }

        let timeout_us = self.config.timeout_us;
        let profile = self.profile;
        let encoding = self.encoding;
        let planner = ChunkPlanner::new(
            req.addr,
            req.bytes,
            self.wrap_size,
            req.elem,
            ChunkLimits::blocking(profile.page_size),
        )
        .wrap_origin(profile.base_address);
        log::debug!(
            "{:?} {} bytes at 0x{:08x}, {:?} elements",
            dir,
            req.bytes,
            req.addr,
            req.elem
        );

        let mut lease = ManualLease::acquire(&mut self.ctrl, timeout_us)?;
        let mut drv = PhaseDriver::new(lease.ctrl(), profile.chip_select, timeout_us);

        for chunk in planner {
            log::trace!("chunk {} bytes at 0x{:08x}", chunk.bytes, chunk.addr);
            let offset = chunk.addr - profile.base_address;
            let res = drive_header(&mut drv, &profile, encoding, dir, offset)
                .and_then(|_| data_phase(&mut drv, &chunk, req.elem, profile.widths.data));
            if let Err(e) = res {
                drv.deassert();
                return Err(e);
            }
        }

        lease.release()
    }
}
