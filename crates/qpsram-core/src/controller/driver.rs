//! Manual-mode phase driver
//!
//! Everything the engine puts on the bus in manual mode goes through a
//! [`PhaseDriver`]: single command/address phases, FIFO byte pumps and the
//! length-programmed data phase used by DMA.

use super::traits::{FIFO_DEPTH, MAX_READ_TRIGGER_BYTES};
use super::wait::{wait_for_clear, wait_until};
use super::{QspiController, QspiStatus};
use crate::bus::{BusWidth, Direction, ElementSize};
use crate::error::Result;

/// Drives manual-mode transactions on one chip select
///
/// The driver remembers the last selected bus width so that a width switch
/// is only issued when consecutive phases differ.
pub struct PhaseDriver<'a, C: QspiController + ?Sized> {
    ctrl: &'a mut C,
    cs: u8,
    width: Option<BusWidth>,
    timeout_us: u32,
}

impl<'a, C: QspiController + ?Sized> PhaseDriver<'a, C> {
    /// Create a driver for chip select `cs`
    pub fn new(ctrl: &'a mut C, cs: u8, timeout_us: u32) -> Self {
        Self {
            ctrl,
            cs,
            width: None,
            timeout_us,
        }
    }

    /// Underlying controller
    pub fn ctrl(&mut self) -> &mut C {
        self.ctrl
    }

    /// Switch the manual bus width if it differs from the current one
    pub fn select_width(&mut self, width: BusWidth) {
        if self.width != Some(width) {
            self.ctrl.set_bus_width(self.cs, width);
            self.width = Some(width);
        }
    }

    /// Shift out one phase of `bits` bits, keeping chip select asserted
    pub fn drive_phase(&mut self, width: BusWidth, bits: u8, payload: u32) -> Result<()> {
        self.select_width(width);
        log::trace!("phase: {} bits 0x{:x} on {:?}", bits, payload, width);
        self.ctrl.push_fifo(bits, payload);
        self.ctrl.trigger_write(self.cs);
        self.wait_idle()
    }

    /// Write `data` through the FIFO as elements of `elem`
    ///
    /// Elements are loaded up to the FIFO depth per trigger. Trailing bytes
    /// that do not form a whole element are not sent.
    pub fn pump_write(
        &mut self,
        data: &[u8],
        elem: ElementSize,
        width: BusWidth,
        keep_cs: bool,
    ) -> Result<()> {
        self.select_width(width);
        let elem_bytes = elem.bytes() as usize;

        for group in data.chunks(FIFO_DEPTH * elem_bytes) {
            for e in group.chunks_exact(elem_bytes) {
                self.ctrl.push_fifo(elem.bits(), elem.load(e));
            }
            self.ctrl.trigger_write(self.cs);
            self.wait_idle()?;
        }

        if !keep_cs {
            self.deassert();
        }
        Ok(())
    }

    /// Read into `buf` through the receive FIFO as elements of `elem`
    pub fn pump_read(
        &mut self,
        buf: &mut [u8],
        elem: ElementSize,
        width: BusWidth,
        keep_cs: bool,
    ) -> Result<()> {
        self.select_width(width);
        let elem_bytes = elem.bytes() as usize;
        let max_trigger = (MAX_READ_TRIGGER_BYTES as usize / elem_bytes) * elem_bytes;
        let timeout_us = self.timeout_us;

        for part in buf.chunks_mut(max_trigger) {
            self.ctrl
                .trigger_transfer(self.cs, Direction::Read, elem, part.len() as u32);

            for e in part.chunks_exact_mut(elem_bytes) {
                wait_until(self.ctrl, timeout_us, "receive FIFO data", |c| {
                    !c.status().contains(QspiStatus::RX_FIFO_EMPTY)
                })?;
                elem.store(self.ctrl.pop_fifo(), e);
            }
        }

        if !keep_cs {
            self.deassert();
        }
        Ok(())
    }

    /// Start a data phase of `len` bytes that DMA will service
    pub fn start_stream(&mut self, dir: Direction, elem: ElementSize, width: BusWidth, len: u32) {
        self.select_width(width);
        self.ctrl.trigger_transfer(self.cs, dir, elem, len);
    }

    /// Wait until the current manual transaction has been shifted out
    pub fn wait_idle(&mut self) -> Result<()> {
        wait_for_clear(self.ctrl, self.timeout_us, "QSPI idle", QspiStatus::BUSY)
    }

    /// Release chip select
    pub fn deassert(&mut self) {
        self.ctrl.deassert_cs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mock::{MockQspi, Op};
    use crate::error::Error;

    fn triggers(ops: &[Op]) -> usize {
        ops.iter().filter(|op| **op == Op::TriggerWrite).count()
    }

    #[test]
    fn test_pump_write_groups_by_fifo_depth() {
        let mut ctrl = MockQspi::new();
        let data: std::vec::Vec<u8> = (0..40).collect();
        PhaseDriver::new(&mut ctrl, 0, 100)
            .pump_write(&data, ElementSize::Byte, BusWidth::Quad, false)
            .unwrap();

        assert_eq!(triggers(&ctrl.ops), 3);
        assert_eq!(ctrl.ops[0], Op::Width(BusWidth::Quad));
        assert_eq!(ctrl.ops[1], Op::Push(8, 0));
        assert_eq!(ctrl.ops.last(), Some(&Op::DeassertCs));
    }

    #[test]
    fn test_pump_write_words_little_endian() {
        let mut ctrl = MockQspi::new();
        PhaseDriver::new(&mut ctrl, 0, 100)
            .pump_write(&[1, 2, 3, 4], ElementSize::Word, BusWidth::Single, true)
            .unwrap();
        assert_eq!(
            ctrl.ops,
            [
                Op::Width(BusWidth::Single),
                Op::Push(32, 0x0403_0201),
                Op::TriggerWrite
            ]
        );
        assert!(ctrl.cs_asserted);
    }

    #[test]
    fn test_pump_read_unpacks_elements() {
        let mut ctrl = MockQspi::new();
        ctrl.rx.extend([0xBEEF, 0x1234]);
        let mut buf = [0u8; 4];
        PhaseDriver::new(&mut ctrl, 0, 100)
            .pump_read(&mut buf, ElementSize::HalfWord, BusWidth::Quad, false)
            .unwrap();
        assert_eq!(buf, [0xEF, 0xBE, 0x34, 0x12]);
        assert_eq!(
            ctrl.ops[1],
            Op::Transfer(Direction::Read, ElementSize::HalfWord, 4)
        );
    }

    #[test]
    fn test_pump_read_times_out_on_empty_fifo() {
        let mut ctrl = MockQspi::new();
        let mut buf = [0u8; 2];
        let res = PhaseDriver::new(&mut ctrl, 0, 20).pump_read(
            &mut buf,
            ElementSize::Byte,
            BusWidth::Quad,
            false,
        );
        assert_eq!(res, Err(Error::Timeout));
    }

    #[test]
    fn test_width_switch_only_on_change() {
        let mut ctrl = MockQspi::new();
        let mut drv = PhaseDriver::new(&mut ctrl, 0, 100);
        drv.drive_phase(BusWidth::Single, 8, 0xEB).unwrap();
        drv.drive_phase(BusWidth::Quad, 24, 0x10).unwrap();
        drv.drive_phase(BusWidth::Quad, 8, 0).unwrap();
        let widths = ctrl
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Width(_)))
            .count();
        assert_eq!(widths, 2);
    }

    #[test]
    fn test_stuck_busy_times_out() {
        let mut ctrl = MockQspi::new();
        ctrl.stuck_busy = true;
        let res = PhaseDriver::new(&mut ctrl, 0, 10).drive_phase(BusWidth::Single, 8, 0x9F);
        assert_eq!(res, Err(Error::Timeout));
        assert_eq!(ctrl.elapsed_us, 10);
    }
}
