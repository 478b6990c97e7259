//! Recording controller for unit tests

use std::collections::VecDeque;
use std::vec::Vec;

use super::{QspiController, QspiStatus};
use crate::bus::{BusWidth, Direction, ElementSize};
use crate::profile::DeviceProfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    SetAuto(bool),
    Width(BusWidth),
    Push(u8, u32),
    TriggerWrite,
    Transfer(Direction, ElementSize, u32),
    Pop,
    AssertCs,
    DeassertCs,
    ConfigureAuto,
}

#[derive(Debug, Default)]
pub struct MockQspi {
    pub ops: Vec<Op>,
    pub auto: bool,
    pub hw_controlled: bool,
    pub cs_asserted: bool,
    pub stuck_busy: bool,
    pub rx: VecDeque<u32>,
    pub elapsed_us: u64,
}

impl MockQspi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_auto() -> Self {
        Self {
            auto: true,
            ..Self::default()
        }
    }
}

impl QspiController for MockQspi {
    fn status(&mut self) -> QspiStatus {
        let mut s = QspiStatus::AUTO_FSM_IDLE;
        s.set(QspiStatus::BUSY, self.stuck_busy);
        s.set(QspiStatus::AUTO_MODE_ACTIVE, self.auto);
        s.set(QspiStatus::HW_CONTROLLED, self.hw_controlled);
        s.set(QspiStatus::RX_FIFO_EMPTY, self.rx.is_empty());
        s.set(QspiStatus::CS_RELEASED, !self.cs_asserted);
        s
    }

    fn auto_mode_enabled(&mut self) -> bool {
        self.auto
    }

    fn set_auto_mode(&mut self, enable: bool) {
        self.auto = enable;
        self.ops.push(Op::SetAuto(enable));
    }

    fn configure_auto(&mut self, _profile: &DeviceProfile) {
        self.ops.push(Op::ConfigureAuto);
    }

    fn set_bus_width(&mut self, _cs: u8, width: BusWidth) {
        self.ops.push(Op::Width(width));
    }

    fn push_fifo(&mut self, bits: u8, word: u32) {
        self.ops.push(Op::Push(bits, word));
    }

    fn trigger_write(&mut self, _cs: u8) {
        self.cs_asserted = true;
        self.ops.push(Op::TriggerWrite);
    }

    fn trigger_transfer(&mut self, _cs: u8, dir: Direction, elem: ElementSize, len: u32) {
        self.cs_asserted = true;
        self.ops.push(Op::Transfer(dir, elem, len));
    }

    fn pop_fifo(&mut self) -> u32 {
        self.ops.push(Op::Pop);
        self.rx.pop_front().unwrap_or(0)
    }

    fn assert_cs(&mut self, _cs: u8) {
        self.cs_asserted = true;
        self.ops.push(Op::AssertCs);
    }

    fn deassert_cs(&mut self) {
        self.cs_asserted = false;
        self.ops.push(Op::DeassertCs);
    }

    fn fifo_address(&self) -> usize {
        0x1200_0000
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }
}
