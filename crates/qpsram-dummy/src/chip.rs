//! Emulated QSPI controller and PSRAM chip state

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use qpsram_core::bus::{BusWidth, Direction, ElementSize};
use qpsram_core::controller::{
    DmaChannelConfig, DmaEvent, QspiController, QspiStatus, FIFO_DEPTH,
};
use qpsram_core::profile::{DeviceProfile, ProfileFeatures};
use qpsram_core::psram::{HALF_SLEEP_EXIT_PULSE_US, HALF_SLEEP_EXIT_US};

use crate::decode::{decode, Command, Fault, Shifted};
use crate::{DummyConfig, Transaction};

/// Mode register contents after power-up or reset
pub const MODE_REG_POWER_UP: u8 = 0x0F;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Channel {
    pub cfg: DmaChannelConfig,
    pub enabled: bool,
}

#[derive(Debug)]
pub(crate) struct State {
    pub config: DummyConfig,
    pub memory: Vec<u8>,
    pub now_us: u64,
    pub register_accesses: usize,
    pub protocol_errors: usize,
    pub transactions: Vec<Transaction>,

    // Controller
    pub auto_enabled: bool,
    pub auto_active: bool,
    pub auto_settle: u32,
    pub auto_configured: bool,
    pub busy_polls: u32,
    pub stuck_busy: bool,
    pub width: BusWidth,
    pub tx: Vec<Shifted>,
    pub rx: VecDeque<u32>,
    pub cs_asserted: bool,
    pub cs_asserted_at: u64,

    // Current transaction
    pub txn: Vec<Shifted>,
    pub read_len: usize,
    pub stream: Option<(Direction, ElementSize, u32)>,
    pub aborted: bool,

    // Chip
    pub qpi: bool,
    pub sleeping: bool,
    pub ready_at: u64,
    pub wrap_size: u32,
    pub mode_reg: u8,
    pub reset_enabled: bool,

    // DMA
    pub channels: BTreeMap<u8, Channel>,
    pub dma_triggers: u32,
    pub completions: VecDeque<(DmaEvent, u8)>,
}

impl State {
    pub fn new(config: DummyConfig) -> Self {
        let size = config.profile.size() as usize;
        let stuck_busy = config.stuck_busy;
        let wrap_size = config.profile.burst_wrap;
        Self {
            config,
            memory: vec![0; size],
            now_us: 0,
            register_accesses: 0,
            protocol_errors: 0,
            transactions: Vec::new(),
            auto_enabled: false,
            auto_active: false,
            auto_settle: 0,
            auto_configured: false,
            busy_polls: 0,
            stuck_busy,
            width: BusWidth::Single,
            tx: Vec::new(),
            rx: VecDeque::new(),
            cs_asserted: false,
            cs_asserted_at: 0,
            txn: Vec::new(),
            read_len: 0,
            stream: None,
            aborted: false,
            qpi: false,
            sleeping: false,
            ready_at: 0,
            wrap_size,
            mode_reg: MODE_REG_POWER_UP,
            reset_enabled: false,
            channels: BTreeMap::new(),
            dma_triggers: 0,
            completions: VecDeque::new(),
        }
    }

    fn profile(&self) -> &DeviceProfile {
        &self.config.profile
    }

    pub fn fault(&mut self, what: &str) {
        log::warn!("PSRAM protocol error: {}", what);
        self.protocol_errors += 1;
    }

    /// Auto mode as seen by the memory-mapped path
    pub fn auto_mode(&self) -> bool {
        self.config.hw_controlled || self.auto_enabled
    }

    fn manual_allowed(&mut self) -> bool {
        if self.config.hw_controlled || (!self.auto_enabled && !self.auto_active) {
            return true;
        }
        self.fault("manual access while auto mode is active");
        false
    }

    fn begin_cs(&mut self) {
        if !self.cs_asserted {
            self.cs_asserted = true;
            self.cs_asserted_at = self.now_us;
        }
    }

    fn accepting(&mut self) -> bool {
        if self.sleeping {
            self.fault("command during half sleep");
            return false;
        }
        if self.now_us < self.ready_at {
            self.fault("command before half sleep exit completed");
            return false;
        }
        true
    }

    /// Byte offset in the array of byte `i` of a burst starting at `start`
    pub fn locate(&self, start: u32, i: usize) -> usize {
        let start = start as u64;
        let i = i as u64;
        let addr = match self.wrap_size as u64 {
            0 => start + i,
            wrap => start - start % wrap + (start % wrap + i) % wrap,
        };
        (addr % self.memory.len() as u64) as usize
    }

    fn power_up_defaults(&mut self) {
        self.qpi = false;
        self.wrap_size = self.config.profile.burst_wrap;
        self.mode_reg = MODE_REG_POWER_UP;
    }

    /// Fill the receive FIFO for a read data phase of `len` bytes
    fn produce(&mut self, elem: ElementSize, len: u32) {
        if !self.accepting() {
            return;
        }
        let command = match decode(&self.txn, self.profile(), self.qpi) {
            Ok(header) => header.command,
            Err(f) => {
                self.fault(&format!("bad read header: {:?}", f));
                return;
            }
        };

        let mut bytes = vec![0u8; len as usize];
        for (i, b) in bytes.iter_mut().enumerate() {
            let pos = self.read_len + i;
            *b = match command {
                Command::ArrayRead { addr } => self.memory[self.locate(addr, pos)],
                Command::ReadId => {
                    let id = &self.config.id;
                    match pos {
                        0 => id.id.manufacturer,
                        1 => id.id.kgd,
                        2..=7 => id.eid[pos - 2],
                        _ => 0,
                    }
                }
                Command::ModeRegRead => self.mode_reg,
                other => {
                    self.fault(&format!("{:?} has no read phase", other));
                    return;
                }
            };
        }
        self.read_len += bytes.len();

        for e in bytes.chunks_exact(elem.bytes() as usize) {
            self.rx.push_back(elem.load(e));
        }
    }

    /// Chip select went high: act on the finished transaction
    fn finish(&mut self) {
        let words = std::mem::take(&mut self.txn);
        let read_len = std::mem::take(&mut self.read_len);
        let stream = self.stream.take();
        self.tx.clear();
        self.rx.clear();

        if std::mem::take(&mut self.aborted) {
            log::debug!("dropping transaction aborted by a DMA error");
            return;
        }

        if words.is_empty() {
            if self.sleeping {
                let pulse = self.now_us - self.cs_asserted_at;
                if pulse >= HALF_SLEEP_EXIT_PULSE_US as u64 {
                    self.sleeping = false;
                    self.ready_at = self.now_us + HALF_SLEEP_EXIT_US as u64;
                    log::debug!("PSRAM leaving half sleep");
                } else {
                    self.fault("half sleep exit pulse too short");
                }
            }
            return;
        }

        if read_len == 0 && !self.accepting() {
            return;
        }

        let profile = self.config.profile;
        let header = match decode(&words, &profile, self.qpi) {
            Ok(h) => h,
            Err(f) => {
                self.fault(&format!("bad command header: {:?}", f));
                return;
            }
        };

        let mut record = Transaction {
            opcode: header.opcode,
            address: None,
            data_len: read_len,
        };
        let reset_armed = std::mem::take(&mut self.reset_enabled);

        match header.command {
            Command::ArrayWrite { addr } => {
                record.address = Some(addr);
                record.data_len = self.store(addr, header.data);
                if let Some((Direction::Write, _, len)) = stream {
                    if record.data_len != len as usize {
                        self.fault("DMA data phase length mismatch");
                    }
                }
            }
            Command::ArrayRead { addr } => record.address = Some(addr),
            Command::ReadId | Command::ModeRegRead => {}
            Command::ModeRegWrite { value } => {
                self.mode_reg = value;
                self.wrap_size = match (value >> 5) & 0x3 {
                    0 => 16,
                    1 => 32,
                    2 => 64,
                    _ => 512,
                };
                log::debug!("mode register 0x{:02X}", value);
            }
            Command::EnterQpi => {
                if self.qpi {
                    self.fault("enter QPI while in QPI mode");
                }
                self.qpi = true;
            }
            Command::ExitQpi => {
                if !self.qpi {
                    self.fault("exit QPI while in SPI mode");
                }
                self.qpi = false;
            }
            Command::ResetEnable => self.reset_enabled = true,
            Command::Reset => {
                if reset_armed {
                    self.power_up_defaults();
                    log::debug!("PSRAM reset");
                } else {
                    self.fault("reset without reset enable");
                }
            }
            Command::ToggleOrSleep => {
                let features = profile.features;
                if self.qpi && features.contains(ProfileFeatures::BURST_TOGGLE) {
                    self.wrap_size = if self.wrap_size == profile.burst_wrap {
                        profile.toggle_wrap
                    } else {
                        profile.burst_wrap
                    };
                } else if !self.qpi && features.contains(ProfileFeatures::HALF_SLEEP) {
                    self.sleeping = true;
                    log::debug!("PSRAM entering half sleep");
                } else {
                    self.fault("unsupported 0xC0 command");
                }
            }
        }

        self.transactions.push(record);
    }

    /// Store write data elements little-endian, returning the byte count
    fn store(&mut self, addr: u32, data: &[Shifted]) -> usize {
        let mut pos = 0;
        for word in data {
            let n = word.bits as usize / 8;
            for b in &word.value.to_le_bytes()[..n] {
                let at = self.locate(addr, pos);
                self.memory[at] = *b;
                pos += 1;
            }
        }
        pos
    }

    /// Move one DMA transfer between host memory and the FIFO
    pub fn run_dma(&mut self, cfg: &DmaChannelConfig) {
        let elem = cfg.width;
        let len = cfg.count as usize * elem.bytes() as usize;

        if cfg.dst == self.config.fifo_address {
            if !matches!(self.stream, Some((Direction::Write, _, _))) {
                self.fault("DMA write without a programmed data phase");
                return;
            }
            // SAFETY: the engine builds channel configurations from a
            // `DmaBuffer`, whose constructors require the memory to stay
            // valid for the whole transfer.
            let src = unsafe { std::slice::from_raw_parts(cfg.src as *const u8, len) };
            let width = self.width;
            self.txn.extend(src.chunks_exact(elem.bytes() as usize).map(|e| Shifted {
                width,
                bits: elem.bits(),
                value: elem.load(e),
            }));
        } else {
            // SAFETY: as above, for the destination buffer
            let dst = unsafe { std::slice::from_raw_parts_mut(cfg.dst as *mut u8, len) };
            for e in dst.chunks_exact_mut(elem.bytes() as usize) {
                match self.rx.pop_front() {
                    Some(v) => elem.store(v, e),
                    None => {
                        self.fault("DMA read ran past the received data");
                        return;
                    }
                }
            }
        }
        self.busy_polls = self.config.settle_polls;
    }
}

/// Emulated QSPI controller
///
/// Shares its state with the [`crate::DummyPsram`] that created it.
#[derive(Debug, Clone)]
pub struct DummyQspi {
    pub(crate) state: Rc<RefCell<State>>,
}

impl QspiController for DummyQspi {
    fn status(&mut self) -> QspiStatus {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;

        if s.auto_settle > 0 {
            s.auto_settle -= 1;
            if s.auto_settle == 0 {
                s.auto_active = s.auto_enabled;
            }
        }
        if s.busy_polls > 0 {
            s.busy_polls -= 1;
        }

        let mut status = QspiStatus::AUTO_FSM_IDLE;
        status.set(QspiStatus::BUSY, s.stuck_busy || s.busy_polls > 0);
        status.set(QspiStatus::RX_FIFO_EMPTY, s.rx.is_empty());
        status.set(
            QspiStatus::AUTO_MODE_ACTIVE,
            s.auto_active || s.config.hw_controlled,
        );
        status.set(QspiStatus::HW_CONTROLLED, s.config.hw_controlled);
        status.set(QspiStatus::CS_RELEASED, !s.cs_asserted);
        status
    }

    fn auto_mode_enabled(&mut self) -> bool {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        s.auto_enabled
    }

    fn set_auto_mode(&mut self, enable: bool) {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        if enable && s.cs_asserted {
            s.fault("auto mode enabled with chip select asserted");
        }
        if enable && !s.auto_configured {
            s.fault("auto mode enabled before configuration");
        }
        s.auto_enabled = enable;
        if s.config.settle_polls == 0 {
            s.auto_active = enable;
        } else {
            s.auto_settle = s.config.settle_polls;
        }
    }

    fn configure_auto(&mut self, profile: &DeviceProfile) {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        if profile.read_opcode != s.config.profile.read_opcode {
            s.fault("auto mode configured for another device");
        }
        s.auto_configured = true;
    }

    fn set_bus_width(&mut self, cs: u8, width: BusWidth) {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        if cs != s.config.profile.chip_select {
            s.fault("bus width set on the wrong chip select");
        }
        s.width = width;
    }

    fn push_fifo(&mut self, bits: u8, word: u32) {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        if !s.manual_allowed() {
            return;
        }
        let width = s.width;
        s.tx.push(Shifted {
            width,
            bits,
            value: word,
        });
        if s.tx.len() > FIFO_DEPTH {
            s.fault("transmit FIFO overflow");
        }
    }

    fn trigger_write(&mut self, _cs: u8) {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        if !s.manual_allowed() {
            return;
        }
        s.begin_cs();
        let words = std::mem::take(&mut s.tx);
        s.txn.extend(words);
        s.busy_polls = s.config.settle_polls;
    }

    fn trigger_transfer(&mut self, _cs: u8, dir: Direction, elem: ElementSize, len: u32) {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        if !s.manual_allowed() {
            return;
        }
        s.begin_cs();
        s.stream = Some((dir, elem, len));
        if dir == Direction::Read {
            s.produce(elem, len);
        }
        s.busy_polls = s.config.settle_polls;
    }

    fn pop_fifo(&mut self) -> u32 {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        match s.rx.pop_front() {
            Some(v) => v,
            None => {
                s.fault("receive FIFO underflow");
                0
            }
        }
    }

    fn assert_cs(&mut self, _cs: u8) {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        s.begin_cs();
    }

    fn deassert_cs(&mut self) {
        let mut s = self.state.borrow_mut();
        s.register_accesses += 1;
        if s.cs_asserted {
            s.finish();
        }
        s.cs_asserted = false;
    }

    fn fifo_address(&self) -> usize {
        self.state.borrow().config.fifo_address
    }

    fn delay_us(&mut self, us: u32) {
        self.state.borrow_mut().now_us += us as u64;
    }
}
