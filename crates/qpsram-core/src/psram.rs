//! PSRAM engine
//!
//! [`Psram`] owns the QSPI controller, the DMA controller and the device
//! profile. It brings the device up, runs the device commands and hosts the
//! blocking and DMA transfer paths (see [`crate::transfer`]).

use crate::bus::{opcodes, BusWidth, ElementSize, PhaseEncoding};
use crate::controller::{
    current_mode, enter_auto, BusMode, DmaController, ManualLease, PhaseDriver, QspiController,
};
use crate::error::{Error, Result};
use crate::profile::{DeviceProfile, ProfileFeatures, ReadIdResponse, WrapSize};
use crate::transfer::{send_command, TransferContext, TransferState};

/// Minimum chip-select low pulse to leave half sleep (tXPHS)
pub const HALF_SLEEP_EXIT_PULSE_US: u32 = 12;
/// Time from the exit pulse until the device accepts commands (tXHS)
pub const HALF_SLEEP_EXIT_US: u32 = 160;

/// Default bound on every hardware wait
pub const DEFAULT_TIMEOUT_US: u32 = 10_000;
/// Default DMA channel for writes
pub const DEFAULT_DMA_WRITE_CHANNEL: u8 = 5;
/// Default DMA channel for reads
pub const DEFAULT_DMA_READ_CHANNEL: u8 = 4;

/// Engine settings that are not part of the device profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound on every status wait in microseconds
    pub timeout_us: u32,
    /// DMA channel used for writes
    pub dma_write_channel: u8,
    /// DMA channel used for reads
    pub dma_read_channel: u8,
    /// Largest DMA chunk in bytes, `None` for the profile page size
    pub dma_chunk_bytes: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_us: DEFAULT_TIMEOUT_US,
            dma_write_channel: DEFAULT_DMA_WRITE_CHANNEL,
            dma_read_channel: DEFAULT_DMA_READ_CHANNEL,
            dma_chunk_bytes: None,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<()> {
        if let Some(bytes) = self.dma_chunk_bytes {
            if bytes < 4 || bytes % 4 != 0 {
                log::error!("DMA chunk size {} must be a multiple of 4", bytes);
                return Err(Error::InvalidSize);
            }
        }
        if self.dma_write_channel == self.dma_read_channel {
            log::error!("read and write DMA channels must differ");
            return Err(Error::DmaConfig);
        }
        Ok(())
    }
}

/// Power state of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Initialized and accepting transfers
    Ready,
    /// In half sleep, only [`Psram::wakeup`] is accepted
    Sleeping,
}

/// QSPI PSRAM transfer engine
pub struct Psram<C, D> {
    pub(crate) ctrl: C,
    pub(crate) dma: D,
    pub(crate) profile: DeviceProfile,
    pub(crate) encoding: PhaseEncoding,
    pub(crate) config: EngineConfig,
    pub(crate) state: DeviceState,
    pub(crate) qpi: bool,
    pub(crate) wrap_size: u32,
    pub(crate) ctx: TransferContext,
}

impl<C: QspiController, D: DmaController> Psram<C, D> {
    /// Identify and configure the device, then hand the bus to auto mode
    pub fn init(ctrl: C, dma: D, profile: DeviceProfile, config: EngineConfig) -> Result<Self> {
        profile.validate()?;
        config.validate()?;

        let mut psram = Self {
            ctrl,
            dma,
            profile,
            encoding: PhaseEncoding::for_profile(&profile),
            config,
            state: DeviceState::Sleeping,
            qpi: false,
            wrap_size: profile.burst_wrap,
            ctx: TransferContext::default(),
        };
        psram.bring_up()?;
        Ok(psram)
    }

    fn bring_up(&mut self) -> Result<()> {
        // The device always powers up (and leaves half sleep) in SPI mode
        self.qpi = false;
        self.wrap_size = self.profile.burst_wrap;

        let resp = self.manual(BusWidth::Single, read_id_sequence)?;
        if resp.id != self.profile.id {
            log::error!(
                "unexpected device ID {:02X}/{:02X}, expected {:02X}/{:02X}",
                resp.id.manufacturer,
                resp.id.kgd,
                self.profile.id.manufacturer,
                self.profile.id.kgd
            );
            return Err(Error::DeviceMismatch {
                manufacturer: resp.id.manufacturer,
                kgd: resp.id.kgd,
            });
        }
        log::info!(
            "found PSRAM MFID 0x{:02X} KGD 0x{:02X}, {} KiB",
            resp.id.manufacturer,
            resp.id.kgd,
            self.profile.size() / 1024
        );

        if self.profile.interface == BusWidth::Quad {
            self.manual(BusWidth::Single, |drv| {
                send_command(drv, BusWidth::Single, &[opcodes::ENTER_QPI], false)
            })?;
            self.qpi = true;
        }

        if self.profile.features.contains(ProfileFeatures::MODE_REG_WRAP) {
            if let Some(wrap) = WrapSize::from_bytes(self.profile.burst_wrap) {
                self.write_wrap_size(wrap)?;
            }
        }

        self.ctrl.configure_auto(&self.profile);
        enter_auto(&mut self.ctrl, self.config.timeout_us)?;

        self.ctx.clear();
        self.state = DeviceState::Ready;
        log::debug!(
            "PSRAM ready: {} interface, wrap {} bytes, {:?} header",
            if self.qpi { "QPI" } else { "SPI" },
            self.wrap_size,
            self.encoding
        );
        Ok(())
    }

    /// Run `f` under a manual lease, restoring the prior mode afterwards
    ///
    /// Chip select is released if `f` fails.
    pub(crate) fn manual<R>(
        &mut self,
        width: BusWidth,
        f: impl FnOnce(&mut PhaseDriver<'_, C>) -> Result<R>,
    ) -> Result<R> {
        let timeout_us = self.config.timeout_us;
        let cs = self.profile.chip_select;

        let mut lease = ManualLease::acquire(&mut self.ctrl, timeout_us)?;
        let mut drv = PhaseDriver::new(lease.ctrl(), cs, timeout_us);
        drv.select_width(width);
        let result = f(&mut drv);
        if result.is_err() {
            drv.deassert();
        }

        let value = result?;
        lease.release()?;
        Ok(value)
    }

    pub(crate) fn ensure_idle(&self) -> Result<()> {
        if self.ctx.state.is_running() {
            log::debug!("rejecting request, DMA chain in flight");
            return Err(Error::Busy);
        }
        Ok(())
    }

    pub(crate) fn ensure_ready(&self) -> Result<()> {
        if self.state != DeviceState::Ready {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    fn command_width(&self) -> BusWidth {
        if self.qpi {
            BusWidth::Quad
        } else {
            BusWidth::Single
        }
    }

    fn check_command(&self, feature: ProfileFeatures) -> Result<()> {
        self.ensure_idle()?;
        self.ensure_ready()?;
        if !self.profile.features.contains(feature) {
            log::warn!("device profile does not support {:?}", feature);
            return Err(Error::InvalidProfile);
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let width = self.command_width();
        self.manual(width, |drv| send_command(drv, width, bytes, false))
    }

    /// Read the identification bytes
    ///
    /// Read ID is only defined in SPI mode, so a device in QPI mode is taken
    /// out of it for the duration of the command.
    pub fn read_id(&mut self) -> Result<ReadIdResponse> {
        self.ensure_idle()?;
        self.ensure_ready()?;

        let was_qpi = self.qpi;
        if was_qpi {
            self.exit_qpi()?;
        }
        let resp = self.manual(BusWidth::Single, read_id_sequence);
        if was_qpi {
            self.enter_qpi()?;
        }
        resp
    }

    /// Software reset followed by a full re-initialization
    ///
    /// The reset returns the device to SPI mode with its power-up wrap size,
    /// so the profile configuration is applied again afterwards.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.ensure_ready()?;

        log::info!("resetting PSRAM");
        self.send(&[opcodes::RESET_ENABLE])?;
        self.send(&[opcodes::RESET])?;
        self.state = DeviceState::Sleeping;
        self.bring_up()
    }

    /// Switch the device interface to QPI
    pub fn enter_qpi(&mut self) -> Result<()> {
        self.check_command(ProfileFeatures::QPI)?;
        if self.qpi {
            return Ok(());
        }
        self.send(&[opcodes::ENTER_QPI])?;
        self.qpi = true;
        log::debug!("PSRAM entered QPI mode");
        Ok(())
    }

    /// Switch the device interface back to SPI
    pub fn exit_qpi(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.ensure_ready()?;
        if !self.qpi {
            return Ok(());
        }
        self.send(&[opcodes::EXIT_QPI])?;
        self.qpi = false;
        log::debug!("PSRAM left QPI mode");
        Ok(())
    }

    /// Program the burst wrap size into the device mode register
    pub fn set_wrap_size(&mut self, wrap: WrapSize) -> Result<()> {
        self.check_command(ProfileFeatures::MODE_REG_WRAP)?;
        self.write_wrap_size(wrap)
    }

    fn write_wrap_size(&mut self, wrap: WrapSize) -> Result<()> {
        let width = self.command_width();
        // Mode register read: 3 address bytes, then wait cycles worth
        // 3 bytes in QPI or 1 byte in SPI
        let read_len = if self.qpi { 7 } else { 5 };
        let mut read_cmd = [0u8; 7];
        read_cmd[0] = opcodes::MODE_REG_READ;

        let mut mode = [0u8; 1];
        self.manual(width, |drv| {
            send_command(drv, width, &read_cmd[..read_len], true)?;
            drv.pump_read(&mut mode, ElementSize::Byte, width, false)
        })?;

        let value = (mode[0] & 0x9F) | (wrap.mode_bits() << 5);
        self.send(&[opcodes::MODE_REG_WRITE, 0, 0, 0, value])?;
        self.wrap_size = wrap.bytes();
        log::debug!(
            "mode register 0x{:02X} -> 0x{:02X}, wrap {} bytes",
            mode[0],
            value,
            wrap.bytes()
        );
        Ok(())
    }

    /// Toggle the burst length between the default and the toggled wrap
    ///
    /// Only valid while the device is in QPI mode.
    pub fn toggle_burst_length(&mut self) -> Result<()> {
        self.check_command(ProfileFeatures::BURST_TOGGLE)?;
        // In SPI mode the same opcode enters half sleep
        if !self.qpi {
            log::warn!("burst length toggle needs QPI mode");
            return Err(Error::InvalidProfile);
        }
        self.send(&[opcodes::BURST_LENGTH_TOGGLE])?;

        self.wrap_size = if self.wrap_size == self.profile.burst_wrap {
            self.profile.toggle_wrap
        } else {
            self.profile.burst_wrap
        };
        log::debug!("burst wrap now {} bytes", self.wrap_size);
        Ok(())
    }

    /// Put the device into half sleep
    pub fn sleep(&mut self) -> Result<()> {
        self.check_command(ProfileFeatures::HALF_SLEEP)?;
        self.exit_qpi()?;
        self.send(&[opcodes::HALF_SLEEP])?;
        self.state = DeviceState::Sleeping;
        log::info!("PSRAM in half sleep");
        Ok(())
    }

    /// Wake the device from half sleep and re-initialize it
    pub fn wakeup(&mut self) -> Result<()> {
        self.ensure_idle()?;
        if self.state == DeviceState::Ready {
            log::debug!("PSRAM already awake");
            return Ok(());
        }

        let cs = self.profile.chip_select;
        self.manual(BusWidth::Single, |drv| {
            let ctrl = drv.ctrl();
            ctrl.assert_cs(cs);
            ctrl.delay_us(HALF_SLEEP_EXIT_PULSE_US);
            ctrl.deassert_cs();
            ctrl.delay_us(HALF_SLEEP_EXIT_US);
            Ok(())
        })?;

        log::info!("PSRAM woke up");
        self.bring_up()
    }

    /// Return the device to SPI mode and give back the controllers
    pub fn deinit(mut self) -> (C, D) {
        if self.ctx.state.is_running() {
            log::warn!("deinit with a DMA chain in flight");
        }
        if self.state == DeviceState::Ready && self.qpi {
            if let Err(e) = self.send(&[opcodes::EXIT_QPI]) {
                log::warn!("failed to leave QPI mode: {}", e);
            }
        }
        (self.ctrl, self.dma)
    }

    /// Mode the controller is currently in
    pub fn bus_mode(&mut self) -> BusMode {
        current_mode(&mut self.ctrl)
    }
}

impl<C, D> Psram<C, D> {
    /// Device profile
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Power state of the device
    pub fn device_state(&self) -> DeviceState {
        self.state
    }

    /// State of the DMA transfer context
    pub fn transfer_state(&self) -> TransferState {
        self.ctx.state
    }

    /// Burst wrap size the device is currently using
    pub fn wrap_size(&self) -> u32 {
        self.wrap_size
    }

    /// Returns true while the device interface is QPI
    pub fn is_qpi(&self) -> bool {
        self.qpi
    }

    /// Header encoding selected for the profile
    pub fn encoding(&self) -> PhaseEncoding {
        self.encoding
    }
}

fn read_id_sequence<C: QspiController + ?Sized>(
    drv: &mut PhaseDriver<'_, C>,
) -> Result<ReadIdResponse> {
    let mut id = [0u8; 8];
    send_command(drv, BusWidth::Single, &[opcodes::READ_ID, 0, 0, 0], true)?;
    drv.pump_read(&mut id, ElementSize::Byte, BusWidth::Single, false)?;
    Ok(ReadIdResponse::from_bytes(&id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mock::MockQspi;
    use crate::controller::NoDma;
    use crate::profile::APS6404L_3SQR_SPI;
    use crate::transfer::{DmaBuffer, DmaStatus};

    fn engine() -> Psram<MockQspi, NoDma> {
        let mut ctrl = MockQspi::new();
        ctrl.rx.extend([0x0D, 0x5D, 1, 2, 3, 4, 5, 6]);
        Psram::init(ctrl, NoDma, APS6404L_3SQR_SPI, EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_init_ends_in_auto_mode() {
        let mut psram = engine();
        assert_eq!(psram.bus_mode(), BusMode::Auto);
        assert_eq!(psram.device_state(), DeviceState::Ready);
        assert!(!psram.is_qpi());
    }

    #[test]
    fn test_init_rejects_wrong_id() {
        let mut ctrl = MockQspi::new();
        ctrl.rx.extend([0xC2, 0x20, 0, 0, 0, 0, 0, 0]);
        let res = Psram::init(ctrl, NoDma, APS6404L_3SQR_SPI, EngineConfig::default());
        assert!(matches!(
            res,
            Err(Error::DeviceMismatch {
                manufacturer: 0xC2,
                kgd: 0x20
            })
        ));
    }

    #[test]
    fn test_invalid_size_touches_nothing() {
        let mut psram = engine();
        let before = psram.ctrl.ops.len();
        let mut buf = [0u8; 12];
        let base = psram.profile().base_address;
        assert_eq!(
            psram.read_blocking(base, &mut buf, 3, 4),
            Err(Error::InvalidSize)
        );
        assert_eq!(psram.ctrl.ops.len(), before);
    }

    #[test]
    fn test_config_validation() {
        let config = EngineConfig {
            dma_chunk_bytes: Some(6),
            ..EngineConfig::default()
        };
        let res = Psram::init(MockQspi::new(), NoDma, APS6404L_3SQR_SPI, config);
        assert!(matches!(res, Err(Error::InvalidSize)));
    }

    #[test]
    fn test_dma_setup_failure_restores_auto() {
        static STATUS: DmaStatus = DmaStatus::new();
        let mut psram = engine();
        let buf = std::boxed::Box::leak(std::vec![0u8; 32].into_boxed_slice());
        let base = psram.profile().base_address;

        let res = psram.write_dma(base, DmaBuffer::from_static(buf), 1, 32, &STATUS);
        assert_eq!(res, Err(Error::DmaConfig));
        assert_eq!(psram.transfer_state(), TransferState::Idle);
        assert_eq!(psram.bus_mode(), BusMode::Auto);
        assert!(!STATUS.is_finished());
    }

    #[test]
    fn test_sleep_blocks_transfers() {
        let mut psram = engine();
        psram.sleep().unwrap();
        assert_eq!(psram.device_state(), DeviceState::Sleeping);

        let base = psram.profile().base_address;
        assert_eq!(
            psram.write_blocking(base, &[0u8; 4], 1, 4),
            Err(Error::NotInitialized)
        );
    }
}
