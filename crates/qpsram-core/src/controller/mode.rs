//! Auto/manual mode arbitration
//!
//! The controller serves the memory-mapped window in auto mode and accepts
//! FIFO transactions in manual mode. Every manual access is bracketed by
//! [`enter_manual`] and a restore of the mode that was active before it.

use super::wait::{wait_for_clear, wait_for_set};
use super::{QspiController, QspiStatus};
use crate::error::Result;

/// Controller bus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusMode {
    /// Memory-mapped accesses are served by the controller state machine
    #[default]
    Auto,
    /// Software drives transactions through the FIFO
    Manual,
}

/// Current bus mode as seen from the mode register
pub fn current_mode<C: QspiController + ?Sized>(ctrl: &mut C) -> BusMode {
    if ctrl.status().contains(QspiStatus::HW_CONTROLLED) || ctrl.auto_mode_enabled() {
        BusMode::Auto
    } else {
        BusMode::Manual
    }
}

/// Switch the controller to manual mode
///
/// Returns the mode that was active before the call. When the mode is
/// pinned by hardware nothing is changed and `Auto` is reported.
pub fn enter_manual<C: QspiController + ?Sized>(ctrl: &mut C, timeout_us: u32) -> Result<BusMode> {
    wait_for_set(ctrl, timeout_us, "auto FSM idle", QspiStatus::AUTO_FSM_IDLE)?;

    if ctrl.status().contains(QspiStatus::HW_CONTROLLED) {
        log::trace!("QSPI mode is hardware controlled");
        return Ok(BusMode::Auto);
    }
    if !ctrl.auto_mode_enabled() {
        return Ok(BusMode::Manual);
    }

    ctrl.set_auto_mode(false);
    wait_for_clear(ctrl, timeout_us, "auto mode exit", QspiStatus::AUTO_MODE_ACTIVE)?;
    log::trace!("QSPI switched to manual mode");
    Ok(BusMode::Auto)
}

/// Switch the controller to auto mode
///
/// Returns the mode that was active before the call. Chip select must be
/// released before the controller is handed back to the state machine.
pub fn enter_auto<C: QspiController + ?Sized>(ctrl: &mut C, timeout_us: u32) -> Result<BusMode> {
    wait_for_set(ctrl, timeout_us, "auto FSM idle", QspiStatus::AUTO_FSM_IDLE)?;

    if ctrl.status().contains(QspiStatus::HW_CONTROLLED) || ctrl.auto_mode_enabled() {
        return Ok(BusMode::Auto);
    }

    wait_for_set(ctrl, timeout_us, "chip select release", QspiStatus::CS_RELEASED)?;
    ctrl.set_auto_mode(true);
    log::trace!("QSPI switched to auto mode");
    Ok(BusMode::Manual)
}

/// Put the controller back into `prior`
pub fn restore<C: QspiController + ?Sized>(
    ctrl: &mut C,
    prior: BusMode,
    timeout_us: u32,
) -> Result<()> {
    match prior {
        BusMode::Auto => enter_auto(ctrl, timeout_us).map(|_| ()),
        BusMode::Manual => Ok(()),
    }
}

/// Scoped manual-mode access
///
/// Holding a lease keeps the controller in manual mode. Dropping it, or
/// calling [`ManualLease::release`], restores the mode that was active when
/// the lease was taken, on every exit path.
pub struct ManualLease<'a, C: QspiController + ?Sized> {
    ctrl: &'a mut C,
    prior: BusMode,
    timeout_us: u32,
    released: bool,
}

impl<'a, C: QspiController + ?Sized> ManualLease<'a, C> {
    /// Enter manual mode and remember the prior mode
    pub fn acquire(ctrl: &'a mut C, timeout_us: u32) -> Result<Self> {
        let prior = enter_manual(ctrl, timeout_us)?;
        Ok(Self {
            ctrl,
            prior,
            timeout_us,
            released: false,
        })
    }

    /// Mode that will be restored
    pub fn prior(&self) -> BusMode {
        self.prior
    }

    /// Controller borrowed for the duration of the lease
    pub fn ctrl(&mut self) -> &mut C {
        self.ctrl
    }

    /// Restore the prior mode and report the outcome
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        restore(self.ctrl, self.prior, self.timeout_us)
    }
}

impl<C: QspiController + ?Sized> Drop for ManualLease<'_, C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = restore(self.ctrl, self.prior, self.timeout_us) {
            log::warn!("failed to restore QSPI {:?} mode: {}", self.prior, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::mock::{MockQspi, Op};
    use crate::error::Error;

    #[test]
    fn test_enter_manual_reports_prior_mode() {
        let mut ctrl = MockQspi::in_auto();
        assert_eq!(enter_manual(&mut ctrl, 100), Ok(BusMode::Auto));
        assert!(!ctrl.auto);
        assert_eq!(enter_manual(&mut ctrl, 100), Ok(BusMode::Manual));
        assert_eq!(ctrl.ops, [Op::SetAuto(false)]);
    }

    #[test]
    fn test_hardware_controlled_is_left_alone() {
        let mut ctrl = MockQspi::new();
        ctrl.hw_controlled = true;
        assert_eq!(enter_manual(&mut ctrl, 100), Ok(BusMode::Auto));
        assert_eq!(enter_auto(&mut ctrl, 100), Ok(BusMode::Auto));
        assert!(ctrl.ops.is_empty());
    }

    #[test]
    fn test_enter_auto_waits_for_cs_release() {
        let mut ctrl = MockQspi::new();
        ctrl.cs_asserted = true;
        assert_eq!(enter_auto(&mut ctrl, 50), Err(Error::Timeout));
        assert_eq!(ctrl.elapsed_us, 50);
        assert!(!ctrl.auto);

        ctrl.cs_asserted = false;
        assert_eq!(enter_auto(&mut ctrl, 50), Ok(BusMode::Manual));
        assert!(ctrl.auto);
    }

    #[test]
    fn test_lease_restores_prior_mode() {
        let mut ctrl = MockQspi::in_auto();
        {
            let mut lease = ManualLease::acquire(&mut ctrl, 100).unwrap();
            assert_eq!(lease.prior(), BusMode::Auto);
            assert!(!lease.ctrl().auto);
        }
        assert!(ctrl.auto);

        let mut ctrl = MockQspi::new();
        let lease = ManualLease::acquire(&mut ctrl, 100).unwrap();
        assert_eq!(lease.prior(), BusMode::Manual);
        lease.release().unwrap();
        assert!(!ctrl.auto);
        assert!(ctrl.ops.is_empty());
    }
}
