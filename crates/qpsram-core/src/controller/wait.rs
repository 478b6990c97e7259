//! Bounded polling on controller status

use super::{QspiController, QspiStatus};
use crate::error::{Error, Result};

/// Delay between two status polls
pub const POLL_INTERVAL_US: u32 = 1;

/// Poll `cond` until it holds or `timeout_us` has elapsed
///
/// The controller's delay is used between polls, so the budget is in
/// wall-clock microseconds rather than iterations.
pub fn wait_until<C, F>(ctrl: &mut C, timeout_us: u32, what: &str, mut cond: F) -> Result<()>
where
    C: QspiController + ?Sized,
    F: FnMut(&mut C) -> bool,
{
    let mut remaining = timeout_us;

    loop {
        if cond(ctrl) {
            return Ok(());
        }

        if remaining == 0 {
            log::warn!("QSPI timeout waiting for {}", what);
            return Err(Error::Timeout);
        }

        ctrl.delay_us(POLL_INTERVAL_US);
        remaining = remaining.saturating_sub(POLL_INTERVAL_US);
    }
}

/// Wait until every flag in `flags` is set
pub fn wait_for_set<C>(ctrl: &mut C, timeout_us: u32, what: &str, flags: QspiStatus) -> Result<()>
where
    C: QspiController + ?Sized,
{
    wait_until(ctrl, timeout_us, what, |c| c.status().contains(flags))
}

/// Wait until every flag in `flags` is clear
pub fn wait_for_clear<C>(
    ctrl: &mut C,
    timeout_us: u32,
    what: &str,
    flags: QspiStatus,
) -> Result<()>
where
    C: QspiController + ?Sized,
{
    wait_until(ctrl, timeout_us, what, |c| !c.status().intersects(flags))
}
