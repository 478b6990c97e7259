//! Transfer paths
//!
//! This module provides the chunk planner, the blocking (CPU FIFO) path and
//! the DMA path with completion chaining. Both paths validate the request
//! the same way before touching the controller.

mod blocking;
mod context;
mod dma;
mod header;
mod planner;

pub use context::{DmaBuffer, DmaState, DmaStatus, TransferContext, TransferState};
pub use dma::ChainStep;
pub use planner::{plan_chunk, Chunk, ChunkLimits, ChunkPlanner, WrapState};

pub(crate) use header::{drive_header, send_command};

use crate::bus::ElementSize;
use crate::error::{Error, Result};
use crate::profile::DeviceProfile;

/// A validated transfer request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Request {
    pub addr: u32,
    pub elem: ElementSize,
    pub bytes: u32,
}

/// Check a request against the profile without touching the hardware
///
/// `buffer` is the caller's buffer as `(address, length)`; a zero address
/// is reported as [`Error::NullBuffer`].
pub(crate) fn validate_request(
    profile: &DeviceProfile,
    addr: u32,
    buffer: (usize, usize),
    elem_size: u8,
    count: u32,
) -> Result<Request> {
    let elem = ElementSize::try_from(elem_size)?;
    let (buf_addr, buf_len) = buffer;
    if buf_addr == 0 {
        return Err(Error::NullBuffer);
    }

    let bytes = count as u64 * elem.bytes() as u64;
    if (buf_len as u64) < bytes {
        return Err(Error::BufferTooSmall);
    }
    if !profile.contains(addr, bytes) {
        log::debug!(
            "0x{:08x}+{} outside 0x{:08x}..0x{:08x}",
            addr,
            bytes,
            profile.base_address,
            profile.end_address()
        );
        return Err(Error::OutOfRange);
    }

    Ok(Request {
        addr,
        elem,
        bytes: bytes as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::APS6404L_3SQR;

    const BASE: u32 = APS6404L_3SQR.base_address;

    #[test]
    fn test_validate_order() {
        let p = APS6404L_3SQR;
        assert_eq!(
            validate_request(&p, 0, (0, 0), 3, 1),
            Err(Error::InvalidSize)
        );
        assert_eq!(
            validate_request(&p, BASE, (0, 16), 1, 16),
            Err(Error::NullBuffer)
        );
        assert_eq!(
            validate_request(&p, BASE, (0x2000_0000, 15), 1, 16),
            Err(Error::BufferTooSmall)
        );
        assert_eq!(
            validate_request(&p, BASE - 4, (0x2000_0000, 16), 4, 4),
            Err(Error::OutOfRange)
        );
    }

    #[test]
    fn test_validate_end_of_window() {
        let p = APS6404L_3SQR;
        let last = BASE + p.size() - 8;
        let req = validate_request(&p, last, (0x2000_0000, 8), 2, 4).unwrap();
        assert_eq!(req.bytes, 8);
        assert_eq!(req.elem, ElementSize::HalfWord);
        assert_eq!(
            validate_request(&p, last, (0x2000_0000, 12), 4, 3),
            Err(Error::OutOfRange)
        );
    }
}
