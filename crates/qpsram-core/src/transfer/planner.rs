//! Chunk planning
//!
//! A transfer is split into chunks that never exceed the per-transfer
//! limits and never run across the device's burst wrap boundary, since a
//! burst that crosses it wraps back to the start of the window and
//! corrupts data.

use crate::bus::ElementSize;

/// Position inside the device's wrap window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WrapState {
    /// Wrap size in bytes (0 = no wrap)
    pub wrap_size: u32,
    /// Offset of the next byte inside the current window
    pub offset: u32,
}

impl WrapState {
    /// State for a transfer starting at device offset `addr`
    pub const fn at(addr: u32, wrap_size: u32) -> Self {
        let offset = if wrap_size == 0 { 0 } else { addr % wrap_size };
        Self { wrap_size, offset }
    }

    /// Bytes left before the next wrap boundary, if wrapping is enabled
    pub const fn room(&self) -> Option<u32> {
        if self.wrap_size == 0 {
            None
        } else {
            Some(self.wrap_size - self.offset)
        }
    }

    /// Advance past `bytes` transferred bytes
    pub const fn advance(self, bytes: u32) -> Self {
        if self.wrap_size == 0 {
            return self;
        }
        Self {
            wrap_size: self.wrap_size,
            offset: (self.offset + bytes % self.wrap_size) % self.wrap_size,
        }
    }
}

/// Size limits applied to every chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    /// Largest chunk in bytes
    pub max_bytes: u32,
    /// Largest chunk in elements
    pub max_elements: u32,
}

impl ChunkLimits {
    /// Limits for the blocking path: one device page per transaction
    pub const fn blocking(page_size: u32) -> Self {
        Self {
            max_bytes: page_size,
            max_elements: u32::MAX,
        }
    }

    /// Limits for the DMA path
    pub const fn dma(max_bytes: u32, max_elements: u32) -> Self {
        Self {
            max_bytes,
            max_elements,
        }
    }
}

/// Compute the next chunk size and the wrap state after it
///
/// The chunk is the largest whole number of elements that fits the limits
/// and the remaining byte count. With wrapping enabled, a chunk that would
/// cross the boundary is shortened to end on it; if not even one element
/// fits before the boundary, one element is sent anyway so the transfer
/// keeps making progress.
pub fn plan_chunk(
    remaining: u32,
    wrap: WrapState,
    elem: ElementSize,
    limits: ChunkLimits,
) -> (u32, WrapState) {
    let elem_bytes = elem.bytes();
    let max_elem_bytes = limits.max_elements.saturating_mul(elem_bytes);

    let mut bytes = remaining.min(limits.max_bytes).min(max_elem_bytes);
    bytes -= bytes % elem_bytes;

    if let Some(room) = wrap.room() {
        if bytes > room {
            bytes = room - room % elem_bytes;
            if bytes == 0 {
                bytes = elem_bytes.min(remaining - remaining % elem_bytes);
            }
        }
    }

    (bytes, wrap.advance(bytes))
}

/// One planned chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Device address of the first byte
    pub addr: u32,
    /// Offset of the first byte inside the caller's buffer
    pub offset: u32,
    /// Chunk length in bytes
    pub bytes: u32,
    /// Chunk length in elements
    pub elements: u32,
}

/// Iterator over the chunks of one transfer
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    addr: u32,
    done: u32,
    remaining: u32,
    wrap: WrapState,
    elem: ElementSize,
    limits: ChunkLimits,
}

impl ChunkPlanner {
    /// Plan a transfer of `bytes` bytes starting at `addr`
    ///
    /// The wrap window is measured from address 0; use
    /// [`ChunkPlanner::wrap_origin`] when `addr` is a bus address.
    pub const fn new(
        addr: u32,
        bytes: u32,
        wrap_size: u32,
        elem: ElementSize,
        limits: ChunkLimits,
    ) -> Self {
        Self {
            addr,
            done: 0,
            remaining: bytes,
            wrap: WrapState::at(addr, wrap_size),
            elem,
            limits,
        }
    }

    /// Measure the wrap window from `origin` instead of address 0
    ///
    /// The device wraps on its own offsets, so a bus address has to be
    /// rebased on the window the device is mapped at.
    pub const fn wrap_origin(mut self, origin: u32) -> Self {
        self.wrap = WrapState::at(self.addr.wrapping_sub(origin), self.wrap.wrap_size);
        self
    }

    /// Bytes not yet handed out
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Current wrap state
    pub const fn wrap(&self) -> WrapState {
        self.wrap
    }

    /// Element size of the transfer
    pub const fn element_size(&self) -> ElementSize {
        self.elem
    }
}

impl Iterator for ChunkPlanner {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let (bytes, wrap) = plan_chunk(self.remaining, self.wrap, self.elem, self.limits);
        if bytes == 0 {
            return None;
        }

        let chunk = Chunk {
            addr: self.addr,
            offset: self.done,
            bytes,
            elements: bytes / self.elem.bytes(),
        };
        self.addr = self.addr.wrapping_add(bytes);
        self.done += bytes;
        self.remaining -= bytes;
        self.wrap = wrap;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn sizes(planner: ChunkPlanner) -> Vec<u32> {
        planner.map(|c| c.bytes).collect()
    }

    #[test]
    fn test_wrap_boundary_splits_chunks() {
        // 40 bytes from offset 0 of a 32-byte window, 16-byte pages
        let p = ChunkPlanner::new(0, 40, 32, ElementSize::Byte, ChunkLimits::blocking(16));
        assert_eq!(sizes(p), [16, 16, 8]);

        // Starting 24 bytes into the window the first chunk ends on the boundary
        let p = ChunkPlanner::new(24, 40, 32, ElementSize::Byte, ChunkLimits::blocking(16));
        assert_eq!(sizes(p), [8, 16, 16]);
    }

    #[test]
    fn test_chunks_cover_transfer() {
        let limits = ChunkLimits::dma(64, 1024);
        for (addr, len, wrap) in [(0, 1000, 32), (5, 333, 64), (30, 4096, 1024), (0, 17, 0)] {
            let planner = ChunkPlanner::new(addr, len, wrap, ElementSize::Byte, limits);
            let mut expect_addr = addr;
            let mut total = 0;
            for c in planner {
                assert!(c.bytes > 0 && c.bytes <= 64);
                assert_eq!(c.addr, expect_addr);
                if wrap != 0 {
                    assert!(c.addr % wrap + c.bytes <= wrap);
                }
                expect_addr += c.bytes;
                total += c.bytes;
            }
            assert_eq!(total, len);
        }
    }

    #[test]
    fn test_wrap_measured_from_origin() {
        // Window mapped 0x200 bytes past a 1024-byte wrap boundary
        let base = 0x0A00_0200;
        let limits = ChunkLimits::blocking(16);
        let p = ChunkPlanner::new(base + 1000, 40, 1024, ElementSize::Byte, limits)
            .wrap_origin(base);
        for c in p.clone() {
            let offset = c.addr - base;
            assert!(offset % 1024 + c.bytes <= 1024);
        }
        assert_eq!(sizes(p), [16, 8, 16]);
    }

    #[test]
    fn test_element_limit() {
        let p = ChunkPlanner::new(0, 8192, 0, ElementSize::Word, ChunkLimits::dma(8192, 1024));
        assert_eq!(sizes(p), [4096, 4096]);
    }

    #[test]
    fn test_wrap_offset_tracked_across_windows() {
        let (bytes, wrap) = plan_chunk(
            100,
            WrapState::at(0, 32),
            ElementSize::Byte,
            ChunkLimits::blocking(24),
        );
        assert_eq!((bytes, wrap.offset), (24, 24));

        let (bytes, wrap) = plan_chunk(76, wrap, ElementSize::Byte, ChunkLimits::blocking(24));
        assert_eq!((bytes, wrap.offset), (8, 0));

        let (bytes, wrap) = plan_chunk(68, wrap, ElementSize::Byte, ChunkLimits::blocking(24));
        assert_eq!((bytes, wrap.offset), (24, 24));
    }

    #[test]
    fn test_no_room_sends_one_element() {
        // Two bytes before the boundary cannot hold a word
        let (bytes, wrap) = plan_chunk(
            16,
            WrapState::at(30, 32),
            ElementSize::Word,
            ChunkLimits::blocking(16),
        );
        assert_eq!(bytes, 4);
        assert_eq!(wrap.offset, 2);
    }

    #[test]
    fn test_no_wrap_uses_limits_only() {
        let p = ChunkPlanner::new(3, 100, 0, ElementSize::HalfWord, ChunkLimits::blocking(16));
        let v = sizes(p);
        assert_eq!(v.len(), 7);
        assert!(v[..6].iter().all(|&b| b == 16));
        assert_eq!(v[6], 4);
    }
}
