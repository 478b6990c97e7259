//! In-flight DMA transfer state

use core::sync::atomic::{AtomicU8, Ordering};

use super::planner::ChunkPlanner;
use crate::bus::Direction;

/// State of the engine's DMA transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferState {
    /// No transfer in flight
    #[default]
    Idle,
    /// A DMA write chain is running
    WriteRunning,
    /// A DMA read chain is running
    ReadRunning,
    /// The last chain stopped on an error
    Failed,
}

impl TransferState {
    /// Returns true while a chain is in flight
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::WriteRunning | Self::ReadRunning)
    }

    /// Direction of the running chain
    pub const fn direction(&self) -> Option<Direction> {
        match self {
            Self::WriteRunning => Some(Direction::Write),
            Self::ReadRunning => Some(Direction::Read),
            _ => None,
        }
    }

    pub(crate) const fn running(dir: Direction) -> Self {
        match dir {
            Direction::Write => Self::WriteRunning,
            Direction::Read => Self::ReadRunning,
        }
    }
}

/// Completion value reported for a DMA transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DmaState {
    /// Nothing reported yet
    None = 0,
    /// Every chunk completed
    Done = 1,
    /// The chain stopped on an error
    Fail = 2,
}

/// Completion status written by the interrupt path
///
/// The engine holds a `'static` reference for the duration of a chain and
/// writes the final state exactly once. Mainline code polls it.
#[derive(Debug)]
pub struct DmaStatus(AtomicU8);

impl DmaStatus {
    /// Create a status holding [`DmaState::None`]
    pub const fn new() -> Self {
        Self(AtomicU8::new(DmaState::None as u8))
    }

    /// Current state
    pub fn get(&self) -> DmaState {
        match self.0.load(Ordering::Acquire) {
            1 => DmaState::Done,
            2 => DmaState::Fail,
            _ => DmaState::None,
        }
    }

    /// Returns true once the chain has finished, either way
    pub fn is_finished(&self) -> bool {
        self.get() != DmaState::None
    }

    /// Clear the status before reusing it for another transfer
    pub fn reset(&self) {
        self.0.store(DmaState::None as u8, Ordering::Release);
    }

    pub(crate) fn set(&self, state: DmaState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for DmaStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Host memory handed to a DMA transfer
///
/// The buffer is kept as a bus address because the DMA engine reads or
/// writes it after the call that started the chain has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaBuffer {
    addr: usize,
    len: usize,
}

impl DmaBuffer {
    /// Buffer that lives for the whole program
    pub fn from_static(buf: &'static mut [u8]) -> Self {
        Self {
            addr: buf.as_mut_ptr() as usize,
            len: buf.len(),
        }
    }

    /// Buffer from a raw pointer
    ///
    /// # Safety
    ///
    /// `ptr` must be null or valid for reads and writes of `len` bytes until
    /// the transfer using it has completed, and nothing else may access the
    /// memory in that time.
    pub unsafe fn from_raw(ptr: *mut u8, len: usize) -> Self {
        Self {
            addr: ptr as usize,
            len,
        }
    }

    /// Bus address of the first byte
    pub const fn addr(&self) -> usize {
        self.addr
    }

    /// Length in bytes
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true for a zero-length buffer
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Engine-owned state of the current DMA chain
#[derive(Debug, Default)]
pub struct TransferContext {
    /// Chain state
    pub state: TransferState,
    /// Remaining chunks, `None` when idle
    pub planner: Option<ChunkPlanner>,
    /// Host address of the start of the caller's buffer
    pub buffer: usize,
    /// DMA channel serving the chain
    pub channel: u8,
    /// Caller's completion status
    pub status: Option<&'static DmaStatus>,
}

impl TransferContext {
    /// Bytes not yet issued to DMA
    pub fn remaining(&self) -> u32 {
        self.planner.as_ref().map_or(0, ChunkPlanner::remaining)
    }

    /// Drop the chain and go back to idle
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Finish the chain and report `state` to the caller
    pub(crate) fn finish(&mut self, state: TransferState, report: DmaState) {
        let status = self.status.take();
        self.state = state;
        self.planner = None;
        if let Some(status) = status {
            status.set(report);
        }
    }
}
