//! Mapped segment handle and run-control surface.

use crate::error::{SegmentError, SegmentResult};
use crate::layout::{self, DofQueue, HistorySlot, SegmentFlags, SegmentHeader};
use memmap2::MmapMut;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

/// A mapped shared segment.
///
/// One back-end process owns the history/flags writes; any number of
/// front-end processes enqueue commands and read history through their
/// own `Segment` handles on the same file. All cross-process
/// synchronization lives in the mapped structures (atomics, per-queue
/// spinlocks, per-slot seqlocks), so every method takes `&self`.
pub struct Segment {
    id: String,
    path: PathBuf,
    mmap: MmapMut,
}

impl Segment {
    /// Wrap a mapping created by the registry. Validates the header.
    pub(crate) fn new(id: String, path: PathBuf, mmap: MmapMut) -> SegmentResult<Self> {
        let segment = Self { id, path, mmap };
        segment.header().validate(&segment.id)?;
        let expected = layout::total_size(segment.header().history_capacity as usize);
        if segment.mmap.len() != expected {
            return Err(SegmentError::LayoutMismatch {
                id: segment.id.clone(),
                detail: format!(
                    "mapped {} bytes, layout expects {expected}",
                    segment.mmap.len()
                ),
            });
        }
        Ok(segment)
    }

    /// Segment id this handle was created/attached with.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path of the backing file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Segment header reference.
    pub fn header(&self) -> &SegmentHeader {
        // Mapping is validated to be large and page-aligned enough at
        // creation.
        unsafe { &*(self.mmap.as_ptr() as *const SegmentHeader) }
    }

    /// Number of active DOFs.
    pub fn dof_count(&self) -> usize {
        self.header().dof_count as usize
    }

    /// History depth in ticks.
    pub fn history_capacity(&self) -> usize {
        self.header().history_capacity as usize
    }

    /// Last completed back-end iteration (-1 before the first tick).
    pub fn iteration(&self) -> i64 {
        self.header().iteration.load(Ordering::Acquire)
    }

    /// Configured tick frequency in Hz.
    pub fn frequency(&self) -> f64 {
        f64::from_bits(self.header().frequency_bits.load(Ordering::Acquire))
    }

    /// Record the configured tick frequency (back end, at start).
    pub fn set_frequency(&self, frequency_hz: f64) {
        self.header()
            .frequency_bits
            .store(frequency_hz.to_bits(), Ordering::Release);
    }

    /// Bind the calling process as the back-end writer.
    pub fn bind_writer(&self) {
        let pid = nix::unistd::getpid().as_raw() as u32;
        self.header().writer_pid.store(pid, Ordering::Release);
    }

    /// Pid of the bound back end, 0 if none ever bound.
    pub fn writer_pid(&self) -> u32 {
        self.header().writer_pid.load(Ordering::Acquire)
    }

    // ── Run-control flags ───────────────────────────────────────────

    fn set_flag(&self, flag: SegmentFlags, on: bool) {
        let flags = &self.header().flags;
        if on {
            flags.fetch_or(flag.bits(), Ordering::AcqRel);
        } else {
            flags.fetch_and(!flag.bits(), Ordering::AcqRel);
        }
    }

    fn has_flag(&self, flag: SegmentFlags) -> bool {
        SegmentFlags::from_bits_truncate(self.header().flags.load(Ordering::Acquire))
            .contains(flag)
    }

    /// Mark the back end as running / stopped.
    pub fn set_running(&self, running: bool) {
        self.set_flag(SegmentFlags::RUNNING, running);
        if !running {
            self.set_flag(SegmentFlags::STOP_REQUESTED, false);
        }
    }

    /// True while a back end iterates on this segment.
    pub fn is_running(&self) -> bool {
        self.has_flag(SegmentFlags::RUNNING)
    }

    /// Request a cooperative stop, honored at the next tick boundary.
    pub fn request_stop(&self) {
        self.set_flag(SegmentFlags::STOP_REQUESTED, true);
    }

    /// True once a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.has_flag(SegmentFlags::STOP_REQUESTED)
    }

    /// Switch the segment into / out of bursting mode.
    pub fn set_bursting(&self, bursting: bool) {
        self.set_flag(SegmentFlags::BURSTING, bursting);
    }

    /// True when the back end is front-end paced.
    pub fn is_bursting(&self) -> bool {
        self.has_flag(SegmentFlags::BURSTING)
    }

    /// Ask the back end to drop all pending and active commands at the
    /// next tick boundary.
    pub fn request_purge(&self) {
        self.set_flag(SegmentFlags::PURGE_REQUESTED, true);
    }

    /// Record whether any command was executing during the last tick
    /// (back end, once per tick).
    pub fn set_last_tick_active(&self, active: bool) {
        self.set_flag(SegmentFlags::LAST_TICK_ACTIVE, active);
    }

    /// True when the last back-end tick was executing a command.
    pub fn last_tick_active(&self) -> bool {
        self.has_flag(SegmentFlags::LAST_TICK_ACTIVE)
    }

    /// Consume a pending purge request (back end, once per tick).
    pub fn take_purge_request(&self) -> bool {
        let bit = SegmentFlags::PURGE_REQUESTED.bits();
        let prev = self.header().flags.fetch_and(!bit, Ordering::AcqRel);
        prev & bit != 0
    }

    // ── Bursting counters ───────────────────────────────────────────

    /// Request `n` more burst iterations (front end).
    ///
    /// Returns the previously requested total, so a caller can wait
    /// for `previous + n` completions regardless of concurrent
    /// requesters.
    pub fn request_bursts(&self, n: u64) -> u64 {
        self.header().burst_requested.fetch_add(n, Ordering::AcqRel)
    }

    /// Burst iterations requested so far.
    pub fn bursts_requested(&self) -> u64 {
        self.header().burst_requested.load(Ordering::Acquire)
    }

    /// Burst iterations the back end has completed.
    pub fn bursts_done(&self) -> u64 {
        self.header().burst_done.load(Ordering::Acquire)
    }

    /// Record one completed burst iteration (back end).
    pub fn complete_burst(&self) {
        self.header().burst_done.fetch_add(1, Ordering::AcqRel);
    }

    // ── Command ids ─────────────────────────────────────────────────

    /// Allocate the next segment-wide command id.
    ///
    /// Ids stay monotonic across front-end restarts because the
    /// counter lives in the segment, not in the client.
    pub fn next_command_id(&self) -> u64 {
        self.header().next_command_id.fetch_add(1, Ordering::AcqRel)
    }

    // ── Region pointers ─────────────────────────────────────────────

    /// Raw pointer to DOF `dof`'s queue.
    ///
    /// Callers must hold the queue spinlock before touching any
    /// non-atomic field; bounds are the caller's responsibility.
    pub(crate) fn queue_ptr(&self, dof: usize) -> *mut DofQueue {
        debug_assert!(dof < cadence_common::consts::MAX_DOFS);
        unsafe { self.mmap.as_ptr().add(layout::queue_offset(dof)) as *mut DofQueue }
    }

    /// Raw pointer to history ring slot `index` (not iteration).
    pub(crate) fn slot_ptr(&self, index: usize) -> *mut HistorySlot {
        debug_assert!(index < self.history_capacity());
        unsafe { self.mmap.as_ptr().add(layout::slot_offset(index)) as *mut HistorySlot }
    }
}
