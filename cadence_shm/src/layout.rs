//! In-memory layout of a shared segment.
//!
//! A segment is one memory-mapped file with three regions:
//!
//! ```text
//! | SegmentHeader | DofQueue x MAX_DOFS | HistorySlot x capacity |
//! ```
//!
//! Everything is `#[repr(C)]` with explicit padding so the layout is
//! identical across the processes mapping the file. Synchronization
//! lives inside the structures themselves: atomics in the header, a
//! spinlock word per DOF queue, and a seqlock version per history
//! slot.

use bitflags::bitflags;
use cadence_common::consts::{CACHE_LINE_SIZE, MAX_DOFS, QUEUE_CAPACITY};
use static_assertions::const_assert_eq;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64};

/// Magic number identifying a cadence segment file.
pub const SEGMENT_MAGIC: u64 = 0x4341_4445_4E43_4531; // "CADENCE1"

/// Bumped whenever the on-file layout changes incompatibly.
pub const LAYOUT_VERSION: u32 = 1;

bitflags! {
    /// Run-control flags in the segment header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        /// Back end is iterating.
        const RUNNING = 1;
        /// Cooperative stop requested; observed at tick boundaries.
        const STOP_REQUESTED = 1 << 1;
        /// Segment runs in bursting mode (front-end paced).
        const BURSTING = 1 << 2;
        /// Drop all pending and active commands at the next tick.
        const PURGE_REQUESTED = 1 << 3;
        /// At least one command was executing during the last tick.
        const LAST_TICK_ACTIVE = 1 << 4;
    }
}

/// Segment header, one cache line of metadata plus one of padding.
#[repr(C, align(64))]
pub struct SegmentHeader {
    /// Magic number for validation.
    pub magic: u64,
    /// On-file layout version.
    pub layout_version: u32,
    /// Number of active DOFs (<= MAX_DOFS).
    pub dof_count: u32,
    /// Observation history depth in ticks.
    pub history_capacity: u64,
    /// Creation timestamp (nanoseconds since epoch).
    pub created_ts: u64,
    /// Back-end process id, 0 until a back end binds.
    pub writer_pid: AtomicU32,
    /// Run-control flags (SegmentFlags bits).
    pub flags: AtomicU32,
    /// Last completed iteration, -1 before the first tick.
    ///
    /// Doubles as the publication index of the history ring: a slot
    /// is visible once this counter reaches its iteration.
    pub iteration: AtomicI64,
    /// Configured tick frequency, f64 bits.
    pub frequency_bits: AtomicU64,
    /// Next command id to allocate (segment-wide, monotonic).
    pub next_command_id: AtomicU64,
    /// Total burst iterations requested by front ends.
    pub burst_requested: AtomicU64,
    /// Total burst iterations completed by the back end.
    pub burst_done: AtomicU64,
    _padding: [u8; 48],
}

// repr(align) only takes literals; these pin them to the shared
// cache-line constant.
const_assert_eq!(core::mem::align_of::<SegmentHeader>(), CACHE_LINE_SIZE);
const_assert_eq!(core::mem::size_of::<SegmentHeader>(), 2 * CACHE_LINE_SIZE);

impl SegmentHeader {
    /// Initialize a freshly mapped header.
    pub fn init(&mut self, dof_count: u32, history_capacity: u64, frequency_hz: f64) {
        self.magic = SEGMENT_MAGIC;
        self.layout_version = LAYOUT_VERSION;
        self.dof_count = dof_count;
        self.history_capacity = history_capacity;
        self.created_ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        self.writer_pid = AtomicU32::new(0);
        self.flags = AtomicU32::new(0);
        self.iteration = AtomicI64::new(-1);
        self.frequency_bits = AtomicU64::new(frequency_hz.to_bits());
        self.next_command_id = AtomicU64::new(0);
        self.burst_requested = AtomicU64::new(0);
        self.burst_done = AtomicU64::new(0);
    }

    /// Validate magic and layout version.
    pub fn validate(&self, id: &str) -> Result<(), crate::error::SegmentError> {
        if self.magic != SEGMENT_MAGIC {
            return Err(crate::error::SegmentError::LayoutMismatch {
                id: id.to_string(),
                detail: format!("bad magic {:#018x}", self.magic),
            });
        }
        if self.layout_version != LAYOUT_VERSION {
            return Err(crate::error::SegmentError::LayoutMismatch {
                id: id.to_string(),
                detail: format!(
                    "layout version {} (expected {LAYOUT_VERSION})",
                    self.layout_version
                ),
            });
        }
        if self.dof_count == 0 || self.dof_count as usize > MAX_DOFS {
            return Err(crate::error::SegmentError::LayoutMismatch {
                id: id.to_string(),
                detail: format!("dof count {}", self.dof_count),
            });
        }
        Ok(())
    }
}

/// One pending command, as stored in a DOF queue ring.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CommandSlot {
    /// Segment-wide command id.
    pub id: u64,
    /// Target state value.
    pub target_value: f64,
    /// Resolved absolute target iteration.
    pub target_iteration: i64,
    /// Mode discriminant (see `encode_mode`).
    pub mode: u32,
    _pad: u32,
}

const_assert_eq!(core::mem::size_of::<CommandSlot>(), 32);

/// Mode wire encoding for command slots.
pub fn encode_mode(mode: cadence_common::Mode) -> u32 {
    match mode {
        cadence_common::Mode::Queue => 0,
        cadence_common::Mode::Overwrite => 1,
    }
}

/// Inverse of [`encode_mode`]; unknown values decode as Queue.
pub fn decode_mode(raw: u32) -> cadence_common::Mode {
    match raw {
        1 => cadence_common::Mode::Overwrite,
        _ => cadence_common::Mode::Queue,
    }
}

impl CommandSlot {
    /// Build a slot from command fields.
    pub fn new(id: u64, target_value: f64, target_iteration: i64, mode: u32) -> Self {
        Self {
            id,
            target_value,
            target_iteration,
            mode,
            _pad: 0,
        }
    }
}

/// Per-DOF command queue: spinlock word, ring bookkeeping and a fixed
/// ring of command slots.
///
/// All non-atomic fields are only touched while holding `lock`; the
/// lock serializes concurrent front-end enqueues against each other
/// and against the back-end consumer.
#[repr(C, align(64))]
pub struct DofQueue {
    /// Spinlock word: 0 free, 1 held.
    pub lock: AtomicU32,
    /// Number of pending commands in the ring.
    pub len: u32,
    /// Ring index of the oldest pending command.
    pub head: u32,
    /// 1 while the back end is executing a command for this DOF.
    pub active: u32,
    /// 1 when an overwrite must cancel the active command.
    pub cancel_active: u32,
    _pad: u32,
    /// Resolved target iteration of the newest pending command.
    /// Meaningful while `len > 0`.
    pub tail_iteration: i64,
    /// Target value of the newest pending command (speed-command
    /// start point for chained enqueues). Meaningful while `len > 0`.
    pub tail_value: f64,
    /// Target iteration of the command the back end is executing.
    /// Meaningful while `active == 1`.
    pub active_target_iteration: i64,
    _pad2: [u8; 16],
    /// Pending command ring.
    pub slots: [CommandSlot; QUEUE_CAPACITY],
}

const_assert_eq!(core::mem::align_of::<DofQueue>(), CACHE_LINE_SIZE);
const_assert_eq!(
    core::mem::size_of::<DofQueue>(),
    CACHE_LINE_SIZE + QUEUE_CAPACITY * core::mem::size_of::<CommandSlot>()
);

/// One observation in the history ring, guarded by a per-slot seqlock.
///
/// The writer bumps `version` to odd, fills the record, bumps it back
/// to even. Readers retry while the version is odd or changed across
/// the read, so an observation is never seen torn across DOFs.
#[repr(C, align(64))]
pub struct HistorySlot {
    /// Seqlock version: even stable, odd write in progress.
    pub version: AtomicU64,
    /// Iteration recorded in this slot.
    pub iteration: i64,
    /// Observed tick frequency at this iteration.
    pub frequency: f64,
    /// Desired state per DOF.
    pub desired: [f64; MAX_DOFS],
    /// Observed state per DOF.
    pub observed: [f64; MAX_DOFS],
}

const_assert_eq!(core::mem::size_of::<HistorySlot>(), 576);

/// Byte size of the header region.
pub const fn header_size() -> usize {
    core::mem::size_of::<SegmentHeader>()
}

/// Byte offset of DOF `dof`'s queue.
pub const fn queue_offset(dof: usize) -> usize {
    header_size() + dof * core::mem::size_of::<DofQueue>()
}

/// Byte offset of the history ring.
pub const fn history_base() -> usize {
    queue_offset(MAX_DOFS)
}

/// Byte offset of history ring slot `index`.
pub const fn slot_offset(index: usize) -> usize {
    history_base() + index * core::mem::size_of::<HistorySlot>()
}

/// Total file size for a segment with the given history depth.
pub const fn total_size(history_capacity: usize) -> usize {
    slot_offset(history_capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_regions_are_disjoint_and_ordered() {
        assert_eq!(header_size(), 128);
        assert!(queue_offset(0) == header_size());
        assert!(queue_offset(1) > queue_offset(0));
        assert!(history_base() > queue_offset(MAX_DOFS - 1));
        assert_eq!(slot_offset(0), history_base());
        assert!(total_size(16) > slot_offset(15));
    }

    #[test]
    fn alignment_is_cache_line() {
        assert_eq!(core::mem::align_of::<SegmentHeader>(), 64);
        assert_eq!(core::mem::align_of::<DofQueue>(), 64);
        assert_eq!(core::mem::align_of::<HistorySlot>(), 64);
        // Region offsets all land on cache lines.
        assert_eq!(queue_offset(3) % 64, 0);
        assert_eq!(slot_offset(7) % 64, 0);
    }

    #[test]
    fn mode_roundtrip() {
        use cadence_common::Mode;
        assert_eq!(decode_mode(encode_mode(Mode::Queue)), Mode::Queue);
        assert_eq!(decode_mode(encode_mode(Mode::Overwrite)), Mode::Overwrite);
    }
}
