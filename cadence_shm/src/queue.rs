//! Per-DOF command queue operations.
//!
//! Front ends enqueue under the queue spinlock; the back end pops
//! under the same lock. Time specifications are resolved to absolute
//! target iterations here, at enqueue time, while the tail snapshot
//! is pinned by the lock.

use crate::layout::{self, CommandSlot, DofQueue};
use crate::segment::Segment;
use cadence_common::consts::QUEUE_CAPACITY;
use cadence_common::{Command, CommandError, Mode, ResolveContext, State, TimeSpec};
use std::marker::PhantomData;
use std::sync::atomic::Ordering;

/// RAII spinlock guard over one DOF queue.
///
/// The lock word lives in the mapped file, so it serializes front
/// ends and the back end across process boundaries. Critical sections
/// are a handful of field accesses; contention is resolved by bounded
/// spinning with a yield fallback.
struct QueueGuard<'a> {
    queue: *mut DofQueue,
    _segment: PhantomData<&'a Segment>,
}

impl<'a> QueueGuard<'a> {
    fn lock(segment: &'a Segment, dof: usize) -> Self {
        let queue = segment.queue_ptr(dof);
        // Only the atomic lock word is touched before the lock is
        // held; a mutable reference to the queue is never formed here.
        let lock = unsafe { &(*queue).lock };
        let mut spins = 0u32;
        while lock
            .compare_exchange_weak(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spins += 1;
            if spins % 1024 == 0 {
                std::thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }
        Self {
            queue,
            _segment: PhantomData,
        }
    }

    /// Mutable view of the locked queue.
    ///
    /// Sound while the guard is held: the spinlock gives this process
    /// exclusive access to the non-atomic fields, and the mapping
    /// outlives the guard through the segment borrow.
    #[allow(clippy::mut_from_ref)]
    fn queue(&self) -> &mut DofQueue {
        unsafe { &mut *self.queue }
    }
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        let lock = unsafe { &(*self.queue).lock };
        lock.store(0, Ordering::Release);
    }
}

impl Segment {
    /// Enqueue a command for `dof`.
    ///
    /// Resolves `spec` against the queue tail (Queue mode) or the
    /// current iteration (Overwrite mode, empty queue, or `reset`),
    /// validates queue ordering, and appends or clear-and-installs.
    /// On any error the queue is left unchanged.
    pub fn enqueue(
        &self,
        dof: usize,
        target: State,
        spec: TimeSpec,
        mode: Mode,
    ) -> Result<Command, CommandError> {
        let dof_count = self.dof_count();
        if dof >= dof_count {
            return Err(CommandError::UnknownDof { dof, dof_count });
        }

        // Sampled outside the lock: only a fallback start point for
        // speed resolution when the queue is empty.
        let last_desired = self.latest_desired(dof);
        let current_iteration = self.iteration();

        let guard = QueueGuard::lock(self, dof);
        let queue = guard.queue();

        let tail = match mode {
            // Overwrite discards the queue, so it never chains.
            Mode::Overwrite => None,
            Mode::Queue if queue.len > 0 => {
                Some((queue.tail_iteration, State::new(queue.tail_value)))
            }
            Mode::Queue => None,
        };

        let ctx = ResolveContext {
            dof,
            current_iteration,
            tail,
            last_desired,
            frequency_hz: self.frequency(),
        };
        let target_iteration = spec.resolve(&ctx, target)?;

        match mode {
            Mode::Queue => {
                if queue.len as usize >= QUEUE_CAPACITY {
                    return Err(CommandError::QueueFull {
                        dof,
                        capacity: QUEUE_CAPACITY,
                    });
                }
                // Targets must strictly advance within one queue.
                let floor = match tail {
                    Some((iteration, _)) => iteration,
                    None => current_iteration,
                };
                if target_iteration <= floor {
                    return Err(CommandError::InvalidTimeSpec {
                        dof,
                        detail: format!(
                            "resolved target iteration {target_iteration} \
                             does not advance past {floor}"
                        ),
                    });
                }
            }
            Mode::Overwrite => {
                queue.len = 0;
                queue.head = 0;
                if queue.active == 1 {
                    queue.cancel_active = 1;
                }
            }
        }

        let id = self.next_command_id();
        let index = (queue.head as usize + queue.len as usize) % QUEUE_CAPACITY;
        queue.slots[index] =
            CommandSlot::new(id, target.get(), target_iteration, layout::encode_mode(mode));
        queue.len += 1;
        queue.tail_iteration = target_iteration;
        queue.tail_value = target.get();

        Ok(Command {
            id,
            dof,
            target,
            target_iteration,
            mode,
        })
    }

    /// Pop the oldest pending command for `dof` and mark it active.
    ///
    /// Back-end side. Returns `None` when nothing is pending.
    pub fn pop_next(&self, dof: usize) -> Option<Command> {
        let guard = QueueGuard::lock(self, dof);
        let queue = guard.queue();
        if queue.len == 0 {
            return None;
        }
        let slot = queue.slots[queue.head as usize];
        queue.head = (queue.head + 1) % QUEUE_CAPACITY as u32;
        queue.len -= 1;
        queue.active = 1;
        queue.cancel_active = 0;
        queue.active_target_iteration = slot.target_iteration;
        Some(Command {
            id: slot.id,
            dof,
            target: State::new(slot.target_value),
            target_iteration: slot.target_iteration,
            mode: layout::decode_mode(slot.mode),
        })
    }

    /// Consume a pending overwrite cancellation for `dof`.
    ///
    /// True when the command the back end is executing was overwritten
    /// and must be dropped before this tick interpolates.
    pub fn take_cancel(&self, dof: usize) -> bool {
        let guard = QueueGuard::lock(self, dof);
        let queue = guard.queue();
        if queue.cancel_active == 1 {
            queue.cancel_active = 0;
            queue.active = 0;
            return true;
        }
        false
    }

    /// Mark `dof` idle after its active command completed with an
    /// empty queue behind it.
    pub fn mark_idle(&self, dof: usize) {
        let guard = QueueGuard::lock(self, dof);
        guard.queue().active = 0;
    }

    /// Number of pending (not yet popped) commands for `dof`.
    pub fn pending(&self, dof: usize) -> usize {
        let guard = QueueGuard::lock(self, dof);
        guard.queue().len as usize
    }

    /// Drop every pending and active command on all DOFs.
    pub fn purge_queues(&self) {
        for dof in 0..self.dof_count() {
            let guard = QueueGuard::lock(self, dof);
            let queue = guard.queue();
            queue.len = 0;
            queue.head = 0;
            queue.active = 0;
            queue.cancel_active = 0;
        }
    }

    /// Highest resolved target iteration currently outstanding across
    /// all DOFs (pending tails and active commands).
    ///
    /// `None` when every queue is empty and idle. This is what
    /// `pulse_and_wait` waits for.
    pub fn outstanding_target(&self) -> Option<i64> {
        let mut max: Option<i64> = None;
        for dof in 0..self.dof_count() {
            let guard = QueueGuard::lock(self, dof);
            let queue = guard.queue();
            let candidate = if queue.len > 0 {
                Some(queue.tail_iteration)
            } else if queue.active == 1 {
                Some(queue.active_target_iteration)
            } else {
                None
            };
            if let Some(value) = candidate {
                max = Some(max.map_or(value, |m: i64| m.max(value)));
            }
        }
        max
    }
}
