//! Per-DOF command consumption and desired-state generation.
//!
//! Each degree of freedom owns one [`DofController`]. Every tick the
//! controller drains overwrite cancellations, activates the next queued
//! command when idle, and produces the desired state: interpolated while
//! a command is in flight, snapped exactly at the target iteration, held
//! at the last desired value when no command is pending.

use cadence_common::State;
use cadence_shm::Segment;

use crate::interpolation::interpolate;

/// The command currently shaping one DOF's trajectory.
#[derive(Debug, Clone, Copy)]
struct ActiveCommand {
    id: u64,
    start: State,
    start_iteration: i64,
    target: State,
    target_iteration: i64,
}

/// Desired-state generator for a single degree of freedom.
pub struct DofController {
    dof: usize,
    desired: State,
    active: Option<ActiveCommand>,
    executed_last_tick: bool,
}

impl DofController {
    /// A controller holding at zero with no active command.
    pub fn new(dof: usize) -> Self {
        Self {
            dof,
            desired: State::default(),
            active: None,
            executed_last_tick: false,
        }
    }

    /// Drop the active command; the desired state holds where it is.
    ///
    /// Pending queue entries are dropped separately by the segment
    /// purge.
    pub fn reset(&mut self) {
        self.active = None;
        self.executed_last_tick = false;
    }

    /// True when the previous tick was shaped by a command.
    pub fn executed_last_tick(&self) -> bool {
        self.executed_last_tick
    }

    /// Id of the command currently in flight, if any.
    pub fn active_command_id(&self) -> Option<u64> {
        self.active.map(|a| a.id)
    }

    /// Produce the desired state for `iteration`.
    ///
    /// `iteration` is the tick being computed, one past the segment's
    /// last published iteration.
    pub fn tick(&mut self, segment: &Segment, iteration: i64) -> State {
        if segment.take_cancel(self.dof) {
            // The in-flight command was overwritten. Its replacement is
            // already queued and activates below, starting from the
            // current desired value.
            self.active = None;
        }

        if self.active.is_none()
            && let Some(command) = segment.pop_next(self.dof)
        {
            // Lazily activate: the previous output was produced at
            // iteration - 1, so that is the interpolation start point.
            self.active = Some(ActiveCommand {
                id: command.id,
                start: self.desired,
                start_iteration: iteration - 1,
                target: command.target,
                target_iteration: command.target_iteration,
            });
        }

        let Some(active) = self.active else {
            self.executed_last_tick = false;
            return self.desired;
        };
        self.executed_last_tick = true;

        if iteration >= active.target_iteration {
            // Due this tick (or overdue after a skipped tick): snap to
            // the target exactly, then stage the successor so it
            // interpolates from this tick onward.
            self.desired = active.target;
            match segment.pop_next(self.dof) {
                Some(next) => {
                    self.active = Some(ActiveCommand {
                        id: next.id,
                        start: self.desired,
                        start_iteration: iteration,
                        target: next.target,
                        target_iteration: next.target_iteration,
                    });
                }
                None => {
                    self.active = None;
                    segment.mark_idle(self.dof);
                }
            }
        } else {
            self.desired = interpolate(
                active.start,
                active.start_iteration,
                active.target,
                active.target_iteration,
                iteration,
            );
        }
        self.desired
    }
}
