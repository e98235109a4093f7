//! Client side of a segment: enqueue commands, read history, pace
//! bursting back ends.

use std::cell::Cell;
use std::time::{Duration, Instant};

use cadence_common::consts::NOT_STARTED_ITERATION;
use cadence_common::{Command, Mode, Observation, State, TimeSpec};
use cadence_shm::{HistoryIter, Segment, SegmentRegistry};

use crate::error::{ControlError, ControlResult};

/// How a front end waits on the back end.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    /// Sleep between polls of the segment.
    pub interval: Duration,
    /// Give up after this much total waiting.
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// One client attached to a segment.
///
/// Any number of front ends may attach to the same segment, from any
/// process. Enqueues on the same DOF are serialized by the segment;
/// reads never block the writer.
pub struct FrontEnd {
    segment: Segment,
    wait_policy: WaitPolicy,
    next_reference: Option<i64>,
    // Per-DOF highest target iteration enqueued through this handle;
    // an overwrite replaces its DOF entry. Keeps pulse_and_wait
    // correct even when the back end has already pulled a command out
    // of the queue mid-tick.
    last_targets: Vec<Cell<i64>>,
}

impl FrontEnd {
    /// Attach to the segment registered under `id`.
    pub fn attach(registry: &SegmentRegistry, id: &str) -> ControlResult<Self> {
        let segment = registry.attach(id)?;
        let last_targets = (0..segment.dof_count())
            .map(|_| Cell::new(NOT_STARTED_ITERATION))
            .collect();
        Ok(Self {
            segment,
            wait_policy: WaitPolicy::default(),
            next_reference: None,
            last_targets,
        })
    }

    /// Replace the default wait policy.
    pub fn set_wait_policy(&mut self, policy: WaitPolicy) {
        self.wait_policy = policy;
    }

    /// The underlying segment.
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Number of degrees of freedom.
    pub fn dof_count(&self) -> usize {
        self.segment.dof_count()
    }

    /// Configured back-end tick frequency [Hz].
    ///
    /// The measured rate of a running back end is recorded per tick in
    /// [`Observation::frequency`].
    pub fn get_frequency(&self) -> f64 {
        self.segment.frequency()
    }

    /// True while a back end iterates on this segment.
    pub fn backend_is_running(&self) -> bool {
        self.segment.is_running()
    }

    /// True when the back end's last tick was shaped by a command.
    pub fn backend_is_active(&self) -> bool {
        self.segment.last_tick_active()
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Enqueue one command for `dof`.
    ///
    /// `spec` may be a [`TimeSpec`] or `None`, which applies the
    /// target on the very next tick. The command takes effect without
    /// any further call; the returned [`Command`] carries the resolved
    /// target iteration.
    pub fn add_command(
        &self,
        dof: usize,
        target: State,
        spec: impl Into<Option<TimeSpec>>,
        mode: Mode,
    ) -> ControlResult<Command> {
        let spec = spec.into().unwrap_or(TimeSpec::Direct);
        let command = self.segment.enqueue(dof, target, spec, mode)?;
        let slot = &self.last_targets[command.dof];
        match mode {
            Mode::Queue => slot.set(slot.get().max(command.target_iteration)),
            Mode::Overwrite => slot.set(command.target_iteration),
        }
        Ok(command)
    }

    /// Overwrite every DOF with an immediate return to zero.
    pub fn add_reinit_command(&self) -> ControlResult<()> {
        for dof in 0..self.segment.dof_count() {
            self.add_command(dof, State::default(), TimeSpec::Direct, Mode::Overwrite)?;
        }
        Ok(())
    }

    /// Ask the back end to drop all pending and active commands at its
    /// next tick.
    pub fn purge(&self) {
        self.segment.request_purge();
        for slot in &self.last_targets {
            slot.set(NOT_STARTED_ITERATION);
        }
    }

    /// Ask the back end to stop at its next tick boundary.
    pub fn please_stop(&self) {
        self.segment.request_stop();
    }

    // ── Observations ────────────────────────────────────────────────

    /// Latest published observation, or the not-started sentinel.
    pub fn read(&self) -> Observation {
        self.segment.read_latest()
    }

    /// All retained observations with iteration >= `since`, oldest
    /// first. Requests older than the retained window are clipped to
    /// it.
    pub fn get_observations_since(&self, since: i64) -> HistoryIter<'_> {
        self.segment.observations_since(since)
    }

    /// Up to `count` most recent observations, oldest first.
    pub fn get_latest_observations(&self, count: usize) -> Vec<Observation> {
        let newest = self.segment.iteration();
        if newest < 0 || count == 0 {
            return Vec::new();
        }
        let since = (newest - count as i64 + 1).max(0);
        self.segment.observations_since(since).collect()
    }

    /// Block until an observation newer than the last one returned by
    /// this method is published, and return it.
    ///
    /// The first call waits for the first observation published after
    /// the call. Consecutive calls step through iterations one at a
    /// time, so a slow caller falls behind rather than skipping; if the
    /// requested iteration has already been evicted the latest
    /// observation is returned instead.
    pub fn wait_for_next(&mut self) -> ControlResult<Observation> {
        let reference = self
            .next_reference
            .unwrap_or_else(|| self.segment.iteration() + 1);
        self.wait_until(|| self.segment.iteration() >= reference)?;
        self.next_reference = Some(reference + 1);
        Ok(self
            .segment
            .read_observation(reference)
            .unwrap_or_else(|| self.segment.read_latest()))
    }

    /// Forget the [`wait_for_next`](Self::wait_for_next) position; the
    /// next call starts from the live iteration again.
    pub fn reset_next_index(&mut self) {
        self.next_reference = None;
    }

    // ── Pacing ──────────────────────────────────────────────────────

    /// Run a bursting back end for exactly `ticks` iterations and
    /// return the observation published by the last one.
    ///
    /// Fails with [`ControlError::NotBursting`] when the segment is
    /// wall-clock paced.
    pub fn burst(&self, ticks: u64) -> ControlResult<Observation> {
        if !self.segment.is_bursting() {
            return Err(ControlError::NotBursting {
                id: self.segment.id().to_owned(),
            });
        }
        if ticks == 0 {
            return Ok(self.segment.read_latest());
        }
        // The fetch-add result pins this caller's slice of the burst
        // counter even when other front ends request concurrently.
        let target = self.segment.request_bursts(ticks) + ticks;
        self.wait_until(|| self.segment.bursts_done() >= target)?;
        Ok(self.segment.read_latest())
    }

    /// One exchange with the back end.
    ///
    /// On a bursting segment with a live back end this triggers exactly
    /// one tick; otherwise it returns the latest observation without
    /// waiting.
    pub fn pulse(&self) -> ControlResult<Observation> {
        if self.segment.is_bursting() && self.segment.is_running() {
            self.burst(1)
        } else {
            Ok(self.segment.read_latest())
        }
    }

    /// Block until the back-end iteration reaches the highest target
    /// outstanding at call time, and return the latest observation.
    ///
    /// The target is the maximum of the queued/active targets visible
    /// in the segment and of everything enqueued through this handle;
    /// the latter covers the window in which the back end has already
    /// pulled a command out of the queue but not yet published its
    /// completing tick. On a bursting segment the required ticks are
    /// requested explicitly; on a clocked segment the call polls under
    /// the wait policy and fails with [`ControlError::Timeout`] if the
    /// back end does not get there in time.
    pub fn pulse_and_wait(&self) -> ControlResult<Observation> {
        let own_target = self
            .last_targets
            .iter()
            .map(Cell::get)
            .max()
            .unwrap_or(NOT_STARTED_ITERATION);
        let target = self
            .segment
            .outstanding_target()
            .unwrap_or(NOT_STARTED_ITERATION)
            .max(own_target);
        if self.segment.is_bursting() {
            while self.segment.iteration() < target {
                let ticks = (target - self.segment.iteration()) as u64;
                self.burst(ticks)?;
            }
        } else {
            self.wait_until(|| self.segment.iteration() >= target)?;
        }
        Ok(self.segment.read_latest())
    }

    fn wait_until(&self, mut ready: impl FnMut() -> bool) -> ControlResult<()> {
        let start = Instant::now();
        loop {
            if ready() {
                return Ok(());
            }
            let waited = start.elapsed();
            if waited >= self.wait_policy.timeout {
                return Err(ControlError::Timeout { waited });
            }
            std::thread::sleep(self.wait_policy.interval);
        }
    }
}
