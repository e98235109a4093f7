//! Observation history ring.
//!
//! Bounded, single-writer (the back end, once per tick, in iteration
//! order), multi-reader. Each slot carries its own seqlock version so
//! a reader never observes a torn observation; publication order is
//! slot write first, then the header iteration counter, so an
//! observation is visible only once complete.

use crate::segment::Segment;
use cadence_common::{Observation, State, States};
use std::sync::atomic::{Ordering, fence};

impl Segment {
    /// Publish the observation of one completed tick.
    ///
    /// Writer-only. Advances the iteration counter by exactly one and
    /// returns the new iteration. The slot `capacity` iterations back
    /// is silently evicted.
    pub fn publish_observation(
        &self,
        frequency: f64,
        desired: &States,
        observed: &States,
    ) -> i64 {
        let iteration = self.iteration() + 1;
        let capacity = self.history_capacity();
        let slot = unsafe { &mut *self.slot_ptr(iteration as usize % capacity) };

        let version = slot.version.load(Ordering::Relaxed);
        slot.version.store(version + 1, Ordering::Release); // odd: in progress
        fence(Ordering::Release);

        slot.iteration = iteration;
        slot.frequency = frequency;
        for (dof, state) in desired.iter().enumerate() {
            slot.desired[dof] = state.get();
        }
        for (dof, state) in observed.iter().enumerate() {
            slot.observed[dof] = state.get();
        }

        fence(Ordering::Release);
        slot.version.store(version + 2, Ordering::Release); // even: stable

        self.header().iteration.store(iteration, Ordering::Release);
        iteration
    }

    /// Read the observation of iteration `iteration`, if retained.
    ///
    /// `None` when the iteration is unpublished or already evicted.
    pub fn read_observation(&self, iteration: i64) -> Option<Observation> {
        if iteration < 0 || iteration > self.iteration() {
            return None;
        }
        let capacity = self.history_capacity();
        let dofs = self.dof_count();
        let slot = unsafe { &*self.slot_ptr(iteration as usize % capacity) };

        loop {
            let before = slot.version.load(Ordering::Acquire);
            if before % 2 != 0 {
                std::hint::spin_loop();
                continue;
            }
            fence(Ordering::Acquire);

            let found_iteration = slot.iteration;
            let frequency = slot.frequency;
            let mut desired = States::zeroed(dofs);
            let mut observed = States::zeroed(dofs);
            for dof in 0..dofs {
                desired.set(dof, State::new(slot.desired[dof]));
                observed.set(dof, State::new(slot.observed[dof]));
            }

            fence(Ordering::Acquire);
            let after = slot.version.load(Ordering::Acquire);
            if before != after {
                // Writer lapped us mid-read; retry.
                std::thread::yield_now();
                continue;
            }

            if found_iteration != iteration {
                // Slot was recycled: the requested iteration is gone.
                return None;
            }
            return Some(Observation {
                iteration,
                frequency,
                desired,
                observed,
            });
        }
    }

    /// Most recent observation, or the "not yet started" sentinel
    /// before the first tick.
    pub fn read_latest(&self) -> Observation {
        loop {
            let iteration = self.iteration();
            if iteration < 0 {
                return Observation::not_started(self.dof_count());
            }
            if let Some(observation) = self.read_observation(iteration) {
                return observation;
            }
            // Extremely slow reader: the slot was recycled between the
            // counter load and the slot read. Re-sample.
        }
    }

    /// Last published desired state of one DOF (default before the
    /// first tick). Start point for speed commands on an empty queue.
    pub(crate) fn latest_desired(&self, dof: usize) -> State {
        let latest = self.read_latest();
        if latest.is_not_started() {
            State::default()
        } else {
            latest.desired.get(dof)
        }
    }

    /// All retained observations with iteration >= `since`, ascending.
    ///
    /// Lazy and restartable: the returned iterator is `Clone` and can
    /// be re-walked from its construction point. The range is clipped
    /// to the retained window; iterations already evicted are skipped
    /// silently.
    pub fn observations_since(&self, since: i64) -> HistoryIter<'_> {
        let newest = self.iteration();
        let capacity = self.history_capacity() as i64;
        let oldest_retained = (newest - capacity + 1).max(0);
        HistoryIter {
            segment: self,
            next: since.max(oldest_retained),
            newest,
        }
    }
}

/// Ascending iterator over retained observations. See
/// [`Segment::observations_since`].
#[derive(Clone)]
pub struct HistoryIter<'a> {
    segment: &'a Segment,
    next: i64,
    newest: i64,
}

impl Iterator for HistoryIter<'_> {
    type Item = Observation;

    fn next(&mut self) -> Option<Observation> {
        while self.next <= self.newest {
            let iteration = self.next;
            self.next += 1;
            if let Some(observation) = self.segment.read_observation(iteration) {
                return Some(observation);
            }
            // Evicted while iterating; skip forward.
        }
        None
    }
}
