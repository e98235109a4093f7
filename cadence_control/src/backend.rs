//! The writer side of a segment: one tick per `pulse`.

use cadence_common::States;
use cadence_shm::Segment;

use crate::controller::DofController;
use crate::frequency::FrequencyMeasure;

/// Single writer for one segment.
///
/// Each [`pulse`](BackEnd::pulse) call executes exactly one tick:
/// consume pending purge requests, produce one desired state per DOF,
/// and publish the observation. The caller owns pacing (clocked or
/// bursting) and the driver exchange.
pub struct BackEnd {
    segment: Segment,
    controllers: Vec<DofController>,
    frequency_measure: FrequencyMeasure,
}

impl BackEnd {
    /// Take writer ownership of `segment`.
    ///
    /// Records this process as the segment writer. The segment must
    /// not have another live writer; the single-writer invariant is
    /// the caller's responsibility.
    pub fn new(segment: Segment) -> Self {
        segment.bind_writer();
        let controllers = (0..segment.dof_count()).map(DofController::new).collect();
        Self {
            segment,
            controllers,
            frequency_measure: FrequencyMeasure::new(),
        }
    }

    /// The underlying segment.
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Number of degrees of freedom.
    pub fn dof_count(&self) -> usize {
        self.controllers.len()
    }

    /// Execute one tick and return the desired state vector.
    ///
    /// `observed` is the state vector read back from the driver for
    /// this tick; it is published alongside the desired states so that
    /// front ends see matched pairs.
    pub fn pulse(&mut self, observed: &States) -> States {
        if self.segment.take_purge_request() {
            self.segment.purge_queues();
            for controller in &mut self.controllers {
                controller.reset();
            }
            tracing::debug!(id = self.segment.id(), "queues purged");
        }

        let iteration = self.segment.iteration() + 1;
        let mut desired = States::zeroed(self.controllers.len());
        let mut any_active = false;
        for (dof, controller) in self.controllers.iter_mut().enumerate() {
            desired.set(dof, controller.tick(&self.segment, iteration));
            any_active |= controller.executed_last_tick();
        }
        self.segment.set_last_tick_active(any_active);

        let frequency = self.frequency_measure.tick();
        self.segment.publish_observation(frequency, &desired, observed);
        desired
    }

    /// True when the previous tick was shaped by at least one command.
    pub fn is_active(&self) -> bool {
        self.controllers.iter().any(DofController::executed_last_tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_common::{Mode, State, TimeSpec};
    use cadence_shm::{SegmentConfig, SegmentRegistry};
    use tempfile::TempDir;

    fn backend(dofs: usize) -> (TempDir, BackEnd) {
        let dir = TempDir::new().unwrap();
        let registry = SegmentRegistry::with_base_dir(dir.path());
        let segment = registry
            .create("be", &SegmentConfig::new(dofs, 128, 1000.0))
            .unwrap();
        (dir, BackEnd::new(segment))
    }

    #[test]
    fn pulse_advances_iteration_by_one() {
        let (_dir, mut backend) = backend(2);
        let observed = States::zeroed(2);
        assert_eq!(backend.segment().iteration(), -1);
        backend.pulse(&observed);
        assert_eq!(backend.segment().iteration(), 0);
        backend.pulse(&observed);
        assert_eq!(backend.segment().iteration(), 1);
    }

    #[test]
    fn desired_and_observed_published_as_pair() {
        let (_dir, mut backend) = backend(1);
        let mut observed = States::zeroed(1);
        observed.set(0, State::new(42.0));
        let desired = backend.pulse(&observed);
        let observation = backend.segment().read_latest();
        assert_eq!(observation.iteration, 0);
        assert_eq!(observation.observed.get(0).get(), 42.0);
        assert_eq!(observation.desired.get(0).get(), desired.get(0).get());
    }

    #[test]
    fn activity_flag_follows_command_execution() {
        let (_dir, mut backend) = backend(1);
        let observed = States::zeroed(1);
        backend.pulse(&observed);
        assert!(!backend.is_active());
        assert!(!backend.segment().last_tick_active());

        backend
            .segment()
            .enqueue(
                0,
                State::new(1.0),
                TimeSpec::relative_iteration(3),
                Mode::Queue,
            )
            .unwrap();
        backend.pulse(&observed);
        assert!(backend.is_active());
        assert!(backend.segment().last_tick_active());

        // Run it to completion; activity drops afterwards.
        for _ in 0..5 {
            backend.pulse(&observed);
        }
        assert!(!backend.is_active());
    }

    #[test]
    fn purge_drops_queued_work_and_holds() {
        let (_dir, mut backend) = backend(1);
        let observed = States::zeroed(1);
        backend
            .segment()
            .enqueue(
                0,
                State::new(100.0),
                TimeSpec::relative_iteration(100),
                Mode::Queue,
            )
            .unwrap();
        for _ in 0..10 {
            backend.pulse(&observed);
        }
        let mid = backend.segment().read_latest().desired.get(0).get();
        assert!(mid > 0.0 && mid < 100.0);

        backend.segment().request_purge();
        backend.pulse(&observed);
        let held = backend.segment().read_latest().desired.get(0).get();
        assert_eq!(held, mid);
        assert!(!backend.is_active());
    }
}
