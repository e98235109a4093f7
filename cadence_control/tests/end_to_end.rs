//! Front end / back end integration tests.
//!
//! Verifies:
//! 1. Duration commands complete in the exact tick count, then hold.
//! 2. Speed commands pass the midpoint halfway through the travel.
//! 3. Relative iteration commands chain off the queue tail; `reset`
//!    re-anchors at the live iteration.
//! 4. Overwrite takes effect on the immediately following tick.
//! 5. History eviction keeps exactly the last `capacity` observations.
//! 6. `pulse_and_wait` drains the queue in both pacing modes.
//! 7. Bounded waits fail with `Timeout` instead of hanging.
//! 8. `wait_for_next` steps through iterations one at a time.

use std::time::Duration;

use cadence_common::{DriverBounds, Mode, StandaloneConfig, State, TimeSpec};
use cadence_control::{ControlError, FrontEnd, SimDriver, Standalone, WaitPolicy};
use cadence_shm::{SegmentConfig, SegmentRegistry};
use tempfile::TempDir;

fn config(id: &str, dofs: usize, frequency_hz: f64, bursting: bool) -> StandaloneConfig {
    StandaloneConfig {
        segment_id: id.to_owned(),
        frequency_hz,
        dofs,
        history_capacity: 8192,
        bursting,
        driver_bounds: DriverBounds::default(),
    }
}

fn bursting_setup(
    id: &str,
    dofs: usize,
    frequency_hz: f64,
) -> (TempDir, SegmentRegistry, Standalone, FrontEnd) {
    let dir = TempDir::new().unwrap();
    let registry = SegmentRegistry::with_base_dir(dir.path());
    let standalone = Standalone::start(
        &registry,
        &config(id, dofs, frequency_hz, true),
        SimDriver::unbounded(dofs),
    )
    .unwrap();
    let frontend = FrontEnd::attach(&registry, id).unwrap();
    (dir, registry, standalone, frontend)
}

#[test]
fn duration_command_completes_in_exact_tick_count() {
    let (_dir, _registry, _standalone, frontend) = bursting_setup("e2e_duration", 1, 1000.0);
    // Header carries the configured rate; the measured rate is per
    // observation.
    assert_eq!(frontend.get_frequency(), 1000.0);

    // 2 s at 1 kHz: exactly 2000 ticks from a fresh segment.
    frontend
        .add_command(0, State::new(1.0), TimeSpec::duration_ms(2000), Mode::Queue)
        .unwrap();

    let halfway = frontend.burst(1000).unwrap();
    assert_eq!(halfway.iteration, 999);
    assert!((halfway.desired.get(0).get() - 0.5).abs() < 1e-9);

    let done = frontend.burst(1000).unwrap();
    assert_eq!(done.iteration, 1999);
    assert_eq!(done.desired.get(0).get(), 1.0);

    // One tick earlier the target was not yet reached.
    let before = frontend.segment().read_observation(1998).unwrap();
    assert!(before.desired.get(0).get() < 1.0);

    // And it holds once complete.
    let held = frontend.burst(5).unwrap();
    assert_eq!(held.desired.get(0).get(), 1.0);
    assert!(!frontend.backend_is_active());
}

#[test]
fn speed_command_passes_midpoint_halfway() {
    let (_dir, _registry, _standalone, frontend) = bursting_setup("e2e_speed", 1, 1000.0);

    // 10 units at 10 units/s and 1 kHz: 1000 ticks of travel.
    frontend
        .add_command(0, State::new(10.0), TimeSpec::speed(10.0), Mode::Queue)
        .unwrap();

    let halfway = frontend.burst(500).unwrap();
    assert!((halfway.desired.get(0).get() - 5.0).abs() < 0.05);

    let done = frontend.pulse_and_wait().unwrap();
    assert_eq!(done.desired.get(0).get(), 10.0);
    assert_eq!(done.iteration, 999);
}

#[test]
fn relative_iteration_commands_chain_and_reset() {
    let (_dir, _registry, _standalone, frontend) = bursting_setup("e2e_relative", 1, 1000.0);

    // Two chained segments: ticks 0..=99 and 100..=199.
    frontend
        .add_command(
            0,
            State::new(1.0),
            TimeSpec::relative_iteration(100),
            Mode::Queue,
        )
        .unwrap();
    frontend
        .add_command(
            0,
            State::new(2.0),
            TimeSpec::relative_iteration(100),
            Mode::Queue,
        )
        .unwrap();

    let done = frontend.pulse_and_wait().unwrap();
    assert_eq!(done.iteration, 199);
    assert_eq!(done.desired.get(0).get(), 2.0);

    // Reset re-anchors at the live iteration instead of the tail.
    let reset_command = frontend
        .add_command(
            0,
            State::new(3.0),
            TimeSpec::relative_iteration(50).reset(),
            Mode::Queue,
        )
        .unwrap();
    assert_eq!(reset_command.target_iteration, 249);
    let done = frontend.pulse_and_wait().unwrap();
    assert_eq!(done.iteration, 249);
    assert_eq!(done.desired.get(0).get(), 3.0);
}

#[test]
fn overwrite_replaces_queue_on_next_tick() {
    let (_dir, _registry, _standalone, frontend) = bursting_setup("e2e_overwrite", 1, 1000.0);

    frontend
        .add_command(
            0,
            State::new(100.0),
            TimeSpec::relative_iteration(1000),
            Mode::Queue,
        )
        .unwrap();
    let mid = frontend.burst(100).unwrap();
    let mid_value = mid.desired.get(0).get();
    assert!(mid_value > 0.0 && mid_value < 100.0);

    frontend
        .add_command(
            0,
            State::new(0.0),
            TimeSpec::relative_iteration(100),
            Mode::Overwrite,
        )
        .unwrap();

    // The very next tick already heads back down.
    let next = frontend.burst(1).unwrap();
    assert!(next.desired.get(0).get() < mid_value);

    let done = frontend.pulse_and_wait().unwrap();
    assert_eq!(done.desired.get(0).get(), 0.0);
    assert_eq!(done.iteration, 199);
}

#[test]
fn history_keeps_exactly_the_last_capacity_observations() {
    let dir = TempDir::new().unwrap();
    let registry = SegmentRegistry::with_base_dir(dir.path());
    let mut small = config("e2e_history", 1, 1000.0, true);
    small.history_capacity = 16;
    let _standalone = Standalone::start(&registry, &small, SimDriver::unbounded(1)).unwrap();
    let frontend = FrontEnd::attach(&registry, "e2e_history").unwrap();

    frontend.burst(40).unwrap();

    let retained: Vec<_> = frontend.get_observations_since(0).collect();
    assert_eq!(retained.len(), 16);
    assert_eq!(retained.first().unwrap().iteration, 24);
    assert_eq!(retained.last().unwrap().iteration, 39);
    for pair in retained.windows(2) {
        assert_eq!(pair[1].iteration, pair[0].iteration + 1);
    }

    let latest = frontend.get_latest_observations(4);
    assert_eq!(latest.len(), 4);
    assert_eq!(latest.first().unwrap().iteration, 36);
    assert_eq!(latest.last().unwrap().iteration, 39);
}

#[test]
fn mirrored_dofs_stay_symmetric_every_tick() {
    let (_dir, _registry, _standalone, frontend) = bursting_setup("e2e_mirror", 2, 1000.0);

    frontend
        .add_command(
            0,
            State::new(10.0),
            TimeSpec::absolute_iteration(99),
            Mode::Queue,
        )
        .unwrap();
    frontend
        .add_command(
            1,
            State::new(-10.0),
            TimeSpec::absolute_iteration(99),
            Mode::Queue,
        )
        .unwrap();
    frontend.pulse_and_wait().unwrap();

    for observation in frontend.get_observations_since(0) {
        let a = observation.desired.get(0).get();
        let b = observation.desired.get(1).get();
        assert_eq!(a, -b, "iteration {}", observation.iteration);
    }
}

#[test]
fn recorded_trajectory_replays_exactly_on_another_dof() {
    let (_dir, _registry, _standalone, frontend) = bursting_setup("e2e_replay", 2, 1000.0);

    frontend
        .add_command(0, State::new(3.0), TimeSpec::duration_ms(100), Mode::Queue)
        .unwrap();
    frontend.pulse_and_wait().unwrap();

    // Re-enqueue the first 50 recorded desired values on dof 1, one
    // tick apart, 200 iterations later.
    let recorded: Vec<_> = frontend.get_observations_since(0).take(50).collect();
    assert_eq!(recorded.len(), 50);
    for observation in &recorded {
        frontend
            .add_command(
                1,
                observation.desired.get(0),
                TimeSpec::absolute_iteration(observation.iteration + 200),
                Mode::Queue,
            )
            .unwrap();
    }
    frontend.pulse_and_wait().unwrap();

    // Each one-tick segment snaps exactly at its target iteration.
    for observation in &recorded {
        let replayed = frontend
            .segment()
            .read_observation(observation.iteration + 200)
            .unwrap();
        assert_eq!(
            replayed.desired.get(1).get().to_bits(),
            observation.desired.get(0).get().to_bits(),
            "iteration {}",
            observation.iteration
        );
    }
}

#[test]
fn pulse_and_wait_on_clocked_backend() {
    let dir = TempDir::new().unwrap();
    let registry = SegmentRegistry::with_base_dir(dir.path());
    let _standalone = Standalone::start(
        &registry,
        &config("e2e_clocked", 1, 2000.0, false),
        SimDriver::unbounded(1),
    )
    .unwrap();
    let frontend = FrontEnd::attach(&registry, "e2e_clocked").unwrap();

    let command = frontend
        .add_command(0, State::new(2.0), TimeSpec::duration_ms(100), Mode::Queue)
        .unwrap();
    let done = frontend.pulse_and_wait().unwrap();
    assert!(done.iteration >= command.target_iteration);
    assert_eq!(done.desired.get(0).get(), 2.0);
    // Observed lags desired by one driver exchange at most.
    assert!((done.observed.get(0).get() - 2.0).abs() < 0.1);
}

#[test]
fn bounded_wait_times_out() {
    let dir = TempDir::new().unwrap();
    let registry = SegmentRegistry::with_base_dir(dir.path());
    let _standalone = Standalone::start(
        &registry,
        &config("e2e_timeout", 1, 1000.0, false),
        SimDriver::unbounded(1),
    )
    .unwrap();
    let mut frontend = FrontEnd::attach(&registry, "e2e_timeout").unwrap();
    frontend.set_wait_policy(WaitPolicy {
        interval: Duration::from_millis(1),
        timeout: Duration::from_millis(50),
    });

    frontend
        .add_command(0, State::new(1.0), TimeSpec::duration_ms(10_000), Mode::Queue)
        .unwrap();
    let error = frontend.pulse_and_wait().unwrap_err();
    assert!(matches!(error, ControlError::Timeout { .. }));
}

#[test]
fn pulse_and_wait_covers_commands_pulled_mid_tick() {
    let dir = TempDir::new().unwrap();
    let registry = SegmentRegistry::with_base_dir(dir.path());
    registry
        .create("e2e_midtick", &SegmentConfig::new(1, 64, 1000.0))
        .unwrap();
    let mut frontend = FrontEnd::attach(&registry, "e2e_midtick").unwrap();
    frontend.set_wait_policy(WaitPolicy {
        interval: Duration::from_millis(1),
        timeout: Duration::from_millis(50),
    });
    frontend
        .add_command(
            0,
            State::new(5.0),
            TimeSpec::absolute_iteration(9),
            Mode::Queue,
        )
        .unwrap();

    // Freeze the back end mid-tick: command pulled, queue idle, the
    // completing observation not yet published.
    let segment = registry.attach("e2e_midtick").unwrap();
    segment.pop_next(0).unwrap();
    segment.mark_idle(0);

    // Empty queues alone must not count as done; iteration 9 was
    // never published, so the wait has to run into its bound.
    let error = frontend.pulse_and_wait().unwrap_err();
    assert!(matches!(error, ControlError::Timeout { .. }));
}

#[test]
fn concurrent_bursts_each_wait_for_their_own_ticks() {
    let (dir, _registry, _standalone, _frontend) = bursting_setup("e2e_two_bursters", 1, 1000.0);
    let base = dir.path().to_path_buf();

    std::thread::scope(|scope| {
        for _ in 0..2 {
            let base = base.clone();
            scope.spawn(move || {
                let registry = SegmentRegistry::with_base_dir(base);
                let frontend = FrontEnd::attach(&registry, "e2e_two_bursters").unwrap();
                let observation = frontend.burst(50).unwrap();
                // This caller's 50 ticks are in by the time burst
                // returns, whatever the other one requested.
                assert!(observation.iteration >= 49);
            });
        }
    });

    let registry = SegmentRegistry::with_base_dir(dir.path());
    let segment = registry.attach("e2e_two_bursters").unwrap();
    assert_eq!(segment.bursts_done(), 100);
    assert_eq!(segment.iteration(), 99);
}

#[test]
fn wait_for_next_steps_one_iteration_at_a_time() {
    let dir = TempDir::new().unwrap();
    let registry = SegmentRegistry::with_base_dir(dir.path());
    let _standalone = Standalone::start(
        &registry,
        &config("e2e_waitnext", 1, 500.0, false),
        SimDriver::unbounded(1),
    )
    .unwrap();
    let mut frontend = FrontEnd::attach(&registry, "e2e_waitnext").unwrap();

    let first = frontend.wait_for_next().unwrap();
    let second = frontend.wait_for_next().unwrap();
    let third = frontend.wait_for_next().unwrap();
    assert_eq!(second.iteration, first.iteration + 1);
    assert_eq!(third.iteration, second.iteration + 1);

    frontend.reset_next_index();
    let resynced = frontend.wait_for_next().unwrap();
    assert!(resynced.iteration > third.iteration);
}

#[test]
fn reinit_overwrites_every_dof_to_zero() {
    let (_dir, _registry, _standalone, frontend) = bursting_setup("e2e_reinit", 3, 1000.0);

    for dof in 0..3 {
        frontend
            .add_command(
                dof,
                State::new(5.0 + dof as f64),
                TimeSpec::relative_iteration(1000),
                Mode::Queue,
            )
            .unwrap();
    }
    frontend.burst(100).unwrap();

    frontend.add_reinit_command().unwrap();
    let done = frontend.pulse_and_wait().unwrap();
    for dof in 0..3 {
        assert_eq!(done.desired.get(dof).get(), 0.0, "dof {dof}");
    }
}

#[test]
fn burst_rejected_on_clocked_segment() {
    let dir = TempDir::new().unwrap();
    let registry = SegmentRegistry::with_base_dir(dir.path());
    let _standalone = Standalone::start(
        &registry,
        &config("e2e_noburst", 1, 1000.0, false),
        SimDriver::unbounded(1),
    )
    .unwrap();
    let frontend = FrontEnd::attach(&registry, "e2e_noburst").unwrap();
    assert!(matches!(
        frontend.burst(1),
        Err(ControlError::NotBursting { .. })
    ));
}

#[test]
fn unknown_dof_is_rejected_at_enqueue() {
    let (_dir, _registry, _standalone, frontend) = bursting_setup("e2e_baddof", 2, 1000.0);
    let error = frontend
        .add_command(2, State::new(1.0), None, Mode::Queue)
        .unwrap_err();
    assert!(matches!(error, ControlError::Command(_)));
}
