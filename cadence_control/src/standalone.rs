//! Standalone runner: back end, driver, and loop thread in one unit.
//!
//! A [`Standalone`] owns the segment writer side end to end. In
//! clocked mode the loop paces itself at the configured frequency; in
//! bursting mode it sleeps until a front end requests ticks. Stops are
//! cooperative and always land on a tick boundary: the local
//! [`StopToken`], the segment's stop flag (settable from any attached
//! process), and `Drop` all funnel into the same check at the top of
//! the loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use cadence_common::StandaloneConfig;
use cadence_shm::{SegmentConfig, SegmentError, SegmentRegistry};
use parking_lot::Mutex;

use crate::backend::BackEnd;
use crate::driver::Driver;
use crate::error::{ControlError, ControlResult};
use crate::frequency::FrequencyManager;
use crate::rt;

/// Sleep between polls while a bursting loop waits for requests.
const BURST_POLL: Duration = Duration::from_micros(100);

/// Cooperative stop signal shared between a runner and its loop thread.
#[derive(Clone, Debug, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    /// A token with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop at the next tick boundary.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A running back-end loop with its driver, owned by this process.
pub struct Standalone {
    id: String,
    stop: StopToken,
    handle: Option<JoinHandle<()>>,
}

impl Standalone {
    /// Create the segment and start the loop thread.
    ///
    /// Fails if the configuration is invalid or a segment with this id
    /// already exists.
    pub fn start<D: Driver + 'static>(
        registry: &SegmentRegistry,
        config: &StandaloneConfig,
        driver: D,
    ) -> ControlResult<Self> {
        config.validate()?;
        let segment = registry.create(
            &config.segment_id,
            &SegmentConfig::new(config.dofs, config.history_capacity, config.frequency_hz),
        )?;
        segment.set_bursting(config.bursting);

        let id = config.segment_id.clone();
        let stop = StopToken::new();
        let loop_stop = stop.clone();
        let loop_id = id.clone();
        let backend = BackEnd::new(segment);
        let frequency_hz = config.frequency_hz;
        let bursting = config.bursting;
        let handle = std::thread::Builder::new()
            .name(format!("cadence-{id}"))
            .spawn(move || run_loop(loop_id, backend, driver, frequency_hz, bursting, loop_stop))
            .map_err(SegmentError::from)?;

        Ok(Self {
            id,
            stop,
            handle: Some(handle),
        })
    }

    /// Segment id this runner writes to.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// A clone of the stop token, usable from any thread.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// True while the loop thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Request a stop and join the loop thread.
    pub fn stop(&mut self) {
        self.stop.request_stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Standalone {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    id: String,
    mut backend: BackEnd,
    mut driver: impl Driver,
    frequency_hz: f64,
    bursting: bool,
    stop: StopToken,
) {
    if let Err(error) = rt::setup() {
        tracing::warn!(id, %error, "rt setup failed, running without it");
    }
    backend.segment().set_running(true);
    tracing::info!(id, frequency_hz, bursting, "standalone loop started");

    let mut pacer = (!bursting).then(|| FrequencyManager::new(frequency_hz));
    loop {
        if stop.is_stop_requested() || backend.segment().stop_requested() {
            break;
        }
        if bursting && backend.segment().bursts_done() >= backend.segment().bursts_requested() {
            std::thread::sleep(BURST_POLL);
            continue;
        }

        let observed = driver.read();
        let desired = backend.pulse(&observed);
        driver.set(&desired);

        if bursting {
            backend.segment().complete_burst();
        } else if let Some(pacer) = pacer.as_mut()
            && !pacer.wait()
        {
            tracing::warn!(id, iteration = backend.segment().iteration(), "tick overrun");
        }
    }

    backend.segment().set_running(false);
    tracing::info!(
        id,
        iteration = backend.segment().iteration(),
        "standalone loop stopped"
    );
}

// ── Process-level registry ──────────────────────────────────────────

static STANDALONES: Mutex<BTreeMap<String, Standalone>> = Mutex::new(BTreeMap::new());

/// Start a standalone and register it under its segment id.
///
/// One standalone per id per process; a second start with the same id
/// fails with [`ControlError::AlreadyRunning`].
pub fn start_standalone<D: Driver + 'static>(
    registry: &SegmentRegistry,
    config: &StandaloneConfig,
    driver: D,
) -> ControlResult<()> {
    let mut standalones = STANDALONES.lock();
    if standalones.contains_key(&config.segment_id) {
        return Err(ControlError::AlreadyRunning {
            id: config.segment_id.clone(),
        });
    }
    let standalone = Standalone::start(registry, config, driver)?;
    standalones.insert(config.segment_id.clone(), standalone);
    Ok(())
}

/// Stop and deregister the standalone started under `id`.
pub fn stop_standalone(id: &str) -> ControlResult<()> {
    let removed = STANDALONES.lock().remove(id);
    match removed {
        Some(mut standalone) => {
            standalone.stop();
            Ok(())
        }
        None => Err(ControlError::NotRunning { id: id.to_owned() }),
    }
}

/// True while a standalone registered under `id` in this process is
/// still iterating.
pub fn standalone_is_running(id: &str) -> bool {
    STANDALONES.lock().get(id).is_some_and(Standalone::is_running)
}

/// Ask the back end writing segment `id` to stop, from any process.
pub fn please_stop(registry: &SegmentRegistry, id: &str) -> ControlResult<()> {
    let segment = registry.attach(id)?;
    segment.request_stop();
    Ok(())
}
