// ── Poll scheduler ──
//
// Runs one cycle immediately on start, then one per interval until
// stopped. Cycles never overlap: a tick that fires while the previous
// cycle is still running is skipped. Stopping cancels the timer but
// lets an in-flight cycle finish.

use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{PollerConfig, StationConfig};
use crate::error::CoreError;
use crate::store::StateTree;
use crate::sync::{CycleReport, Synchronizer};

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PollerState {
    Stopped,
    Running,
}

/// The armed repeating timer. Exists only while running.
struct PollTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodically drives a [`Synchronizer`] over a frozen station list.
pub struct Poller<T> {
    config: PollerConfig,
    sync: Arc<Synchronizer<T>>,
    state: watch::Sender<PollerState>,
    timer: Mutex<Option<PollTimer>>,
}

impl<T: StateTree + 'static> Poller<T> {
    /// Create a stopped poller. Call [`start()`](Self::start) to begin polling.
    pub fn new(config: PollerConfig, synchronizer: Synchronizer<T>) -> Self {
        let (state, _) = watch::channel(PollerState::Stopped);
        Self {
            config,
            sync: Arc::new(synchronizer),
            state,
            timer: Mutex::new(None),
        }
    }

    /// Create a poller whose synchronizer talks to `config.base_url`.
    pub fn from_config(config: PollerConfig, tree: Arc<T>) -> Result<Self, CoreError> {
        let synchronizer = Synchronizer::from_config(&config, tree)?;
        Ok(Self::new(config, synchronizer))
    }

    /// Subscribe to lifecycle changes.
    pub fn state(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        *self.state.borrow() == PollerState::Running
    }

    /// Start polling.
    ///
    /// Runs the first cycle right away and returns its report once it
    /// has finished, then arms the repeating timer. Calling `start` on a
    /// running poller does nothing and returns `None`.
    pub async fn start(&self) -> Option<CycleReport> {
        let mut timer = self.timer.lock().await;
        if timer.is_some() {
            warn!("poller already running");
            return None;
        }

        let _ = self.state.send(PollerState::Running);
        info!(
            stations = self.config.stations.len(),
            active = self.config.active_station_count(),
            interval = %humantime::format_duration(self.config.interval),
            "starting station poller"
        );

        let report = run_guarded(&self.sync, &self.config.stations).await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_task(
            Arc::clone(&self.sync),
            Arc::clone(&self.config.stations),
            self.config.interval,
            cancel.clone(),
        ));
        *timer = Some(PollTimer { cancel, handle });

        report
    }

    /// Stop polling.
    ///
    /// Cancels the timer and waits for an in-flight cycle to finish; no
    /// further cycles run afterwards.
    pub async fn stop(&self) {
        let Some(timer) = self.timer.lock().await.take() else {
            return;
        };

        timer.cancel.cancel();
        if let Err(e) = timer.handle.await {
            error!(error = %e, "poll task ended abnormally");
        }

        let _ = self.state.send(PollerState::Stopped);
        info!("station poller stopped");
    }

    /// Run one cycle now, outside the timer. Skipped (returns `None`)
    /// if a cycle is already in flight.
    pub async fn run_now(&self) -> Option<CycleReport> {
        run_guarded(&self.sync, &self.config.stations).await
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.cancel.cancel();
        }
    }
}

// ── Background task ──────────────────────────────────────────────

/// Fire a cycle on every interval tick until cancelled.
async fn poll_task<T: StateTree + 'static>(
    sync: Arc<Synchronizer<T>>,
    stations: Arc<[StationConfig]>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                run_guarded(&sync, &stations).await;
            }
        }
    }
    debug!("poll task exited");
}

/// Run one guarded cycle on its own task so a panic inside it is
/// contained and logged instead of taking the poller down.
async fn run_guarded<T: StateTree + 'static>(
    sync: &Arc<Synchronizer<T>>,
    stations: &Arc<[StationConfig]>,
) -> Option<CycleReport> {
    let sync = Arc::clone(sync);
    let stations = Arc::clone(stations);

    match tokio::spawn(async move { sync.try_run_cycle(&stations).await }).await {
        Ok(Some(report)) => Some(report),
        Ok(None) => {
            warn!("previous cycle still running, skipping this one");
            None
        }
        Err(e) if e.is_panic() => {
            error!(error = %e, "cycle panicked");
            None
        }
        Err(e) => {
            error!(error = %e, "cycle task was cancelled");
            None
        }
    }
}
