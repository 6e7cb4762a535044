// ── Station synchronizer ──
//
// One cycle = one sequential pass over the configured stations:
// fetch → normalize → write, with every station isolated from the
// others' failures. The cycle ends by publishing the aggregate
// connectivity flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use chargepoint_api::{StationClient, TransportConfig};

use crate::config::{PollerConfig, StationConfig};
use crate::error::CoreError;
use crate::model::CanonicalStationRecord;
use crate::normalize::normalize;
use crate::store::StateTree;
use crate::writer::StateWriter;

/// Outcome of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Stations a fetch was attempted for.
    pub attempted: usize,
    /// Stations fetched and fully written.
    pub succeeded: usize,
    /// Stations whose fetch or write failed.
    pub failed: usize,
    /// Inactive or id-less entries.
    pub skipped: usize,
    /// Value published as `info.connection`.
    pub connected: bool,
}

/// Drives Client → Normalizer → Writer for every configured station.
pub struct Synchronizer<T> {
    client: StationClient,
    tree: Arc<T>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: StateTree> Synchronizer<T> {
    pub fn new(client: StationClient, tree: Arc<T>) -> Self {
        Self {
            client,
            tree,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Build the HTTP client from the poller configuration.
    pub fn from_config(config: &PollerConfig, tree: Arc<T>) -> Result<Self, CoreError> {
        let transport = TransportConfig::default().with_timeout(config.request_timeout);
        let client = StationClient::new(config.base_url.clone(), &transport).map_err(|e| {
            CoreError::Internal(format!("failed to build station client: {e}"))
        })?;
        Ok(Self::new(client, tree))
    }

    /// Whether a guarded cycle is currently running.
    pub fn is_cycle_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run a cycle unless another guarded cycle is still in flight.
    ///
    /// Returns `None` when the cycle was skipped.
    pub async fn try_run_cycle(&self, stations: &[StationConfig]) -> Option<CycleReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let _guard = InFlight(&self.in_flight);
        Some(self.run_cycle(stations).await)
    }

    /// Poll every active station once and publish the connectivity flag.
    ///
    /// Never fails: per-station errors are logged and counted. Stations
    /// are processed strictly one after another, so writes of two
    /// stations never interleave. Callers that may overlap should go
    /// through [`try_run_cycle`](Self::try_run_cycle).
    pub async fn run_cycle(&self, stations: &[StationConfig]) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        for station in stations {
            if !station.is_pollable() {
                report.skipped += 1;
                debug!(
                    station_id = %station.id,
                    active = station.active,
                    "skipping inactive or unidentified station"
                );
                continue;
            }

            report.attempted += 1;
            match self.sync_station(station).await {
                Ok(_) => report.succeeded += 1,
                Err(e) if e.is_transient() => {
                    report.failed += 1;
                    warn!(
                        station_id = %station.id,
                        station = station.display_name(),
                        error = %e,
                        "station unreachable, retrying next cycle"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        station_id = %station.id,
                        station = station.display_name(),
                        error = %e,
                        "error updating station"
                    );
                }
            }
        }

        if report.attempted == 0 {
            warn!(
                error = %CoreError::ConfigAbsent,
                "no stations polled; add at least one active station to the configuration"
            );
        }

        report.connected = report.succeeded > 0;
        if let Err(e) = StateWriter::new(self.tree.as_ref())
            .write_connection(report.connected)
            .await
        {
            error!(error = %e, "failed to publish connectivity flag");
        }

        let elapsed = Duration::from_millis(
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        );
        debug!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            connected = report.connected,
            elapsed = %humantime::format_duration(elapsed),
            "cycle complete"
        );
        report
    }

    /// Fetch, normalize and write a single station.
    pub async fn sync_station(
        &self,
        station: &StationConfig,
    ) -> Result<CanonicalStationRecord, CoreError> {
        let id = station.id.as_str();

        let raw = self
            .client
            .fetch_station(id)
            .await
            .map_err(|source| CoreError::Fetch {
                station_id: id.to_owned(),
                source,
            })?;

        let record = normalize(id, &raw, station.display_name());
        StateWriter::new(self.tree.as_ref())
            .write_station(&record, &raw)
            .await?;

        info!(
            station_id = id,
            station = %record.display_name,
            status = %record.status,
            ports = record.ports.len(),
            "updated station"
        );
        Ok(record)
    }
}
