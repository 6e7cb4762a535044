// ── Runtime polling configuration ──
//
// These types describe *what* to poll and *how often*. They never touch
// disk: the binary (via `chargepoint-config`) builds a `PollerConfig`
// and hands it in, already validated.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use chargepoint_api::transport::DEFAULT_TIMEOUT;

/// Poll interval used when none (or an unusable one) is configured.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 10;

/// One configured charging station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    /// Opaque vendor device identifier.
    #[serde(default)]
    pub id: String,
    /// Optional display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl StationConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            active: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Display name: configured label if non-empty, else the id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.id)
    }

    /// Whether the synchronizer should poll this station at all.
    pub fn is_pollable(&self) -> bool {
        self.active && !self.id.trim().is_empty()
    }
}

/// Frozen configuration for one poller instance.
///
/// The station list is shared behind an `Arc` so every cycle reads the
/// same snapshot without copying it.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// API root the station lookups are made against.
    pub base_url: Url,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Period between cycles.
    pub interval: Duration,
    /// Configured stations, in polling order.
    pub stations: Arc<[StationConfig]>,
}

impl PollerConfig {
    /// Configuration with the default timeout and interval.
    pub fn new(base_url: Url, stations: Vec<StationConfig>) -> Self {
        Self {
            base_url,
            request_timeout: DEFAULT_TIMEOUT,
            interval: Self::interval_from_minutes(None),
            stations: stations.into(),
        }
    }

    /// Convert a configured interval in minutes into a `Duration`.
    ///
    /// Missing, non-finite, zero or negative values fall back to
    /// [`DEFAULT_INTERVAL_MINUTES`].
    pub fn interval_from_minutes(minutes: Option<f64>) -> Duration {
        let fallback = Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60);
        match minutes {
            Some(m) if m > 0.0 => Duration::try_from_secs_f64(m * 60.0)
                .ok()
                .filter(|d| !d.is_zero())
                .unwrap_or(fallback),
            _ => fallback,
        }
    }

    /// Number of stations that will actually be polled.
    pub fn active_station_count(&self) -> usize {
        self.stations.iter().filter(|s| s.is_pollable()).count()
    }
}
