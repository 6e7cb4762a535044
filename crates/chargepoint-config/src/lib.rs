//! Configuration for the ChargePoint station poller.
//!
//! A TOML file plus `CHARGEPOINT_*` environment overrides, merged with
//! figment and validated into the frozen `chargepoint_core::PollerConfig`
//! the poller runs on.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use chargepoint_core::{PollerConfig, StationConfig, sanitize_segment, station_path};

/// Environment variable prefix. Nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "CHARGEPOINT_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration file.
///
/// ```toml
/// interval = 10          # minutes
/// timeout = 15           # seconds
/// debug = false
///
/// [[stations]]
/// id = "ABC123"
/// name = "Garage"
/// active = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Poll interval in minutes. Unusable values fall back to the default.
    pub interval: Interval,

    /// Stations to poll, in order.
    #[serde(alias = "stationsList")]
    pub stations: Vec<StationConfig>,

    /// Vendor API root.
    pub base_url: String,

    /// Per-request timeout in seconds.
    pub timeout: u64,

    /// Log every request URL.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: Interval::default(),
            stations: Vec::new(),
            base_url: chargepoint_core::DEFAULT_BASE_URL.into(),
            timeout: chargepoint_core::DEFAULT_TIMEOUT.as_secs(),
            debug: false,
        }
    }
}

/// Leniently parsed poll interval in minutes.
///
/// Accepts a number or a numeric string. Anything else deserializes to
/// "unset" instead of failing the whole configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Interval(Option<f64>);

impl Interval {
    pub fn minutes(value: f64) -> Self {
        Self(Some(value))
    }

    pub fn as_minutes(self) -> Option<f64> {
        self.0
    }

    pub fn to_duration(self) -> Duration {
        PollerConfig::interval_from_minutes(self.0)
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IntervalVisitor;

        impl<'de> Visitor<'de> for IntervalVisitor {
            type Value = Interval;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number of minutes")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Interval, E> {
                Ok(Interval(Some(v)))
            }

            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Interval, E> {
                Ok(Interval(Some(v as f64)))
            }

            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Interval, E> {
                Ok(Interval(Some(v as f64)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Interval, E> {
                Ok(Interval(v.trim().parse().ok()))
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<Interval, E> {
                Ok(Interval(None))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Interval, E> {
                Ok(Interval(None))
            }

            fn visit_none<E: de::Error>(self) -> Result<Interval, E> {
                Ok(Interval(None))
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Interval, D::Error> {
                d.deserialize_any(self)
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Interval, A::Error> {
                while seq.next_element::<de::IgnoredAny>()?.is_some() {}
                Ok(Interval(None))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Interval, A::Error> {
                while map
                    .next_entry::<de::IgnoredAny, de::IgnoredAny>()?
                    .is_some()
                {}
                Ok(Interval(None))
            }
        }

        deserializer.deserialize_any(IntervalVisitor)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "chargepoint", "chargepoint").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("chargepoint");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// The TOML file overlaid with environment overrides. Keys absent from
/// both take their defaults.
pub fn provider(path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load the configuration.
///
/// An explicitly given `path` must exist. Without one, the platform
/// config file is used if present and defaults (plus environment)
/// otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => {
            if !p.try_exists()? {
                return Err(ConfigError::NotFound { path: p.to_owned() });
            }
            p.to_owned()
        }
        None => config_path(),
    };

    let config: Config = provider(&path).extract()?;
    Ok(config)
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    /// Validate and freeze into the runtime configuration.
    pub fn to_poller_config(&self) -> Result<PollerConfig, ConfigError> {
        let base_url = parse_base_url(&self.base_url)?;

        if self.timeout == 0 {
            return Err(ConfigError::Validation {
                field: "timeout".into(),
                reason: "must be greater than zero".into(),
            });
        }

        let mut seen = HashSet::new();
        let mut nodes: HashMap<String, &str> = HashMap::new();
        for station in &self.stations {
            let id = station.id.trim();
            if id.is_empty() {
                continue;
            }
            if !seen.insert(id) {
                return Err(ConfigError::Validation {
                    field: "stations".into(),
                    reason: format!("duplicate station id '{id}'"),
                });
            }
            // Distinct ids can still land on the same tree node.
            if let Some(other) = nodes.insert(sanitize_segment(&station.id), &station.id) {
                return Err(ConfigError::Validation {
                    field: "stations".into(),
                    reason: format!(
                        "station ids '{other}' and '{}' both map to tree node '{}'",
                        station.id,
                        station_path(&station.id)
                    ),
                });
            }
        }

        Ok(PollerConfig {
            base_url,
            request_timeout: Duration::from_secs(self.timeout),
            interval: self.interval.to_duration(),
            stations: self.stations.clone().into(),
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: "base_url".into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("expected an http(s) URL, got '{raw}'"),
        });
    }
    Ok(url)
}
