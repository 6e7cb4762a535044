// ── Canonical station model ──
//
// Vendor payloads differ between firmware and API revisions; these are
// the shapes everything downstream of the normalizer works with. They
// are recomputed every cycle and never stored as entities themselves.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Status used whenever the payload does not carry one.
pub const UNKNOWN_STATUS: &str = "unknown";

/// Postal address parts. Missing parts stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    pub line: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// Render as `"<line>, <city>, <country>"`, trimming the commas and
    /// whitespace left over by empty leading or trailing parts.
    ///
    /// An all-empty address renders as the empty string.
    pub fn compose(&self) -> String {
        let full = format!(
            "{}, {}, {}",
            self.line.as_deref().unwrap_or(""),
            self.city.as_deref().unwrap_or(""),
            self.country.as_deref().unwrap_or(""),
        );
        full.trim_matches(|c: char| c == ',' || c.is_whitespace())
            .to_owned()
    }
}

/// One charging connector of a station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalPort {
    /// 1-based position in the source array. Only stable within a
    /// single response.
    pub index: usize,
    pub name: String,
    pub status: String,
}

/// Normalized view of one station response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalStationRecord {
    pub id: String,
    pub display_name: String,
    pub status: String,
    pub address: Address,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ports: Vec<CanonicalPort>,
    /// Wall-clock time of normalization, not a vendor timestamp.
    pub last_update: DateTime<Utc>,
}
