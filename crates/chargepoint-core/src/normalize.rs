// ── Vendor payload normalization ──
//
// Maps the station info document into a `CanonicalStationRecord`.
// Field names differ between firmware and API revisions (top-level vs.
// nested `body`, `port` vs. `ports`, alternate names), so every field is
// resolved through an ordered list of candidate paths: the first one that
// yields a usable value wins. Supporting a new variant means adding a
// path to the relevant table, not touching the control flow.
//
// Normalization is total: missing or oddly-typed fields degrade to
// defaults instead of failing.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{Address, CanonicalPort, CanonicalStationRecord, UNKNOWN_STATUS};

/// A JSON object path, one key per nesting level.
type FieldPath = &'static [&'static str];

// ── Extraction rules (first match wins) ────────────────────────────

const STATUS: &[FieldPath] = &[&["status"], &["stationStatus"], &["body", "status"]];
const STATION_NAME: &[FieldPath] = &[&["stationName"]];

const ADDRESS_LINE: &[FieldPath] = &[&["address", "address1"], &["address", "street"]];
const ADDRESS_CITY: &[FieldPath] = &[&["address", "city"]];
const ADDRESS_COUNTRY: &[FieldPath] = &[&["address", "country"]];

const LATITUDE: &[FieldPath] = &[&["latitude"], &["location", "lat"]];
const LONGITUDE: &[FieldPath] = &[&["longitude"], &["location", "lng"]];

const PORTS: &[FieldPath] = &[&["ports"], &["port"]];
const PORT_STATUS: &[FieldPath] = &[&["status"], &["portStatus"]];
const PORT_NAME: &[FieldPath] = &[&["name"], &["portName"]];

// ── Public entry points ────────────────────────────────────────────

/// Normalize one station response, stamping it with the current time.
///
/// `fallback_name` is used when the payload carries no station name;
/// callers pass the configured display name (or the id).
pub fn normalize(id: &str, raw: &Value, fallback_name: &str) -> CanonicalStationRecord {
    normalize_at(id, raw, fallback_name, Utc::now())
}

/// [`normalize`] with an explicit `last_update` timestamp.
pub fn normalize_at(
    id: &str,
    raw: &Value,
    fallback_name: &str,
    now: DateTime<Utc>,
) -> CanonicalStationRecord {
    CanonicalStationRecord {
        id: id.to_owned(),
        display_name: first_text(raw, STATION_NAME).unwrap_or_else(|| fallback_name.to_owned()),
        status: first_text(raw, STATUS).unwrap_or_else(|| UNKNOWN_STATUS.to_owned()),
        address: Address {
            line: first_text(raw, ADDRESS_LINE),
            city: first_text(raw, ADDRESS_CITY),
            country: first_text(raw, ADDRESS_COUNTRY),
        },
        latitude: first_number(raw, LATITUDE),
        longitude: first_number(raw, LONGITUDE),
        ports: normalize_ports(first_array(raw, PORTS)),
        last_update: now,
    }
}

fn normalize_ports(entries: &[Value]) -> Vec<CanonicalPort> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let index = i + 1;
            CanonicalPort {
                index,
                name: first_text(entry, PORT_NAME).unwrap_or_else(|| format!("Port {index}")),
                status: first_text(entry, PORT_STATUS)
                    .unwrap_or_else(|| UNKNOWN_STATUS.to_owned()),
            }
        })
        .collect()
}

// ── Path helpers ───────────────────────────────────────────────────

/// Walk `path` through nested objects.
fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, key| node.as_object()?.get(*key))
}

/// Non-empty string, or a number rendered as text.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Finite number, accepting numeric strings.
fn as_finite(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn first_text(value: &Value, rules: &[FieldPath]) -> Option<String> {
    rules
        .iter()
        .find_map(|path| lookup(value, path).and_then(as_text))
}

fn first_number(value: &Value, rules: &[FieldPath]) -> Option<f64> {
    rules
        .iter()
        .find_map(|path| lookup(value, path).and_then(as_finite))
}

fn first_array<'a>(value: &'a Value, rules: &[FieldPath]) -> &'a [Value] {
    rules
        .iter()
        .find_map(|path| lookup(value, path).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
