// ── State tree abstraction ──
//
// The hierarchical key/value store the poller projects station data
// into. Nodes are addressed by dotted paths, created at most once, and
// written many times. Backends own change notification; writers never
// read before writing.

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::error::StoreError;

// ── Paths ────────────────────────────────────────────────────────

/// Characters that would break dotted addressing inside one segment.
const FORBIDDEN_SEGMENT_CHARS: &[char] = &['.', '*', '?', '[', ']', '"', '\'', '`'];

/// Dotted address of a node, e.g. `stations.ABC123.info.status`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StatePath(String);

impl StatePath {
    /// Single-segment path. The segment is sanitized.
    pub fn root(segment: impl AsRef<str>) -> Self {
        Self(sanitize_segment(segment.as_ref()))
    }

    /// Append one segment. The segment is sanitized, so ids containing
    /// dots can never create extra levels.
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        Self(format!("{}.{}", self.0, sanitize_segment(segment.as_ref())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Whether `self` is `other` or lies below it.
    pub fn starts_with(&self, other: &StatePath) -> bool {
        self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0.as_bytes().get(other.0.len()) == Some(&b'.'))
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Replace characters that are not allowed inside a path segment with `_`.
pub fn sanitize_segment(segment: &str) -> String {
    if segment.is_empty() {
        return "_".into();
    }
    segment
        .chars()
        .map(|c| {
            if c.is_whitespace() || c.is_control() || FORBIDDEN_SEGMENT_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

// ── Node metadata ────────────────────────────────────────────────

/// Structural kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Grouping node; carries no value.
    Channel,
    /// Leaf node holding a value.
    State,
}

/// Declared type of a state node's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
}

/// Metadata a node is created with. Never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeMeta {
    pub kind: NodeKind,
    /// Human-readable label.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    /// Semantic role, e.g. `value.gps.latitude` or `indicator.connected`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub read: bool,
    pub write: bool,
}

impl NodeMeta {
    pub fn channel(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Channel,
            name: name.into(),
            value_type: None,
            role: None,
            read: true,
            write: false,
        }
    }

    /// Read-only state node.
    pub fn state(name: impl Into<String>, value_type: ValueType, role: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::State,
            name: name.into(),
            value_type: Some(value_type),
            role: Some(role.into()),
            read: true,
            write: false,
        }
    }
}

// ── Values ───────────────────────────────────────────────────────

/// A value stored in a state node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Text(String),
    /// Counts and other whole numbers; serialized without a fraction.
    Integer(i64),
    Number(f64),
    Bool(bool),
}

impl StateValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value, widening integers to `f64`.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(n) => Some(*n as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<f64> for StateValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<usize> for StateValue {
    fn from(n: usize) -> Self {
        Self::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Current value of a state node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct State {
    pub value: StateValue,
    /// `true` for confirmed/observed values, `false` for pending commands.
    pub ack: bool,
    pub ts: DateTime<Utc>,
}

/// Notification emitted by a backend when a node's value changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub path: StatePath,
    pub state: State,
}

// ── Backend trait ────────────────────────────────────────────────

/// A hierarchical key/value store supporting create-if-absent and
/// acknowledged writes.
///
/// Implementations must serialize concurrent writes to the same path.
pub trait StateTree: Send + Sync {
    /// Create the node if it does not exist yet. An existing node keeps
    /// its metadata untouched. Returns `true` if the node was created.
    fn ensure_node(
        &self,
        path: &StatePath,
        meta: &NodeMeta,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Store `value` at `path` unconditionally.
    fn write_value(
        &self,
        path: &StatePath,
        value: StateValue,
        ack: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
