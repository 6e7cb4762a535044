// ── State tree writer ──
//
// Projects a canonical station record into the state tree. Every step is
// ensure-then-write and safe to re-run each cycle; values are written
// unconditionally and always acknowledged. Suppressing no-op updates is
// the backend's business.

use chrono::SecondsFormat;
use serde_json::Value;
use tracing::trace;

use crate::error::CoreError;
use crate::model::CanonicalStationRecord;
use crate::store::{NodeMeta, StatePath, StateTree, StateValue, ValueType};

/// Top-level namespace holding one channel per station.
pub const STATIONS_NAMESPACE: &str = "stations";

/// Path of the channel for station `id`.
pub fn station_path(id: &str) -> StatePath {
    StatePath::root(STATIONS_NAMESPACE).child(id)
}

/// Path of the aggregate connectivity flag.
pub fn connection_path() -> StatePath {
    StatePath::root("info").child("connection")
}

/// Writes station records and the connectivity flag into a [`StateTree`].
pub struct StateWriter<'a, T> {
    tree: &'a T,
}

impl<'a, T: StateTree> StateWriter<'a, T> {
    pub fn new(tree: &'a T) -> Self {
        Self { tree }
    }

    /// Create the node if absent. Existing metadata is left untouched.
    pub async fn ensure_node(&self, path: &StatePath, meta: &NodeMeta) -> Result<(), CoreError> {
        self.tree
            .ensure_node(path, meta)
            .await
            .map(|_| ())
            .map_err(|source| CoreError::Write {
                path: path.to_string(),
                source,
            })
    }

    /// Write an acknowledged value.
    pub async fn write_value(
        &self,
        path: &StatePath,
        value: impl Into<StateValue>,
    ) -> Result<(), CoreError> {
        let value = value.into();
        trace!(%path, %value, "write");
        self.tree
            .write_value(path, value, true)
            .await
            .map_err(|source| CoreError::Write {
                path: path.to_string(),
                source,
            })
    }

    async fn put(
        &self,
        path: &StatePath,
        meta: NodeMeta,
        value: impl Into<StateValue>,
    ) -> Result<(), CoreError> {
        self.ensure_node(path, &meta).await?;
        self.write_value(path, value).await
    }

    /// Write the full node set for one station.
    ///
    /// Order: channel, raw JSON, info scalars, coordinates, ports, last
    /// update. The first failing step aborts the remaining writes for
    /// this station.
    pub async fn write_station(
        &self,
        record: &CanonicalStationRecord,
        raw: &Value,
    ) -> Result<(), CoreError> {
        let name = record.display_name.as_str();
        let base = station_path(&record.id);
        let info = base.child("info");

        self.ensure_node(&base, &NodeMeta::channel(name)).await?;

        self.put(
            &base.child("raw"),
            NodeMeta::state(format!("{name} raw JSON"), ValueType::String, "json"),
            serde_json::to_string(raw)?,
        )
        .await?;

        self.put(
            &info.child("name"),
            NodeMeta::state(name, ValueType::String, "text"),
            name,
        )
        .await?;
        self.put(
            &info.child("status"),
            NodeMeta::state(format!("{name} status"), ValueType::String, "value"),
            record.status.as_str(),
        )
        .await?;
        self.put(
            &info.child("address"),
            NodeMeta::state(format!("{name} address"), ValueType::String, "text"),
            record.address.compose(),
        )
        .await?;

        let location = base.child("location");
        if let Some(lat) = record.latitude {
            self.put(
                &location.child("latitude"),
                NodeMeta::state(
                    format!("{name} latitude"),
                    ValueType::Number,
                    "value.gps.latitude",
                ),
                lat,
            )
            .await?;
        }
        if let Some(lng) = record.longitude {
            self.put(
                &location.child("longitude"),
                NodeMeta::state(
                    format!("{name} longitude"),
                    ValueType::Number,
                    "value.gps.longitude",
                ),
                lng,
            )
            .await?;
        }

        if !record.ports.is_empty() {
            let ports = base.child("ports");
            for port in &record.ports {
                let idx = port.index;
                let port_base = ports.child(idx.to_string());
                self.ensure_node(&port_base, &NodeMeta::channel(format!("{name} port {idx}")))
                    .await?;
                self.put(
                    &port_base.child("name"),
                    NodeMeta::state(format!("{name} port {idx} name"), ValueType::String, "text"),
                    port.name.as_str(),
                )
                .await?;
                self.put(
                    &port_base.child("status"),
                    NodeMeta::state(
                        format!("{name} port {idx} status"),
                        ValueType::String,
                        "value",
                    ),
                    port.status.as_str(),
                )
                .await?;
            }

            self.put(
                &info.child("portCount"),
                NodeMeta::state(format!("{name} port count"), ValueType::Number, "value"),
                record.ports.len(),
            )
            .await?;
        }

        self.put(
            &info.child("lastUpdate"),
            NodeMeta::state(format!("{name} last update"), ValueType::String, "date"),
            record
                .last_update
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .await
    }

    /// Publish the aggregate connectivity flag.
    pub async fn write_connection(&self, connected: bool) -> Result<(), CoreError> {
        self.put(
            &connection_path(),
            NodeMeta::state(
                "At least one station reachable",
                ValueType::Boolean,
                "indicator.connected",
            ),
            connected,
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::error::StoreError;
    use crate::model::{Address, CanonicalPort};
    use crate::store::{MemoryTree, NodeKind};

    fn record(ports: usize) -> CanonicalStationRecord {
        CanonicalStationRecord {
            id: "ABC123".into(),
            display_name: "Garage".into(),
            status: "AVAILABLE".into(),
            address: Address {
                line: None,
                city: Some("Berlin".into()),
                country: Some("DE".into()),
            },
            latitude: Some(52.5),
            longitude: None,
            ports: (1..=ports)
                .map(|index| CanonicalPort {
                    index,
                    name: format!("P{index}"),
                    status: "AVAILABLE".into(),
                })
                .collect(),
            last_update: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn text(tree: &MemoryTree, path: &str) -> Option<String> {
        let p = path
            .split('.')
            .skip(1)
            .fold(StatePath::root(path.split('.').next().unwrap()), |p, s| p.child(s));
        tree.value(&p).map(|v| v.to_string())
    }

    /// Records every call; optionally fails writes to one path.
    #[derive(Default)]
    struct RecordingTree {
        calls: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl StateTree for RecordingTree {
        async fn ensure_node(&self, path: &StatePath, _meta: &NodeMeta) -> Result<bool, StoreError> {
            self.calls.lock().unwrap().push(format!("ensure {path}"));
            Ok(true)
        }

        async fn write_value(
            &self,
            path: &StatePath,
            _value: StateValue,
            ack: bool,
        ) -> Result<(), StoreError> {
            assert!(ack, "writer must only emit acknowledged values");
            if self.fail_on.as_deref() == Some(path.as_str()) {
                return Err(StoreError::Unavailable {
                    reason: "disk full".into(),
                });
            }
            self.calls.lock().unwrap().push(format!("write {path}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn writes_expected_nodes() {
        let tree = MemoryTree::new();
        let raw = json!({ "status": "AVAILABLE", "n": [1, 2] });
        StateWriter::new(&tree)
            .write_station(&record(2), &raw)
            .await
            .unwrap();

        assert_eq!(text(&tree, "stations.ABC123.info.name").as_deref(), Some("Garage"));
        assert_eq!(text(&tree, "stations.ABC123.info.status").as_deref(), Some("AVAILABLE"));
        assert_eq!(text(&tree, "stations.ABC123.info.address").as_deref(), Some("Berlin, DE"));
        assert_eq!(text(&tree, "stations.ABC123.info.portCount").as_deref(), Some("2"));
        assert_eq!(text(&tree, "stations.ABC123.ports.1.name").as_deref(), Some("P1"));
        assert_eq!(text(&tree, "stations.ABC123.ports.2.status").as_deref(), Some("AVAILABLE"));
        assert_eq!(
            text(&tree, "stations.ABC123.info.lastUpdate").as_deref(),
            Some("1970-01-01T00:00:00.000Z")
        );
        assert_eq!(text(&tree, "stations.ABC123.location.latitude").as_deref(), Some("52.5"));

        let raw_text = text(&tree, "stations.ABC123.raw").unwrap();
        assert_eq!(serde_json::from_str::<Value>(&raw_text).unwrap(), raw);

        let channel = tree.node(&station_path("ABC123")).unwrap();
        assert_eq!(channel.kind, NodeKind::Channel);
        assert_eq!(channel.name, "Garage");
    }

    #[tokio::test]
    async fn missing_coordinate_creates_no_node() {
        let tree = MemoryTree::new();
        StateWriter::new(&tree)
            .write_station(&record(0), &json!({}))
            .await
            .unwrap();

        let location = station_path("ABC123").child("location");
        assert!(tree.contains(&location.child("latitude")));
        assert!(!tree.contains(&location.child("longitude")));
    }

    #[tokio::test]
    async fn zero_ports_writes_no_port_nodes() {
        let tree = MemoryTree::new();
        StateWriter::new(&tree)
            .write_station(&record(0), &json!({}))
            .await
            .unwrap();

        let base = station_path("ABC123");
        assert!(tree.paths_under(&base.child("ports")).is_empty());
        assert!(!tree.contains(&base.child("info").child("portCount")));
    }

    #[tokio::test]
    async fn rewriting_is_idempotent() {
        let tree = MemoryTree::new();
        let writer = StateWriter::new(&tree);
        writer.write_station(&record(1), &json!({})).await.unwrap();
        let first = tree.snapshot_json();
        let count = tree.len();

        writer.write_station(&record(1), &json!({})).await.unwrap();
        assert_eq!(tree.snapshot_json(), first);
        assert_eq!(tree.len(), count);
    }

    #[tokio::test]
    async fn each_node_is_ensured_before_written_in_order() {
        let tree = RecordingTree::default();
        StateWriter::new(&tree)
            .write_station(&record(1), &json!({}))
            .await
            .unwrap();

        let calls = tree.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            [
                "ensure stations.ABC123",
                "ensure stations.ABC123.raw",
                "write stations.ABC123.raw",
                "ensure stations.ABC123.info.name",
                "write stations.ABC123.info.name",
                "ensure stations.ABC123.info.status",
                "write stations.ABC123.info.status",
                "ensure stations.ABC123.info.address",
                "write stations.ABC123.info.address",
                "ensure stations.ABC123.location.latitude",
                "write stations.ABC123.location.latitude",
                "ensure stations.ABC123.ports.1",
                "ensure stations.ABC123.ports.1.name",
                "write stations.ABC123.ports.1.name",
                "ensure stations.ABC123.ports.1.status",
                "write stations.ABC123.ports.1.status",
                "ensure stations.ABC123.info.portCount",
                "write stations.ABC123.info.portCount",
                "ensure stations.ABC123.info.lastUpdate",
                "write stations.ABC123.info.lastUpdate",
            ]
        );
    }

    #[tokio::test]
    async fn store_failure_aborts_remaining_writes() {
        let tree = RecordingTree {
            fail_on: Some("stations.ABC123.info.status".into()),
            ..RecordingTree::default()
        };
        let err = StateWriter::new(&tree)
            .write_station(&record(1), &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Write { ref path, .. } if path == "stations.ABC123.info.status"));
        let calls = tree.calls.lock().unwrap();
        assert_eq!(calls.last().map(String::as_str), Some("ensure stations.ABC123.info.status"));
        assert!(!calls.iter().any(|c| c.contains("lastUpdate")));
    }

    #[tokio::test]
    async fn connection_flag_is_boolean() {
        let tree = MemoryTree::new();
        StateWriter::new(&tree).write_connection(false).await.unwrap();
        assert_eq!(tree.value(&connection_path()), Some(StateValue::Bool(false)));
        assert_eq!(
            tree.node(&connection_path()).unwrap().value_type,
            Some(ValueType::Boolean)
        );
    }
}
