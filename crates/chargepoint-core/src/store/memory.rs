// ── In-memory state tree ──
//
// Lock-free concurrent node storage with push-based change notification
// via a `broadcast` channel. Repeated acknowledged writes of the same
// value refresh the timestamp but are not re-announced.

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::trace;

use super::tree::{NodeMeta, State, StateChange, StatePath, StateTree, StateValue};
use crate::error::StoreError;

const CHANGE_CHANNEL_SIZE: usize = 1024;

struct Node {
    meta: NodeMeta,
    state: Option<State>,
}

/// A [`StateTree`] held entirely in memory.
///
/// Uses `DashMap` for concurrent access; each path's entry is locked for
/// the duration of a single ensure or write, which serializes writers to
/// the same node.
pub struct MemoryTree {
    nodes: DashMap<StatePath, Node>,
    changes: broadcast::Sender<StateChange>,
}

impl MemoryTree {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        Self {
            nodes: DashMap::new(),
            changes,
        }
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Metadata of the node at `path`, if it exists.
    pub fn node(&self, path: &StatePath) -> Option<NodeMeta> {
        self.nodes.get(path).map(|n| n.meta.clone())
    }

    /// Full state (value, ack, timestamp) of the node at `path`.
    pub fn state(&self, path: &StatePath) -> Option<State> {
        self.nodes.get(path).and_then(|n| n.state.clone())
    }

    /// Current value of the node at `path`.
    pub fn value(&self, path: &StatePath) -> Option<StateValue> {
        self.state(path).map(|s| s.value)
    }

    pub fn contains(&self, path: &StatePath) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node paths, sorted.
    pub fn paths(&self) -> Vec<StatePath> {
        let mut paths: Vec<StatePath> = self.nodes.iter().map(|r| r.key().clone()).collect();
        paths.sort();
        paths
    }

    /// All node paths at or below `prefix`, sorted.
    pub fn paths_under(&self, prefix: &StatePath) -> Vec<StatePath> {
        let mut paths: Vec<StatePath> = self
            .nodes
            .iter()
            .filter(|r| r.key().starts_with(prefix))
            .map(|r| r.key().clone())
            .collect();
        paths.sort();
        paths
    }

    /// Nested JSON view of every node that holds a value.
    pub fn snapshot_json(&self) -> Value {
        let mut root = Map::new();
        for path in self.paths() {
            let Some(state) = self.state(&path) else {
                continue;
            };
            let Ok(value) = serde_json::to_value(&state.value) else {
                continue;
            };
            insert_nested(&mut root, &path, value);
        }
        Value::Object(root)
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTree for MemoryTree {
    async fn ensure_node(&self, path: &StatePath, meta: &NodeMeta) -> Result<bool, StoreError> {
        match self.nodes.entry(path.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                trace!(%path, kind = %meta.kind, "node created");
                slot.insert(Node {
                    meta: meta.clone(),
                    state: None,
                });
                Ok(true)
            }
        }
    }

    async fn write_value(
        &self,
        path: &StatePath,
        value: StateValue,
        ack: bool,
    ) -> Result<(), StoreError> {
        let mut node = self.nodes.get_mut(path).ok_or_else(|| StoreError::NotFound {
            path: path.to_string(),
        })?;

        let unchanged = node
            .state
            .as_ref()
            .is_some_and(|prev| prev.value == value && prev.ack == ack);
        let state = State {
            value,
            ack,
            ts: Utc::now(),
        };
        node.state = Some(state.clone());
        drop(node);

        if !unchanged {
            trace!(%path, value = %state.value, ack, "value changed");
            // No receivers is fine: nobody is watching yet.
            let _ = self.changes.send(StateChange {
                path: path.clone(),
                state,
            });
        }
        Ok(())
    }
}

/// Place `value` at the object position named by `path`, creating
/// intermediate objects. A path that collides with an existing leaf is
/// dropped.
fn insert_nested(root: &mut Map<String, Value>, path: &StatePath, value: Value) {
    let segments: Vec<&str> = path.segments().collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut cursor = root;
    for segment in parents {
        let entry = cursor
            .entry((*segment).to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(next) = entry else {
            return;
        };
        cursor = next;
    }
    cursor.insert((*last).to_owned(), value);
}
