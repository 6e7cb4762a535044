// ── State tree storage ──
//
// The `StateTree` backend trait plus the bundled in-memory backend.

mod memory;
mod tree;

pub use memory::MemoryTree;
pub use tree::{
    NodeKind, NodeMeta, State, StateChange, StatePath, StateTree, StateValue, ValueType,
    sanitize_segment,
};
