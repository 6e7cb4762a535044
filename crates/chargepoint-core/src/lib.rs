// chargepoint-core: Polls ChargePoint stations and mirrors them into a state tree.

pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod poller;
pub mod store;
pub mod sync;
pub mod writer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use chargepoint_api::DEFAULT_BASE_URL;
pub use chargepoint_api::transport::DEFAULT_TIMEOUT;
pub use config::{DEFAULT_INTERVAL_MINUTES, PollerConfig, StationConfig};
pub use error::{CoreError, StoreError};
pub use poller::{Poller, PollerState};
pub use sync::{CycleReport, Synchronizer};
pub use writer::{StateWriter, connection_path, station_path};

pub use model::{Address, CanonicalPort, CanonicalStationRecord, UNKNOWN_STATUS};
pub use normalize::{normalize, normalize_at};
pub use store::{
    MemoryTree, NodeKind, NodeMeta, State, StateChange, StatePath, StateTree, StateValue,
    ValueType, sanitize_segment,
};
