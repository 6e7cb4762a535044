// chargepoint-api: Async Rust client for the ChargePoint station status API

pub mod error;
pub mod station;
pub mod transport;

pub use error::Error;
pub use station::{DEFAULT_BASE_URL, StationClient};
pub use transport::TransportConfig;
