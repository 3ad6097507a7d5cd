//! Data gateway adapters. Implement DataGateway.
//!
//! REST (hosted backend), JSON snapshot (offline/tests) and the cache decorator.

pub mod cached;
pub mod rest;
pub mod snapshot;

pub use cached::{CachedGateway, ChangeEvent};
pub use rest::RestGateway;
pub use snapshot::{Snapshot, SnapshotGateway};
