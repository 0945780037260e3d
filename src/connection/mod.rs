//! Connection management for genviz.
//!
//! Centralizes connection lifecycle, caching and schema refresh.

pub mod manager;

pub use manager::{ActiveConnection, ConnectionKey, ConnectionManager, Connector, DriverConnector};
