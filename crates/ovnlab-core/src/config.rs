// ── Northbound connection configuration ──

use std::path::PathBuf;
use std::time::Duration;

pub use ovnlab_api::Endpoint;

/// Where and how to reach the OVN Northbound database.
#[derive(Debug, Clone)]
pub struct NorthboundConfig {
    pub endpoint: Endpoint,
    /// Bound on connect and on every request.
    pub timeout: Duration,
}

impl NorthboundConfig {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }

    /// `unix:<socket_dir>/ovnnb_db.sock`.
    pub fn from_socket_dir(socket_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self::new(Endpoint::northbound_socket(socket_dir), timeout)
    }
}
