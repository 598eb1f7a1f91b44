use thiserror::Error;

/// Top-level error type for the `ovnlab-api` crate.
///
/// Covers every failure mode of an OVSDB session: endpoint parsing,
/// connection setup, framing, JSON-RPC errors and per-operation
/// transaction errors. `ovnlab-core` maps these into backend errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Endpoint / connection ───────────────────────────────────────
    /// Connection string is neither `unix:<path>` nor `tcp:<host>:<port>`.
    #[error("Invalid endpoint '{0}': expected unix:<path> or tcp:<host>:<port>")]
    InvalidEndpoint(String),

    /// Socket connect failed (missing socket, refused, unreachable).
    #[error("Cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The server closed the stream while a reply was outstanding.
    #[error("Connection closed by server")]
    ConnectionClosed,

    // ── Transport ───────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes on the wire were not valid JSON.
    #[error("Invalid JSON on the wire: {0}")]
    Json(#[from] serde_json::Error),

    // ── JSON-RPC ────────────────────────────────────────────────────
    /// Non-null `error` member in a JSON-RPC reply.
    #[error("RPC '{method}' failed: {message}")]
    Rpc { method: String, message: String },

    /// A transaction operation was rejected by the database.
    ///
    /// `index` is the position of the failing operation; when it equals the
    /// number of submitted operations the commit itself failed (for example
    /// a referential integrity violation).
    #[error("Transaction failed at operation {index}: {error}")]
    Transaction {
        index: usize,
        error: String,
        details: Option<String>,
    },

    /// Reply did not have the shape RFC 7047 prescribes.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Connect { .. } | Self::ConnectionClosed
        )
    }

    /// Returns `true` if the database rejected a transaction on constraint grounds.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Transaction { error, .. } => {
                error == "constraint violation" || error == "referential integrity violation"
            }
            _ => false,
        }
    }
}
