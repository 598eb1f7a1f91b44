// ── Control-plane backends ──
//
// The reconciler talks to the system of record through `Backend`: four
// primitive calls over kinds, names and flat attribute maps. `northbound`
// maps them onto OVN Northbound tables; `memory` keeps them in a map for
// tests and dry runs.

pub mod memory;
pub mod northbound;

use thiserror::Error;

use crate::model::{Attributes, ObjectKind, ObjectRecord};

pub use memory::MemoryBackend;
pub use northbound::NorthboundBackend;

/// Result of a delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Primitive operations every control plane must provide.
///
/// Calls are issued one at a time by a single task, so implementations may
/// serialize internally.
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// Objects of `kind` whose name starts with `prefix`.
    async fn list_objects(
        &self,
        prefix: &str,
        kind: ObjectKind,
    ) -> Result<Vec<ObjectRecord>, BackendError>;

    async fn create_object(
        &self,
        kind: ObjectKind,
        name: &str,
        attributes: &Attributes,
    ) -> Result<(), BackendError>;

    /// Replace the attributes of an existing object.
    async fn update_object(
        &self,
        kind: ObjectKind,
        name: &str,
        attributes: &Attributes,
    ) -> Result<(), BackendError>;

    async fn delete_object(
        &self,
        kind: ObjectKind,
        name: &str,
    ) -> Result<DeleteOutcome, BackendError>;
}

/// Why a backend call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Cannot reach control plane: {reason}")]
    Connection { reason: String },

    #[error("Control plane did not answer within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The control plane refused the change.
    #[error("Rejected by control plane: {message}")]
    Rejected { message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The object references a parent that does not exist.
    #[error("{kind} '{name}' needs missing parent '{parent}'")]
    Parent {
        kind: ObjectKind,
        name: String,
        parent: String,
    },
}

impl BackendError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

impl From<ovnlab_api::Error> for BackendError {
    fn from(err: ovnlab_api::Error) -> Self {
        use ovnlab_api::Error as E;
        match err {
            E::InvalidEndpoint(_) | E::Connect { .. } | E::ConnectionClosed | E::Io(_) => {
                Self::Connection {
                    reason: err.to_string(),
                }
            }
            E::Timeout { timeout_secs } => Self::Timeout { timeout_secs },
            E::Transaction {
                error, details, ..
            } => Self::Rejected {
                message: match details {
                    Some(details) => format!("{error}: {details}"),
                    None => error,
                },
            },
            E::Rpc { method, message } => Self::Rejected {
                message: format!("{method}: {message}"),
            },
            E::Json(_) | E::Protocol(_) => Self::Protocol(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_fold_into_backend_errors() {
        let timeout: BackendError = ovnlab_api::Error::Timeout { timeout_secs: 3 }.into();
        assert_eq!(timeout, BackendError::Timeout { timeout_secs: 3 });

        let closed: BackendError = ovnlab_api::Error::ConnectionClosed.into();
        assert!(matches!(closed, BackendError::Connection { .. }));

        let txn: BackendError = ovnlab_api::Error::Transaction {
            index: 1,
            error: "constraint violation".into(),
            details: Some("duplicate name".into()),
        }
        .into();
        assert_eq!(
            txn,
            BackendError::rejected("constraint violation: duplicate name")
        );

        let proto: BackendError = ovnlab_api::Error::Protocol("bad reply".into()).into();
        assert!(matches!(proto, BackendError::Protocol(_)));
    }
}
