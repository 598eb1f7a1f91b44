// ── Core error types ──
//
// User-facing errors from ovnlab-core. Wire-level failures never surface
// directly: the `From<ovnlab_api::Error>` impl in `backend` folds them into
// `BackendError`, which the reconciler wraps here.

use thiserror::Error;

use crate::backend::BackendError;
use crate::model::ValidationError;
use crate::reconcile::ApplyError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Two derived objects would share a name or MAC. Never caused by
    /// user input that passed validation.
    #[error("Naming collision: {what} '{value}' generated twice")]
    NamingCollision { what: String, value: String },

    // ── Backend ──────────────────────────────────────────────────────
    /// Observing the backend failed before anything was applied.
    #[error("Backend query failed: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Apply(Box<ApplyError>),
}

impl From<ApplyError> for CoreError {
    fn from(err: ApplyError) -> Self {
        Self::Apply(Box::new(err))
    }
}

impl CoreError {
    /// The backend error underneath, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(err) => Some(err),
            Self::Apply(err) => Some(&err.source),
            _ => None,
        }
    }
}
