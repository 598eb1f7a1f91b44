//! CLI error types with miette diagnostics.
//!
//! Maps core and config failures into user-facing errors with actionable
//! help text and a stable process exit code.

use miette::Diagnostic;
use thiserror::Error;

use ovnlab_config::ConfigError;
use ovnlab_core::{Action, ApplyError, BackendError, CoreError, ObjectKind, ObjectState, Violation};

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NAMING: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const BACKEND: i32 = 9;
}

/// One rejected field, rendered as a related diagnostic.
#[derive(Debug, Error, Diagnostic)]
#[error("{path}: {message}")]
#[diagnostic(code(ovnlab::violation))]
pub struct ViolationDiagnostic {
    pub path: String,
    pub message: String,
}

/// One operation of a failed run, listed in plan order under the error.
#[derive(Debug, Error, Diagnostic)]
#[error("{status}: {action} {kind} '{name}'")]
#[diagnostic(code(ovnlab::apply_step))]
pub struct StepDiagnostic {
    pub status: &'static str,
    pub action: String,
    pub kind: String,
    pub name: String,
}

impl StepDiagnostic {
    fn applied(state: ObjectState, kind: ObjectKind, name: &str) -> Self {
        let action = match state {
            ObjectState::Created => Action::Create,
            ObjectState::Updated | ObjectState::Unchanged => Action::Update,
            ObjectState::Deleted | ObjectState::AlreadyAbsent => Action::Delete,
        };
        Self {
            status: "applied",
            action: action.to_string(),
            kind: kind.to_string(),
            name: name.to_owned(),
        }
    }

    fn not_attempted(action: Action, kind: ObjectKind, name: &str) -> Self {
        Self {
            status: "not attempted",
            action: action.to_string(),
            kind: kind.to_string(),
            name: name.to_owned(),
        }
    }
}

impl From<Violation> for ViolationDiagnostic {
    fn from(v: Violation) -> Self {
        Self {
            path: v.path,
            message: v.message,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Lab configuration ────────────────────────────────────────────
    #[error("Lab configuration is invalid ({count} problem(s))")]
    #[diagnostic(
        code(ovnlab::invalid_lab),
        help("Fix the fields listed below, then check again with: ovnlab validate --config <PATH>")
    )]
    InvalidLab {
        count: usize,
        #[related]
        violations: Vec<ViolationDiagnostic>,
    },

    #[error("Cannot read lab file {path}")]
    #[diagnostic(code(ovnlab::lab_file), help("Pass an existing JSON file with --config."))]
    LabFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Generated {what} '{value}' twice")]
    #[diagnostic(
        code(ovnlab::naming_collision),
        help("Two switches or ports expand to the same identity. Give them distinct ids.")
    )]
    NamingCollision { what: String, value: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the OVN Northbound database at {endpoint}: {reason}")]
    #[diagnostic(
        code(ovnlab::connection_failed),
        help(
            "Check that ovsdb-server for OVN_Northbound is running.\n\
             Point at its run directory with --socket-dir, or use\n\
             --nb-connection unix:<path> | tcp:<host>:<port>."
        )
    )]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Northbound database did not answer within {timeout_secs}s")]
    #[diagnostic(
        code(ovnlab::timeout),
        help("Increase the limit with --timeout <SECS> or OVNLAB_TIMEOUT.")
    )]
    Timeout { timeout_secs: u64 },

    // ── Backend ──────────────────────────────────────────────────────
    #[error("Northbound query failed: {reason}")]
    #[diagnostic(code(ovnlab::query_failed))]
    QueryFailed { reason: String },

    #[error("{action} {kind} '{name}' failed: {reason}")]
    #[diagnostic(
        code(ovnlab::apply_failed),
        help(
            "{applied} operation(s) were applied and {pending} were not attempted (listed below).\n\
             Nothing was rolled back; run the same command again to resume."
        )
    )]
    ApplyFailed {
        action: String,
        kind: String,
        name: String,
        reason: String,
        applied: usize,
        pending: usize,
        exit: i32,
        #[related]
        steps: Vec<StepDiagnostic>,
    },

    // ── Usage ────────────────────────────────────────────────────────
    #[error("Refusing to {action} without confirmation")]
    #[diagnostic(
        code(ovnlab::confirmation_required),
        help("stdin is not a terminal. Pass --yes to confirm non-interactively.")
    )]
    NonInteractiveRequiresYes { action: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ovnlab::validation))]
    Validation { field: String, reason: String },

    // ── Settings / general ───────────────────────────────────────────
    #[error("Settings error: {message}")]
    #[diagnostic(
        code(ovnlab::config_error),
        help("Run: ovnlab config path  to find the settings file.")
    )]
    Config { message: String },

    #[error("Cannot render output: {0}")]
    #[diagnostic(code(ovnlab::output))]
    Render(String),

    #[error(transparent)]
    #[diagnostic(code(ovnlab::io))]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidLab { .. }
            | Self::LabFile { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::Validation { .. } => exit_code::USAGE,
            Self::NamingCollision { .. } => exit_code::NAMING,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::QueryFailed { .. } => exit_code::BACKEND,
            Self::ApplyFailed { exit, .. } => *exit,
            Self::Config { .. } | Self::Render(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }

    /// Map a backend error raised while connecting to `endpoint`.
    pub fn from_backend(err: BackendError, endpoint: &str) -> Self {
        match err {
            BackendError::Connection { reason } => Self::ConnectionFailed {
                endpoint: endpoint.to_owned(),
                reason,
            },
            BackendError::Timeout { timeout_secs } => Self::Timeout { timeout_secs },
            other => Self::QueryFailed {
                reason: other.to_string(),
            },
        }
    }
}

fn backend_exit_code(err: &BackendError) -> i32 {
    match err {
        BackendError::Connection { .. } => exit_code::CONNECTION,
        BackendError::Timeout { .. } => exit_code::TIMEOUT,
        _ => exit_code::BACKEND,
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl CliError {
    /// Map a core error raised while talking to `endpoint`.
    pub fn from_core(err: CoreError, endpoint: &str) -> Self {
        match err {
            CoreError::Validation(err) => err.into(),
            CoreError::NamingCollision { what, value } => Self::NamingCollision { what, value },
            CoreError::Backend(err) => Self::from_backend(err, endpoint),
            CoreError::Apply(err) => Self::from_apply(*err),
        }
    }

    fn from_apply(err: ApplyError) -> Self {
        let steps = err
            .applied
            .iter()
            .map(|o| StepDiagnostic::applied(o.state, o.kind, &o.name))
            .chain(
                err.pending
                    .iter()
                    .map(|op| StepDiagnostic::not_attempted(op.action, op.kind, &op.name)),
            )
            .collect();
        Self::ApplyFailed {
            action: err.failed.action.to_string(),
            kind: err.failed.kind.to_string(),
            name: err.failed.name,
            reason: err.source.to_string(),
            applied: err.applied.len(),
            pending: err.pending.len(),
            exit: backend_exit_code(&err.source),
            steps,
        }
    }
}

/// Errors raised before any connection exists: lab expansion only yields
/// validation and naming failures. Handlers holding a connection use
/// [`CliError::from_core`] so backend failures name the endpoint.
impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        Self::from_core(err, "the Northbound database")
    }
}

impl From<ovnlab_core::ValidationError> for CliError {
    fn from(err: ovnlab_core::ValidationError) -> Self {
        Self::InvalidLab {
            count: err.violations.len(),
            violations: err.violations.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(err) => err.into(),
            ConfigError::Io { path, source } => Self::LabFile {
                path: path.display().to_string(),
                source,
            },
            ConfigError::Endpoint { value, reason } => Self::Validation {
                field: "nb_connection".into(),
                reason: format!("'{value}': {reason}"),
            },
            other @ (ConfigError::Figment(_) | ConfigError::Serialization(_)) => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Render(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ovnlab_core::{Outcome, PlannedOperation};

    #[test]
    fn validation_errors_keep_every_violation() {
        let err: CliError = ovnlab_core::ValidationError {
            violations: vec![
                Violation::new("vpc.name", "must not be empty"),
                Violation::new("switches[0].subnet", "not a CIDR"),
            ],
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
        let CliError::InvalidLab { count, violations } = err else {
            panic!("expected InvalidLab");
        };
        assert_eq!(count, 2);
        assert_eq!(violations[1].to_string(), "switches[0].subnet: not a CIDR");
    }

    #[test]
    fn backend_failures_map_to_exit_codes() {
        let conn = CliError::from_backend(
            BackendError::Connection {
                reason: "no such file".into(),
            },
            "unix:/run/ovn/ovnnb_db.sock",
        );
        assert_eq!(conn.exit_code(), exit_code::CONNECTION);
        assert!(conn.to_string().contains("unix:/run/ovn/ovnnb_db.sock"));

        let timeout = CliError::from_backend(BackendError::Timeout { timeout_secs: 5 }, "x");
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let query = CliError::from(CoreError::Backend(BackendError::Protocol("bad".into())));
        assert_eq!(query.exit_code(), exit_code::BACKEND);
    }

    #[test]
    fn apply_failure_reports_progress() {
        let err = CoreError::from(ApplyError {
            failed: PlannedOperation {
                action: Action::Create,
                kind: ObjectKind::LogicalSwitch,
                name: "vlab-ls2".into(),
                attributes: ovnlab_core::Attributes::new(),
            },
            source: BackendError::rejected("constraint violation"),
            applied: vec![Outcome {
                kind: ObjectKind::LogicalSwitch,
                name: "vlab-ls1".into(),
                state: ObjectState::Created,
            }],
            pending: vec![PlannedOperation {
                action: Action::Create,
                kind: ObjectKind::LogicalSwitchPort,
                name: "vlab-ls2-lsp1".into(),
                attributes: ovnlab_core::Attributes::new(),
            }],
        });
        let err = CliError::from_core(err, "unix:/run/ovn/ovnnb_db.sock");
        assert_eq!(err.exit_code(), exit_code::BACKEND);
        assert_eq!(
            err.to_string(),
            "create logical-switch 'vlab-ls2' failed: Rejected by control plane: constraint violation"
        );
        let CliError::ApplyFailed {
            applied,
            pending,
            steps,
            ..
        } = err
        else {
            panic!("expected ApplyFailed");
        };
        assert_eq!((applied, pending), (1, 1));
        let steps: Vec<String> = steps.iter().map(ToString::to_string).collect();
        assert_eq!(
            steps,
            [
                "applied: create logical-switch 'vlab-ls1'",
                "not attempted: create logical-switch-port 'vlab-ls2-lsp1'",
            ]
        );
    }

    #[test]
    fn observe_failure_names_the_endpoint() {
        let err = CliError::from_core(
            CoreError::Backend(BackendError::Connection {
                reason: "connection reset".into(),
            }),
            "tcp:10.0.0.5:6641",
        );
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
        assert_eq!(
            err.to_string(),
            "Could not reach the OVN Northbound database at tcp:10.0.0.5:6641: connection reset"
        );
    }

    #[test]
    fn naming_collision_has_its_own_code() {
        let err = CliError::from(CoreError::NamingCollision {
            what: "MAC".into(),
            value: "e1:cc:ff:01:01:01".into(),
        });
        assert_eq!(err.exit_code(), exit_code::NAMING);
    }
}
