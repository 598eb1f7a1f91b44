//! Shared helpers for command handlers.

use std::io::IsTerminal;

use ovnlab_core::{CoreError, NorthboundBackend, Reconciler, Topology};

use crate::config::Settings;
use crate::error::CliError;

/// Load a lab file and expand it into its topology.
pub fn load_topology(path: &std::path::Path) -> Result<Topology, CliError> {
    let lab = ovnlab_config::load_lab(path)?;
    Ok(Topology::build(&lab)?)
}

/// A reconciler bound to the Northbound endpoint it was connected to.
pub struct Session {
    pub reconciler: Reconciler<NorthboundBackend>,
    pub endpoint: String,
}

impl Session {
    /// Map a core failure, naming this session's endpoint.
    pub fn error(&self, err: impl Into<CoreError>) -> CliError {
        CliError::from_core(err.into(), &self.endpoint)
    }
}

/// Connect to the Northbound database named by `settings`.
pub async fn connect(settings: &Settings) -> Result<Session, CliError> {
    let config = settings.northbound_config()?;
    let endpoint = config.endpoint.to_string();
    tracing::debug!(%endpoint, timeout_secs = settings.timeout, "connecting");
    let backend = NorthboundBackend::connect(&config)
        .await
        .map_err(|e| CliError::from_backend(e, &endpoint))?;
    Ok(Session {
        reconciler: Reconciler::new(backend),
        endpoint,
    })
}

/// Fail early when a prompt would be needed but stdin cannot answer it.
pub fn require_interactive(action: &str, yes_flag: bool) -> Result<(), CliError> {
    if yes_flag || std::io::stdin().is_terminal() {
        return Ok(());
    }
    Err(CliError::NonInteractiveRequiresYes {
        action: action.into(),
    })
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}
