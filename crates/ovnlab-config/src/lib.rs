//! Layered settings and lab file loading for ovnlab.
//!
//! Settings come from serialized defaults, then `config.toml` under the
//! platform config directory, then `OVNLAB_*` environment variables. The CLI
//! applies its own flags on top. Lab files are JSON and go through
//! `ovnlab_core` parsing and validation in one step.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use ovnlab_core::{Endpoint, Lab, LabConfig, NorthboundConfig, ValidationError, validate};

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "OVNLAB_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("invalid northbound connection '{value}': {reason}")]
    Endpoint { value: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// OVN run directory holding `ovnnb_db.sock`.
    pub socket_dir: PathBuf,

    /// Explicit connection string (`unix:<path>` or `tcp:<host>:<port>`);
    /// wins over `socket_dir`.
    pub nb_connection: Option<String>,

    /// Seconds allowed for connect and for each request.
    pub timeout: u64,

    pub log_level: String,

    pub json_logs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            socket_dir: default_socket_dir(),
            nb_connection: None,
            timeout: 60,
            log_level: "warn".into(),
            json_logs: false,
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Where the Northbound database listens.
    pub fn nb_endpoint(&self) -> Result<Endpoint, ConfigError> {
        match &self.nb_connection {
            Some(value) => value.parse::<Endpoint>().map_err(|e| ConfigError::Endpoint {
                value: value.clone(),
                reason: e.to_string(),
            }),
            None => Ok(Endpoint::northbound_socket(&self.socket_dir)),
        }
    }

    pub fn northbound_config(&self) -> Result<NorthboundConfig, ConfigError> {
        Ok(NorthboundConfig::new(self.nb_endpoint()?, self.timeout()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// OVN's default run directory for this platform.
pub fn default_socket_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/opt/local/var/run/ovn")
    } else {
        PathBuf::from("/var/run/ovn")
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "ovnlab", "ovnlab").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("ovnlab");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Load settings from the canonical file and the environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&config_path())
}

/// Load settings with `path` as the settings file. A missing file is not an
/// error; defaults and environment still apply.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    debug!(path = %path.display(), "loading settings");
    let settings = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX))
        .extract()?;
    Ok(settings)
}

/// Read, parse and validate a lab file.
pub fn load_lab(path: &Path) -> Result<Lab, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })?;
    let config = LabConfig::from_json_str(&text)?;
    let lab = validate(&config)?;
    debug!(
        path = %path.display(),
        vpc = %lab.vpc.name,
        switches = lab.switches.len(),
        "loaded lab"
    );
    Ok(lab)
}
