//! CLI settings resolution: thin layer over `ovnlab_config`.
//!
//! Flags win over environment, which wins over the settings file, which wins
//! over built-in defaults.

use std::path::Path;

pub use ovnlab_config::{Settings, config_path, load_settings};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load settings and apply global flag overrides.
pub fn resolve_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    let mut settings = load_settings()?;
    apply_overrides(&mut settings, global);
    Ok(settings)
}

fn apply_overrides(settings: &mut Settings, global: &GlobalOpts) {
    if let Some(level) = &global.log_level {
        settings.log_level.clone_from(level);
    }
    if global.json_logs {
        settings.json_logs = true;
    }
    if let Some(timeout) = global.timeout {
        settings.timeout = timeout;
    }
    if let Some(conn) = &global.nb_connection {
        settings.nb_connection = Some(conn.clone());
    }
}

/// Settings for one command, with its `--socket-dir` applied.
pub fn with_socket_dir(settings: &Settings, socket_dir: Option<&Path>) -> Settings {
    let mut settings = settings.clone();
    if let Some(dir) = socket_dir {
        settings.socket_dir = dir.to_owned();
    }
    settings
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn flags_override_loaded_settings() {
        let cli = Cli::parse_from([
            "ovnlab",
            "--timeout",
            "5",
            "--log-level",
            "debug",
            "--nb-connection",
            "tcp:127.0.0.1:6641",
            "config",
            "show",
        ]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &cli.global);
        assert_eq!(settings.timeout, 5);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.nb_connection.as_deref(), Some("tcp:127.0.0.1:6641"));
        assert!(!settings.json_logs);
    }

    #[test]
    fn socket_dir_applies_per_command() {
        let base = Settings::default();
        let local = with_socket_dir(&base, Some(Path::new("/tmp/ovn")));
        assert_eq!(local.socket_dir, PathBuf::from("/tmp/ovn"));
        assert_eq!(with_socket_dir(&base, None), base);
    }
}
