//! Clap derive structures for the `ovnlab` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ovnlab -- build and tear down OVN virtual labs from a JSON description
#[derive(Debug, Parser)]
#[command(
    name = "ovnlab",
    version,
    about = "Build and tear down OVN virtual labs",
    long_about = "Reads a lab description (a VPC and its switches) from a JSON file,\n\
        derives every router, switch, port and DHCP object from it, and\n\
        reconciles the OVN Northbound database toward that topology.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "OVNLAB_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Connect and request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Northbound connection string (unix:<path> or tcp:<host>:<port>)
    #[arg(long, global = true)]
    pub nb_connection: Option<String>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
    /// Plain text, one object per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or converge every object of a lab
    Build(BuildArgs),

    /// Delete every object a lab owns
    Destroy(DestroyArgs),

    /// Check a lab file and show the topology it expands to
    #[command(alias = "check")]
    Validate(ValidateArgs),

    /// Inspect resolved settings
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LabArgs {
    /// Lab description (JSON)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct BackendArgs {
    /// OVN run directory holding ovnnb_db.sock
    #[arg(long, value_name = "PATH")]
    pub socket_dir: Option<PathBuf>,

    /// Show the planned operations without applying them
    #[arg(long)]
    pub dry_run: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub lab: LabArgs,

    #[command(flatten)]
    pub backend: BackendArgs,
}

#[derive(Debug, Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub lab: LabArgs,

    #[command(flatten)]
    pub backend: BackendArgs,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub lab: LabArgs,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved settings as TOML
    Show,

    /// Print the settings file location
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
