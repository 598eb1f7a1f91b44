//! Output formatting: table, JSON, YAML, and plain text.
//!
//! Every renderer returns the text instead of printing so handlers stay
//! testable; [`print_output`] is the single place that writes to stdout.

use std::io::IsTerminal;

use owo_colors::{OwoColorize, Style};
use serde::Serialize;
use tabled::settings::Style as TableStyle;
use tabled::{Table, Tabled};

use ovnlab_core::{ApplyReport, Direction, ObjectState, Plan, Topology};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Styles ──────────────────────────────────────────────────────────

/// Terminal styles, plain unless [`Styles::colorize`] is called.
#[derive(Debug, Clone, Copy, Default)]
pub struct Styles {
    pub bold: Style,
    pub created: Style,
    pub updated: Style,
    pub deleted: Style,
    pub quiet: Style,
}

impl Styles {
    pub fn for_mode(mode: ColorMode) -> Self {
        let mut styles = Self::default();
        let enabled = match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
            }
        };
        if enabled {
            styles.colorize();
        }
        styles
    }

    pub fn colorize(&mut self) {
        self.bold = Style::new().bold();
        self.created = Style::new().green();
        self.updated = Style::new().yellow();
        self.deleted = Style::new().red();
        self.quiet = Style::new().dimmed();
    }

    fn state(&self, state: ObjectState) -> Style {
        match state {
            ObjectState::Created => self.created,
            ObjectState::Updated => self.updated,
            ObjectState::Deleted => self.deleted,
            ObjectState::Unchanged | ObjectState::AlreadyAbsent => self.quiet,
        }
    }
}

// ── Generic helpers ─────────────────────────────────────────────────

fn render_json<T: Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(data)?)
}

fn render_yaml<T: Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(TableStyle::rounded()).to_string()
}

/// Write rendered output to stdout, honoring `--quiet`.
pub fn print_output(text: &str, quiet: bool) {
    if quiet || text.is_empty() {
        return;
    }
    if text.ends_with('\n') {
        print!("{text}");
    } else {
        println!("{text}");
    }
}

// ── Topology ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ObjectRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Details")]
    details: String,
}

fn topology_rows(topology: &Topology) -> Vec<ObjectRow> {
    let mut rows = Vec::new();
    if let Some(router) = &topology.router {
        rows.push(ObjectRow {
            kind: "router".into(),
            name: router.name.clone(),
            details: String::new(),
        });
    }
    for sw in &topology.switches {
        rows.push(ObjectRow {
            kind: format!("switch ({})", sw.kind),
            name: sw.name.clone(),
            details: format!("{} {}", sw.label, sw.subnet),
        });
        if let Some(dhcp) = &sw.dhcp {
            rows.push(ObjectRow {
                kind: "dhcp".into(),
                name: dhcp.name.clone(),
                details: format!("{} via {}", dhcp.cidr, dhcp.server_id),
            });
        }
        for port in &sw.ports {
            rows.push(ObjectRow {
                kind: "port".into(),
                name: port.name.clone(),
                details: format!("{} {} {}", port.label, port.mac, addressing(port)),
            });
        }
        if let Some(att) = &sw.attachment {
            rows.push(ObjectRow {
                kind: "attachment".into(),
                name: att.name.clone(),
                details: format!("{} {}", att.mac, att.network),
            });
        }
    }
    rows
}

fn addressing(port: &ovnlab_core::topology::PortNode) -> String {
    match port.addressing {
        ovnlab_core::Addressing::Static(ip) => ip.to_string(),
        other => other.mode().to_string(),
    }
}

pub fn render_topology(
    topology: &Topology,
    format: OutputFormat,
    styles: &Styles,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json(topology),
        OutputFormat::Yaml => render_yaml(topology),
        OutputFormat::Table => {
            let summary = format!(
                "VPC {}: {} switch(es), {} port(s), {} object(s)",
                topology.vpc,
                topology.switches.len(),
                topology.port_count(),
                topology.desired_objects().len()
            );
            Ok(format!(
                "{}\n{}",
                render_table(&topology_rows(topology)),
                summary.style(styles.bold)
            ))
        }
        OutputFormat::Plain => Ok(topology
            .desired_objects()
            .into_iter()
            .map(|o| o.name)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

// ── Plans ───────────────────────────────────────────────────────────

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "#")]
    step: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
}

pub fn render_plan(plan: &Plan, format: OutputFormat, styles: &Styles) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json(plan),
        OutputFormat::Yaml => render_yaml(plan),
        OutputFormat::Plain => Ok(plan
            .operations
            .iter()
            .map(|op| format!("{} {} {}", op.action, op.kind, op.name))
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Table => {
            let summary = format!(
                "Plan to {} {}: {} operation(s), {} object(s) already in place",
                plan.direction,
                plan.vpc,
                plan.operations.len(),
                plan.settled.len()
            );
            if plan.is_empty() {
                return Ok(summary.style(styles.bold).to_string());
            }
            let rows: Vec<OperationRow> = plan
                .operations
                .iter()
                .enumerate()
                .map(|(i, op)| OperationRow {
                    step: i + 1,
                    action: op.action.to_string(),
                    kind: op.kind.to_string(),
                    name: op.name.clone(),
                })
                .collect();
            Ok(format!("{}\n{}", render_table(&rows), summary.style(styles.bold)))
        }
    }
}

// ── Reports ─────────────────────────────────────────────────────────

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
}

fn report_summary(report: &ApplyReport, styles: &Styles) -> String {
    let states: &[ObjectState] = match report.direction {
        Direction::Build => &[
            ObjectState::Created,
            ObjectState::Updated,
            ObjectState::Unchanged,
        ],
        Direction::Destroy => &[ObjectState::Deleted, ObjectState::AlreadyAbsent],
    };
    let counts = states
        .iter()
        .map(|s| {
            format!("{} {s}", report.count(*s))
                .style(styles.state(*s))
                .to_string()
        })
        .collect::<Vec<_>>()
        .join(", ");
    let elapsed = (report.finished_at - report.started_at).num_milliseconds();
    format!(
        "{} {}: {counts} ({elapsed} ms)",
        report.direction.style(styles.bold),
        report.vpc.style(styles.bold)
    )
}

pub fn render_report(
    report: &ApplyReport,
    format: OutputFormat,
    styles: &Styles,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json(report),
        OutputFormat::Yaml => render_yaml(report),
        OutputFormat::Plain => Ok(report
            .outcomes
            .iter()
            .map(|o| format!("{} {}", o.state.style(styles.state(o.state)), o.name))
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Table => {
            let rows: Vec<OutcomeRow> = report
                .outcomes
                .iter()
                .map(|o| OutcomeRow {
                    state: o.state.to_string(),
                    kind: o.kind.to_string(),
                    name: o.name.clone(),
                })
                .collect();
            Ok(format!(
                "{}\n{}",
                render_table(&rows),
                report_summary(report, styles)
            ))
        }
    }
}
