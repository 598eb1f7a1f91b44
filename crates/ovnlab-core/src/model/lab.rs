// ── Raw lab configuration ──
//
// Mirrors the JSON document one-to-one. Nothing here is trusted yet: ids are
// wide integers and subnets are strings so that range and format problems
// surface as violations from `validate` instead of opaque serde errors.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::validate::{ValidationError, Violation};

/// Top-level document: one VPC and its switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabConfig {
    pub vpc: VpcConfig,
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VpcConfig {
    /// Naming prefix for every generated object.
    pub name: String,
    /// First three MAC octets, e.g. `e1:cc:ff`.
    pub mac_prefix: String,
    pub id: i64,
    /// Fallback port count for switches that declare neither ports nor a count.
    #[serde(default)]
    pub port_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchConfig {
    pub name: String,
    pub id: i64,
    #[serde(rename = "type")]
    pub switch_type: SwitchType,
    pub subnet: String,
    #[serde(default)]
    pub dhcp_enable: bool,
    #[serde(default)]
    pub routed: bool,
    #[serde(default)]
    pub port_count: Option<i64>,
    #[serde(default)]
    pub ports: Option<Vec<PortConfig>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortConfig {
    pub name: String,
    /// Defaults to the 1-based position in the switch's `ports` list.
    #[serde(default)]
    pub id: Option<i64>,
    pub addressing: AddressingMode,
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SwitchType {
    Normal,
    Mgmt,
    P2p,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AddressingMode {
    Dynamic,
    Static,
    Unknown,
}

impl LabConfig {
    /// Parse a JSON document. Syntax and type errors become a single
    /// violation carrying the line/column reported by the parser.
    pub fn from_json_str(input: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(input).map_err(|e| {
            let location = format!("line {}, column {}", e.line(), e.column());
            ValidationError::single(Violation::new(location, strip_location(&e.to_string())))
        })
    }
}

// serde_json appends " at line X column Y"; the path already says where.
fn strip_location(message: &str) -> String {
    message
        .rfind(" at line ")
        .map_or(message, |idx| &message[..idx])
        .to_owned()
}
