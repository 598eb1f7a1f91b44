// ── Backend object vocabulary ──
//
// The reconciler and every backend speak in terms of five object kinds, each
// identified by its generated name and described by a flat string map of
// attributes. Attribute keys are backend-neutral; adapters translate them.

use std::collections::BTreeMap;

use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

use crate::naming::ObjectName;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ObjectKind {
    VpcRouter,
    LogicalSwitch,
    LogicalSwitchPort,
    DhcpOptions,
    RouterAttachment,
}

impl ObjectKind {
    /// Every attribute key this kind can carry. A key in this list that a
    /// backend reports but the topology no longer sets is drift.
    pub fn managed_keys(self) -> &'static [&'static str] {
        match self {
            Self::VpcRouter => &[attr::VPC_ID],
            Self::LogicalSwitch => &[
                attr::SUBNET,
                attr::SWITCH_TYPE,
                attr::DHCP_ENABLE,
                attr::EXCLUDE_IPS,
            ],
            Self::LogicalSwitchPort => &[
                attr::SWITCH,
                attr::LABEL,
                attr::ADDRESSING,
                attr::MAC,
                attr::IP,
                attr::DHCP_OPTIONS,
            ],
            Self::DhcpOptions => &[
                attr::SWITCH,
                attr::CIDR,
                attr::SERVER_ID,
                attr::SERVER_MAC,
                attr::ROUTER,
                attr::DNS_SERVER,
                attr::LEASE_TIME,
            ],
            Self::RouterAttachment => &[
                attr::ROUTER,
                attr::SWITCH,
                attr::MAC,
                attr::NETWORK,
                attr::SWITCH_PORT,
            ],
        }
    }
}

/// Attribute map; ordered so comparisons and rendering are stable.
pub type Attributes = BTreeMap<String, String>;

/// An object as reported by a backend listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectRecord {
    pub name: String,
    pub attributes: Attributes,
}

impl ObjectRecord {
    pub fn new(name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }
}

/// An object the topology wants to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredObject {
    #[serde(skip)]
    pub id: ObjectName,
    pub kind: ObjectKind,
    pub name: String,
    pub attributes: Attributes,
}

// ── Attribute keys ───────────────────────────────────────────────────

/// Keys used in [`Attributes`], grouped by the kind that carries them.
pub mod attr {
    // vpc-router
    pub const VPC_ID: &str = "vpc_id";

    // logical-switch
    pub const SUBNET: &str = "subnet";
    pub const SWITCH_TYPE: &str = "switch_type";
    pub const DHCP_ENABLE: &str = "dhcp_enable";
    pub const EXCLUDE_IPS: &str = "exclude_ips";

    // logical-switch-port
    pub const SWITCH: &str = "switch";
    pub const LABEL: &str = "label";
    pub const ADDRESSING: &str = "addressing";
    pub const MAC: &str = "mac";
    pub const IP: &str = "ip";
    pub const DHCP_OPTIONS: &str = "dhcp_options";

    // dhcp-options (also SWITCH)
    pub const CIDR: &str = "cidr";
    pub const SERVER_ID: &str = "server_id";
    pub const SERVER_MAC: &str = "server_mac";
    pub const ROUTER: &str = "router";
    pub const DNS_SERVER: &str = "dns_server";
    pub const LEASE_TIME: &str = "lease_time";

    // router-attachment (also ROUTER, SWITCH, MAC)
    pub const NETWORK: &str = "network";
    pub const SWITCH_PORT: &str = "switch_port";
}
