// ── Deterministic naming & addressing ──
//
// Every object name, MAC and reserved address is a pure function of the VPC
// name/ids and the switch/port ids. `ObjectName::parse` is the exact inverse
// of the naming functions and doubles as the ownership test: a backend object
// belongs to a VPC iff its name parses under that VPC.

use std::fmt;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

use crate::model::{MacAddress, MacPrefix, ObjectKind};

// ── Names ────────────────────────────────────────────────────────────

pub fn router_name(vpc: &str) -> String {
    format!("{vpc}-lr")
}

pub fn switch_name(vpc: &str, switch_id: u8) -> String {
    format!("{vpc}-ls{switch_id}")
}

pub fn port_name(vpc: &str, switch_id: u8, port_id: u8) -> String {
    format!("{vpc}-ls{switch_id}-lsp{port_id}")
}

pub fn dhcp_options_name(vpc: &str, switch_id: u8) -> String {
    format!("{vpc}-ls{switch_id}-dhcp")
}

/// Router-side port of a router attachment.
pub fn router_port_name(vpc: &str, switch_id: u8) -> String {
    format!("{vpc}-lr-ls{switch_id}")
}

/// Switch-side peer port of a router attachment.
pub fn router_peer_port_name(vpc: &str, switch_id: u8) -> String {
    format!("{vpc}-ls{switch_id}-lr")
}

/// Label of an auto-generated port.
pub fn auto_port_label(port_id: u8) -> String {
    format!("lsp{port_id}")
}

/// Common prefix of every object a VPC owns.
pub fn owned_prefix(vpc: &str) -> String {
    format!("{vpc}-")
}

pub fn derive_mac(prefix: MacPrefix, vpc_id: u8, switch_id: u8, port_id: u8) -> MacAddress {
    MacAddress::derive(prefix, vpc_id, switch_id, port_id)
}

/// Check a VPC name against the naming grammar.
///
/// Names are non-empty `[A-Za-z0-9_.-]`, and no `-`-separated segment may
/// look like a generated suffix. Otherwise one VPC's objects could parse as
/// another's (VPC `a-lr` would own `a-lr-ls1`, which is VPC `a`'s router port).
pub fn check_vpc_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".into());
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(format!("character '{c}' is not allowed (use A-Z a-z 0-9 _ . -)"));
    }
    if let Some(segment) = name.split('-').find(|s| is_reserved_segment(s)) {
        return Err(format!(
            "segment '{segment}' is reserved for generated object names"
        ));
    }
    Ok(())
}

fn is_reserved_segment(segment: &str) -> bool {
    let numbered = |tag: &str| {
        segment
            .strip_prefix(tag)
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    };
    segment == "lr" || segment == "dhcp" || numbered("lsp") || numbered("ls")
}

// ── Ownership grammar ────────────────────────────────────────────────

/// A parsed generated name, relative to its VPC.
///
/// Variant order is the build dependency order; `Ord` therefore sorts a
/// mixed list router-first and by ids within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectName {
    Router,
    Switch(u8),
    DhcpOptions(u8),
    Port { switch: u8, port: u8 },
    RouterAttachment(u8),
}

impl ObjectName {
    pub fn kind(self) -> ObjectKind {
        match self {
            Self::Router => ObjectKind::VpcRouter,
            Self::Switch(_) => ObjectKind::LogicalSwitch,
            Self::DhcpOptions(_) => ObjectKind::DhcpOptions,
            Self::Port { .. } => ObjectKind::LogicalSwitchPort,
            Self::RouterAttachment(_) => ObjectKind::RouterAttachment,
        }
    }

    pub fn switch_id(self) -> Option<u8> {
        match self {
            Self::Router => None,
            Self::Switch(id)
            | Self::DhcpOptions(id)
            | Self::RouterAttachment(id)
            | Self::Port { switch: id, .. } => Some(id),
        }
    }

    pub fn render(self, vpc: &str) -> String {
        match self {
            Self::Router => router_name(vpc),
            Self::Switch(sw) => switch_name(vpc, sw),
            Self::DhcpOptions(sw) => dhcp_options_name(vpc, sw),
            Self::Port { switch, port } => port_name(vpc, switch, port),
            Self::RouterAttachment(sw) => router_port_name(vpc, sw),
        }
    }

    /// Inverse of the naming functions. Ids must be canonical decimal in
    /// `1..=255`, so `vlab-ls01` and `vlab-ls0` are not owned by `vlab`.
    pub fn parse(vpc: &str, name: &str) -> Option<Self> {
        let suffix = name.strip_prefix(vpc)?.strip_prefix('-')?;
        let segments: Vec<&str> = suffix.split('-').collect();

        match segments.as_slice() {
            ["lr"] => Some(Self::Router),
            ["lr", ls] => numbered(ls, "ls").map(Self::RouterAttachment),
            [ls] => numbered(ls, "ls").map(Self::Switch),
            [ls, "dhcp"] => numbered(ls, "ls").map(Self::DhcpOptions),
            [ls, lsp] => Some(Self::Port {
                switch: numbered(ls, "ls")?,
                port: numbered(lsp, "lsp")?,
            }),
            _ => None,
        }
    }
}

fn numbered(segment: &str, tag: &str) -> Option<u8> {
    let digits = segment.strip_prefix(tag)?;
    if digits.is_empty() || digits.starts_with('0') || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u8>().ok()
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Router => write!(f, "lr"),
            Self::Switch(sw) => write!(f, "ls{sw}"),
            Self::DhcpOptions(sw) => write!(f, "ls{sw}-dhcp"),
            Self::Port { switch, port } => write!(f, "ls{switch}-lsp{port}"),
            Self::RouterAttachment(sw) => write!(f, "lr-ls{sw}"),
        }
    }
}

// ── Addressing ───────────────────────────────────────────────────────

/// Number of host addresses in `subnet`: both addresses of a /31 (RFC 3021),
/// the single address of a /32, otherwise everything but network/broadcast.
pub fn host_count(subnet: Ipv4Network) -> u64 {
    match subnet.prefix() {
        32 => 1,
        31 => 2,
        p => (1u64 << (32 - u32::from(p))) - 2,
    }
}

/// Host addresses of `subnet` in ascending order.
pub fn host_addresses(subnet: Ipv4Network) -> impl Iterator<Item = Ipv4Addr> {
    let network = u32::from(subnet.network());
    let count = host_count(subnet);
    let first = if subnet.prefix() >= 31 {
        u64::from(network)
    } else {
        u64::from(network) + 1
    };
    (first..first + count).filter_map(|a| u32::try_from(a).ok().map(Ipv4Addr::from))
}

/// First host address: router port IP and DHCP server id.
pub fn gateway_address(subnet: Ipv4Network) -> Ipv4Addr {
    host_addresses(subnet).next().unwrap_or_else(|| subnet.network())
}

/// `<gateway>/<prefix>` as configured on a router port.
pub fn gateway_network(subnet: Ipv4Network) -> String {
    format!("{}/{}", gateway_address(subnet), subnet.prefix())
}

/// Addresses excluded from dynamic allocation on a DHCP switch: the first
/// four hosts, or only the gateway when the subnet has four hosts or fewer.
pub fn dhcp_reserved(subnet: Ipv4Network) -> Vec<Ipv4Addr> {
    let take = if host_count(subnet) > 4 { 4 } else { 1 };
    host_addresses(subnet).take(take).collect()
}

/// Host addresses ports may not use. The gateway is reserved whenever
/// something answers on it (router port or DHCP server).
pub fn reserved_addresses(subnet: Ipv4Network, routed: bool, dhcp: bool) -> Vec<Ipv4Addr> {
    if dhcp {
        dhcp_reserved(subnet)
    } else if routed {
        vec![gateway_address(subnet)]
    } else {
        Vec::new()
    }
}

/// Count of host addresses left for ports.
pub fn usable_host_count(subnet: Ipv4Network, routed: bool, dhcp: bool) -> u64 {
    let reserved = reserved_addresses(subnet, routed, dhcp).len();
    host_count(subnet).saturating_sub(u64::try_from(reserved).unwrap_or(u64::MAX))
}

/// Host addresses left for ports, ascending.
pub fn usable_hosts(subnet: Ipv4Network, routed: bool, dhcp: bool) -> Vec<Ipv4Addr> {
    let reserved = reserved_addresses(subnet, routed, dhcp);
    host_addresses(subnet)
        .filter(|a| !reserved.contains(a))
        .collect()
}
