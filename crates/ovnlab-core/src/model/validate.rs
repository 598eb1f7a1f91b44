// ── Validation ──
//
// Turns a raw `LabConfig` into the normalized `Lab` model. Every check runs
// to completion and all violations are reported together, each tagged with
// the JSON field path it refers to.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::Serialize;
use thiserror::Error;

use super::lab::{AddressingMode, LabConfig, PortConfig, SwitchConfig, SwitchType, VpcConfig};
use super::mac::MacPrefix;
use super::policy::PolicyContext;
use crate::naming;

// ── Violations ───────────────────────────────────────────────────────

/// One problem in the lab configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// JSON field path (`switches[1].ports[0].ip`) or parse location.
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every violation found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid lab configuration: {} problem(s) found", .violations.len())]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn single(violation: Violation) -> Self {
        Self {
            violations: vec![violation],
        }
    }

    /// Whether any violation sits at `path` exactly.
    pub fn has_path(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

/// Collector used while validating.
#[derive(Debug, Default)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(Violation::new(path, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_vec(self) -> Vec<Violation> {
        self.0
    }
}

// ── Normalized model ─────────────────────────────────────────────────

/// A validated lab: ids narrowed, subnets parsed, defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lab {
    pub vpc: Vpc,
    pub switches: Vec<Switch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vpc {
    pub name: String,
    pub id: u8,
    pub mac_prefix: MacPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Switch {
    pub label: String,
    pub id: u8,
    pub kind: SwitchType,
    pub subnet: Ipv4Network,
    pub dhcp: bool,
    pub routed: bool,
    pub ports: PortSource,
}

/// Where a switch's ports come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortSource {
    /// `count` ports with ids `1..=count`, expanded by the topology builder.
    Auto { count: u8 },
    Explicit(Vec<Port>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Port {
    pub id: u8,
    pub label: String,
    pub addressing: Addressing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "ip", rename_all = "lowercase")]
pub enum Addressing {
    Dynamic,
    Static(Ipv4Addr),
    Unknown,
}

impl Addressing {
    pub fn mode(self) -> AddressingMode {
        match self {
            Self::Dynamic => AddressingMode::Dynamic,
            Self::Static(_) => AddressingMode::Static,
            Self::Unknown => AddressingMode::Unknown,
        }
    }

    pub fn ip(self) -> Option<Ipv4Addr> {
        match self {
            Self::Static(ip) => Some(ip),
            Self::Dynamic | Self::Unknown => None,
        }
    }
}

// ── Entry point ──────────────────────────────────────────────────────

/// Validate `config`, returning the normalized model or every violation.
pub fn validate(config: &LabConfig) -> Result<Lab, ValidationError> {
    let mut out = Violations::default();

    let vpc = check_vpc(&config.vpc, &mut out);

    let mut names: HashMap<&str, usize> = HashMap::new();
    let mut ids: HashMap<i64, usize> = HashMap::new();
    let mut switches = Vec::with_capacity(config.switches.len());

    for (i, sw) in config.switches.iter().enumerate() {
        let path = format!("switches[{i}]");

        if !sw.name.is_empty() {
            if let Some(first) = first_seen(&mut names, sw.name.as_str(), i) {
                out.push(
                    format!("{path}.name"),
                    format!("duplicate switch name '{}' (also switches[{first}])", sw.name),
                );
            }
        }
        if let Some(first) = first_seen(&mut ids, sw.id, i) {
            out.push(
                format!("{path}.id"),
                format!("duplicate switch id {} (also switches[{first}])", sw.id),
            );
        }

        if let Some(switch) = check_switch(&path, sw, config.vpc.port_count, &mut out) {
            switches.push(switch);
        }
    }

    check_routed_overlap(config, &mut out);

    match vpc {
        Some(vpc) if out.is_empty() => Ok(Lab { vpc, switches }),
        _ => Err(ValidationError {
            violations: out.into_vec(),
        }),
    }
}

/// Record `key` at `index`; return the earlier index if it was already seen.
fn first_seen<K: std::hash::Hash + Eq>(
    seen: &mut HashMap<K, usize>,
    key: K,
    index: usize,
) -> Option<usize> {
    match seen.entry(key) {
        Entry::Occupied(e) => Some(*e.get()),
        Entry::Vacant(e) => {
            e.insert(index);
            None
        }
    }
}

// ── VPC ──────────────────────────────────────────────────────────────

fn check_vpc(vpc: &VpcConfig, out: &mut Violations) -> Option<Vpc> {
    if let Err(reason) = naming::check_vpc_name(&vpc.name) {
        out.push("vpc.name", reason);
    }

    let id = narrow_id("vpc.id", vpc.id, 0, out);

    let mac_prefix = match vpc.mac_prefix.parse::<MacPrefix>() {
        Ok(prefix) => Some(prefix),
        Err(reason) => {
            out.push("vpc.mac_prefix", reason);
            None
        }
    };

    if let Some(count) = vpc.port_count {
        narrow_count("vpc.port_count", count, out);
    }

    Some(Vpc {
        name: vpc.name.clone(),
        id: id?,
        mac_prefix: mac_prefix?,
    })
}

// ── Switch ───────────────────────────────────────────────────────────

fn check_switch(
    path: &str,
    sw: &SwitchConfig,
    vpc_port_count: Option<i64>,
    out: &mut Violations,
) -> Option<Switch> {
    if sw.name.is_empty() {
        out.push(format!("{path}.name"), "must not be empty");
    }

    let id = narrow_id(&format!("{path}.id"), sw.id, 1, out);

    let subnet = match parse_subnet(&sw.subnet) {
        Ok(subnet) => Some(subnet),
        Err(reason) => {
            out.push(format!("{path}.subnet"), reason);
            None
        }
    };

    // Resolve the port source and its size (size survives even when some
    // ports are invalid, so capacity and policy checks still run).
    let (source, total, total_path) = match (sw.port_count, &sw.ports) {
        (Some(_), Some(list)) => {
            out.push(
                path.to_owned(),
                "`port_count` and `ports` are mutually exclusive",
            );
            (None, Some(list.len()), format!("{path}.ports"))
        }
        (Some(count), None) => {
            let count = narrow_count(&format!("{path}.port_count"), count, out);
            (
                count.map(|count| PortSource::Auto { count }),
                count.map(usize::from),
                format!("{path}.port_count"),
            )
        }
        (None, Some(list)) => {
            let ports = if list.is_empty() {
                out.push(format!("{path}.ports"), "must list at least one port");
                None
            } else {
                Some(PortSource::Explicit(check_ports(path, list, subnet, sw, out)))
            };
            (ports, Some(list.len()), format!("{path}.ports"))
        }
        (None, None) => match vpc_port_count {
            Some(count) => {
                let count = u8::try_from(count).ok().filter(|c| *c > 0);
                (
                    count.map(|count| PortSource::Auto { count }),
                    count.map(usize::from),
                    "vpc.port_count".to_owned(),
                )
            }
            None => {
                out.push(
                    path.to_owned(),
                    "one of `port_count` or `ports` is required (vpc.port_count is not set)",
                );
                (None, None, String::new())
            }
        },
    };

    if let (Some(subnet), Some(total)) = (subnet, total) {
        let usable = naming::usable_host_count(subnet, sw.routed, sw.dhcp_enable);
        if u64::try_from(total).unwrap_or(u64::MAX) > usable {
            out.push(
                total_path,
                format!("{total} ports do not fit in {subnet} ({usable} usable addresses)"),
            );
        }
    }

    sw.switch_type.policy().check(
        &PolicyContext {
            path,
            switch: sw,
            subnet,
            port_total: total,
        },
        out,
    );

    Some(Switch {
        label: sw.name.clone(),
        id: id?,
        kind: sw.switch_type,
        subnet: subnet?,
        dhcp: sw.dhcp_enable,
        routed: sw.routed,
        ports: source?,
    })
}

/// Strict CIDR parse: explicit prefix, no host bits.
fn parse_subnet(raw: &str) -> Result<Ipv4Network, String> {
    if !raw.contains('/') {
        return Err(format!("'{raw}' is not a CIDR (missing /prefix)"));
    }
    let net: Ipv4Network = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a valid IPv4 CIDR"))?;
    if net.ip() != net.network() {
        return Err(format!(
            "'{raw}' has host bits set (did you mean {}/{}?)",
            net.network(),
            net.prefix()
        ));
    }
    Ok(net)
}

fn check_routed_overlap(config: &LabConfig, out: &mut Violations) {
    let routed: Vec<(usize, Ipv4Network)> = config
        .switches
        .iter()
        .enumerate()
        .filter(|(_, sw)| sw.routed)
        .filter_map(|(i, sw)| parse_subnet(&sw.subnet).ok().map(|net| (i, net)))
        .collect();

    for (n, (i, a)) in routed.iter().enumerate() {
        for (j, b) in routed.iter().skip(n + 1) {
            if a.contains(b.network()) || b.contains(a.network()) {
                out.push(
                    format!("switches[{j}].subnet"),
                    format!("{b} overlaps {a} of routed switches[{i}]"),
                );
            }
        }
    }
}

// ── Ports ────────────────────────────────────────────────────────────

fn check_ports(
    path: &str,
    list: &[PortConfig],
    subnet: Option<Ipv4Network>,
    sw: &SwitchConfig,
    out: &mut Violations,
) -> Vec<Port> {
    let reserved = subnet
        .map(|net| naming::reserved_addresses(net, sw.routed, sw.dhcp_enable))
        .unwrap_or_default();

    let mut names: HashMap<&str, usize> = HashMap::new();
    let mut ids: HashMap<i64, usize> = HashMap::new();
    let mut ips: HashMap<Ipv4Addr, usize> = HashMap::new();
    let mut ports = Vec::with_capacity(list.len());

    for (j, port) in list.iter().enumerate() {
        let ppath = format!("{path}.ports[{j}]");

        if port.name.is_empty() {
            out.push(format!("{ppath}.name"), "must not be empty");
        } else if let Some(first) = first_seen(&mut names, port.name.as_str(), j) {
            out.push(
                format!("{ppath}.name"),
                format!("duplicate port name '{}' (also ports[{first}])", port.name),
            );
        }

        let raw_id = port
            .id
            .unwrap_or_else(|| i64::try_from(j + 1).unwrap_or(i64::MAX));
        let id = narrow_id(&format!("{ppath}.id"), raw_id, 1, out);
        if let Some(first) = first_seen(&mut ids, raw_id, j) {
            out.push(
                format!("{ppath}.id"),
                format!("duplicate port id {raw_id} (also ports[{first}])"),
            );
        }

        let addressing = match (port.addressing, port.ip.as_deref()) {
            (AddressingMode::Static, None) => {
                out.push(
                    format!("{ppath}.ip"),
                    "required when addressing is static",
                );
                None
            }
            (AddressingMode::Static, Some(raw)) => {
                check_static_ip(&ppath, j, raw, subnet, &reserved, &mut ips, out)
                    .map(Addressing::Static)
            }
            (mode, Some(_)) => {
                out.push(
                    format!("{ppath}.ip"),
                    format!("only allowed with static addressing, not {mode}"),
                );
                None
            }
            (AddressingMode::Dynamic, None) => Some(Addressing::Dynamic),
            (AddressingMode::Unknown, None) => Some(Addressing::Unknown),
        };

        if let (Some(id), Some(addressing)) = (id, addressing) {
            ports.push(Port {
                id,
                label: port.name.clone(),
                addressing,
            });
        }
    }

    ports
}

fn check_static_ip(
    ppath: &str,
    index: usize,
    raw: &str,
    subnet: Option<Ipv4Network>,
    reserved: &[Ipv4Addr],
    seen: &mut HashMap<Ipv4Addr, usize>,
    out: &mut Violations,
) -> Option<Ipv4Addr> {
    let path = format!("{ppath}.ip");
    let Ok(ip) = raw.parse::<Ipv4Addr>() else {
        out.push(path, format!("'{raw}' is not an IPv4 address"));
        return None;
    };

    let before = out.len();
    if let Some(net) = subnet {
        if !net.contains(ip) {
            out.push(path.clone(), format!("{ip} is outside subnet {net}"));
        } else if net.prefix() < 31 && ip == net.network() {
            out.push(path.clone(), format!("{ip} is the network address of {net}"));
        } else if net.prefix() < 31 && ip == net.broadcast() {
            out.push(path.clone(), format!("{ip} is the broadcast address of {net}"));
        } else if reserved.contains(&ip) {
            out.push(
                path.clone(),
                format!("{ip} is reserved for the gateway/DHCP block"),
            );
        }
    }
    if let Some(first) = first_seen(seen, ip, index) {
        out.push(path, format!("{ip} is already assigned to ports[{first}]"));
    }

    (out.len() == before).then_some(ip)
}

// ── Numeric narrowing ────────────────────────────────────────────────

fn narrow_id(path: &str, raw: i64, min: u8, out: &mut Violations) -> Option<u8> {
    match u8::try_from(raw) {
        Ok(id) if id >= min => Some(id),
        _ => {
            out.push(path, format!("{raw} is out of range ({min}..=255)"));
            None
        }
    }
}

fn narrow_count(path: &str, raw: i64, out: &mut Violations) -> Option<u8> {
    match u8::try_from(raw) {
        Ok(0) => {
            out.push(path, "must be at least 1");
            None
        }
        Ok(count) => Some(count),
        Err(_) => {
            out.push(path, format!("{raw} is out of range (1..=255)"));
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::lab::LabConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn lab(value: serde_json::Value) -> LabConfig {
        serde_json::from_value(value).unwrap()
    }

    fn paths(err: &ValidationError) -> Vec<&str> {
        err.violations.iter().map(|v| v.path.as_str()).collect()
    }

    fn base(switches: serde_json::Value) -> LabConfig {
        lab(json!({
            "vpc": {"name": "vlab", "mac_prefix": "e1:cc:ff", "id": 1},
            "switches": switches,
        }))
    }

    #[test]
    fn example_validates() {
        let cfg = base(json!([{
            "name": "ls1", "id": 1, "type": "normal", "subnet": "10.0.1.0/24",
            "ports": [
                {"name": "lsp1", "addressing": "dynamic"},
                {"name": "lsp2", "addressing": "dynamic"}
            ]
        }]));
        let lab = validate(&cfg).unwrap();
        assert_eq!(lab.vpc.id, 1);
        assert_eq!(lab.vpc.mac_prefix.to_string(), "e1:cc:ff");
        let PortSource::Explicit(ports) = &lab.switches[0].ports else {
            panic!("expected explicit ports");
        };
        assert_eq!(ports.iter().map(|p| p.id).collect::<Vec<_>>(), [1, 2]);
        assert_eq!(ports[0].addressing, Addressing::Dynamic);
    }

    #[test]
    fn mac_prefix_is_lowercased() {
        let mut cfg = base(json!([]));
        cfg.vpc.mac_prefix = "E1:CC:FF".into();
        assert_eq!(validate(&cfg).unwrap().vpc.mac_prefix.to_string(), "e1:cc:ff");
    }

    #[test]
    fn port_count_and_ports_are_mutually_exclusive() {
        let cfg = base(json!([{
            "name": "ls1", "id": 1, "type": "normal", "subnet": "10.0.1.0/24",
            "port_count": 2,
            "ports": [{"name": "a", "addressing": "dynamic"}]
        }]));
        let err = validate(&cfg).unwrap_err();
        assert_eq!(paths(&err), ["switches[0]"]);
        assert!(err.violations[0].message.contains("mutually exclusive"));
    }

    #[test]
    fn vpc_port_count_is_the_fallback() {
        let mut cfg = base(json!([
            {"name": "ls1", "id": 1, "type": "normal", "subnet": "10.0.1.0/24"}
        ]));
        let err = validate(&cfg).unwrap_err();
        assert_eq!(paths(&err), ["switches[0]"]);

        cfg.vpc.port_count = Some(3);
        let lab = validate(&cfg).unwrap();
        assert_eq!(lab.switches[0].ports, PortSource::Auto { count: 3 });
    }

    #[test]
    fn static_port_rules() {
        let cfg = base(json!([{
            "name": "ls1", "id": 1, "type": "normal", "subnet": "10.0.1.0/24",
            "dhcp_enable": true,
            "ports": [
                {"name": "a", "addressing": "static"},
                {"name": "b", "addressing": "static", "ip": "10.0.2.5"},
                {"name": "c", "addressing": "static", "ip": "10.0.1.3"},
                {"name": "d", "addressing": "static", "ip": "10.0.1.255"},
                {"name": "e", "addressing": "static", "ip": "10.0.1.50"},
                {"name": "f", "addressing": "static", "ip": "10.0.1.50"},
                {"name": "g", "addressing": "dynamic", "ip": "10.0.1.51"},
                {"name": "h", "addressing": "static", "ip": "not-an-ip"}
            ]
        }]));
        let err = validate(&cfg).unwrap_err();
        assert_eq!(
            paths(&err),
            [
                "switches[0].ports[0].ip",
                "switches[0].ports[1].ip",
                "switches[0].ports[2].ip",
                "switches[0].ports[3].ip",
                "switches[0].ports[5].ip",
                "switches[0].ports[6].ip",
                "switches[0].ports[7].ip",
            ]
        );
        assert!(err.violations[1].message.contains("outside subnet"));
        assert!(err.violations[2].message.contains("reserved"));
        assert!(err.violations[3].message.contains("broadcast"));
        assert!(err.violations[4].message.contains("already assigned to ports[4]"));
    }

    #[test]
    fn static_ip_in_subnet_is_accepted() {
        let cfg = base(json!([{
            "name": "ls1", "id": 1, "type": "normal", "subnet": "10.0.1.0/24",
            "ports": [{"name": "a", "id": 9, "addressing": "static", "ip": "10.0.1.9"}]
        }]));
        let lab = validate(&cfg).unwrap();
        let PortSource::Explicit(ports) = &lab.switches[0].ports else {
            panic!("expected explicit ports");
        };
        assert_eq!(ports[0].id, 9);
        assert_eq!(ports[0].addressing, Addressing::Static(Ipv4Addr::new(10, 0, 1, 9)));
    }

    #[test]
    fn all_violations_are_reported_together() {
        let cfg = lab(json!({
            "vpc": {"name": "bad-lr", "mac_prefix": "zz:00", "id": 300, "port_count": 0},
            "switches": [
                {"name": "a", "id": 0, "type": "normal", "subnet": "10.0.0.1/24", "port_count": 1},
                {"name": "a", "id": 2, "type": "normal", "subnet": "nope", "port_count": 1},
                {"name": "c", "id": 2, "type": "normal", "subnet": "10.0.5.0/24", "port_count": 1}
            ]
        }));
        let err = validate(&cfg).unwrap_err();
        assert_eq!(
            paths(&err),
            [
                "vpc.name",
                "vpc.id",
                "vpc.mac_prefix",
                "vpc.port_count",
                "switches[0].id",
                "switches[0].subnet",
                "switches[1].name",
                "switches[1].subnet",
                "switches[2].id",
            ]
        );
    }

    #[test]
    fn duplicate_port_ids_and_names() {
        let cfg = base(json!([{
            "name": "ls1", "id": 1, "type": "normal", "subnet": "10.0.1.0/24",
            "ports": [
                {"name": "a", "addressing": "dynamic"},
                {"name": "a", "id": 1, "addressing": "dynamic"}
            ]
        }]));
        let err = validate(&cfg).unwrap_err();
        assert_eq!(
            paths(&err),
            ["switches[0].ports[1].name", "switches[0].ports[1].id"]
        );
    }

    #[test]
    fn capacity_is_checked() {
        let cfg = base(json!([{
            "name": "ls1", "id": 1, "type": "normal", "subnet": "10.0.1.0/29",
            "dhcp_enable": true, "port_count": 3
        }]));
        let err = validate(&cfg).unwrap_err();
        assert_eq!(paths(&err), ["switches[0].port_count"]);
        assert!(err.violations[0].message.contains("2 usable"));
    }

    #[test]
    fn zero_and_empty_counts_are_rejected() {
        let cfg = base(json!([
            {"name": "a", "id": 1, "type": "normal", "subnet": "10.0.1.0/24", "port_count": 0},
            {"name": "b", "id": 2, "type": "normal", "subnet": "10.0.2.0/24", "ports": []}
        ]));
        let err = validate(&cfg).unwrap_err();
        assert_eq!(paths(&err), ["switches[0].port_count", "switches[1].ports"]);
    }

    #[test]
    fn routed_subnets_must_not_overlap() {
        let cfg = base(json!([
            {"name": "a", "id": 1, "type": "normal", "subnet": "10.0.0.0/16", "routed": true, "port_count": 1},
            {"name": "b", "id": 2, "type": "normal", "subnet": "10.0.4.0/24", "routed": true, "port_count": 1},
            {"name": "c", "id": 3, "type": "normal", "subnet": "10.0.4.0/24", "port_count": 1}
        ]));
        let err = validate(&cfg).unwrap_err();
        assert_eq!(paths(&err), ["switches[1].subnet"]);
        assert!(err.violations[0].message.contains("switches[0]"));
    }

    #[test]
    fn p2p_switch_with_two_unknown_ports() {
        let cfg = base(json!([{
            "name": "link", "id": 4, "type": "p2p", "subnet": "172.16.0.0/31", "port_count": 2
        }]));
        let lab = validate(&cfg).unwrap();
        assert_eq!(lab.switches[0].kind, SwitchType::P2p);
        assert_eq!(lab.switches[0].ports, PortSource::Auto { count: 2 });
    }

    #[test]
    fn error_display_counts_problems() {
        let err = ValidationError {
            violations: vec![Violation::new("a", "x"), Violation::new("b", "y")],
        };
        assert_eq!(err.to_string(), "invalid lab configuration: 2 problem(s) found");
        assert_eq!(err.violations[0].to_string(), "a: x");
        assert!(err.has_path("b"));
    }
}
