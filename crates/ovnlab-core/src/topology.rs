// ── Topology builder ──
//
// Expands a validated `Lab` into the full object graph: derived names, MACs,
// DHCP and router attachment parameters, auto-generated ports. Pure and
// deterministic; the graph is rebuilt on every run.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::Serialize;

use crate::error::CoreError;
use crate::model::{
    Addressing, Attributes, DesiredObject, Lab, MacAddress, MacPrefix, ObjectKind, PortSource,
    SwitchType, attr,
};
use crate::naming::{self, ObjectName};

/// Resolver handed out by DHCP options.
pub const DEFAULT_DNS_SERVER: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

/// DHCP lease time in seconds.
pub const DEFAULT_LEASE_TIME: u32 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    pub vpc: String,
    pub vpc_id: u8,
    pub mac_prefix: MacPrefix,
    /// Present iff at least one switch is routed.
    pub router: Option<RouterNode>,
    /// In configuration order.
    pub switches: Vec<SwitchNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterNode {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchNode {
    pub name: String,
    pub label: String,
    pub id: u8,
    pub kind: SwitchType,
    pub subnet: Ipv4Network,
    pub dhcp: Option<DhcpNode>,
    pub ports: Vec<PortNode>,
    pub attachment: Option<AttachmentNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortNode {
    pub name: String,
    pub label: String,
    pub id: u8,
    pub mac: MacAddress,
    pub addressing: Addressing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpNode {
    pub name: String,
    pub cidr: Ipv4Network,
    pub server_id: Ipv4Addr,
    pub server_mac: MacAddress,
    pub router: Ipv4Addr,
    pub dns_server: Ipv4Addr,
    pub lease_time: u32,
    /// Kept out of dynamic allocation.
    pub exclude_ips: Vec<Ipv4Addr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentNode {
    /// Router-side port name.
    pub name: String,
    /// Switch-side peer port name.
    pub peer_port: String,
    pub router: String,
    pub mac: MacAddress,
    /// `<gateway>/<prefix>`.
    pub network: String,
}

impl Topology {
    /// Expand `lab` into the object graph.
    ///
    /// Fails with [`CoreError::NamingCollision`] if two objects would share a
    /// name or two interfaces a MAC. Validation makes that impossible, so a
    /// collision means a bug in the naming scheme.
    pub fn build(lab: &Lab) -> Result<Self, CoreError> {
        let vpc = lab.vpc.name.as_str();
        let prefix = lab.vpc.mac_prefix;
        let vpc_id = lab.vpc.id;

        let mut guard = CollisionGuard::default();

        let router = lab.switches.iter().any(|s| s.routed).then(|| RouterNode {
            name: naming::router_name(vpc),
        });
        if let Some(router) = &router {
            guard.name(&router.name)?;
        }

        let mut switches = Vec::with_capacity(lab.switches.len());
        for sw in &lab.switches {
            let name = naming::switch_name(vpc, sw.id);
            guard.name(&name)?;

            // Port id 0 of every switch: router port and DHCP server.
            let infra_mac = naming::derive_mac(prefix, vpc_id, sw.id, 0);
            if sw.dhcp || sw.routed {
                guard.mac(infra_mac)?;
            }

            let gateway = naming::gateway_address(sw.subnet);

            let dhcp = if sw.dhcp {
                let dhcp = DhcpNode {
                    name: naming::dhcp_options_name(vpc, sw.id),
                    cidr: sw.subnet,
                    server_id: gateway,
                    server_mac: infra_mac,
                    router: gateway,
                    dns_server: DEFAULT_DNS_SERVER,
                    lease_time: DEFAULT_LEASE_TIME,
                    exclude_ips: naming::dhcp_reserved(sw.subnet),
                };
                guard.name(&dhcp.name)?;
                Some(dhcp)
            } else {
                None
            };

            let ports = expand_ports(vpc, vpc_id, prefix, sw.id, sw.kind, &sw.ports);
            for port in &ports {
                guard.name(&port.name)?;
                guard.mac(port.mac)?;
            }

            let attachment = match (&router, sw.routed) {
                (Some(router), true) => {
                    let node = AttachmentNode {
                        name: naming::router_port_name(vpc, sw.id),
                        peer_port: naming::router_peer_port_name(vpc, sw.id),
                        router: router.name.clone(),
                        mac: infra_mac,
                        network: naming::gateway_network(sw.subnet),
                    };
                    guard.name(&node.name)?;
                    guard.name(&node.peer_port)?;
                    Some(node)
                }
                _ => None,
            };

            switches.push(SwitchNode {
                name,
                label: sw.label.clone(),
                id: sw.id,
                kind: sw.kind,
                subnet: sw.subnet,
                dhcp,
                ports,
                attachment,
            });
        }

        Ok(Self {
            vpc: lab.vpc.name.clone(),
            vpc_id,
            mac_prefix: prefix,
            router,
            switches,
        })
    }

    /// `<vpc>-`: every owned object name starts with this.
    pub fn owned_prefix(&self) -> String {
        naming::owned_prefix(&self.vpc)
    }

    /// Every object in build order: router, then per switch the switch, its
    /// DHCP options, its ports and its router attachment.
    pub fn desired_objects(&self) -> Vec<DesiredObject> {
        let mut objects = Vec::new();

        if let Some(router) = &self.router {
            objects.push(DesiredObject {
                id: ObjectName::Router,
                kind: ObjectKind::VpcRouter,
                name: router.name.clone(),
                attributes: attrs([(attr::VPC_ID, self.vpc_id.to_string())]),
            });
        }

        for sw in &self.switches {
            let mut switch_attrs = attrs([
                (attr::SUBNET, sw.subnet.to_string()),
                (attr::SWITCH_TYPE, sw.kind.to_string()),
                (attr::DHCP_ENABLE, sw.dhcp.is_some().to_string()),
            ]);
            if let Some(dhcp) = &sw.dhcp {
                switch_attrs.insert(attr::EXCLUDE_IPS.into(), join_ips(&dhcp.exclude_ips));
            }
            objects.push(DesiredObject {
                id: ObjectName::Switch(sw.id),
                kind: ObjectKind::LogicalSwitch,
                name: sw.name.clone(),
                attributes: switch_attrs,
            });

            if let Some(dhcp) = &sw.dhcp {
                objects.push(DesiredObject {
                    id: ObjectName::DhcpOptions(sw.id),
                    kind: ObjectKind::DhcpOptions,
                    name: dhcp.name.clone(),
                    attributes: attrs([
                        (attr::SWITCH, sw.name.clone()),
                        (attr::CIDR, dhcp.cidr.to_string()),
                        (attr::SERVER_ID, dhcp.server_id.to_string()),
                        (attr::SERVER_MAC, dhcp.server_mac.to_string()),
                        (attr::ROUTER, dhcp.router.to_string()),
                        (attr::DNS_SERVER, dhcp.dns_server.to_string()),
                        (attr::LEASE_TIME, dhcp.lease_time.to_string()),
                    ]),
                });
            }

            for port in &sw.ports {
                let mut port_attrs = attrs([
                    (attr::SWITCH, sw.name.clone()),
                    (attr::LABEL, port.label.clone()),
                    (attr::ADDRESSING, port.addressing.mode().to_string()),
                    (attr::MAC, port.mac.to_string()),
                ]);
                if let Some(ip) = port.addressing.ip() {
                    port_attrs.insert(attr::IP.into(), ip.to_string());
                }
                if let Some(dhcp) = &sw.dhcp {
                    if port.addressing != Addressing::Unknown {
                        port_attrs.insert(attr::DHCP_OPTIONS.into(), dhcp.name.clone());
                    }
                }
                objects.push(DesiredObject {
                    id: ObjectName::Port {
                        switch: sw.id,
                        port: port.id,
                    },
                    kind: ObjectKind::LogicalSwitchPort,
                    name: port.name.clone(),
                    attributes: port_attrs,
                });
            }

            if let Some(att) = &sw.attachment {
                objects.push(DesiredObject {
                    id: ObjectName::RouterAttachment(sw.id),
                    kind: ObjectKind::RouterAttachment,
                    name: att.name.clone(),
                    attributes: attrs([
                        (attr::ROUTER, att.router.clone()),
                        (attr::SWITCH, sw.name.clone()),
                        (attr::MAC, att.mac.to_string()),
                        (attr::NETWORK, att.network.clone()),
                        (attr::SWITCH_PORT, att.peer_port.clone()),
                    ]),
                });
            }
        }

        objects
    }

    pub fn port_count(&self) -> usize {
        self.switches.iter().map(|s| s.ports.len()).sum()
    }
}

fn expand_ports(
    vpc: &str,
    vpc_id: u8,
    prefix: MacPrefix,
    switch_id: u8,
    kind: SwitchType,
    source: &PortSource,
) -> Vec<PortNode> {
    let node = |id: u8, label: String, addressing: Addressing| PortNode {
        name: naming::port_name(vpc, switch_id, id),
        label,
        id,
        mac: naming::derive_mac(prefix, vpc_id, switch_id, id),
        addressing,
    };

    match source {
        PortSource::Auto { count } => {
            let addressing = kind.policy().auto_addressing();
            (1..=*count)
                .map(|id| node(id, naming::auto_port_label(id), addressing))
                .collect()
        }
        PortSource::Explicit(ports) => ports
            .iter()
            .map(|p| node(p.id, p.label.clone(), p.addressing))
            .collect(),
    }
}

fn attrs<const N: usize>(pairs: [(&str, String); N]) -> Attributes {
    pairs.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()
}

/// Space-separated, as OVN's `exclude_ips` expects.
fn join_ips(ips: &[Ipv4Addr]) -> String {
    ips.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Default)]
struct CollisionGuard {
    names: HashSet<String>,
    macs: HashSet<MacAddress>,
}

impl CollisionGuard {
    fn name(&mut self, name: &str) -> Result<(), CoreError> {
        if self.names.insert(name.to_owned()) {
            Ok(())
        } else {
            Err(CoreError::NamingCollision {
                what: "object name".into(),
                value: name.to_owned(),
            })
        }
    }

    fn mac(&mut self, mac: MacAddress) -> Result<(), CoreError> {
        if self.macs.insert(mac) {
            Ok(())
        } else {
            Err(CoreError::NamingCollision {
                what: "MAC address".into(),
                value: mac.to_string(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{LabConfig, validate};
    use pretty_assertions::assert_eq;

    fn topology(doc: &str) -> Topology {
        let cfg = LabConfig::from_json_str(doc).unwrap();
        Topology::build(&validate(&cfg).unwrap()).unwrap()
    }

    const EXAMPLE: &str = r#"{
        "vpc": {"name": "vlab", "mac_prefix": "e1:cc:ff", "id": 1},
        "switches": [
            {"name": "ls1", "id": 1, "type": "normal", "subnet": "10.0.1.0/24",
             "ports": [
                {"name": "lsp1", "addressing": "dynamic"},
                {"name": "lsp2", "addressing": "dynamic"}
             ]}
        ]
    }"#;

    const ROUTED: &str = r#"{
        "vpc": {"name": "lab", "mac_prefix": "0a:00:00", "id": 7, "port_count": 2},
        "switches": [
            {"name": "web", "id": 1, "type": "normal", "subnet": "10.1.0.0/24",
             "dhcp_enable": true, "routed": true},
            {"name": "mgmt", "id": 2, "type": "mgmt", "subnet": "10.2.0.0/24", "port_count": 1},
            {"name": "link", "id": 3, "type": "p2p", "subnet": "10.3.0.0/31", "routed": true,
             "port_count": 1}
        ]
    }"#;

    #[test]
    fn example_topology() {
        let topo = topology(EXAMPLE);
        assert!(topo.router.is_none());
        let sw = &topo.switches[0];
        assert_eq!(sw.name, "vlab-ls1");
        assert!(sw.dhcp.is_none());
        assert!(sw.attachment.is_none());

        let names: Vec<&str> = sw.ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["vlab-ls1-lsp1", "vlab-ls1-lsp2"]);
        let macs: Vec<String> = sw.ports.iter().map(|p| p.mac.to_string()).collect();
        assert_eq!(macs, ["e1:cc:ff:01:01:01", "e1:cc:ff:01:01:02"]);
        assert!(sw.ports.iter().all(|p| p.addressing == Addressing::Dynamic));
    }

    #[test]
    fn routed_lab_derives_router_dhcp_and_attachments() {
        let topo = topology(ROUTED);
        assert_eq!(topo.router.as_ref().unwrap().name, "lab-lr");

        let web = &topo.switches[0];
        let dhcp = web.dhcp.as_ref().unwrap();
        assert_eq!(dhcp.name, "lab-ls1-dhcp");
        assert_eq!(dhcp.server_id, Ipv4Addr::new(10, 1, 0, 1));
        assert_eq!(dhcp.server_mac.to_string(), "0a:00:00:07:01:00");
        assert_eq!(dhcp.exclude_ips.len(), 4);
        let att = web.attachment.as_ref().unwrap();
        assert_eq!(att.name, "lab-lr-ls1");
        assert_eq!(att.peer_port, "lab-ls1-lr");
        assert_eq!(att.network, "10.1.0.1/24");
        assert_eq!(att.mac, dhcp.server_mac);

        // Auto ports fall back to vpc.port_count and take the policy's mode.
        assert_eq!(web.ports.len(), 2);
        assert_eq!(web.ports[1].label, "lsp2");

        let mgmt = &topo.switches[1];
        assert!(mgmt.attachment.is_none());
        assert_eq!(mgmt.ports.len(), 1);

        let link = &topo.switches[2];
        assert_eq!(link.ports[0].addressing, Addressing::Unknown);
        assert_eq!(link.attachment.as_ref().unwrap().network, "10.3.0.0/31");
    }

    #[test]
    fn desired_objects_follow_build_order() {
        let topo = topology(ROUTED);
        let order: Vec<String> = topo
            .desired_objects()
            .iter()
            .map(|o| format!("{} {}", o.kind, o.name))
            .collect();
        assert_eq!(
            order,
            [
                "vpc-router lab-lr",
                "logical-switch lab-ls1",
                "dhcp-options lab-ls1-dhcp",
                "logical-switch-port lab-ls1-lsp1",
                "logical-switch-port lab-ls1-lsp2",
                "router-attachment lab-lr-ls1",
                "logical-switch lab-ls2",
                "logical-switch-port lab-ls2-lsp1",
                "logical-switch lab-ls3",
                "logical-switch-port lab-ls3-lsp1",
                "router-attachment lab-lr-ls3",
            ]
        );
    }

    #[test]
    fn desired_attributes() {
        let topo = topology(ROUTED);
        let objects = topo.desired_objects();
        let find = |name: &str| objects.iter().find(|o| o.name == name).unwrap();

        let sw = find("lab-ls1");
        assert_eq!(sw.attributes[attr::SUBNET], "10.1.0.0/24");
        assert_eq!(sw.attributes[attr::DHCP_ENABLE], "true");
        assert_eq!(
            sw.attributes[attr::EXCLUDE_IPS],
            "10.1.0.1 10.1.0.2 10.1.0.3 10.1.0.4"
        );

        let port = find("lab-ls1-lsp1");
        assert_eq!(port.attributes[attr::MAC], "0a:00:00:07:01:01");
        assert_eq!(port.attributes[attr::DHCP_OPTIONS], "lab-ls1-dhcp");
        assert!(!port.attributes.contains_key(attr::IP));

        let mgmt_port = find("lab-ls2-lsp1");
        assert!(!mgmt_port.attributes.contains_key(attr::DHCP_OPTIONS));

        let router = find("lab-lr");
        assert_eq!(router.attributes[attr::VPC_ID], "7");
    }

    #[test]
    fn every_name_and_mac_is_distinct() {
        let topo = topology(ROUTED);
        let objects = topo.desired_objects();
        let names: HashSet<&str> = objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names.len(), objects.len());

        let macs: HashSet<MacAddress> = topo
            .switches
            .iter()
            .flat_map(|s| s.ports.iter().map(|p| p.mac))
            .collect();
        assert_eq!(macs.len(), topo.port_count());
    }

    #[test]
    fn build_is_deterministic() {
        assert_eq!(topology(ROUTED), topology(ROUTED));
    }

    #[test]
    fn every_desired_name_is_owned() {
        let topo = topology(ROUTED);
        for obj in topo.desired_objects() {
            let parsed = ObjectName::parse(&topo.vpc, &obj.name).unwrap();
            assert_eq!(parsed, obj.id);
            assert_eq!(parsed.kind(), obj.kind);
        }
    }
}
