// ── OVN Northbound backend ──
//
// Maps the five object kinds onto Northbound tables:
//
//   vpc-router          Logical_Router
//   logical-switch      Logical_Switch (subnet and exclude_ips in other_config)
//   logical-switch-port Logical_Switch_Port, referenced from its switch
//   dhcp-options        DHCP_Options (no name column; name kept in external_ids)
//   router-attachment   Logical_Router_Port plus a peer port of type "router"
//
// Every row written carries `external_ids:ovn-lab-builder=true`. Reads map
// rows back to the same attribute keys the topology produces, so an
// unchanged lab diffs clean.

use std::collections::{BTreeMap, HashMap, HashSet};

use ovnlab_api::{
    Condition, Datum, Mutation, NORTHBOUND_DB, Operation, OperationResult, OvsdbClient, Row,
    TransportConfig,
};
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::NorthboundConfig;
use crate::model::{AddressingMode, Attributes, ObjectKind, ObjectRecord, attr};

use super::{Backend, BackendError, DeleteOutcome};

const MARKER_KEY: &str = "ovn-lab-builder";
const MARKER_VALUE: &str = "true";

/// `external_ids` keys.
mod ext {
    pub const NAME: &str = "ovnlab:name";
    pub const SWITCH: &str = "ovnlab:switch";
    pub const SWITCH_PORT: &str = "ovnlab:switch-port";
    pub const LABEL: &str = "ovnlab:label";
    pub const VPC_ID: &str = "ovnlab:vpc-id";
    pub const DHCP_ENABLE: &str = "ovnlab:dhcp-enable";
    pub const SWITCH_TYPE: &str = "switch-type";
}

mod table {
    pub const LOGICAL_ROUTER: &str = "Logical_Router";
    pub const LOGICAL_ROUTER_PORT: &str = "Logical_Router_Port";
    pub const LOGICAL_SWITCH: &str = "Logical_Switch";
    pub const LOGICAL_SWITCH_PORT: &str = "Logical_Switch_Port";
    pub const DHCP_OPTIONS: &str = "DHCP_Options";
}

/// Router options every VPC router gets.
const ROUTER_OPTIONS: [(&str, &str); 2] = [
    ("always_learn_from_arp_request", "false"),
    ("dynamic_neigh_routers", "true"),
];

/// DHCP attribute keys carried verbatim in `DHCP_Options.options`.
const DHCP_OPTION_KEYS: [&str; 5] = [
    attr::SERVER_ID,
    attr::SERVER_MAC,
    attr::ROUTER,
    attr::DNS_SERVER,
    attr::LEASE_TIME,
];

pub struct NorthboundBackend {
    client: Mutex<OvsdbClient>,
}

impl std::fmt::Debug for NorthboundBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NorthboundBackend").finish_non_exhaustive()
    }
}

impl NorthboundBackend {
    /// Connect and check the server actually hosts `OVN_Northbound`.
    pub async fn connect(config: &NorthboundConfig) -> Result<Self, BackendError> {
        let transport = TransportConfig::default().with_timeout(config.timeout);
        let mut client = OvsdbClient::connect(&config.endpoint, &transport).await?;

        let dbs = client.list_dbs().await?;
        if !dbs.iter().any(|db| db == NORTHBOUND_DB) {
            return Err(BackendError::Protocol(format!(
                "{} does not serve {NORTHBOUND_DB} (found: {})",
                config.endpoint,
                dbs.join(", ")
            )));
        }

        debug!(endpoint = %config.endpoint, "connected to northbound database");
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: OvsdbClient) -> Self {
        Self {
            client: Mutex::new(client),
        }
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    async fn transact(&self, ops: &[Operation]) -> Result<Vec<OperationResult>, BackendError> {
        trace!(operations = ops.len(), "northbound transact");
        let mut client = self.client.lock().await;
        Ok(client.transact(NORTHBOUND_DB, ops).await?)
    }

    async fn select(
        &self,
        table: &str,
        conditions: Vec<Condition>,
        columns: &[&str],
    ) -> Result<Vec<Row>, BackendError> {
        let results = self
            .transact(&[Operation::select_columns(table, conditions, columns)])
            .await?;
        Ok(results.into_iter().next().map(|r| r.rows).unwrap_or_default())
    }

    async fn uuid_by_name(&self, table: &str, name: &str) -> Result<Option<Uuid>, BackendError> {
        let rows = self
            .select(table, vec![by_name(name)], &["_uuid"])
            .await?;
        Ok(rows.first().and_then(row_uuid))
    }

    async fn dhcp_uuid(&self, name: &str) -> Result<Option<Uuid>, BackendError> {
        let rows = self
            .select(table::DHCP_OPTIONS, vec![dhcp_by_name(name)], &["_uuid"])
            .await?;
        Ok(rows.first().and_then(row_uuid))
    }

    /// Uuid of the parent named by `attributes[key]`, or a `Parent` error.
    async fn parent(
        &self,
        kind: ObjectKind,
        name: &str,
        attributes: &Attributes,
        key: &str,
        parent_table: &str,
    ) -> Result<Uuid, BackendError> {
        let parent = required(attributes, key)?;
        let uuid = if parent_table == table::DHCP_OPTIONS {
            self.dhcp_uuid(parent).await?
        } else {
            self.uuid_by_name(parent_table, parent).await?
        };
        uuid.ok_or_else(|| BackendError::Parent {
            kind,
            name: name.to_owned(),
            parent: parent.to_owned(),
        })
    }

    /// Child uuid -> parent name, over the `ports` column of `parent_table`.
    async fn port_owners(&self, parent_table: &str) -> Result<HashMap<Uuid, String>, BackendError> {
        let rows = self.select(parent_table, vec![], &["name", "ports"]).await?;
        let mut owners = HashMap::new();
        for row in &rows {
            let Some(name) = column_str(row, "name") else {
                continue;
            };
            for port in row.get("ports").map(Datum::uuids).unwrap_or_default() {
                owners.insert(port, name.to_owned());
            }
        }
        Ok(owners)
    }

    async fn dhcp_names(&self) -> Result<HashMap<Uuid, String>, BackendError> {
        let rows = self
            .select(table::DHCP_OPTIONS, vec![], &["_uuid", "external_ids"])
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let name = column_map(row, "external_ids").remove(ext::NAME)?;
                Some((row_uuid(row)?, name))
            })
            .collect())
    }

    async fn optional_dhcp(&self, name: &str, attributes: &Attributes) -> Result<Datum, BackendError> {
        if attributes.contains_key(attr::DHCP_OPTIONS) {
            let uuid = self
                .parent(
                    ObjectKind::LogicalSwitchPort,
                    name,
                    attributes,
                    attr::DHCP_OPTIONS,
                    table::DHCP_OPTIONS,
                )
                .await?;
            Ok(Datum::uuid(uuid))
        } else {
            Ok(Datum::empty_set())
        }
    }

    // ── Listing ──────────────────────────────────────────────────────

    async fn list_routers(&self, prefix: &str) -> Result<Vec<ObjectRecord>, BackendError> {
        let rows = self
            .select(table::LOGICAL_ROUTER, vec![], &["name", "external_ids"])
            .await?;
        Ok(named_rows(&rows, prefix)
            .map(|(name, row)| ObjectRecord::new(name, router_attributes(row)))
            .collect())
    }

    async fn list_switches(&self, prefix: &str) -> Result<Vec<ObjectRecord>, BackendError> {
        let rows = self
            .select(
                table::LOGICAL_SWITCH,
                vec![],
                &["name", "other_config", "external_ids"],
            )
            .await?;
        Ok(named_rows(&rows, prefix)
            .map(|(name, row)| ObjectRecord::new(name, switch_attributes(row)))
            .collect())
    }

    async fn list_ports(&self, prefix: &str) -> Result<Vec<ObjectRecord>, BackendError> {
        let rows = self
            .select(
                table::LOGICAL_SWITCH_PORT,
                vec![],
                &[
                    "_uuid",
                    "name",
                    "type",
                    "addresses",
                    "port_security",
                    "dhcpv4_options",
                    "external_ids",
                ],
            )
            .await?;
        let owners = self.port_owners(table::LOGICAL_SWITCH).await?;
        let dhcp_names = self.dhcp_names().await?;

        Ok(named_rows(&rows, prefix)
            .filter(|(_, row)| column_str(row, "type").unwrap_or_default() != "router")
            .map(|(name, row)| {
                let switch = row_uuid(row).and_then(|u| owners.get(&u)).map(String::as_str);
                let dhcp = row
                    .get("dhcpv4_options")
                    .and_then(|d| d.uuids().first().copied())
                    .and_then(|u| dhcp_names.get(&u))
                    .map(String::as_str);
                ObjectRecord::new(name, port_attributes(row, switch, dhcp))
            })
            .collect())
    }

    async fn list_dhcp(&self, prefix: &str) -> Result<Vec<ObjectRecord>, BackendError> {
        let rows = self
            .select(
                table::DHCP_OPTIONS,
                vec![],
                &["cidr", "options", "external_ids"],
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(dhcp_record)
            .filter(|record| record.name.starts_with(prefix))
            .collect())
    }

    async fn list_attachments(&self, prefix: &str) -> Result<Vec<ObjectRecord>, BackendError> {
        let rows = self
            .select(
                table::LOGICAL_ROUTER_PORT,
                vec![],
                &["_uuid", "name", "mac", "networks", "external_ids"],
            )
            .await?;
        let owners = self.port_owners(table::LOGICAL_ROUTER).await?;
        let peers = self.router_peer_names().await?;

        Ok(named_rows(&rows, prefix)
            .map(|(name, row)| {
                let router = row_uuid(row).and_then(|u| owners.get(&u)).map(String::as_str);
                ObjectRecord::new(name, attachment_attributes(row, router, &peers))
            })
            .collect())
    }

    /// Names of every switch port of type `router`.
    async fn router_peer_names(&self) -> Result<HashSet<String>, BackendError> {
        let rows = self
            .select(
                table::LOGICAL_SWITCH_PORT,
                vec![Condition::eq("type", Datum::string("router"))],
                &["name"],
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| column_str(row, "name"))
            .map(str::to_owned)
            .collect())
    }

    // ── Creation ─────────────────────────────────────────────────────

    async fn create_port(&self, name: &str, attributes: &Attributes) -> Result<(), BackendError> {
        let kind = ObjectKind::LogicalSwitchPort;
        let switch = self
            .parent(kind, name, attributes, attr::SWITCH, table::LOGICAL_SWITCH)
            .await?;
        let dhcp = self.optional_dhcp(name, attributes).await?;

        let mut row = port_row(attributes)?;
        row.insert("name".into(), Datum::string(name));
        row.insert("dhcpv4_options".into(), dhcp);

        let results = self
            .transact(&[
                Operation::insert(table::LOGICAL_SWITCH_PORT, row, Some("new_port")),
                attach(table::LOGICAL_SWITCH, switch, "new_port"),
            ])
            .await?;
        ensure_touched(&results, 1, || BackendError::Parent {
            kind,
            name: name.to_owned(),
            parent: attributes.get(attr::SWITCH).cloned().unwrap_or_default(),
        })
    }

    async fn create_dhcp(&self, name: &str, attributes: &Attributes) -> Result<(), BackendError> {
        self.parent(
            ObjectKind::DhcpOptions,
            name,
            attributes,
            attr::SWITCH,
            table::LOGICAL_SWITCH,
        )
        .await?;
        self.transact(&[Operation::insert(
            table::DHCP_OPTIONS,
            dhcp_row(name, attributes)?,
            None,
        )])
        .await?;
        Ok(())
    }

    async fn create_attachment(
        &self,
        name: &str,
        attributes: &Attributes,
    ) -> Result<(), BackendError> {
        let kind = ObjectKind::RouterAttachment;
        let router = self
            .parent(kind, name, attributes, attr::ROUTER, table::LOGICAL_ROUTER)
            .await?;
        let switch = self
            .parent(kind, name, attributes, attr::SWITCH, table::LOGICAL_SWITCH)
            .await?;
        let peer = required(attributes, attr::SWITCH_PORT)?;

        let results = self
            .transact(&[
                Operation::insert(
                    table::LOGICAL_ROUTER_PORT,
                    attachment_row(name, attributes)?,
                    Some("new_lrp"),
                ),
                attach(table::LOGICAL_ROUTER, router, "new_lrp"),
                Operation::insert(
                    table::LOGICAL_SWITCH_PORT,
                    peer_port_row(peer, name),
                    Some("new_peer"),
                ),
                attach(table::LOGICAL_SWITCH, switch, "new_peer"),
            ])
            .await?;

        ensure_touched(&results, 1, || BackendError::Parent {
            kind,
            name: name.to_owned(),
            parent: attributes.get(attr::ROUTER).cloned().unwrap_or_default(),
        })?;
        ensure_touched(&results, 3, || BackendError::Parent {
            kind,
            name: name.to_owned(),
            parent: attributes.get(attr::SWITCH).cloned().unwrap_or_default(),
        })
    }

    // ── Deletion ─────────────────────────────────────────────────────

    async fn delete_port(&self, name: &str) -> Result<DeleteOutcome, BackendError> {
        let Some(uuid) = self.uuid_by_name(table::LOGICAL_SWITCH_PORT, name).await? else {
            return Ok(DeleteOutcome::NotFound);
        };
        self.transact(&detach(table::LOGICAL_SWITCH, table::LOGICAL_SWITCH_PORT, uuid))
            .await?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn delete_attachment(&self, name: &str) -> Result<DeleteOutcome, BackendError> {
        let rows = self
            .select(
                table::LOGICAL_ROUTER_PORT,
                vec![by_name(name)],
                &["_uuid", "external_ids"],
            )
            .await?;
        let Some(row) = rows.first() else {
            return Ok(DeleteOutcome::NotFound);
        };
        let lrp = row_uuid(row)
            .ok_or_else(|| BackendError::Protocol(format!("router port '{name}' has no _uuid")))?;

        let mut ops = detach(table::LOGICAL_ROUTER, table::LOGICAL_ROUTER_PORT, lrp);
        if let Some(peer) = column_map(row, "external_ids").get(ext::SWITCH_PORT) {
            if let Some(peer) = self.uuid_by_name(table::LOGICAL_SWITCH_PORT, peer).await? {
                ops.extend(detach(table::LOGICAL_SWITCH, table::LOGICAL_SWITCH_PORT, peer));
            }
        }
        self.transact(&ops).await?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn delete_where(
        &self,
        table: &str,
        condition: Condition,
    ) -> Result<DeleteOutcome, BackendError> {
        let results = self
            .transact(&[Operation::delete(table, vec![condition])])
            .await?;
        Ok(match results.first().and_then(|r| r.count) {
            Some(0) | None => DeleteOutcome::NotFound,
            Some(_) => DeleteOutcome::Deleted,
        })
    }
}

impl Backend for NorthboundBackend {
    async fn list_objects(
        &self,
        prefix: &str,
        kind: ObjectKind,
    ) -> Result<Vec<ObjectRecord>, BackendError> {
        match kind {
            ObjectKind::VpcRouter => self.list_routers(prefix).await,
            ObjectKind::LogicalSwitch => self.list_switches(prefix).await,
            ObjectKind::LogicalSwitchPort => self.list_ports(prefix).await,
            ObjectKind::DhcpOptions => self.list_dhcp(prefix).await,
            ObjectKind::RouterAttachment => self.list_attachments(prefix).await,
        }
    }

    async fn create_object(
        &self,
        kind: ObjectKind,
        name: &str,
        attributes: &Attributes,
    ) -> Result<(), BackendError> {
        match kind {
            ObjectKind::VpcRouter => {
                self.transact(&[Operation::insert(
                    table::LOGICAL_ROUTER,
                    router_row(name, attributes)?,
                    None,
                )])
                .await?;
                Ok(())
            }
            ObjectKind::LogicalSwitch => {
                self.transact(&[Operation::insert(
                    table::LOGICAL_SWITCH,
                    switch_row(name, attributes)?,
                    None,
                )])
                .await?;
                Ok(())
            }
            ObjectKind::LogicalSwitchPort => self.create_port(name, attributes).await,
            ObjectKind::DhcpOptions => self.create_dhcp(name, attributes).await,
            ObjectKind::RouterAttachment => self.create_attachment(name, attributes).await,
        }
    }

    async fn update_object(
        &self,
        kind: ObjectKind,
        name: &str,
        attributes: &Attributes,
    ) -> Result<(), BackendError> {
        let ops = match kind {
            ObjectKind::VpcRouter => vec![Operation::update(
                table::LOGICAL_ROUTER,
                vec![by_name(name)],
                router_row(name, attributes)?,
            )],
            ObjectKind::LogicalSwitch => vec![Operation::update(
                table::LOGICAL_SWITCH,
                vec![by_name(name)],
                switch_row(name, attributes)?,
            )],
            ObjectKind::LogicalSwitchPort => {
                let mut row = port_row(attributes)?;
                row.insert(
                    "dhcpv4_options".into(),
                    self.optional_dhcp(name, attributes).await?,
                );
                vec![Operation::update(
                    table::LOGICAL_SWITCH_PORT,
                    vec![by_name(name)],
                    row,
                )]
            }
            ObjectKind::DhcpOptions => vec![Operation::update(
                table::DHCP_OPTIONS,
                vec![dhcp_by_name(name)],
                dhcp_row(name, attributes)?,
            )],
            ObjectKind::RouterAttachment => {
                let peer = required(attributes, attr::SWITCH_PORT)?;
                let state = match self.uuid_by_name(table::LOGICAL_SWITCH_PORT, peer).await? {
                    Some(_) => PeerPort::Present,
                    None => PeerPort::Missing {
                        switch: self
                            .parent(kind, name, attributes, attr::SWITCH, table::LOGICAL_SWITCH)
                            .await?,
                    },
                };
                attachment_update(name, attributes, state)?
            }
        };

        let results = self.transact(&ops).await?;
        ensure_touched(&results, 0, || {
            BackendError::rejected(format!("{kind} '{name}' does not exist"))
        })
    }

    async fn delete_object(
        &self,
        kind: ObjectKind,
        name: &str,
    ) -> Result<DeleteOutcome, BackendError> {
        match kind {
            ObjectKind::VpcRouter => self.delete_where(table::LOGICAL_ROUTER, by_name(name)).await,
            ObjectKind::LogicalSwitch => {
                self.delete_where(table::LOGICAL_SWITCH, by_name(name)).await
            }
            ObjectKind::DhcpOptions => {
                self.delete_where(table::DHCP_OPTIONS, dhcp_by_name(name))
                    .await
            }
            ObjectKind::LogicalSwitchPort => self.delete_port(name).await,
            ObjectKind::RouterAttachment => self.delete_attachment(name).await,
        }
    }
}

// ── Conditions and mutations ─────────────────────────────────────────

fn by_name(name: &str) -> Condition {
    Condition::eq("name", Datum::string(name))
}

fn dhcp_by_name(name: &str) -> Condition {
    Condition::includes("external_ids", Datum::string_map([(ext::NAME, name)]))
}

/// Add the row inserted as `uuid_name` to the `ports` of `parent`.
fn attach(parent_table: &str, parent: Uuid, uuid_name: &str) -> Operation {
    Operation::mutate(
        parent_table,
        vec![Condition::uuid(parent)],
        vec![Mutation::insert("ports", Datum::named_uuid(uuid_name))],
    )
}

/// Unlink `child` from whichever parent holds it, then delete it.
fn detach(parent_table: &str, child_table: &str, child: Uuid) -> Vec<Operation> {
    vec![
        Operation::mutate(
            parent_table,
            vec![Condition::includes("ports", Datum::uuid(child))],
            vec![Mutation::delete("ports", Datum::uuid(child))],
        ),
        Operation::delete(child_table, vec![Condition::uuid(child)]),
    ]
}

/// Fail with `err()` when operation `index` touched no rows.
fn ensure_touched(
    results: &[OperationResult],
    index: usize,
    err: impl FnOnce() -> BackendError,
) -> Result<(), BackendError> {
    match results.get(index).and_then(|r| r.count) {
        Some(0) => Err(err()),
        _ => Ok(()),
    }
}

// ── Row access ───────────────────────────────────────────────────────

fn row_uuid(row: &Row) -> Option<Uuid> {
    row.get("_uuid")?.uuids().first().copied()
}

fn column_str<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column)?.as_str()
}

fn column_strings<'a>(row: &'a Row, column: &str) -> Vec<&'a str> {
    row.get(column).map(Datum::strings).unwrap_or_default()
}

fn column_map(row: &Row, column: &str) -> BTreeMap<String, String> {
    row.get(column)
        .map(Datum::string_entries)
        .unwrap_or_default()
}

/// Rows whose `name` starts with `prefix`.
fn named_rows<'a>(rows: &'a [Row], prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a Row)> {
    rows.iter().filter_map(move |row| {
        column_str(row, "name")
            .filter(|name| name.starts_with(prefix))
            .map(|name| (name, row))
    })
}

fn required<'a>(attributes: &'a Attributes, key: &str) -> Result<&'a str, BackendError> {
    attributes
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| BackendError::Protocol(format!("missing attribute '{key}'")))
}

fn external_ids<'a>(extra: impl IntoIterator<Item = (&'a str, &'a str)>) -> Datum {
    Datum::string_map(std::iter::once((MARKER_KEY, MARKER_VALUE)).chain(extra))
}

// ── Row mapping ──────────────────────────────────────────────────────

fn router_row(name: &str, attributes: &Attributes) -> Result<Row, BackendError> {
    let vpc_id = required(attributes, attr::VPC_ID)?;
    Ok(Row::from([
        ("name".into(), Datum::string(name)),
        ("options".into(), Datum::string_map(ROUTER_OPTIONS)),
        ("external_ids".into(), external_ids([(ext::VPC_ID, vpc_id)])),
    ]))
}

fn router_attributes(row: &Row) -> Attributes {
    let ids = column_map(row, "external_ids");
    let mut attributes = Attributes::new();
    if let Some(vpc_id) = ids.get(ext::VPC_ID) {
        attributes.insert(attr::VPC_ID.into(), vpc_id.clone());
    }
    attributes
}

fn switch_row(name: &str, attributes: &Attributes) -> Result<Row, BackendError> {
    let subnet = required(attributes, attr::SUBNET)?;
    let mut other_config = vec![("subnet", subnet)];
    if let Some(exclude) = attributes.get(attr::EXCLUDE_IPS) {
        other_config.push(("exclude_ips", exclude.as_str()));
    }
    Ok(Row::from([
        ("name".into(), Datum::string(name)),
        ("other_config".into(), Datum::string_map(other_config)),
        (
            "external_ids".into(),
            external_ids([
                (ext::SWITCH_TYPE, required(attributes, attr::SWITCH_TYPE)?),
                (ext::DHCP_ENABLE, required(attributes, attr::DHCP_ENABLE)?),
            ]),
        ),
    ]))
}

fn switch_attributes(row: &Row) -> Attributes {
    let config = column_map(row, "other_config");
    let ids = column_map(row, "external_ids");
    let mut attributes = Attributes::new();
    let mut copy = |from: &BTreeMap<String, String>, key: &str, to: &str| {
        if let Some(value) = from.get(key) {
            attributes.insert(to.to_owned(), value.clone());
        }
    };
    copy(&config, "subnet", attr::SUBNET);
    copy(&config, "exclude_ips", attr::EXCLUDE_IPS);
    copy(&ids, ext::SWITCH_TYPE, attr::SWITCH_TYPE);
    copy(&ids, ext::DHCP_ENABLE, attr::DHCP_ENABLE);
    attributes
}

/// `addresses`, `port_security` and `external_ids` of a workload port.
/// The caller adds `name` and `dhcpv4_options`.
fn port_row(attributes: &Attributes) -> Result<Row, BackendError> {
    let mac = required(attributes, attr::MAC)?;
    let mode: AddressingMode = required(attributes, attr::ADDRESSING)?
        .parse()
        .map_err(|_| BackendError::Protocol("unknown addressing mode".into()))?;

    let (addresses, security) = match mode {
        AddressingMode::Dynamic => (format!("{mac} dynamic"), mac.to_owned()),
        AddressingMode::Static => {
            let bound = format!("{mac} {}", required(attributes, attr::IP)?);
            (bound.clone(), bound)
        }
        AddressingMode::Unknown => ("unknown".to_owned(), mac.to_owned()),
    };

    Ok(Row::from([
        ("addresses".into(), Datum::string_set([addresses])),
        ("port_security".into(), Datum::string_set([security])),
        (
            "external_ids".into(),
            external_ids([(ext::LABEL, required(attributes, attr::LABEL)?)]),
        ),
    ]))
}

fn port_attributes(row: &Row, switch: Option<&str>, dhcp: Option<&str>) -> Attributes {
    let mut attributes = Attributes::new();
    if let Some(switch) = switch {
        attributes.insert(attr::SWITCH.into(), switch.to_owned());
    }
    if let Some(label) = column_map(row, "external_ids").remove(ext::LABEL) {
        attributes.insert(attr::LABEL.into(), label);
    }
    if let Some(mac) = column_strings(row, "port_security")
        .first()
        .and_then(|s| s.split_whitespace().next())
    {
        attributes.insert(attr::MAC.into(), mac.to_owned());
    }

    let addresses = column_strings(row, "addresses");
    let tokens: Vec<&str> = addresses
        .first()
        .map(|a| a.split_whitespace().collect())
        .unwrap_or_default();
    let mode = match tokens.as_slice() {
        ["unknown"] => Some(AddressingMode::Unknown),
        [_, "dynamic"] => Some(AddressingMode::Dynamic),
        [_, ip] => {
            attributes.insert(attr::IP.into(), (*ip).to_owned());
            Some(AddressingMode::Static)
        }
        _ => None,
    };
    if let Some(mode) = mode {
        attributes.insert(attr::ADDRESSING.into(), mode.to_string());
    }

    if let Some(dhcp) = dhcp {
        attributes.insert(attr::DHCP_OPTIONS.into(), dhcp.to_owned());
    }
    attributes
}

fn dhcp_row(name: &str, attributes: &Attributes) -> Result<Row, BackendError> {
    let options = DHCP_OPTION_KEYS
        .iter()
        .map(|key| Ok((*key, required(attributes, key)?)))
        .collect::<Result<Vec<_>, BackendError>>()?;
    Ok(Row::from([
        (
            "cidr".into(),
            Datum::string(required(attributes, attr::CIDR)?),
        ),
        ("options".into(), Datum::string_map(options)),
        (
            "external_ids".into(),
            external_ids([
                (ext::NAME, name),
                (ext::SWITCH, required(attributes, attr::SWITCH)?),
            ]),
        ),
    ]))
}

/// A DHCP_Options row we wrote, or `None` for rows without our name key.
fn dhcp_record(row: &Row) -> Option<ObjectRecord> {
    let mut ids = column_map(row, "external_ids");
    let name = ids.remove(ext::NAME)?;

    let mut attributes = Attributes::new();
    if let Some(switch) = ids.remove(ext::SWITCH) {
        attributes.insert(attr::SWITCH.into(), switch);
    }
    if let Some(cidr) = column_str(row, "cidr") {
        attributes.insert(attr::CIDR.into(), cidr.to_owned());
    }
    let options = column_map(row, "options");
    for key in DHCP_OPTION_KEYS {
        if let Some(value) = options.get(key) {
            attributes.insert(key.to_owned(), value.clone());
        }
    }
    Some(ObjectRecord::new(name, attributes))
}

fn attachment_row(name: &str, attributes: &Attributes) -> Result<Row, BackendError> {
    Ok(Row::from([
        ("name".into(), Datum::string(name)),
        ("mac".into(), Datum::string(required(attributes, attr::MAC)?)),
        (
            "networks".into(),
            Datum::string_set([required(attributes, attr::NETWORK)?]),
        ),
        (
            "external_ids".into(),
            external_ids([
                (ext::SWITCH, required(attributes, attr::SWITCH)?),
                (ext::SWITCH_PORT, required(attributes, attr::SWITCH_PORT)?),
            ]),
        ),
    ]))
}

/// Whether the switch-side peer of a router port still exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerPort {
    Present,
    /// Gone; it is recreated on `switch`.
    Missing { switch: Uuid },
}

/// Operations converging an existing router port and its peer. The router
/// port update comes first so its touched count decides existence.
fn attachment_update(
    name: &str,
    attributes: &Attributes,
    peer: PeerPort,
) -> Result<Vec<Operation>, BackendError> {
    let peer_name = required(attributes, attr::SWITCH_PORT)?;
    let mut ops = vec![Operation::update(
        table::LOGICAL_ROUTER_PORT,
        vec![by_name(name)],
        attachment_row(name, attributes)?,
    )];
    match peer {
        PeerPort::Present => ops.push(Operation::update(
            table::LOGICAL_SWITCH_PORT,
            vec![by_name(peer_name)],
            peer_port_row(peer_name, name),
        )),
        PeerPort::Missing { switch } => {
            debug!(peer = peer_name, router_port = name, "recreating router peer port");
            ops.push(Operation::insert(
                table::LOGICAL_SWITCH_PORT,
                peer_port_row(peer_name, name),
                Some("new_peer"),
            ));
            ops.push(attach(table::LOGICAL_SWITCH, switch, "new_peer"));
        }
    }
    Ok(ops)
}

/// `switch_port` is reported only while that peer is among `peers`, so a
/// deleted peer reads as drift.
fn attachment_attributes(
    row: &Row,
    router: Option<&str>,
    peers: &HashSet<String>,
) -> Attributes {
    let mut ids = column_map(row, "external_ids");
    let mut attributes = Attributes::new();
    if let Some(router) = router {
        attributes.insert(attr::ROUTER.into(), router.to_owned());
    }
    if let Some(switch) = ids.remove(ext::SWITCH) {
        attributes.insert(attr::SWITCH.into(), switch);
    }
    if let Some(port) = ids.remove(ext::SWITCH_PORT).filter(|p| peers.contains(p)) {
        attributes.insert(attr::SWITCH_PORT.into(), port);
    }
    if let Some(mac) = column_str(row, "mac") {
        attributes.insert(attr::MAC.into(), mac.to_owned());
    }
    if let Some(network) = column_strings(row, "networks").first() {
        attributes.insert(attr::NETWORK.into(), (*network).to_owned());
    }
    attributes
}

/// Switch-side peer of a router port.
fn peer_port_row(peer: &str, router_port: &str) -> Row {
    Row::from([
        ("name".into(), Datum::string(peer)),
        ("type".into(), Datum::string("router")),
        ("addresses".into(), Datum::string_set(["router"])),
        (
            "options".into(),
            Datum::string_map([("router-port", router_port)]),
        ),
        ("external_ids".into(), external_ids(std::iter::empty())),
    ])
}
