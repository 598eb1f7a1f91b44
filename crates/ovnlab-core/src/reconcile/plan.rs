// ── Planning ──
//
// Diff the desired object list against observed state. Plans are plain
// values: the CLI can render them for `--dry-run` without applying.

use std::collections::BTreeMap;

use serde::Serialize;
use strum::Display;

use crate::model::{Attributes, DesiredObject, ObjectKind};
use crate::naming::ObjectName;
use crate::topology::Topology;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Build,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// Terminal state of one object within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ObjectState {
    Created,
    Updated,
    Unchanged,
    Deleted,
    AlreadyAbsent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedOperation {
    pub action: Action,
    pub kind: ObjectKind,
    pub name: String,
    /// Desired attributes for create/update; empty for delete.
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl PlannedOperation {
    fn from_desired(action: Action, obj: &DesiredObject) -> Self {
        Self {
            action,
            kind: obj.kind,
            name: obj.name.clone(),
            attributes: obj.attributes.clone(),
        }
    }

    fn delete(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            action: Action::Delete,
            kind,
            name: name.into(),
            attributes: Attributes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub kind: ObjectKind,
    pub name: String,
    pub state: ObjectState,
}

/// Owned objects observed in the backend, by kind then name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActualState {
    objects: BTreeMap<ObjectKind, BTreeMap<String, Attributes>>,
}

impl ActualState {
    pub fn insert(&mut self, kind: ObjectKind, name: impl Into<String>, attributes: Attributes) {
        self.objects
            .entry(kind)
            .or_default()
            .insert(name.into(), attributes);
    }

    pub fn get(&self, kind: ObjectKind, name: &str) -> Option<&Attributes> {
        self.objects.get(&kind)?.get(name)
    }

    pub fn len(&self) -> usize {
        self.objects.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every `(kind, name)` pair.
    pub fn names(&self) -> impl Iterator<Item = (ObjectKind, &str)> {
        self.objects
            .iter()
            .flat_map(|(kind, names)| names.keys().map(move |n| (*kind, n.as_str())))
    }
}

/// An ordered list of operations plus the objects that need none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub vpc: String,
    pub direction: Direction,
    pub operations: Vec<PlannedOperation>,
    /// Objects already in their terminal state (`Unchanged`, `AlreadyAbsent`).
    pub settled: Vec<Outcome>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn count(&self, action: Action) -> usize {
        self.operations.iter().filter(|op| op.action == action).count()
    }
}

/// Whether `actual` has drifted from `desired`: a desired value differs, or
/// a key the kind manages is set in `actual` but no longer desired. Keys
/// outside [`ObjectKind::managed_keys`] are ignored.
fn differs(kind: ObjectKind, desired: &Attributes, actual: &Attributes) -> bool {
    desired
        .iter()
        .any(|(key, value)| actual.get(key) != Some(value))
        || kind
            .managed_keys()
            .iter()
            .any(|key| !desired.contains_key(*key) && actual.contains_key(*key))
}

/// Creates for absent objects and updates for drifted ones, in build order.
/// Objects only present in `actual` are left alone.
pub fn plan_build(topology: &Topology, actual: &ActualState) -> Plan {
    let mut operations = Vec::new();
    let mut settled = Vec::new();

    for obj in topology.desired_objects() {
        match actual.get(obj.kind, &obj.name) {
            None => operations.push(PlannedOperation::from_desired(Action::Create, &obj)),
            Some(current) if differs(obj.kind, &obj.attributes, current) => {
                operations.push(PlannedOperation::from_desired(Action::Update, &obj));
            }
            Some(_) => settled.push(Outcome {
                kind: obj.kind,
                name: obj.name,
                state: ObjectState::Unchanged,
            }),
        }
    }

    Plan {
        vpc: topology.vpc.clone(),
        direction: Direction::Build,
        operations,
        settled,
    }
}

/// Deletion phases, children first.
const DESTROY_PHASES: [ObjectKind; 5] = [
    ObjectKind::RouterAttachment,
    ObjectKind::LogicalSwitchPort,
    ObjectKind::DhcpOptions,
    ObjectKind::LogicalSwitch,
    ObjectKind::VpcRouter,
];

/// Deletes for every owned object in `actual`, in reverse dependency phases
/// sorted by ids. Desired objects already gone are reported `AlreadyAbsent`.
///
/// `actual` must only hold names that parse under the topology's VPC;
/// anything else is skipped.
pub fn plan_destroy(topology: &Topology, actual: &ActualState) -> Plan {
    let mut owned: Vec<(ObjectName, ObjectKind, &str)> = actual
        .names()
        .filter_map(|(kind, name)| {
            ObjectName::parse(&topology.vpc, name)
                .filter(|id| id.kind() == kind)
                .map(|id| (id, kind, name))
        })
        .collect();
    owned.sort_by_key(|(id, kind, _)| {
        let phase = DESTROY_PHASES.iter().position(|k| k == kind);
        (phase, *id)
    });

    let operations = owned
        .into_iter()
        .map(|(_, kind, name)| PlannedOperation::delete(kind, name))
        .collect();

    let settled = topology
        .desired_objects()
        .into_iter()
        .filter(|obj| actual.get(obj.kind, &obj.name).is_none())
        .map(|obj| Outcome {
            kind: obj.kind,
            name: obj.name,
            state: ObjectState::AlreadyAbsent,
        })
        .collect();

    Plan {
        vpc: topology.vpc.clone(),
        direction: Direction::Destroy,
        operations,
        settled,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{LabConfig, attr, validate};
    use pretty_assertions::assert_eq;

    const LAB: &str = r#"{
        "vpc": {"name": "lab", "mac_prefix": "0a:00:00", "id": 3, "port_count": 2},
        "switches": [
            {"name": "a", "id": 1, "type": "normal", "subnet": "10.0.1.0/24",
             "dhcp_enable": true, "routed": true},
            {"name": "b", "id": 2, "type": "normal", "subnet": "10.0.2.0/24", "routed": true}
        ]
    }"#;

    fn topology() -> Topology {
        let cfg = LabConfig::from_json_str(LAB).unwrap();
        Topology::build(&validate(&cfg).unwrap()).unwrap()
    }

    fn converged(topology: &Topology) -> ActualState {
        let mut actual = ActualState::default();
        for obj in topology.desired_objects() {
            actual.insert(obj.kind, obj.name, obj.attributes);
        }
        actual
    }

    #[test]
    fn empty_backend_plans_creates_for_everything() {
        let topo = topology();
        let plan = plan_build(&topo, &ActualState::default());
        assert_eq!(plan.count(Action::Create), topo.desired_objects().len());
        assert!(plan.settled.is_empty());
    }

    #[test]
    fn converged_backend_plans_nothing() {
        let topo = topology();
        let plan = plan_build(&topo, &converged(&topo));
        assert!(plan.is_empty());
        assert!(plan.settled.iter().all(|o| o.state == ObjectState::Unchanged));
    }

    #[test]
    fn drift_plans_update_with_full_attributes() {
        let topo = topology();
        let mut actual = converged(&topo);
        let mut drifted = actual.get(ObjectKind::LogicalSwitch, "lab-ls2").unwrap().clone();
        drifted.insert(attr::SUBNET.into(), "10.9.9.0/24".into());
        actual.insert(ObjectKind::LogicalSwitch, "lab-ls2", drifted);

        let plan = plan_build(&topo, &actual);
        assert_eq!(plan.operations.len(), 1);
        let op = &plan.operations[0];
        assert_eq!(op.action, Action::Update);
        assert_eq!(op.name, "lab-ls2");
        assert_eq!(op.attributes[attr::SUBNET], "10.0.2.0/24");
    }

    #[test]
    fn extra_actual_keys_are_not_drift() {
        let topo = topology();
        let mut actual = converged(&topo);
        let mut extra = actual.get(ObjectKind::VpcRouter, "lab-lr").unwrap().clone();
        extra.insert("owner".into(), "someone".into());
        actual.insert(ObjectKind::VpcRouter, "lab-lr", extra);
        assert!(plan_build(&topo, &actual).is_empty());
    }

    #[test]
    fn stale_managed_key_is_drift() {
        // Switch `a` had DHCP when the ports were built; now it does not.
        let before = topology();
        let actual = converged(&before);
        let after = Topology::build(
            &validate(
                &LabConfig::from_json_str(&LAB.replace(r#""dhcp_enable": true, "#, "")).unwrap(),
            )
            .unwrap(),
        )
        .unwrap();

        let plan = plan_build(&after, &actual);
        let updates: Vec<&str> = plan
            .operations
            .iter()
            .filter(|op| op.action == Action::Update)
            .map(|op| op.name.as_str())
            .collect();
        assert_eq!(updates, ["lab-ls1", "lab-ls1-lsp1", "lab-ls1-lsp2"]);
        for op in &plan.operations {
            assert!(!op.attributes.contains_key(attr::DHCP_OPTIONS));
            assert!(!op.attributes.contains_key(attr::EXCLUDE_IPS));
        }
    }

    #[test]
    fn build_never_deletes() {
        let topo = topology();
        let mut actual = converged(&topo);
        actual.insert(ObjectKind::LogicalSwitch, "lab-ls9", Attributes::new());
        let plan = plan_build(&topo, &actual);
        assert_eq!(plan.count(Action::Delete), 0);
    }

    #[test]
    fn destroy_orders_children_first() {
        let topo = topology();
        let mut actual = converged(&topo);
        // Leftover from an earlier config is still owned and gets removed.
        actual.insert(ObjectKind::LogicalSwitchPort, "lab-ls2-lsp9", Attributes::new());

        let plan = plan_destroy(&topo, &actual);
        let order: Vec<&str> = plan.operations.iter().map(|op| op.name.as_str()).collect();
        assert_eq!(
            order,
            [
                "lab-lr-ls1",
                "lab-lr-ls2",
                "lab-ls1-lsp1",
                "lab-ls1-lsp2",
                "lab-ls2-lsp1",
                "lab-ls2-lsp2",
                "lab-ls2-lsp9",
                "lab-ls1-dhcp",
                "lab-ls1",
                "lab-ls2",
                "lab-lr",
            ]
        );
        assert!(plan.settled.is_empty());
    }

    #[test]
    fn destroy_skips_foreign_names() {
        let topo = topology();
        let mut actual = ActualState::default();
        actual.insert(ObjectKind::LogicalSwitch, "lab-ls01", Attributes::new());
        actual.insert(ObjectKind::LogicalSwitch, "lab-2-ls1", Attributes::new());
        actual.insert(ObjectKind::VpcRouter, "lab-ls1", Attributes::new());

        let plan = plan_destroy(&topo, &actual);
        assert!(plan.is_empty());
        assert_eq!(plan.settled.len(), topo.desired_objects().len());
        assert!(plan.settled.iter().all(|o| o.state == ObjectState::AlreadyAbsent));
    }
}
