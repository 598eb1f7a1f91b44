// ── In-memory backend ──
//
// A map of `(kind, name) -> attributes` with the same parent rules the
// Northbound database enforces through references. Records every call and
// can be told to fail a given one, so tests can drive the reconciler
// without an ovsdb-server.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::{Attributes, ObjectKind, ObjectRecord, attr};
use crate::reconcile::Action;

use super::{Backend, BackendError, DeleteOutcome};

type Key = (ObjectKind, String);

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub action: Action,
    pub kind: ObjectKind,
    pub name: String,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<Key, Attributes>,
    calls: Vec<Call>,
    failures: Vec<(Action, String, BackendError)>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object without recording a call or checking parents.
    pub fn insert(&self, kind: ObjectKind, name: impl Into<String>, attributes: Attributes) {
        self.state().objects.insert((kind, name.into()), attributes);
    }

    pub fn get(&self, kind: ObjectKind, name: &str) -> Option<Attributes> {
        self.state().objects.get(&(kind, name.to_owned())).cloned()
    }

    pub fn contains(&self, kind: ObjectKind, name: &str) -> bool {
        self.state().objects.contains_key(&(kind, name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.state().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored object, ordered by kind then name.
    pub fn snapshot(&self) -> BTreeMap<(ObjectKind, String), Attributes> {
        self.state().objects.clone()
    }

    /// Mutating calls received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Make the next `action` on `name` fail with `error`.
    pub fn fail_on(&self, action: Action, name: impl Into<String>, error: BackendError) {
        self.state().failures.push((action, name.into(), error));
    }
}

impl State {
    fn record(&mut self, action: Action, kind: ObjectKind, name: &str) -> Result<(), BackendError> {
        self.calls.push(Call {
            action,
            kind,
            name: name.to_owned(),
        });
        match self
            .failures
            .iter()
            .position(|(a, n, _)| *a == action && n == name)
        {
            Some(idx) => Err(self.failures.remove(idx).2),
            None => Ok(()),
        }
    }

    fn exists(&self, kind: ObjectKind, name: &str) -> bool {
        self.objects.contains_key(&(kind, name.to_owned()))
    }

    /// Parents an object of `kind` needs, as `(kind, name)` pairs.
    fn parents(kind: ObjectKind, attributes: &Attributes) -> Vec<(ObjectKind, String)> {
        let get = |key: &str| attributes.get(key).cloned();
        let mut parents = Vec::new();
        match kind {
            ObjectKind::VpcRouter | ObjectKind::LogicalSwitch => {}
            ObjectKind::LogicalSwitchPort => {
                parents.extend(get(attr::SWITCH).map(|s| (ObjectKind::LogicalSwitch, s)));
                parents.extend(get(attr::DHCP_OPTIONS).map(|d| (ObjectKind::DhcpOptions, d)));
            }
            ObjectKind::DhcpOptions => {
                parents.extend(get(attr::SWITCH).map(|s| (ObjectKind::LogicalSwitch, s)));
            }
            ObjectKind::RouterAttachment => {
                parents.extend(get(attr::ROUTER).map(|r| (ObjectKind::VpcRouter, r)));
                parents.extend(get(attr::SWITCH).map(|s| (ObjectKind::LogicalSwitch, s)));
            }
        }
        parents
    }

    fn check_parents(
        &self,
        kind: ObjectKind,
        name: &str,
        attributes: &Attributes,
    ) -> Result<(), BackendError> {
        for (parent_kind, parent) in Self::parents(kind, attributes) {
            if !self.exists(parent_kind, &parent) {
                return Err(BackendError::Parent {
                    kind,
                    name: name.to_owned(),
                    parent,
                });
            }
        }
        Ok(())
    }

    /// Name of some object that still references `(kind, name)`.
    fn referenced_by(&self, kind: ObjectKind, name: &str) -> Option<String> {
        self.objects.iter().find_map(|((child_kind, child), attrs)| {
            Self::parents(*child_kind, attrs)
                .iter()
                .any(|(k, n)| *k == kind && n == name)
                .then(|| child.clone())
        })
    }
}

impl Backend for MemoryBackend {
    async fn list_objects(
        &self,
        prefix: &str,
        kind: ObjectKind,
    ) -> Result<Vec<ObjectRecord>, BackendError> {
        Ok(self
            .state()
            .objects
            .iter()
            .filter(|((k, name), _)| *k == kind && name.starts_with(prefix))
            .map(|((_, name), attrs)| ObjectRecord::new(name.clone(), attrs.clone()))
            .collect())
    }

    async fn create_object(
        &self,
        kind: ObjectKind,
        name: &str,
        attributes: &Attributes,
    ) -> Result<(), BackendError> {
        let mut state = self.state();
        state.record(Action::Create, kind, name)?;
        if state.exists(kind, name) {
            return Err(BackendError::rejected(format!("{kind} '{name}' already exists")));
        }
        state.check_parents(kind, name, attributes)?;
        state
            .objects
            .insert((kind, name.to_owned()), attributes.clone());
        Ok(())
    }

    async fn update_object(
        &self,
        kind: ObjectKind,
        name: &str,
        attributes: &Attributes,
    ) -> Result<(), BackendError> {
        let mut state = self.state();
        state.record(Action::Update, kind, name)?;
        if !state.exists(kind, name) {
            return Err(BackendError::rejected(format!("{kind} '{name}' does not exist")));
        }
        state.check_parents(kind, name, attributes)?;
        state
            .objects
            .insert((kind, name.to_owned()), attributes.clone());
        Ok(())
    }

    async fn delete_object(
        &self,
        kind: ObjectKind,
        name: &str,
    ) -> Result<DeleteOutcome, BackendError> {
        let mut state = self.state();
        state.record(Action::Delete, kind, name)?;
        if !state.exists(kind, name) {
            return Ok(DeleteOutcome::NotFound);
        }
        if let Some(child) = state.referenced_by(kind, name) {
            return Err(BackendError::rejected(format!(
                "{kind} '{name}' is still referenced by '{child}'"
            )));
        }
        state.objects.remove(&(kind, name.to_owned()));
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[tokio::test]
    async fn port_needs_its_switch() {
        let backend = MemoryBackend::new();
        let port = attrs(&[(attr::SWITCH, "lab-ls1")]);

        let err = backend
            .create_object(ObjectKind::LogicalSwitchPort, "lab-ls1-lsp1", &port)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Parent { ref parent, .. } if parent == "lab-ls1"));

        backend
            .create_object(ObjectKind::LogicalSwitch, "lab-ls1", &Attributes::new())
            .await
            .unwrap();
        backend
            .create_object(ObjectKind::LogicalSwitchPort, "lab-ls1-lsp1", &port)
            .await
            .unwrap();
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn referenced_switch_cannot_be_deleted() {
        let backend = MemoryBackend::new();
        backend.insert(ObjectKind::LogicalSwitch, "lab-ls1", Attributes::new());
        backend.insert(
            ObjectKind::LogicalSwitchPort,
            "lab-ls1-lsp1",
            attrs(&[(attr::SWITCH, "lab-ls1")]),
        );

        let err = backend
            .delete_object(ObjectKind::LogicalSwitch, "lab-ls1")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected { .. }));

        assert_eq!(
            backend
                .delete_object(ObjectKind::LogicalSwitchPort, "lab-ls1-lsp1")
                .await
                .unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            backend
                .delete_object(ObjectKind::LogicalSwitch, "lab-ls1")
                .await
                .unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            backend
                .delete_object(ObjectKind::LogicalSwitch, "lab-ls1")
                .await
                .unwrap(),
            DeleteOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn listing_filters_by_kind_and_prefix() {
        let backend = MemoryBackend::new();
        backend.insert(ObjectKind::LogicalSwitch, "lab-ls1", Attributes::new());
        backend.insert(ObjectKind::LogicalSwitch, "other-ls1", Attributes::new());
        backend.insert(ObjectKind::VpcRouter, "lab-lr", Attributes::new());

        let switches = backend
            .list_objects("lab-", ObjectKind::LogicalSwitch)
            .await
            .unwrap();
        assert_eq!(switches.len(), 1);
        assert_eq!(switches[0].name, "lab-ls1");
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let backend = MemoryBackend::new();
        backend.fail_on(
            Action::Create,
            "lab-ls1",
            BackendError::Timeout { timeout_secs: 1 },
        );

        let err = backend
            .create_object(ObjectKind::LogicalSwitch, "lab-ls1", &Attributes::new())
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::Timeout { timeout_secs: 1 });
        assert!(!backend.contains(ObjectKind::LogicalSwitch, "lab-ls1"));

        backend
            .create_object(ObjectKind::LogicalSwitch, "lab-ls1", &Attributes::new())
            .await
            .unwrap();
        assert_eq!(backend.calls().len(), 2);
    }
}
