// ── Reconciler ──
//
// Observe, plan, apply. Operations run strictly in plan order, one backend
// call at a time; the first failure stops the run and reports what was done
// and what was left. There is no rollback: re-running converges.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendError, DeleteOutcome};
use crate::error::CoreError;
use crate::model::ObjectKind;
use crate::naming::{self, ObjectName};
use crate::topology::Topology;

use super::plan::{
    Action, ActualState, Direction, ObjectState, Outcome, Plan, PlannedOperation, plan_build,
    plan_destroy,
};

/// What a finished run did to each object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub vpc: String,
    pub direction: Direction,
    /// One entry per object: applied operations first, then settled ones.
    pub outcomes: Vec<Outcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ApplyReport {
    pub fn count(&self, state: ObjectState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    /// Whether the run changed anything.
    pub fn changed(&self) -> bool {
        self.outcomes.iter().any(|o| {
            matches!(
                o.state,
                ObjectState::Created | ObjectState::Updated | ObjectState::Deleted
            )
        })
    }
}

/// An operation failed mid-run.
#[derive(Debug, Clone, Error)]
#[error("{} {} '{}' failed: {source}", .failed.action, .failed.kind, .failed.name)]
pub struct ApplyError {
    pub failed: PlannedOperation,
    #[source]
    pub source: BackendError,
    /// Operations that completed before the failure.
    pub applied: Vec<Outcome>,
    /// Operations never attempted.
    pub pending: Vec<PlannedOperation>,
}

/// Drives a [`Backend`] toward a [`Topology`].
#[derive(Debug)]
pub struct Reconciler<B> {
    backend: B,
}

impl<B: Backend> Reconciler<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// List every object owned by `vpc`.
    ///
    /// Names outside the ownership grammar are dropped even when they share
    /// the `<vpc>-` prefix.
    pub async fn observe(&self, vpc: &str) -> Result<ActualState, BackendError> {
        let prefix = naming::owned_prefix(vpc);
        let mut actual = ActualState::default();

        for kind in ObjectKind::iter() {
            for record in self.backend.list_objects(&prefix, kind).await? {
                match ObjectName::parse(vpc, &record.name) {
                    Some(id) if id.kind() == kind => {
                        actual.insert(kind, record.name, record.attributes);
                    }
                    _ => debug!(%kind, name = %record.name, "ignoring foreign object"),
                }
            }
        }

        debug!(vpc, objects = actual.len(), "observed control plane");
        Ok(actual)
    }

    pub async fn plan_build(&self, topology: &Topology) -> Result<Plan, CoreError> {
        let actual = self.observe(&topology.vpc).await?;
        Ok(plan_build(topology, &actual))
    }

    pub async fn plan_destroy(&self, topology: &Topology) -> Result<Plan, CoreError> {
        let actual = self.observe(&topology.vpc).await?;
        Ok(plan_destroy(topology, &actual))
    }

    /// Execute `plan` in order, stopping at the first failure.
    pub async fn apply(&self, plan: Plan) -> Result<ApplyReport, ApplyError> {
        let started_at = Utc::now();
        info!(
            vpc = %plan.vpc,
            direction = %plan.direction,
            operations = plan.operations.len(),
            "applying plan"
        );

        for outcome in &plan.settled {
            debug!(kind = %outcome.kind, name = %outcome.name, state = %outcome.state, "no change");
        }

        let mut applied = Vec::with_capacity(plan.operations.len());
        let mut remaining = plan.operations.into_iter();

        while let Some(op) = remaining.next() {
            match self.execute(&op).await {
                Ok(state) => {
                    info!(action = %op.action, kind = %op.kind, name = %op.name, %state, "applied");
                    applied.push(Outcome {
                        kind: op.kind,
                        name: op.name,
                        state,
                    });
                }
                Err(source) => {
                    warn!(action = %op.action, kind = %op.kind, name = %op.name, error = %source, "operation failed");
                    return Err(ApplyError {
                        failed: op,
                        source,
                        applied,
                        pending: remaining.collect(),
                    });
                }
            }
        }

        applied.extend(plan.settled);
        Ok(ApplyReport {
            vpc: plan.vpc,
            direction: plan.direction,
            outcomes: applied,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn execute(&self, op: &PlannedOperation) -> Result<ObjectState, BackendError> {
        match op.action {
            Action::Create => {
                self.backend
                    .create_object(op.kind, &op.name, &op.attributes)
                    .await?;
                Ok(ObjectState::Created)
            }
            Action::Update => {
                self.backend
                    .update_object(op.kind, &op.name, &op.attributes)
                    .await?;
                Ok(ObjectState::Updated)
            }
            Action::Delete => match self.backend.delete_object(op.kind, &op.name).await? {
                DeleteOutcome::Deleted => Ok(ObjectState::Deleted),
                DeleteOutcome::NotFound => Ok(ObjectState::AlreadyAbsent),
            },
        }
    }

    /// Observe, plan and apply a build.
    pub async fn build(&self, topology: &Topology) -> Result<ApplyReport, CoreError> {
        let plan = self.plan_build(topology).await?;
        Ok(self.apply(plan).await?)
    }

    /// Observe, plan and apply a destroy.
    pub async fn destroy(&self, topology: &Topology) -> Result<ApplyReport, CoreError> {
        let plan = self.plan_destroy(topology).await?;
        Ok(self.apply(plan).await?)
    }
}
