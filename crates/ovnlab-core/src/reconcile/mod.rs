// ── Reconciliation ──
//
// `plan` diffs desired against actual state; `apply` drives a backend
// through the resulting operations.

mod apply;
mod plan;

pub use apply::{ApplyError, ApplyReport, Reconciler};
pub use plan::{
    Action, ActualState, Direction, ObjectState, Outcome, Plan, PlannedOperation, plan_build,
    plan_destroy,
};
