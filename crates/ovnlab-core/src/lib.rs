//! Lab model, deterministic naming and reconciliation engine for ovnlab.
//!
//! The pipeline runs left to right, every stage a plain value:
//!
//! - **[`LabConfig`]**: the JSON document as written, parsed with closed
//!   enums for switch types and addressing modes.
//! - **[`validate()`]** turns it into a normalized [`Lab`], reporting every
//!   violation with its field path.
//! - **[`Topology::build`]** expands the lab into the full object graph:
//!   names, MACs, DHCP options, router attachments and auto ports, all
//!   derived by the functions in [`naming`].
//! - **[`Reconciler`]** observes a [`Backend`], plans the minimal ordered set
//!   of operations ([`Plan`]) and applies it, producing an [`ApplyReport`].
//!
//! Two backends ship with the crate: [`NorthboundBackend`] speaks OVSDB to
//! the OVN Northbound database through `ovnlab-api`, and [`MemoryBackend`]
//! keeps objects in a map for tests and offline planning.

pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod naming;
pub mod reconcile;
pub mod topology;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::{Backend, BackendError, DeleteOutcome, MemoryBackend, NorthboundBackend};
pub use config::{Endpoint, NorthboundConfig};
pub use error::CoreError;
pub use reconcile::{
    Action, ActualState, ApplyError, ApplyReport, Direction, ObjectState, Outcome, Plan,
    PlannedOperation, Reconciler,
};
pub use topology::Topology;

pub use model::{
    Addressing, AddressingMode, Attributes, DesiredObject, Lab, LabConfig, MacAddress, MacPrefix,
    ObjectKind, ObjectRecord, SwitchType, ValidationError, Violation, validate,
};
