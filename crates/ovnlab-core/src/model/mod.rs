// ── Lab domain model ──
//
// Raw configuration (`lab`), its validated form (`validate`), per-type switch
// rules (`policy`), MAC addressing (`mac`) and the object vocabulary shared
// with backends (`object`).

pub mod lab;
pub mod mac;
pub mod object;
pub mod policy;
pub mod validate;

pub use lab::{AddressingMode, LabConfig, PortConfig, SwitchConfig, SwitchType, VpcConfig};
pub use mac::{MacAddress, MacPrefix};
pub use object::{Attributes, DesiredObject, ObjectKind, ObjectRecord, attr};
pub use policy::{PolicyContext, SwitchPolicy};
pub use validate::{
    Addressing, Lab, Port, PortSource, Switch, ValidationError, Violation, Violations, Vpc,
    validate,
};
