// ovnlab-api: Async OVSDB JSON-RPC (RFC 7047) client for the OVN Northbound database.
//
// Only the subset the lab builder needs: `transact`, `list_dbs` and `echo`.
// No monitors, no IDL cache -- every read is an explicit `select`.

pub mod client;
pub mod codec;
pub mod datum;
pub mod error;
pub mod ops;
pub mod transport;

pub use client::OvsdbClient;
pub use codec::JsonRpcCodec;
pub use datum::{Atom, Datum, Row};
pub use error::Error;
pub use ops::{Condition, Function, Mutation, Mutator, Operation, OperationResult};
pub use transport::{Endpoint, TransportConfig};

/// Name of the OVN Northbound database schema.
pub const NORTHBOUND_DB: &str = "OVN_Northbound";
