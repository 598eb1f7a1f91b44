//! OVSDB session over a single connection.
//!
//! Requests are strictly sequential: one outstanding call at a time, matched
//! to its reply by `id`. Server-initiated `echo` requests (inactivity probes)
//! are answered inline while waiting, and stray notifications are skipped.
//!
//! # Example
//!
//! ```rust,ignore
//! use ovnlab_api::{Endpoint, OvsdbClient, TransportConfig, NORTHBOUND_DB};
//!
//! let endpoint: Endpoint = "unix:/var/run/ovn/ovnnb_db.sock".parse()?;
//! let mut client = OvsdbClient::connect(&endpoint, &TransportConfig::default()).await?;
//! let dbs = client.list_dbs().await?;
//! assert!(dbs.iter().any(|db| db == NORTHBOUND_DB));
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::codec::JsonRpcCodec;
use crate::error::Error;
use crate::ops::{Operation, OperationResult, parse_transact_result};
use crate::transport::{Connection, Endpoint, TransportConfig};

pub struct OvsdbClient {
    framed: Framed<Box<dyn Connection>, JsonRpcCodec>,
    endpoint: String,
    timeout: Duration,
    next_id: u64,
}

impl std::fmt::Debug for OvsdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OvsdbClient")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl OvsdbClient {
    /// Open a session to `endpoint`.
    pub async fn connect(endpoint: &Endpoint, transport: &TransportConfig) -> Result<Self, Error> {
        let stream = transport.open(endpoint).await?;
        Ok(Self::from_stream(stream, endpoint.to_string(), transport.timeout))
    }

    /// Wrap an already-open byte stream.
    pub fn from_stream(stream: Box<dyn Connection>, endpoint: String, timeout: Duration) -> Self {
        Self {
            framed: Framed::new(stream, JsonRpcCodec::default()),
            endpoint,
            timeout,
            next_id: 0,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // ── Methods ──────────────────────────────────────────────────────

    /// Names of the databases the server hosts.
    pub async fn list_dbs(&mut self) -> Result<Vec<String>, Error> {
        let result = self.call("list_dbs", json!([])).await?;
        let names = result
            .as_array()
            .ok_or_else(|| Error::Protocol("list_dbs result is not an array".into()))?;
        Ok(names
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect())
    }

    /// Liveness probe; the server echoes `params` back.
    pub async fn echo(&mut self) -> Result<(), Error> {
        self.call("echo", json!(["ovnlab"])).await?;
        Ok(())
    }

    /// Run `operations` atomically against `db`.
    pub async fn transact(
        &mut self,
        db: &str,
        operations: &[Operation],
    ) -> Result<Vec<OperationResult>, Error> {
        let mut params = Vec::with_capacity(operations.len() + 1);
        params.push(Value::String(db.to_owned()));
        for op in operations {
            params.push(serde_json::to_value(op)?);
        }

        let result = self.call("transact", Value::Array(params)).await?;
        parse_transact_result(&result, operations.len())
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    async fn call(&mut self, method: &str, params: Value) -> Result<Value, Error> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.round_trip(method, params)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    async fn round_trip(&mut self, method: &str, params: Value) -> Result<Value, Error> {
        let id = self.next_id;
        self.next_id += 1;

        trace!(id, method, %params, "sending request");
        self.framed
            .send(json!({"method": method, "params": params, "id": id}))
            .await?;

        loop {
            let msg = self.framed.next().await.ok_or(Error::ConnectionClosed)??;

            // Server-to-client request: answer probes, ignore the rest.
            if let Some(server_method) = msg.get("method").and_then(Value::as_str) {
                if server_method == "echo" {
                    let reply = json!({
                        "result": msg.get("params").cloned().unwrap_or(Value::Null),
                        "error": null,
                        "id": msg.get("id").cloned().unwrap_or(Value::Null),
                    });
                    self.framed.send(reply).await?;
                } else {
                    debug!(method = server_method, "ignoring server request");
                }
                continue;
            }

            if msg.get("id").and_then(Value::as_u64) != Some(id) {
                debug!(?msg, "skipping reply with unexpected id");
                continue;
            }

            if let Some(error) = msg.get("error").filter(|e| !e.is_null()) {
                let message = error
                    .as_str()
                    .map_or_else(|| error.to_string(), str::to_owned);
                return Err(Error::Rpc {
                    method: method.to_owned(),
                    message,
                });
            }

            trace!(id, method, "received reply");
            return Ok(msg.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}
