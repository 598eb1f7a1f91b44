// Shared transport configuration for opening OVSDB sessions.
//
// OVN daemons listen on a unix socket by default (`ovnnb_db.sock`), and
// optionally on TCP. Both are plain byte streams carrying JSON-RPC, so the
// client only needs a boxed `AsyncRead + AsyncWrite`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tracing::debug;

use crate::error::Error;

/// Any byte stream an OVSDB session can run over.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Connection for T {}

/// Where the database server listens, in OVS connection-string syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `unix:/var/run/ovn/ovnnb_db.sock`
    Unix(PathBuf),
    /// `tcp:127.0.0.1:6641`
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    /// Northbound socket inside an OVN run directory.
    pub fn northbound_socket(socket_dir: impl Into<PathBuf>) -> Self {
        Self::Unix(socket_dir.into().join("ovnnb_db.sock"))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp { host, port } => write!(f, "tcp:{host}:{port}"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidEndpoint(s.to_owned());

        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        if let Some(rest) = s.strip_prefix("tcp:") {
            let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
            let port: u16 = port.parse().map_err(|_| invalid())?;
            // `tcp:[::1]:6641` -- brackets are syntax, not part of the host.
            let host = host.trim_start_matches('[').trim_end_matches(']');
            if host.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Tcp {
                host: host.to_owned(),
                port,
            });
        }

        Err(invalid())
    }
}

/// Shared transport configuration for building OVSDB sessions.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Bound on connect and on every request/reply round trip.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open a byte stream to `endpoint`, bounded by the configured timeout.
    pub async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, Error> {
        debug!(%endpoint, "opening OVSDB connection");

        let connect = async {
            let stream: Box<dyn Connection> = match endpoint {
                Endpoint::Unix(path) => {
                    Box::new(UnixStream::connect(path).await?) as Box<dyn Connection>
                }
                Endpoint::Tcp { host, port } => {
                    let stream = TcpStream::connect((host.as_str(), *port)).await?;
                    stream.set_nodelay(true)?;
                    Box::new(stream) as Box<dyn Connection>
                }
            };
            Ok::<_, std::io::Error>(stream)
        };

        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(Error::Connect {
                endpoint: endpoint.to_string(),
                source,
            }),
            Err(_) => Err(Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_endpoint() {
        let ep: Endpoint = "unix:/var/run/ovn/ovnnb_db.sock".parse().unwrap();
        assert_eq!(ep, Endpoint::Unix("/var/run/ovn/ovnnb_db.sock".into()));
        assert_eq!(ep.to_string(), "unix:/var/run/ovn/ovnnb_db.sock");
    }

    #[test]
    fn parses_tcp_endpoint() {
        let ep: Endpoint = "tcp:127.0.0.1:6641".parse().unwrap();
        assert_eq!(
            ep,
            Endpoint::Tcp {
                host: "127.0.0.1".into(),
                port: 6641
            }
        );
    }

    #[test]
    fn parses_bracketed_ipv6_tcp_endpoint() {
        let ep: Endpoint = "tcp:[::1]:6641".parse().unwrap();
        assert_eq!(
            ep,
            Endpoint::Tcp {
                host: "::1".into(),
                port: 6641
            }
        );
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(matches!(
            "ssl:1.2.3.4:6641".parse::<Endpoint>(),
            Err(Error::InvalidEndpoint(_))
        ));
        assert!("tcp:localhost".parse::<Endpoint>().is_err());
        assert!("unix:".parse::<Endpoint>().is_err());
    }

    #[test]
    fn northbound_socket_joins_dir() {
        let ep = Endpoint::northbound_socket("/var/run/ovn");
        assert_eq!(ep.to_string(), "unix:/var/run/ovn/ovnnb_db.sock");
    }
}
