// ── MAC addressing ──
//
// Every generated MAC is `<prefix>:<vpc>:<switch>:<port>`. With the id ranges
// enforced by validation this layout is a bijection, so two distinct ports
// can never share a MAC within one prefix.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// First three octets of every MAC in a VPC, e.g. `e1:cc:ff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacPrefix([u8; 3]);

impl MacPrefix {
    pub fn octets(self) -> [u8; 3] {
        self.0
    }
}

impl FromStr for MacPrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(format!(
                "expected three colon-separated octets (e.g. e1:cc:ff), got '{s}'"
            ));
        }

        let mut octets = [0u8; 3];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(format!("octet '{part}' is not two hex digits"));
            }
            *slot = u8::from_str_radix(part, 16).map_err(|e| e.to_string())?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}")
    }
}

impl Serialize for MacPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// MAC address, rendered lowercase colon-separated (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// `<prefix>:<vpc_id>:<switch_id>:<port_id>`; port id 0 is the switch's
    /// router/DHCP-server address.
    pub fn derive(prefix: MacPrefix, vpc_id: u8, switch_id: u8, port_id: u8) -> Self {
        let [a, b, c] = prefix.octets();
        Self([a, b, c, vpc_id, switch_id, port_id])
    }

    pub fn octets(self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = String;

    /// Accepts colon- or dash-separated hex in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('-', ":");
        let parts: Vec<&str> = normalized.split(':').collect();
        if parts.len() != 6 {
            return Err(format!("'{s}' is not a MAC address"));
        }
        let mut octets = [0u8; 6];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(format!("'{s}' is not a MAC address"));
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| format!("'{s}' is not a MAC address"))?;
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
