// ── OVSDB value model ──
//
// RFC 7047 §5.1 encodes column values as atoms, `["set", [...]]`,
// `["map", [[k, v], ...]]`, `["uuid", "..."]` and `["named-uuid", "..."]`.
// A one-element set may be sent as a bare atom, so readers go through the
// accessors here instead of matching on the wire shape.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::Error;

/// A database row: column name to value.
pub type Row = BTreeMap<String, Datum>;

/// A single scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    String(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Uuid(Uuid),
    /// Reference to a row inserted earlier in the same transaction.
    NamedUuid(String),
}

impl Atom {
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => json!(i),
            Self::Real(r) => json!(r),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Uuid(u) => json!(["uuid", u.to_string()]),
            Self::NamedUuid(n) => json!(["named-uuid", n]),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, Error> {
        match value {
            Value::String(s) => Ok(Self::String(s.clone())),
            Value::Bool(b) => Ok(Self::Boolean(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Real))
                .ok_or_else(|| Error::Protocol(format!("unrepresentable number {n}"))),
            Value::Array(pair) => match pair.as_slice() {
                [Value::String(tag), Value::String(id)] if tag == "uuid" => Uuid::parse_str(id)
                    .map(Self::Uuid)
                    .map_err(|e| Error::Protocol(format!("invalid uuid '{id}': {e}"))),
                [Value::String(tag), Value::String(name)] if tag == "named-uuid" => {
                    Ok(Self::NamedUuid(name.clone()))
                }
                _ => Err(Error::Protocol(format!("not an atom: {value}"))),
            },
            _ => Err(Error::Protocol(format!("not an atom: {value}"))),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Atom {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Uuid> for Atom {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

/// A column value: atom, set or map.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Atom(Atom),
    Set(Vec<Atom>),
    Map(Vec<(Atom, Atom)>),
}

impl Datum {
    // ── Constructors ─────────────────────────────────────────────────

    pub fn string(s: impl Into<String>) -> Self {
        Self::Atom(Atom::String(s.into()))
    }

    pub fn uuid(u: Uuid) -> Self {
        Self::Atom(Atom::Uuid(u))
    }

    pub fn named_uuid(name: impl Into<String>) -> Self {
        Self::Atom(Atom::NamedUuid(name.into()))
    }

    pub fn empty_set() -> Self {
        Self::Set(Vec::new())
    }

    /// Set of strings (`addresses`, `networks`, `port_security`, ...).
    pub fn string_set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(items.into_iter().map(|s| Atom::String(s.into())).collect())
    }

    /// String-to-string map (`external_ids`, `options`, `other_config`).
    pub fn string_map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Atom::String(k.into()), Atom::String(v.into())))
                .collect(),
        )
    }

    // ── Wire encoding ────────────────────────────────────────────────

    pub fn to_json(&self) -> Value {
        match self {
            Self::Atom(a) => a.to_json(),
            Self::Set(items) => json!(["set", items.iter().map(Atom::to_json).collect::<Vec<_>>()]),
            Self::Map(entries) => json!([
                "map",
                entries
                    .iter()
                    .map(|(k, v)| json!([k.to_json(), v.to_json()]))
                    .collect::<Vec<_>>()
            ]),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, Error> {
        if let Value::Array(parts) = value {
            match parts.as_slice() {
                [Value::String(tag), Value::Array(items)] if tag == "set" => {
                    let atoms = items.iter().map(Atom::from_json).collect::<Result<_, _>>()?;
                    return Ok(Self::Set(atoms));
                }
                [Value::String(tag), Value::Array(pairs)] if tag == "map" => {
                    let entries = pairs
                        .iter()
                        .map(|pair| match pair.as_array().map(Vec::as_slice) {
                            Some([k, v]) => Ok((Atom::from_json(k)?, Atom::from_json(v)?)),
                            _ => Err(Error::Protocol(format!("malformed map entry: {pair}"))),
                        })
                        .collect::<Result<_, _>>()?;
                    return Ok(Self::Map(entries));
                }
                _ => {}
            }
        }
        Atom::from_json(value).map(Self::Atom)
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Atoms of this value, treating a bare atom as a one-element set.
    pub fn atoms(&self) -> Vec<&Atom> {
        match self {
            Self::Atom(a) => vec![a],
            Self::Set(items) => items.iter().collect(),
            Self::Map(_) => Vec::new(),
        }
    }

    /// The single string value, if this is a string or a one-string set.
    pub fn as_str(&self) -> Option<&str> {
        match self.atoms().as_slice() {
            [atom] => atom.as_str(),
            _ => None,
        }
    }

    /// All string atoms (set or single value).
    pub fn strings(&self) -> Vec<&str> {
        self.atoms().into_iter().filter_map(Atom::as_str).collect()
    }

    /// All uuid atoms (set or single value).
    pub fn uuids(&self) -> Vec<Uuid> {
        self.atoms().into_iter().filter_map(Atom::as_uuid).collect()
    }

    /// String entries of a map value; non-string entries are skipped.
    pub fn string_entries(&self) -> BTreeMap<String, String> {
        match self {
            Self::Map(entries) => entries
                .iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_owned(), v.as_str()?.to_owned())))
                .collect(),
            _ => BTreeMap::new(),
        }
    }
}

impl Serialize for Datum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Decode a `select` result row (`{"column": <json>, ...}`).
pub fn row_from_json(value: &Value) -> Result<Row, Error> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::Protocol(format!("row is not an object: {value}")))?;
    object
        .iter()
        .map(|(column, v)| Ok((column.clone(), Datum::from_json(v)?)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_string_reads_as_single_element_set() {
        let d = Datum::from_json(&json!("00:11:22:33:44:55 dynamic")).unwrap();
        assert_eq!(d.strings(), vec!["00:11:22:33:44:55 dynamic"]);
        assert_eq!(d.as_str(), Some("00:11:22:33:44:55 dynamic"));
    }

    #[test]
    fn empty_set_has_no_string() {
        let d = Datum::from_json(&json!(["set", []])).unwrap();
        assert_eq!(d, Datum::empty_set());
        assert_eq!(d.as_str(), None);
    }

    #[test]
    fn map_decodes_string_entries() {
        let d = Datum::from_json(&json!(["map", [["subnet", "10.0.0.0/24"], ["x", "y"]]])).unwrap();
        let entries = d.string_entries();
        assert_eq!(entries.get("subnet").map(String::as_str), Some("10.0.0.0/24"));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn uuid_atom_decodes() {
        let id = Uuid::new_v4();
        let d = Datum::from_json(&json!(["uuid", id.to_string()])).unwrap();
        assert_eq!(d.uuids(), vec![id]);
    }

    #[test]
    fn set_of_uuids_decodes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let d = Datum::from_json(&json!(["set", [["uuid", a.to_string()], ["uuid", b.to_string()]]]))
            .unwrap();
        assert_eq!(d.uuids(), vec![a, b]);
    }

    #[test]
    fn string_map_encodes_wire_shape() {
        let d = Datum::string_map([("ovn-lab-builder", "true")]);
        assert_eq!(d.to_json(), json!(["map", [["ovn-lab-builder", "true"]]]));
    }

    #[test]
    fn named_uuid_encodes_wire_shape() {
        assert_eq!(
            Datum::named_uuid("new_lsp").to_json(),
            json!(["named-uuid", "new_lsp"])
        );
    }

    #[test]
    fn malformed_map_entry_is_protocol_error() {
        let err = Datum::from_json(&json!(["map", [["only-key"]]])).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
