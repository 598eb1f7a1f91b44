// ── Transaction operations ──
//
// The `transact` method takes an array of operation objects (RFC 7047 §5.2)
// and returns one result object per operation, followed by an extra error
// object when the commit itself fails.

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::datum::{Datum, Row, row_from_json};
use crate::error::Error;

/// Comparison function in a `where` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Function {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "includes")]
    Includes,
    #[serde(rename = "excludes")]
    Excludes,
}

/// `[column, function, value]`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub function: Function,
    pub value: Datum,
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: Datum) -> Self {
        Self {
            column: column.into(),
            function: Function::Equal,
            value,
        }
    }

    pub fn includes(column: impl Into<String>, value: Datum) -> Self {
        Self {
            column: column.into(),
            function: Function::Includes,
            value,
        }
    }

    /// Row-identity condition on `_uuid`.
    pub fn uuid(id: Uuid) -> Self {
        Self::eq("_uuid", Datum::uuid(id))
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.column)?;
        seq.serialize_element(&self.function)?;
        seq.serialize_element(&self.value)?;
        seq.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutator {
    Insert,
    Delete,
}

/// `[column, mutator, value]`
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub column: String,
    pub mutator: Mutator,
    pub value: Datum,
}

impl Mutation {
    pub fn insert(column: impl Into<String>, value: Datum) -> Self {
        Self {
            column: column.into(),
            mutator: Mutator::Insert,
            value,
        }
    }

    pub fn delete(column: impl Into<String>, value: Datum) -> Self {
        Self {
            column: column.into(),
            mutator: Mutator::Delete,
            value,
        }
    }
}

impl Serialize for Mutation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.column)?;
        seq.serialize_element(&self.mutator)?;
        seq.serialize_element(&self.value)?;
        seq.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Select {
        table: String,
        #[serde(rename = "where")]
        conditions: Vec<Condition>,
        #[serde(skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<String>>,
    },
    Insert {
        table: String,
        row: Row,
        #[serde(rename = "uuid-name", skip_serializing_if = "Option::is_none")]
        uuid_name: Option<String>,
    },
    Update {
        table: String,
        #[serde(rename = "where")]
        conditions: Vec<Condition>,
        row: Row,
    },
    Mutate {
        table: String,
        #[serde(rename = "where")]
        conditions: Vec<Condition>,
        mutations: Vec<Mutation>,
    },
    Delete {
        table: String,
        #[serde(rename = "where")]
        conditions: Vec<Condition>,
    },
    Comment {
        comment: String,
    },
}

impl Operation {
    pub fn select(table: &str, conditions: Vec<Condition>) -> Self {
        Self::Select {
            table: table.to_owned(),
            conditions,
            columns: None,
        }
    }

    /// `select` returning only `columns` (`_uuid` must be listed to get it).
    pub fn select_columns(table: &str, conditions: Vec<Condition>, columns: &[&str]) -> Self {
        Self::Select {
            table: table.to_owned(),
            conditions,
            columns: Some(columns.iter().map(|c| (*c).to_owned()).collect()),
        }
    }

    pub fn insert(table: &str, row: Row, uuid_name: Option<&str>) -> Self {
        Self::Insert {
            table: table.to_owned(),
            row,
            uuid_name: uuid_name.map(str::to_owned),
        }
    }

    pub fn update(table: &str, conditions: Vec<Condition>, row: Row) -> Self {
        Self::Update {
            table: table.to_owned(),
            conditions,
            row,
        }
    }

    pub fn mutate(table: &str, conditions: Vec<Condition>, mutations: Vec<Mutation>) -> Self {
        Self::Mutate {
            table: table.to_owned(),
            conditions,
            mutations,
        }
    }

    pub fn delete(table: &str, conditions: Vec<Condition>) -> Self {
        Self::Delete {
            table: table.to_owned(),
            conditions,
        }
    }

    pub fn comment(comment: impl Into<String>) -> Self {
        Self::Comment {
            comment: comment.into(),
        }
    }
}

/// Successful outcome of one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationResult {
    /// Rows touched by `update`, `mutate` or `delete`.
    pub count: Option<u64>,
    /// Row uuid assigned by `insert`.
    pub uuid: Option<Uuid>,
    /// Rows returned by `select`.
    pub rows: Vec<Row>,
}

impl OperationResult {
    fn from_json(value: &Value) -> Result<Self, Error> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::Protocol(format!("operation result is not an object: {value}")))?;

        let uuid = match object.get("uuid") {
            Some(v) => Datum::from_json(v)?.uuids().first().copied(),
            None => None,
        };
        let rows = match object.get("rows").and_then(Value::as_array) {
            Some(rows) => rows.iter().map(row_from_json).collect::<Result<_, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            count: object.get("count").and_then(Value::as_u64),
            uuid,
            rows,
        })
    }
}

fn operation_error(index: usize, value: &Value) -> Option<Error> {
    let error = value.get("error")?.as_str()?;
    Some(Error::Transaction {
        index,
        error: error.to_owned(),
        details: value
            .get("details")
            .and_then(Value::as_str)
            .map(str::to_owned),
    })
}

/// Parse the `result` array of a `transact` reply.
///
/// Any per-operation error, including the trailing commit error, fails the
/// whole transaction: OVSDB rolls back on the first failure.
pub fn parse_transact_result(
    result: &Value,
    submitted: usize,
) -> Result<Vec<OperationResult>, Error> {
    let items = result
        .as_array()
        .ok_or_else(|| Error::Protocol("transact result is not an array".into()))?;

    if let Some(err) = items
        .iter()
        .enumerate()
        .find_map(|(index, item)| operation_error(index, item))
    {
        return Err(err);
    }

    if items.len() < submitted {
        return Err(Error::Protocol(format!(
            "transact returned {} results for {submitted} operations",
            items.len()
        )));
    }

    items
        .iter()
        .take(submitted)
        .map(OperationResult::from_json)
        .collect()
}
