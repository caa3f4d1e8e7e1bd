//! Materialized rows
//!
//! A [`Row`] is one record returned by the query endpoint. Its version is the
//! optimistic-lock token assigned by the remote store; the only way to move
//! it is [`Row::confirm_version`], which never lowers it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Opaque row identifier, unique within an entity.
///
/// The wire form may be a string or a number; both are normalized to their
/// textual representation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    /// Create a row id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Textual form
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for RowId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RowId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Text(s) => Self(s),
            Wire::Number(n) => Self(n.to_string()),
        })
    }
}

/// One materialized record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    id: RowId,
    #[serde(default, deserialize_with = "version_or_zero")]
    version: u64,
    #[serde(flatten)]
    values: Map<String, Value>,
}

/// Absent or `null` version means 0
fn version_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

impl Row {
    /// Create an empty row at the given version
    #[must_use]
    pub fn new(id: impl Into<RowId>, version: u64) -> Self {
        Self {
            id: id.into(),
            version,
            values: Map::new(),
        }
    }

    /// With a field value
    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    /// Row identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &RowId {
        &self.id
    }

    /// Optimistic-lock token
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Field value, if present
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Field value, `Null` when absent
    #[must_use]
    pub fn value_or_null(&self, field: &str) -> Value {
        self.values.get(field).cloned().unwrap_or(Value::Null)
    }

    /// All field values
    #[inline]
    #[must_use]
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Replace a field value, returning the previous one
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(field.into(), value)
    }

    /// Mirror a server-confirmed version.
    ///
    /// Returns `true` if the version moved. A confirmation at or below the
    /// current version is ignored.
    pub fn confirm_version(&mut self, confirmed: u64) -> bool {
        if confirmed > self.version {
            self.version = confirmed;
            true
        } else {
            false
        }
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPage {
    /// Rows in server order
    pub rows: Vec<Row>,
    /// Total matching rows across all pages
    pub total_count: u64,
}

/// The materialized row set: an arena of rows plus an id index
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    rows: Vec<Row>,
    index: HashMap<RowId, usize>,
    total_count: u64,
}

impl RowSet {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a fetched page. Duplicate ids keep their first position.
    #[must_use]
    pub fn from_page(page: QueryPage) -> Self {
        let mut index = HashMap::with_capacity(page.rows.len());
        for (pos, row) in page.rows.iter().enumerate() {
            index.entry(row.id.clone()).or_insert(pos);
        }
        Self {
            rows: page.rows,
            index,
            total_count: page.total_count,
        }
    }

    /// Row by id
    #[must_use]
    pub fn get(&self, id: &RowId) -> Option<&Row> {
        self.index.get(id).map(|&pos| &self.rows[pos])
    }

    /// Mutable row by id
    pub fn get_mut(&mut self, id: &RowId) -> Option<&mut Row> {
        match self.index.get(id) {
            Some(&pos) => self.rows.get_mut(pos),
            None => None,
        }
    }

    /// Whether a row with `id` is materialized
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &RowId) -> bool {
        self.index.contains_key(id)
    }

    /// Rows in server order
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Iterate rows in server order
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Number of materialized rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// No rows materialized
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total matching rows reported by the server
    #[inline]
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.total_count
    }
}
