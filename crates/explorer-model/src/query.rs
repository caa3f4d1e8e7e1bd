//! Query requests and responses

use crate::row::{QueryPage, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Field -> predicate value
pub type Filters = BTreeMap<String, Value>;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending
    #[default]
    Asc,
    /// Descending
    Desc,
}

/// Sort on one field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    /// Field name
    pub field: String,
    /// Direction
    pub direction: SortDirection,
}

impl Sort {
    /// Ascending sort
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending sort
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Aggregation functions accepted by the query endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregation {
    /// Row count
    Count,
    /// Sum
    Sum,
    /// Average
    Avg,
    /// Minimum
    Min,
    /// Maximum
    Max,
    /// Distinct count
    CountDistinct,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::CountDistinct => "countDistinct",
        };
        f.write_str(name)
    }
}

/// Aggregated measure
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measure {
    /// Input field
    pub field: String,
    /// Aggregation function
    pub aggregation: Aggregation,
}

/// Query sent to `POST /query`.
///
/// Built fresh for every view-state change; never mutated after it is issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Entity to query
    pub entity: String,
    /// Projected/grouping fields
    pub dimensions: Vec<String>,
    /// Aggregated measures
    #[serde(default)]
    pub measures: Vec<Measure>,
    /// Equality predicates
    #[serde(default)]
    pub filters: Filters,
    /// Page size
    pub limit: u32,
    /// Rows to skip
    pub offset: u64,
    /// Optional sort
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
}

impl QueryRequest {
    /// First page of 25 rows over no dimensions
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            dimensions: Vec::new(),
            measures: Vec::new(),
            filters: Filters::new(),
            limit: 25,
            offset: 0,
            sort: None,
        }
    }

    /// With dimensions
    #[must_use]
    pub fn with_dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    /// With filters
    #[must_use]
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// With page window
    #[must_use]
    pub fn with_window(mut self, limit: u32, offset: u64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// With sort
    #[must_use]
    pub fn with_sort(mut self, sort: Option<Sort>) -> Self {
        self.sort = sort;
        self
    }
}

/// Response metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    /// Total matching rows
    #[serde(default)]
    pub total_count: Option<u64>,
}

/// Wire response of `POST /query`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Row objects
    #[serde(default)]
    pub data: Vec<Row>,
    /// Metadata block
    #[serde(default)]
    pub metadata: Option<QueryMetadata>,
}

impl QueryResponse {
    /// Convert into a page; a missing total falls back to the row count
    #[must_use]
    pub fn into_page(self) -> QueryPage {
        let total_count = self
            .metadata
            .and_then(|m| m.total_count)
            .unwrap_or(self.data.len() as u64);
        QueryPage {
            rows: self.data,
            total_count,
        }
    }
}
