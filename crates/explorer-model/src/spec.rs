//! Entity metadata
//!
//! Describes one entity type as published by the metadata endpoint:
//! - Ordered field list with per-field capabilities
//! - Grouping dimensions and measures
//! - The caller's editable subset
//! - Default view and drill-down definitions

use crate::query::SortDirection;
use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Closed display type of a field.
///
/// The metadata service publishes free-form type names (`long`, `decimal`,
/// `date`, ...). They are folded into this tag once, at deserialization time,
/// so rendering never inspects raw type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldType {
    /// Anything without a dedicated rendering
    #[default]
    Text,
    /// Integer and decimal types
    Number,
    /// True/false
    Boolean,
    /// Dates and date-times
    Timestamp,
}

impl FieldType {
    /// Map a raw server type name onto the closed tag
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" | "long" | "double" | "float" | "decimal" | "number" => Self::Number,
            "boolean" | "bool" => Self::Boolean,
            "timestamp" | "date" | "datetime" => Self::Timestamp,
            _ => Self::Text,
        }
    }

    /// Canonical wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_raw(&raw))
    }
}

/// One field of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Field name, unique within the entity
    pub name: String,
    /// Display type
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// Human readable label (may be empty on the wire)
    #[serde(default)]
    pub label: String,
    /// Server accepts sorting on this field
    #[serde(default)]
    pub sortable: bool,
    /// Server accepts filtering on this field
    #[serde(default)]
    pub filterable: bool,
    /// Field is writable in principle
    #[serde(default)]
    pub editable: bool,
    /// Field carries secrets and must never be rendered or exported
    #[serde(default)]
    pub sensitive: bool,
}

impl Field {
    /// Create a plain text field with all capabilities off
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            label: String::new(),
            sortable: false,
            filterable: false,
            editable: false,
            sensitive: false,
        }
    }

    /// With label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Mark sortable and filterable
    #[must_use]
    pub fn queryable(mut self) -> Self {
        self.sortable = true;
        self.filterable = true;
        self
    }

    /// Mark editable
    #[must_use]
    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    /// Mark sensitive
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Default presentation of an entity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultView {
    /// Columns shown by default, in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Initial sort field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    /// Initial sort direction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortDirection>,
}

/// Navigation from a row of this entity to a related entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrilldownSpec {
    /// Display name, e.g. "View Tenant"
    pub name: String,
    /// Entity shown after the drill-down
    pub target_entity: String,
    /// Source field -> target filter field
    #[serde(default)]
    pub field_mapping: BTreeMap<String, String>,
}

/// Schema describing one entity type
///
/// Immutable for the lifetime of an entity selection; replaced wholesale when
/// the active entity changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySpec {
    /// Entity identifier
    #[serde(default)]
    pub entity_name: String,
    /// Schema checksum published by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_version: Option<String>,
    /// Ordered field list (required on the wire)
    pub fields: Vec<Field>,
    /// Fields usable for grouping, in source order
    #[serde(default)]
    pub allowed_dimensions: IndexSet<String>,
    /// Fields usable as aggregation inputs
    #[serde(default)]
    pub allowed_measures: IndexSet<String>,
    /// Fields the current caller may mutate
    #[serde(default)]
    pub editable_fields: IndexSet<String>,
    /// Default presentation
    #[serde(default)]
    pub default_view: DefaultView,
    /// Drill-down definitions
    #[serde(default)]
    pub drilldowns: Vec<DrilldownSpec>,
}

impl EntitySpec {
    /// Create a spec with the given fields and nothing else
    #[must_use]
    pub fn new(entity_name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            entity_name: entity_name.into(),
            spec_version: None,
            fields,
            allowed_dimensions: IndexSet::new(),
            allowed_measures: IndexSet::new(),
            editable_fields: IndexSet::new(),
            default_view: DefaultView::default(),
            drilldowns: Vec::new(),
        }
    }

    /// With grouping dimensions
    #[must_use]
    pub fn with_dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    /// With the caller's editable subset
    #[must_use]
    pub fn with_editable_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.editable_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// With default view columns
    #[must_use]
    pub fn with_default_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_view.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// With a drill-down definition
    #[must_use]
    pub fn with_drilldown(mut self, drilldown: DrilldownSpec) -> Self {
        self.drilldowns.push(drilldown);
        self
    }

    /// Look up a field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether the caller may write `name`: the field is flagged editable
    /// and present in `editable_fields`.
    #[must_use]
    pub fn is_writable(&self, name: &str) -> bool {
        self.editable_fields.contains(name) && self.field(name).is_some_and(|f| f.editable)
    }

    /// Look up a drill-down definition by name
    #[must_use]
    pub fn drilldown(&self, name: &str) -> Option<&DrilldownSpec> {
        self.drilldowns.iter().find(|d| d.name == name)
    }
}
