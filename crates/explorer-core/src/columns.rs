//! Column projection
//!
//! Pure derivation of renderable columns from a resolved spec.

use chrono::{DateTime, Local, TimeZone, Utc};
use explorer_model::{EntitySpec, FieldType};
use serde_json::Value;
use std::fmt::Display;

/// How a cell value is rendered for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueFormatter {
    /// Value as-is
    PlainText,
    /// Thousands-grouped number
    GroupedNumber,
    /// Timestamp in local time
    DateTime,
}

impl ValueFormatter {
    /// Formatter for a field type
    #[must_use]
    pub fn for_type(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Number => Self::GroupedNumber,
            FieldType::Timestamp => Self::DateTime,
            FieldType::Boolean | FieldType::Text => Self::PlainText,
        }
    }

    /// Render `value` for display using the local time zone
    #[must_use]
    pub fn format(&self, value: &Value) -> String {
        self.format_in(value, &Local)
    }

    /// Render `value` for display, timestamps shown in `tz`
    pub fn format_in<Tz>(&self, value: &Value, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        match (self, value) {
            (_, Value::Null) => String::new(),
            (Self::GroupedNumber, Value::Number(n)) => group_thousands(&n.to_string()),
            (Self::DateTime, Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
                Ok(ts) => ts.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string(),
                Err(_) => s.clone(),
            },
            (Self::DateTime, Value::Number(n)) => n
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map_or_else(
                    || n.to_string(),
                    |ts| ts.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string(),
                ),
            (_, Value::String(s)) => s.clone(),
            (_, other) => other.to_string(),
        }
    }
}

fn group_thousands(raw: &str) -> String {
    let (sign, rest) = raw.strip_prefix('-').map_or(("", raw), |r| ("-", r));
    let (int, frac) = match rest.find(['.', 'e', 'E']) {
        Some(pos) => rest.split_at(pos),
        None => (rest, ""),
    };

    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}{grouped}{frac}")
}

/// One renderable column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Field name
    pub field: String,
    /// Header label
    pub label: String,
    /// Field type
    pub field_type: FieldType,
    /// Column can be sorted
    pub sortable: bool,
    /// Column can be filtered
    pub filterable: bool,
    /// Cells may be edited by this caller
    pub editable: bool,
    /// Display formatter
    pub formatter: ValueFormatter,
}

/// Projection result plus the dimensions the cap cut off
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnProjection {
    /// Columns to render, in order
    pub columns: Vec<ColumnDef>,
    /// Dimensions dropped by the cap
    pub truncated: Vec<String>,
}

/// Derive columns from a spec; see [`project_with_report`]
#[must_use]
pub fn project(spec: &EntitySpec, cap: usize) -> Vec<ColumnDef> {
    project_with_report(spec, cap).columns
}

/// Derive columns from a spec.
///
/// The default view's columns are used when present. Otherwise the first
/// `cap` allowed dimensions are used, and the ones past the cap are reported.
/// Sensitive fields and names without a field definition are dropped.
#[must_use]
pub fn project_with_report(spec: &EntitySpec, cap: usize) -> ColumnProjection {
    let (source, truncated): (Vec<&String>, Vec<String>) = match &spec.default_view.columns {
        Some(columns) => (columns.iter().collect(), Vec::new()),
        None => {
            let all: Vec<&String> = spec.allowed_dimensions.iter().collect();
            let cut = all.len().min(cap);
            (
                all[..cut].to_vec(),
                all[cut..].iter().map(|s| (*s).clone()).collect(),
            )
        }
    };

    if !truncated.is_empty() {
        tracing::warn!(
            "{}: showing {} of {} dimensions, dropped {:?}",
            spec.entity_name,
            cap,
            cap + truncated.len(),
            truncated
        );
    }

    let columns = source
        .into_iter()
        .filter_map(|name| {
            let Some(field) = spec.field(name) else {
                tracing::debug!("{}: no field definition for column {}", spec.entity_name, name);
                return None;
            };
            if field.sensitive {
                return None;
            }
            Some(ColumnDef {
                field: field.name.clone(),
                label: field.label.clone(),
                field_type: field.field_type,
                sortable: field.sortable,
                filterable: field.filterable,
                editable: field.editable && spec.editable_fields.contains(&field.name),
                formatter: ValueFormatter::for_type(field.field_type),
            })
        })
        .collect();

    ColumnProjection { columns, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use explorer_model::Field;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spec() -> EntitySpec {
        EntitySpec::new(
            "users",
            vec![
                Field::new("id", FieldType::Number).with_label("ID"),
                Field::new("status", FieldType::Text).with_label("Status").editable(),
                Field::new("role", FieldType::Text).with_label("Role").editable(),
                Field::new("secret", FieldType::Text).with_label("Secret").sensitive(),
            ],
        )
        .with_editable_fields(["status"])
    }

    #[test]
    fn default_view_drives_columns() {
        let spec = spec().with_default_columns(["id", "status", "role", "secret", "ghost"]);
        let columns = project(&spec, 10);

        let names: Vec<_> = columns.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(names, vec!["id", "status", "role"]);
        assert!(!columns[0].editable);
        assert!(columns[1].editable);
        // editable flag without membership in editableFields
        assert!(!columns[2].editable);
        assert_eq!(columns[0].formatter, ValueFormatter::GroupedNumber);
    }

    #[test]
    fn dimension_fallback_is_capped() {
        let spec = spec().with_dimensions(["status", "role", "id"]);
        let projection = project_with_report(&spec, 2);

        assert_eq!(projection.columns.len(), 2);
        assert_eq!(projection.columns[0].field, "status");
        assert_eq!(projection.truncated, vec!["id".to_string()]);
    }

    #[test]
    fn number_grouping() {
        let f = ValueFormatter::GroupedNumber;
        assert_eq!(f.format(&json!(1234567)), "1,234,567");
        assert_eq!(f.format(&json!(-1000)), "-1,000");
        assert_eq!(f.format(&json!(999)), "999");
        assert_eq!(f.format(&json!(1234.5)), "1,234.5");
        assert_eq!(f.format(&json!("n/a")), "n/a");
        assert_eq!(f.format(&Value::Null), "");
    }

    #[test]
    fn timestamps_render_in_zone() {
        let f = ValueFormatter::DateTime;
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            f.format_in(&json!("2024-03-01T10:00:00Z"), &plus_two),
            "2024-03-01 12:00:00"
        );
        assert_eq!(f.format_in(&json!(0), &Utc), "1970-01-01 00:00:00");
        assert_eq!(f.format_in(&json!("yesterday"), &Utc), "yesterday");
    }

    #[test]
    fn plain_text() {
        let f = ValueFormatter::for_type(FieldType::Boolean);
        assert_eq!(f.format(&json!(true)), "true");
        assert_eq!(f.format(&json!("ACTIVE")), "ACTIVE");
    }
}
