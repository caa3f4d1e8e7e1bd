//! CSV export of the materialized rows

use crate::columns::ColumnDef;
use crate::error::{ExplorerError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use explorer_model::Row;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Render rows as CSV: a header of column labels, then one record per row.
///
/// Values are raw, not display-formatted. Fields containing the delimiter,
/// a quote or a line break are quoted with inner quotes doubled.
pub fn serialize(rows: &[Row], columns: &[ColumnDef]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(columns.iter().map(|c| c.label.as_str()))?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| raw_value(row, &c.field)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExplorerError::ExportFailure(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExplorerError::ExportFailure(e.to_string()))
}

fn raw_value(row: &Row, field: &str) -> String {
    if field == "id" {
        return row.id().to_string();
    }
    match row.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// `{entity}_export_{timestamp}.csv` with an ISO-8601 UTC timestamp
#[must_use]
pub fn export_filename(entity: &str, now: DateTime<Utc>) -> String {
    format!(
        "{entity}_export_{}.csv",
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Write `contents` as the export file for `entity` under `dir`
pub async fn write_export(dir: &Path, entity: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(export_filename(entity, Utc::now()));
    tokio::fs::write(&path, contents).await?;
    tracing::info!("Exported {} to {}", entity, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ValueFormatter;
    use chrono::TimeZone;
    use explorer_model::FieldType;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn column(field: &str, label: &str) -> ColumnDef {
        ColumnDef {
            field: field.into(),
            label: label.into(),
            field_type: FieldType::Text,
            sortable: false,
            filterable: false,
            editable: false,
            formatter: ValueFormatter::PlainText,
        }
    }

    #[test]
    fn quoting_and_raw_values() {
        let columns = vec![column("id", "ID"), column("name", "Name"), column("salary", "Salary")];
        let rows = vec![
            Row::new(1u64, 1)
                .with_value("name", "Doe, Jane")
                .with_value("salary", 1234567),
            Row::new(2u64, 1).with_value("name", "say \"hi\""),
        ];

        assert_eq!(
            serialize(&rows, &columns).unwrap(),
            "ID,Name,Salary\n1,\"Doe, Jane\",1234567\n2,\"say \"\"hi\"\"\",\n"
        );
    }

    #[test]
    fn nested_values_are_compact_json() {
        let columns = vec![column("tags", "Tags"), column("active", "Active")];
        let rows = vec![Row::new(1u64, 1)
            .with_value("tags", json!(["a", "b"]))
            .with_value("active", true)];

        assert_eq!(
            serialize(&rows, &columns).unwrap(),
            "Tags,Active\n\"[\"\"a\"\",\"\"b\"\"]\",true\n"
        );
    }

    #[test]
    fn empty_set_is_header_only() {
        assert_eq!(serialize(&[], &[column("id", "ID")]).unwrap(), "ID\n");
    }

    #[test]
    fn filename() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(
            export_filename("users_directory", now),
            "users_directory_export_2024-03-01T10:00:00.000Z.csv"
        );
    }

    fn cell() -> impl Strategy<Value = Option<String>> {
        proptest::option::of("[a-zA-Z0-9 ,\"'\n\réü日本]{0,16}")
    }

    proptest! {
        #[test]
        fn any_row_set_survives_a_csv_reader(
            cells in proptest::collection::vec((cell(), cell()), 0..20)
        ) {
            let columns = vec![column("id", "ID"), column("name", "Name, full"), column("note", "Note")];
            let rows: Vec<Row> = cells
                .iter()
                .enumerate()
                .map(|(i, (name, note))| {
                    let mut row = Row::new(i as u64, 1);
                    if let Some(name) = name {
                        row = row.with_value("name", name.as_str());
                    }
                    if let Some(note) = note {
                        row = row.with_value("note", note.as_str());
                    }
                    row
                })
                .collect();

            let text = serialize(&rows, &columns).unwrap();
            let mut reader = csv::Reader::from_reader(text.as_bytes());
            let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
            prop_assert_eq!(headers, ["ID", "Name, full", "Note"]);

            let records: Vec<Vec<String>> = reader
                .records()
                .map(|r| r.unwrap().iter().map(str::to_string).collect())
                .collect();
            let expected: Vec<Vec<String>> = cells
                .into_iter()
                .enumerate()
                .map(|(i, (name, note))| {
                    vec![i.to_string(), name.unwrap_or_default(), note.unwrap_or_default()]
                })
                .collect();
            prop_assert_eq!(records, expected);
        }
    }
}
