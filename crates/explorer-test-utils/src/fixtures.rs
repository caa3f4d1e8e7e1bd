//! Entity specs and datasets shared by the test suites

use crate::backend::InMemoryBackend;
use explorer_model::{DrilldownSpec, EntitySpec, Field, FieldType, Patch, Row};
use serde_json::{json, Value};

pub const USERS: &str = "users_directory";
pub const DEPARTMENTS: &str = "departments";
pub const DEPARTMENT_NAMES: [&str; 3] = ["Engineering", "Sales", "Support"];

/// Users directory: `status` is the only writable field
pub fn users_spec() -> EntitySpec {
    EntitySpec::new(
        USERS,
        vec![
            Field::new("id", FieldType::Number).with_label("ID").queryable(),
            Field::new("name", FieldType::Text).queryable(),
            Field::new("email", FieldType::Text).with_label("Email"),
            Field::new("department", FieldType::Text).queryable(),
            Field::new("status", FieldType::Text).queryable().editable(),
            Field::new("salary", FieldType::Number).queryable(),
            Field::new("created_at", FieldType::Timestamp).queryable(),
            Field::new("password_hash", FieldType::Text).sensitive(),
        ],
    )
    .with_dimensions(["department", "status", "created_at", "name", "salary"])
    .with_editable_fields(["status"])
    .with_default_columns(["id", "name", "email", "department", "status", "created_at"])
    .with_drilldown(DrilldownSpec {
        name: "department".into(),
        target_entity: DEPARTMENTS.into(),
        field_mapping: [("department".to_string(), "name".to_string())].into(),
    })
}

pub fn departments_spec() -> EntitySpec {
    EntitySpec::new(
        DEPARTMENTS,
        vec![
            Field::new("id", FieldType::Number).queryable(),
            Field::new("name", FieldType::Text).queryable(),
            Field::new("head_count", FieldType::Number),
        ],
    )
    .with_dimensions(["name", "head_count"])
    .with_drilldown(DrilldownSpec {
        name: "members".into(),
        target_entity: USERS.into(),
        field_mapping: [("name".to_string(), "department".to_string())].into(),
    })
}

/// Minimal spec with an editable `status` and a read-only `id`
pub fn status_spec(entity: &str) -> EntitySpec {
    EntitySpec::new(
        entity,
        vec![
            Field::new("id", FieldType::Number).with_label("ID"),
            Field::new("status", FieldType::Text).with_label("Status").editable(),
        ],
    )
    .with_editable_fields(["status"])
    .with_default_columns(["id", "status"])
}

pub fn status_row(id: u64, version: u64, status: &str) -> Row {
    Row::new(id, version).with_value("status", status)
}

/// `count` users with ids `1..=count`, all at version 1
pub fn user_rows(count: u64) -> Vec<Row> {
    (1..=count)
        .map(|i| {
            let dept = DEPARTMENT_NAMES[(i % 3) as usize];
            Row::new(i, 1)
                .with_value("name", format!("User {i:02}"))
                .with_value("email", format!("user{i}@example.com"))
                .with_value("department", dept)
                .with_value("status", if i % 4 == 0 { "INACTIVE" } else { "ACTIVE" })
                .with_value("salary", 50_000 + i * 1_000)
                .with_value("created_at", format!("2024-01-{:02}T09:30:00Z", (i % 28) + 1))
                .with_value("password_hash", "$argon2id$redacted")
        })
        .collect()
}

pub fn department_rows() -> Vec<Row> {
    DEPARTMENT_NAMES
        .iter()
        .zip(1u64..)
        .map(|(name, id)| {
            Row::new(id, 1)
                .with_value("name", *name)
                .with_value("head_count", 20)
        })
        .collect()
}

/// Mock server holding 60 users and the departments table
pub fn users_backend() -> InMemoryBackend {
    InMemoryBackend::new()
        .with_entity(users_spec(), user_rows(60))
        .with_entity(departments_spec(), department_rows())
}

pub fn patch_of(field: &str, value: Value) -> Patch {
    let mut patch = Patch::new();
    patch.insert(field.to_string(), value);
    patch
}

pub fn status_patch(status: &str) -> Patch {
    patch_of("status", json!(status))
}
