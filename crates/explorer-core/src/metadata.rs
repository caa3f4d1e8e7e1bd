//! Entity metadata resolution
//!
//! Fetches the metadata of one entity and normalizes it so downstream code can
//! trust it: labels present, writable set consistent with field flags,
//! dimensions naming real fields, sensitive fields flagged.

use crate::error::{ExplorerError, Result};
use explorer_client::ExplorerBackend;
use explorer_model::EntitySpec;
use std::collections::HashSet;
use std::sync::Arc;

/// Name fragments that mark a field as sensitive regardless of its flag
const SENSITIVE_MARKERS: [&str; 4] = ["password", "secret", "token", "credential"];

/// Resolves entity specs through the backend
pub struct MetadataResolver<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ExplorerBackend + ?Sized> MetadataResolver<B> {
    /// Create a resolver
    #[inline]
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Fetch and normalize the metadata of `entity`.
    ///
    /// Any transport failure, non-success status or malformed document maps
    /// to [`ExplorerError::MetadataUnavailable`].
    pub async fn resolve(&self, entity: &str) -> Result<EntitySpec> {
        tracing::debug!("Resolving metadata for {}", entity);

        let raw = self.backend.fetch_spec(entity).await.map_err(|e| {
            tracing::error!("Metadata fetch for {} failed: {}", entity, e);
            ExplorerError::metadata(entity, &e)
        })?;

        let spec = normalize(entity, raw)?;
        tracing::info!(
            "Resolved {} ({} fields, {} editable)",
            entity,
            spec.fields.len(),
            spec.editable_fields.len()
        );
        Ok(spec)
    }
}

/// Normalize a fetched spec; an empty field list is malformed
pub fn normalize(entity: &str, mut spec: EntitySpec) -> Result<EntitySpec> {
    if spec.fields.is_empty() {
        return Err(ExplorerError::MetadataUnavailable {
            entity: entity.to_string(),
            reason: "spec has no fields".to_string(),
        });
    }
    if spec.entity_name.is_empty() {
        spec.entity_name = entity.to_string();
    }

    let mut seen = HashSet::new();
    spec.fields.retain(|f| !f.name.is_empty() && seen.insert(f.name.clone()));

    for field in &mut spec.fields {
        if field.label.trim().is_empty() {
            field.label = format_label(&field.name);
        }
        if is_sensitive_name(&field.name) {
            field.sensitive = true;
        }
        // Sensitive fields are never writable from the grid
        if field.sensitive {
            field.editable = false;
        }
    }

    let writable: HashSet<&str> = spec
        .fields
        .iter()
        .filter(|f| f.editable)
        .map(|f| f.name.as_str())
        .collect();
    let dropped: Vec<String> = spec
        .editable_fields
        .iter()
        .filter(|name| !writable.contains(name.as_str()))
        .cloned()
        .collect();
    if !dropped.is_empty() {
        tracing::warn!(
            "{}: editableFields {:?} are not editable fields, ignoring",
            entity,
            dropped
        );
    }
    spec.editable_fields
        .retain(|name| writable.contains(name.as_str()));

    let known: HashSet<&str> = spec.fields.iter().map(|f| f.name.as_str()).collect();
    spec.allowed_dimensions
        .retain(|name| known.contains(name.as_str()));
    spec.allowed_measures
        .retain(|name| known.contains(name.as_str()));

    if spec
        .default_view
        .columns
        .as_ref()
        .is_some_and(Vec::is_empty)
    {
        spec.default_view.columns = None;
    }

    Ok(spec)
}

/// Human label for a field name: `user_id` → `User Id`, `firstName` → `First Name`
#[must_use]
pub fn format_label(name: &str) -> String {
    let mut spaced = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '_' {
            spaced.push(' ');
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            spaced.push(' ');
        }
        prev_lower = c.is_lowercase();
        spaced.push(c);
    }

    spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_sensitive_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_MARKERS.iter().any(|m| lower.contains(m))
}
