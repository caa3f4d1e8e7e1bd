//! HTTP backend
//!
//! JSON over HTTP against the reporting/entity endpoints. No client-side
//! timeout is applied unless one is configured explicitly; the remote
//! service owns timeout policy.

use crate::error::BackendError;
use crate::{ExplorerBackend, Result};
use async_trait::async_trait;
use explorer_model::{
    BulkAck, BulkJob, BulkJobStatus, EntitySpec, JobId, Patch, QueryPage, QueryRequest,
    QueryResponse, Row, RowId,
};
use reqwest::header::{ACCEPT, IF_MATCH};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use urlencoding::encode;

/// Maximum length of a non-JSON error body carried into a message
const MAX_ERROR_BODY: usize = 200;

/// reqwest-backed [`ExplorerBackend`]
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a backend rooted at `base_url` (e.g. `https://host/api`)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, None)
    }

    /// Create a backend with an explicit per-request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(BackendError::Config(format!(
                "base url must be http(s): {base_url}"
            )));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Root all paths are resolved against
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/entities/{entity}/{id}` with both segments percent-encoded
    fn row_url(&self, entity: &str, id: &RowId) -> String {
        self.url(&format!("/entities/{}/{}", encode(entity), encode(id.as_str())))
    }

    /// Turn a non-success response into an error, keeping the server message
    async fn failure(response: Response) -> BackendError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body);

        if status == StatusCode::CONFLICT || status == StatusCode::PRECONDITION_FAILED {
            BackendError::Conflict { message }
        } else {
            BackendError::status(status.as_u16(), message)
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ExplorerBackend for HttpBackend {
    async fn fetch_spec(&self, entity: &str) -> Result<EntitySpec> {
        let url = self.url(&format!("/metadata/{}/spec", encode(entity)));
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        let url = self.url("/query");
        tracing::debug!(
            "POST {} entity={} limit={} offset={}",
            url,
            request.entity,
            request.limit,
            request.offset
        );

        let response = self.http.post(&url).json(request).send().await?;
        if let Some(cache) = response.headers().get("x-cache") {
            tracing::trace!("query cache status: {:?}", cache);
        }
        let body: QueryResponse = Self::read_json(response).await?;
        Ok(body.into_page())
    }

    async fn patch_entity(
        &self,
        entity: &str,
        id: &RowId,
        patch: &Patch,
        expected_version: u64,
    ) -> Result<Option<Row>> {
        let url = self.row_url(entity, id);
        tracing::debug!("PATCH {} If-Match={}", url, expected_version);

        let response = self
            .http
            .patch(&url)
            .header(IF_MATCH, expected_version.to_string())
            .json(patch)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(&body)?;
        Ok(serde_json::from_value::<Row>(value).ok())
    }

    async fn bulk_update(&self, entity: &str, job: &BulkJob) -> Result<BulkAck> {
        let url = self.url(&format!("/entities/{}/bulk-update", encode(entity)));
        tracing::debug!(
            "POST {} rows={} key={}",
            url,
            job.selection.len(),
            job.idempotency_key
        );

        let response = self.http.post(&url).json(&job.to_request()).send().await?;
        Self::read_json(response).await
    }

    async fn job_status(&self, job_id: &JobId) -> Result<BulkJobStatus> {
        let url = self.url(&format!("/bulk-jobs/{}", encode(job_id.as_str())));
        let response = self.http.get(&url).send().await?;
        Self::read_json(response).await
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        let url = self.url(&format!(
            "/bulk-jobs/{}/cancel",
            encode(job_id.as_str())
        ));
        let response = self.http.post(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::failure(response).await)
        }
    }
}

/// Pull a human readable message out of an error body.
///
/// JSON bodies contribute their `message` (or `error`) member; short plain
/// text bodies are used verbatim.
fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string),
        Ok(_) => None,
        Err(_) => Some(trimmed.chars().take(MAX_ERROR_BODY).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_segments_are_encoded() {
        let backend = HttpBackend::new("http://localhost:8080").unwrap();
        assert_eq!(
            backend.row_url("users_directory", &RowId::from(7u64)),
            "http://localhost:8080/entities/users_directory/7"
        );
        assert_eq!(
            backend.row_url("audit log", &RowId::from("a/b é")),
            "http://localhost:8080/entities/audit%20log/a%2Fb%20%C3%A9"
        );
    }

    #[test]
    fn messages_are_extracted() {
        assert_eq!(
            extract_message(r#"{"message": "Record was modified"}"#).as_deref(),
            Some("Record was modified")
        );
        assert_eq!(
            extract_message(r#"{"error": "Bad Request"}"#).as_deref(),
            Some("Bad Request")
        );
        assert_eq!(extract_message(r#"{"status": 500}"#), None);
        assert_eq!(extract_message("   "), None);
        assert_eq!(extract_message("gateway down").as_deref(), Some("gateway down"));
    }

    #[test]
    fn base_url_is_validated_and_trimmed() {
        assert!(HttpBackend::new("ftp://example").is_err());
        let backend = HttpBackend::new("http://localhost:8080/api/").unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8080/api");
        assert_eq!(backend.url("/query"), "http://localhost:8080/api/query");
    }
}
