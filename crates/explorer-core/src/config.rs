//! Explorer configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config: {0}")]
    Io(String),

    /// TOML did not parse into a config
    #[error("cannot parse config: {0}")]
    Parse(String),

    /// Values parsed but are inconsistent
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Explorer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Root of the reporting/entity endpoints
    pub base_url: String,
    /// Entity shown on start and restored by breadcrumb "home"
    pub home_entity: String,
    /// Rows per page on entity selection
    pub default_page_size: u32,
    /// Page sizes the user may pick from
    pub page_size_options: Vec<u32>,
    /// Cap on columns derived from `allowedDimensions`
    pub max_default_columns: usize,
    /// Settling delay before the post-bulk re-query
    pub bulk_refresh_delay_ms: u64,
    /// Server-side limit on rows per bulk job
    pub max_bulk_rows: usize,
    /// Lifetime of a notification before it expires
    pub notification_ttl_ms: u64,
    /// Abort the in-flight query when a newer one starts
    pub cancel_superseded_queries: bool,
    /// Per-request timeout; unset leaves timeouts to the server
    pub request_timeout_secs: Option<u64>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            home_entity: "users_directory".to_string(),
            default_page_size: 25,
            page_size_options: vec![10, 25, 50, 100],
            max_default_columns: 10,
            bulk_refresh_delay_ms: 2000,
            max_bulk_rows: 1000,
            notification_ttl_ms: 6000,
            cancel_superseded_queries: true,
            request_timeout_secs: None,
        }
    }
}

impl ExplorerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.home_entity.trim().is_empty() {
            return Err(ConfigError::Invalid("home_entity is empty".into()));
        }
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid("default_page_size must be positive".into()));
        }
        if self.page_size_options.contains(&0) {
            return Err(ConfigError::Invalid("page sizes must be positive".into()));
        }
        if !self.page_size_options.is_empty()
            && !self.page_size_options.contains(&self.default_page_size)
        {
            return Err(ConfigError::Invalid(format!(
                "default_page_size {} is not one of {:?}",
                self.default_page_size, self.page_size_options
            )));
        }
        if self.max_default_columns == 0 {
            return Err(ConfigError::Invalid("max_default_columns must be positive".into()));
        }
        if self.max_bulk_rows == 0 {
            return Err(ConfigError::Invalid("max_bulk_rows must be positive".into()));
        }
        Ok(())
    }

    /// Is `size` one of the offered page sizes (any size when none are listed)
    #[must_use]
    pub fn allows_page_size(&self, size: u32) -> bool {
        size > 0 && (self.page_size_options.is_empty() || self.page_size_options.contains(&size))
    }

    /// With base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// With home entity
    #[inline]
    #[must_use]
    pub fn with_home_entity(mut self, entity: impl Into<String>) -> Self {
        self.home_entity = entity.into();
        self
    }

    /// With default page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size;
        self
    }

    /// With column cap
    #[inline]
    #[must_use]
    pub fn with_max_default_columns(mut self, cap: usize) -> Self {
        self.max_default_columns = cap;
        self
    }

    /// With bulk settling delay
    #[inline]
    #[must_use]
    pub fn with_bulk_refresh_delay(mut self, delay: Duration) -> Self {
        self.bulk_refresh_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With bulk row limit
    #[inline]
    #[must_use]
    pub fn with_max_bulk_rows(mut self, max: usize) -> Self {
        self.max_bulk_rows = max;
        self
    }

    /// With notification lifetime
    #[inline]
    #[must_use]
    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With abort-on-supersede toggled
    #[inline]
    #[must_use]
    pub fn with_cancel_superseded(mut self, cancel: bool) -> Self {
        self.cancel_superseded_queries = cancel;
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, secs: Option<u64>) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Settling delay before the post-bulk refresh
    #[inline]
    #[must_use]
    pub fn bulk_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.bulk_refresh_delay_ms)
    }

    /// Notification lifetime
    #[inline]
    #[must_use]
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }

    /// Request timeout, if any
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
