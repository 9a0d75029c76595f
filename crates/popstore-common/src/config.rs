//! Client configuration
//!
//! The configuration is an immutable value handed to the client at
//! construction. It can be built in code or layered from a config file
//! and `POPSTORE_*` environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "POPSTORE";

/// Root configuration for the popstore client
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service endpoint, e.g. `https://store.example.com`
    pub endpoint: String,
    /// Credential pair sent with every request
    pub credentials: Credentials,
    /// Transport timeouts and retry budget
    #[serde(default)]
    pub transport: TransportConfig,
    /// Multipart upload settings
    #[serde(default)]
    pub upload: UploadConfig,
}

impl ClientConfig {
    /// Create a configuration with default transport and upload settings
    pub fn new(
        endpoint: impl Into<String>,
        access_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials: Credentials::new(access_id, secret_key),
            transport: TransportConfig::default(),
            upload: UploadConfig::default(),
        }
    }

    /// Load configuration from an optional file layered under the environment.
    ///
    /// The file format is inferred from its extension (TOML, YAML, JSON).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::configuration(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(::config::File::from(path));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| Error::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the transport configuration
    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Set the number of part uploads allowed in flight
    #[must_use]
    pub fn with_part_concurrency(mut self, concurrency: usize) -> Self {
        self.upload.part_concurrency = concurrency;
        self
    }

    /// Check the configuration for values the client cannot work with
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::configuration("endpoint must not be empty"));
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(Error::configuration(format!(
                "endpoint must use http or https: {endpoint}"
            )));
        }
        if self.upload.part_concurrency == 0 {
            return Err(Error::configuration(
                "upload.part_concurrency must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Credential pair (identifier + secret)
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_id: String,
    pub secret_key: String,
}

impl Credentials {
    /// Create a credential pair
    pub fn new(access_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_id: access_id.into(),
            secret_key: secret_key.into(),
        }
    }

    /// JSON value of the `auth-token` request header
    #[must_use]
    pub fn header_value(&self) -> String {
        serde_json::json!({ "id": self.access_id, "token": self.secret_key }).to_string()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_id", &self.access_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Transport timeouts and retry budget
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connect timeout (milliseconds)
    pub connect_timeout_ms: u64,
    /// Longest wait for the next read on an open request (milliseconds);
    /// a steadily flowing body never hits it
    pub request_timeout_ms: u64,
    /// Extra attempts after a transient transport failure
    pub max_retries: u32,
    /// Delay before the first retry, grown linearly (milliseconds)
    pub retry_backoff_ms: u64,
    /// Verify the server's TLS certificate
    pub verify_tls: bool,
}

impl TransportConfig {
    /// Connect timeout as a duration
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read inactivity window as a duration
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Backoff before retry number `attempt` (1-based)
    #[must_use]
    pub const fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(attempt as u64))
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 10_000,
            max_retries: 3,
            retry_backoff_ms: 200,
            verify_tls: true,
        }
    }
}

/// Multipart upload settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Part uploads allowed in flight at once (1 = strictly sequential)
    pub part_concurrency: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            part_concurrency: 1,
        }
    }
}
