//! reqwest-backed transport
//!
//! Every request carries the JSON-encoded credential pair in the
//! `auth-token` header. Transient failures (connect errors, timeouts) are
//! retried with linear backoff up to the configured budget; application
//! level statuses are never retried.

use crate::transport::{
    ApiRequest, ApiResponse, Downloaded, RequestBody, Transport, compose_url, ensure_success,
    status_error,
};
use async_trait::async_trait;
use popstore_common::config::{ClientConfig, TransportConfig};
use popstore_common::{Error, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::future::Future;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Header carrying the credential pair
pub const AUTH_HEADER: &str = "auth-token";

/// Transport over HTTP(S) using a pooled reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    config: TransportConfig,
}

impl HttpTransport {
    /// Create a transport for the configured endpoint and credentials
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut token = HeaderValue::from_str(&config.credentials.header_value())
            .map_err(|e| Error::configuration(format!("invalid credentials: {e}")))?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(HeaderName::from_static(AUTH_HEADER), token);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.transport.connect_timeout())
            .read_timeout(config.transport.request_timeout())
            .danger_accept_invalid_certs(!config.transport.verify_tls)
            .build()
            .map_err(|e| Error::configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim().to_string(),
            config: config.transport.clone(),
        })
    }

    /// Absolute URL for a request path
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        compose_url(&self.endpoint, path)
    }

    fn build(&self, request: &ApiRequest) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(request.method.clone(), self.url_for(&request.path));
        match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Raw(bytes) => builder
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(bytes.clone()),
        }
    }

    /// Run `attempt` until it succeeds, fails permanently, or the retry
    /// budget is spent.
    async fn with_retry<T, F, Fut>(&self, request: &ApiRequest, attempt: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, reqwest::Error>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    // A POST may only be repeated if it never reached the server.
                    let repeatable = request.is_idempotent() || err.is_connect();
                    let error = map_reqwest_error(&err);
                    if !error.is_retryable() || !repeatable || retries >= self.config.max_retries
                    {
                        warn!(
                            method = %request.method,
                            path = %request.path,
                            retries,
                            "request failed: {}",
                            error
                        );
                        return Err(error);
                    }
                    retries += 1;
                    let delay = self.config.backoff(retries);
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        retry = retries,
                        "transient transport failure ({}), retrying in {:?}",
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn map_reqwest_error(err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else if err.is_builder() {
        Error::invalid_argument(err.to_string())
    } else {
        Error::Connection(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        debug!(method = %request.method, path = %request.path, "sending request");
        let (status, body) = self
            .with_retry(&request, || async {
                let response = self.build(&request).send().await?;
                let status = response.status().as_u16();
                let body = response.bytes().await?;
                Ok::<_, reqwest::Error>((status, body))
            })
            .await?;
        debug!(method = %request.method, path = %request.path, status, "received response");
        ensure_success(status, body)
    }

    async fn download(
        &self,
        request: ApiRequest,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<Downloaded> {
        debug!(method = %request.method, path = %request.path, "starting download");
        let mut response = self
            .with_retry(&request, || self.build(&request).send())
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| map_reqwest_error(&e))?;
            return Err(status_error(status, &body));
        }

        let mut bytes = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| map_reqwest_error(&e))? {
            sink.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        sink.flush().await?;

        debug!(path = %request.path, status, bytes, "download complete");
        Ok(Downloaded { status, bytes })
    }
}
