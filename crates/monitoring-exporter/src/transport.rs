// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP delivery of encoded payloads.
//!
//! One POST per payload. The outcome is either success (2xx) or a [`DeliveryError`]; the
//! transport never decides whether a failure is worth retrying, that is left to the queue
//! driver.

use crate::config::ExporterConfig;
use crate::errors::{ConfigurationError, DeliveryError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

/// Bytes of a failed response body kept for error reporting.
pub const MAX_BODY_EXCERPT: usize = 4096;

/// Sends one body to one URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(
        &self,
        url: &str,
        body: Bytes,
        extra_headers: &HeaderMap,
    ) -> Result<(), DeliveryError>;
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &ExporterConfig) -> Result<Self, ConfigurationError> {
        let headers = default_headers(config)?;
        let client = build_client(config.https_proxy.as_deref(), config.effective_timeout())
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;
        Ok(Self { client, headers })
    }

    /// Headers sent with every request, before per-call additions.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn create_request(
        &self,
        url: &str,
        body: Bytes,
        extra_headers: &HeaderMap,
    ) -> reqwest::RequestBuilder {
        let mut headers = self.headers.clone();
        for (name, value) in extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        self.client.post(url).headers(headers).body(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(
        &self,
        url: &str,
        body: Bytes,
        extra_headers: &HeaderMap,
    ) -> Result<(), DeliveryError> {
        let request = self.create_request(url, body, extra_headers);
        let time = std::time::Instant::now();
        let response = request.send().await.map_err(|e| DeliveryError::Transport {
            timeout: e.is_timeout(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(
                "Delivered to {} with status {} in {} ms",
                url,
                status.as_u16(),
                time.elapsed().as_millis()
            );
            return Ok(());
        }

        Err(DeliveryError::HttpStatus {
            status: status.as_u16(),
            body: read_excerpt(response).await,
        })
    }
}

/// JSON defaults overridden by the configured headers.
fn default_headers(config: &ExporterConfig) -> Result<HeaderMap, ConfigurationError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    for (name, value) in &config.header_map()? {
        headers.insert(name.clone(), value.clone());
    }
    Ok(headers)
}

pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout);
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}

/// Reads at most [`MAX_BODY_EXCERPT`] bytes of the response body.
async fn read_excerpt(mut response: reqwest::Response) -> String {
    let mut excerpt = Vec::new();
    while excerpt.len() < MAX_BODY_EXCERPT {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(MAX_BODY_EXCERPT - excerpt.len());
                excerpt.extend_from_slice(&chunk[..take]);
            }
            Ok(None) | Err(_) => break,
        }
    }
    String::from_utf8_lossy(&excerpt).into_owned()
}
