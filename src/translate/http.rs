//! Backend transport over HTTP.
//!
//! Every operation is a POST to the endpoint root, named by the target header
//! (`<api_version>.<operation>`) with the API's JSON content type.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;

use crate::config::{BackendConfig, CompatConfig};
use crate::translate::{BackendReply, TranslateError, Translator};

/// Content type the remote API expects.
pub const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Translator that calls a real (or local emulated) database endpoint.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
    target_header: String,
    api_version: String,
}

impl HttpTranslator {
    pub fn new(backend: &BackendConfig, compat: &CompatConfig) -> Result<Self, TranslateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(backend.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: backend.endpoint.clone(),
            target_header: compat.target_header.clone(),
            api_version: compat.api_version.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn issue(&self, request: Bytes, operation: &str) -> Result<BackendReply, TranslateError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            operation = %operation,
            bytes = request.len(),
            "Calling backend"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(
                self.target_header.as_str(),
                format!("{}.{}", self.api_version, operation),
            )
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(request)
            .send()
            .await?;

        // reqwest and axum may sit on different `http` versions.
        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|err| TranslateError::Unavailable(err.to_string()))?;
        let body = response.bytes().await?;

        Ok(BackendReply { body, status })
    }
}
