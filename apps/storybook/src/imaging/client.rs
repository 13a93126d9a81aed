//! Visual generation API client — the only module that talks to the image service.
//!
//! Every submission is signed with `RequestSigner` over the exact bytes sent.
//! Calls are single attempts; `PageGenerator` wraps them in `RetryPolicy`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::errors::{classify_status, BookError};
use crate::signing::RequestSigner;

const ACTION: &str = "CVProcess";
const VERSION: &str = "2022-08-31";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Envelope code the service uses for success.
pub const SUCCESS_CODE: i64 = 10000;

/// `{code, message, data: {binary_data_base64, image_urls}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ImageEnvelope {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<ImageData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub binary_data_base64: Option<Vec<String>>,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
}

impl ImageEnvelope {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    pub fn first_inline_image(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.binary_data_base64.as_ref())
            .and_then(|v| v.iter().find(|s| !s.is_empty()))
            .map(String::as_str)
    }

    pub fn first_image_url(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.image_urls.as_ref())
            .and_then(|v| v.iter().find(|s| !s.is_empty()))
            .map(String::as_str)
    }
}

/// Transport for image generation. Swap for a fake in tests.
#[async_trait]
pub trait ImageClient: Send + Sync {
    /// Submits one generation request body and returns the decoded envelope.
    async fn submit(&self, body: &serde_json::Value) -> Result<ImageEnvelope, BookError>;

    /// Fetches a generated image by URL.
    async fn download(&self, url: &str) -> Result<Bytes, BookError>;
}

pub struct VisualApiClient {
    client: Client,
    signer: RequestSigner,
    endpoint: Url,
}

impl VisualApiClient {
    /// `signer` must have been built for the endpoint's host.
    pub fn new(endpoint: &str, signer: RequestSigner) -> Result<Self, BookError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| BookError::Configuration(format!("VOLC_ENDPOINT is not a URL: {e}")))?;
        if endpoint.host_str() != Some(signer.host()) {
            return Err(BookError::Configuration(format!(
                "signer host {} does not match endpoint {endpoint}",
                signer.host()
            )));
        }
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BookError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            signer,
            endpoint,
        })
    }

    /// Host component of an endpoint URL, used to build the matching signer.
    pub fn host_of(endpoint: &str) -> Result<String, BookError> {
        Url::parse(endpoint)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| {
                BookError::Configuration(format!("VOLC_ENDPOINT {endpoint:?} has no host"))
            })
    }
}

#[async_trait]
impl ImageClient for VisualApiClient {
    async fn submit(&self, body: &serde_json::Value) -> Result<ImageEnvelope, BookError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| BookError::Validation(format!("request body is not serializable: {e}")))?;
        let query = [("Action", ACTION), ("Version", VERSION)];
        let path = match self.endpoint.path() {
            "" => "/",
            p => p,
        };
        let signed = self.signer.sign("POST", path, &query, &payload, Utc::now());

        let mut request = self.client.post(self.endpoint.clone()).query(&query);
        for (name, value) in &signed.headers {
            request = request.header(*name, value);
        }

        let response = request.body(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let text = response.text().await?;
        debug!("Visual API raw response: {} bytes", text.len());
        serde_json::from_str::<ImageEnvelope>(&text)
            .map_err(|e| BookError::MalformedResponse(format!("visual API response: {e}")))
    }

    async fn download(&self, url: &str) -> Result<Bytes, BookError> {
        let response = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }
        Ok(response.bytes().await?)
    }
}
