//! HTTP transport used for direct communication with providers.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ConsumerResult;

/// An HTTP answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// URL that produced the answer, after redirects.
    pub final_url: String,

    /// Status code.
    pub status: u16,

    /// Response headers, names lowercased.
    pub headers: Vec<(String, String)>,

    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response without headers.
    #[must_use]
    pub fn new(final_url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            final_url: final_url.into(),
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Returns whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// HTTP transport.
///
/// Transport failures are errors; non-2xx answers are not.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Fetches a URL.
    async fn get(&self, url: &str) -> ConsumerResult<HttpResponse>;

    /// Posts an `application/x-www-form-urlencoded` body.
    async fn post(&self, url: &str, body: String) -> ConsumerResult<HttpResponse>;
}

/// [`HttpFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Creates a fetcher whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> ConsumerResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn read_response(response: reqwest::Response) -> ConsumerResult<HttpResponse> {
        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;
        Ok(HttpResponse {
            final_url,
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> ConsumerResult<HttpResponse> {
        tracing::debug!(url, "GET");
        let response = self.client.get(url).send().await?;
        Self::read_response(response).await
    }

    async fn post(&self, url: &str, body: String) -> ConsumerResult<HttpResponse> {
        tracing::debug!(url, "POST");
        let response = self
            .client
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;
        Self::read_response(response).await
    }
}
