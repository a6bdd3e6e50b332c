use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::ingest::FeedSource;

/// Fixed per-request budget covering connect, headers, and body.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest feed document accepted, in bytes.
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connect, TLS, or a dropped body stream
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Server answered with status {0}")]
    HttpStatus(u16),
    #[error("No complete response within {0:?}")]
    Timeout(Duration),
    #[error("Feed body exceeds {limit} bytes")]
    TooLarge { limit: u64 },
    /// Connection closed before Content-Length bytes arrived
    #[error("Feed body truncated: got {received} of {expected} bytes")]
    Truncated { expected: u64, received: u64 },
}

/// Retrieves raw feed bytes over HTTP with a fixed timeout and no retries.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gleaner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, timeout))
    }

    /// Reuse an existing client (connection pool) with a custom timeout.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_inner(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        // Non-2xx is a fetch failure, not something to hand to the parser
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        collect_body(response, MAX_BODY_BYTES).await
    }
}

#[async_trait]
impl FeedSource for HttpFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tokio::time::timeout(self.timeout, self.fetch_inner(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }
}

/// Drain the body, refusing anything past `limit` bytes.
async fn collect_body(mut response: reqwest::Response, limit: u64) -> Result<Vec<u8>, FetchError> {
    let declared = response.content_length();
    if declared.is_some_and(|len| len > limit) {
        return Err(FetchError::TooLarge { limit });
    }

    let mut body = Vec::with_capacity(declared.unwrap_or(0) as usize);
    while let Some(chunk) = response.chunk().await? {
        if (body.len() + chunk.len()) as u64 > limit {
            return Err(FetchError::TooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }

    let received = body.len() as u64;
    match declared {
        Some(expected) if received < expected => Err(FetchError::Truncated { expected, received }),
        _ => Ok(body),
    }
}
