use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::util::b64;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of decoded subscription payloads.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch and decode `url`. Firing `cancel` abandons the in-flight request.
    async fn fetch_with(&self, url: &str, cancel: &CancellationToken) -> Result<String, SyncError>;

    async fn fetch(&self, url: &str) -> Result<String, SyncError> {
        self.fetch_with(url, &CancellationToken::new()).await
    }
}

#[async_trait]
impl<T: Fetch + ?Sized> Fetch for Arc<T> {
    async fn fetch_with(&self, url: &str, cancel: &CancellationToken) -> Result<String, SyncError> {
        (**self).fetch_with(url, cancel).await
    }
}

pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, SyncError> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self::from_client(client, timeout))
    }

    pub fn from_client(client: Client, timeout: Duration) -> Self {
        HttpFetcher { client, timeout }
    }

    async fn read_body(&self, url: &str) -> Result<Bytes, SyncError> {
        let bytes = self.client.get(url).send().await?.error_for_status()?.bytes().await?;
        Ok(bytes)
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch_with(&self, url: &str, cancel: &CancellationToken) -> Result<String, SyncError> {
        let deadline = Instant::now() + self.timeout;
        // whichever arm loses is dropped, which aborts the pending request
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            _ = time::sleep_until(deadline) => return Err(SyncError::Timeout(self.timeout)),
            res = self.read_body(url) => res?,
        };
        decode_payload(&body)
    }
}

/// Turn a raw response body into payload text.
pub fn decode_payload(body: &[u8]) -> Result<String, SyncError> {
    let text = std::str::from_utf8(body).map_err(|e| SyncError::Decode(e.to_string()))?;
    b64::decode_text(text)
}
