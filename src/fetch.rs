use reqwest::{Client, StatusCode};
use thiserror::Error;

const USER_AGENT: &str = concat!("creel/", env!("CARGO_PKG_VERSION"), " (RSS aggregator)");

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with {status}")]
    Status { status: StatusCode },
}

/// HTTP client for retrieving raw feed documents.
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    pub fn new() -> Self {
        // No request timeout: a stalled server stalls the cycle that is
        // fetching from it.
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to build HTTP client");

        Self { client }
    }

    /// GET the feed document at `url` and return the body as text.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        Ok(response.text().await?)
    }
}

impl Default for FeedClient {
    fn default() -> Self {
        Self::new()
    }
}
