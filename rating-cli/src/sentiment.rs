//! HTTP client for an external sentiment analysis service.
//!
//! The service accepts `POST {base_url}/sentiment` with a JSON body
//! `{"text": "..."}` and answers `{"score": <0..=5>}`. The
//! [`SentimentAnalyser`] trait is synchronous, so the client blocks on a Tokio
//! runtime it owns.

use std::time::Duration;

use log::debug;
use rating_core::{CollaboratorError, SentimentAnalyser};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

const SERVICE: &str = "sentiment";

/// Default user agent for sentiment requests.
pub const DEFAULT_USER_AGENT: &str = "tourism-rating/0.1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Failure to construct an [`HttpSentimentAnalyser`].
#[derive(Debug, Error)]
pub enum SentimentBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Connection settings for [`HttpSentimentAnalyser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSentimentConfig {
    /// Base URL of the service, e.g. `"http://localhost:8080"`.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent sent with each request.
    pub user_agent: String,
}

impl HttpSentimentConfig {
    /// Settings for `base_url` with the default timeout and user agent.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct SentimentRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    score: f64,
}

/// [`SentimentAnalyser`] backed by an HTTP service.
pub struct HttpSentimentAnalyser {
    client: Client,
    config: HttpSentimentConfig,
    runtime: Runtime,
}

impl std::fmt::Debug for HttpSentimentAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSentimentAnalyser")
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish_non_exhaustive()
    }
}

impl HttpSentimentAnalyser {
    /// Create a client with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn with_config(config: HttpSentimentConfig) -> Result<Self, SentimentBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(SentimentBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SentimentBuildError::Runtime)?;
        Ok(Self {
            client,
            config,
            runtime,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/sentiment", self.config.base_url.trim_end_matches('/'))
    }

    async fn analyse_async(&self, text: &str) -> Result<f64, CollaboratorError> {
        let url = self.endpoint();
        let response = self
            .client
            .post(&url)
            .json(&SentimentRequest { text })
            .send()
            .await
            .map_err(|err| convert_reqwest_error(&err))?
            .error_for_status()
            .map_err(|err| convert_reqwest_error(&err))?;
        let body: SentimentResponse =
            response
                .json()
                .await
                .map_err(|err| CollaboratorError::InvalidResponse {
                    service: SERVICE,
                    reason: err.to_string(),
                })?;
        debug!("sentiment from {url}: {}", body.score);
        convert_response(&body)
    }
}

impl SentimentAnalyser for HttpSentimentAnalyser {
    fn analyse(&self, text: &str) -> Result<f64, CollaboratorError> {
        let future = self.analyse_async(text);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }
    }
}

/// Sentiment used when no service is configured; every text scores `0.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSentiment;

impl SentimentAnalyser for NoSentiment {
    fn analyse(&self, _text: &str) -> Result<f64, CollaboratorError> {
        Ok(0.0)
    }
}

/// Map transport failures onto collaborator errors. Client errors (4xx) are
/// not worth retrying; everything else is.
fn convert_reqwest_error(error: &reqwest::Error) -> CollaboratorError {
    if error.is_timeout() {
        return CollaboratorError::Timeout { service: SERVICE };
    }
    match error.status() {
        Some(status) if status.is_client_error() => CollaboratorError::InvalidResponse {
            service: SERVICE,
            reason: error.to_string(),
        },
        _ => CollaboratorError::Unavailable {
            service: SERVICE,
            reason: error.to_string(),
        },
    }
}

fn convert_response(response: &SentimentResponse) -> Result<f64, CollaboratorError> {
    if response.score.is_finite() && (0.0..=5.0).contains(&response.score) {
        Ok(response.score)
    } else {
        Err(CollaboratorError::InvalidResponse {
            service: SERVICE,
            reason: format!("score {} outside 0..=5", response.score),
        })
    }
}
