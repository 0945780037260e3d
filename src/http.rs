//! Shared HTTP plumbing for the hosted translation and speech services.
//!
//! Requests are rebuilt for every attempt (multipart bodies cannot be
//! cloned), and transient failures are retried with exponential backoff.

use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of attempts for one logical request.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Why an HTTP exchange failed after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// The server answered with a non-success status.
    Status { status: StatusCode, body: String },
    /// The request timed out.
    Timeout,
    /// The server could not be reached.
    Connect,
    /// Anything else reqwest reported.
    Request(String),
}

impl HttpFailure {
    fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect
        } else {
            Self::Request(error.to_string())
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Timeout | Self::Connect => true,
            Self::Request(_) => false,
        }
    }
}

/// Builds a reqwest client with the given per-request timeout.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}

/// Sends the request produced by `build`, retrying transient failures.
///
/// Returns the response body on a 2xx status.
pub async fn send_with_retry<F>(service: &str, build: F) -> Result<String, HttpFailure>
where
    F: Fn() -> RequestBuilder,
{
    let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
    let mut attempt = 1;

    loop {
        debug!("{} request attempt {} of {}", service, attempt, MAX_RETRY_ATTEMPTS);

        let failure = match build().send().await {
            Ok(response) => {
                let status = response.status();
                match response.text().await {
                    Ok(body) if status.is_success() => return Ok(body),
                    Ok(body) => HttpFailure::Status { status, body },
                    Err(e) => HttpFailure::from_reqwest(&e),
                }
            }
            Err(e) => HttpFailure::from_reqwest(&e),
        };

        if !failure.is_retryable() || attempt >= MAX_RETRY_ATTEMPTS {
            return Err(failure);
        }

        warn!(
            "{} request failed (attempt {}), retrying in {:?}: {:?}",
            service, attempt, delay, failure
        );
        tokio::time::sleep(delay).await;
        delay *= 2;
        attempt += 1;
    }
}
