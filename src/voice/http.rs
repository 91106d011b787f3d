//! Shared HTTP plumbing for the speech and translator clients

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::warn;

pub(crate) const MAX_RETRY_ATTEMPTS: u32 = 4;
const RETRY_BASE_DELAY_MS: u64 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Failure of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("network: {0}")]
    Network(String),

    #[error("API error {status}: {detail}")]
    Status {
        status: u16,
        detail: String,
        retryable: bool,
    },

    #[error("{0}")]
    Other(String),
}

impl HttpError {
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Timeout(_) | HttpError::Network(_) => true,
            HttpError::Status { retryable, .. } => *retryable,
            HttpError::Other(_) => false,
        }
    }
}

pub(crate) fn build_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(Duration::from_secs(15))
        .user_agent(concat!("voiceos/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Exponential backoff with a little deterministic jitter
pub(crate) fn retry_backoff(attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base_ms = RETRY_BASE_DELAY_MS.saturating_mul(exp);
    let jitter = 1.0 + ((attempt as f64 * 0.37).sin() * 0.1);
    Duration::from_millis((base_ms as f64 * jitter) as u64)
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

/// Run `request` until it succeeds, fails for good, or runs out of attempts
pub(crate) async fn with_retry<T, F, Fut>(what: &str, mut request: F) -> Result<T, HttpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HttpError>>,
{
    let mut last_err = HttpError::Other(format!("{what}: no attempt made"));
    for attempt in 0..MAX_RETRY_ATTEMPTS {
        if attempt > 0 {
            let delay = retry_backoff(attempt);
            warn!(
                "{} failed (attempt {}/{}), retrying in {:?}: {}",
                what, attempt, MAX_RETRY_ATTEMPTS, delay, last_err
            );
            tokio::time::sleep(delay).await;
        }
        match request().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => last_err = e,
            Err(e) => return Err(e),
        }
    }
    Err(last_err)
}

pub(crate) async fn check_response_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = truncate_error_detail(&extract_error_detail(&body), 500);
    Err(HttpError::Status {
        status: status.as_u16(),
        detail,
        retryable: is_retryable_status(status),
    })
}

/// Pull a human-readable message out of an error body
pub(crate) fn extract_error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = value.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }

    trimmed.to_string()
}

pub(crate) fn truncate_error_detail(detail: &str, max_chars: usize) -> String {
    if detail.chars().count() <= max_chars {
        return detail.to_string();
    }
    let mut truncated = detail.chars().take(max_chars).collect::<String>();
    truncated.push_str("... [truncated]");
    truncated
}

pub(crate) fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        HttpError::Timeout(e.to_string())
    } else if e.is_connect() || e.is_request() {
        HttpError::Network(e.to_string())
    } else {
        HttpError::Other(e.to_string())
    }
}
