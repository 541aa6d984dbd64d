//! Retry logic for registry downloads with error classification.

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of attempts for one download.
pub const MAX_RETRIES: usize = 3;

/// Delay between retry attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Maximum number of redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Errors that should not be retried.
#[derive(Debug, Error)]
pub enum NonRetryableError {
    /// Resource not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Forbidden access (HTTP 401/403)
    #[error("Access forbidden: {0}. The registry may require authentication.")]
    Forbidden(String),
    /// Other client errors that won't succeed on retry
    #[error("Request error: {0}")]
    ClientError(String),
    /// A terminal status other than 200, or a redirect without a target
    #[error("Server responded with {0}")]
    UnexpectedStatus(String),
    #[error("Too many redirects starting from {0}")]
    TooManyRedirects(String),
}

/// Classifies an error as retryable or non-retryable.
/// Returns Ok(()) if the error is retryable, Err with a user-friendly message if not.
pub fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "(unknown url)".to_string());

    if let Some(status) = error.status() {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(NonRetryableError::Forbidden(url));
            }
            StatusCode::NOT_FOUND => {
                return Err(NonRetryableError::NotFound(url));
            }
            // 429 is worth another try after the delay
            StatusCode::TOO_MANY_REQUESTS => {}
            s if s.is_client_error() => {
                return Err(NonRetryableError::ClientError(format!(
                    "HTTP {} from {}",
                    s.as_u16(),
                    url
                )));
            }
            // 5xx server errors are retryable
            _ => {}
        }
    }

    // Connection errors, timeouts, etc. are retryable
    Ok(())
}

/// Checks if an error from `error_for_status()` should be retried.
/// Returns the original error if retryable, or a user-friendly NonRetryableError if not.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}
