//! HTTP client with explicit redirect handling and retry logic.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::header::LOCATION;
use reqwest::{Client, StatusCode, Url, redirect};

use super::retry::{MAX_REDIRECTS, MAX_RETRIES, NonRetryableError, RETRY_DELAY_MS, check_retryable};

/// HTTP client with built-in retry logic for registry downloads.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    ///
    /// Redirects are followed by [`HttpClient::fetch_bytes`] itself, so the
    /// wrapped client should be built with `redirect::Policy::none()`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client that leaves redirects to [`HttpClient::fetch_bytes`].
    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client))
    }

    /// Fetches `url` into memory, following `Location` on 3xx responses.
    /// Any terminal status other than 200 is an error.
    /// Automatically retries on transient errors.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let start = Url::parse(url).with_context(|| format!("Invalid URL {:?}", url))?;
        self.with_retry(url, || self.fetch_once(start.clone())).await
    }

    /// Single fetch attempt, following the redirect chain in sequence.
    async fn fetch_once(&self, start: Url) -> Result<Vec<u8>> {
        let mut current = start;

        for _ in 0..=MAX_REDIRECTS {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .with_context(|| format!("Failed to send request to {}", current))?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| {
                        NonRetryableError::UnexpectedStatus(format!(
                            "{} without a Location header ({})",
                            status, current
                        ))
                    })?;
                let next = current
                    .join(location)
                    .with_context(|| format!("Invalid redirect target {:?}", location))?;
                debug!("{} redirected ({}) to {}", current, status, next);
                current = next;
                continue;
            }

            let response = response.error_for_status().map_err(check_retryable)?;
            if response.status() != StatusCode::OK {
                return Err(NonRetryableError::UnexpectedStatus(format!(
                    "{} ({})",
                    response.status(),
                    current
                ))
                .into());
            }

            let bytes = response
                .bytes()
                .await
                .context("Failed to read response body")?;
            debug!(
                "Downloaded {:.2} MB from {}",
                bytes.len() as f64 / (1024.0 * 1024.0),
                current
            );
            return Ok(bytes.to_vec());
        }

        Err(NonRetryableError::TooManyRedirects(current.to_string()).into())
    }

    /// Runs `attempt` until it succeeds, fails with a [`NonRetryableError`],
    /// or [`MAX_RETRIES`] tries have been spent on `url`.
    async fn with_retry<F, Fut, T>(&self, url: &str, attempt: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut tries = 0;
        loop {
            tries += 1;
            let error = match attempt().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            if !is_retryable_error(&error) || tries >= MAX_RETRIES {
                debug!("Giving up on {} after {} attempt(s): {:#}", url, tries, error);
                return Err(error);
            }
            warn!(
                "Fetching {} failed on attempt {} of {} ({:#}); trying again in {}ms",
                url, tries, MAX_RETRIES, error, RETRY_DELAY_MS
            );
            tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
        }
    }
}

fn is_retryable_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<NonRetryableError>().is_none()
}
