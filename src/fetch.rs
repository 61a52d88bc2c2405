//! Retrying HTTP fetcher
//!
//! This module is the sole point of outbound HTTP in Klaxon. Every other
//! component (snapshot resolver, capture trigger, document fetches) goes
//! through [`Fetcher`] rather than issuing raw requests, so retry policy,
//! timeouts, and the identifying user-agent are enforced in one place.

use crate::error::{KlaxonError, Result};
use std::collections::HashMap;
use std::time::Duration;

/// User-agent sent on every outbound request so archive operators can
/// identify and contact us.
const USER_AGENT: &str = concat!(
    "klaxon/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/klaxon-monitor/klaxon)"
);

/// Upper bound on a single backoff sleep, regardless of attempt count.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A fetched HTTP response
///
/// Body is decoded to text; headers are kept because the capture trigger
/// reads archive outcome headers off the save-page response.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Decoded response body
    pub body: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers, lowercased names
    pub headers: HashMap<String, String>,
}

/// HTTP fetcher with capped exponential-backoff retry
///
/// Retries transport failures and non-2xx responses up to a fixed attempt
/// budget. Each attempt is bounded by the client timeout so an unresponsive
/// archive cannot hang a run indefinitely.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl Fetcher {
    /// Create a new fetcher
    ///
    /// # Arguments
    ///
    /// * `timeout` - Per-request timeout applied to every attempt
    /// * `max_attempts` - Retry budget; the first request counts as attempt 1
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be built.
    pub fn new(timeout: Duration, max_attempts: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(KlaxonError::Http)?;

        Ok(Self {
            client,
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::from_millis(500),
        })
    }

    /// Override the initial backoff delay (shrunk in tests)
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Fetch a URL with the default header set
    ///
    /// # Errors
    ///
    /// Returns [`KlaxonError::TransientFetch`] once the retry budget is
    /// exhausted without a 2xx response.
    pub async fn get(&self, url: &str) -> Result<FetchedPage> {
        self.get_with_headers(url, &[]).await
    }

    /// Fetch a URL, forwarding caller-supplied headers on every attempt
    ///
    /// Used by the capture trigger to pass archive credentials through
    /// without interpreting them.
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<FetchedPage> {
        for attempt in 1..=self.max_attempts {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let headers = response
                            .headers()
                            .iter()
                            .map(|(name, value)| {
                                (
                                    name.as_str().to_ascii_lowercase(),
                                    value.to_str().unwrap_or_default().to_string(),
                                )
                            })
                            .collect();
                        let body = response.text().await.map_err(KlaxonError::Http)?;
                        return Ok(FetchedPage {
                            body,
                            status: status.as_u16(),
                            headers,
                        });
                    }
                    tracing::warn!(
                        "GET {} returned {} (attempt {}/{})",
                        url,
                        status.as_u16(),
                        attempt,
                        self.max_attempts
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "GET {} failed: {} (attempt {}/{})",
                        url,
                        e,
                        attempt,
                        self.max_attempts
                    );
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.backoff_delay(attempt)).await;
            }
        }

        Err(KlaxonError::TransientFetch {
            url: url.to_string(),
            attempts: self.max_attempts,
        }
        .into())
    }

    /// Backoff delay before the next attempt: initial * 2^(attempt-1), capped
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(MAX_BACKOFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher_with(initial_ms: u64, attempts: u32) -> Fetcher {
        Fetcher::new(Duration::from_secs(5), attempts)
            .unwrap()
            .with_initial_backoff(Duration::from_millis(initial_ms))
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let fetcher = fetcher_with(500, 8);
        assert_eq!(fetcher.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(fetcher.backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(fetcher.backoff_delay(3), Duration::from_millis(2000));
        assert_eq!(fetcher.backoff_delay(4), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_is_capped() {
        let fetcher = fetcher_with(500, 20);
        assert_eq!(fetcher.backoff_delay(10), MAX_BACKOFF);
        assert_eq!(fetcher.backoff_delay(19), MAX_BACKOFF);
    }

    #[test]
    fn test_attempt_budget_floor_is_one() {
        let fetcher = Fetcher::new(Duration::from_secs(1), 0).unwrap();
        assert_eq!(fetcher.max_attempts, 1);
    }

    #[test]
    fn test_user_agent_names_the_tool() {
        assert!(USER_AGENT.starts_with("klaxon/"));
    }
}
