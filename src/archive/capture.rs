//! Capture trigger
//!
//! Asks the archive's save-page endpoint to store the current live page.
//! Transport-level failures are retried by the fetcher; archive-level
//! outcomes (cache hit, capture runtime failure) are terminal for the
//! attempt and surface as distinct [`CaptureOutcome`] variants so the
//! monitor can branch on them instead of aborting the run.

use crate::archive::{ArchiveEndpoints, ArchiveTimestamp, Snapshot};
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::monitor::WatchTarget;

/// Header the save-page service sets when it answers from its own debounce
/// cache instead of taking a fresh capture.
const PAGE_CACHE_HEADER: &str = "x-page-cache";

/// Header carrying the archive path of the freshly stored capture.
const CONTENT_LOCATION_HEADER: &str = "content-location";

/// Outcome of one capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A fresh capture was stored; the snapshot addresses it
    Captured(Snapshot),
    /// The archive already holds a sufficiently fresh capture
    AlreadyCached,
    /// The archive could not capture the page right now
    Failed(String),
}

/// Client for the archive's save-page endpoint
#[derive(Debug, Clone)]
pub struct CaptureClient {
    fetcher: Fetcher,
    endpoints: ArchiveEndpoints,
    /// Caller-supplied credential headers, forwarded verbatim
    auth_headers: Vec<(String, String)>,
}

impl CaptureClient {
    /// Create a capture client
    ///
    /// # Arguments
    ///
    /// * `auth_headers` - Credential headers supplied by the caller
    ///   (e.g. an `authorization: LOW key:secret` pair); forwarded on every
    ///   capture request, never interpreted.
    pub fn new(
        fetcher: Fetcher,
        endpoints: ArchiveEndpoints,
        auth_headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            fetcher,
            endpoints,
            auth_headers,
        }
    }

    /// Request a fresh capture of the target's live page
    ///
    /// Never fails the run for archive-level problems: a transport failure
    /// that exhausts the fetcher's retry budget, a missing capture
    /// timestamp, or an archive error all come back as
    /// [`CaptureOutcome::Failed`]. Only the cache-hit header produces
    /// [`CaptureOutcome::AlreadyCached`].
    pub async fn capture_now(&self, target: &WatchTarget) -> Result<CaptureOutcome> {
        let save_url = self.endpoints.save_url(&target.url);
        tracing::info!("Requesting capture of {}", target.url);

        let page = match self
            .fetcher
            .get_with_headers(&save_url, &self.auth_headers)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Capture request did not reach the archive: {}", e);
                return Ok(CaptureOutcome::Failed(e.to_string()));
            }
        };

        if page
            .headers
            .get(PAGE_CACHE_HEADER)
            .map(|v| v.eq_ignore_ascii_case("hit"))
            .unwrap_or(false)
        {
            tracing::info!("Archive answered from cache; no new capture taken");
            return Ok(CaptureOutcome::AlreadyCached);
        }

        match self.capture_timestamp(&page.headers, &page.body) {
            Some(timestamp) => {
                tracing::info!("Archive stored capture {}", timestamp);
                Ok(CaptureOutcome::Captured(
                    self.endpoints.snapshot(timestamp, &target.url),
                ))
            }
            None => Ok(CaptureOutcome::Failed(format!(
                "no capture timestamp in save-page response for {}",
                target.url
            ))),
        }
    }

    /// Pull the new capture's timestamp out of the save-page response
    ///
    /// The content-location header is authoritative; the body is scanned as
    /// a fallback because some archive deployments only embed the replay
    /// link there.
    fn capture_timestamp(
        &self,
        headers: &std::collections::HashMap<String, String>,
        body: &str,
    ) -> Option<ArchiveTimestamp> {
        headers
            .get(CONTENT_LOCATION_HEADER)
            .and_then(|location| ArchiveTimestamp::extract(location))
            .or_else(|| ArchiveTimestamp::extract(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn client() -> CaptureClient {
        let fetcher = Fetcher::new(Duration::from_secs(1), 1).unwrap();
        CaptureClient::new(fetcher, ArchiveEndpoints::default(), Vec::new())
    }

    #[test]
    fn test_capture_timestamp_prefers_content_location() {
        let client = client();
        let mut headers = HashMap::new();
        headers.insert(
            "content-location".to_string(),
            "/web/20240201000000/https://example.com".to_string(),
        );
        let ts = client
            .capture_timestamp(&headers, "body mentions 20230101000000 too")
            .unwrap();
        assert_eq!(ts.as_str(), "20240201000000");
    }

    #[test]
    fn test_capture_timestamp_falls_back_to_body() {
        let client = client();
        let ts = client
            .capture_timestamp(
                &HashMap::new(),
                r#"<a href="/web/20240201000000/https://example.com">done</a>"#,
            )
            .unwrap();
        assert_eq!(ts.as_str(), "20240201000000");
    }

    #[test]
    fn test_capture_timestamp_missing_everywhere() {
        let client = client();
        assert!(client
            .capture_timestamp(&HashMap::new(), "capture pending")
            .is_none());
    }
}
