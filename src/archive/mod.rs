//! Web archive integration
//!
//! Types shared by the snapshot resolver and the capture trigger: the
//! validated 14-digit archive timestamp, the derived [`Snapshot`] address,
//! and the endpoint templates for the archive's availability, index,
//! raw-snapshot, and save-page APIs.

use crate::error::KlaxonError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub mod capture;
pub mod resolver;

pub use capture::{CaptureClient, CaptureOutcome};
pub use resolver::{Resolution, SnapshotResolver};

/// Strict 14-digit token. Word boundaries keep it from matching a slice of
/// a longer digit run.
fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{14}\b").unwrap())
}

/// A validated archive capture timestamp
///
/// Always exactly 14 ASCII digits (`YYYYMMDDhhmmss`). Lexicographic order
/// on the inner string is chronological order, so `Ord` is derived.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArchiveTimestamp(String);

impl ArchiveTimestamp {
    /// Validate a candidate timestamp
    ///
    /// Returns `None` unless the input is exactly 14 ASCII digits.
    pub fn new(raw: &str) -> Option<Self> {
        if raw.len() == 14 && raw.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    /// Scan arbitrary record text for the first strict 14-digit token
    ///
    /// Returns `None` if no such token exists; callers translate that into
    /// [`KlaxonError::TimestampParse`] with the record's URL attached.
    pub fn extract(text: &str) -> Option<Self> {
        timestamp_re()
            .find(text)
            .and_then(|m| Self::new(m.as_str()))
    }

    /// The raw 14-digit string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArchiveTimestamp {
    type Err = KlaxonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s).ok_or_else(|| KlaxonError::TimestampParse(s.to_string()))
    }
}

impl TryFrom<String> for ArchiveTimestamp {
    type Error = KlaxonError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ArchiveTimestamp> for String {
    fn from(ts: ArchiveTimestamp) -> Self {
        ts.0
    }
}

/// A resolved archive capture of one page
///
/// Derived, never stored: always reconstructible from a timestamp plus the
/// watched URL. `raw_url` addresses the archive's original, unmodified
/// markup (the `id_` view) so extraction sees the page as it was served;
/// `view_url` is the human-facing replay page used in notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Capture timestamp
    pub timestamp: ArchiveTimestamp,
    /// Address of the unmodified archived markup
    pub raw_url: String,
    /// Address of the rendered replay view
    pub view_url: String,
}

/// Endpoint templates for one web archive deployment
///
/// Defaults target the public Wayback Machine. Both bases are overridable
/// so tests can point every endpoint at a local mock server.
#[derive(Debug, Clone)]
pub struct ArchiveEndpoints {
    /// Base for the availability API (`/wayback/available`)
    pub availability_base: String,
    /// Base for the index, replay, and save-page APIs
    pub web_base: String,
}

impl Default for ArchiveEndpoints {
    fn default() -> Self {
        Self {
            availability_base: "https://archive.org".to_string(),
            web_base: "https://web.archive.org".to_string(),
        }
    }
}

impl ArchiveEndpoints {
    /// Availability query for a page URL
    pub fn availability_url(&self, url: &str) -> String {
        format!(
            "{}/wayback/available?url={}",
            self.availability_base,
            encode(url)
        )
    }

    /// Full index (CDX) query for a page URL, JSON output
    pub fn index_url(&self, url: &str) -> String {
        format!(
            "{}/cdx/search/cdx?url={}&output=json",
            self.web_base,
            encode(url)
        )
    }

    /// Raw snapshot address for a capture of a page
    ///
    /// The `id_` modifier selects the original markup instead of the
    /// archive's rewritten replay document.
    pub fn raw_snapshot_url(&self, timestamp: &ArchiveTimestamp, url: &str) -> String {
        format!("{}/web/{}id_/{}", self.web_base, timestamp, url)
    }

    /// Rendered replay address for a capture of a page
    pub fn view_url(&self, timestamp: &ArchiveTimestamp, url: &str) -> String {
        format!("{}/web/{}/{}", self.web_base, timestamp, url)
    }

    /// Save-page capture request address
    pub fn save_url(&self, url: &str) -> String {
        format!("{}/save/{}", self.web_base, url)
    }

    /// Build the derived [`Snapshot`] for a capture of a page
    pub fn snapshot(&self, timestamp: ArchiveTimestamp, url: &str) -> Snapshot {
        Snapshot {
            raw_url: self.raw_snapshot_url(&timestamp, url),
            view_url: self.view_url(&timestamp, url),
            timestamp,
        }
    }
}

/// Percent-encode a URL for embedding as a query parameter value
fn encode(url: &str) -> String {
    url::form_urlencoded::byte_serialize(url.as_bytes()).collect()
}
