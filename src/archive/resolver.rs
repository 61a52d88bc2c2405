//! Snapshot resolver
//!
//! Determines which archived capture represents the last known good state
//! of the watched page. The cold path (no persisted watermark) interrogates
//! the archive; the warm path reconstructs the snapshot address from the
//! persisted timestamp without any archive round-trip.

use crate::archive::{ArchiveEndpoints, ArchiveTimestamp, Snapshot};
use crate::error::{KlaxonError, Result};
use crate::fetch::Fetcher;
use crate::monitor::{PersistedState, WatchTarget};
use serde::Deserialize;

/// Outcome of snapshot resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The archive holds a usable capture of the page
    Snapshot(Snapshot),
    /// The archive has never successfully captured the page
    NeverArchived,
}

/// Availability API response envelope
#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Debug, Default, Deserialize)]
struct ArchivedSnapshots {
    closest: Option<ClosestSnapshot>,
}

#[derive(Debug, Deserialize)]
struct ClosestSnapshot {
    #[serde(default)]
    available: bool,
}

/// Resolves the baseline snapshot for a watch target
#[derive(Debug, Clone)]
pub struct SnapshotResolver {
    fetcher: Fetcher,
    endpoints: ArchiveEndpoints,
}

impl SnapshotResolver {
    /// Create a resolver over the given fetcher and endpoint set
    pub fn new(fetcher: Fetcher, endpoints: ArchiveEndpoints) -> Self {
        Self { fetcher, endpoints }
    }

    /// Resolve the last known good capture of the target page
    ///
    /// Warm path: a persisted timestamp short-circuits straight to a
    /// reconstructed [`Snapshot`]. Cold path: consult the availability API,
    /// then the full index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::KlaxonError::TransientFetch`] if the archive
    /// stays unreachable, or [`crate::error::KlaxonError::TimestampParse`]
    /// if an index entry that should carry a capture timestamp does not.
    pub async fn resolve(
        &self,
        target: &WatchTarget,
        state: &PersistedState,
    ) -> Result<Resolution> {
        if let Some(last) = &state.last_timestamp {
            tracing::debug!("Warm path: reusing persisted timestamp {}", last);
            return Ok(Resolution::Snapshot(
                self.endpoints.snapshot(last.clone(), &target.url),
            ));
        }

        if !self.is_archived(&target.url).await? {
            tracing::info!("Archive has no capture of {}", target.url);
            return Ok(Resolution::NeverArchived);
        }

        match self.latest_successful_capture(&target.url).await? {
            Some(timestamp) => Ok(Resolution::Snapshot(
                self.endpoints.snapshot(timestamp, &target.url),
            )),
            None => Ok(Resolution::NeverArchived),
        }
    }

    /// Ask the availability API whether any capture exists
    async fn is_archived(&self, url: &str) -> Result<bool> {
        let page = self.fetcher.get(&self.endpoints.availability_url(url)).await?;
        let response: AvailabilityResponse = serde_json::from_str(&page.body)?;
        Ok(response
            .archived_snapshots
            .closest
            .map(|closest| closest.available)
            .unwrap_or(false))
    }

    /// Scan the full index for the most recent HTTP-200 capture
    ///
    /// Index ordering is not guaranteed monotonic, so the newest entry is
    /// chosen by comparing embedded timestamps, not by row position.
    /// Returns `Ok(None)` when the index holds no successful capture at all.
    async fn latest_successful_capture(&self, url: &str) -> Result<Option<ArchiveTimestamp>> {
        let index_url = self.endpoints.index_url(url);
        let page = self.fetcher.get(&index_url).await?;
        let rows: Vec<Vec<String>> = serde_json::from_str(&page.body)?;

        let (timestamp_col, status_col) = column_indices(&rows);
        let data_rows = rows
            .iter()
            .skip(if has_header(&rows) { 1 } else { 0 })
            .filter(|row| {
                row.get(status_col).map(String::as_str) == Some("200")
            });

        let mut newest: Option<ArchiveTimestamp> = None;
        let mut saw_successful = false;
        for row in data_rows {
            saw_successful = true;
            let Some(field) = row.get(timestamp_col) else {
                continue;
            };
            if let Some(ts) = ArchiveTimestamp::extract(field) {
                if newest.as_ref().map(|n| ts > *n).unwrap_or(true) {
                    newest = Some(ts);
                }
            }
        }

        if saw_successful && newest.is_none() {
            // Successful captures exist but none carries a parseable
            // timestamp: the pipeline has no snapshot address to work with.
            return Err(KlaxonError::TimestampParse(index_url).into());
        }

        Ok(newest)
    }
}

/// True when the first index row is the CDX header row
fn has_header(rows: &[Vec<String>]) -> bool {
    rows.first()
        .map(|row| row.iter().any(|field| field == "timestamp"))
        .unwrap_or(false)
}

/// Locate the timestamp and statuscode columns, defaulting to the standard
/// CDX layout when no header row is present.
fn column_indices(rows: &[Vec<String>]) -> (usize, usize) {
    const DEFAULT_TIMESTAMP: usize = 1;
    const DEFAULT_STATUS: usize = 4;

    if let Some(header) = rows.first() {
        if has_header(rows) {
            let timestamp = header
                .iter()
                .position(|field| field == "timestamp")
                .unwrap_or(DEFAULT_TIMESTAMP);
            let status = header
                .iter()
                .position(|field| field == "statuscode")
                .unwrap_or(DEFAULT_STATUS);
            return (timestamp, status);
        }
    }
    (DEFAULT_TIMESTAMP, DEFAULT_STATUS)
}
