//! Monitor state machine
//!
//! Orchestrates one monitoring run: resolve the baseline snapshot, extract
//! the watched fragments from the archived and live documents, compare, and
//! decide between the first-seen, no-change, and changed outcomes. The
//! persisted watermark is read once at run start and written at most once
//! at run end; no fatal-error path ever writes it.

use crate::archive::{
    ArchiveTimestamp, CaptureClient, CaptureOutcome, Resolution, Snapshot, SnapshotResolver,
};
use crate::diff::{self, DiffReport};
use crate::error::{KlaxonError, Result};
use crate::extract::{self, ElementSet};
use crate::fetch::Fetcher;
use crate::notify::{ArtifactSink, StatusReporter};
use crate::store::EventStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What to watch: a page, a selector scoping the watched region, and an
/// optional exclusion token pruning volatile substructure. Immutable per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    /// Page URL
    pub url: String,
    /// CSS selector choosing the watched fragments
    pub selector: String,
    /// Tag or attribute name to prune before comparison
    pub exclude_selector: Option<String>,
}

/// The watermark carried between runs
///
/// `last_timestamp` absent means the page has never been successfully
/// archived, or this target has never been run. The state machine is the
/// only writer; it persists a timestamp only after confirming it through a
/// successful capture or resolver call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Timestamp of the last seen archive capture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<ArchiveTimestamp>,
}

/// Terminal outcome of one monitoring run
///
/// Consumed by the command layer to decide notification text; the state
/// machine itself never formats operator-facing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The page had never been archived; a first capture now exists
    FirstArchived {
        /// The capture that was just taken
        snapshot: Snapshot,
    },
    /// An existing capture was adopted as the comparison baseline
    BaselineEstablished {
        /// The adopted capture
        snapshot: Snapshot,
    },
    /// Archived and live content are equivalent under the selector
    NoChange,
    /// A change was detected and reported
    ChangedAndReported {
        /// Unified-diff text of the change
        diff_text: String,
        /// Address of the uploaded diff artifact
        artifact_url: String,
        /// The baseline capture the live page was compared against
        old: Snapshot,
        /// The fresh capture, when one was actually taken and its
        /// timestamp advanced; `None` means the archive answered from
        /// cache or returned the old timestamp again, so there is no new
        /// capture link to report
        new: Option<Snapshot>,
    },
    /// A change was detected but the archive could not capture the page;
    /// the operator should trigger a capture manually
    ChangedCaptureFailed {
        /// Unified-diff text of the change
        diff_text: String,
        /// Address of the uploaded diff artifact
        artifact_url: String,
        /// The baseline capture the live page was compared against
        old: Snapshot,
        /// Archive-side failure description
        reason: String,
    },
}

/// One-shot change monitor
pub struct Monitor {
    fetcher: Fetcher,
    resolver: SnapshotResolver,
    capture: CaptureClient,
    store: Arc<dyn EventStore>,
    artifacts: Arc<dyn ArtifactSink>,
    status: Arc<dyn StatusReporter>,
}

impl Monitor {
    /// Assemble a monitor from its collaborators
    pub fn new(
        fetcher: Fetcher,
        resolver: SnapshotResolver,
        capture: CaptureClient,
        store: Arc<dyn EventStore>,
        artifacts: Arc<dyn ArtifactSink>,
        status: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            capture,
            store,
            artifacts,
            status,
        }
    }

    /// Execute one monitoring run for the target
    ///
    /// # Errors
    ///
    /// Fatal errors ([`KlaxonError::TransientFetch`],
    /// [`KlaxonError::InvalidSelector`], [`KlaxonError::TimestampParse`],
    /// and a failed first capture) abort the run before any watermark
    /// write. Capture failures after a reported change are not errors;
    /// they select the [`RunOutcome::ChangedCaptureFailed`] outcome.
    pub async fn run(&self, target: &WatchTarget) -> Result<RunOutcome> {
        let state = self.store.load().await?;
        let was_cold = state.last_timestamp.is_none();

        self.status.set_message("Resolving archive snapshot");
        let baseline = match self.resolver.resolve(target, &state).await? {
            Resolution::Snapshot(snapshot) => snapshot,
            Resolution::NeverArchived => return self.first_capture(target).await,
        };

        if was_cold {
            // An existing capture becomes the baseline; establishing it is
            // the whole outcome of this run.
            self.persist(baseline.timestamp.clone()).await?;
            tracing::info!(
                "Adopted existing capture {} as baseline for {}",
                baseline.timestamp,
                target.url
            );
            return Ok(RunOutcome::BaselineEstablished { snapshot: baseline });
        }

        self.status.set_message("Fetching archived and live documents");
        let (archived, live) = self.fetch_documents(target, &baseline).await?;

        self.status.set_message("Comparing watched content");
        let report = diff::compare(&archived, &live);
        if report.is_empty() {
            tracing::info!("No change detected for {}", target.url);
            return Ok(RunOutcome::NoChange);
        }

        self.report_change(target, baseline, report).await
    }

    /// Cold-path branch for a page the archive has never seen
    async fn first_capture(&self, target: &WatchTarget) -> Result<RunOutcome> {
        self.status.set_message("Requesting first archive capture");
        match self.capture.capture_now(target).await? {
            CaptureOutcome::Captured(snapshot) => {
                self.persist(snapshot.timestamp.clone()).await?;
                Ok(RunOutcome::FirstArchived { snapshot })
            }
            CaptureOutcome::AlreadyCached => {
                // The archive is mid-debounce from a parallel request; the
                // capture will be resolvable on the next run.
                tracing::info!("Archive already caching {}; nothing to do", target.url);
                Ok(RunOutcome::NoChange)
            }
            CaptureOutcome::Failed(reason) => Err(KlaxonError::Capture(format!(
                "first capture of {} failed: {}",
                target.url, reason
            ))
            .into()),
        }
    }

    /// Fetch and extract both documents
    ///
    /// The two fetches are independent reads, so they run concurrently and
    /// join before any comparison. The identical exclusion rule is applied
    /// to both sides to keep the sets structurally aligned.
    async fn fetch_documents(
        &self,
        target: &WatchTarget,
        baseline: &Snapshot,
    ) -> Result<(ElementSet, ElementSet)> {
        let (archived_page, live_page) = tokio::try_join!(
            self.fetcher.get(&baseline.raw_url),
            self.fetcher.get(&target.url)
        )?;

        let archived = self.extract_watched(&archived_page.body, target, &baseline.raw_url)?;
        let live = self.extract_watched(&live_page.body, target, &target.url)?;
        Ok((archived, live))
    }

    /// Selector evaluation plus the optional exclusion filter
    fn extract_watched(
        &self,
        html: &str,
        target: &WatchTarget,
        source_url: &str,
    ) -> Result<ElementSet> {
        let set = extract::extract(html, &target.selector, source_url)?;
        Ok(match &target.exclude_selector {
            Some(token) => set.apply_exclusion(token),
            None => set,
        })
    }

    /// Changed branch: deliver the artifact, recapture, maybe advance
    async fn report_change(
        &self,
        target: &WatchTarget,
        old: Snapshot,
        report: DiffReport,
    ) -> Result<RunOutcome> {
        tracing::info!("Change detected for {}", target.url);

        self.status.set_message("Uploading diff artifact");
        let artifact_url = self.artifacts.upload(report.html().as_bytes()).await?;

        self.status.set_message("Requesting fresh capture");
        let diff_text = report.unified_text().to_string();
        match self.capture.capture_now(target).await? {
            CaptureOutcome::Captured(new) if new.timestamp != old.timestamp => {
                self.persist(new.timestamp.clone()).await?;
                Ok(RunOutcome::ChangedAndReported {
                    diff_text,
                    artifact_url,
                    old,
                    new: Some(new),
                })
            }
            CaptureOutcome::Captured(_) | CaptureOutcome::AlreadyCached => {
                // Rapid-recapture edge: the archive handed back a stale or
                // cached timestamp. Report the change without pretending a
                // new capture exists, and leave the watermark alone.
                Ok(RunOutcome::ChangedAndReported {
                    diff_text,
                    artifact_url,
                    old,
                    new: None,
                })
            }
            CaptureOutcome::Failed(reason) => Ok(RunOutcome::ChangedCaptureFailed {
                diff_text,
                artifact_url,
                old,
                reason,
            }),
        }
    }

    /// The run's single watermark write
    async fn persist(&self, timestamp: ArchiveTimestamp) -> Result<()> {
        self.store
            .save(&PersistedState {
                last_timestamp: Some(timestamp),
            })
            .await
    }
}
