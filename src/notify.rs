//! Outbound collaborator boundaries
//!
//! The monitor core reports results through three narrow traits: a
//! [`Notifier`] for alert delivery, an [`ArtifactSink`] for the rendered
//! diff report, and a [`StatusReporter`] for non-essential progress text.
//! The bundled implementations log, post to a webhook, and write artifacts
//! to a local directory.

use crate::error::{KlaxonError, Result};
use async_trait::async_trait;
use serde_json::json;

/// Alert delivery boundary
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a subject/body pair to the operator
    async fn notify(&self, subject: &str, body: &str) -> Result<()>;
}

/// Diff artifact upload boundary
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Store the rendered artifact and return an address for it
    async fn upload(&self, artifact: &[u8]) -> Result<String>;
}

/// Non-essential human-readable progress line
///
/// Out of scope for correctness; implementations must not fail the run.
pub trait StatusReporter: Send + Sync {
    /// Replace the current progress message
    fn set_message(&self, text: &str);
}

/// Notifier that writes alerts to the log
///
/// The default channel when no webhook is configured; keeps single-host
/// deployments working with zero setup.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        tracing::info!("NOTIFY: {}\n{}", subject, body);
        Ok(())
    }
}

/// Notifier that posts the subject/body pair to a webhook as JSON
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a webhook notifier for the given endpoint
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "subject": subject, "body": body }))
            .send()
            .await
            .map_err(KlaxonError::Http)?;

        if !response.status().is_success() {
            return Err(KlaxonError::Notify(format!(
                "webhook returned {}",
                response.status().as_u16()
            ))
            .into());
        }
        Ok(())
    }
}

/// Fans one notification out to every configured channel
///
/// The secondary channel receives the same subject/body pair as the
/// primary. A failing channel is logged but does not stop the others.
pub struct FanoutNotifier {
    channels: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    /// Build a fanout over the given channels
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let mut first_error = None;
        let mut failures = 0;
        for channel in &self.channels {
            if let Err(e) = channel.notify(subject, body).await {
                tracing::warn!("Notification channel failed: {}", e);
                first_error.get_or_insert(e);
                failures += 1;
            }
        }
        // Partial delivery is success; total silence is not
        match first_error {
            Some(e) if failures == self.channels.len() => Err(e),
            _ => Ok(()),
        }
    }
}

/// Artifact sink that writes reports into a local directory
///
/// Returns a `file://` address; deployments with shared storage can mount
/// the directory wherever their alert consumers expect it.
#[derive(Debug, Clone)]
pub struct DirArtifactSink {
    dir: std::path::PathBuf,
}

impl DirArtifactSink {
    /// Create a sink rooted at the given directory
    pub fn new<P: Into<std::path::PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ArtifactSink for DirArtifactSink {
    async fn upload(&self, artifact: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = format!(
            "klaxon-diff-{}.html",
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        );
        let path = self.dir.join(name);
        tokio::fs::write(&path, artifact).await?;

        tracing::info!("Wrote diff artifact to {}", path.display());
        Ok(format!("file://{}", path.display()))
    }
}

/// Status reporter that narrates progress through the log
#[derive(Debug, Default)]
pub struct TracingStatusReporter;

impl StatusReporter for TracingStatusReporter {
    fn set_message(&self, text: &str) {
        tracing::info!(target: "klaxon::status", "{}", text);
    }
}
