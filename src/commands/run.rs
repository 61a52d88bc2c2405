//! Run command handler
//!
//! Assembles the monitor from configuration, executes one run, and turns
//! the resulting [`RunOutcome`] into operator-facing notifications. Outcome
//! variants decide the notification text here, outside the engine core.

use crate::archive::{CaptureClient, SnapshotResolver};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::monitor::{Monitor, RunOutcome, WatchTarget};
use crate::notify::{
    DirArtifactSink, FanoutNotifier, LogNotifier, Notifier, TracingStatusReporter, WebhookNotifier,
};
use crate::store::{EventStore, JsonFileStore};
use std::sync::Arc;

/// Execute one monitoring run
///
/// # Errors
///
/// Fatal engine errors (unreachable archive, invalid selector, unparseable
/// timestamp, failed first capture) are notified and then propagated.
pub async fn run_monitor(config: Config) -> Result<()> {
    let target = config.watch_target()?;
    let notifier = build_notifier(&config);
    let monitor = build_monitor(&config)?;

    match monitor.run(&target).await {
        Ok(outcome) => announce(&notifier, &target, &outcome).await,
        Err(e) => {
            // Terminate loudly rather than leaving ambiguous partial state
            notifier
                .notify(
                    &format!("Klaxon run failed for {}", target.url),
                    &format!("The monitoring run did not complete:\n\n{:#}", e),
                )
                .await
                .ok();
            Err(e)
        }
    }
}

/// Wire the monitor's collaborators from configuration
fn build_monitor(config: &Config) -> Result<Monitor> {
    let fetcher = Fetcher::new(
        config.archive.fetch_timeout(),
        config.archive.max_attempts,
    )?;
    let endpoints = config.archive.endpoints();

    let resolver = SnapshotResolver::new(fetcher.clone(), endpoints.clone());
    let capture = CaptureClient::new(
        fetcher.clone(),
        endpoints,
        config.archive.auth_headers(),
    );

    let store: Arc<dyn EventStore> = Arc::new(match &config.storage.state_file {
        Some(path) => JsonFileStore::with_path(path),
        None => JsonFileStore::new()?,
    });
    let artifacts = Arc::new(DirArtifactSink::new(&config.notify.artifact_dir));
    let status = Arc::new(TracingStatusReporter);

    Ok(Monitor::new(
        fetcher, resolver, capture, store, artifacts, status,
    ))
}

/// Build the notification fanout: log always, webhooks when configured
fn build_notifier(config: &Config) -> FanoutNotifier {
    let mut channels: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier)];
    if let Some(url) = &config.notify.webhook_url {
        channels.push(Box::new(WebhookNotifier::new(url.as_str())));
    }
    if let Some(url) = &config.notify.secondary_webhook_url {
        channels.push(Box::new(WebhookNotifier::new(url.as_str())));
    }
    FanoutNotifier::new(channels)
}

/// Map a run outcome to notification text
async fn announce(
    notifier: &FanoutNotifier,
    target: &WatchTarget,
    outcome: &RunOutcome,
) -> Result<()> {
    match outcome {
        RunOutcome::FirstArchived { snapshot } => {
            notifier
                .notify(
                    &format!("First archive created for {}", target.url),
                    &format!(
                        "The page had never been archived. A first capture now exists:\n{}\n\n\
                         Change monitoring starts with the next run.",
                        snapshot.view_url
                    ),
                )
                .await
        }
        RunOutcome::BaselineEstablished { snapshot } => {
            notifier
                .notify(
                    &format!("Monitoring baseline established for {}", target.url),
                    &format!(
                        "Adopted the most recent archived capture as the baseline:\n{}\n\n\
                         Change monitoring starts with the next run.",
                        snapshot.view_url
                    ),
                )
                .await
        }
        RunOutcome::NoChange => {
            // No-change runs stay quiet; the log line is enough
            tracing::info!("No change for {}", target.url);
            Ok(())
        }
        RunOutcome::ChangedAndReported {
            diff_text,
            artifact_url,
            old,
            new,
        } => {
            let capture_line = match new {
                Some(snapshot) => format!("Fresh capture: {}", snapshot.view_url),
                None => "The archive already held a recent capture; no new capture link."
                    .to_string(),
            };
            notifier
                .notify(
                    &format!("Change detected on {}", target.url),
                    &format!(
                        "Watched content changed.\n\n\
                         Previous capture: {}\n{}\nFull report: {}\n\n{}",
                        old.view_url, capture_line, artifact_url, diff_text
                    ),
                )
                .await
        }
        RunOutcome::ChangedCaptureFailed {
            diff_text,
            artifact_url,
            old,
            reason,
        } => {
            notifier
                .notify(
                    &format!("Change detected on {}", target.url),
                    &format!(
                        "Watched content changed, but the archive could not store a fresh \
                         capture ({}).\n\n\
                         Previous capture: {}\n\
                         Please capture the page manually at the archive's save-page service.\n\
                         Full report: {}\n\n{}",
                        reason, old.view_url, artifact_url, diff_text
                    ),
                )
                .await
        }
    }
}
