//! Klaxon - webpage change monitor library
//!
//! This library provides the core functionality for the Klaxon monitor,
//! including archive snapshot resolution, selective DOM extraction, diff
//! computation, and the run state machine.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `fetch`: Retrying HTTP fetcher, the sole point of outbound HTTP
//! - `archive`: Snapshot resolution and capture triggering against a web archive
//! - `extract`: CSS-selector DOM extraction and exclusion filtering
//! - `diff`: Canonical rendering and change report generation
//! - `monitor`: The first-seen/steady-state run state machine
//! - `store` / `notify`: Collaborator boundaries (state, alerts, artifacts)
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use klaxon::monitor::WatchTarget;
//!
//! let target = WatchTarget {
//!     url: "https://example.com/news".to_string(),
//!     selector: "#headlines".to_string(),
//!     exclude_selector: Some("script".to_string()),
//! };
//! assert_eq!(target.selector, "#headlines");
//! ```

pub mod archive;
pub mod cli;
pub mod commands;
pub mod config;
pub mod diff;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod monitor;
pub mod notify;
pub mod store;

// Re-export commonly used types
pub use archive::{ArchiveTimestamp, CaptureOutcome, Resolution, Snapshot};
pub use config::Config;
pub use error::{KlaxonError, Result};
pub use monitor::{Monitor, PersistedState, RunOutcome, WatchTarget};
