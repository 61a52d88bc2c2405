//! Error types for Klaxon
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Klaxon operations
///
/// This enum encompasses all possible errors that can occur during a
/// monitoring run: configuration loading, archive queries, content
/// extraction, and state persistence.
#[derive(Error, Debug)]
pub enum KlaxonError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP failure that survived the retry budget
    ///
    /// Fatal for the run: nothing downstream can compare documents it
    /// could not fetch.
    #[error("Fetch failed after {attempts} attempts: {url}")]
    TransientFetch {
        /// URL that could not be fetched
        url: String,
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// Malformed CSS selector (main or exclusion)
    #[error("Invalid selector {selector:?} for {source_url}")]
    InvalidSelector {
        /// The selector that failed to parse
        selector: String,
        /// Document the selector was being applied to
        source_url: String,
    },

    /// An archive record lacked a recognizable 14-digit timestamp
    ///
    /// The message carries the offending URL so the operator can inspect
    /// the record by hand.
    #[error("No 14-digit archive timestamp found in record for {0}")]
    TimestampParse(String),

    /// Archive capture request was rejected or returned garbage
    #[error("Capture request failed: {0}")]
    Capture(String),

    /// Watermark state persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notify(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Klaxon operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
