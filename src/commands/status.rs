//! Status command handler
//!
//! Prints the persisted watermark so an operator can see what the next run
//! will compare against without touching the archive.

use crate::config::Config;
use crate::error::Result;
use crate::store::{EventStore, JsonFileStore};

/// Print the persisted watermark state
pub async fn show_status(config: Config) -> Result<()> {
    let store = match &config.storage.state_file {
        Some(path) => JsonFileStore::with_path(path),
        None => JsonFileStore::new()?,
    };

    let state = store.load().await?;
    println!("State file: {}", store.path().display());
    match state.last_timestamp {
        Some(timestamp) => println!("Last seen capture: {}", timestamp),
        None => println!("Last seen capture: none (first run will establish a baseline)"),
    }
    Ok(())
}
