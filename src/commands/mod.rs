/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes two top-level command modules:

- `run`    — Execute one monitoring run against the configured target
- `status` — Print the persisted watermark state

These handlers are intentionally small and wire together the library
components: fetcher, resolver, extractor, diff engine, and monitor.
*/

pub mod run;
pub mod status;
