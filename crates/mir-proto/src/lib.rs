//! Shared core for the MIR radio player: timed-metadata decoding, now-playing
//! reconciliation, configuration and the JSON view served to the web UI.

pub mod config;
pub mod fallback;
pub mod id3;
pub mod metadata;
pub mod platform;
pub mod protocol;
pub mod scrape;
pub mod session;
