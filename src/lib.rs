//! Tune Relay: Discord playback controller in front of a Lavalink-compatible audio node.

pub mod api;
pub mod audio;
pub mod bot;
pub mod config;
pub mod errors;
