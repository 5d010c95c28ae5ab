//! # Audio Module
//!
//! Everything that talks to the audio node lives here. The bot and the HTTP
//! API only see the [`AudioClient`] trait; actual decoding and streaming happen
//! on the node.
//!
//! ## Components
//!
//! ### [`client`] - Audio client seam
//! - Per-guild player handles (existence, creation, connect)
//! - Track loading and decoding
//! - Player updates, skip, queue inspection
//! - Voice receive subscription
//!
//! ### [`node`] - Lavalink node
//! - REST calls against `/v4`
//! - Control websocket (session id, track end events)
//! - Client-side queue per guild
//!
//! ### [`recorder`] - Recording sink
//! - One subscription per guild
//! - Append-only `voice-<userId>.ogg` files, one writer per user at a time
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serenity::all::{GuildId, UserId};
//! use tune_relay::audio::{node::LavalinkNode, AudioClient, PlayerUpdate};
//! use tune_relay::config::NodeConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let node = Arc::new(LavalinkNode::new(NodeConfig::default(), UserId::new(1))?);
//! node.spawn();
//!
//! let guild_id = GuildId::new(123456789);
//! node.create_player(guild_id);
//! node.update(guild_id, PlayerUpdate::Paused(true)).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod model;
pub mod node;
pub mod recorder;

pub use client::AudioClient;
pub use model::{
    search_query, ConnectOptions, LoadResult, PlayerUpdate, QueueSnapshot, SpeakingEvent,
    SpeakingKind, TrackData, TrackInfo, VoiceBridge, VoicePayload, VoiceServerInfo,
};
