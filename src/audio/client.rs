use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};

use super::model::{
    ConnectOptions, LoadResult, PlayerUpdate, QueueSnapshot, SpeakingEvent, TrackData,
    VoiceBridge, VoiceServerInfo,
};
use crate::errors::AudioError;

/// Client for the external audio node.
///
/// Player state lives behind this trait; callers re-check existence on every
/// command instead of caching it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioClient: Send + Sync {
    /// Whether at least one node is connected and ready.
    fn any_node_available(&self) -> bool;

    fn player_exists(&self, guild_id: GuildId) -> bool;

    fn create_player(&self, guild_id: GuildId);

    /// Joins `channel_id`, sending the voice payload through `bridge`.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        options: ConnectOptions,
        bridge: VoiceBridge,
    ) -> Result<(), AudioError>;

    /// Hands the voice server credentials for `guild_id` to the node.
    async fn voice_update(&self, guild_id: GuildId, info: VoiceServerInfo)
        -> Result<(), AudioError>;

    async fn load_track(&self, query: &str) -> Result<LoadResult, AudioError>;

    async fn decode_track(&self, encoded: &str) -> Result<TrackData, AudioError>;

    async fn update(&self, guild_id: GuildId, update: PlayerUpdate) -> Result<(), AudioError>;

    /// Plays the next queued track. Returns `false` when nothing is queued.
    async fn skip_track(&self, guild_id: GuildId) -> Result<bool, AudioError>;

    async fn queue(&self, guild_id: GuildId) -> Result<QueueSnapshot, AudioError>;

    /// Drops every queued track, returning how many were removed.
    async fn clear_queue(&self, guild_id: GuildId) -> Result<usize, AudioError>;

    /// Subscribes to the guild's voice receive stream.
    async fn listen(&self, guild_id: GuildId)
        -> Result<flume::Receiver<SpeakingEvent>, AudioError>;

    /// Cancels the voice receive subscription. Returns `false` if none was active.
    fn stop_listen(&self, guild_id: GuildId) -> bool;
}
