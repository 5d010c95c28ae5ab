use async_trait::async_trait;
use serde::Serialize;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::info;

use crate::audio::{
    search_query, AudioClient, ConnectOptions, PlayerUpdate, QueueSnapshot, TrackInfo,
    VoiceBridge,
};
use crate::errors::{AppError, AudioError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid {field}: {value:?}")]
    InvalidId { field: &'static str, value: String },

    #[error("could not load {query:?}: {message}")]
    Load { query: String, message: String },

    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidId { .. } => AppError::BadRequest(err.to_string()),
            ServiceError::Audio(AudioError::PlayerNotFound(_)) => AppError::NotFound(err.to_string()),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub guild_id: String,
    pub paused: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedQueue {
    pub guild_id: String,
    pub cleared: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedChannel {
    pub guild_id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipOutcome {
    pub guild_id: String,
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedTracks {
    pub guild_id: String,
    pub tracks: Vec<TrackInfo>,
}

/// Playback operations behind the HTTP control API.
///
/// Ids arrive exactly as the caller sent them; parsing them is the service's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaybackService: Send + Sync {
    async fn get_queue(&self, guild_id: String) -> Result<QueueSnapshot, ServiceError>;
    async fn pause_queue(&self, guild_id: String) -> Result<PlaybackState, ServiceError>;
    async fn resume_queue(&self, guild_id: String) -> Result<PlaybackState, ServiceError>;
    async fn clear_queue(&self, guild_id: String) -> Result<ClearedQueue, ServiceError>;
    async fn join_channel(
        &self,
        guild_id: String,
        channel_id: String,
    ) -> Result<JoinedChannel, ServiceError>;
    async fn skip_song(&self, guild_id: String) -> Result<SkipOutcome, ServiceError>;
    async fn add_song(&self, guild_id: String, track: String) -> Result<AddedTracks, ServiceError>;
}

/// [`PlaybackService`] backed by the audio client.
pub struct NodeServices {
    client: Arc<dyn AudioClient>,
    bridge: VoiceBridge,
}

impl NodeServices {
    pub fn new(client: Arc<dyn AudioClient>, bridge: VoiceBridge) -> Self {
        Self { client, bridge }
    }

    async fn set_paused(&self, raw_guild: String, paused: bool) -> Result<PlaybackState, ServiceError> {
        let guild_id = parse_guild(&raw_guild)?;
        self.client
            .update(guild_id, PlayerUpdate::Paused(paused))
            .await?;

        Ok(PlaybackState {
            guild_id: guild_id.to_string(),
            paused,
        })
    }
}

#[async_trait]
impl PlaybackService for NodeServices {
    async fn get_queue(&self, guild_id: String) -> Result<QueueSnapshot, ServiceError> {
        let guild_id = parse_guild(&guild_id)?;
        Ok(self.client.queue(guild_id).await?)
    }

    async fn pause_queue(&self, guild_id: String) -> Result<PlaybackState, ServiceError> {
        self.set_paused(guild_id, true).await
    }

    async fn resume_queue(&self, guild_id: String) -> Result<PlaybackState, ServiceError> {
        self.set_paused(guild_id, false).await
    }

    async fn clear_queue(&self, guild_id: String) -> Result<ClearedQueue, ServiceError> {
        let guild_id = parse_guild(&guild_id)?;
        let cleared = self.client.clear_queue(guild_id).await?;

        Ok(ClearedQueue {
            guild_id: guild_id.to_string(),
            cleared,
        })
    }

    async fn join_channel(
        &self,
        guild_id: String,
        channel_id: String,
    ) -> Result<JoinedChannel, ServiceError> {
        let guild_id = parse_guild(&guild_id)?;
        let channel_id = ChannelId::new(parse_id("channelId", &channel_id)?);

        if !self.client.player_exists(guild_id) {
            self.client.create_player(guild_id);
        }

        self.client
            .connect(
                guild_id,
                channel_id,
                ConnectOptions {
                    mute: false,
                    deaf: true,
                },
                self.bridge.clone(),
            )
            .await?;

        info!("🔊 Uniendo a canal {} en guild {} vía API", channel_id, guild_id);
        Ok(JoinedChannel {
            guild_id: guild_id.to_string(),
            channel_id: channel_id.to_string(),
        })
    }

    async fn skip_song(&self, guild_id: String) -> Result<SkipOutcome, ServiceError> {
        let guild_id = parse_guild(&guild_id)?;
        let skipped = self.client.skip_track(guild_id).await?;

        Ok(SkipOutcome {
            guild_id: guild_id.to_string(),
            skipped,
        })
    }

    async fn add_song(&self, guild_id: String, track: String) -> Result<AddedTracks, ServiceError> {
        let guild_id = parse_guild(&guild_id)?;
        if !self.client.player_exists(guild_id) {
            return Err(AudioError::PlayerNotFound(guild_id).into());
        }

        let query = search_query(&track);
        let tracks = self
            .client
            .load_track(&query)
            .await?
            .into_selection()
            .map_err(|error| ServiceError::Load {
                query: query.clone(),
                message: error.message.unwrap_or(error.cause),
            })?;

        if !tracks.is_empty() {
            let encodeds = tracks.iter().map(|track| track.encoded.clone()).collect();
            self.client
                .update(guild_id, PlayerUpdate::Tracks(encodeds))
                .await?;
        }

        Ok(AddedTracks {
            guild_id: guild_id.to_string(),
            tracks: tracks.into_iter().map(|track| track.info).collect(),
        })
    }
}

fn parse_id(field: &'static str, raw: &str) -> Result<u64, ServiceError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| ServiceError::InvalidId {
            field,
            value: raw.to_string(),
        })
}

fn parse_guild(raw: &str) -> Result<GuildId, ServiceError> {
    parse_id("guildId", raw).map(GuildId::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::client::MockAudioClient;
    use crate::audio::model::{LoadError, TrackData};
    use crate::audio::LoadResult;
    use pretty_assertions::assert_eq;

    fn services(client: MockAudioClient) -> NodeServices {
        NodeServices::new(Arc::new(client), VoiceBridge::new(|_, _| {}))
    }

    fn track(title: &str) -> TrackData {
        serde_json::from_value(serde_json::json!({
            "encoded": format!("enc-{title}"),
            "info": {
                "identifier": title,
                "isSeekable": true,
                "author": "artist",
                "length": 1,
                "isStream": false,
                "position": 0,
                "title": title,
                "uri": null,
                "artworkUrl": null,
                "isrc": null,
                "sourceName": "youtube"
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_guild_id() {
        let result = services(MockAudioClient::new())
            .pause_queue("not-a-number".to_string())
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::InvalidId { field: "guildId", .. })
        ));
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let mut client = MockAudioClient::new();
        client
            .expect_update()
            .times(2)
            .withf(|guild_id, _| *guild_id == GuildId::new(5))
            .returning(|_, _| Ok(()));
        let services = services(client);

        let paused = services.pause_queue("5".to_string()).await.unwrap();
        let resumed = services.resume_queue("5".to_string()).await.unwrap();

        assert_eq!(
            paused,
            PlaybackState {
                guild_id: "5".to_string(),
                paused: true
            }
        );
        assert!(!resumed.paused);
    }

    #[tokio::test]
    async fn test_join_creates_player_and_connects() {
        let mut client = MockAudioClient::new();
        client.expect_player_exists().return_const(false);
        client.expect_create_player().times(1).return_const(());
        client
            .expect_connect()
            .times(1)
            .withf(|guild_id, channel_id, options, _| {
                *guild_id == GuildId::new(5) && *channel_id == ChannelId::new(6) && options.deaf
            })
            .returning(|_, _, _, _| Ok(()));

        let joined = services(client)
            .join_channel("5".to_string(), "6".to_string())
            .await
            .unwrap();
        assert_eq!(joined.channel_id, "6");
    }

    #[tokio::test]
    async fn test_add_song_enqueues_selection() {
        let mut client = MockAudioClient::new();
        client.expect_player_exists().return_const(true);
        client
            .expect_load_track()
            .times(1)
            .withf(|query| query == "ytsearch:lofi")
            .returning(|_| Ok(LoadResult::Search(vec![track("a"), track("b")])));
        client
            .expect_update()
            .times(1)
            .withf(|_, update| *update == PlayerUpdate::Tracks(vec!["enc-a".to_string()]))
            .returning(|_, _| Ok(()));

        let added = services(client)
            .add_song("5".to_string(), "lofi".to_string())
            .await
            .unwrap();
        assert_eq!(added.tracks.len(), 1);
        assert_eq!(added.tracks[0].title, "a");
    }

    #[tokio::test]
    async fn test_add_song_load_error() {
        let mut client = MockAudioClient::new();
        client.expect_player_exists().return_const(true);
        client.expect_load_track().returning(|_| {
            Ok(LoadResult::Error(LoadError {
                message: Some("blocked".to_string()),
                severity: "suspicious".to_string(),
                cause: String::new(),
            }))
        });
        client.expect_update().never();

        let result = services(client)
            .add_song("5".to_string(), "https://example.com/x".to_string())
            .await;
        match result {
            Err(ServiceError::Load { query, message }) => {
                assert_eq!(query, "https://example.com/x");
                assert_eq!(message, "blocked");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_add_song_without_player() {
        let mut client = MockAudioClient::new();
        client.expect_player_exists().return_const(false);
        client.expect_load_track().never();

        let result = services(client)
            .add_song("5".to_string(), "x".to_string())
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Audio(AudioError::PlayerNotFound(_)))
        ));
    }

    #[test]
    fn test_error_mapping() {
        let bad = AppError::from(ServiceError::InvalidId {
            field: "guildId",
            value: "x".to_string(),
        });
        assert!(matches!(bad, AppError::BadRequest(_)));

        let missing = AppError::from(ServiceError::Audio(AudioError::PlayerNotFound(
            GuildId::new(1),
        )));
        assert!(matches!(missing, AppError::NotFound(_)));

        let down = AppError::from(ServiceError::Audio(AudioError::NodeUnavailable));
        assert!(matches!(down, AppError::InternalServerError(_)));
    }
}
