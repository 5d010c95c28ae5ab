use anyhow::Result;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::router::Command;
use crate::audio::{
    recorder::Recorder, search_query, AudioClient, ConnectOptions, LoadResult, PlayerUpdate,
    TrackData, VoiceBridge,
};

pub const NO_PLAYER: &str = "No player found.";
pub const NOT_IN_VOICE: &str = "You must be in a voice channel.";
pub const NO_NODES: &str = "There aren't nodes connected.";
pub const NO_MATCHES: &str = "No matches found.";
pub const RECORD_WARNING: &str = "Started recording. Be aware: This will record everything you say in the voice channel, even if the bot is deaf. Server deaf the bot if you don't want to be recorded.";

/// Opciones de voz usadas al conectar desde el chat
const PLAY_CONNECT: ConnectOptions = ConnectOptions {
    mute: false,
    deaf: true,
};

/// Who ran a command, where, and with which arguments.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub guild_id: GuildId,
    pub author_id: UserId,
    /// Voice channel the author is in, if any.
    pub voice_channel: Option<ChannelId>,
    pub args: &'a str,
}

/// Playback command handlers.
///
/// Every handler resolves the guild player, calls the audio client once and
/// returns the text to reply with. Client errors are returned as-is, except
/// for volume, pause, resume and stop, which reply regardless of the node.
pub struct PlaybackCommands {
    client: Arc<dyn AudioClient>,
    recorder: Arc<Recorder>,
    bridge: VoiceBridge,
}

impl PlaybackCommands {
    pub fn new(client: Arc<dyn AudioClient>, recorder: Arc<Recorder>, bridge: VoiceBridge) -> Self {
        Self {
            client,
            recorder,
            bridge,
        }
    }

    pub async fn dispatch(&self, command: Command, invocation: &Invocation<'_>) -> Result<String> {
        debug!(
            "Ejecutando {} en guild {} (args: {:?})",
            command.name(),
            invocation.guild_id,
            invocation.args
        );

        match command {
            Command::DecodeTrack => self.decode_track(invocation).await,
            Command::Record => self.record(invocation).await,
            Command::StopRecord => self.stop_record(invocation).await,
            Command::Play => self.play(invocation).await,
            Command::Volume => self.volume(invocation).await,
            Command::Pause => self.set_paused(invocation, true).await,
            Command::Resume => self.set_paused(invocation, false).await,
            Command::Skip => self.skip(invocation).await,
            Command::Stop => self.stop(invocation).await,
        }
    }

    async fn decode_track(&self, invocation: &Invocation<'_>) -> Result<String> {
        if !self.client.player_exists(invocation.guild_id) {
            return Ok(NO_PLAYER.to_string());
        }

        let track = self.client.decode_track(invocation.args).await?;
        Ok(serde_json::to_string_pretty(&track)?)
    }

    async fn record(&self, invocation: &Invocation<'_>) -> Result<String> {
        if !self.client.player_exists(invocation.guild_id) {
            return Ok(NO_PLAYER.to_string());
        }

        let events = self.client.listen(invocation.guild_id).await?;
        self.recorder
            .start(invocation.guild_id, invocation.author_id, events);

        Ok(RECORD_WARNING.to_string())
    }

    async fn stop_record(&self, invocation: &Invocation<'_>) -> Result<String> {
        let guild_id = invocation.guild_id;
        if !self.client.player_exists(guild_id) || !self.recorder.is_recording(guild_id) {
            return Ok(NO_PLAYER.to_string());
        }

        self.client.stop_listen(guild_id);
        self.recorder.stop(guild_id).await;

        Ok("Stopped recording.".to_string())
    }

    async fn play(&self, invocation: &Invocation<'_>) -> Result<String> {
        let Some(channel_id) = invocation.voice_channel else {
            return Ok(NOT_IN_VOICE.to_string());
        };

        if !self.client.any_node_available() {
            return Ok(NO_NODES.to_string());
        }

        let guild_id = invocation.guild_id;
        if !self.client.player_exists(guild_id) {
            self.client.create_player(guild_id);
        }

        self.client
            .connect(guild_id, channel_id, PLAY_CONNECT, self.bridge.clone())
            .await?;

        // Siempre se hace una carga nueva, aunque el player ya esté sonando
        let result = self.client.load_track(&search_query(invocation.args)).await?;
        info!(
            "🔍 Resultado {} para {:?} en guild {}",
            result.load_type(),
            invocation.args,
            guild_id
        );

        let reply = match result {
            LoadResult::Error(error) => format!(
                "Something went wrong. {}",
                error.message.unwrap_or(error.cause)
            ),
            LoadResult::Empty {} => NO_MATCHES.to_string(),
            LoadResult::Playlist(playlist)
            | LoadResult::Album(playlist)
            | LoadResult::Station(playlist)
            | LoadResult::Show(playlist)
            | LoadResult::Podcast(playlist)
            | LoadResult::Artist(playlist) => self.enqueue_all(guild_id, playlist.tracks).await?,
            LoadResult::Track(track) | LoadResult::Short(track) => {
                let reply = format!(
                    "Playing {} from {} from url search.",
                    track.info.title, track.info.source_name
                );
                self.enqueue_one(guild_id, track).await?;
                reply
            }
            LoadResult::Search(tracks) => match tracks.into_iter().next() {
                Some(track) => {
                    let reply = format!(
                        "Playing {} from {} from search.",
                        track.info.title, track.info.source_name
                    );
                    self.enqueue_one(guild_id, track).await?;
                    reply
                }
                None => NO_MATCHES.to_string(),
            },
        };

        Ok(reply)
    }

    async fn enqueue_one(&self, guild_id: GuildId, track: TrackData) -> Result<()> {
        self.client
            .update(guild_id, PlayerUpdate::Track(Some(track.encoded)))
            .await?;
        Ok(())
    }

    async fn enqueue_all(&self, guild_id: GuildId, tracks: Vec<TrackData>) -> Result<String> {
        let Some(first) = tracks.first() else {
            return Ok(NO_MATCHES.to_string());
        };

        let reply = format!(
            "Added {} songs to the queue, and playing {}.",
            tracks.len(),
            first.info.title
        );

        let encodeds = tracks.into_iter().map(|track| track.encoded).collect();
        self.client
            .update(guild_id, PlayerUpdate::Tracks(encodeds))
            .await?;

        Ok(reply)
    }

    async fn volume(&self, invocation: &Invocation<'_>) -> Result<String> {
        if !self.client.player_exists(invocation.guild_id) {
            return Ok(NO_PLAYER.to_string());
        }

        // Sin validar rango: el valor se envía tal cual al nodo
        let volume = parse_int(invocation.args);
        let reply = match volume {
            Some(volume) => format!("Volume set to {}", volume),
            None => "Volume set to NaN".to_string(),
        };

        self.send_update(invocation.guild_id, PlayerUpdate::Volume(volume))
            .await;
        Ok(reply)
    }

    /// Sends a player change whose reply does not depend on the node's answer.
    /// A rejected update is logged and the reply still goes out.
    async fn send_update(&self, guild_id: GuildId, update: PlayerUpdate) {
        if let Err(e) = self.client.update(guild_id, update.clone()).await {
            error!(
                "❌ El nodo rechazó {:?} en guild {}: {}",
                update, guild_id, e
            );
        }
    }

    async fn set_paused(&self, invocation: &Invocation<'_>, paused: bool) -> Result<String> {
        if !self.client.player_exists(invocation.guild_id) {
            return Ok(NO_PLAYER.to_string());
        }

        self.send_update(invocation.guild_id, PlayerUpdate::Paused(paused))
            .await;

        Ok(if paused { "Paused." } else { "Resumed." }.to_string())
    }

    async fn skip(&self, invocation: &Invocation<'_>) -> Result<String> {
        if !self.client.player_exists(invocation.guild_id) {
            return Ok(NO_PLAYER.to_string());
        }

        let skipped = self.client.skip_track(invocation.guild_id).await?;
        Ok(if skipped {
            "Skipped the current track."
        } else {
            "Could not skip the current track."
        }
        .to_string())
    }

    async fn stop(&self, invocation: &Invocation<'_>) -> Result<String> {
        if !self.client.player_exists(invocation.guild_id) {
            return Ok(NO_PLAYER.to_string());
        }

        self.send_update(invocation.guild_id, PlayerUpdate::Track(None))
            .await;

        Ok("Stopped the player.".to_string())
    }
}

/// Parses a leading integer the way JavaScript's `parseInt` does.
///
/// Leading whitespace and a sign are accepted, trailing garbage is ignored and
/// input without leading digits yields `None`. Out-of-range values saturate.
pub fn parse_int(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    let value = rest[..digits].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}
