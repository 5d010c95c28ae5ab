use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::fmt;
use std::sync::Arc;

/// Prefix the node uses to run a YouTube search instead of resolving a URL.
pub const SEARCH_PREFIX: &str = "ytsearch:";

/// Builds the identifier handed to `loadtracks`.
///
/// Inputs starting with `https://` are treated as direct URLs, everything else
/// becomes a search query.
pub fn search_query(input: &str) -> String {
    if input.starts_with("https://") {
        input.to_string()
    } else {
        format!("{}{}", SEARCH_PREFIX, input)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    pub length: u64,
    pub is_stream: bool,
    pub position: u64,
    pub title: String,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub source_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackData {
    pub encoded: String,
    pub info: TrackInfo,
    #[serde(default)]
    pub plugin_info: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub name: String,
    #[serde(default = "no_selection")]
    pub selected_track: i64,
}

fn no_selection() -> i64 {
    -1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistData {
    pub info: PlaylistInfo,
    #[serde(default)]
    pub plugin_info: serde_json::Value,
    pub tracks: Vec<TrackData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadError {
    pub message: Option<String>,
    pub severity: String,
    #[serde(default)]
    pub cause: String,
}

/// Result of a `loadtracks` request, tagged by `loadType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "lowercase")]
pub enum LoadResult {
    Track(TrackData),
    Short(TrackData),
    Playlist(PlaylistData),
    Album(PlaylistData),
    Station(PlaylistData),
    Show(PlaylistData),
    Podcast(PlaylistData),
    Artist(PlaylistData),
    Search(Vec<TrackData>),
    Empty {},
    Error(LoadError),
}

impl LoadResult {
    /// Payload of any playlist-family result (playlist, album, station, show, podcast, artist).
    pub fn playlist(&self) -> Option<&PlaylistData> {
        match self {
            LoadResult::Playlist(p)
            | LoadResult::Album(p)
            | LoadResult::Station(p)
            | LoadResult::Show(p)
            | LoadResult::Podcast(p)
            | LoadResult::Artist(p) => Some(p),
            _ => None,
        }
    }

    /// Tracks a load should enqueue: every track of a playlist-family result,
    /// the single track of `track`/`short`, the first search hit.
    pub fn into_selection(self) -> Result<Vec<TrackData>, LoadError> {
        match self {
            LoadResult::Track(track) | LoadResult::Short(track) => Ok(vec![track]),
            LoadResult::Search(tracks) => Ok(tracks.into_iter().take(1).collect()),
            LoadResult::Playlist(p)
            | LoadResult::Album(p)
            | LoadResult::Station(p)
            | LoadResult::Show(p)
            | LoadResult::Podcast(p)
            | LoadResult::Artist(p) => Ok(p.tracks),
            LoadResult::Empty {} => Ok(Vec::new()),
            LoadResult::Error(error) => Err(error),
        }
    }

    pub fn load_type(&self) -> &'static str {
        match self {
            LoadResult::Track(_) => "track",
            LoadResult::Short(_) => "short",
            LoadResult::Playlist(_) => "playlist",
            LoadResult::Album(_) => "album",
            LoadResult::Station(_) => "station",
            LoadResult::Show(_) => "show",
            LoadResult::Podcast(_) => "podcast",
            LoadResult::Artist(_) => "artist",
            LoadResult::Search(_) => "search",
            LoadResult::Empty {} => "empty",
            LoadResult::Error(_) => "error",
        }
    }
}

/// A change requested on a guild player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerUpdate {
    Paused(bool),
    /// `None` is an unparsable volume, forwarded as-is.
    Volume(Option<i64>),
    /// `None` stops the active track.
    Track(Option<String>),
    /// Encoded tracks to enqueue.
    Tracks(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectOptions {
    pub mute: bool,
    pub deaf: bool,
}

/// Voice-state change the audio client asks the chat transport to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePayload {
    pub guild_id: GuildId,
    /// `None` leaves the current voice channel.
    pub channel_id: Option<ChannelId>,
    pub self_mute: bool,
    pub self_deaf: bool,
}

/// Voice server credentials returned by the chat transport after joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceServerInfo {
    pub endpoint: String,
    pub token: String,
    pub session_id: String,
}

/// Forwards voice payloads from the audio client to the chat gateway.
#[derive(Clone)]
pub struct VoiceBridge(Arc<dyn Fn(GuildId, VoicePayload) + Send + Sync>);

impl VoiceBridge {
    pub fn new<F>(send: F) -> Self
    where
        F: Fn(GuildId, VoicePayload) + Send + Sync + 'static,
    {
        Self(Arc::new(send))
    }

    pub fn send(&self, guild_id: GuildId, payload: VoicePayload) {
        (self.0)(guild_id, payload)
    }
}

impl fmt::Debug for VoiceBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VoiceBridge")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakingKind {
    Start,
    End,
}

/// One utterance boundary reported by the node's voice receive stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakingEvent {
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub kind: SpeakingKind,
    /// Base64 encoded audio, only populated on `End`.
    pub data: String,
}

/// Point-in-time view of a guild player and its queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub guild_id: String,
    pub current: Option<String>,
    pub queue: Vec<String>,
    pub paused: bool,
    pub volume: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn track_json(title: &str) -> serde_json::Value {
        json!({
            "encoded": format!("enc-{title}"),
            "info": {
                "identifier": "id",
                "isSeekable": true,
                "author": "someone",
                "length": 1000,
                "isStream": false,
                "position": 0,
                "title": title,
                "uri": null,
                "artworkUrl": null,
                "isrc": null,
                "sourceName": "youtube"
            },
            "pluginInfo": {},
            "userData": {}
        })
    }

    #[test]
    fn test_search_query() {
        assert_eq!(search_query("never gonna"), "ytsearch:never gonna");
        assert_eq!(
            search_query("https://youtu.be/dQw4w9WgXcQ"),
            "https://youtu.be/dQw4w9WgXcQ"
        );
        // Solo https cuenta como URL directa
        assert_eq!(
            search_query("http://example.com/a.mp3"),
            "ytsearch:http://example.com/a.mp3"
        );
    }

    #[test]
    fn test_load_result_tags() {
        let search: LoadResult = serde_json::from_value(json!({
            "loadType": "search",
            "data": [track_json("a"), track_json("b")]
        }))
        .unwrap();
        match &search {
            LoadResult::Search(tracks) => assert_eq!(tracks.len(), 2),
            other => panic!("unexpected {other:?}"),
        }

        let empty: LoadResult =
            serde_json::from_value(json!({"loadType": "empty", "data": {}})).unwrap();
        assert_eq!(empty, LoadResult::Empty {});

        let error: LoadResult = serde_json::from_value(json!({
            "loadType": "error",
            "data": {"message": "boom", "severity": "common", "cause": "x"}
        }))
        .unwrap();
        assert_eq!(error.load_type(), "error");

        let album: LoadResult = serde_json::from_value(json!({
            "loadType": "album",
            "data": {
                "info": {"name": "Album", "selectedTrack": -1},
                "pluginInfo": {},
                "tracks": [track_json("first")]
            }
        }))
        .unwrap();
        assert_eq!(album.playlist().unwrap().tracks[0].info.title, "first");

        let short: LoadResult =
            serde_json::from_value(json!({"loadType": "short", "data": track_json("s")})).unwrap();
        assert!(short.playlist().is_none());
        assert_eq!(short.load_type(), "short");
    }

    #[test]
    fn test_into_selection() {
        let search: LoadResult = serde_json::from_value(json!({
            "loadType": "search",
            "data": [track_json("a"), track_json("b")]
        }))
        .unwrap();
        let selected = search.into_selection().unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].info.title, "a");

        let playlist: LoadResult = serde_json::from_value(json!({
            "loadType": "playlist",
            "data": {
                "info": {"name": "Mix"},
                "tracks": [track_json("x"), track_json("y")]
            }
        }))
        .unwrap();
        assert_eq!(playlist.into_selection().unwrap().len(), 2);

        assert!(LoadResult::Empty {}.into_selection().unwrap().is_empty());

        let error = LoadResult::Error(LoadError {
            message: Some("nope".to_string()),
            severity: "fault".to_string(),
            cause: String::new(),
        });
        assert_eq!(error.into_selection().unwrap_err().message.as_deref(), Some("nope"));
    }

    #[test]
    fn test_voice_bridge_forwards() {
        let (tx, rx) = flume::unbounded();
        let bridge = VoiceBridge::new(move |guild_id, payload| {
            let _ = tx.send((guild_id, payload));
        });

        let payload = VoicePayload {
            guild_id: GuildId::new(1),
            channel_id: Some(ChannelId::new(2)),
            self_mute: false,
            self_deaf: true,
        };
        bridge.send(GuildId::new(1), payload.clone());

        assert_eq!(rx.try_recv().unwrap(), (GuildId::new(1), payload));
    }
}
