use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::client::AudioClient;
use super::model::{
    ConnectOptions, LoadResult, PlayerUpdate, QueueSnapshot, SpeakingEvent, SpeakingKind,
    TrackData, VoiceBridge, VoicePayload, VoiceServerInfo,
};
use crate::config::NodeConfig;
use crate::errors::AudioError;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

type NodeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Estado local de un player (modo cola)
#[derive(Debug, Clone, Default)]
struct PlayerState {
    current: Option<String>,
    queue: VecDeque<String>,
    paused: bool,
    volume: Option<i64>,
    channel_id: Option<ChannelId>,
    options: ConnectOptions,
}

/// Mensajes del websocket de control del nodo
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum NodeMessage {
    #[serde(rename_all = "camelCase")]
    Ready {
        session_id: String,
        #[serde(default)]
        resumed: bool,
    },
    #[serde(rename_all = "camelCase")]
    Event {
        #[serde(rename = "type")]
        kind: String,
        guild_id: String,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        track: Option<EndedTrack>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct EndedTrack {
    encoded: String,
}

#[derive(Debug, Deserialize)]
struct SpeakFrame {
    op: String,
    #[serde(rename = "type")]
    kind: String,
    data: SpeakData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeakData {
    user_id: String,
    guild_id: String,
    #[serde(default)]
    data: String,
}

/// Lavalink v4 / NodeLink client with a client-side queue per guild.
pub struct LavalinkNode {
    http: reqwest::Client,
    config: NodeConfig,
    user_id: UserId,
    session_id: RwLock<Option<String>>,
    players: DashMap<GuildId, PlayerState>,
    listeners: DashMap<GuildId, CancellationToken>,
}

impl LavalinkNode {
    pub fn new(config: NodeConfig, user_id: UserId) -> Result<Self, AudioError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(config.client_name.clone())
            .build()?;

        Ok(Self {
            http,
            config,
            user_id,
            session_id: RwLock::new(None),
            players: DashMap::new(),
            listeners: DashMap::new(),
        })
    }

    /// Spawns the control websocket loop; it reconnects after every disconnect.
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match node.run_session().await {
                    Ok(()) => warn!("🔌 Conexión con el nodo cerrada"),
                    Err(e) => error!("❌ Error en la conexión con el nodo: {}", e),
                }

                node.session_id.write().take();
                info!(
                    "🔄 Reintentando conexión con el nodo en {}s",
                    RECONNECT_DELAY.as_secs()
                );
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        })
    }

    async fn run_session(&self) -> Result<(), AudioError> {
        let mut request = format!("{}/v4/websocket", self.config.ws_url()).into_client_request()?;
        let headers = request.headers_mut();
        headers.insert("Authorization", HeaderValue::from_str(&self.config.password)?);
        headers.insert("User-Id", HeaderValue::from(self.user_id.get()));
        headers.insert("Client-Name", HeaderValue::from_str(&self.config.client_name)?);

        info!("🎼 Conectando al nodo en {}", self.config.ws_url());
        let (mut stream, _) = tokio_tungstenite::connect_async(request).await?;

        while let Some(frame) = stream.next().await {
            match frame? {
                Message::Text(text) => self.handle_frame(&text).await,
                Message::Close(reason) => {
                    debug!("Nodo cerró el websocket: {:?}", reason);
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }

    pub(crate) async fn handle_frame(&self, text: &str) {
        let message = match serde_json::from_str::<NodeMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                debug!("Mensaje del nodo ignorado ({}): {}", e, text);
                return;
            }
        };

        match message {
            NodeMessage::Ready { session_id, resumed } => {
                info!("✅ Nodo listo (sesión {}, reanudada: {})", session_id, resumed);
                *self.session_id.write() = Some(session_id);

                // Una sesión nueva no conserva ningún track activo
                if !resumed {
                    for mut state in self.players.iter_mut() {
                        state.current = None;
                    }
                }
            }
            NodeMessage::Event {
                kind,
                guild_id,
                reason,
                track,
            } if kind == "TrackEndEvent" => {
                let Some(guild_id) = parse_guild_id(&guild_id) else {
                    warn!("guildId inválido en evento del nodo: {}", guild_id);
                    return;
                };

                match reason.as_deref() {
                    Some("replaced") => {}
                    Some("finished" | "loadFailed") => self.advance(guild_id).await,
                    _ => self.track_ended(guild_id, track.map(|track| track.encoded)),
                }
            }
            NodeMessage::Event { kind, .. } => debug!("Evento del nodo: {}", kind),
            NodeMessage::Other => {}
        }
    }

    /// Reproduce el siguiente track de la cola cuando termina el actual
    async fn advance(&self, guild_id: GuildId) {
        let next = match self.players.get_mut(&guild_id) {
            Some(mut state) => {
                state.current = state.queue.pop_front();
                state.current.clone()
            }
            None => return,
        };

        if let Some(encoded) = next {
            if let Err(e) = self.play_encoded(guild_id, Some(&encoded)).await {
                error!("Error al reproducir siguiente track en guild {}: {}", guild_id, e);
            }
        } else {
            debug!("Cola vacía para guild {}", guild_id);
        }
    }

    /// Marca el player como libre si el track terminado sigue siendo el actual
    fn track_ended(&self, guild_id: GuildId, encoded: Option<String>) {
        if let Some(mut state) = self.players.get_mut(&guild_id) {
            let is_current = match &encoded {
                Some(encoded) => state.current.as_ref() == Some(encoded),
                None => true,
            };
            if is_current {
                state.current = None;
                debug!("Player libre en guild {}", guild_id);
            }
        }
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    fn endpoint(&self, path_and_query: &str) -> Result<Url, AudioError> {
        Ok(Url::parse(&format!("{}{}", self.config.rest_url(), path_and_query))?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, AudioError> {
        let response = self
            .http
            .get(url)
            .header("Authorization", &self.config.password)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn patch_player(
        &self,
        guild_id: GuildId,
        body: serde_json::Value,
    ) -> Result<(), AudioError> {
        let session_id = self.session_id().ok_or(AudioError::NodeUnavailable)?;
        let url = self.endpoint(&format!(
            "/v4/sessions/{}/players/{}?noReplace=false",
            session_id, guild_id
        ))?;

        let response = self
            .http
            .patch(url)
            .header("Authorization", &self.config.password)
            .json(&body)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn play_encoded(&self, guild_id: GuildId, encoded: Option<&str>) -> Result<(), AudioError> {
        self.patch_player(guild_id, json!({ "track": { "encoded": encoded } }))
            .await
    }

    async fn open_voice_stream(&self, guild_id: GuildId) -> Result<NodeStream, AudioError> {
        let mut request =
            format!("{}/connection/data", self.config.ws_url()).into_client_request()?;
        let headers = request.headers_mut();
        headers.insert("Authorization", HeaderValue::from_str(&self.config.password)?);
        headers.insert("user-id", HeaderValue::from(self.user_id.get()));
        headers.insert("guild-id", HeaderValue::from(guild_id.get()));
        headers.insert("Client-Name", HeaderValue::from_str(&self.config.client_name)?);

        let (stream, _) = tokio_tungstenite::connect_async(request).await?;
        Ok(stream)
    }
}

#[async_trait]
impl AudioClient for LavalinkNode {
    fn any_node_available(&self) -> bool {
        self.session_id.read().is_some()
    }

    fn player_exists(&self, guild_id: GuildId) -> bool {
        self.players.contains_key(&guild_id)
    }

    fn create_player(&self, guild_id: GuildId) {
        self.players.entry(guild_id).or_default();
        debug!("Player creado para guild {}", guild_id);
    }

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        options: ConnectOptions,
        bridge: VoiceBridge,
    ) -> Result<(), AudioError> {
        {
            let mut state = self
                .players
                .get_mut(&guild_id)
                .ok_or(AudioError::PlayerNotFound(guild_id))?;
            state.channel_id = Some(channel_id);
            state.options = options;
        }

        bridge.send(
            guild_id,
            VoicePayload {
                guild_id,
                channel_id: Some(channel_id),
                self_mute: options.mute,
                self_deaf: options.deaf,
            },
        );

        Ok(())
    }

    async fn voice_update(
        &self,
        guild_id: GuildId,
        info: VoiceServerInfo,
    ) -> Result<(), AudioError> {
        self.patch_player(
            guild_id,
            json!({
                "voice": {
                    "token": info.token,
                    "endpoint": info.endpoint,
                    "sessionId": info.session_id,
                }
            }),
        )
        .await?;

        info!("🔊 Voz enviada al nodo para guild {}", guild_id);
        Ok(())
    }

    async fn load_track(&self, query: &str) -> Result<LoadResult, AudioError> {
        let url = self.endpoint(&format!(
            "/v4/loadtracks?identifier={}",
            urlencoding::encode(query)
        ))?;

        let result: LoadResult = self.get_json(url).await?;
        debug!("loadtracks {:?} -> {}", query, result.load_type());
        Ok(result)
    }

    async fn decode_track(&self, encoded: &str) -> Result<TrackData, AudioError> {
        let url = self.endpoint(&format!(
            "/v4/decodetrack?encodedTrack={}",
            urlencoding::encode(encoded)
        ))?;

        self.get_json(url).await
    }

    async fn update(&self, guild_id: GuildId, update: PlayerUpdate) -> Result<(), AudioError> {
        // Resolver el cambio sin mantener el lock durante el request
        let body = {
            let mut state = self
                .players
                .get_mut(&guild_id)
                .ok_or(AudioError::PlayerNotFound(guild_id))?;

            match update {
                PlayerUpdate::Paused(paused) => {
                    state.paused = paused;
                    Some(json!({ "paused": paused }))
                }
                PlayerUpdate::Volume(volume) => {
                    state.volume = volume;
                    Some(json!({ "volume": volume }))
                }
                PlayerUpdate::Track(None) => {
                    state.current = None;
                    Some(json!({ "track": { "encoded": null } }))
                }
                PlayerUpdate::Track(Some(encoded)) => {
                    if state.current.is_none() {
                        state.current = Some(encoded.clone());
                        Some(json!({ "track": { "encoded": encoded } }))
                    } else {
                        state.queue.push_back(encoded);
                        None
                    }
                }
                PlayerUpdate::Tracks(encodeds) => {
                    state.queue.extend(encodeds);
                    if state.current.is_none() {
                        state.current = state.queue.pop_front();
                        state
                            .current
                            .clone()
                            .map(|encoded| json!({ "track": { "encoded": encoded } }))
                    } else {
                        None
                    }
                }
            }
        };

        match body {
            Some(body) => self.patch_player(guild_id, body).await,
            None => Ok(()),
        }
    }

    async fn skip_track(&self, guild_id: GuildId) -> Result<bool, AudioError> {
        let next = {
            let mut state = self
                .players
                .get_mut(&guild_id)
                .ok_or(AudioError::PlayerNotFound(guild_id))?;

            match state.queue.pop_front() {
                Some(next) => {
                    state.current = Some(next.clone());
                    next
                }
                None => return Ok(false),
            }
        };

        self.play_encoded(guild_id, Some(&next)).await?;
        Ok(true)
    }

    async fn queue(&self, guild_id: GuildId) -> Result<QueueSnapshot, AudioError> {
        let state = self
            .players
            .get(&guild_id)
            .ok_or(AudioError::PlayerNotFound(guild_id))?;

        Ok(QueueSnapshot {
            guild_id: guild_id.to_string(),
            current: state.current.clone(),
            queue: state.queue.iter().cloned().collect(),
            paused: state.paused,
            volume: state.volume,
        })
    }

    async fn clear_queue(&self, guild_id: GuildId) -> Result<usize, AudioError> {
        let mut state = self
            .players
            .get_mut(&guild_id)
            .ok_or(AudioError::PlayerNotFound(guild_id))?;

        let cleared = state.queue.len();
        state.queue.clear();
        Ok(cleared)
    }

    async fn listen(
        &self,
        guild_id: GuildId,
    ) -> Result<flume::Receiver<SpeakingEvent>, AudioError> {
        if !self.player_exists(guild_id) {
            return Err(AudioError::PlayerNotFound(guild_id));
        }

        let stream = self.open_voice_stream(guild_id).await?;
        let (tx, rx) = flume::unbounded();
        let token = CancellationToken::new();

        if let Some(previous) = self.listeners.insert(guild_id, token.clone()) {
            previous.cancel();
        }

        tokio::spawn(forward_speaking(guild_id, stream, tx, token));
        info!("🎙️ Escuchando voz en guild {}", guild_id);
        Ok(rx)
    }

    fn stop_listen(&self, guild_id: GuildId) -> bool {
        match self.listeners.remove(&guild_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AudioError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AudioError::Status {
        status: status.as_u16(),
        body,
    })
}

fn parse_guild_id(raw: &str) -> Option<GuildId> {
    raw.parse::<u64>().ok().filter(|id| *id != 0).map(GuildId::new)
}

fn parse_speaking(text: &str) -> Option<SpeakingEvent> {
    let frame: SpeakFrame = serde_json::from_str(text).ok()?;
    if frame.op != "speak" {
        return None;
    }

    let kind = match frame.kind.as_str() {
        "startSpeakingEvent" => SpeakingKind::Start,
        "endSpeakingEvent" => SpeakingKind::End,
        _ => return None,
    };

    let user_id = frame
        .data
        .user_id
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(UserId::new)?;

    Some(SpeakingEvent {
        user_id,
        guild_id: parse_guild_id(&frame.data.guild_id)?,
        kind,
        data: frame.data.data,
    })
}

async fn forward_speaking(
    guild_id: GuildId,
    mut stream: NodeStream,
    tx: flume::Sender<SpeakingEvent>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = parse_speaking(&text) {
                        if tx.send_async(event).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!("Error en stream de voz de guild {}: {}", guild_id, e);
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    let _ = stream.close(None).await;
    debug!("Stream de voz cerrado para guild {}", guild_id);
}
