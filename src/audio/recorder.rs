use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dashmap::DashMap;
use serenity::model::id::{GuildId, UserId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::model::{SpeakingEvent, SpeakingKind};

/// Una sesión de grabación activa
struct RecordingSession {
    user_id: UserId,
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Writes received voice data to `voice-<userId>.ogg` files.
///
/// Each guild has at most one active session. Writes to the same file are
/// serialized by a per-user lock and always open the file in append mode.
pub struct Recorder {
    dir: PathBuf,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
    sessions: DashMap<GuildId, RecordingSession>,
}

impl Recorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, user_id: UserId) -> PathBuf {
        self.dir.join(format!("voice-{}.ogg", user_id))
    }

    pub fn is_recording(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    /// Starts writing the `End` chunks of `events` into the file of `user_id`.
    ///
    /// An active session for the same guild is cancelled first.
    pub fn start(
        self: &Arc<Self>,
        guild_id: GuildId,
        user_id: UserId,
        events: flume::Receiver<SpeakingEvent>,
    ) {
        let token = CancellationToken::new();
        let recorder = Arc::clone(self);
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    event = events.recv_async() => match event {
                        Ok(event) if event.kind == SpeakingKind::End => {
                            if let Err(e) = recorder.append(user_id, &event.data).await {
                                error!("Error al guardar audio de {}: {:?}", user_id, e);
                            }
                        }
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }
            }
            debug!("Sesión de grabación terminada en guild {}", guild_id);
        });

        let session = RecordingSession {
            user_id,
            token,
            task,
        };

        if let Some(previous) = self.sessions.insert(guild_id, session) {
            previous.token.cancel();
        }

        info!(
            "⏺️ Grabación iniciada en guild {} -> {}",
            guild_id,
            self.path_for(user_id).display()
        );
    }

    /// Cancels the guild's session and waits for its pending write.
    /// Returns `false` if nothing was recording.
    pub async fn stop(&self, guild_id: GuildId) -> bool {
        let session = self.sessions.remove(&guild_id).map(|(_, session)| session);
        match session {
            Some(session) => {
                session.token.cancel();
                if let Err(e) = session.task.await {
                    error!("Tarea de grabación falló en guild {}: {:?}", guild_id, e);
                }
                self.release_lock(session.user_id);
                info!(
                    "⏹️ Grabación detenida en guild {} (usuario {})",
                    guild_id, session.user_id
                );
                true
            }
            None => false,
        }
    }

    /// Drops the user's write lock once no session or pending write holds it.
    fn release_lock(&self, user_id: UserId) {
        if self.sessions.iter().any(|session| session.user_id == user_id) {
            return;
        }
        self.locks
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Decodes a base64 chunk and appends it to the user's file.
    pub async fn append(&self, user_id: UserId, chunk: &str) -> Result<usize> {
        let bytes = STANDARD
            .decode(chunk.trim())
            .context("Chunk de audio no es base64 válido")?;

        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let path = self.path_for(user_id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("No se pudo abrir {}", path.display()))?;

        file.write_all(&bytes).await?;
        file.flush().await?;

        debug!("{} bytes agregados a {}", bytes.len(), path.display());
        Ok(bytes.len())
    }

    /// Waits for the guild's session to drain its stream.
    #[cfg(test)]
    async fn wait(&self, guild_id: GuildId) {
        if let Some((_, session)) = self.sessions.remove(&guild_id) {
            let _ = session.task.await;
        }
    }
}
