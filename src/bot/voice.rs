use songbird::Songbird;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::audio::{AudioClient, VoiceBridge, VoicePayload, VoiceServerInfo};

/// Builds the [`VoiceBridge`] that carries voice payloads to the Discord gateway.
///
/// Joining goes through songbird's gateway-only handshake; the voice server
/// credentials it yields are handed back to the audio node, which owns the
/// actual UDP connection.
pub fn songbird_bridge(manager: Arc<Songbird>, client: Arc<dyn AudioClient>) -> VoiceBridge {
    VoiceBridge::new(move |guild_id, payload| {
        let manager = manager.clone();
        let client = client.clone();

        tokio::spawn(async move {
            if let Err(e) = forward(&manager, client.as_ref(), payload).await {
                error!("❌ Error de voz en guild {}: {:?}", guild_id, e);
            }
        });
    })
}

async fn forward(
    manager: &Songbird,
    client: &dyn AudioClient,
    payload: VoicePayload,
) -> anyhow::Result<()> {
    let guild_id = payload.guild_id;

    let Some(channel_id) = payload.channel_id else {
        if manager.get(guild_id).is_some() {
            manager.remove(guild_id).await?;
            info!("👋 Desconectado de voz en guild {}", guild_id);
        }
        return Ok(());
    };

    {
        let call = manager.get_or_insert(guild_id);
        let mut call = call.lock().await;
        if let Err(e) = call.mute(payload.self_mute).await {
            warn!("⚠️ No se pudo aplicar mute en guild {}: {:?}", guild_id, e);
        }
        if let Err(e) = call.deafen(payload.self_deaf).await {
            warn!("⚠️ No se pudo aplicar deafen en guild {}: {:?}", guild_id, e);
        }
    }

    let (connection, _call) = manager.join_gateway(guild_id, channel_id).await?;
    info!("🔊 Canal de voz {} listo en guild {}", channel_id, guild_id);

    client
        .voice_update(
            guild_id,
            VoiceServerInfo {
                endpoint: connection.endpoint,
                token: connection.token,
                session_id: connection.session_id,
            },
        )
        .await?;

    Ok(())
}
