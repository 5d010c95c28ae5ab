//! # Bot Module
//!
//! Discord side of Tune Relay: a prefix command router on top of serenity's
//! [`EventHandler`], the playback command handlers and the songbird voice bridge.
//!
//! ## Architecture
//!
//! [`TuneRelayBot`] receives every guild message, resolves it through the
//! [`router::CommandTable`] and hands the result to [`commands::PlaybackCommands`],
//! which only talks to the audio node through [`AudioClient`](crate::audio::AudioClient).
//! Whatever text the handler returns is sent back to the channel the message came from.

use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Message, Ready, UserId},
    async_trait,
};
use tracing::{debug, error, info};

pub mod commands;
pub mod router;
pub mod voice;

use commands::{Invocation, PlaybackCommands};
use router::CommandTable;

/// Serenity event handler for chat commands.
pub struct TuneRelayBot {
    table: CommandTable,
    commands: PlaybackCommands,
}

impl TuneRelayBot {
    pub fn new(table: CommandTable, commands: PlaybackCommands) -> Self {
        Self { table, commands }
    }
}

#[async_trait]
impl EventHandler for TuneRelayBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
        info!("⌨️ Prefijo de comandos: {}", self.table.prefix());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let Some((command, args)) = self.table.route(msg.author.bot, &msg.content) else {
            return;
        };

        // Solo mensajes de servidor
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        debug!(
            "💬 Comando {} de {} en guild {}",
            command.name(),
            msg.author.id,
            guild_id
        );

        let invocation = Invocation {
            guild_id,
            author_id: msg.author.id,
            voice_channel: user_voice_channel(&ctx, guild_id, msg.author.id),
            args,
        };

        match self.commands.dispatch(command, &invocation).await {
            Ok(reply) => {
                if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
                    error!("Error al responder en canal {}: {:?}", msg.channel_id, e);
                }
            }
            Err(e) => {
                error!("❌ Error en comando {}: {:?}", command.name(), e);
            }
        }
    }
}

/// Voice channel the user is currently connected to, from the guild cache.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
