use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

use tune_relay::api::{self, services::NodeServices};
use tune_relay::audio::{node::LavalinkNode, recorder::Recorder, AudioClient};
use tune_relay::bot::{
    commands::PlaybackCommands, router::CommandTable, voice::songbird_bridge, TuneRelayBot,
};
use tune_relay::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tune_relay=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Tune Relay v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("⚙️ {}", config.summary());

    let user_id = Http::new(&config.discord_token)
        .get_current_user()
        .await?
        .id;

    // Nodo de audio
    let node = Arc::new(LavalinkNode::new(config.node.clone(), user_id)?);
    node.spawn();
    let client: Arc<dyn AudioClient> = node;

    let songbird = Songbird::serenity();
    let bridge = songbird_bridge(songbird.clone(), client.clone());
    let recorder = Arc::new(Recorder::new(config.recordings_dir.clone()));

    // API HTTP
    let app = api::router(Arc::new(NodeServices::new(client.clone(), bridge.clone())));
    let listener = tokio::net::TcpListener::bind(config.http_addr()).await?;
    info!("🌐 API escuchando en {}", config.http_addr());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("❌ Error en servidor HTTP: {:?}", e);
        }
    });

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = TuneRelayBot::new(
        CommandTable::new(config.command_prefix.clone()),
        PlaybackCommands::new(client, recorder, bridge),
    );

    let mut discord = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = discord.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Iniciando {} shard(s)", config.shard_count);
    if let Err(why) = discord.start_shards(config.shard_count).await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
