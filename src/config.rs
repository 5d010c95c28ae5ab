use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Connection settings for the audio node.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub secure: bool,
    pub client_name: String,
}

impl NodeConfig {
    /// Base URL for REST calls (`http[s]://host:port`).
    pub fn rest_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Base URL for websocket connections (`ws[s]://host:port`).
    pub fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2333,
            password: "youshallnotpass".to_string(),
            secure: false,
            client_name: default_client_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,
    pub shard_count: u32,

    // Nodo de audio
    pub node: NodeConfig,

    // API HTTP
    pub http_host: String,
    pub http_port: u16,

    // Grabaciones
    pub recordings_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            command_prefix: std::env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string()),
            shard_count: std::env::var("SHARD_COUNT")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,

            // Nodo de audio
            node: NodeConfig {
                host: std::env::var("LAVALINK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: std::env::var("LAVALINK_PORT")
                    .unwrap_or_else(|_| "2333".to_string())
                    .parse()?,
                password: std::env::var("LAVALINK_PASSWORD")
                    .unwrap_or_else(|_| "youshallnotpass".to_string()),
                secure: std::env::var("LAVALINK_SECURE")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()?,
                client_name: std::env::var("LAVALINK_CLIENT_NAME")
                    .unwrap_or_else(|_| default_client_name()),
            },

            // API HTTP
            http_host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: std::env::var("HTTP_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,

            // Grabaciones
            recordings_dir: std::env::var("RECORDINGS_DIR")
                .unwrap_or_else(|_| ".".to_string())
                .into(),
        };

        std::fs::create_dir_all(&config.recordings_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The Discord token must be present
    /// - The command prefix must be non-empty and contain no whitespace
    /// - At least one shard must be started
    /// - The node port must be non-zero
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if self.command_prefix.is_empty() {
            anyhow::bail!("Command prefix must not be empty");
        }

        if self.command_prefix.chars().any(char::is_whitespace) {
            anyhow::bail!(
                "Command prefix cannot contain whitespace, got: {:?}",
                self.command_prefix
            );
        }

        if self.shard_count == 0 {
            anyhow::bail!("Shard count must be greater than 0");
        }

        if self.node.port == 0 {
            anyhow::bail!("Lavalink port must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Tokens and node passwords are never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: prefix {:?}, {} shard(s)\n  \
            Node: {}\n  \
            HTTP: {}:{}\n  \
            Recordings: {}",
            self.command_prefix,
            self.shard_count,
            self.node.rest_url(),
            self.http_host,
            self.http_port,
            self.recordings_dir.display(),
        )
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (el token no tiene valor por defecto)
            discord_token: String::new(),
            command_prefix: "!".to_string(),
            shard_count: 1,

            node: NodeConfig::default(),

            http_host: "0.0.0.0".to_string(),
            http_port: 3000,

            recordings_dir: ".".into(),
        }
    }
}

fn default_client_name() -> String {
    format!("tune-relay/{}", env!("CARGO_PKG_VERSION"))
}
