//! Configuration loading from environment.

use std::env;

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Hex-encoded AES-256 key for field encryption (64 hex characters).
    pub encryption_key: String,
    pub notify: Option<NotifyConfig>,
}

/// Push gateway settings. Absent when NOTIFY_GATEWAY_URL is unset, in which
/// case notifications stay queued and no worker is spawned.
pub struct NotifyConfig {
    pub gateway_url: String,
    pub signing_secret: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let encryption_key = env::var("ENCRYPTION_KEY").map_err(|_| {
            anyhow::anyhow!("ENCRYPTION_KEY environment variable is required (64 hex characters)")
        })?;

        let notify = match env::var("NOTIFY_GATEWAY_URL") {
            Ok(gateway_url) => {
                let signing_secret = env::var("NOTIFY_SIGNING_SECRET").map_err(|_| {
                    anyhow::anyhow!(
                        "NOTIFY_SIGNING_SECRET is required when NOTIFY_GATEWAY_URL is set"
                    )
                })?;
                Some(NotifyConfig {
                    gateway_url,
                    signing_secret,
                })
            }
            Err(_) => None,
        };

        Ok(Self {
            port,
            database_url,
            encryption_key,
            notify,
        })
    }
}
