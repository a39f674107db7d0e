use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::audio::manager::PlayerSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Reproducción
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub auto_disconnect_on_empty: bool,

    // Resolución de URLs
    pub ytdlp_bin: String,
    pub cookies_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Reproducción
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            auto_disconnect_on_empty: std::env::var("AUTO_DISCONNECT_ON_EMPTY")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,

            // Resolución de URLs
            ytdlp_bin: std::env::var("YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string()),
            cookies_file: std::env::var("COOKIES_FILE").ok().map(PathBuf::from),
        };

        config.validate()?;

        Ok(config)
    }

    /// Chequeos de sanidad sobre los valores cargados.
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if let Some(cookies) = &self.cookies_file {
            if !cookies.is_file() {
                anyhow::bail!("Cookies file not found: {}", cookies.display());
            }
        }

        Ok(())
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            default_volume: self.default_volume,
            max_queue_size: self.max_queue_size,
            auto_disconnect_on_empty: self.auto_disconnect_on_empty,
        }
    }

    /// Resumen sin secretos, para el log de arranque.
    pub fn summary(&self) -> String {
        format!(
            "Config: app {} (guild: {}), vol {}%, cola máx {}, auto-desconexión {}",
            self.application_id,
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.auto_disconnect_on_empty,
        )
    }
}

/// Valores por defecto cuando las variables de entorno no están.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults - deben proveerse)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: 100,
            auto_disconnect_on_empty: true,

            ytdlp_bin: "yt-dlp".to_string(),
            cookies_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn volume_out_of_range_is_rejected() {
        let config = Config {
            default_volume: 3.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_queue_size_is_rejected() {
        let config = Config {
            max_queue_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn settings_mirror_config() {
        let config = Config {
            default_volume: 0.8,
            max_queue_size: 7,
            auto_disconnect_on_empty: false,
            ..Config::default()
        };
        let settings = config.player_settings();

        assert_eq!(settings.default_volume, 0.8);
        assert_eq!(settings.max_queue_size, 7);
        assert!(!settings.auto_disconnect_on_empty);
    }
}
