//! # Bot Module
//!
//! Discord-facing glue for WaveQueue.
//!
//! This module contains no playback state of its own: it registers the
//! slash commands, translates interactions into typed requests against the
//! [`SessionManager`](crate::audio::manager::SessionManager), and cleans up
//! sessions when the bot is kicked out of a voice channel. All playback
//! decisions live in [`crate::audio`].

use std::sync::Arc;

use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
    prelude::TypeMapKey,
};
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notify;

use crate::audio::manager::SessionManager;
use crate::bot::notify::DiscordNotifier;
use crate::config::Config;

/// Clave del `SessionManager` dentro del TypeMap del cliente.
pub struct PlayerKey;

impl TypeMapKey for PlayerKey {
    type Value = Arc<SessionManager>;
}

/// Clave del sink de notificaciones dentro del TypeMap del cliente.
pub struct NotifierKey;

impl TypeMapKey for NotifierKey {
    type Value = Arc<DiscordNotifier>;
}

/// Handler principal de eventos de Discord.
pub struct WaveQueueBot {
    config: Arc<Config>,
}

impl WaveQueueBot {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Registra los comandos slash, globales o por guild según configuración.
    async fn register_commands(&self, ctx: &Context) -> anyhow::Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for WaveQueueBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Limpia la sesión cuando el bot es desconectado del canal de voz por
    /// fuera de sus propios comandos (kick, canal borrado, etc.).
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot desconectado en guild {}", guild_id);

                let manager = {
                    let data = ctx.data.read().await;
                    data.get::<PlayerKey>().cloned()
                };
                if let Some(manager) = manager {
                    manager.teardown(guild_id).await;
                }
            }
        }
    }
}
