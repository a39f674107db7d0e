use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::info;

use crate::audio::manager::SessionManager;
use crate::bot::{NotifierKey, PlayerKey};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, guild_id).await?,
        "pause" => handle_pause(ctx, command, guild_id).await?,
        "resume" => handle_resume(ctx, command, guild_id).await?,
        "skip" => handle_skip(ctx, command, guild_id).await?,
        "stop" => handle_stop(ctx, command, guild_id).await?,
        "queue" => handle_queue(ctx, command, guild_id).await?,
        "volume" => handle_volume(ctx, command, guild_id).await?,
        _ => {
            respond(ctx, &command, "❌ Comando no reconocido".to_string()).await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
) -> Result<()> {
    let url = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "url")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("URL no proporcionada"))?;

    // Defer la respuesta: resolver la URL puede tomar varios segundos
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let manager = player(ctx).await?;

    // Las notificaciones de la sesión salen por el canal de texto donde se
    // usó el comando
    {
        let data = ctx.data.read().await;
        if let Some(notifier) = data.get::<NotifierKey>() {
            notifier.register_text_channel(guild_id, command.channel_id);
        }
    }

    let voice_channel = get_user_voice_channel(ctx, guild_id, command.user.id);

    let content = match manager
        .enqueue_request(guild_id, voice_channel, url, command.user.id)
        .await
    {
        Ok(ack) => format!("➕ En cola (#{}): **{}**", ack.position, ack.title),
        Err(e) => format!("❌ {e}"),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
) -> Result<()> {
    let content = match player(ctx).await?.pause_request(guild_id).await {
        Ok(true) => "⏸️ Reproducción pausada".to_string(),
        Ok(false) => "❌ No hay nada sonando".to_string(),
        Err(e) => format!("❌ {e}"),
    };

    respond(ctx, &command, content).await
}

async fn handle_resume(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
) -> Result<()> {
    let content = match player(ctx).await?.resume_request(guild_id).await {
        Ok(true) => "▶️ Reproducción reanudada".to_string(),
        Ok(false) => "❌ No hay nada pausado".to_string(),
        Err(e) => format!("❌ {e}"),
    };

    respond(ctx, &command, content).await
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
) -> Result<()> {
    let content = match player(ctx).await?.skip_request(guild_id).await {
        Ok(()) => "⏭️ Track saltado".to_string(),
        Err(e) => format!("❌ {e}"),
    };

    respond(ctx, &command, content).await
}

async fn handle_stop(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
) -> Result<()> {
    let content = match player(ctx).await?.stop_request(guild_id).await {
        Ok(()) => "⏹️ Reproducción detenida y cola limpiada 👋".to_string(),
        Err(e) => format!("❌ {e}"),
    };

    respond(ctx, &command, content).await
}

async fn handle_queue(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
) -> Result<()> {
    let content = match player(ctx).await?.queue_request(guild_id).await {
        Ok(view) => {
            let mut lines = Vec::new();
            match &view.now_playing {
                Some(title) => lines.push(format!("🎵 Sonando ahora: **{title}**")),
                None => lines.push("😴 Nada sonando".to_string()),
            }
            if view.pending.is_empty() {
                lines.push("La cola está vacía".to_string());
            } else {
                for (i, title) in view.pending.iter().enumerate() {
                    lines.push(format!("{}. {}", i + 1, title));
                }
            }
            lines.join("\n")
        }
        Err(e) => format!("❌ {e}"),
    };

    respond(ctx, &command, content).await
}

async fn handle_volume(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
) -> Result<()> {
    let level = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Nivel no proporcionado"))?;

    let content = match player(ctx)
        .await?
        .volume_request(guild_id, level as f32 / 100.0)
        .await
    {
        Ok(()) => format!("🔊 Volumen ajustado a {level}%"),
        Err(e) => format!("❌ {e}"),
    };

    respond(ctx, &command, content).await
}

// Funciones auxiliares

async fn player(ctx: &Context) -> Result<Arc<SessionManager>> {
    let data = ctx.data.read().await;
    data.get::<PlayerKey>()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("SessionManager no inicializado"))
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: String) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;

    Ok(())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
