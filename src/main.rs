use anyhow::Result;
use serenity::{all::ApplicationId, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod sources;

use crate::audio::driver::SongbirdTransport;
use crate::audio::manager::SessionManager;
use crate::bot::notify::DiscordNotifier;
use crate::bot::{NotifierKey, PlayerKey, WaveQueueBot};
use crate::config::Config;
use crate::sources::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wavequeue=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando WaveQueue v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    // Resolver de URLs (yt-dlp); avisar temprano si el binario no está
    let resolver = Arc::new(YtDlpResolver::new(
        config.ytdlp_bin.clone(),
        config.cookies_file.clone(),
    ));
    if let Err(e) = resolver.verify_available().await {
        warn!("⚠️ yt-dlp no disponible todavía: {}", e);
    }

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // Crear handler del bot
    let handler = WaveQueueBot::new(config.clone());

    // Construir cliente
    let songbird = Songbird::serenity();
    let mut client = Client::builder(&config.discord_token, intents)
        .application_id(ApplicationId::new(config.application_id))
        .event_handler(handler)
        .register_songbird_with(songbird.clone())
        .await?;

    // Armar el núcleo de reproducción e inyectarlo en el contexto del cliente
    let notifier = DiscordNotifier::new(client.http.clone());
    let transport = Arc::new(SongbirdTransport::new(songbird, reqwest::Client::new()));
    let manager = SessionManager::new(
        transport,
        resolver,
        notifier.clone(),
        config.player_settings(),
    );

    {
        let mut data = client.data.write().await;
        data.insert::<PlayerKey>(manager);
        data.insert::<NotifierKey>(notifier);
    }

    // Manejar shutdown graceful
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        std::process::exit(0);
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
