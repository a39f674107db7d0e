use std::sync::{Arc, Weak};

use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::audio::error::PlayerError;
use crate::audio::events::EventSink;
use crate::audio::pipeline::{VoiceTarget, VoiceTransport};
use crate::audio::session::{QueueView, VoiceSession};
use crate::sources::MediaResolver;

/// Parámetros de reproducción, derivados de la configuración del bot.
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub default_volume: f32,
    pub max_queue_size: usize,
    /// Desconectarse solo cuando la cola se agota (`!stop` implícito).
    pub auto_disconnect_on_empty: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            max_queue_size: 100,
            auto_disconnect_on_empty: true,
        }
    }
}

/// Confirmación de un enqueue exitoso.
#[derive(Debug, Clone)]
pub struct QueuedAck {
    pub title: String,
    pub position: usize,
}

/// Mapea cada guild a su sesión de voz activa y expone la API de peticiones
/// que consume el dispatcher de comandos.
///
/// Las sesiones de guilds distintas son independientes entre sí; acá solo
/// vive el mapa y la política de auto-desconexión cuando una sesión avisa
/// que se quedó sin cola.
pub struct SessionManager {
    sessions: DashMap<GuildId, Arc<VoiceSession>>,
    transport: Arc<dyn VoiceTransport>,
    resolver: Arc<dyn MediaResolver>,
    events: Arc<dyn EventSink>,
    settings: PlayerSettings,
    drained_tx: mpsc::UnboundedSender<VoiceTarget>,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        resolver: Arc<dyn MediaResolver>,
        events: Arc<dyn EventSink>,
        settings: PlayerSettings,
    ) -> Arc<Self> {
        let (drained_tx, drained_rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            sessions: DashMap::new(),
            transport,
            resolver,
            events,
            settings,
            drained_tx,
        });

        tokio::spawn(drain_reaper(Arc::downgrade(&manager), drained_rx));
        manager
    }

    /// Resuelve la URL y encola el track en la sesión de la guild,
    /// creándola (join incluido) si no existía.
    ///
    /// `channel` es el canal de voz donde está el usuario; `None` significa
    /// que no está en ninguno, lo cual solo es un problema si todavía no hay
    /// sesión a la cual sumarse. La resolución corre antes del join para no
    /// dejar una conexión colgada por una URL mala.
    pub async fn enqueue_request(
        &self,
        guild: GuildId,
        channel: Option<ChannelId>,
        url: &str,
        user: UserId,
    ) -> Result<QueuedAck, PlayerError> {
        let existing = self.sessions.get(&guild).map(|s| s.clone());
        if existing.is_none() && channel.is_none() {
            return Err(PlayerError::NotInVoiceChannel);
        }

        let track = self.resolver.resolve(url, user).await?;
        let title = track.title().to_string();

        let session = match existing {
            Some(session) => session,
            None => {
                let channel = channel.ok_or(PlayerError::NotInVoiceChannel)?;
                self.get_or_create(VoiceTarget { guild, channel }).await?
            }
        };
        let position = session.enqueue(track).await?;

        Ok(QueuedAck { title, position })
    }

    /// Salta el track actual de la guild.
    pub async fn skip_request(&self, guild: GuildId) -> Result<(), PlayerError> {
        self.session(guild)?.skip().await
    }

    /// Pausa la reproducción. Devuelve `false` si no había nada sonando.
    pub async fn pause_request(&self, guild: GuildId) -> Result<bool, PlayerError> {
        self.session(guild)?.pause().await
    }

    /// Reanuda la reproducción. Devuelve `false` si no había nada pausado.
    pub async fn resume_request(&self, guild: GuildId) -> Result<bool, PlayerError> {
        self.session(guild)?.resume().await
    }

    /// Detiene la reproducción, descarta la cola y desconecta el bot.
    pub async fn stop_request(&self, guild: GuildId) -> Result<(), PlayerError> {
        let session = self.session(guild)?;
        session.stop().await?;
        self.teardown(guild).await;
        Ok(())
    }

    /// Foto de la cola de la guild.
    pub async fn queue_request(&self, guild: GuildId) -> Result<QueueView, PlayerError> {
        Ok(self.session(guild)?.queue_view().await)
    }

    /// Ajusta la ganancia de la sesión (stream actual y futuros).
    pub async fn volume_request(&self, guild: GuildId, volume: f32) -> Result<(), PlayerError> {
        self.session(guild)?.set_volume(volume).await
    }

    /// Desconecta y descarta la sesión de la guild. Idempotente.
    pub async fn teardown(&self, guild: GuildId) {
        if let Some((_, session)) = self.sessions.remove(&guild) {
            session.close().await;
            session.connection().disconnect().await;
            info!("👋 Sesión descartada para guild {}", guild);
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session(&self, guild: GuildId) -> Result<Arc<VoiceSession>, PlayerError> {
        self.sessions
            .get(&guild)
            .map(|s| s.clone())
            .ok_or(PlayerError::SessionClosed)
    }

    async fn get_or_create(&self, target: VoiceTarget) -> Result<Arc<VoiceSession>, PlayerError> {
        if let Some(session) = self.sessions.get(&target.guild) {
            return Ok(session.clone());
        }

        let connection = self.transport.join(target).await?;
        info!(
            "🔊 Conectado al canal de voz {} en guild {}",
            target.channel, target.guild
        );

        let session = VoiceSession::new(
            target,
            connection,
            self.events.clone(),
            self.drained_tx.clone(),
            self.settings.default_volume,
            self.settings.max_queue_size,
        );

        // Dos comandos pudieron correr el join a la vez; el transporte
        // devuelve la misma conexión de guild, así que con quedarse con la
        // sesión ya insertada alcanza.
        let session = match self.sessions.entry(target.guild) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                session
            }
        };
        Ok(session)
    }
}

/// Tarea que aplica la política de auto-desconexión: cuando una sesión
/// señala que se drenó, se la cierra y desconecta, salvo que la
/// configuración pida sesiones persistentes.
async fn drain_reaper(
    manager: Weak<SessionManager>,
    mut drained_rx: mpsc::UnboundedReceiver<VoiceTarget>,
) {
    while let Some(target) = drained_rx.recv().await {
        let Some(manager) = manager.upgrade() else {
            break;
        };

        if !manager.settings.auto_disconnect_on_empty {
            debug!(
                "Cola drenada en guild {}, sesión persistente por configuración",
                target.guild
            );
            continue;
        }

        let Some(session) = manager.sessions.get(&target.guild).map(|s| s.clone()) else {
            continue;
        };

        // Un enqueue pudo llegar después de la señal; solo se cierra si la
        // sesión sigue drenada.
        if session.close_if_drained().await {
            manager.sessions.remove(&target.guild);
            session.connection().disconnect().await;
            info!("🚪 Auto-desconexión por cola vacía en guild {}", target.guild);
        }
    }
}
