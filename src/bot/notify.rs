use std::sync::Arc;

use dashmap::DashMap;
use serenity::{
    http::Http,
    model::id::{ChannelId, GuildId},
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::audio::events::{EventSink, SessionEvent};

/// Sink de eventos que publica mensajes de texto en Discord.
///
/// `publish` no puede bloquear (se llama desde el núcleo de reproducción),
/// así que los mensajes se encolan hacia una tarea propia que hace el POST.
/// Cada guild anuncia en el canal de texto donde se usó el último comando.
pub struct DiscordNotifier {
    channels: DashMap<GuildId, ChannelId>,
    outbox: mpsc::UnboundedSender<(ChannelId, String)>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Arc<Self> {
        let (outbox, mut rx) = mpsc::unbounded_channel::<(ChannelId, String)>();

        tokio::spawn(async move {
            while let Some((channel, content)) = rx.recv().await {
                if let Err(e) = channel.say(&http, content).await {
                    warn!("No se pudo enviar la notificación: {:?}", e);
                }
            }
        });

        Arc::new(Self {
            channels: DashMap::new(),
            outbox,
        })
    }

    /// Fija el canal de texto donde anunciar los eventos de esta guild.
    pub fn register_text_channel(&self, guild: GuildId, channel: ChannelId) {
        self.channels.insert(guild, channel);
    }

    fn render(event: &SessionEvent) -> Option<String> {
        match event {
            // El ack de la interacción ya anuncia el enqueue.
            SessionEvent::TrackEnqueued { .. } => None,
            SessionEvent::TrackStarted {
                title,
                requested_by,
                ..
            } => Some(format!(
                "▶️ Sonando ahora: **{title}** (pedida por <@{requested_by}>)"
            )),
            SessionEvent::QueueDrained { .. } => {
                Some("📭 Cola vacía. El bot se desconecta.".to_string())
            }
            SessionEvent::PlaybackError { title, reason, .. } => {
                Some(format!("❌ No se pudo reproducir **{title}**: {reason}"))
            }
        }
    }
}

impl EventSink for DiscordNotifier {
    fn publish(&self, event: SessionEvent) {
        let Some(content) = Self::render(&event) else {
            return;
        };

        let Some(channel) = self.channels.get(&event.guild()).map(|c| *c) else {
            debug!("Evento sin canal de texto registrado: {:?}", event);
            return;
        };

        let _ = self.outbox.send((channel, content));
    }
}
