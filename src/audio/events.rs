use serenity::model::id::{GuildId, UserId};

/// Eventos que emite una sesión para que el sink de notificaciones los
/// renderice (mensajes de chat, logs, métricas).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Un track entró a la cola.
    TrackEnqueued {
        guild: GuildId,
        title: String,
        position: usize,
    },
    /// Un track empezó a sonar.
    TrackStarted {
        guild: GuildId,
        title: String,
        requested_by: UserId,
    },
    /// La cola quedó vacía y nada está sonando.
    QueueDrained { guild: GuildId },
    /// Un track no se pudo reproducir; la sesión sigue con el próximo.
    PlaybackError {
        guild: GuildId,
        title: String,
        reason: String,
    },
}

impl SessionEvent {
    pub fn guild(&self) -> GuildId {
        match self {
            SessionEvent::TrackEnqueued { guild, .. }
            | SessionEvent::TrackStarted { guild, .. }
            | SessionEvent::QueueDrained { guild }
            | SessionEvent::PlaybackError { guild, .. } => *guild,
        }
    }
}

/// Sink de eventos de sesión. `publish` no bloquea: las implementaciones
/// que hacen I/O encolan el evento hacia una tarea propia.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: SessionEvent);
}
