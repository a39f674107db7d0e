use chrono::{DateTime, Utc};
use serenity::model::id::UserId;

/// Track resuelto y listo para reproducir.
///
/// Lo crea el resolver al momento del enqueue; la cola es dueña del track
/// hasta que se desencola, y el controlador mientras suena.
#[derive(Debug, Clone)]
pub struct Track {
    stream_url: String,
    title: String,
    requested_by: UserId,
    #[allow(dead_code)]
    enqueued_at: DateTime<Utc>,
}

impl Track {
    pub fn new(stream_url: String, title: String, requested_by: UserId) -> Self {
        Self {
            stream_url,
            title,
            requested_by,
            enqueued_at: Utc::now(),
        }
    }

    /// URL directa que el pipeline de audio puede abrir como stream de bytes.
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
}
