//! Resolución de URLs a tracks reproducibles.
//!
//! El núcleo de reproducción solo conoce el trait [`MediaResolver`]; la
//! implementación real delega en yt-dlp (ver [`ytdlp`]).

pub mod ytdlp;

use async_trait::async_trait;
use serenity::model::id::UserId;

pub use ytdlp::YtDlpResolver;

use crate::audio::track::Track;

/// Errores de resolución de una URL a un stream de audio.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("URL inválida: {0}")]
    InvalidUrl(String),

    #[error("no se pudo ejecutar yt-dlp: {0}")]
    Spawn(String),

    #[error("el extractor rechazó la URL: {0}")]
    Extractor(String),

    #[error("respuesta del extractor ilegible: {0}")]
    Parse(String),
}

/// Convierte una URL provista por el usuario en un [`Track`] reproducible.
///
/// Se invoca una vez por enqueue, siempre fuera del lock de la sesión.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, url: &str, requested_by: UserId) -> Result<Track, ResolveError>;
}
