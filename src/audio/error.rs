use crate::audio::pipeline::JoinError;
use crate::audio::queue::QueueFull;
use crate::sources::ResolveError;

/// Errores que las peticiones de reproducción devuelven al dispatcher de
/// comandos. El texto es el que se le muestra al usuario.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("Debes estar en un canal de voz para usar este comando")]
    NotInVoiceChannel,

    #[error("No hay una sesión de voz activa")]
    SessionClosed,

    #[error("No se pudo resolver la URL: {0}")]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    QueueFull(#[from] QueueFull),

    #[error(transparent)]
    Join(#[from] JoinError),
}
