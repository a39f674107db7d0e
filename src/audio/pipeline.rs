use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};

/// Identidad del canal de voz al que se conecta una sesión.
///
/// Discord permite una sola conexión de voz por guild, así que la guild es
/// la clave de sesión y el canal es el destino concreto del join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceTarget {
    pub guild: GuildId,
    pub channel: ChannelId,
}

/// Por qué terminó un stream de audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// El stream llegó a su fin natural; el controlador avanza al siguiente.
    Finished,
    /// Detenido explícitamente (skip/stop); quien lo detuvo decide qué sigue.
    Stopped,
}

#[derive(Debug, thiserror::Error)]
#[error("No se pudo conectar al canal de voz: {0}")]
pub struct JoinError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("No se pudo abrir el stream de audio: {0}")]
pub struct OpenError(pub String);

/// Transporte de voz: conecta el bot a un canal.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn join(&self, target: VoiceTarget) -> Result<Arc<dyn VoiceConnection>, JoinError>;
}

/// Conexión de voz activa; abre streams de audio y se desconecta al final.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Abre `stream_url` como stream de audio con la ganancia indicada.
    async fn open(&self, stream_url: &str, volume: f32)
        -> Result<Box<dyn StreamHandle>, OpenError>;

    async fn disconnect(&self);
}

/// Handle del stream actualmente abierto en una conexión.
///
/// Los controles no bloquean: encolan la orden hacia el driver de audio.
/// El driver los trata como idempotentes sobre un stream ya terminado.
pub trait StreamHandle: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
    fn set_volume(&self, volume: f32);

    /// Registra el observer de fin de stream.
    ///
    /// Se dispara exactamente una vez por handle, con `Finished` en EOF
    /// natural o `Stopped` tras un stop explícito.
    fn on_complete(&self, observer: Arc<dyn StreamObserver>);
}

/// Observer de fin de stream; el driver lo invoca desde su propia tarea,
/// nunca dentro del lock de la sesión.
#[async_trait]
pub trait StreamObserver: Send + Sync {
    async fn stream_ended(&self, reason: EndReason);
}
