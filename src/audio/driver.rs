use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use tracing::{debug, warn};

use crate::audio::pipeline::{
    EndReason, JoinError, OpenError, StreamHandle, StreamObserver, VoiceConnection,
    VoiceTarget, VoiceTransport,
};

/// Transporte de voz real sobre songbird.
pub struct SongbirdTransport {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdTransport {
    pub fn new(songbird: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { songbird, http }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn join(&self, target: VoiceTarget) -> Result<Arc<dyn VoiceConnection>, JoinError> {
        let call = self
            .songbird
            .join(target.guild, target.channel)
            .await
            .map_err(|e| JoinError(e.to_string()))?;

        Ok(Arc::new(SongbirdConnection {
            call,
            songbird: self.songbird.clone(),
            guild: target.guild,
            http: self.http.clone(),
        }))
    }
}

/// Conexión a un canal de voz: reproduce streams HTTP en el `Call` de la
/// guild y se desconecta sacando la guild del registro de songbird.
struct SongbirdConnection {
    call: Arc<tokio::sync::Mutex<Call>>,
    songbird: Arc<Songbird>,
    guild: GuildId,
    http: reqwest::Client,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn open(
        &self,
        stream_url: &str,
        volume: f32,
    ) -> Result<Box<dyn StreamHandle>, OpenError> {
        let input: Input = HttpRequest::new(self.http.clone(), stream_url.to_string()).into();

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };
        let _ = handle.set_volume(volume);

        let slot: EndSlot = Arc::new(Mutex::new(EndState::default()));
        if let Err(e) = handle.add_event(
            Event::Track(TrackEvent::End),
            TrackEndBridge { slot: slot.clone() },
        ) {
            let _ = handle.stop();
            return Err(OpenError(e.to_string()));
        }

        Ok(Box::new(SongbirdStream { handle, slot }))
    }

    async fn disconnect(&self) {
        if let Err(e) = self.songbird.remove(self.guild).await {
            debug!("Remove de songbird sin conexión activa: {:?}", e);
        }
    }
}

#[derive(Default)]
struct EndState {
    observer: Option<Arc<dyn StreamObserver>>,
    /// Fin que llegó antes de que alguien registrara el observer.
    pending: Option<EndReason>,
}

type EndSlot = Arc<Mutex<EndState>>;

/// Stream activo respaldado por un `TrackHandle` de songbird.
///
/// Los controles solo encolan órdenes hacia el driver; un error acá
/// significa que el track ya terminó, lo cual es exactamente el no-op que
/// el controlador espera.
struct SongbirdStream {
    handle: TrackHandle,
    slot: EndSlot,
}

impl StreamHandle for SongbirdStream {
    fn pause(&self) {
        let _ = self.handle.pause();
    }

    fn resume(&self) {
        let _ = self.handle.play();
    }

    fn stop(&self) {
        let _ = self.handle.stop();
    }

    fn set_volume(&self, volume: f32) {
        let _ = self.handle.set_volume(volume);
    }

    fn on_complete(&self, observer: Arc<dyn StreamObserver>) {
        let pending = {
            let mut slot = self.slot.lock();
            match slot.pending.take() {
                Some(reason) => Some(reason),
                None => {
                    slot.observer = Some(observer.clone());
                    None
                }
            }
        };

        // El track pudo terminar antes del registro; se entrega igual,
        // exactamente una vez.
        if let Some(reason) = pending {
            tokio::spawn(async move { observer.stream_ended(reason).await });
        }
    }
}

/// Puente entre `TrackEvent::End` de songbird y el observer del pipeline.
/// Songbird dispara End tanto en EOF natural como tras un stop explícito;
/// el `PlayMode` final distingue los dos casos.
struct TrackEndBridge {
    slot: EndSlot,
}

#[async_trait]
impl VoiceEventHandler for TrackEndBridge {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let reason = match ctx {
            EventContext::Track(list) => list
                .first()
                .map(|(state, _)| {
                    if state.playing == PlayMode::Stop {
                        EndReason::Stopped
                    } else {
                        EndReason::Finished
                    }
                })
                .unwrap_or(EndReason::Finished),
            _ => EndReason::Finished,
        };

        let observer = {
            let mut slot = self.slot.lock();
            match slot.observer.take() {
                Some(observer) => Some(observer),
                None => {
                    slot.pending = Some(reason);
                    None
                }
            }
        };

        if let Some(observer) = observer {
            observer.stream_ended(reason).await;
        } else {
            warn!("🎵 Fin de track sin observer registrado; quedó pendiente");
        }

        None
    }
}
