use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::audio::controller::{PlayState, PlaybackController};
use crate::audio::error::PlayerError;
use crate::audio::events::{EventSink, SessionEvent};
use crate::audio::pipeline::{EndReason, StreamObserver, VoiceConnection, VoiceTarget};
use crate::audio::queue::TrackQueue;
use crate::audio::track::Track;

/// Sesión de reproducción ligada a un canal de voz.
///
/// Es dueña exclusiva de su cola y su controlador, ambos detrás de un único
/// mutex: los comandos (enqueue/skip/pause/stop) y las notificaciones de fin
/// de stream llegan desde tareas distintas y acá se serializan. El lock se
/// toma solo para voltear estado; abrir el stream (I/O de red) ocurre entre
/// dos tomas del lock, y la generación del controlador detecta cualquier
/// stop/skip que haya ganado la carrera mientras tanto.
pub struct VoiceSession {
    target: VoiceTarget,
    inner: Mutex<SessionInner>,
    connection: Arc<dyn VoiceConnection>,
    events: Arc<dyn EventSink>,
    drained_tx: mpsc::UnboundedSender<VoiceTarget>,
}

struct SessionInner {
    queue: TrackQueue,
    controller: PlaybackController,
    closed: bool,
}

/// Foto de la cola para renderizar en el chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueView {
    pub now_playing: Option<String>,
    pub pending: Vec<String>,
}

impl VoiceSession {
    pub fn new(
        target: VoiceTarget,
        connection: Arc<dyn VoiceConnection>,
        events: Arc<dyn EventSink>,
        drained_tx: mpsc::UnboundedSender<VoiceTarget>,
        volume: f32,
        max_queue_size: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            target,
            inner: Mutex::new(SessionInner {
                queue: TrackQueue::new(max_queue_size),
                controller: PlaybackController::new(volume),
                closed: false,
            }),
            connection,
            events,
            drained_tx,
        })
    }

    /// Agrega un track a la cola y arranca la reproducción si no hay nada
    /// sonando. Devuelve la posición en la cola.
    pub async fn enqueue(self: &Arc<Self>, track: Track) -> Result<usize, PlayerError> {
        let title = track.title().to_string();
        let (position, start) = {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return Err(PlayerError::SessionClosed);
            }
            let position = inner.queue.push(track)?;
            (position, inner.controller.is_idle())
        };

        self.events.publish(SessionEvent::TrackEnqueued {
            guild: self.target.guild,
            title,
            position,
        });

        if start {
            self.advance().await;
        }
        Ok(position)
    }

    /// Corta el track actual y pasa al siguiente de la cola.
    ///
    /// Saltar y el fin natural del stream desembocan en el mismo camino
    /// (detener el actual, luego `advance`), así que hay un solo lugar que
    /// decide el próximo track.
    pub async fn skip(self: &Arc<Self>) -> Result<(), PlayerError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return Err(PlayerError::SessionClosed);
            }
            inner.controller.interrupt();
        }

        info!("⏭️ Track saltado en guild {}", self.target.guild);
        self.advance().await;
        Ok(())
    }

    /// Pausa el track actual. Devuelve `false` si no había nada sonando.
    pub async fn pause(&self) -> Result<bool, PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(PlayerError::SessionClosed);
        }
        Ok(inner.controller.pause())
    }

    /// Reanuda el track pausado. Devuelve `false` si no había nada pausado.
    pub async fn resume(&self) -> Result<bool, PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(PlayerError::SessionClosed);
        }
        Ok(inner.controller.resume())
    }

    /// Detiene la reproducción y descarta la cola, sin avanzar a nada.
    /// Seguro de llamar dos veces seguidas.
    pub async fn stop(&self) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(PlayerError::SessionClosed);
        }
        inner.controller.interrupt();
        inner.queue.clear();
        info!("⏹️ Reproducción detenida en guild {}", self.target.guild);
        Ok(())
    }

    pub async fn set_volume(&self, volume: f32) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(PlayerError::SessionClosed);
        }
        inner.controller.set_volume(volume);
        Ok(())
    }

    pub async fn now_playing(&self) -> Option<Track> {
        let inner = self.inner.lock().await;
        inner.controller.now_playing().cloned()
    }

    pub async fn play_state(&self) -> PlayState {
        let inner = self.inner.lock().await;
        inner.controller.state()
    }

    pub async fn queue_view(&self) -> QueueView {
        let inner = self.inner.lock().await;
        QueueView {
            now_playing: inner
                .controller
                .now_playing()
                .map(|t| t.title().to_string()),
            pending: inner.queue.titles(),
        }
    }

    pub(crate) fn connection(&self) -> Arc<dyn VoiceConnection> {
        self.connection.clone()
    }

    /// Cierra la sesión solo si sigue drenada (Idle y sin cola). Devuelve
    /// `false` si un enqueue llegó después de la señal de drenado; en ese
    /// caso la sesión sigue viva. La verificación y el cierre ocurren bajo
    /// el mismo lock, así el enqueue tardío no se pierde.
    pub(crate) async fn close_if_drained(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.closed || !inner.controller.is_idle() || !inner.queue.is_empty() {
            return false;
        }
        inner.closed = true;
        inner.controller.interrupt();
        true
    }

    /// Marca la sesión como cerrada y suelta el stream actual. Después de
    /// esto toda operación falla con `SessionClosed`. La desconexión del
    /// transporte la hace el manager, fuera del lock.
    pub(crate) async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.controller.interrupt();
        inner.queue.clear();
        debug!("Sesión cerrada para guild {}", self.target.guild);
    }

    /// Si el controlador está Idle, saca el siguiente track de la cola y lo
    /// pone a sonar; si la cola está vacía, señala el drenado.
    ///
    /// Si el open falla, emite `PlaybackError` y reintenta con el siguiente
    /// track en vez de dejar la sesión Idle con cosas pendientes.
    pub(crate) async fn advance(self: &Arc<Self>) {
        loop {
            let (track, seq, volume) = {
                let mut inner = self.inner.lock().await;
                if inner.closed || !inner.controller.is_idle() {
                    return;
                }
                match inner.queue.pop() {
                    Some(track) => {
                        let seq = inner.controller.begin_stream(track.clone());
                        (track, seq, inner.controller.volume())
                    }
                    None => {
                        info!("📭 Cola vacía en guild {}", self.target.guild);
                        self.events.publish(SessionEvent::QueueDrained {
                            guild: self.target.guild,
                        });
                        let _ = self.drained_tx.send(self.target);
                        return;
                    }
                }
            };

            match self.connection.open(track.stream_url(), volume).await {
                Ok(handle) => {
                    let mut inner = self.inner.lock().await;
                    handle.on_complete(Arc::new(StreamEndObserver {
                        session: Arc::clone(self),
                        seq,
                    }));
                    if inner.controller.attach_handle(seq, handle) {
                        info!(
                            "🎵 Reproduciendo: {} en guild {}",
                            track.title(),
                            self.target.guild
                        );
                        self.events.publish(SessionEvent::TrackStarted {
                            guild: self.target.guild,
                            title: track.title().to_string(),
                            requested_by: track.requested_by(),
                        });
                    } else {
                        debug!("Stream descartado: un stop ganó la carrera del open");
                    }
                    return;
                }
                Err(e) => {
                    warn!(
                        "❌ No se pudo abrir el stream para {}: {}",
                        track.title(),
                        e
                    );
                    self.events.publish(SessionEvent::PlaybackError {
                        guild: self.target.guild,
                        title: track.title().to_string(),
                        reason: e.to_string(),
                    });

                    let mut inner = self.inner.lock().await;
                    if !inner.controller.abort_pending(seq) {
                        return;
                    }
                    // Reintenta con el siguiente track de la cola.
                }
            }
        }
    }

    /// Notificación de fin de stream, entregada por el driver desde su
    /// propia tarea. Los stops explícitos no avanzan: quien detuvo el
    /// stream ya decidió el siguiente paso.
    async fn handle_stream_end(self: &Arc<Self>, seq: u64, reason: EndReason) {
        if reason == EndReason::Stopped {
            return;
        }

        let finished = {
            let mut inner = self.inner.lock().await;
            !inner.closed && inner.controller.finish_current(seq)
        };

        if finished {
            debug!("Track terminado en guild {}, avanzando", self.target.guild);
            self.advance().await;
        }
    }
}

/// Puente entre el observer del pipeline y la sesión: lleva la generación
/// del stream para que los fines obsoletos se descarten.
struct StreamEndObserver {
    session: Arc<VoiceSession>,
    seq: u64,
}

#[async_trait]
impl StreamObserver for StreamEndObserver {
    async fn stream_ended(&self, reason: EndReason) {
        self.session.handle_stream_end(self.seq, reason).await;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serenity::model::id::{ChannelId, GuildId, UserId};

    use super::*;
    use crate::audio::testkit::{CollectingSink, FakeConnection};

    fn target() -> VoiceTarget {
        VoiceTarget {
            guild: GuildId::new(10),
            channel: ChannelId::new(20),
        }
    }

    fn track(title: &str) -> Track {
        Track::new(
            format!("https://cdn.example.com/{title}"),
            title.to_string(),
            UserId::new(1),
        )
    }

    struct Fixture {
        session: Arc<VoiceSession>,
        connection: Arc<FakeConnection>,
        sink: Arc<CollectingSink>,
        drained_rx: mpsc::UnboundedReceiver<VoiceTarget>,
    }

    fn fixture() -> Fixture {
        let connection = FakeConnection::new();
        let sink = Arc::new(CollectingSink::default());
        let (drained_tx, drained_rx) = mpsc::unbounded_channel();
        let session = VoiceSession::new(
            target(),
            connection.clone(),
            sink.clone(),
            drained_tx,
            0.5,
            50,
        );
        Fixture {
            session,
            connection,
            sink,
            drained_rx,
        }
    }

    #[tokio::test]
    async fn tracks_play_in_enqueue_order() {
        let mut fx = fixture();

        fx.session.enqueue(track("a")).await.unwrap();
        fx.session.enqueue(track("b")).await.unwrap();
        fx.session.enqueue(track("c")).await.unwrap();

        // Solo "a" suena; "b" y "c" esperan en la cola.
        assert_eq!(fx.connection.open_count(), 1);
        assert_eq!(fx.session.now_playing().await.unwrap().title(), "a");

        fx.connection.last_stream().complete().await;
        assert_eq!(fx.session.now_playing().await.unwrap().title(), "b");

        fx.connection.last_stream().complete().await;
        assert_eq!(fx.session.now_playing().await.unwrap().title(), "c");

        fx.connection.last_stream().complete().await;
        assert_eq!(fx.session.play_state().await, PlayState::Idle);

        let opened = fx.connection.opened();
        let played: Vec<&str> = opened
            .iter()
            .map(|s| s.url.rsplit('/').next().unwrap())
            .collect();
        assert_eq!(played, vec!["a", "b", "c"]);
        assert_eq!(fx.drained_rx.try_recv().unwrap(), target());
    }

    #[tokio::test]
    async fn skip_moves_to_next_track() {
        let mut fx = fixture();
        fx.session.enqueue(track("a")).await.unwrap();
        fx.session.enqueue(track("b")).await.unwrap();

        let first = fx.connection.last_stream();
        fx.session.skip().await.unwrap();

        assert!(first.was_stopped());
        assert_eq!(fx.connection.open_count(), 2);
        assert_eq!(fx.session.now_playing().await.unwrap().title(), "b");
        // El fin "Stopped" del primer stream no debe avanzar de nuevo.
        tokio::task::yield_now().await;
        assert_eq!(fx.connection.open_count(), 2);
        assert!(fx.drained_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_completion_after_skip_does_not_double_advance() {
        let mut fx = fixture();
        fx.session.enqueue(track("a")).await.unwrap();
        fx.session.enqueue(track("b")).await.unwrap();
        fx.session.enqueue(track("c")).await.unwrap();

        let first = fx.connection.last_stream();
        fx.session.skip().await.unwrap();
        assert_eq!(fx.connection.open_count(), 2);

        // Un EOF tardío del stream saltado llega después del skip: su
        // generación ya es vieja y no puede abrir un tercer stream.
        first.force_complete().await;
        assert_eq!(fx.connection.open_count(), 2);
        assert_eq!(fx.session.now_playing().await.unwrap().title(), "b");
        assert!(fx.drained_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pause_and_resume_keep_track_and_queue() {
        let fx = fixture();
        fx.session.enqueue(track("a")).await.unwrap();
        fx.session.enqueue(track("b")).await.unwrap();

        let before = fx.session.queue_view().await;
        assert!(fx.session.pause().await.unwrap());
        assert_eq!(fx.session.play_state().await, PlayState::Paused);
        assert!(fx.connection.last_stream().is_paused());

        assert!(fx.session.resume().await.unwrap());
        assert_eq!(fx.session.play_state().await, PlayState::Playing);
        assert!(!fx.connection.last_stream().is_paused());

        // Mismo track, misma cola, ningún open adicional.
        assert_eq!(fx.session.queue_view().await, before);
        assert_eq!(fx.connection.open_count(), 1);
    }

    #[tokio::test]
    async fn pause_without_playback_is_noop() {
        let fx = fixture();
        assert!(!fx.session.pause().await.unwrap());
        assert!(!fx.session.resume().await.unwrap());
    }

    #[tokio::test]
    async fn stop_goes_idle_and_nothing_restarts() {
        let fx = fixture();
        fx.session.enqueue(track("a")).await.unwrap();
        fx.session.enqueue(track("b")).await.unwrap();

        let stream = fx.connection.last_stream();
        fx.session.stop().await.unwrap();

        assert!(stream.was_stopped());
        assert_eq!(fx.session.play_state().await, PlayState::Idle);
        assert!(fx.session.now_playing().await.is_none());

        // Ni el fin del stream detenido ni un advance manual arrancan nada.
        tokio::task::yield_now().await;
        fx.session.advance().await;
        assert_eq!(fx.connection.open_count(), 1);

        // Un enqueue nuevo sí vuelve a reproducir.
        fx.session.enqueue(track("c")).await.unwrap();
        assert_eq!(fx.session.now_playing().await.unwrap().title(), "c");
    }

    #[tokio::test]
    async fn stop_twice_is_not_an_error() {
        let fx = fixture();
        fx.session.enqueue(track("a")).await.unwrap();

        fx.session.stop().await.unwrap();
        fx.session.stop().await.unwrap();
        assert_eq!(fx.session.play_state().await, PlayState::Idle);
    }

    #[tokio::test]
    async fn open_failure_skips_to_next_track() {
        let mut fx = fixture();
        fx.session.enqueue(track("a")).await.unwrap();
        fx.session.enqueue(track("b")).await.unwrap();
        fx.session.enqueue(track("c")).await.unwrap();

        // "a" termina y "b" falla al abrir: "c" queda sonando sin
        // intervención manual.
        fx.connection.fail_next_open();
        fx.connection.last_stream().complete().await;

        assert_eq!(fx.session.now_playing().await.unwrap().title(), "c");
        let errors: Vec<String> = fx
            .sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::PlaybackError { title, .. } => Some(title),
                _ => None,
            })
            .collect();
        assert_eq!(errors, vec!["b"]);
        assert!(fx.drained_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn open_failure_with_empty_queue_signals_drained() {
        let mut fx = fixture();
        fx.connection.fail_next_open();

        fx.session.enqueue(track("a")).await.unwrap();

        assert_eq!(fx.session.play_state().await, PlayState::Idle);
        assert_eq!(fx.drained_rx.try_recv().unwrap(), target());
        assert!(fx
            .sink
            .events()
            .contains(&SessionEvent::QueueDrained { guild: target().guild }));
    }

    #[tokio::test]
    async fn drain_emits_event_and_signal() {
        let mut fx = fixture();
        fx.session.enqueue(track("a")).await.unwrap();
        fx.session.enqueue(track("b")).await.unwrap();

        fx.connection.last_stream().complete().await;
        fx.connection.last_stream().complete().await;

        assert_eq!(fx.connection.open_count(), 2);
        assert_eq!(fx.drained_rx.try_recv().unwrap(), target());

        let started: Vec<String> = fx
            .sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::TrackStarted { title, .. } => Some(title),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn enqueue_after_close_fails() {
        let fx = fixture();
        fx.session.close().await;

        let err = fx.session.enqueue(track("a")).await.unwrap_err();
        assert!(matches!(err, PlayerError::SessionClosed));
        assert_eq!(fx.connection.open_count(), 0);
    }

    #[tokio::test]
    async fn queue_capacity_is_enforced() {
        let fx = fixture();
        let connection = fx.connection.clone();
        let (drained_tx, _rx) = mpsc::unbounded_channel();
        let session = VoiceSession::new(
            target(),
            connection,
            Arc::new(CollectingSink::default()),
            drained_tx,
            0.5,
            2,
        );

        session.enqueue(track("a")).await.unwrap(); // pasa directo a sonar
        session.enqueue(track("b")).await.unwrap();
        session.enqueue(track("c")).await.unwrap();
        let err = session.enqueue(track("d")).await.unwrap_err();
        assert!(matches!(err, PlayerError::QueueFull(_)));
    }

    #[tokio::test]
    async fn volume_applies_to_current_and_future_streams() {
        let fx = fixture();
        fx.session.enqueue(track("a")).await.unwrap();
        fx.session.set_volume(1.5).await.unwrap();
        assert_eq!(fx.connection.last_stream().volume(), 1.5);

        fx.session.enqueue(track("b")).await.unwrap();
        fx.connection.last_stream().complete().await;
        // El siguiente stream abre ya con la ganancia nueva.
        assert_eq!(fx.connection.last_stream().volume(), 1.5);
    }
}
