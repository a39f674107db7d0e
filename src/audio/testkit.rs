//! Fakes de transporte/conexión/stream para los tests del núcleo de audio.
//!
//! Igual que el driver real, los fakes nunca invocan al observer en línea
//! desde un control síncrono: `stop()` entrega el fin en una tarea aparte,
//! para que un stop emitido con el lock de la sesión tomado no se muerda la
//! cola a sí mismo. Los tests disparan el EOF natural con `complete()`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;

use crate::audio::events::{EventSink, SessionEvent};
use crate::audio::pipeline::{
    EndReason, JoinError, OpenError, StreamHandle, StreamObserver, VoiceConnection,
    VoiceTarget, VoiceTransport,
};

/// Stream de audio falso con estado observable.
pub struct FakeStream {
    pub url: String,
    volume: Mutex<f32>,
    observer: Mutex<Option<Arc<dyn StreamObserver>>>,
    pending: Mutex<Option<EndReason>>,
    ended: AtomicBool,
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl FakeStream {
    fn new(url: &str, volume: f32) -> Arc<Self> {
        Arc::new(Self {
            url: url.to_string(),
            volume: Mutex::new(volume),
            observer: Mutex::new(None),
            pending: Mutex::new(None),
            ended: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// EOF natural. Entrega el fin en línea, así el test queda sincronizado
    /// con el avance de la sesión al volver del await.
    pub async fn complete(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        self.deliver(EndReason::Finished).await;
    }

    /// Entrega un EOF sin mirar si el stream ya terminó, para simular el
    /// fin natural que llega tarde, después de que un skip ya lo detuvo.
    pub async fn force_complete(&self) {
        self.ended.store(true, Ordering::SeqCst);
        self.deliver(EndReason::Finished).await;
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    async fn deliver(&self, reason: EndReason) {
        let observer = self.observer.lock().take();
        match observer {
            Some(observer) => observer.stream_ended(reason).await,
            None => *self.pending.lock() = Some(reason),
        }
    }

    fn deliver_detached(self: &Arc<Self>, reason: EndReason) {
        let stream = Arc::clone(self);
        tokio::spawn(async move { stream.deliver(reason).await });
    }
}

struct FakeHandle(Arc<FakeStream>);

impl StreamHandle for FakeHandle {
    fn pause(&self) {
        self.0.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.0.paused.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.0.stopped.store(true, Ordering::SeqCst);
        if self.0.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        self.0.deliver_detached(EndReason::Stopped);
    }

    fn set_volume(&self, volume: f32) {
        *self.0.volume.lock() = volume;
    }

    fn on_complete(&self, observer: Arc<dyn StreamObserver>) {
        if let Some(reason) = self.0.pending.lock().take() {
            tokio::spawn(async move { observer.stream_ended(reason).await });
            return;
        }
        *self.0.observer.lock() = Some(observer);
    }
}

/// Conexión de voz falsa: registra cada open y puede fallar a pedido.
#[derive(Default)]
pub struct FakeConnection {
    opened: Mutex<Vec<Arc<FakeStream>>>,
    fail_opens: AtomicUsize,
    disconnects: AtomicUsize,
}

impl FakeConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// El próximo open falla con `OpenError`.
    pub fn fail_next_open(&self) {
        self.fail_opens.fetch_add(1, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn opened(&self) -> Vec<Arc<FakeStream>> {
        self.opened.lock().clone()
    }

    pub fn last_stream(&self) -> Arc<FakeStream> {
        self.opened
            .lock()
            .last()
            .cloned()
            .expect("ningún stream abierto todavía")
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn open(
        &self,
        stream_url: &str,
        volume: f32,
    ) -> Result<Box<dyn StreamHandle>, OpenError> {
        if self
            .fail_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(OpenError(format!("fallo simulado para {stream_url}")));
        }

        let stream = FakeStream::new(stream_url, volume);
        self.opened.lock().push(stream.clone());
        Ok(Box::new(FakeHandle(stream)))
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transporte falso: una `FakeConnection` por guild.
#[derive(Default)]
pub struct FakeTransport {
    connections: DashMap<GuildId, Arc<FakeConnection>>,
    joins: AtomicUsize,
    fail_joins: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_joins(&self) {
        self.fail_joins.store(true, Ordering::SeqCst);
    }

    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub fn connection(&self, guild: GuildId) -> Arc<FakeConnection> {
        self.connections
            .get(&guild)
            .map(|c| c.clone())
            .expect("la guild nunca se conectó")
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn join(&self, target: VoiceTarget) -> Result<Arc<dyn VoiceConnection>, JoinError> {
        if self.fail_joins.load(Ordering::SeqCst) {
            return Err(JoinError("join simulado rechazado".into()));
        }

        self.joins.fetch_add(1, Ordering::SeqCst);
        let connection = self
            .connections
            .entry(target.guild)
            .or_insert_with(|| Arc::new(FakeConnection::default()))
            .clone();
        Ok(connection)
    }
}

/// Sink que acumula los eventos publicados, para asserts.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for CollectingSink {
    fn publish(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }
}
