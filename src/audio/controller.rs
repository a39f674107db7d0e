use tracing::{debug, info};

use crate::audio::pipeline::StreamHandle;
use crate::audio::track::Track;

/// Estado de reproducción de una sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Idle,
    Playing,
    Paused,
}

/// Máquina de estados de reproducción de una sesión de voz.
///
/// Todos los métodos son síncronos y se llaman con el lock de la sesión
/// tomado: acá solo se voltea estado. El I/O (abrir el stream) ocurre fuera
/// del lock, en `VoiceSession::advance`, y se reconcilia vía el contador de
/// generación: cada stream abierto (o por abrirse) pertenece a una
/// generación, y cualquier evento que llegue con una generación vieja se
/// descarta. Eso hace seguro el cruce skip-vs-EOF: nunca hay dos streams
/// vivos para la misma sesión.
pub struct PlaybackController {
    state: PlayState,
    now_playing: Option<Track>,
    handle: Option<Box<dyn StreamHandle>>,
    volume: f32,
    seq: u64,
}

impl PlaybackController {
    pub fn new(volume: f32) -> Self {
        Self {
            state: PlayState::Idle,
            now_playing: None,
            handle: None,
            volume: volume.clamp(0.0, 2.0),
            seq: 0,
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == PlayState::Idle
    }

    pub fn now_playing(&self) -> Option<&Track> {
        self.now_playing.as_ref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Reclama la próxima generación para `track` y pasa a Playing.
    ///
    /// Siempre detiene el handle anterior primero, aunque no se crea que
    /// haya uno activo (stop idempotente). El handle nuevo se adjunta con
    /// `attach_handle` cuando el open termine.
    pub fn begin_stream(&mut self, track: Track) -> u64 {
        self.stop_handle();
        self.seq += 1;
        self.state = PlayState::Playing;
        self.now_playing = Some(track);
        self.seq
    }

    /// Adjunta el handle recién abierto si su generación sigue vigente.
    ///
    /// Si un stop/skip ganó la carrera mientras el open estaba en vuelo, el
    /// handle se detiene acá mismo y se devuelve `false`.
    pub fn attach_handle(&mut self, seq: u64, handle: Box<dyn StreamHandle>) -> bool {
        if seq != self.seq || self.state == PlayState::Idle || self.handle.is_some() {
            handle.stop();
            return false;
        }

        let handle = self.handle.insert(handle);
        // Una pausa pudo llegar mientras el open estaba en vuelo.
        if self.state == PlayState::Paused {
            handle.pause();
        }
        true
    }

    /// El open de la generación `seq` falló: vuelve a Idle para reintentar
    /// con el siguiente track de la cola.
    pub fn abort_pending(&mut self, seq: u64) -> bool {
        if seq != self.seq || self.state == PlayState::Idle {
            return false;
        }

        self.state = PlayState::Idle;
        self.now_playing = None;
        self.handle = None;
        true
    }

    /// Fin natural del stream de la generación `seq`.
    ///
    /// Devuelve `true` si la sesión debe avanzar al siguiente track;
    /// `false` para generaciones viejas o ya consumidas.
    pub fn finish_current(&mut self, seq: u64) -> bool {
        if seq != self.seq || self.state == PlayState::Idle {
            debug!("Fin de stream obsoleto ignorado (gen {})", seq);
            return false;
        }

        self.handle = None;
        self.now_playing = None;
        self.state = PlayState::Idle;
        true
    }

    /// Corta el stream actual y vuelve a Idle sin avanzar.
    ///
    /// Invalida también cualquier open en vuelo subiendo la generación.
    /// Seguro de llamar desde Idle (no-op sobre el handle).
    pub fn interrupt(&mut self) {
        self.stop_handle();
        self.now_playing = None;
        self.state = PlayState::Idle;
        self.seq += 1;
    }

    /// Pausa el stream actual. No-op si no hay nada sonando.
    pub fn pause(&mut self) -> bool {
        if self.state != PlayState::Playing {
            return false;
        }

        if let Some(handle) = &self.handle {
            handle.pause();
        }
        self.state = PlayState::Paused;
        info!("⏸️ Reproducción pausada");
        true
    }

    /// Reanuda el stream pausado. No-op si no hay nada pausado.
    pub fn resume(&mut self) -> bool {
        if self.state != PlayState::Paused {
            return false;
        }

        if let Some(handle) = &self.handle {
            handle.resume();
        }
        self.state = PlayState::Playing;
        info!("▶️ Reproducción reanudada");
        true
    }

    /// Ajusta la ganancia del stream actual y de los próximos.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 2.0);
        if let Some(handle) = &self.handle {
            handle.set_volume(self.volume);
        }
        info!("🔊 Volumen ajustado a {}%", (self.volume * 100.0) as u8);
    }

    fn stop_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serenity::model::id::UserId;

    use super::*;
    use crate::audio::pipeline::StreamObserver;

    struct NullHandle;

    impl StreamHandle for NullHandle {
        fn pause(&self) {}
        fn resume(&self) {}
        fn stop(&self) {}
        fn set_volume(&self, _volume: f32) {}
        fn on_complete(&self, _observer: Arc<dyn StreamObserver>) {}
    }

    fn track(title: &str) -> Track {
        Track::new("https://a/b".into(), title.into(), UserId::new(1))
    }

    #[test]
    fn begin_stream_moves_to_playing() {
        let mut ctrl = PlaybackController::new(0.5);
        let seq = ctrl.begin_stream(track("a"));

        assert_eq!(ctrl.state(), PlayState::Playing);
        assert_eq!(ctrl.now_playing().unwrap().title(), "a");
        assert!(ctrl.attach_handle(seq, Box::new(NullHandle)));
    }

    #[test]
    fn attach_rejects_stale_generation() {
        let mut ctrl = PlaybackController::new(0.5);
        let seq = ctrl.begin_stream(track("a"));
        ctrl.interrupt();

        assert!(!ctrl.attach_handle(seq, Box::new(NullHandle)));
        assert_eq!(ctrl.state(), PlayState::Idle);
    }

    #[test]
    fn finish_ignores_stale_generation() {
        let mut ctrl = PlaybackController::new(0.5);
        let old = ctrl.begin_stream(track("a"));
        let new = ctrl.begin_stream(track("b"));

        assert!(!ctrl.finish_current(old));
        assert_eq!(ctrl.state(), PlayState::Playing);
        assert!(ctrl.finish_current(new));
        assert_eq!(ctrl.state(), PlayState::Idle);
        assert!(ctrl.now_playing().is_none());
    }

    #[test]
    fn finish_is_consumed_once() {
        let mut ctrl = PlaybackController::new(0.5);
        let seq = ctrl.begin_stream(track("a"));

        assert!(ctrl.finish_current(seq));
        assert!(!ctrl.finish_current(seq));
    }

    #[test]
    fn pause_resume_only_from_matching_state() {
        let mut ctrl = PlaybackController::new(0.5);
        assert!(!ctrl.pause());
        assert!(!ctrl.resume());

        let seq = ctrl.begin_stream(track("a"));
        ctrl.attach_handle(seq, Box::new(NullHandle));

        assert!(ctrl.pause());
        assert_eq!(ctrl.state(), PlayState::Paused);
        assert!(!ctrl.pause());
        assert!(ctrl.resume());
        assert_eq!(ctrl.state(), PlayState::Playing);
        assert!(!ctrl.resume());
        assert_eq!(ctrl.now_playing().unwrap().title(), "a");
    }

    #[test]
    fn interrupt_from_idle_is_noop() {
        let mut ctrl = PlaybackController::new(0.5);
        ctrl.interrupt();
        ctrl.interrupt();

        assert_eq!(ctrl.state(), PlayState::Idle);
        assert!(ctrl.now_playing().is_none());
    }

    #[test]
    fn volume_is_clamped() {
        let mut ctrl = PlaybackController::new(9.0);
        assert_eq!(ctrl.volume(), 2.0);

        ctrl.set_volume(-1.0);
        assert_eq!(ctrl.volume(), 0.0);
    }
}
