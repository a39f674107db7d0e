use std::collections::VecDeque;

use tracing::info;

use crate::audio::track::Track;

/// Cola FIFO de tracks pendientes de una sesión de voz.
///
/// Solo se muta con el lock de la sesión tomado; la cola en sí no necesita
/// sincronización propia. Orden de inserción = orden de reproducción.
#[derive(Debug)]
pub struct TrackQueue {
    pending: VecDeque<Track>,
    max_size: usize,
}

/// La cola alcanzó su capacidad máxima.
#[derive(Debug, thiserror::Error)]
#[error("La cola está llena (máximo {0} canciones)")]
pub struct QueueFull(pub usize);

impl TrackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega un track al final de la cola.
    pub fn push(&mut self, track: Track) -> Result<usize, QueueFull> {
        if self.pending.len() >= self.max_size {
            return Err(QueueFull(self.max_size));
        }

        info!("➕ Agregado a la cola: {}", track.title());
        self.pending.push_back(track);
        Ok(self.pending.len())
    }

    /// Saca el primer track de la cola, o `None` si está vacía.
    pub fn pop(&mut self) -> Option<Track> {
        self.pending.pop_front()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Descarta todos los tracks pendientes.
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            info!("🗑️ Cola limpiada: {} tracks removidos", self.pending.len());
        }
        self.pending.clear();
    }

    /// Títulos pendientes en orden de reproducción.
    pub fn titles(&self) -> Vec<String> {
        self.pending.iter().map(|t| t.title().to_string()).collect()
    }
}
