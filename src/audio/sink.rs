use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{player::Control, queue::QueueEntry};
use crate::error::PlaybackError;

/// Cómo terminó una pista
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Finished,
    Failed(String),
}

/// Canal de finalización entregado al sink para una pista concreta.
///
/// Notifications are tagged with the generation of the track they belong to;
/// the controller drops any that do not match the track currently running.
#[derive(Clone)]
pub struct CompletionNotifier {
    generation: u64,
    tx: mpsc::UnboundedSender<Control>,
}

impl CompletionNotifier {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<Control>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn notify(&self, outcome: TrackOutcome) {
        if self
            .tx
            .send(Control::TrackEnded {
                generation: self.generation,
                outcome,
            })
            .is_err()
        {
            debug!("Sesión cerrada, finalización #{} descartada", self.generation);
        }
    }
}

/// Control de una pista en reproducción
pub trait PlaybackHandle: Send + Sync {
    fn pause(&self) -> Result<(), PlaybackError>;
    fn resume(&self) -> Result<(), PlaybackError>;
    fn stop(&self) -> Result<(), PlaybackError>;
}

/// Salida de audio de un servidor (una conexión de voz)
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Starts streaming `entry`. The sink must call `completion` when the
    /// stream ends, naturally or with an error.
    async fn start(
        &self,
        entry: &QueueEntry,
        completion: CompletionNotifier,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;
}

/// Observador de eventos de reproducción (anuncios en el canal de texto)
pub trait PlaybackListener: Send + Sync {
    fn track_started(&self, entry: &QueueEntry);
    fn track_failed(&self, entry: &QueueEntry, reason: &str);
    fn queue_finished(&self);
}
