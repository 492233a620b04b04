use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::{GuildId, UserId};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{
    queue::{GuildQueue, QueueEntry},
    sink::{AudioSink, CompletionNotifier, PlaybackHandle, PlaybackListener, TrackOutcome},
};
use crate::{error::PlayError, sources::TrackResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Resultado de `skip`
#[derive(Debug, Clone, PartialEq)]
pub enum SkipOutcome {
    /// Se saltó la pista actual y empezó la siguiente
    Advanced(QueueEntry),
    /// Se saltó la pista actual y la cola quedó vacía
    Stopped,
    /// No había nada reproduciéndose
    NothingPlaying,
}

/// Qué pasó con las pistas agregadas por un `play`
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// Quedaron en cola detrás de la pista actual; `position` es la de la
    /// primera agregada (1 = siguiente)
    Queued { position: usize },
    /// No sonaba nada y empezó esta pista (puede no ser la primera agregada
    /// si las anteriores no arrancaron)
    Started(QueueEntry),
    /// No sonaba nada y ninguna de las pistas pudo arrancar
    NoneStarted,
}

/// Resultado de `play`
#[derive(Debug, Clone)]
pub struct PlayReport {
    pub added: Vec<QueueEntry>,
    pub playlist_title: Option<String>,
    pub outcome: EnqueueOutcome,
}

/// Vista de solo lectura de una sesión
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub now_playing: Option<QueueEntry>,
    pub pending: Vec<QueueEntry>,
}

/// Mensajes hacia el controlador de un servidor
pub(crate) enum Control {
    Reserve {
        reply: oneshot::Sender<u64>,
    },
    Fill {
        ticket: u64,
        entries: Vec<QueueEntry>,
        reply: oneshot::Sender<EnqueueOutcome>,
    },
    Release {
        ticket: u64,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<bool>,
    },
    Skip {
        reply: oneshot::Sender<SkipOutcome>,
    },
    NowPlaying {
        reply: oneshot::Sender<Option<QueueEntry>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Rebind {
        sink: Arc<dyn AudioSink>,
        listener: Arc<dyn PlaybackListener>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
    LeaveIfIdle {
        reply: oneshot::Sender<bool>,
    },
    TrackEnded {
        generation: u64,
        outcome: TrackOutcome,
    },
}

/// Lugar reservado en la cola de una sesión concreta.
///
/// Dropping it without `fill` releases the slot so later requests are not
/// held back behind it.
struct Reservation {
    tx: Option<mpsc::UnboundedSender<Control>>,
    ticket: u64,
}

impl Reservation {
    async fn fill(mut self, entries: Vec<QueueEntry>) -> Option<EnqueueOutcome> {
        let tx = self.tx.take()?;

        let (reply, response) = oneshot::channel();
        tx.send(Control::Fill {
            ticket: self.ticket,
            entries,
            reply,
        })
        .ok()?;
        response.await.ok()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Control::Release {
                ticket: self.ticket,
            });
        }
    }
}

/// Un `play` ya resuelto esperando su turno
struct PendingFill {
    entries: Vec<QueueEntry>,
    reply: oneshot::Sender<EnqueueOutcome>,
}

/// Reproductor multi-servidor.
///
/// Each guild gets its own controller task that owns the queue and the
/// playback state; every mutation for that guild goes through the task's
/// channel, so guilds never contend with each other.
pub struct MusicPlayer {
    sessions: DashMap<GuildId, mpsc::UnboundedSender<Control>>,
    resolver: Arc<dyn TrackResolver>,
}

impl MusicPlayer {
    pub fn new(resolver: Arc<dyn TrackResolver>) -> Self {
        Self {
            sessions: DashMap::new(),
            resolver,
        }
    }

    /// Crea la sesión del servidor, o cambia su salida de audio si ya existe.
    ///
    /// Returns `true` when a new session was created.
    pub fn join(
        &self,
        guild_id: GuildId,
        sink: Arc<dyn AudioSink>,
        listener: Arc<dyn PlaybackListener>,
    ) -> bool {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(mut occupied) => {
                let rebind = Control::Rebind {
                    sink: sink.clone(),
                    listener: listener.clone(),
                };
                if occupied.get().send(rebind).is_ok() {
                    debug!("🔁 Sesión existente reutilizada en guild {}", guild_id);
                    return false;
                }

                warn!("Controlador caído en guild {}, recreando sesión", guild_id);
                occupied.insert(GuildSession::spawn(guild_id, sink, listener));
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(GuildSession::spawn(guild_id, sink, listener));
                info!("🆕 Sesión creada para guild {}", guild_id);
                true
            }
        }
    }

    pub fn is_connected(&self, guild_id: GuildId) -> bool {
        self.sessions
            .get(&guild_id)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Resuelve `query` y agrega el resultado a la cola del servidor.
    ///
    /// The queue slot is reserved before resolving, so results land in the
    /// order the commands arrived even when a later lookup finishes first.
    /// Resolution runs outside the guild's controller, so pause/skip/leave
    /// stay responsive while it is in flight. Nothing is enqueued on failure,
    /// nor when the session the slot belongs to ended in the meantime.
    pub async fn play(
        &self,
        guild_id: GuildId,
        query: &str,
        requested_by: UserId,
    ) -> Result<PlayReport, PlayError> {
        let reservation = self.reserve(guild_id).await.ok_or(PlayError::NotConnected)?;

        // Un error aquí suelta la reserva al salir
        let resolution = self.resolver.resolve(query).await?;

        let added: Vec<QueueEntry> = resolution
            .tracks
            .into_iter()
            .map(|track| track.into_entry(requested_by))
            .collect();

        let outcome = reservation
            .fill(added.clone())
            .await
            // La sesión terminó (leave) mientras se resolvía
            .ok_or(PlayError::NotConnected)?;

        Ok(PlayReport {
            added,
            playlist_title: resolution.playlist_title,
            outcome,
        })
    }

    /// Pausa la reproducción actual; `false` si no había nada sonando
    pub async fn pause(&self, guild_id: GuildId) -> bool {
        self.request(guild_id, |reply| Control::Pause { reply })
            .await
            .unwrap_or(false)
    }

    /// Reanuda la reproducción; `false` si no estaba pausada
    pub async fn resume(&self, guild_id: GuildId) -> bool {
        self.request(guild_id, |reply| Control::Resume { reply })
            .await
            .unwrap_or(false)
    }

    /// Salta a la siguiente canción
    pub async fn skip(&self, guild_id: GuildId) -> SkipOutcome {
        self.request(guild_id, |reply| Control::Skip { reply })
            .await
            .unwrap_or(SkipOutcome::NothingPlaying)
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<QueueEntry> {
        self.request(guild_id, |reply| Control::NowPlaying { reply })
            .await
            .flatten()
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> Option<SessionSnapshot> {
        self.request(guild_id, |reply| Control::Snapshot { reply })
            .await
    }

    /// Detiene la reproducción, limpia la cola y elimina la sesión.
    ///
    /// Returns `false` if the guild had no session.
    pub async fn leave(&self, guild_id: GuildId) -> bool {
        let Some((_, tx)) = self.sessions.remove(&guild_id) else {
            return false;
        };

        let (reply, done) = oneshot::channel();
        if tx.send(Control::Leave { reply }).is_ok() {
            let _ = done.await;
        }

        info!("👋 Sesión cerrada en guild {}", guild_id);
        true
    }

    /// Cierra la sesión solo si sigue inactiva: nada sonando, cola vacía y
    /// ningún `play` en curso.
    pub async fn leave_if_idle(&self, guild_id: GuildId) -> bool {
        let Some(tx) = self.sender(guild_id) else {
            return false;
        };

        let (reply, response) = oneshot::channel();
        if tx.send(Control::LeaveIfIdle { reply }).is_err() {
            return false;
        }
        if !response.await.unwrap_or(false) {
            return false;
        }

        // Otro join pudo haber creado una sesión nueva mientras tanto
        self.sessions
            .remove_if(&guild_id, |_, current| current.same_channel(&tx));
        info!("💤 Sesión inactiva cerrada en guild {}", guild_id);
        true
    }

    async fn reserve(&self, guild_id: GuildId) -> Option<Reservation> {
        let tx = self.sender(guild_id)?;

        let (reply, response) = oneshot::channel();
        tx.send(Control::Reserve { reply }).ok()?;
        let ticket = response.await.ok()?;

        Some(Reservation {
            tx: Some(tx),
            ticket,
        })
    }

    async fn request<T>(
        &self,
        guild_id: GuildId,
        make: impl FnOnce(oneshot::Sender<T>) -> Control,
    ) -> Option<T> {
        let tx = self.sender(guild_id)?;

        let (reply, response) = oneshot::channel();
        tx.send(make(reply)).ok()?;
        response.await.ok()
    }

    fn sender(&self, guild_id: GuildId) -> Option<mpsc::UnboundedSender<Control>> {
        // No mantener la referencia del DashMap a través del await
        self.sessions.get(&guild_id).map(|tx| tx.value().clone())
    }
}

/// Estado de un servidor, propiedad exclusiva de su tarea controladora
struct GuildSession {
    guild_id: GuildId,
    queue: GuildQueue,
    state: PlaybackState,
    sink: Arc<dyn AudioSink>,
    listener: Arc<dyn PlaybackListener>,
    current: Option<Box<dyn PlaybackHandle>>,
    generation: u64,
    // Lugares reservados por `play` en orden de llegada; `None` mientras se resuelve
    reservations: BTreeMap<u64, Option<PendingFill>>,
    next_ticket: u64,
    tx: mpsc::WeakUnboundedSender<Control>,
}

impl GuildSession {
    fn spawn(
        guild_id: GuildId,
        sink: Arc<dyn AudioSink>,
        listener: Arc<dyn PlaybackListener>,
    ) -> mpsc::UnboundedSender<Control> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            guild_id,
            queue: GuildQueue::new(),
            state: PlaybackState::Idle,
            sink,
            listener,
            current: None,
            generation: 0,
            reservations: BTreeMap::new(),
            next_ticket: 0,
            tx: tx.downgrade(),
        };

        tokio::spawn(session.run(rx));
        tx
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Control>) {
        while let Some(message) = rx.recv().await {
            match message {
                Control::Reserve { reply } => {
                    let ticket = self.next_ticket;
                    self.next_ticket += 1;
                    self.reservations.insert(ticket, None);
                    if reply.send(ticket).is_err() {
                        // El `play` se canceló antes de recibir su turno
                        self.reservations.remove(&ticket);
                    }
                }
                Control::Fill {
                    ticket,
                    entries,
                    reply,
                } => {
                    match self.reservations.get_mut(&ticket) {
                        Some(slot) => *slot = Some(PendingFill { entries, reply }),
                        None => debug!("Reserva #{} desconocida en guild {}", ticket, self.guild_id),
                    }
                    self.drain_reservations().await;
                }
                Control::Release { ticket } => {
                    self.reservations.remove(&ticket);
                    self.drain_reservations().await;
                }
                Control::Pause { reply } => {
                    let _ = reply.send(self.pause());
                }
                Control::Resume { reply } => {
                    let _ = reply.send(self.resume());
                }
                Control::Skip { reply } => {
                    let outcome = self.skip().await;
                    let _ = reply.send(outcome);
                }
                Control::NowPlaying { reply } => {
                    let _ = reply.send(self.queue.peek_current().cloned());
                }
                Control::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                Control::Rebind { sink, listener } => {
                    self.sink = sink;
                    self.listener = listener;
                }
                Control::Leave { reply } => {
                    self.teardown();
                    let _ = reply.send(());
                    return;
                }
                Control::LeaveIfIdle { reply } => {
                    let idle = self.state == PlaybackState::Idle
                        && self.queue.is_empty()
                        && self.reservations.is_empty();
                    let _ = reply.send(idle);
                    if idle {
                        self.teardown();
                        return;
                    }
                }
                Control::TrackEnded {
                    generation,
                    outcome,
                } => self.track_ended(generation, outcome).await,
            }
        }

        self.teardown();
    }

    /// Encola las reservas ya resueltas, en orden, hasta la primera pendiente
    async fn drain_reservations(&mut self) {
        while let Some(mut first) = self.reservations.first_entry() {
            let Some(fill) = first.get_mut().take() else {
                break;
            };
            first.remove();

            let outcome = self.enqueue(fill.entries).await;
            let _ = fill.reply.send(outcome);
        }
    }

    async fn enqueue(&mut self, entries: Vec<QueueEntry>) -> EnqueueOutcome {
        let was_idle = self.state == PlaybackState::Idle;
        let ahead = self.queue.len();

        for entry in entries {
            self.queue.enqueue(entry);
        }

        if !was_idle {
            return EnqueueOutcome::Queued {
                position: ahead + 1,
            };
        }

        self.start_next().await;
        match self.queue.peek_current() {
            Some(entry) if self.state != PlaybackState::Idle => {
                EnqueueOutcome::Started(entry.clone())
            }
            _ => EnqueueOutcome::NoneStarted,
        }
    }

    fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }

        let Some(handle) = &self.current else {
            return false;
        };

        match handle.pause() {
            Ok(()) => {
                self.state = PlaybackState::Paused;
                info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
                true
            }
            Err(e) => {
                warn!("No se pudo pausar en guild {}: {}", self.guild_id, e);
                false
            }
        }
    }

    fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }

        let Some(handle) = &self.current else {
            return false;
        };

        match handle.resume() {
            Ok(()) => {
                self.state = PlaybackState::Playing;
                info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
                true
            }
            Err(e) => {
                warn!("No se pudo reanudar en guild {}: {}", self.guild_id, e);
                false
            }
        }
    }

    async fn skip(&mut self) -> SkipOutcome {
        if self.state == PlaybackState::Idle {
            return SkipOutcome::NothingPlaying;
        }

        info!("⏭️ Saltando pista en guild {}", self.guild_id);
        self.stop_current();
        self.start_next().await;

        match self.queue.peek_current() {
            Some(entry) => SkipOutcome::Advanced(entry.clone()),
            None => SkipOutcome::Stopped,
        }
    }

    async fn track_ended(&mut self, generation: u64, outcome: TrackOutcome) {
        if generation != self.generation || self.state == PlaybackState::Idle {
            debug!(
                "Finalización #{} ignorada en guild {} (actual #{})",
                generation, self.guild_id, self.generation
            );
            return;
        }

        match &outcome {
            TrackOutcome::Finished => debug!("Track terminado en guild {}", self.guild_id),
            TrackOutcome::Failed(reason) => {
                warn!("❌ Error en track para guild {}: {}", self.guild_id, reason);
                if let Some(entry) = self.queue.peek_current() {
                    self.listener.track_failed(entry, reason);
                }
            }
        }

        self.current = None;
        self.start_next().await;
    }

    /// Inicia la siguiente pista que logre arrancar; sin ninguna, pasa a Idle
    async fn start_next(&mut self) {
        while let Some(entry) = self.queue.dequeue_next() {
            let Some(tx) = self.tx.upgrade() else {
                debug!("Canal cerrado en guild {}, no se inicia {}", self.guild_id, entry.title);
                break;
            };

            self.generation += 1;
            let completion = CompletionNotifier::new(self.generation, tx);

            match self.sink.start(&entry, completion).await {
                Ok(handle) => {
                    info!("🎵 Reproduciendo: {}", entry.title);
                    self.current = Some(handle);
                    self.state = PlaybackState::Playing;
                    self.listener.track_started(&entry);
                    return;
                }
                Err(e) => {
                    warn!("❌ No se pudo iniciar {}: {}", entry.title, e);
                    self.listener.track_failed(&entry, &e.to_string());
                }
            }
        }

        self.queue.clear();
        self.current = None;
        self.state = PlaybackState::Idle;
        self.listener.queue_finished();
    }

    fn stop_current(&mut self) {
        if let Some(handle) = self.current.take() {
            if let Err(e) = handle.stop() {
                debug!("Stop falló en guild {}: {}", self.guild_id, e);
            }
        }
        // Cualquier finalización pendiente de la pista detenida queda obsoleta
        self.generation += 1;
    }

    fn teardown(&mut self) {
        self.stop_current();
        self.queue.clear();
        // Los `play` en curso reciben NotConnected
        self.reservations.clear();
        self.state = PlaybackState::Idle;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            now_playing: self.queue.peek_current().cloned(),
            pending: self.queue.pending().cloned().collect(),
        }
    }
}
