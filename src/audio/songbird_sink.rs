use async_trait::async_trait;
use songbird::{
    input::{HttpRequest, Input, YoutubeDl},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use super::{
    queue::QueueEntry,
    sink::{AudioSink, CompletionNotifier, PlaybackHandle, TrackOutcome},
};
use crate::{error::PlaybackError, sources::StreamSource};

/// Salida de audio sobre una conexión de voz de Songbird
pub struct SongbirdSink {
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    volume: f32,
    ytdlp_program: &'static str,
}

impl SongbirdSink {
    pub fn new(
        call: Arc<Mutex<Call>>,
        http: reqwest::Client,
        volume: f32,
        ytdlp_program: &'static str,
    ) -> Self {
        Self {
            call,
            http,
            volume,
            ytdlp_program,
        }
    }

    fn input_for(&self, stream: &StreamSource) -> Input {
        match stream {
            // El stream ya viene resuelto por yt-dlp: basta con una petición HTTP
            StreamSource::Direct(uri) => HttpRequest::new(self.http.clone(), uri.clone()).into(),
            // Songbird ejecuta yt-dlp de forma perezosa al crear la pista
            StreamSource::Page(url) => {
                YoutubeDl::new_ytdl_like(self.ytdlp_program, self.http.clone(), url.clone()).into()
            }
        }
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn start(
        &self,
        entry: &QueueEntry,
        completion: CompletionNotifier,
    ) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        let input = self.input_for(&entry.stream);

        let track = {
            let mut call = self.call.lock().await;
            if call.current_connection().is_none() {
                return Err(PlaybackError::Disconnected);
            }
            call.play_only_input(input)
        };

        track
            .set_volume(self.volume)
            .map_err(|e| PlaybackError::Control(format!("{:?}", e)))?;

        // Registrar event handlers para auto-play
        track
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndHandler {
                    completion: completion.clone(),
                },
            )
            .map_err(|e| PlaybackError::Control(format!("{:?}", e)))?;
        track
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorHandler { completion },
            )
            .map_err(|e| PlaybackError::Control(format!("{:?}", e)))?;

        Ok(Box::new(SongbirdHandle(track)))
    }
}

struct SongbirdHandle(TrackHandle);

impl PlaybackHandle for SongbirdHandle {
    fn pause(&self) -> Result<(), PlaybackError> {
        self.0
            .pause()
            .map_err(|e| PlaybackError::Control(format!("{:?}", e)))
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        self.0
            .play()
            .map_err(|e| PlaybackError::Control(format!("{:?}", e)))
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        self.0
            .stop()
            .map_err(|e| PlaybackError::Control(format!("{:?}", e)))
    }
}

/// Handler para cuando termina una canción
struct TrackEndHandler {
    completion: CompletionNotifier,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("Track #{} terminado", self.completion.generation());
        self.completion.notify(TrackOutcome::Finished);
        None
    }
}

/// Handler para errores de tracks
struct TrackErrorHandler {
    completion: CompletionNotifier,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut reason = String::from("error de reproducción");

        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                error!(
                    "❌ Error en track #{}: {:?}",
                    self.completion.generation(),
                    state.playing
                );
                if let PlayMode::Errored(e) = &state.playing {
                    reason = format!("{:?}", e);
                }
            }
        }

        self.completion.notify(TrackOutcome::Failed(reason));
        None
    }
}
