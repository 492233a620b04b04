pub mod youtube;

use async_trait::async_trait;
use chrono::Utc;
use serenity::model::id::UserId;
use std::time::Duration;

use crate::{audio::queue::QueueEntry, error::ResolveError};

pub use youtube::YtDlpResolver;

/// Convierte una búsqueda o URL en pistas reproducibles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resuelve `query` (texto libre o URL directa).
    ///
    /// A single video yields one track; a playlist yields its entries in
    /// playlist order. An `Ok` value always holds at least one track.
    async fn resolve(&self, query: &str) -> Result<Resolution, ResolveError>;
}

/// De dónde sale el audio de una pista
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSource {
    /// URL de audio ya extraída, se reproduce con una petición HTTP
    Direct(String),
    /// Página del video (entrada plana de una playlist); el stream se
    /// extrae con yt-dlp justo antes de sonar
    Page(String),
}

impl StreamSource {
    pub fn uri(&self) -> &str {
        match self {
            Self::Direct(uri) | Self::Page(uri) => uri,
        }
    }
}

/// Una pista resuelta: referencia de stream + metadata para mostrar
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub stream: StreamSource,
    pub title: String,
    pub source_url: Option<String>,
    pub duration: Option<Duration>,
}

impl ResolvedTrack {
    pub fn new(stream_uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            stream: StreamSource::Direct(stream_uri.into()),
            title: title.into(),
            source_url: None,
            duration: None,
        }
    }

    pub fn into_entry(self, requested_by: UserId) -> QueueEntry {
        QueueEntry {
            stream: self.stream,
            title: self.title,
            requested_by,
            source_url: self.source_url,
            duration: self.duration,
            added_at: Utc::now(),
        }
    }
}

/// Resultado de una resolución
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub tracks: Vec<ResolvedTrack>,
    /// Título de la playlist, si la consulta era una
    pub playlist_title: Option<String>,
}

impl Resolution {
    pub fn single(track: ResolvedTrack) -> Self {
        Self {
            tracks: vec![track],
            playlist_title: None,
        }
    }

    pub fn is_playlist(&self) -> bool {
        self.playlist_title.is_some()
    }
}

/// Verifica si la consulta es una URL http(s) en lugar de un texto de búsqueda
pub fn is_url(query: &str) -> bool {
    match url::Url::parse(query.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_detection() {
        assert!(is_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_url("  http://example.com/song.mp3 "));
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("ftp://example.com/file"));
        assert!(!is_url("youtube.com/watch?v=x"));
    }

    #[test]
    fn test_into_entry_keeps_metadata() {
        let mut track = ResolvedTrack::new("https://cdn/stream", "Canción");
        track.duration = Some(Duration::from_secs(215));
        let entry = track.into_entry(UserId::new(42));

        assert_eq!(entry.stream, StreamSource::Direct("https://cdn/stream".to_string()));
        assert_eq!(entry.title, "Canción");
        assert_eq!(entry.requested_by, UserId::new(42));
        assert_eq!(entry.duration, Some(Duration::from_secs(215)));
    }
}
