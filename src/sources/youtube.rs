use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{is_url, Resolution, ResolvedTrack, StreamSource, TrackResolver};
use crate::{config::Config, error::ResolveError};

/// Formato preferido: m4a/aac lo decodifica Symphonia sin ffmpeg
const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio[ext=mp3]/bestaudio/best";

const UNKNOWN_TITLE: &str = "Desconocido";

/// Fragmentos de stderr de yt-dlp que indican contenido inaccesible
const RESTRICTED_MARKERS: &[&str] = &[
    "private video",
    "video unavailable",
    "sign in to confirm your age",
    "members-only",
    "join this channel",
    "not available in your country",
    "blocked it in your country",
    "this video has been removed",
    "this video is not available",
];

/// Resolvedor basado en yt-dlp
pub struct YtDlpResolver {
    binary: PathBuf,
    timeout: Duration,
    max_playlist_size: usize,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (`--dump-single-json`)
#[derive(Debug, Deserialize)]
struct YtDlpDump {
    #[serde(flatten)]
    media: YtDlpEntry,
    // Las entradas no disponibles de una playlist llegan como `null`
    entries: Option<Vec<Option<YtDlpEntry>>>,
}

#[derive(Debug, Default, Deserialize)]
struct YtDlpEntry {
    // "video", "playlist", o "url" para entradas planas (`--flat-playlist`)
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    requested_formats: Option<Vec<Format>>,
}

#[derive(Debug, Deserialize)]
struct Format {
    url: Option<String>,
    acodec: Option<String>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration, max_playlist_size: usize) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            max_playlist_size,
            rate_limiter: Semaphore::new(3),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.ytdlp_path.clone(),
            config.resolve_timeout,
            config.max_playlist_size,
        )
    }

    /// Devuelve la versión de yt-dlp; falla si el binario no se puede ejecutar
    pub async fn version(&self) -> Result<String, ResolveError> {
        let output = Command::new(&self.binary).arg("--version").output().await?;

        if !output.status.success() {
            return Err(ResolveError::Extraction(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn target_for(query: &str) -> (String, bool) {
        let query = query.trim();
        if is_url(query) {
            (query.to_string(), false)
        } else {
            (format!("ytsearch1:{}", query), true)
        }
    }

    /// Argumentos de yt-dlp para `target`.
    ///
    /// URLs are dumped with `--flat-playlist`: a playlist only lists its
    /// entries (one request) and each stream is extracted when its turn
    /// comes, so large playlists fit in the resolve timeout. Searches keep
    /// full extraction so the first hit is ready to stream.
    fn command_args(&self, target: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-warnings".to_string(),
            "--format".to_string(),
            AUDIO_FORMAT.to_string(),
            "--playlist-end".to_string(),
            self.max_playlist_size.to_string(),
        ];
        if is_url(target) {
            args.push("--flat-playlist".to_string());
        }
        args.push("--".to_string());
        args.push(target.to_string());
        args
    }

    async fn run(&self, target: &str) -> Result<String, ResolveError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolveError::Extraction(e.to_string()))?;

        let mut command = Command::new(&self.binary);
        command
            .args(self.command_args(target))
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ResolveError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Resolution, ResolveError> {
        let (target, is_search) = Self::target_for(query);
        info!("🔍 Resolviendo: {}", target);

        let stdout = self.run(&target).await?;
        let resolution = parse_dump(&stdout, is_search)
            .map_err(|e| ResolveError::Extraction(format!("respuesta inválida: {}", e)))?;

        if resolution.tracks.is_empty() {
            return Err(ResolveError::NotFound(query.trim().to_string()));
        }

        debug!(
            "✅ {} pista(s) resueltas para {}",
            resolution.tracks.len(),
            target
        );
        Ok(resolution)
    }
}

/// Traduce la salida de error de yt-dlp a un `ResolveError`
fn classify_failure(stderr: &str) -> ResolveError {
    let lower = stderr.to_lowercase();
    let detail = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("sin detalles")
        .trim()
        .to_string();

    if RESTRICTED_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ResolveError::Restricted(detail)
    } else {
        warn!("❌ yt-dlp error: {}", detail);
        ResolveError::Extraction(detail)
    }
}

/// Convierte el JSON de yt-dlp en una `Resolution`.
///
/// Search results come back as a one-entry playlist; they are reported as a
/// single track rather than a playlist.
fn parse_dump(stdout: &str, is_search: bool) -> serde_json::Result<Resolution> {
    let dump: YtDlpDump = serde_json::from_str(stdout.trim())?;

    let is_playlist = dump.media.kind.as_deref() == Some("playlist") || dump.entries.is_some();
    let playlist_name = dump.media.title.clone();

    let tracks = match dump.entries {
        Some(entries) => entries
            .into_iter()
            .flatten()
            .filter_map(entry_to_track)
            .collect(),
        None => entry_to_track(dump.media).into_iter().collect(),
    };

    let playlist_title = if is_playlist && !is_search {
        Some(playlist_name.unwrap_or_else(|| UNKNOWN_TITLE.to_string()))
    } else {
        None
    };

    Ok(Resolution {
        tracks,
        playlist_title,
    })
}

fn entry_to_track(entry: YtDlpEntry) -> Option<ResolvedTrack> {
    if entry.kind.as_deref() == Some("url") {
        let page = entry.webpage_url.clone().or(entry.url)?;
        return Some(ResolvedTrack {
            stream: StreamSource::Page(page.clone()),
            title: entry.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            source_url: Some(page),
            duration: parse_duration(entry.duration),
        });
    }

    let stream_uri = entry.url.or_else(|| {
        // Formatos combinados: tomar el que lleva audio
        entry.requested_formats.and_then(|formats| {
            formats
                .into_iter()
                .find(|f| f.acodec.as_deref().is_some_and(|codec| codec != "none"))
                .and_then(|f| f.url)
        })
    })?;

    Some(ResolvedTrack {
        stream: StreamSource::Direct(stream_uri),
        title: entry.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        source_url: entry.webpage_url,
        duration: parse_duration(entry.duration),
    })
}

fn parse_duration(seconds: Option<f64>) -> Option<Duration> {
    seconds
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_video_dump() {
        let json = r#"{
            "_type": "video",
            "id": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "url": "https://rr1.googlevideo.com/audio.m4a",
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "duration": 212.0
        }"#;

        let resolution = parse_dump(json, false).unwrap();

        assert_eq!(resolution.playlist_title, None);
        assert_eq!(
            resolution.tracks,
            vec![ResolvedTrack {
                stream: StreamSource::Direct("https://rr1.googlevideo.com/audio.m4a".to_string()),
                title: "Never Gonna Give You Up".to_string(),
                source_url: Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string()),
                duration: Some(Duration::from_secs(212)),
            }]
        );
    }

    #[test]
    fn test_search_result_is_not_a_playlist() {
        let json = r#"{
            "_type": "playlist",
            "title": "rick astley",
            "entries": [
                {"title": "Never Gonna Give You Up", "url": "https://cdn/a.m4a"}
            ]
        }"#;

        let resolution = parse_dump(json, true).unwrap();

        assert!(!resolution.is_playlist());
        assert_eq!(resolution.tracks.len(), 1);
        assert_eq!(resolution.tracks[0].stream.uri(), "https://cdn/a.m4a");
    }

    #[test]
    fn test_playlist_keeps_order_and_skips_unplayable() {
        let json = r#"{
            "_type": "playlist",
            "title": "Mix",
            "entries": [
                {"title": "Uno", "url": "https://cdn/1.m4a"},
                null,
                {"title": "Sin stream"},
                {"url": "https://cdn/3.m4a"},
                {"title": "Dos", "requested_formats": [
                    {"url": "https://cdn/video.mp4", "acodec": "none"},
                    {"url": "https://cdn/2.m4a", "acodec": "mp4a.40.2"}
                ]}
            ]
        }"#;

        let resolution = parse_dump(json, false).unwrap();

        assert_eq!(resolution.playlist_title.as_deref(), Some("Mix"));
        let titles: Vec<_> = resolution.tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Uno", UNKNOWN_TITLE, "Dos"]);
        assert_eq!(
            resolution.tracks[2].stream,
            StreamSource::Direct("https://cdn/2.m4a".to_string())
        );
    }

    #[test]
    fn test_flat_playlist_entries_stream_from_their_page() {
        let json = r#"{
            "_type": "playlist",
            "title": "Lofi",
            "entries": [
                {"_type": "url", "ie_key": "Youtube", "title": "Uno",
                 "url": "https://www.youtube.com/watch?v=aaa", "duration": 180},
                {"_type": "url", "ie_key": "Youtube", "title": "[Private video]",
                 "url": null},
                {"_type": "url", "ie_key": "Youtube", "title": "Dos",
                 "url": "https://www.youtube.com/watch?v=bbb"}
            ]
        }"#;

        let resolution = parse_dump(json, false).unwrap();

        assert_eq!(resolution.playlist_title.as_deref(), Some("Lofi"));
        assert_eq!(
            resolution.tracks,
            vec![
                ResolvedTrack {
                    stream: StreamSource::Page("https://www.youtube.com/watch?v=aaa".to_string()),
                    title: "Uno".to_string(),
                    source_url: Some("https://www.youtube.com/watch?v=aaa".to_string()),
                    duration: Some(Duration::from_secs(180)),
                },
                ResolvedTrack {
                    stream: StreamSource::Page("https://www.youtube.com/watch?v=bbb".to_string()),
                    title: "Dos".to_string(),
                    source_url: Some("https://www.youtube.com/watch?v=bbb".to_string()),
                    duration: None,
                },
            ]
        );
    }

    #[test]
    fn test_urls_are_dumped_flat_and_searches_are_not() {
        let resolver = YtDlpResolver::new("yt-dlp", Duration::from_secs(30), 100);

        let playlist = resolver.command_args("https://www.youtube.com/playlist?list=PL123");
        assert!(playlist.contains(&"--flat-playlist".to_string()));
        assert_eq!(
            playlist[playlist.len() - 2..].to_vec(),
            vec!["--".to_string(), "https://www.youtube.com/playlist?list=PL123".to_string()]
        );
        let end = playlist.iter().position(|a| a == "--playlist-end").unwrap();
        assert_eq!(playlist[end + 1], "100");

        let search = resolver.command_args("ytsearch1:lofi beats");
        assert!(!search.contains(&"--flat-playlist".to_string()));
        assert_eq!(search.last().map(String::as_str), Some("ytsearch1:lofi beats"));
    }

    #[test]
    fn test_empty_search_yields_no_tracks() {
        let json = r#"{"_type": "playlist", "title": "zzzz", "entries": []}"#;

        assert!(parse_dump(json, true).unwrap().tracks.is_empty());
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(parse_dump("ERROR: something", false).is_err());
    }

    #[test]
    fn test_failure_classification() {
        let restricted = classify_failure(
            "WARNING: foo\nERROR: [youtube] abc: Private video. Sign in if you've been granted access\n",
        );
        assert!(matches!(restricted, ResolveError::Restricted(_)));

        let age = classify_failure("ERROR: [youtube] abc: Sign in to confirm your age");
        assert!(matches!(age, ResolveError::Restricted(_)));

        match classify_failure("ERROR: Unable to download webpage\n\n") {
            ResolveError::Extraction(detail) => {
                assert_eq!(detail, "ERROR: Unable to download webpage")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_search_target() {
        assert_eq!(
            YtDlpResolver::target_for("  lofi beats "),
            ("ytsearch1:lofi beats".to_string(), true)
        );
        assert_eq!(
            YtDlpResolver::target_for("https://youtu.be/abc"),
            ("https://youtu.be/abc".to_string(), false)
        );
    }
}
