use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::queue::QueueEntry;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Queue Bot";

/// Cuántos títulos de una playlist se listan antes de resumir
const PLAYLIST_PREVIEW: usize = 5;

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &QueueEntry) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎧 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::MUSIC_PURPLE)
        .field("⏱️ Duración", duration_label(track.duration), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by), true);

    if let Some(url) = &track.source_url {
        embed = embed.url(url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(track: &QueueEntry, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎶 Canción Agregada")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_label(track.duration), true)
        .field("📍 Posición", position.to_string(), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by), true);

    if let Some(url) = &track.source_url {
        embed = embed.url(url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que una playlist fue agregada
pub fn create_playlist_added_embed(playlist_title: &str, tracks: &[QueueEntry]) -> CreateEmbed {
    let mut lines: Vec<String> = tracks
        .iter()
        .take(PLAYLIST_PREVIEW)
        .map(|track| format!("➕ {}", track.title))
        .collect();

    if tracks.len() > PLAYLIST_PREVIEW {
        lines.push(format!("…y {} más", tracks.len() - PLAYLIST_PREVIEW));
    }

    CreateEmbed::default()
        .title(format!("📜 {} canciones agregadas", tracks.len()))
        .description(format!("**{}**\n\n{}", playlist_title, lines.join("\n")))
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_track_failed_embed(track: &QueueEntry, reason: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("⚠️ No se pudo reproducir")
        .description(format!("**{}**\n{}", track.title, reason))
        .color(colors::WARNING_ORANGE)
        .footer(CreateEmbedFooter::new("⏭️ Pasando a la siguiente canción"))
}

pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn duration_label(duration: Option<Duration>) -> String {
    match duration {
        Some(duration) => format_duration(duration),
        None => "🔴 En vivo".to_string(),
    }
}

fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(212)), "3:32");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1:02:03");
    }

    #[test]
    fn test_unknown_duration_is_live() {
        assert_eq!(duration_label(None), "🔴 En vivo");
    }
}
