use anyhow::Result;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    model::{
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use super::{commands::Command, MusicBot};
use crate::{
    audio::{
        player::{EnqueueOutcome, PlayReport, SkipOutcome},
        queue::QueueEntry,
    },
    error::{PlayError, ResolveError},
    ui::embeds,
};

const NOTHING_PLAYING: &str = "❌ No hay nada reproduciéndose";

/// Maneja comandos de texto
pub async fn handle_command(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    command: Command,
    bot: &MusicBot,
) -> Result<()> {
    match command {
        Command::Join => handle_join(ctx, msg, guild_id, bot).await,
        Command::Leave => handle_leave(ctx, msg, guild_id, bot).await,
        Command::Play(query) => handle_play(ctx, msg, guild_id, &query, bot).await,
        Command::Pause => handle_pause(ctx, msg, guild_id, bot).await,
        Command::Resume => handle_resume(ctx, msg, guild_id, bot).await,
        Command::Skip => handle_skip(ctx, msg, guild_id, bot).await,
        Command::NowPlaying => handle_nowplaying(ctx, msg, guild_id, bot).await,
    }
}

// Handlers específicos para cada comando

async fn handle_join(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, msg.author.id) else {
        return reply(ctx, msg, "❌ Primero únete a un canal de voz").await;
    };

    if let Err(e) = bot
        .join_voice_channel(ctx, guild_id, voice_channel_id, msg.channel_id)
        .await
    {
        return reply_embed(ctx, msg, embeds::create_error_embed("Conexión", &e.to_string())).await;
    }

    reply(ctx, msg, format!("🔊 Conectado a <#{}>", voice_channel_id)).await
}

async fn handle_leave(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    if bot.leave_voice_channel(ctx, guild_id).await? {
        reply(ctx, msg, "👋 Desconectado del canal de voz").await
    } else {
        reply(ctx, msg, "❌ No estoy en un canal de voz").await
    }
}

async fn handle_play(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    query: &str,
    bot: &MusicBot,
) -> Result<()> {
    // Verificar que el usuario esté en un canal de voz
    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, msg.author.id) else {
        return reply(ctx, msg, "❌ Debes estar en un canal de voz para reproducir música").await;
    };

    // Conectar al canal de voz si no está conectado
    if !bot.player.is_connected(guild_id) {
        if let Err(e) = bot
            .join_voice_channel(ctx, guild_id, voice_channel_id, msg.channel_id)
            .await
        {
            return reply_embed(ctx, msg, embeds::create_error_embed("Conexión", &e.to_string()))
                .await;
        }
    }

    reply(ctx, msg, format!("🔍 Buscando: `{}`", query)).await?;

    let report = match bot.player.play(guild_id, query, msg.author.id).await {
        Ok(report) => report,
        Err(e) => {
            warn!("Búsqueda fallida en guild {}: {}", guild_id, e);
            let (title, description) = describe_play_error(&e);
            return reply_embed(ctx, msg, embeds::create_error_embed(title, &description)).await;
        }
    };

    info!(
        "🎶 {} pista(s) agregadas en guild {}",
        report.added.len(),
        guild_id
    );

    if let Some(playlist_title) = &report.playlist_title {
        return reply_embed(
            ctx,
            msg,
            embeds::create_playlist_added_embed(playlist_title, &report.added),
        )
        .await;
    }

    match queued_track(&report) {
        Some((track, position)) => {
            reply_embed(ctx, msg, embeds::create_track_added_embed(track, position)).await
        }
        None => Ok(()),
    }
}

async fn handle_pause(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    if bot.player.pause(guild_id).await {
        reply(ctx, msg, "⏸️ Reproducción pausada").await
    } else {
        reply(ctx, msg, NOTHING_PLAYING).await
    }
}

async fn handle_resume(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    if bot.player.resume(guild_id).await {
        reply(ctx, msg, "▶️ Reproducción reanudada").await
    } else {
        reply(ctx, msg, "❌ La reproducción no estaba pausada").await
    }
}

async fn handle_skip(ctx: &Context, msg: &Message, guild_id: GuildId, bot: &MusicBot) -> Result<()> {
    match bot.player.skip(guild_id).await {
        SkipOutcome::Advanced(next) => {
            reply(ctx, msg, format!("⏭️ Saltada. Siguiente: **{}**", next.title)).await
        }
        SkipOutcome::Stopped => reply(ctx, msg, "⏭️ Saltada. La cola está vacía").await,
        SkipOutcome::NothingPlaying => reply(ctx, msg, NOTHING_PLAYING).await,
    }
}

async fn handle_nowplaying(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    bot: &MusicBot,
) -> Result<()> {
    match bot.player.now_playing(guild_id).await {
        Some(current) => reply_embed(ctx, msg, embeds::create_now_playing_embed(&current)).await,
        None => reply(ctx, msg, NOTHING_PLAYING).await,
    }
}

// Funciones auxiliares

/// Pista que quedó esperando en la cola y su posición.
///
/// When playback started (or nothing could start) the listener already
/// announces the entry that is actually playing or the failure.
fn queued_track(report: &PlayReport) -> Option<(&QueueEntry, usize)> {
    match report.outcome {
        EnqueueOutcome::Queued { position } => report.added.first().map(|track| (track, position)),
        EnqueueOutcome::Started(_) | EnqueueOutcome::NoneStarted => None,
    }
}

fn describe_play_error(error: &PlayError) -> (&'static str, String) {
    match error {
        PlayError::NotConnected => (
            "Sin conexión",
            "El bot se desconectó del canal de voz. Usa `join` e inténtalo de nuevo.".to_string(),
        ),
        PlayError::Resolve(ResolveError::NotFound(query)) => (
            "Sin resultados",
            format!("No se encontró nada para `{}`", query),
        ),
        PlayError::Resolve(ResolveError::Restricted(detail)) => (
            "Contenido restringido",
            format!("El video es privado, no está disponible o requiere inicio de sesión.\n`{}`", detail),
        ),
        PlayError::Resolve(other) => ("Error de búsqueda", other.to_string()),
    }
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

async fn reply(ctx: &Context, msg: &Message, content: impl Into<String>) -> Result<()> {
    msg.channel_id.say(&ctx.http, content).await?;
    Ok(())
}

async fn reply_embed(ctx: &Context, msg: &Message, embed: CreateEmbed) -> Result<()> {
    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::ResolvedTrack;

    fn report(titles: &[&str], outcome: EnqueueOutcome) -> PlayReport {
        PlayReport {
            added: titles
                .iter()
                .map(|title| ResolvedTrack::new("uri", *title).into_entry(UserId::new(1)))
                .collect(),
            playlist_title: None,
            outcome,
        }
    }

    #[test]
    fn test_only_queued_tracks_get_an_added_reply() {
        let queued = report(&["b"], EnqueueOutcome::Queued { position: 2 });
        let (track, position) = queued_track(&queued).unwrap();
        assert_eq!(track.title, "b");
        assert_eq!(position, 2);

        let failed = report(&["a"], EnqueueOutcome::NoneStarted);
        assert!(queued_track(&failed).is_none());

        let started = report(&["a"], EnqueueOutcome::Started(failed.added[0].clone()));
        assert!(queued_track(&started).is_none());
    }

    #[test]
    fn test_play_errors_are_described_per_kind() {
        let (title, _) = describe_play_error(&PlayError::NotConnected);
        assert_eq!(title, "Sin conexión");

        let (title, description) =
            describe_play_error(&PlayError::Resolve(ResolveError::NotFound("zzz".into())));
        assert_eq!(title, "Sin resultados");
        assert!(description.contains("zzz"));

        let (title, _) =
            describe_play_error(&PlayError::Resolve(ResolveError::Restricted("private".into())));
        assert_eq!(title, "Contenido restringido");

        let (title, description) = describe_play_error(&PlayError::Resolve(ResolveError::Timeout(30)));
        assert_eq!(title, "Error de búsqueda");
        assert!(description.contains("30"));
    }
}
