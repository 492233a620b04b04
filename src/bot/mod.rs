//! # Bot Module
//!
//! Discord side of the bot: prefix command parsing, voice connection
//! management and the serenity event handler.
//!
//! ## Architecture
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`]. Incoming messages are
//! parsed into a [`commands::Command`] and routed to one handler per variant
//! in [`handlers`]. Playback state lives in the shared [`MusicPlayer`]; the
//! bot only owns the songbird connection lifecycle.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::{player::MusicPlayer, songbird_sink::SongbirdSink},
    config::Config,
};
use commands::Command;
use events::{ChannelAnnouncer, IdleDisconnect};

/// Main Discord bot handler.
///
/// ## Fields
///
/// - `config`: Bot configuration (token, prefix, audio settings)
/// - `player`: Per-guild queues and playback controllers
/// - `http_client`: Shared HTTP client used to stream resolved audio
/// - `ytdlp_program`: yt-dlp binary songbird runs for lazily resolved entries
pub struct MusicBot {
    config: Arc<Config>,
    pub player: Arc<MusicPlayer>,
    http_client: reqwest::Client,
    ytdlp_program: &'static str,
}

impl MusicBot {
    pub fn new(config: Config, player: Arc<MusicPlayer>) -> Self {
        // Songbird exige `&'static str`; se crea una sola vez por proceso
        let ytdlp_program: &'static str =
            Box::leak(config.ytdlp_path.to_string_lossy().into_owned().into_boxed_str());

        Self {
            config: Arc::new(config),
            player,
            http_client: reqwest::Client::new(),
            ytdlp_program,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.config.command_prefix
    }

    /// Connects the bot to a voice channel and binds the guild session to it.
    ///
    /// Joining while already connected moves the bot to `channel_id` and keeps
    /// the current queue. Announcements go to `text_channel`.
    ///
    /// # Required Permissions
    ///
    /// - `Connect` - To join the voice channel
    /// - `Speak` - To play audio in the channel
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
        text_channel: ChannelId,
    ) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = match manager.join(guild_id, channel_id).await {
            Ok(call) => call,
            Err(e) => {
                error!("Error al conectar al canal de voz: {:?}", e);
                // No dejar una llamada a medio crear
                let _ = manager.remove(guild_id).await;
                anyhow::bail!("No pude conectarme al canal de voz");
            }
        };

        let sink = SongbirdSink::new(
            call,
            self.http_client.clone(),
            self.config.default_volume,
            self.ytdlp_program,
        );
        let mut announcer = ChannelAnnouncer::new(ctx.http.clone(), guild_id, text_channel);
        if self.config.idle_disconnect {
            announcer = announcer.with_idle_disconnect(IdleDisconnect::new(&self.player, manager));
        }
        self.player
            .join(guild_id, Arc::new(sink), Arc::new(announcer));

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);
        Ok(())
    }

    /// Disconnects from voice and discards the guild session.
    ///
    /// Returns `false` when the bot was not connected in that guild.
    pub async fn leave_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Result<bool> {
        let had_session = self.player.leave(guild_id).await;

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let had_call = manager.get(guild_id).is_some();
        if had_call {
            manager.remove(guild_id).await?;
        }

        if had_session || had_call {
            info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        }
        Ok(had_session || had_call)
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
        info!("⌨️ Prefijo de comandos: {}", self.prefix());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        // Solo comandos dentro de servidores
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let command = match Command::parse(self.prefix(), &msg.content) {
            None => return,
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                if let Err(why) = msg.channel_id.say(&ctx.http, format!("❌ {}", e)).await {
                    error!("Error respondiendo: {:?}", why);
                }
                return;
            }
        };

        info!(
            "📝 Comando {} usado por {} en guild {}",
            command.name(),
            msg.author.name,
            guild_id
        );

        if let Err(e) = handlers::handle_command(&ctx, &msg, guild_id, command, self).await {
            error!("Error manejando comando: {:?}", e);
        }
    }

    /// Cleans up the guild session when the bot is disconnected from voice
    /// by someone else (kicked, channel deleted).
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            if self.player.leave(guild_id).await {
                warn!("🔌 Bot desconectado en guild {}, sesión descartada", guild_id);
            }
        }
    }
}
