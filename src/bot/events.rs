use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::{ChannelId, GuildId},
};
use songbird::Songbird;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info};

use crate::{
    audio::{player::MusicPlayer, queue::QueueEntry, sink::PlaybackListener},
    ui::embeds,
};

/// Salida automática del canal de voz al vaciarse la cola
pub struct IdleDisconnect {
    // Weak: la sesión guarda este listener y el reproductor guarda la sesión
    player: Weak<MusicPlayer>,
    songbird: Arc<Songbird>,
}

impl IdleDisconnect {
    pub fn new(player: &Arc<MusicPlayer>, songbird: Arc<Songbird>) -> Self {
        Self {
            player: Arc::downgrade(player),
            songbird,
        }
    }
}

/// Anuncia los eventos de reproducción en el canal de texto donde se pidió música
pub struct ChannelAnnouncer {
    http: Arc<Http>,
    guild_id: GuildId,
    channel_id: ChannelId,
    idle_disconnect: Option<IdleDisconnect>,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>, guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self {
            http,
            guild_id,
            channel_id,
            idle_disconnect: None,
        }
    }

    pub fn with_idle_disconnect(mut self, idle_disconnect: IdleDisconnect) -> Self {
        self.idle_disconnect = Some(idle_disconnect);
        self
    }

    /// Envía en segundo plano para no bloquear al controlador del servidor
    fn send(&self, message: CreateMessage) {
        let http = self.http.clone();
        let channel_id = self.channel_id;
        let guild_id = self.guild_id;

        tokio::spawn(async move {
            if let Err(e) = channel_id.send_message(&http, message).await {
                error!("Error al enviar anuncio en guild {}: {:?}", guild_id, e);
            }
        });
    }

    fn send_embed(&self, embed: CreateEmbed) {
        self.send(CreateMessage::new().embed(embed));
    }

    fn disconnect_when_idle(&self, idle: &IdleDisconnect) {
        let player = idle.player.clone();
        let songbird = idle.songbird.clone();
        let http = self.http.clone();
        let guild_id = self.guild_id;
        let channel_id = self.channel_id;

        // Se ejecuta fuera del controlador: `leave_if_idle` le envía un mensaje
        tokio::spawn(async move {
            let Some(player) = player.upgrade() else {
                return;
            };
            if !player.leave_if_idle(guild_id).await {
                debug!("Guild {} volvió a tener música, se mantiene la conexión", guild_id);
                return;
            }

            if let Err(e) = songbird.remove(guild_id).await {
                error!("Error al salir del canal de voz en guild {}: {:?}", guild_id, e);
                return;
            }
            info!("💤 Desconectado por inactividad en guild {}", guild_id);

            let message =
                CreateMessage::new().content("👋 La cola terminó, me desconecté del canal de voz.");
            if let Err(e) = channel_id.send_message(&http, message).await {
                error!("Error al enviar anuncio en guild {}: {:?}", guild_id, e);
            }
        });
    }
}

impl PlaybackListener for ChannelAnnouncer {
    fn track_started(&self, entry: &QueueEntry) {
        self.send_embed(embeds::create_now_playing_embed(entry));
    }

    fn track_failed(&self, entry: &QueueEntry, reason: &str) {
        self.send_embed(embeds::create_track_failed_embed(entry, reason));
    }

    fn queue_finished(&self) {
        debug!("📭 Cola terminada en guild {}", self.guild_id);

        match &self.idle_disconnect {
            Some(idle) => self.disconnect_when_idle(idle),
            None => self.send(
                CreateMessage::new().content("📭 La cola terminó. Usa `play` para agregar más música."),
            ),
        }
    }
}
