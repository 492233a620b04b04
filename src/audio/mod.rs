//! # Audio Module
//!
//! Per-guild playback for the bot.
//!
//! ## Architecture
//!
//! ### [`queue`] - Guild Queue
//! - Strict FIFO of pending entries plus the "now playing" slot
//!
//! ### [`player`] - Playback Controller
//! - Keyed registry of guild sessions, one controller task per guild
//! - Idle / Playing / Paused state machine driven by commands and track
//!   completions
//!
//! ### [`sink`] - Audio Output seams
//! - [`sink::AudioSink`] / [`sink::PlaybackHandle`] abstract the voice
//!   connection; [`sink::PlaybackListener`] receives playback announcements
//!
//! ### [`songbird_sink`] - Songbird backend
//! - Streams resolved URLs into a songbird `Call` and reports track end /
//!   track error back to the controller
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! # async fn example(
//! #     player: &crate::audio::player::MusicPlayer,
//! #     sink: std::sync::Arc<dyn crate::audio::sink::AudioSink>,
//! #     listener: std::sync::Arc<dyn crate::audio::sink::PlaybackListener>,
//! # ) -> anyhow::Result<()> {
//! use serenity::all::{GuildId, UserId};
//!
//! let guild_id = GuildId::new(123456789);
//! player.join(guild_id, sink, listener);
//!
//! // Resolver y encolar
//! player.play(guild_id, "never gonna give you up", UserId::new(1)).await?;
//!
//! // Controlar la reproducción
//! player.pause(guild_id).await;
//! player.resume(guild_id).await;
//! player.skip(guild_id).await;
//! # Ok(())
//! # }
//! ```

pub mod player;
pub mod queue;
pub mod sink;
pub mod songbird_sink;
