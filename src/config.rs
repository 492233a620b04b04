use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Audio
    pub default_volume: f32,
    /// Salir del canal de voz cuando la cola se vacía
    pub idle_disconnect: bool,

    // Resolución (yt-dlp)
    pub ytdlp_path: PathBuf,
    pub resolve_timeout: Duration,
    pub max_playlist_size: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// `load` feeds this from the process environment; tests feed it from a
    /// map so they never touch global state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|val| !val.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let config = Self {
            // Discord
            discord_token: lookup("DISCORD_TOKEN")
                .filter(|val| !val.trim().is_empty())
                .context("DISCORD_TOKEN no está definido")?,
            command_prefix: read("COMMAND_PREFIX", "!"),

            // Audio
            default_volume: read("DEFAULT_VOLUME", "0.5")
                .parse()
                .context("DEFAULT_VOLUME inválido")?,
            idle_disconnect: parse_flag(&read("IDLE_DISCONNECT", "false"))
                .context("IDLE_DISCONNECT inválido")?,

            // Resolución
            ytdlp_path: read("YTDLP_PATH", "yt-dlp").into(),
            resolve_timeout: Duration::from_secs(
                read("RESOLVE_TIMEOUT_SECS", "30")
                    .parse()
                    .context("RESOLVE_TIMEOUT_SECS inválido")?,
            ),
            max_playlist_size: read("MAX_PLAYLIST_SIZE", "100")
                .parse()
                .context("MAX_PLAYLIST_SIZE inválido")?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 2.0
    /// - The command prefix must not contain whitespace
    /// - Timeouts and playlist limits must be greater than zero
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.command_prefix.chars().any(char::is_whitespace) {
            anyhow::bail!(
                "Command prefix must not contain whitespace, got: {:?}",
                self.command_prefix
            );
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: prefix {:?}\n  \
            Audio: {}% vol, idle disconnect {}\n  \
            Resolver: {} ({}s timeout, {} max playlist entries)",
            self.command_prefix,
            (self.default_volume * 100.0) as u32,
            if self.idle_disconnect { "on" } else { "off" },
            self.ytdlp_path.display(),
            self.resolve_timeout.as_secs(),
            self.max_playlist_size,
        )
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("se esperaba true/false, recibido: {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "abc")])).unwrap();

        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.ytdlp_path, PathBuf::from("yt-dlp"));
        assert_eq!(config.resolve_timeout, Duration::from_secs(30));
        assert_eq!(config.max_playlist_size, 100);
        assert!(!config.idle_disconnect);
    }

    #[test]
    fn idle_disconnect_flag() {
        let on = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("IDLE_DISCONNECT", "True"),
        ]))
        .unwrap();
        assert!(on.idle_disconnect);

        let off = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("IDLE_DISCONNECT", "0"),
        ]))
        .unwrap();
        assert!(!off.idle_disconnect);

        assert!(Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("IDLE_DISCONNECT", "maybe"),
        ]))
        .is_err());
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(Config::from_lookup(lookup_from(&[("COMMAND_PREFIX", "?")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "  ")])).is_err());
    }

    #[test]
    fn custom_prefix_is_used() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("COMMAND_PREFIX", "$$"),
        ]))
        .unwrap();

        assert_eq!(config.command_prefix, "$$");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("COMMAND_PREFIX", "! "),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("DEFAULT_VOLUME", "3.0"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("MAX_PLAYLIST_SIZE", "0"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("RESOLVE_TIMEOUT_SECS", "soon"),
        ]))
        .is_err());
    }

    #[test]
    fn summary_does_not_leak_token() {
        let config =
            Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "super-secret")])).unwrap();

        assert!(!config.summary().contains("super-secret"));
    }
}
