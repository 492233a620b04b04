use thiserror::Error;

/// Comandos de texto reconocidos por el bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join,
    Leave,
    Play(String),
    Pause,
    Resume,
    Skip,
    NowPlaying,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("falta la búsqueda: `{prefix}play <url o texto>`")]
    MissingQuery { prefix: String },
}

impl Command {
    /// Interpreta un mensaje.
    ///
    /// Returns `None` when the message is not addressed to the bot (missing
    /// prefix or unknown command word), so ordinary chat is ignored.
    pub fn parse(prefix: &str, content: &str) -> Option<Result<Self, ParseError>> {
        let rest = content.trim_start().strip_prefix(prefix)?;

        let (word, args) = match rest.split_once(char::is_whitespace) {
            Some((word, args)) => (word, args.trim()),
            None => (rest, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "join" => Self::Join,
            "leave" => Self::Leave,
            "play" => {
                if args.is_empty() {
                    return Some(Err(ParseError::MissingQuery {
                        prefix: prefix.to_string(),
                    }));
                }
                Self::Play(args.to_string())
            }
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "skip" => Self::Skip,
            "np" => Self::NowPlaying,
            _ => return None,
        };

        Some(Ok(command))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Play(_) => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Skip => "skip",
            Self::NowPlaying => "np",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(content: &str) -> Option<Result<Command, ParseError>> {
        Command::parse("!", content)
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("!join"), Some(Ok(Command::Join)));
        assert_eq!(parse("!leave"), Some(Ok(Command::Leave)));
        assert_eq!(parse("!pause"), Some(Ok(Command::Pause)));
        assert_eq!(parse("!resume"), Some(Ok(Command::Resume)));
        assert_eq!(parse("!skip"), Some(Ok(Command::Skip)));
        assert_eq!(parse("!np"), Some(Ok(Command::NowPlaying)));
    }

    #[test]
    fn test_play_keeps_full_query() {
        assert_eq!(
            parse("!play  never gonna   give you up "),
            Some(Ok(Command::Play("never gonna   give you up".to_string())))
        );
        assert_eq!(
            parse("!play https://youtu.be/dQw4w9WgXcQ"),
            Some(Ok(Command::Play("https://youtu.be/dQw4w9WgXcQ".to_string())))
        );
    }

    #[test]
    fn test_play_without_query() {
        assert_eq!(
            parse("!play   "),
            Some(Err(ParseError::MissingQuery {
                prefix: "!".to_string()
            }))
        );
    }

    #[test]
    fn test_command_word_is_case_insensitive() {
        assert_eq!(parse("!SKIP"), Some(Ok(Command::Skip)));
        assert_eq!(parse("  !Np"), Some(Ok(Command::NowPlaying)));
    }

    #[test]
    fn test_non_commands_are_ignored() {
        assert_eq!(parse("hola"), None);
        assert_eq!(parse("!"), None);
        assert_eq!(parse("! play x"), None);
        assert_eq!(parse("!dance"), None);
        assert_eq!(parse("!skipping"), None);
    }

    #[test]
    fn test_multi_char_prefix() {
        assert_eq!(
            Command::parse("mb!", "mb!play lofi"),
            Some(Ok(Command::Play("lofi".to_string())))
        );
        assert_eq!(Command::parse("mb!", "!play lofi"), None);
    }
}
