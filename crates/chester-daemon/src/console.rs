//! Console input format.
//!
//! Each stdin line is one chat message: `<user> <voice channel|-> <text>`,
//! where `-` means the user is not in a voice channel. Lines starting with
//! `:` are operator controls for the simulated transport.

use chester_core::{Caller, ChannelId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Message { caller: Caller, text: String },
    /// End the current playback in a channel (manual clock).
    Finish(ChannelId),
    /// Print a channel's session snapshot.
    Status(ChannelId),
    Blank,
}

pub fn parse_line(line: &str) -> Result<ConsoleInput, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleInput::Blank);
    }

    if let Some(control) = line.strip_prefix(':') {
        let mut words = control.split_whitespace();
        let name = words.next().unwrap_or_default();
        let channel = words
            .next()
            .map(ChannelId::from)
            .ok_or_else(|| format!(":{name} needs a channel"))?;
        return match name {
            "finish" => Ok(ConsoleInput::Finish(channel)),
            "status" => Ok(ConsoleInput::Status(channel)),
            other => Err(format!("unknown control :{other}")),
        };
    }

    let mut parts = line.splitn(3, char::is_whitespace);
    let (Some(user), Some(channel), Some(text)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err("expected `<user> <channel|-> <message>`".to_string());
    };

    let voice_channel = (channel != "-").then(|| ChannelId::from(channel));
    Ok(ConsoleInput::Message {
        caller: Caller::new(UserId::from(user), voice_channel),
        text: text.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_with_channel() {
        assert_eq!(
            parse_line("alice lounge !play abc").unwrap(),
            ConsoleInput::Message {
                caller: Caller::in_channel("alice", "lounge"),
                text: "!play abc".to_string(),
            }
        );
    }

    #[test]
    fn dash_means_no_voice_channel() {
        let ConsoleInput::Message { caller, text } = parse_line("bob - !library").unwrap() else {
            panic!("expected message");
        };
        assert_eq!(caller.voice_channel, None);
        assert_eq!(text, "!library");
    }

    #[test]
    fn message_keeps_inner_spaces() {
        let ConsoleInput::Message { text, .. } = parse_line("a c !play two words").unwrap() else {
            panic!("expected message");
        };
        assert_eq!(text, "!play two words");
    }

    #[test]
    fn controls() {
        assert_eq!(
            parse_line(":finish lounge").unwrap(),
            ConsoleInput::Finish(ChannelId::from("lounge"))
        );
        assert_eq!(
            parse_line(":status lounge").unwrap(),
            ConsoleInput::Status(ChannelId::from("lounge"))
        );
        assert!(parse_line(":finish").is_err());
        assert!(parse_line(":rewind lounge").is_err());
    }

    #[test]
    fn blank_and_short_lines() {
        assert_eq!(parse_line("   ").unwrap(), ConsoleInput::Blank);
        assert!(parse_line("alice lounge").is_err());
    }
}
