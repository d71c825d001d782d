//! Command types and definitions.

use std::fmt;

/// Parsed `/welcome` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WelcomeCommand {
    /// Turn welcome messages on.
    On,

    /// Turn welcome messages off.
    Off,

    /// Show whether welcomes are on and any cooldown left.
    Status,

    /// Missing or unknown argument; reply with usage.
    Usage,
}

impl WelcomeCommand {
    /// Parses a command from a message text.
    ///
    /// Returns `None` if the message is not addressed to this command.
    /// Accepts an `@botname` suffix on the command word; when `bot_username`
    /// is known, a suffix naming another bot is not ours.
    #[must_use]
    pub fn parse(text: &str, prefix: &str, bot_username: Option<&str>) -> Option<Self> {
        let mut words = text.split_whitespace();
        let head = words.next()?;
        let (command, mention) = match head.split_once('@') {
            Some((cmd, bot)) => (cmd, Some(bot)),
            None => (head, None),
        };
        if !command.eq_ignore_ascii_case(prefix) {
            return None;
        }
        if let (Some(mention), Some(own)) = (mention, bot_username)
            && !mention.eq_ignore_ascii_case(own)
        {
            return None;
        }

        let args: Vec<&str> = words.collect();
        let [arg] = args.as_slice() else {
            return Some(Self::Usage);
        };

        Some(match arg.to_lowercase().as_str() {
            "on" | "enable" => Self::On,
            "off" | "disable" => Self::Off,
            "status" => Self::Status,
            _ => Self::Usage,
        })
    }

    /// Usage text shown for malformed commands.
    #[must_use]
    pub fn usage(prefix: &str) -> String {
        format!("Usage:\n⦿ {prefix} [on|off|status]\n➤ Toggle welcome messages for this group.")
    }

    /// Returns the command name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Status => "status",
            Self::Usage => "usage",
        }
    }
}

impl fmt::Display for WelcomeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "welcome {}", self.name())
    }
}

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// Response message to show the user.
    pub message: String,
}

impl CommandResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "/welcome";

    #[test]
    fn test_parse_on_off() {
        assert_eq!(WelcomeCommand::parse("/welcome on", PREFIX, None), Some(WelcomeCommand::On));
        assert_eq!(WelcomeCommand::parse("/welcome off", PREFIX, None), Some(WelcomeCommand::Off));
        assert_eq!(
            WelcomeCommand::parse("/welcome status", PREFIX, None),
            Some(WelcomeCommand::Status)
        );
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(WelcomeCommand::parse("/WELCOME ON", PREFIX, None), Some(WelcomeCommand::On));
        assert_eq!(WelcomeCommand::parse("/welcome Off", PREFIX, None), Some(WelcomeCommand::Off));
    }

    #[test]
    fn test_parse_bot_suffix() {
        assert_eq!(
            WelcomeCommand::parse("/welcome@guard_bot off", PREFIX, None),
            Some(WelcomeCommand::Off)
        );
        assert_eq!(
            WelcomeCommand::parse("/welcome@Guard_Bot off", PREFIX, Some("guard_bot")),
            Some(WelcomeCommand::Off)
        );
    }

    #[test]
    fn test_parse_ignores_other_bots() {
        assert_eq!(
            WelcomeCommand::parse("/welcome@some_other_bot off", PREFIX, Some("guard_bot")),
            None
        );
        assert_eq!(
            WelcomeCommand::parse("/welcome off", PREFIX, Some("guard_bot")),
            Some(WelcomeCommand::Off)
        );
    }

    #[test]
    fn test_parse_usage() {
        assert_eq!(WelcomeCommand::parse("/welcome", PREFIX, None), Some(WelcomeCommand::Usage));
        assert_eq!(
            WelcomeCommand::parse("/welcome maybe", PREFIX, None),
            Some(WelcomeCommand::Usage)
        );
        assert_eq!(
            WelcomeCommand::parse("/welcome on now", PREFIX, None),
            Some(WelcomeCommand::Usage)
        );
    }

    #[test]
    fn test_parse_other_text() {
        assert_eq!(WelcomeCommand::parse("/welcomes on", PREFIX, None), None);
        assert_eq!(WelcomeCommand::parse("welcome on", PREFIX, None), None);
        assert_eq!(WelcomeCommand::parse("", PREFIX, None), None);
    }

    #[test]
    fn test_parse_with_extra_whitespace() {
        assert_eq!(
            WelcomeCommand::parse("  /welcome   on  ", PREFIX, None),
            Some(WelcomeCommand::On)
        );
    }
}
