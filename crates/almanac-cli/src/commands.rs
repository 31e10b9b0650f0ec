//! Slash command parsing, shared by the TUI and the plain interactive mode.

use std::path::PathBuf;

/// Outcome of parsing a slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Show the command list
    Help,
    /// Reset the conversation
    Clear,
    /// Exit the program
    Exit,
    /// Attach an image file
    Attach(PathBuf),
    /// Remove the current attachment
    Detach,
    /// Not a recognized command
    Unknown(String),
}

/// Parse a slash command. Returns None if the input is not a command.
pub fn parse_command(input: &str) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let result = match name {
        "help" => CommandResult::Help,
        "clear" => CommandResult::Clear,
        "quit" | "exit" => CommandResult::Exit,
        "detach" => CommandResult::Detach,
        "attach" => {
            if arg.is_empty() {
                CommandResult::Unknown("attach (missing path)".to_string())
            } else {
                CommandResult::Attach(PathBuf::from(arg))
            }
        }
        other => CommandResult::Unknown(other.to_string()),
    };

    Some(result)
}

/// Help text listing the available commands
pub fn help_text() -> &'static str {
    "Commands:\n\
     /attach <path>  Attach a calendar image (JPEG or PNG)\n\
     /detach         Remove the current attachment\n\
     /clear          Reset the conversation\n\
     /help           Show this help\n\
     /quit           Exit"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse_command("schedule for Monday"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_basic_commands() {
        assert_eq!(parse_command("/help"), Some(CommandResult::Help));
        assert_eq!(parse_command("/clear"), Some(CommandResult::Clear));
        assert_eq!(parse_command("/quit"), Some(CommandResult::Exit));
        assert_eq!(parse_command("/exit"), Some(CommandResult::Exit));
        assert_eq!(parse_command("/detach"), Some(CommandResult::Detach));
    }

    #[test]
    fn test_attach_with_path() {
        assert_eq!(
            parse_command("/attach ./week.png"),
            Some(CommandResult::Attach(PathBuf::from("./week.png")))
        );
    }

    #[test]
    fn test_attach_without_path_is_rejected() {
        assert!(matches!(
            parse_command("/attach"),
            Some(CommandResult::Unknown(_))
        ));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_command("/frobnicate"),
            Some(CommandResult::Unknown("frobnicate".to_string()))
        );
    }
}
