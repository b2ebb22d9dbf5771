//! Input line parsing
//!
//! Anything not starting with `/` is a question for the assistant.

use std::path::PathBuf;

/// One line of user input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// A question for the assistant
    Ask(String),
    /// Start a fresh conversation
    New,
    /// Continue a stored conversation
    Resume(String),
    /// Upload a PDF; prompts for a subject when none is given
    Upload {
        /// File on disk
        path: PathBuf,
        /// Subject typed on the same line
        subject: Option<String>,
    },
    /// List uploaded documents
    Files,
    /// Delete a document after confirmation
    Delete(String),
    /// Show the session state
    Session,
    /// Show the command list
    Help,
    /// Leave
    Quit,
    /// A command missing its argument
    Usage(&'static str),
    /// Not a known command
    Unknown(String),
}

/// Command list shown by `/help`
pub const HELP: &str = "\
Commands:
  <question>               ask about your documents
  /new                     start a new conversation
  /resume <chat-id>        continue a stored conversation
  /upload <path> [subject] upload a PDF (subject defaults to General)
  /files                   list uploaded documents
  /delete <id>             delete a document
  /session                 show the current session
  /help                    show this list
  /quit                    leave";

impl Command {
    /// Parse one input line
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Ask(line.to_string());
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        match name {
            "new" => Self::New,
            "resume" if argument.is_empty() => Self::Usage("/resume <chat-id>"),
            "resume" => Self::Resume(argument.to_string()),
            "upload" if argument.is_empty() => Self::Usage("/upload <path> [subject]"),
            "upload" => {
                let (path, subject) = match argument.split_once(char::is_whitespace) {
                    Some((path, subject)) => (path, Some(subject.trim().to_string())),
                    None => (argument, None),
                };
                Self::Upload {
                    path: PathBuf::from(path),
                    subject,
                }
            }
            "files" | "ls" => Self::Files,
            "delete" | "rm" if argument.is_empty() => Self::Usage("/delete <id>"),
            "delete" | "rm" => Self::Delete(argument.to_string()),
            "session" => Self::Session,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Whether a confirmation answer means yes
#[must_use]
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_is_a_question() {
        assert_eq!(
            Command::parse("  What is osmosis?  "),
            Command::Ask("What is osmosis?".to_string())
        );
    }

    #[test]
    fn test_blank_line_is_an_empty_question() {
        assert_eq!(Command::parse("   "), Command::Ask(String::new()));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::parse("/new"), Command::New);
        assert_eq!(Command::parse("/files"), Command::Files);
        assert_eq!(Command::parse("/session"), Command::Session);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("/quit"), Command::Quit);
        assert_eq!(Command::parse("/exit"), Command::Quit);
    }

    #[test]
    fn test_upload_with_and_without_subject() {
        assert_eq!(
            Command::parse("/upload notes.pdf"),
            Command::Upload {
                path: PathBuf::from("notes.pdf"),
                subject: None,
            }
        );
        assert_eq!(
            Command::parse("/upload ~/docs/cells.pdf  Cell Biology "),
            Command::Upload {
                path: PathBuf::from("~/docs/cells.pdf"),
                subject: Some("Cell Biology".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_arguments_show_usage() {
        assert_eq!(
            Command::parse("/upload"),
            Command::Usage("/upload <path> [subject]")
        );
        assert_eq!(Command::parse("/delete  "), Command::Usage("/delete <id>"));
        assert_eq!(Command::parse("/resume"), Command::Usage("/resume <chat-id>"));
    }

    #[test]
    fn test_delete_and_resume_take_an_id() {
        assert_eq!(
            Command::parse("/delete 42"),
            Command::Delete("42".to_string())
        );
        assert_eq!(
            Command::parse("/resume chat-abc"),
            Command::Resume("chat-abc".to_string())
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::parse("/frobnicate now"),
            Command::Unknown("frobnicate".to_string())
        );
    }

    #[test]
    fn test_confirmation_answers() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES \n"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("sure"));
    }
}
