//! Command surface: the command table, syntax conventions and argument parsing.
//!
//! Commands are data. Each entry names the command word, how many
//! whitespace-separated arguments it needs and which privileged action it
//! maps to. Transport bindings only decide the syntax convention.

use std::fmt;

use chrono::NaiveDate;

use crate::keeper::auth::Action;
use crate::keeper::checklist::parse_tasks;

/// How commands are spelled in chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandSyntax {
    /// `/send -100123 hello`, optionally `/send@my_bot ...`
    #[default]
    Slash,
    /// `send -100123 hello`
    Bare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Admin,
    Send,
    Pin,
    Summary,
    Checklist,
    Done,
}

#[derive(Debug)]
pub struct CommandSpec {
    pub kind: CommandKind,
    pub name: &'static str,
    pub min_args: usize,
    /// Argument synopsis shown in usage hints.
    pub synopsis: &'static str,
    /// `None` for commands anyone may use.
    pub action: Option<Action>,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        kind: CommandKind::Admin,
        name: "admin",
        min_args: 0,
        synopsis: "",
        action: Some(Action::OpenMenu),
    },
    CommandSpec {
        kind: CommandKind::Send,
        name: "send",
        min_args: 2,
        synopsis: "<chat_id> <text>",
        action: Some(Action::Send),
    },
    CommandSpec {
        kind: CommandKind::Pin,
        name: "pin",
        min_args: 2,
        synopsis: "<chat_id> <text>",
        action: Some(Action::Pin),
    },
    CommandSpec {
        kind: CommandKind::Summary,
        name: "summary",
        min_args: 3,
        synopsis: "<chat_id> <YYYY-MM-DD> <YYYY-MM-DD>",
        action: Some(Action::Summary),
    },
    CommandSpec {
        kind: CommandKind::Checklist,
        name: "checklist",
        min_args: 2,
        synopsis: "<chat_id> task1; task2",
        action: Some(Action::CreateChecklist),
    },
    CommandSpec {
        kind: CommandKind::Done,
        name: "done",
        min_args: 1,
        synopsis: "<number>",
        action: None,
    },
];

pub fn spec_for(kind: CommandKind) -> &'static CommandSpec {
    // Every kind has exactly one table entry
    COMMANDS
        .iter()
        .find(|spec| spec.kind == kind)
        .unwrap_or(&COMMANDS[0])
}

/// A fully parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Admin,
    Send { chat_id: i64, text: String },
    Pin { chat_id: i64, text: String },
    Summary { chat_id: i64, start: NaiveDate, end: NaiveDate },
    Checklist { chat_id: i64, tasks: String },
    Done { index: i64 },
}

/// Why a recognized command could not be parsed. Display is the reply text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Usage(String),
    Malformed { reason: String, usage: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(usage) => write!(f, "Usage: {usage}"),
            Self::Malformed { reason, usage } => write!(f, "{reason}\nUsage: {usage}"),
        }
    }
}

impl std::error::Error for CommandError {}

/// A command word found in a message, arguments not yet parsed.
#[derive(Debug)]
pub struct Invocation<'a> {
    pub spec: &'static CommandSpec,
    syntax: CommandSyntax,
    args: &'a str,
}

impl CommandSyntax {
    /// Usage line for `spec` spelled in this syntax.
    pub fn usage(self, spec: &CommandSpec) -> String {
        let prefix = match self {
            Self::Slash => "/",
            Self::Bare => "",
        };
        if spec.synopsis.is_empty() {
            format!("{prefix}{}", spec.name)
        } else {
            format!("{prefix}{} {}", spec.name, spec.synopsis)
        }
    }

    /// Find the command word at the start of `text`, if it is one of ours.
    ///
    /// A slash command addressed to another bot (`/done@other_bot`) is not
    /// ours. Without a known `bot_username` any addressee is accepted.
    pub fn recognize<'a>(self, text: &'a str, bot_username: Option<&str>) -> Option<Invocation<'a>> {
        let (word, args) = split_word(text)?;
        let name = match self {
            Self::Slash => {
                let word = word.strip_prefix('/')?;
                match word.split_once('@') {
                    Some((name, addressee)) => {
                        if bot_username.is_some_and(|own| !own.eq_ignore_ascii_case(addressee)) {
                            return None;
                        }
                        name
                    }
                    None => word,
                }
            }
            Self::Bare => word,
        };
        let spec = COMMANDS.iter().find(|spec| spec.name.eq_ignore_ascii_case(name))?;
        Some(Invocation { spec, syntax: self, args })
    }
}

impl Invocation<'_> {
    pub fn parse(&self) -> Result<Command, CommandError> {
        let args: Vec<&str> = self.args.split_whitespace().collect();
        if args.len() < self.spec.min_args {
            return Err(CommandError::Usage(self.usage()));
        }

        match self.spec.kind {
            CommandKind::Admin => Ok(Command::Admin),
            CommandKind::Send => {
                let (chat_id, text) = self.chat_and_tail()?;
                Ok(Command::Send { chat_id, text })
            }
            CommandKind::Pin => {
                let (chat_id, text) = self.chat_and_tail()?;
                Ok(Command::Pin { chat_id, text })
            }
            CommandKind::Checklist => {
                let (chat_id, tasks) = self.chat_and_tail()?;
                if parse_tasks(&tasks).is_empty() {
                    return Err(self.malformed("No tasks given".to_string()));
                }
                Ok(Command::Checklist { chat_id, tasks })
            }
            CommandKind::Summary => {
                let chat_id = self.chat_id(args[0])?;
                let start = self.date(args[1])?;
                let end = self.date(args[2])?;
                if start > end {
                    return Err(self.malformed(format!("Start date {start} is after end date {end}")));
                }
                Ok(Command::Summary { chat_id, start, end })
            }
            CommandKind::Done => {
                let index = args[0]
                    .parse::<i64>()
                    .map_err(|_| self.malformed(format!("Invalid number: {}", args[0])))?;
                Ok(Command::Done { index })
            }
        }
    }

    fn usage(&self) -> String {
        self.syntax.usage(self.spec)
    }

    fn malformed(&self, reason: String) -> CommandError {
        CommandError::Malformed {
            reason,
            usage: self.usage(),
        }
    }

    fn chat_id(&self, raw: &str) -> Result<i64, CommandError> {
        raw.parse::<i64>()
            .map_err(|_| self.malformed(format!("Invalid chat id: {raw}")))
    }

    fn date(&self, raw: &str) -> Result<NaiveDate, CommandError> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| self.malformed(format!("Invalid date: {raw}")))
    }

    /// Chat ID followed by free text, the text kept verbatim.
    fn chat_and_tail(&self) -> Result<(i64, String), CommandError> {
        let (raw_id, tail) = split_word(self.args).ok_or_else(|| CommandError::Usage(self.usage()))?;
        let chat_id = self.chat_id(raw_id)?;
        if tail.is_empty() {
            return Err(CommandError::Usage(self.usage()));
        }
        Ok((chat_id, tail.trim_end().to_string()))
    }
}

/// First whitespace-delimited word and the rest with leading whitespace removed.
fn split_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.find(char::is_whitespace) {
        Some(end) => Some((&text[..end], text[end..].trim_start())),
        None => Some((text, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(syntax: CommandSyntax, text: &str) -> Option<Result<Command, CommandError>> {
        syntax.recognize(text, Some("keeper_bot")).map(|inv| inv.parse())
    }

    fn slash(text: &str) -> Option<Result<Command, CommandError>> {
        parse(CommandSyntax::Slash, text)
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_every_kind_has_a_spec() {
        for kind in [
            CommandKind::Admin,
            CommandKind::Send,
            CommandKind::Pin,
            CommandKind::Summary,
            CommandKind::Checklist,
            CommandKind::Done,
        ] {
            assert_eq!(spec_for(kind).kind, kind);
        }
    }

    #[test]
    fn test_only_done_is_public() {
        for spec in COMMANDS {
            assert_eq!(spec.action.is_none(), spec.kind == CommandKind::Done, "{}", spec.name);
        }
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert!(slash("hello there").is_none());
        assert!(slash("").is_none());
        assert!(slash("/unknown 1 2").is_none());
    }

    #[test]
    fn test_admin() {
        assert_eq!(slash("/admin"), Some(Ok(Command::Admin)));
        assert_eq!(slash("/ADMIN extra"), Some(Ok(Command::Admin)));
    }

    #[test]
    fn test_bot_mention_suffix() {
        assert_eq!(slash("/done@keeper_bot 2"), Some(Ok(Command::Done { index: 2 })));
        assert_eq!(slash("/done@Keeper_Bot 2"), Some(Ok(Command::Done { index: 2 })));
    }

    #[test]
    fn test_command_for_other_bot_is_ignored() {
        assert!(slash("/done@other_bot 1").is_none());
        assert!(slash("/admin@other_bot").is_none());
    }

    #[test]
    fn test_unknown_own_username_accepts_any_mention() {
        let cmd = CommandSyntax::Slash.recognize("/done@whatever_bot 1", None).map(|inv| inv.parse());
        assert_eq!(cmd, Some(Ok(Command::Done { index: 1 })));
    }

    #[test]
    fn test_send_keeps_text_verbatim() {
        let cmd = slash("/send -100123 hello   world\nsecond line").unwrap().unwrap();
        assert_eq!(
            cmd,
            Command::Send {
                chat_id: -100123,
                text: "hello   world\nsecond line".to_string()
            }
        );
    }

    #[test]
    fn test_pin() {
        let cmd = slash("/pin -5 read the rules").unwrap().unwrap();
        assert_eq!(cmd, Command::Pin { chat_id: -5, text: "read the rules".to_string() });
    }

    #[test]
    fn test_missing_args_gives_usage() {
        let err = slash("/send -100123").unwrap().unwrap_err();
        assert_eq!(err, CommandError::Usage("/send <chat_id> <text>".to_string()));
        assert_eq!(err.to_string(), "Usage: /send <chat_id> <text>");

        let err = slash("/summary -1 2024-01-01").unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Usage: /summary <chat_id> <YYYY-MM-DD> <YYYY-MM-DD>");

        let err = slash("/done").unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Usage: /done <number>");
    }

    #[test]
    fn test_bad_chat_id() {
        let err = slash("/send abc hello").unwrap().unwrap_err();
        assert!(matches!(err, CommandError::Malformed { .. }));
        assert_eq!(err.to_string(), "Invalid chat id: abc\nUsage: /send <chat_id> <text>");
    }

    #[test]
    fn test_summary() {
        let cmd = slash("/summary -100123 2024-01-01 2024-01-31").unwrap().unwrap();
        assert_eq!(
            cmd,
            Command::Summary {
                chat_id: -100123,
                start: date("2024-01-01"),
                end: date("2024-01-31"),
            }
        );
    }

    #[test]
    fn test_summary_bad_date() {
        let err = slash("/summary -1 2024-13-01 2024-01-31").unwrap().unwrap_err();
        assert!(err.to_string().starts_with("Invalid date: 2024-13-01"));
        let err = slash("/summary -1 yesterday 2024-01-31").unwrap().unwrap_err();
        assert!(matches!(err, CommandError::Malformed { .. }));
    }

    #[test]
    fn test_summary_reversed_range() {
        let err = slash("/summary -1 2024-02-01 2024-01-01").unwrap().unwrap_err();
        assert!(err.to_string().contains("after"));
    }

    #[test]
    fn test_checklist() {
        let cmd = slash("/checklist -42 Buy milk; ; Call Bob").unwrap().unwrap();
        assert_eq!(
            cmd,
            Command::Checklist {
                chat_id: -42,
                tasks: "Buy milk; ; Call Bob".to_string()
            }
        );
    }

    #[test]
    fn test_checklist_without_tasks() {
        let err = slash("/checklist -42 ; ;").unwrap().unwrap_err();
        assert!(err.to_string().starts_with("No tasks given"));
    }

    #[test]
    fn test_done_index() {
        assert_eq!(slash("/done 3"), Some(Ok(Command::Done { index: 3 })));
        assert_eq!(slash("/done -1"), Some(Ok(Command::Done { index: -1 })));
        let err = slash("/done two").unwrap().unwrap_err();
        assert!(matches!(err, CommandError::Malformed { .. }));
    }

    #[test]
    fn test_bare_syntax() {
        let bare = CommandSyntax::Bare;
        assert_eq!(parse(bare, "done 1"), Some(Ok(Command::Done { index: 1 })));
        assert_eq!(parse(bare, "Admin"), Some(Ok(Command::Admin)));
        assert!(parse(bare, "/done 1").is_none());
        assert!(parse(bare, "doneness 1").is_none());

        let err = parse(bare, "pin 5").unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Usage: pin <chat_id> <text>");
    }

    #[test]
    fn test_slash_syntax_ignores_bare_words() {
        assert!(slash("done 1").is_none());
    }
}
