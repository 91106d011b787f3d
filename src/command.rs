//! Command line parsing
//!
//! Command names are matched case-insensitively; the argument text is taken
//! verbatim from the line. `rm -r` is the only two-token command name.

use std::fmt;

/// Typed word that ends the session. Case-sensitive on purpose, so a noisy
/// transcription like "Exit" does not close the shell.
pub const EXIT_KEYWORD: &str = "exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    List,
    Pwd,
    ChangeDir,
    MakeDir,
    Touch,
    RemoveFile,
    RemoveTree,
    Clear,
    Unknown,
}

impl CommandName {
    /// Every dispatchable command
    pub fn all() -> &'static [CommandName] {
        &[
            CommandName::List,
            CommandName::Pwd,
            CommandName::ChangeDir,
            CommandName::MakeDir,
            CommandName::Touch,
            CommandName::RemoveFile,
            CommandName::RemoveTree,
            CommandName::Clear,
        ]
    }

    /// Concrete syntax typed at the prompt
    pub fn keyword(&self) -> &'static str {
        match self {
            CommandName::List => "ls",
            CommandName::Pwd => "pwd",
            CommandName::ChangeDir => "cd",
            CommandName::MakeDir => "mkdir",
            CommandName::Touch => "touch",
            CommandName::RemoveFile => "rm",
            CommandName::RemoveTree => "rm -r",
            CommandName::Clear => "clear",
            CommandName::Unknown => "unknown",
        }
    }

    /// Structured name used by the translator protocol
    pub fn api_name(&self) -> &'static str {
        match self {
            CommandName::List => "list",
            CommandName::Pwd => "pwd",
            CommandName::ChangeDir => "changeDir",
            CommandName::MakeDir => "makeDir",
            CommandName::Touch => "touch",
            CommandName::RemoveFile => "removeFile",
            CommandName::RemoveTree => "removeTree",
            CommandName::Clear => "clear",
            CommandName::Unknown => "unknown",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CommandName::List => "list directory contents",
            CommandName::Pwd => "print working directory",
            CommandName::ChangeDir => "change directory",
            CommandName::MakeDir => "make a directory",
            CommandName::Touch => "create a file if it does not exist",
            CommandName::RemoveFile => "remove a file",
            CommandName::RemoveTree => "remove a directory and its contents",
            CommandName::Clear => "clear the screen",
            CommandName::Unknown => "not a command",
        }
    }

    pub fn requires_argument(&self) -> bool {
        matches!(
            self,
            CommandName::ChangeDir
                | CommandName::MakeDir
                | CommandName::Touch
                | CommandName::RemoveFile
                | CommandName::RemoveTree
        )
    }

    /// Look up a name given either as a keyword (`rm -r`) or an API name
    /// (`removeTree`). Anything else is `Unknown`.
    pub fn lookup(name: &str) -> CommandName {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::all()
            .iter()
            .find(|cmd| {
                cmd.keyword().eq_ignore_ascii_case(&normalized)
                    || cmd.api_name().eq_ignore_ascii_case(&normalized)
            })
            .copied()
            .unwrap_or(CommandName::Unknown)
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A command ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: CommandName,
    /// Argument text, inner spacing preserved, outer whitespace trimmed
    pub argument: String,
    /// The whole trimmed line, kept for diagnostics
    pub raw: String,
}

impl ParsedCommand {
    pub fn new(name: CommandName, argument: impl Into<String>) -> Self {
        let argument = argument.into().trim().to_string();
        let raw = if argument.is_empty() {
            name.keyword().to_string()
        } else {
            format!("{} {}", name.keyword(), argument)
        };
        Self {
            name,
            argument,
            raw,
        }
    }
}

/// Result of parsing one submitted line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// Blank line: just a new prompt
    Empty,
    /// The exit keyword
    Exit,
    Command(ParsedCommand),
}

/// Split off the first whitespace-delimited token.
/// Returns the token and the untrimmed remainder.
fn split_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    Some((&text[..end], &text[end..]))
}

pub fn parse(line: &str) -> Parsed {
    let line = line.trim();
    if line.is_empty() {
        return Parsed::Empty;
    }
    if line == EXIT_KEYWORD {
        return Parsed::Exit;
    }

    let Some((first, rest)) = split_token(line) else {
        return Parsed::Empty;
    };

    let first_lower = first.to_lowercase();
    if first_lower == "rm" {
        if let Some((second, after)) = split_token(rest) {
            if second.eq_ignore_ascii_case("-r") {
                return Parsed::Command(ParsedCommand {
                    name: CommandName::RemoveTree,
                    argument: after.trim().to_string(),
                    raw: line.to_string(),
                });
            }
        }
    }

    let name = match first_lower.as_str() {
        "ls" => CommandName::List,
        "pwd" => CommandName::Pwd,
        "cd" => CommandName::ChangeDir,
        "mkdir" => CommandName::MakeDir,
        "touch" => CommandName::Touch,
        "rm" => CommandName::RemoveFile,
        "clear" => CommandName::Clear,
        _ => CommandName::Unknown,
    };

    Parsed::Command(ParsedCommand {
        name,
        argument: rest.trim().to_string(),
        raw: line.to_string(),
    })
}
