//! Chat-session commands recognised by the interactive front end
//!
//! Anything that is not a command is a question for the pipeline.

use strum::{EnumIter, IntoEnumIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Command {
    HideQuery,
    ShowQuery,
    ClearHistory,
    ShowSchema,
    Help,
    Quit,
}

/// One line of user input, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    Question(String),
    Empty,
}

impl Command {
    /// Spellings accepted for this command, compared case-insensitively
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Command::HideQuery => &["hide query"],
            Command::ShowQuery => &["show query"],
            Command::ClearHistory => &["clear history"],
            Command::ShowSchema => &["show schema"],
            Command::Help => &["help"],
            Command::Quit => &["quit", "exit", "q"],
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::HideQuery => "Stop showing generated SQL in responses",
            Command::ShowQuery => "Show generated SQL in responses",
            Command::ClearHistory => "Forget the conversation so far",
            Command::ShowSchema => "Print the database schema",
            Command::Help => "Show this help",
            Command::Quit => "Leave the chat",
        }
    }

    /// Confirmation printed after a display or history command
    pub fn acknowledgement(&self) -> Option<&'static str> {
        match self {
            Command::HideQuery => Some("Okay, SQL queries will now be hidden in my responses."),
            Command::ShowQuery => {
                Some("Got it. I'll include the SQL queries in my responses from now on.")
            }
            Command::ClearHistory => {
                Some("Conversation history cleared. We can start a fresh conversation.")
            }
            Command::ShowSchema => Some("Here is the database schema I'm working with:"),
            Command::Quit => Some("Goodbye! It was a pleasure helping you."),
            Command::Help => None,
        }
    }
}

pub struct CommandParser;

impl CommandParser {
    pub fn parse(line: &str) -> Input {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Input::Empty;
        }

        // Collapse inner runs of whitespace so "hide   query" still matches
        let normalized = trimmed
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        Command::iter()
            .find(|command| command.aliases().contains(&normalized.as_str()))
            .map(Input::Command)
            .unwrap_or_else(|| Input::Question(trimmed.to_string()))
    }
}

pub fn generate_help_text() -> String {
    let mut help = String::new();
    help.push_str("Ask any question about your data in plain English, or use one of:\n\n");

    for command in Command::iter() {
        help.push_str(&format!(
            "  {:<14} - {}\n",
            command.aliases().join(" / "),
            command.description()
        ));
    }

    help
}
