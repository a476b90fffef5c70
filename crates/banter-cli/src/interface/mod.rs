//! Interface abstraction for rendering a chat turn.
//!
//! The stream dispatcher translates agent updates into `TurnEvent`s; a
//! `Presenter` turns those into terminal output. Keeping the two apart
//! lets the dispatcher be tested with a recording presenter.

mod console;
mod plain;

pub use console::ConsolePresenter;
pub use plain::PlainPresenter;

use std::time::Duration;

use banter_core::ToolUsageSummary;
use serde_json::Value;

/// Rendering events for one conversation turn.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// Reasoning extracted from a think block.
    Thinking { text: String },

    /// Displayable assistant text, tagged with the node that produced it.
    Content { node: String, text: String },

    /// A tool invocation has started.
    ToolCall { name: String, arguments: Value },

    /// A tool invocation has finished.
    ToolResult {
        name: String,
        result: String,
        duration: Option<Duration>,
    },

    /// Per-turn tool usage report.
    Summary(ToolUsageSummary),

    /// An error occurred during the turn.
    Error { message: String },

    /// Transient status line, replaced by the next event.
    Status(String),
}

/// Renders turn events for the user.
pub trait Presenter {
    fn present(&mut self, event: TurnEvent);
}

/// Commands the user can issue at the prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Quit the application.
    Quit,

    /// Clear conversation history.
    ClearHistory,

    /// Show recent conversation history.
    History,

    /// Show help.
    Help,

    /// List available tools.
    ListTools,

    /// Set or show the system prompt.
    System(Option<String>),

    /// Save the transcript, optionally to a given path.
    Save(Option<String>),
}

/// Input from the user via the prompt.
#[derive(Debug, Clone)]
pub enum UserInput {
    /// A regular message to send to the agent.
    Message(String),

    /// A command from the user.
    Command(ChatCommand),

    /// No input (e.g., empty line).
    Empty,
}

/// Parse a command from user input.
///
/// Returns Some(ChatCommand) if the input is a command, or None if it's
/// a regular message.
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();

    if !trimmed.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = trimmed.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let arg = parts.get(1).map(|s| s.trim().to_string()).unwrap_or_default();

    match cmd.as_str() {
        "/quit" | "/exit" | "/q" => Some(ChatCommand::Quit),
        "/clear" | "/c" => Some(ChatCommand::ClearHistory),
        "/history" | "/h" => Some(ChatCommand::History),
        "/help" | "/?" => Some(ChatCommand::Help),
        "/tools" | "/t" => Some(ChatCommand::ListTools),
        "/system" | "/sys" => {
            if arg.is_empty() {
                Some(ChatCommand::System(None))
            } else {
                Some(ChatCommand::System(Some(arg)))
            }
        }
        "/save" => {
            if arg.is_empty() {
                Some(ChatCommand::Save(None))
            } else {
                Some(ChatCommand::Save(Some(arg)))
            }
        }
        _ => None,
    }
}

/// Parse user input into a UserInput enum. The bare words "quit" and
/// "exit" also quit.
pub fn parse_user_input(input: &str) -> UserInput {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return UserInput::Empty;
    }

    if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
        return UserInput::Command(ChatCommand::Quit);
    }

    if let Some(cmd) = parse_command(trimmed) {
        UserInput::Command(cmd)
    } else {
        UserInput::Message(trimmed.to_string())
    }
}
