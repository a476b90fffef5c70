//! Interactive chat loop.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local};
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::Editor;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use banter_core::{ChatAgent, Message, Provider, ToolRegistry, ToolTracker};

use crate::config::{expand_path, DisplayConfig};
use crate::dispatch::consume_turn;
use crate::interface::{
    parse_user_input, ChatCommand, ConsolePresenter, Presenter, TurnEvent, UserInput,
};
use crate::transcript::write_transcript;

const HELP_TEXT: &str = "\
Commands:
  /help            Show this help
  /clear           Clear conversation history
  /history         Show recent messages
  /tools           List available tools
  /system [prompt] Show or set the system prompt
  /save [path]     Write the transcript to a file
  /quit            Exit (also: quit, exit, Ctrl-D)
Ctrl-C cancels a running turn.";

/// Words in a request that usually mean a tool should have run.
const TOOL_HINT_KEYWORDS: &[&str] = &["weather", "calculate", "math"];

/// Settings for one interactive session, resolved by the caller.
pub struct ChatOptions {
    pub system_prompt: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub display: DisplayConfig,
    pub history_path: Option<PathBuf>,
}

/// Conversation state for one session: the transcript and when it began.
pub struct ChatSession {
    messages: Vec<Message>,
    started_at: DateTime<Local>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            started_at: Local::now(),
        }
    }

    pub fn push_user(&mut self, text: &str) {
        self.messages.push(Message::user(text));
    }

    pub fn extend(&mut self, messages: Vec<Message>) {
        self.messages.extend(messages);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run_chat(
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    options: ChatOptions,
) -> Result<()> {
    let mut presenter = ConsolePresenter::new(options.display.clone());
    let mut tracker = ToolTracker::new();
    let mut session = ChatSession::new();
    let mut system_prompt = options.system_prompt.clone();

    let rl_config = rustyline::Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)?
        .build();
    let mut editor: Editor<(), FileHistory> = Editor::with_config(rl_config)?;
    if let Some(path) = &options.history_path {
        let _ = editor.load_history(path);
    }

    presenter.notice(&format!(
        "Chatting with {} ({}). /help for commands.",
        provider.name(),
        options.model
    ));

    loop {
        let line = match editor.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => return Err(anyhow::anyhow!("Error reading input: {}", e)),
        };
        let _ = editor.add_history_entry(&line);

        match parse_user_input(&line) {
            UserInput::Empty => continue,
            UserInput::Command(ChatCommand::Quit) => {
                println!("Goodbye!");
                break;
            }
            UserInput::Command(ChatCommand::Help) => {
                presenter.notice(HELP_TEXT);
            }
            UserInput::Command(ChatCommand::ClearHistory) => {
                session.clear();
                tracker.clear();
                presenter.notice("Conversation cleared.");
            }
            UserInput::Command(ChatCommand::History) => {
                if session.messages().is_empty() {
                    presenter.notice("No messages yet.");
                } else {
                    let count = options.display.history_display;
                    let start = session.messages().len().saturating_sub(count);
                    for message in &session.messages()[start..] {
                        presenter.notice(&history_line(message));
                    }
                }
            }
            UserInput::Command(ChatCommand::ListTools) => {
                if tools.is_empty() {
                    presenter.notice("No tools registered.");
                } else {
                    let mut definitions = tools.definitions();
                    definitions.sort_by(|a, b| a.name.cmp(&b.name));
                    for def in definitions {
                        presenter.notice(&format!("{}: {}", def.name, def.description));
                    }
                }
            }
            UserInput::Command(ChatCommand::System(None)) => {
                presenter.notice(&format!("System prompt: {}", system_prompt));
            }
            UserInput::Command(ChatCommand::System(Some(prompt))) => {
                system_prompt = prompt;
                presenter.notice("System prompt updated.");
            }
            UserInput::Command(ChatCommand::Save(path)) => {
                let path = match path {
                    Some(p) => expand_path(&p),
                    None => PathBuf::from(default_transcript_name(Local::now())),
                };
                match write_transcript(&path, session.messages(), session.started_at()) {
                    Ok(()) => {
                        presenter.notice(&format!("Saved transcript to {}", path.display()))
                    }
                    Err(e) => presenter.present(TurnEvent::Error {
                        message: e.to_string(),
                    }),
                }
            }
            UserInput::Message(text) => {
                session.push_user(&text);
                tracker.clear();
                debug!(chars = text.len(), "sending user message");

                let agent = build_agent(&provider, &tools, &options, &system_prompt);
                let updates = agent.run(session.messages().to_vec());

                let cancel = CancellationToken::new();
                let watcher = tokio::spawn({
                    let cancel = cancel.clone();
                    async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            cancel.cancel();
                        }
                    }
                });

                presenter.present(TurnEvent::Status("thinking...".to_string()));
                let outcome = consume_turn(updates, &mut tracker, &mut presenter, &cancel).await;
                watcher.abort();

                if cancel.is_cancelled() {
                    presenter.notice("Cancelled.");
                }
                if wants_tool_hint(&text, tracker.completed().len(), &outcome.final_text()) {
                    presenter.hint("No tools were used for this answer.");
                }

                session.extend(outcome.messages);
            }
        }
    }

    if let Some(path) = &options.history_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.save_history(path);
    }
    Ok(())
}

/// The agent is rebuilt per turn so a `/system` change applies immediately.
fn build_agent(
    provider: &Arc<dyn Provider>,
    tools: &Arc<ToolRegistry>,
    options: &ChatOptions,
    system_prompt: &str,
) -> ChatAgent {
    let mut agent = ChatAgent::new(Arc::clone(provider), Arc::clone(tools))
        .with_system_prompt(system_prompt)
        .with_model(&options.model);
    if let Some(temperature) = options.temperature {
        agent = agent.with_temperature(temperature);
    }
    if let Some(max_tokens) = options.max_tokens {
        agent = agent.with_max_tokens(max_tokens);
    }
    agent
}

/// One `/history` line: a role or tool label and a first-line preview.
fn history_line(message: &Message) -> String {
    let label = match message.tool_name() {
        Some(tool) => format!("tool: {}", tool),
        None => message.role.to_string(),
    };
    format!("[{}] {}", label, first_line_preview(&message.content, 80))
}

fn first_line_preview(content: &str, max_chars: usize) -> String {
    let first_line = content.lines().next().unwrap_or("");
    let mut preview: String = first_line.chars().take(max_chars).collect();
    if first_line.chars().count() > max_chars || content.lines().count() > 1 {
        preview.push_str("...");
    }
    preview
}

fn default_transcript_name(now: DateTime<Local>) -> String {
    format!("banter-{}.txt", now.format("%Y%m%d-%H%M%S"))
}

/// After a turn that produced an answer without running any tool, nudge
/// when the request mentioned an obviously tool-shaped topic.
fn wants_tool_hint(user_text: &str, tools_ran: usize, final_text: &str) -> bool {
    if tools_ran > 0 || final_text.is_empty() {
        return false;
    }
    let lower = user_text.to_lowercase();
    TOOL_HINT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_tracks_messages() {
        let mut session = ChatSession::new();
        session.push_user("hello");
        session.extend(vec![Message::assistant("hi")]);
        assert_eq!(session.messages().len(), 2);

        session.clear();
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_history_line_labels() {
        assert_eq!(history_line(&Message::user("hello")), "[user] hello");
        assert_eq!(
            history_line(&Message::tool_result("call_0", "sunny").with_name("get_weather")),
            "[tool: get_weather] sunny"
        );
    }

    #[test]
    fn test_first_line_preview() {
        assert_eq!(first_line_preview("short", 80), "short");
        assert_eq!(first_line_preview("line one\nline two", 80), "line one...");
        assert_eq!(first_line_preview("abcdefgh", 4), "abcd...");
    }

    #[test]
    fn test_default_transcript_name() {
        let now = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(default_transcript_name(now), "banter-20250314-092653.txt");
    }

    #[test]
    fn test_tool_hint_keywords() {
        assert!(wants_tool_hint("what's the weather in sf?", 0, "Sunny!"));
        assert!(wants_tool_hint("calculate 2+2", 0, "4"));
        assert!(!wants_tool_hint("tell me a joke", 0, "Knock knock."));
        // A tool ran, or the turn produced nothing: no hint.
        assert!(!wants_tool_hint("what's the weather in sf?", 1, "Sunny!"));
        assert!(!wants_tool_hint("what's the weather in sf?", 0, ""));
    }
}
