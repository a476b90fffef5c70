//! Stream dispatch for one conversation turn.
//!
//! Consumes agent updates lazily, keeps the transcript and the tool
//! tracker current, and feeds discrete rendering events to a presenter.
//! The transcript is canonical: every message is recorded in arrival
//! order before anything is rendered from it.

use banter_core::{split_thinking, Message, ToolTracker, UpdateStream};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::interface::{Presenter, TurnEvent};

/// Everything one turn produced. `messages` is the canonical record;
/// the flat answer text is derived from it on demand.
#[derive(Debug, Default)]
pub struct TurnOutcome {
    pub messages: Vec<Message>,
}

impl TurnOutcome {
    /// The turn's displayable text: display segments of non-tool
    /// messages, in order, with think blocks removed.
    pub fn final_text(&self) -> String {
        let mut parts = Vec::new();
        for message in &self.messages {
            if message.tool_name().is_some() || message.content.is_empty() {
                continue;
            }
            let display = split_thinking(&message.content).display;
            if !display.is_empty() {
                parts.push(display);
            }
        }
        parts.join("\n\n")
    }
}

/// Drive one turn to completion.
///
/// Per message: record it in the transcript, then either complete its
/// tracker record and surface a tool result (tool messages), or split
/// the content into thinking and display segments (everything else);
/// tool call requests are registered with the tracker and surfaced last.
/// Stream errors and cancellation end the turn early with the partial
/// transcript kept. The usage summary event is emitted on every exit
/// path, even when nothing ran.
pub async fn consume_turn(
    mut updates: UpdateStream,
    tracker: &mut ToolTracker,
    presenter: &mut dyn Presenter,
    cancel: &CancellationToken,
) -> TurnOutcome {
    let mut outcome = TurnOutcome::default();

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("turn cancelled, keeping the partial transcript");
                break;
            }
            item = updates.next() => item,
        };

        let event = match item {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                let message = if e.is_retryable() {
                    format!("{} (transient, try again)", e)
                } else {
                    e.to_string()
                };
                presenter.present(TurnEvent::Error { message });
                break;
            }
            None => break,
        };

        let node = event.node;
        for message in event.messages {
            outcome.messages.push(message.clone());

            if let Some(tool) = message.tool_name() {
                let duration = tracker
                    .complete(tool, message.tool_call_id.as_deref(), &message.content)
                    .and_then(|record| record.duration);
                presenter.present(TurnEvent::ToolResult {
                    name: tool.to_string(),
                    result: message.content.clone(),
                    duration,
                });
            } else if !message.content.is_empty() {
                let split = split_thinking(&message.content);
                if let Some(reasoning) = split.reasoning {
                    presenter.present(TurnEvent::Thinking { text: reasoning });
                }
                if !split.display.is_empty() {
                    presenter.present(TurnEvent::Content {
                        node: node.clone(),
                        text: split.display,
                    });
                }
            }

            for call in &message.tool_calls {
                tracker.start(&call.name, &call.id, call.arguments.clone());
                presenter.present(TurnEvent::ToolCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
            }
        }
    }

    presenter.present(TurnEvent::Summary(tracker.summary()));
    outcome
}
