//! Plain-text transcript export.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use banter_core::Message;

/// Write the conversation to a readable text file: a header with the
/// session start time, then one block per message labeled by role, or
/// by tool name for tool results. Overwrites the target.
pub fn write_transcript(
    path: &Path,
    messages: &[Message],
    started_at: DateTime<Local>,
) -> Result<()> {
    let mut out = String::new();
    out.push_str(&format!(
        "Conversation started {}\n\n",
        started_at.format("%Y-%m-%d %H:%M:%S")
    ));

    for message in messages {
        let label = match message.tool_name() {
            Some(tool) => format!("tool: {}", tool),
            None => message.role.to_string(),
        };
        out.push_str(&format!("[{}]\n{}\n\n", label, message.content));
    }

    fs::write(path, out)
        .with_context(|| format!("Failed to write transcript to {}", path.display()))
}
