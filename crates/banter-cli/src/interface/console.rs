//! Console presenter: colored terminal output for chat turns.

use std::io::Write;
use std::time::Duration;

use chrono::Local;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::ExecutableCommand;
use serde_json::Value;

use banter_core::ToolUsageSummary;

use crate::config::DisplayConfig;

use super::{Presenter, TurnEvent};

const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

mod theme {
    use crossterm::style::Color;

    pub const PRIMARY: Color = Color::Blue;
    pub const SECONDARY: Color = Color::Cyan;
    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;
    pub const INFO: Color = Color::Magenta;
    pub const MUTED: Color = Color::DarkGrey;
}

/// Renders turn events to stdout with crossterm styling.
pub struct ConsolePresenter {
    display: DisplayConfig,

    /// Colors require both the config flag and a tty.
    use_colors: bool,

    /// Current spinner frame for the transient status line.
    spinner_frame: usize,

    /// Whether a transient status line is on screen.
    status_active: bool,
}

impl ConsolePresenter {
    pub fn new(display: DisplayConfig) -> Self {
        let use_colors = display.colors && atty::is(atty::Stream::Stdout);
        Self {
            display,
            use_colors,
            spinner_frame: 0,
            status_active: false,
        }
    }

    /// Persistent feedback line outside of turn rendering (command
    /// results, session notices).
    pub fn notice(&mut self, msg: &str) {
        let _ = self.clear_status();
        let _ = self.print_colored_line(theme::SECONDARY, msg);
    }

    /// Low-key hint, e.g. that a likely tool went unused.
    pub fn hint(&mut self, msg: &str) {
        let _ = self.clear_status();
        let _ = self.print_colored_line(theme::MUTED, &format!("⚠️  {}", msg));
    }

    fn set_color(&self, stdout: &mut std::io::Stdout, color: Color) -> std::io::Result<()> {
        if self.use_colors {
            stdout.execute(SetForegroundColor(color))?;
        }
        Ok(())
    }

    fn reset_color(&self, stdout: &mut std::io::Stdout) -> std::io::Result<()> {
        if self.use_colors {
            stdout.execute(ResetColor)?;
        }
        Ok(())
    }

    /// Muted `[HH:MM:SS]` prefix when timestamps are enabled. Leaves the
    /// foreground color set to muted.
    fn print_timestamp(&self, stdout: &mut std::io::Stdout) -> std::io::Result<()> {
        if self.display.timestamps {
            self.set_color(stdout, theme::MUTED)?;
            print!("[{}] ", Local::now().format("%H:%M:%S"));
        }
        Ok(())
    }

    fn print_colored_line(&self, color: Color, msg: &str) -> std::io::Result<()> {
        let mut stdout = std::io::stdout();
        self.set_color(&mut stdout, color)?;
        println!("{}", msg);
        self.reset_color(&mut stdout)?;
        stdout.flush()?;
        Ok(())
    }

    fn clear_status(&mut self) -> std::io::Result<()> {
        if !self.status_active {
            return Ok(());
        }
        let mut stdout = std::io::stdout();
        print!("\r");
        stdout.execute(Clear(ClearType::CurrentLine))?;
        stdout.flush()?;
        self.status_active = false;
        Ok(())
    }

    fn print_status(&mut self, msg: &str) -> std::io::Result<()> {
        if !self.display.progress {
            return Ok(());
        }
        let frame = SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()];
        self.spinner_frame = self.spinner_frame.wrapping_add(1);

        let mut stdout = std::io::stdout();
        print!("\r");
        stdout.execute(Clear(ClearType::CurrentLine))?;
        self.set_color(&mut stdout, theme::MUTED)?;
        print!("{} {}", frame, msg);
        self.reset_color(&mut stdout)?;
        stdout.flush()?;
        self.status_active = true;
        Ok(())
    }

    fn print_thinking(&mut self, text: &str) -> std::io::Result<()> {
        let mut stdout = std::io::stdout();
        self.print_timestamp(&mut stdout)?;
        self.set_color(&mut stdout, theme::INFO)?;
        print!("🤔 thinking: ");
        self.set_color(&mut stdout, theme::MUTED)?;
        println!("{}", text);
        self.reset_color(&mut stdout)?;
        stdout.flush()?;
        Ok(())
    }

    fn print_content(&mut self, node: &str, text: &str) -> std::io::Result<()> {
        let mut stdout = std::io::stdout();
        self.print_timestamp(&mut stdout)?;
        self.set_color(&mut stdout, theme::PRIMARY)?;
        println!("💬 [{}]", node);
        self.reset_color(&mut stdout)?;
        println!("{}", text);
        stdout.flush()?;
        Ok(())
    }

    fn print_tool_call(&mut self, name: &str, arguments: &Value) -> std::io::Result<()> {
        let mut stdout = std::io::stdout();
        self.print_timestamp(&mut stdout)?;
        self.set_color(&mut stdout, theme::WARNING)?;
        print!("🔧 running tool: ");
        self.set_color(&mut stdout, theme::SECONDARY)?;
        println!("{}", name);
        if self.display.tool_details {
            self.set_color(&mut stdout, theme::MUTED)?;
            println!(
                "{}",
                truncate(&format_args(arguments), self.display.max_args_len)
            );
        }
        self.reset_color(&mut stdout)?;
        stdout.flush()?;
        Ok(())
    }

    fn print_tool_result(
        &mut self,
        name: &str,
        result: &str,
        duration: Option<Duration>,
    ) -> std::io::Result<()> {
        let mut stdout = std::io::stdout();
        self.print_timestamp(&mut stdout)?;
        self.set_color(&mut stdout, theme::SUCCESS)?;
        print!("✅ tool finished: ");
        self.set_color(&mut stdout, theme::SECONDARY)?;
        print!("{}", name);
        self.set_color(&mut stdout, theme::MUTED)?;
        println!("{}", format_duration(duration));
        if self.display.tool_details {
            println!(
                "{}",
                truncate(&format_result(result), self.display.max_result_len)
            );
        }
        self.reset_color(&mut stdout)?;
        stdout.flush()?;
        Ok(())
    }

    fn print_summary(&mut self, report: &ToolUsageSummary) -> std::io::Result<()> {
        if !self.display.tool_summary {
            return Ok(());
        }
        let Some(text) = format_summary(report) else {
            return Ok(());
        };
        self.print_colored_line(theme::SECONDARY, &text)
    }

    fn print_error(&mut self, message: &str) -> std::io::Result<()> {
        self.print_colored_line(theme::ERROR, &format!("❌ {}", message))
    }
}

impl Presenter for ConsolePresenter {
    fn present(&mut self, event: TurnEvent) {
        // The transient status line makes way for any real output.
        if !matches!(event, TurnEvent::Status(_)) {
            let _ = self.clear_status();
        }
        let _ = match event {
            TurnEvent::Thinking { text } => self.print_thinking(&text),
            TurnEvent::Content { node, text } => self.print_content(&node, &text),
            TurnEvent::ToolCall { name, arguments } => self.print_tool_call(&name, &arguments),
            TurnEvent::ToolResult {
                name,
                result,
                duration,
            } => self.print_tool_result(&name, &result, duration),
            TurnEvent::Summary(report) => self.print_summary(&report),
            TurnEvent::Error { message } => self.print_error(&message),
            TurnEvent::Status(msg) => self.print_status(&msg),
        };
    }
}

/// Cap rendered text at `max_chars` characters, marking the cut.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}

fn format_args(arguments: &Value) -> String {
    serde_json::to_string_pretty(arguments).unwrap_or_else(|_| arguments.to_string())
}

/// Tool results that happen to be valid JSON are pretty-printed;
/// anything else is shown as-is.
fn format_result(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

fn format_duration(duration: Option<Duration>) -> String {
    match duration {
        Some(d) => format!(" ({:.2}s)", d.as_secs_f64()),
        None => String::new(),
    }
}

/// Render the per-turn usage block, or None when no tool ran.
fn format_summary(report: &ToolUsageSummary) -> Option<String> {
    if report.count == 0 {
        return None;
    }
    let mut out = format!(
        "📊 tool calls: {} ({:.2}s total, {:.2}s avg)",
        report.count,
        report.total.as_secs_f64(),
        report.average.as_secs_f64()
    );
    for (name, stats) in &report.per_tool {
        out.push_str(&format!(
            "\n   {}: {} calls, avg {:.2}s",
            name,
            stats.count,
            stats.average.as_secs_f64()
        ));
    }
    Some(out)
}
