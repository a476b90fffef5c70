use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use banter_core::{ChatAgent, Message, Provider, ToolRegistry, ToolTracker};
use banter_tools::create_default_tools;

mod backend;
mod chat;
mod config;
mod dispatch;
mod interface;
mod transcript;

use backend::{create_provider, mask_api_key, resolve_backend, ResolvedBackend};
use chat::{run_chat, ChatOptions};
use config::Config;
use dispatch::consume_turn;
use interface::PlainPresenter;

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: all tracing including request payload details
    Trace,
    /// Verbose: requests/responses, tool execution details
    Debug,
    /// Standard: high-level flow
    Info,
    /// Quiet: only warnings and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "banter")]
#[command(author, version, about = "Chat with an LLM that can use tools", long_about = None)]
pub struct Cli {
    /// Prompt to answer once, without the interactive loop
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Backend to use (a [backends.<name>] entry from the config)
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Model to use (overrides the backend default)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Base URL for the API (overrides config)
    #[arg(long)]
    pub base_url: Option<String>,

    /// System prompt (overrides config)
    #[arg(short, long)]
    pub system: Option<String>,

    /// Temperature (0.0-2.0)
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format) instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Disable all tools
    #[arg(long)]
    pub no_tools: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Config,
    /// Initialize a starter config file in ~/.config/banter
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Resolve log level: --debug overrides --log-level
    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };
    let filter = EnvFilter::new(log_level.as_filter());

    if let Some(log_path) = &cli.log_file {
        // Log file specified: write JSON to file
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        // Logs go to stderr so chat output stays clean
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    // Handle setup before config is required
    if matches!(&cli.command, Some(Commands::Setup)) {
        return run_setup();
    }

    let config = Config::load()?;

    match &cli.command {
        Some(Commands::Config) => show_config(&config),
        Some(Commands::Setup) => unreachable!(),
        None => {
            let backend = resolve_backend(
                &config,
                cli.backend.as_deref(),
                cli.model.as_deref(),
                cli.base_url.as_deref(),
            )?;
            tracing::debug!(backend = %backend.name, model = %backend.model, "backend resolved");
            let provider = create_provider(&backend);

            let mut registry = ToolRegistry::new();
            if !cli.no_tools {
                for tool in create_default_tools(config.tools.enable_web) {
                    registry.register(tool);
                }
            }
            let tools = Arc::new(registry);

            let system_prompt = cli.system.clone().unwrap_or_else(|| config.system_prompt());

            if let Some(prompt) = &cli.prompt {
                run_once(provider, tools, prompt, &backend, system_prompt, &cli).await
            } else {
                let options = ChatOptions {
                    system_prompt,
                    model: backend.model.clone(),
                    temperature: cli.temperature,
                    max_tokens: cli.max_tokens,
                    display: config.display.clone(),
                    history_path: Config::config_dir().ok().map(|d| d.join("history")),
                };
                run_chat(provider, tools, options).await
            }
        }
    }
}

/// One non-interactive turn: same dispatcher as the chat loop, but only
/// the final text reaches stdout.
async fn run_once(
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    prompt: &str,
    backend: &ResolvedBackend,
    system_prompt: String,
    cli: &Cli,
) -> Result<()> {
    let mut agent = ChatAgent::new(provider, tools)
        .with_system_prompt(system_prompt)
        .with_model(&backend.model);
    if let Some(temperature) = cli.temperature {
        agent = agent.with_temperature(temperature);
    }
    if let Some(max_tokens) = cli.max_tokens {
        agent = agent.with_max_tokens(max_tokens);
    }

    let updates = agent.run(vec![Message::user(prompt)]);
    let mut tracker = ToolTracker::new();
    let mut presenter = PlainPresenter;
    let cancel = CancellationToken::new();
    let outcome = consume_turn(updates, &mut tracker, &mut presenter, &cancel).await;

    let text = outcome.final_text();
    if text.is_empty() {
        anyhow::bail!("no answer was produced");
    }
    println!("{}", text);
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("Configuration ({})", Config::config_path()?.display());
    println!("  Default backend: {}", config.default_backend);

    if !config.backends.is_empty() {
        println!("\nBackends:");
        let mut names: Vec<_> = config.backends.keys().collect();
        names.sort();
        for name in names {
            let entry = &config.backends[name];
            println!("  {}:", name);
            if let Some(kind) = &entry.kind {
                println!("    Kind: {}", kind);
            }
            if let Some(model) = &entry.default_model {
                println!("    Default model: {}", model);
            }
            if let Some(key) = &entry.api_key {
                println!("    API key: {}", mask_api_key(key));
            }
            if let Some(base_url) = &entry.base_url {
                println!("    Base URL: {}", base_url);
            }
        }
    }

    println!("\nDisplay:");
    println!("  Colors: {}", config.display.colors);
    println!("  Timestamps: {}", config.display.timestamps);
    println!("  Tool details: {}", config.display.tool_details);
    println!("  Tool summary: {}", config.display.tool_summary);

    println!("\nTools:");
    println!("  Web: {}", config.tools.enable_web);

    println!("\nSystem prompt: {}", config.system_prompt());
    Ok(())
}

const STARTER_CONFIG: &str = r#"# Banter configuration.
# Every setting can also be given as an environment variable with the
# BANTER_ prefix and __ between nested keys, e.g. BANTER_DISPLAY__COLORS=false.

default_backend = "openai"

# system_prompt = "You are a helpful assistant with access to tools."

[backends.openai]
# api_key = "sk-..."        # or set OPENAI_API_KEY
# default_model = "gpt-3.5-turbo"

[backends.ollama]
# base_url = "http://localhost:11434"
# default_model = "qwen3:8b"

[display]
# colors = true
# timestamps = true
# tool_details = true
# tool_summary = true
# max_args_len = 200
# max_result_len = 500

[tools]
# enable_web = true
"#;

fn run_setup() -> Result<()> {
    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = Config::config_path()?;
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    std::fs::write(&path, STARTER_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote starter config to {}", path.display());
    Ok(())
}
