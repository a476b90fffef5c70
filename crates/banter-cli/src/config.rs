use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// System prompt used when the config does not set one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend to use when --backend is not given.
    #[serde(default = "default_backend")]
    pub default_backend: String,

    #[serde(default)]
    pub backends: HashMap<String, BackendEntry>,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    /// System prompt for the agent.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_backend: default_backend(),
            backends: HashMap::new(),
            display: DisplayConfig::default(),
            tools: ToolsConfig::default(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendEntry {
    /// Backend kind ("openai" or "ollama"); inferred from the backend
    /// name when omitted.
    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub default_model: Option<String>,
}

/// Terminal rendering knobs. Handed to the presenter once, at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Colored output (additionally requires stdout to be a tty).
    #[serde(default = "default_true")]
    pub colors: bool,

    /// Prefix lines with the wall-clock time.
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Print tool arguments and results as they happen.
    #[serde(default = "default_true")]
    pub tool_details: bool,

    /// Print the per-turn tool usage summary.
    #[serde(default = "default_true")]
    pub tool_summary: bool,

    /// Show a spinner while waiting for the model.
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Longest tool-argument rendering before truncation.
    #[serde(default = "default_max_args_len")]
    pub max_args_len: usize,

    /// Longest tool-result rendering before truncation.
    #[serde(default = "default_max_result_len")]
    pub max_result_len: usize,

    /// How many messages /history shows.
    #[serde(default = "default_history_display")]
    pub history_display: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colors: true,
            timestamps: true,
            tool_details: true,
            tool_summary: true,
            progress: true,
            max_args_len: default_max_args_len(),
            max_result_len: default_max_result_len(),
            history_display: default_history_display(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Enable tools that reach the network.
    #[serde(default = "default_true")]
    pub enable_web: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self { enable_web: true }
    }
}

fn default_backend() -> String {
    "openai".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_args_len() -> usize {
    200
}

fn default_max_result_len() -> usize {
    500
}

fn default_history_display() -> usize {
    10
}

impl Config {
    /// Load configuration from the config file merged with `BANTER_*`
    /// environment overrides (`__` separates nested keys, e.g.
    /// `BANTER_DISPLAY__COLORS=false`). A missing file is not an error:
    /// defaults plus the environment apply.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    fn load_from(path: &std::path::Path) -> Result<Self> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("BANTER_").split("__"))
            .extract()
            .context("Failed to load configuration")
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("banter"))
    }

    pub fn system_prompt(&self) -> String {
        self.system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }
}

/// Expand environment variables in a path string
/// Supports: $VAR, ${VAR}, ~
pub fn expand_path(path: &str) -> PathBuf {
    let mut result = path.to_string();

    // Expand ~ at the start
    if result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    } else if result == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    // Expand $VAR and ${VAR}
    let re = regex::Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").unwrap();
    let expanded = re.replace_all(&result, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    PathBuf::from(expanded.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            default_backend = "local"

            [backends.openai]
            api_key = "sk-test"
            default_model = "gpt-4o"

            [backends.local]
            kind = "ollama"
            base_url = "http://localhost:11434"

            [display]
            timestamps = false
            max_result_len = 100
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.default_backend, "local");
        assert!(config.backends.contains_key("openai"));
        assert_eq!(config.backends["local"].kind.as_deref(), Some("ollama"));
        assert!(!config.display.timestamps);
        assert_eq!(config.display.max_result_len, 100);
        // Untouched keys keep their defaults
        assert!(config.display.colors);
        assert_eq!(config.display.max_args_len, 200);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.default_backend, "openai");
        assert!(config.backends.is_empty());
        assert!(config.tools.enable_web);
        assert_eq!(config.display.history_display, 10);
        assert_eq!(config.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                    default_backend = "openai"

                    [display]
                    colors = true
                "#,
            )?;
            jail.set_env("BANTER_DEFAULT_BACKEND", "local");
            jail.set_env("BANTER_DISPLAY__COLORS", "false");

            let config = Config::load_from(std::path::Path::new("config.toml")).unwrap();
            assert_eq!(config.default_backend, "local");
            assert!(!config.display.colors);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load_from(std::path::Path::new("nope.toml")).unwrap();
            assert_eq!(config.default_backend, "openai");
            Ok(())
        });
    }

    #[test]
    fn test_expand_path() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BANTER_TEST_DIR", "/tmp/banter");
            assert_eq!(
                expand_path("$BANTER_TEST_DIR/out.txt"),
                PathBuf::from("/tmp/banter/out.txt")
            );
            assert_eq!(
                expand_path("${BANTER_TEST_DIR}/out.txt"),
                PathBuf::from("/tmp/banter/out.txt")
            );
            // Unknown variables are left alone
            assert_eq!(
                expand_path("$BANTER_NO_SUCH_VAR/x"),
                PathBuf::from("$BANTER_NO_SUCH_VAR/x")
            );
            Ok(())
        });

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/notes.txt"), home.join("notes.txt"));
        }
    }
}
