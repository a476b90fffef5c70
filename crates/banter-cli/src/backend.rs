//! Backend selection. Merges CLI flags, the config file, and environment
//! variables into one resolved backend, then builds the provider for it.

use std::sync::Arc;

use anyhow::{bail, Result};
use banter_core::Provider;
use banter_providers::{OllamaProvider, OpenAIProvider};

use crate::config::{BackendEntry, Config};

const OPENAI_DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const OLLAMA_DEFAULT_MODEL: &str = "qwen3:8b";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenAi,
    Ollama,
}

/// A backend with every setting decided. Precedence for each field is
/// CLI flag, then config file, then environment, then the kind's default.
#[derive(Debug, Clone)]
pub struct ResolvedBackend {
    pub name: String,
    pub kind: BackendKind,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Decide the kind for a named backend. An explicit `kind` in the config
/// wins; otherwise the name "ollama" selects the ollama wire format and
/// everything else is treated as OpenAI-compatible.
fn resolve_kind(name: &str, entry: &BackendEntry) -> Result<BackendKind> {
    match entry.kind.as_deref() {
        Some("openai") => Ok(BackendKind::OpenAi),
        Some("ollama") => Ok(BackendKind::Ollama),
        Some(other) => bail!("Unsupported backend type: {}", other),
        None if name == "ollama" => Ok(BackendKind::Ollama),
        None => Ok(BackendKind::OpenAi),
    }
}

pub fn resolve_backend(
    config: &Config,
    backend: Option<&str>,
    model: Option<&str>,
    base_url: Option<&str>,
) -> Result<ResolvedBackend> {
    let name = backend.unwrap_or(&config.default_backend).to_string();
    let entry = config.backends.get(&name).cloned().unwrap_or_default();

    let kind = resolve_kind(&name, &entry)?;

    let model = model
        .map(String::from)
        .or_else(|| entry.default_model.clone())
        .unwrap_or_else(|| {
            match kind {
                BackendKind::OpenAi => OPENAI_DEFAULT_MODEL,
                BackendKind::Ollama => OLLAMA_DEFAULT_MODEL,
            }
            .to_string()
        });

    let resolved_base_url = base_url.map(String::from).or_else(|| entry.base_url.clone());

    let api_key = match kind {
        BackendKind::Ollama => None,
        // A CLI --base-url points at a local OpenAI-compatible server,
        // which usually accepts any key.
        BackendKind::OpenAi if base_url.is_some() => Some("none".to_string()),
        BackendKind::OpenAi => {
            let key = entry
                .api_key
                .clone()
                .or_else(|| std::env::var(format!("{}_API_KEY", name.to_uppercase())).ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
            match key {
                Some(key) => Some(key),
                None => bail!(
                    "API key not found for backend '{}'. Set api_key under [backends.{}] \
                     in the config file, or export {}_API_KEY.",
                    name,
                    name,
                    name.to_uppercase()
                ),
            }
        }
    };

    Ok(ResolvedBackend {
        name,
        kind,
        model,
        base_url: resolved_base_url,
        api_key,
    })
}

pub fn create_provider(backend: &ResolvedBackend) -> Arc<dyn Provider> {
    match backend.kind {
        BackendKind::OpenAi => {
            let api_key = backend.api_key.clone().unwrap_or_default();
            let mut provider =
                OpenAIProvider::new(api_key).with_default_model(&backend.model);
            if let Some(url) = &backend.base_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        BackendKind::Ollama => {
            let mut provider = OllamaProvider::new().with_default_model(&backend.model);
            if let Some(url) = &backend.base_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
    }
}

/// Shorten an API key for display: first 8 characters, then an ellipsis.
pub fn mask_api_key(key: &str) -> String {
    if key.chars().count() > 8 {
        let head: String = key.chars().take(8).collect();
        format!("{}...", head)
    } else {
        "...".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(name: &str, entry: BackendEntry) -> Config {
        let mut config = Config::default();
        config.backends.insert(name.to_string(), entry);
        config
    }

    #[test]
    fn test_kind_inferred_from_name() {
        let entry = BackendEntry::default();
        assert_eq!(resolve_kind("ollama", &entry).unwrap(), BackendKind::Ollama);
        assert_eq!(resolve_kind("openai", &entry).unwrap(), BackendKind::OpenAi);
        assert_eq!(resolve_kind("work", &entry).unwrap(), BackendKind::OpenAi);
    }

    #[test]
    fn test_explicit_kind_wins_over_name() {
        let entry = BackendEntry {
            kind: Some("ollama".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_kind("local", &entry).unwrap(), BackendKind::Ollama);
    }

    #[test]
    fn test_unsupported_kind_is_an_error() {
        let entry = BackendEntry {
            kind: Some("bedrock".to_string()),
            ..Default::default()
        };
        let err = resolve_kind("work", &entry).unwrap_err();
        assert!(err.to_string().contains("Unsupported backend type: bedrock"));
    }

    #[test]
    fn test_cli_model_beats_config_model() {
        let config = config_with(
            "ollama",
            BackendEntry {
                default_model: Some("llama3".to_string()),
                ..Default::default()
            },
        );
        let resolved = resolve_backend(&config, Some("ollama"), Some("mistral"), None).unwrap();
        assert_eq!(resolved.model, "mistral");

        let resolved = resolve_backend(&config, Some("ollama"), None, None).unwrap();
        assert_eq!(resolved.model, "llama3");
    }

    #[test]
    fn test_kind_default_model() {
        let config = config_with("ollama", BackendEntry::default());
        let resolved = resolve_backend(&config, Some("ollama"), None, None).unwrap();
        assert_eq!(resolved.model, OLLAMA_DEFAULT_MODEL);
        assert!(resolved.api_key.is_none());
    }

    #[test]
    fn test_base_url_override_skips_key_lookup() {
        // No api_key anywhere, but --base-url makes that fine.
        let config = Config::default();
        let resolved =
            resolve_backend(&config, None, None, Some("http://localhost:8080/v1")).unwrap();
        assert_eq!(resolved.kind, BackendKind::OpenAi);
        assert_eq!(resolved.api_key.as_deref(), Some("none"));
        assert_eq!(
            resolved.base_url.as_deref(),
            Some("http://localhost:8080/v1")
        );
    }

    #[test]
    fn test_config_api_key_is_used() {
        let config = config_with(
            "openai",
            BackendEntry {
                api_key: Some("sk-test-key-12345".to_string()),
                ..Default::default()
            },
        );
        let resolved = resolve_backend(&config, None, None, None).unwrap();
        assert_eq!(resolved.api_key.as_deref(), Some("sk-test-key-12345"));
        assert_eq!(resolved.model, OPENAI_DEFAULT_MODEL);
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("sk-proj-abcdef123456"), "sk-proj-...");
        assert_eq!(mask_api_key("short"), "...");
    }
}
