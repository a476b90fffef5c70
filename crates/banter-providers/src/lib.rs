//! banter-providers: LLM backend implementations for banter
//!
//! This crate provides implementations of the Provider trait for the
//! supported chat backends.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
