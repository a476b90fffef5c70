//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::Error;
use crate::message::{Message, ToolCall, Usage};
use crate::provider::{CompletionRequest, CompletionResponse, FinishReason, Provider};

/// A mock provider that returns pre-configured responses.
pub struct MockProvider {
    responses: Mutex<Vec<CompletionResponse>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<CompletionRequest>>,
    pub name: String,
    pub default_model: Option<String>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            captured_requests: Mutex::new(Vec::new()),
            name: "mock".to_string(),
            default_model: None,
        }
    }

    /// Queue a response to be returned by the next complete() call.
    /// Responses are returned in FIFO order (first queued = first returned).
    pub fn queue_response(&self, content: &str) {
        let response = CompletionResponse {
            message: Message::assistant(content),
            usage: Usage::new(0, 0),
            model: "mock-model".to_string(),
            finish_reason: FinishReason::Stop,
        };
        self.responses.lock().unwrap().insert(0, response);
    }

    /// Queue an assistant response that requests the given tool calls.
    pub fn queue_tool_calls(&self, tool_calls: Vec<ToolCall>) {
        let response = CompletionResponse {
            message: Message::assistant_with_tool_calls("", tool_calls),
            usage: Usage::new(0, 0),
            model: "mock-model".to_string(),
            finish_reason: FinishReason::ToolCalls,
        };
        self.responses.lock().unwrap().insert(0, response);
    }

    /// Queue a raw CompletionResponse.
    pub fn queue_raw_response(&self, response: CompletionResponse) {
        self.responses.lock().unwrap().insert(0, response);
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    /// Get the last captured request.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        self.captured_requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop() {
            Some(response) => Ok(response),
            None => Err(Error::Unknown("No mock response queued".to_string())),
        }
    }
}
