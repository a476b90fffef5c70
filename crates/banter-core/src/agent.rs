//! The reactive chat agent loop.
//!
//! `ChatAgent` alternates between completing against the configured provider
//! and executing whatever tool calls the model asked for, emitting one
//! `UpdateEvent` per step over a lazy stream. Consumers pull events one at a
//! time; dropping the stream cancels the loop.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::error::Error;
use crate::message::{Message, ToolCall};
use crate::provider::{CompletionRequest, Provider};
use crate::tool::ToolRegistry;

/// Node id for events produced by the model step.
pub const AGENT_NODE: &str = "agent";
/// Node id for events produced by the tool execution step.
pub const TOOLS_NODE: &str = "tools";

/// One incremental notification from the agent loop: which node produced
/// output, and the new messages it appended.
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    pub node: String,
    pub messages: Vec<Message>,
}

pub type UpdateStream = Pin<Box<dyn Stream<Item = Result<UpdateEvent, Error>> + Send>>;

/// An LLM-backed agent that answers with tools.
pub struct ChatAgent {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    system_prompt: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_iterations: usize,
}

impl ChatAgent {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            system_prompt: None,
            model: None,
            temperature: None,
            max_tokens: None,
            max_iterations: 20,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Runs one turn over the given history.
    ///
    /// The returned stream yields an `UpdateEvent` per loop step: the model's
    /// message under the `agent` node, then (when the model asked for tools)
    /// the batch of tool results under the `tools` node, until the model
    /// answers without tool calls. A provider failure is sent as the final
    /// `Err` item. The stream is finite and cannot be restarted.
    pub fn run(&self, history: Vec<Message>) -> UpdateStream {
        let provider = Arc::clone(&self.provider);
        let tools = Arc::clone(&self.tools);
        let system_prompt = self.system_prompt.clone();
        let model = self.model.clone();
        let temperature = self.temperature;
        let max_tokens = self.max_tokens;
        let max_iterations = self.max_iterations;

        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut messages = Vec::new();
            if let Some(system) = &system_prompt {
                messages.push(Message::system(system.as_str()));
            }
            messages.extend(history);

            for iteration in 0..max_iterations {
                debug!(iteration, message_count = messages.len(), "agent iteration starting");

                let mut request =
                    CompletionRequest::new(messages.clone()).with_tools(tools.definitions());
                if let Some(model) = &model {
                    request = request.with_model(model.as_str());
                }
                if let Some(temperature) = temperature {
                    request = request.with_temperature(temperature);
                }
                if let Some(max_tokens) = max_tokens {
                    request = request.with_max_tokens(max_tokens);
                }

                let response = match provider.complete(request).await {
                    Ok(response) => response,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                debug!(
                    prompt_tokens = response.usage.prompt_tokens,
                    completion_tokens = response.usage.completion_tokens,
                    "completion received"
                );

                let assistant = response.message;
                messages.push(assistant.clone());
                let event = UpdateEvent {
                    node: AGENT_NODE.to_string(),
                    messages: vec![assistant.clone()],
                };
                if tx.send(Ok(event)).await.is_err() {
                    // Receiver dropped: the turn was cancelled.
                    return;
                }

                if assistant.tool_calls.is_empty() {
                    return;
                }

                let results = futures::future::join_all(
                    assistant.tool_calls.iter().map(|call| execute_tool(&tools, call)),
                )
                .await;

                let tool_messages: Vec<Message> = assistant
                    .tool_calls
                    .iter()
                    .zip(results)
                    .map(|(call, result)| {
                        Message::tool_result(&call.id, result).with_name(&call.name)
                    })
                    .collect();
                messages.extend(tool_messages.clone());
                let event = UpdateEvent {
                    node: TOOLS_NODE.to_string(),
                    messages: tool_messages,
                };
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }

            let _ = tx
                .send(Err(Error::Unknown(format!(
                    "agent exceeded max iterations ({max_iterations})"
                ))))
                .await;
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

/// Executes one tool call, folding every failure mode into the result string
/// the model sees.
async fn execute_tool(registry: &ToolRegistry, tool_call: &ToolCall) -> String {
    let Some(tool) = registry.get(&tool_call.name) else {
        return format!("Error: Unknown tool '{}'", tool_call.name);
    };

    debug!(tool = %tool_call.name, call_id = %tool_call.id, "executing tool");
    match tool.execute(tool_call.arguments.clone()).await {
        Ok(output) => {
            if output.is_error {
                format!("Error: {}", output.content)
            } else {
                output.content
            }
        }
        Err(e) => format!("Error executing tool: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::testing::MockProvider;
    use crate::tool::{Tool, ToolDefinition, ToolOutput};
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::{json, Value};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the arguments back"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("echo", "Echoes the arguments back")
        }

        async fn execute(&self, arguments: Value) -> Result<ToolOutput, Error> {
            Ok(ToolOutput::success(arguments.to_string()))
        }
    }

    #[tokio::test]
    async fn test_plain_answer_is_one_agent_event() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("Hello there");
        let agent = ChatAgent::new(provider, Arc::new(ToolRegistry::new()));

        let events: Vec<_> = agent.run(vec![Message::user("hi")]).collect().await;
        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.node, AGENT_NODE);
        assert_eq!(event.messages.len(), 1);
        assert_eq!(event.messages[0].role, Role::Assistant);
        assert_eq!(event.messages[0].content, "Hello there");
    }

    #[tokio::test]
    async fn test_tool_calls_produce_tools_event() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_calls(vec![ToolCall::new("call_0", "echo", json!({"city": "sf"}))]);
        provider.queue_response("done");

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let agent = ChatAgent::new(provider, Arc::new(registry));

        let events: Vec<_> = agent.run(vec![Message::user("weather in sf?")]).collect().await;
        assert_eq!(events.len(), 3);

        let first = events[0].as_ref().unwrap();
        assert_eq!(first.node, AGENT_NODE);
        assert_eq!(first.messages[0].tool_calls.len(), 1);

        let second = events[1].as_ref().unwrap();
        assert_eq!(second.node, TOOLS_NODE);
        assert_eq!(second.messages.len(), 1);
        assert_eq!(second.messages[0].tool_name(), Some("echo"));
        assert_eq!(second.messages[0].tool_call_id.as_deref(), Some("call_0"));
        assert_eq!(second.messages[0].content, r#"{"city":"sf"}"#);

        let third = events[2].as_ref().unwrap();
        assert_eq!(third.node, AGENT_NODE);
        assert_eq!(third.messages[0].content, "done");
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_result() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_calls(vec![ToolCall::new("call_0", "missing", json!({}))]);
        provider.queue_response("done");
        let agent = ChatAgent::new(provider, Arc::new(ToolRegistry::new()));

        let events: Vec<_> = agent.run(vec![Message::user("go")]).collect().await;
        let tools_event = events[1].as_ref().unwrap();
        assert_eq!(tools_event.messages[0].content, "Error: Unknown tool 'missing'");
    }

    #[tokio::test]
    async fn test_provider_error_ends_stream() {
        let provider = Arc::new(MockProvider::new());
        let agent = ChatAgent::new(provider, Arc::new(ToolRegistry::new()));

        let events: Vec<_> = agent.run(vec![Message::user("hi")]).collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_err());
    }

    #[tokio::test]
    async fn test_system_prompt_is_prepended() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("ok");
        let agent = ChatAgent::new(Arc::clone(&provider) as Arc<dyn Provider>, Arc::new(ToolRegistry::new()))
            .with_system_prompt("You are terse.");

        let _ = agent.run(vec![Message::user("hi")]).collect::<Vec<_>>().await;

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, "You are terse.");
        assert_eq!(request.messages[1].role, Role::User);
    }
}
