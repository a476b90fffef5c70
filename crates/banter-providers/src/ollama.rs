use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use banter_core::{
    CompletionRequest, CompletionResponse, Error, FinishReason, Message, Provider, Role, ToolCall,
    ToolDefinition, Usage,
};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Backend for a local Ollama server.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    default_model: Option<String>,
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    fn build_request(&self, request: &CompletionRequest) -> Result<OllamaChatRequest, Error> {
        // Unlike the OpenAI API, Ollama has no server-side default model.
        let model = request
            .model
            .clone()
            .or_else(|| self.default_model.clone())
            .ok_or_else(|| Error::invalid_request("No model specified for the ollama backend"))?;

        let messages: Vec<OllamaMessage> = request
            .messages
            .iter()
            .map(|m| self.convert_message(m))
            .collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(|t| self.convert_tool(t)).collect())
        };

        let options = if request.temperature.is_none() && request.max_tokens.is_none() {
            None
        } else {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        };

        Ok(OllamaChatRequest {
            model,
            messages,
            stream: false,
            tools,
            options,
        })
    }

    fn convert_message(&self, message: &Message) -> OllamaMessage {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(
                message
                    .tool_calls
                    .iter()
                    .map(|tc| OllamaToolCall {
                        function: OllamaFunctionCall {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect(),
            )
        };

        OllamaMessage {
            role: role.to_string(),
            content: message.content.clone(),
            tool_calls,
        }
    }

    fn convert_tool(&self, tool: &ToolDefinition) -> OllamaTool {
        OllamaTool {
            r#type: "function".to_string(),
            function: OllamaFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: serde_json::to_value(&tool.parameters).unwrap_or_default(),
            },
        }
    }

    fn parse_response(&self, response: OllamaChatResponse) -> CompletionResponse {
        // Ollama carries no call ids on the wire, so synthesize stable ones
        // in call order for result matching downstream.
        let tool_calls: Vec<ToolCall> = response
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, tc)| {
                ToolCall::new(format!("call_{index}"), tc.function.name, tc.function.arguments)
            })
            .collect();

        let finish_reason = if !tool_calls.is_empty() {
            FinishReason::ToolCalls
        } else {
            match response.done_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ => FinishReason::Stop,
            }
        };

        let message = if tool_calls.is_empty() {
            Message::assistant(response.message.content)
        } else {
            Message::assistant_with_tool_calls(response.message.content, tool_calls)
        };

        CompletionResponse {
            message,
            usage: Usage::new(
                response.prompt_eval_count.unwrap_or(0),
                response.eval_count.unwrap_or(0),
            ),
            model: response.model,
            finish_reason,
        }
    }

    fn parse_error(&self, status: u16, body: &str) -> Error {
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: String,
        }

        if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
            match status {
                404 => Error::invalid_request(err.error),
                _ => Error::api(status, err.error),
            }
        } else {
            Error::api(status, body.to_string())
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        let api_request = self.build_request(&request)?;
        debug!(model = %api_request.model, messages = api_request.messages.len(), "Ollama request");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .header("Content-Type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &error_text));
        }

        let api_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| Error::serialization(e.to_string()))?;

        Ok(self.parse_response(api_response))
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OllamaTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    /// Arguments arrive as a JSON object, not a string.
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    r#type: String,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_creation() {
        let provider = OllamaProvider::new();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.default_model(), None);
    }

    #[test]
    fn test_build_request_requires_model() {
        let provider = OllamaProvider::new();
        let request = CompletionRequest::new(vec![Message::user("Hello")]);
        assert!(provider.build_request(&request).is_err());

        let provider = provider.with_default_model("qwen3:8b");
        let api_request = provider.build_request(&request).unwrap();
        assert_eq!(api_request.model, "qwen3:8b");
        assert!(!api_request.stream);
    }

    #[test]
    fn test_request_model_overrides_default() {
        let provider = OllamaProvider::new().with_default_model("qwen3:8b");
        let request = CompletionRequest::new(vec![Message::user("Hello")]).with_model("llama3.2");
        let api_request = provider.build_request(&request).unwrap();
        assert_eq!(api_request.model, "llama3.2");
    }

    #[test]
    fn test_options_omitted_when_unset() {
        let provider = OllamaProvider::new().with_default_model("qwen3:8b");
        let request = CompletionRequest::new(vec![Message::user("Hello")]);
        assert!(provider.build_request(&request).unwrap().options.is_none());

        let request = request.with_temperature(0.2);
        let options = provider.build_request(&request).unwrap().options.unwrap();
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.num_predict, None);
    }

    #[test]
    fn test_parse_response_synthesizes_call_ids() {
        let provider = OllamaProvider::new();
        let response = OllamaChatResponse {
            model: "qwen3:8b".to_string(),
            message: OllamaMessage {
                role: "assistant".to_string(),
                content: String::new(),
                tool_calls: Some(vec![
                    OllamaToolCall {
                        function: OllamaFunctionCall {
                            name: "get_weather".to_string(),
                            arguments: json!({"city": "sf"}),
                        },
                    },
                    OllamaToolCall {
                        function: OllamaFunctionCall {
                            name: "get_weather".to_string(),
                            arguments: json!({"city": "la"}),
                        },
                    },
                ]),
            },
            done_reason: Some("stop".to_string()),
            prompt_eval_count: Some(20),
            eval_count: Some(11),
        };

        let parsed = provider.parse_response(response);
        assert_eq!(parsed.finish_reason, FinishReason::ToolCalls);
        assert_eq!(parsed.message.tool_calls[0].id, "call_0");
        assert_eq!(parsed.message.tool_calls[1].id, "call_1");
        assert_eq!(parsed.message.tool_calls[1].arguments, json!({"city": "la"}));
        assert_eq!(parsed.usage.total_tokens, 31);
    }

    #[test]
    fn test_parse_error_uses_body_message() {
        let provider = OllamaProvider::new();
        let err = provider.parse_error(404, r#"{"error": "model 'nope' not found"}"#);
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(err.to_string().contains("not found"));

        assert!(matches!(
            provider.parse_error(500, "plain text"),
            Error::Api { status: 500, .. }
        ));
    }
}
