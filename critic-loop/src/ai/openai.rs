use crate::ai::types::{Completion, ModelReply, TokenUsage, ToolCall, ToolCompletion};
use crate::ai::{Message, ModelError, ModelService};
use crate::providers::{model_name_of, ProviderDirectory};
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const MAX_TOKENS: u32 = 4096;

/// Model service speaking the OpenAI chat-completions protocol to every
/// configured provider. The provider is picked from the model key prefix.
#[derive(Clone)]
pub struct OpenAIService {
    client: Client,
    providers: Arc<ProviderDirectory>,
}

#[derive(Debug, Serialize)]
struct OpenAICompletionRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAIFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAICompletionResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
    error: Option<OpenAIError>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

impl OpenAIService {
    pub fn new(providers: Arc<ProviderDirectory>) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self { client, providers })
    }

    async fn send(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<(ModelReply, Option<TokenUsage>), ModelError> {
        let provider = self.providers.for_model(model).ok_or_else(|| ModelError::Unavailable {
            model: model.to_string(),
            message: "no provider configured for this model key".to_string(),
        })?;
        let api_key = provider.api_key.as_deref().ok_or_else(|| ModelError::Unauthorized {
            model: model.to_string(),
            message: format!("no credential for provider '{}'", provider.name),
        })?;

        let request = build_request(model, messages, tools, MAX_TOKENS);
        log::info!(
            "[OPENAI] Sending request to {} with model {} and {} tools",
            provider.endpoint,
            request.model,
            tools.len()
        );
        log::debug!(
            "[OPENAI] Full request:\n{}",
            serde_json::to_string_pretty(&request).unwrap_or_default()
        );

        let response = self
            .client
            .post(&provider.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Transient {
                model: model.to_string(),
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ModelError::Transient {
            model: model.to_string(),
            message: format!("failed to read response: {}", e),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map(|r| r.error.message)
                .unwrap_or(body);
            return Err(ModelError::from_status(model, status.as_u16(), &message));
        }

        log::debug!("[OPENAI] Raw response:\n{}", body);
        parse_completion(model, &body)
    }
}

#[async_trait]
impl ModelService for OpenAIService {
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<Completion, ModelError> {
        let (reply, usage) = self.send(model, messages, &[]).await?;
        let text = match reply {
            ModelReply::Text(text) => text,
            ModelReply::ToolInvocations { content, .. } => content,
        };
        Ok(Completion { text, usage })
    }

    async fn complete_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ToolCompletion, ModelError> {
        let (reply, usage) = self.send(model, messages, tools).await?;
        Ok(ToolCompletion { reply, usage })
    }
}

fn build_request(
    model: &str,
    messages: &[Message],
    tools: &[ToolDefinition],
    max_tokens: u32,
) -> OpenAICompletionRequest {
    let api_tools: Option<Vec<OpenAITool>> = if tools.is_empty() {
        None
    } else {
        Some(
            tools
                .iter()
                .map(|t| OpenAITool {
                    tool_type: "function".to_string(),
                    function: OpenAIFunction {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters_json(),
                    },
                })
                .collect(),
        )
    };

    OpenAICompletionRequest {
        model: model_name_of(model).to_string(),
        messages: messages.iter().map(to_api_message).collect(),
        max_tokens,
        tool_choice: api_tools.as_ref().map(|_| "auto".to_string()),
        tools: api_tools,
    }
}

fn to_api_message(message: &Message) -> OpenAIMessage {
    let tool_calls = (!message.tool_calls.is_empty()).then(|| {
        message
            .tool_calls
            .iter()
            .map(|tc| OpenAIToolCall {
                id: tc.id.clone(),
                call_type: "function".to_string(),
                function: OpenAIFunctionCall {
                    name: tc.name.clone(),
                    arguments: tc.arguments.clone(),
                },
            })
            .collect()
    });

    OpenAIMessage {
        role: message.role.to_string(),
        // Some providers reject assistant tool-call turns without a content field
        content: Some(message.content.clone()),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// Decode a successful response body. Providers that report errors with a
/// 200 status are classified from the error message.
fn parse_completion(
    model: &str,
    body: &str,
) -> Result<(ModelReply, Option<TokenUsage>), ModelError> {
    let response: OpenAICompletionResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Transient {
            model: model.to_string(),
            message: format!("failed to parse response: {}", e),
        })?;

    if let Some(error) = response.error {
        return Err(ModelError::from_message(model, &error.message));
    }

    let choice = response.choices.into_iter().next().ok_or_else(|| ModelError::Transient {
        model: model.to_string(),
        message: "response contained no choices".to_string(),
    })?;

    let calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
        .collect();
    let content = choice.message.content.unwrap_or_default();

    log::info!(
        "[OPENAI] Response - content_len: {}, tool_calls: {}, finish_reason: {:?}",
        content.len(),
        calls.len(),
        choice.finish_reason
    );

    let usage = response.usage.map(|u| TokenUsage {
        model_key: model.to_string(),
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
    });

    Ok((ModelReply::from_parts(content, calls), usage))
}
