use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    ChatRequest, ChatResponse, ChatUsage, ContentBlock, LlmClient, Message, MessageRole,
    QuorumAiError,
};

const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_base: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self, QuorumAiError> {
        if config.api_key.trim().is_empty() {
            return Err(QuorumAiError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(config.api_key.trim())
                .map_err(|e| QuorumAiError::InvalidResponse(format!("invalid API key header: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_millis(
                config.request_timeout_ms.max(1),
            ))
            .build()?;

        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.ends_with("/messages") {
            return base.to_string();
        }

        format!("{base}/messages")
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, QuorumAiError> {
        let body = build_messages_request_body(&request);
        let response = self
            .client
            .post(self.messages_url())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(QuorumAiError::HttpStatus {
                status: status.as_u16(),
                body: raw,
            });
        }

        parse_messages_response(&raw)
    }
}

fn build_messages_request_body(request: &ChatRequest) -> Value {
    let system = extract_system_text(&request.messages);
    let messages = to_anthropic_messages(&request.messages);

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    });

    if !system.is_empty() {
        body["system"] = json!(system);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }

    body
}

fn extract_system_text(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|message| message.role == MessageRole::System)
        .map(Message::text_content)
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn to_anthropic_messages(messages: &[Message]) -> Value {
    Value::Array(
        messages
            .iter()
            .filter_map(|message| {
                let role = match message.role {
                    MessageRole::System => return None,
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                };
                let text = message.text_content();
                if text.trim().is_empty() {
                    return None;
                }

                Some(json!({
                    "role": role,
                    "content": [{ "type": "text", "text": text }],
                }))
            })
            .collect(),
    )
}

fn parse_messages_response(raw: &str) -> Result<ChatResponse, QuorumAiError> {
    let parsed: AnthropicMessageResponse = serde_json::from_str(raw)?;

    let mut blocks = Vec::new();
    for part in parsed.content {
        match part {
            AnthropicContent::Text { text } => {
                if !text.trim().is_empty() {
                    blocks.push(ContentBlock::Text { text });
                }
            }
            AnthropicContent::Other => {}
        }
    }

    let usage = parsed
        .usage
        .map(|usage| ChatUsage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.input_tokens + usage.output_tokens,
        })
        .unwrap_or_default();

    Ok(ChatResponse {
        message: Message::assistant_blocks(blocks),
        finish_reason: parsed.stop_reason,
        usage,
    })
}

#[derive(Debug, Deserialize)]
struct AnthropicMessageResponse {
    content: Vec<AnthropicContent>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::{build_messages_request_body, parse_messages_response};
    use crate::{ChatRequest, Message};

    #[test]
    fn serializes_system_prompt_separately() {
        let request = ChatRequest {
            model: "claude-3-opus-20240229".to_string(),
            messages: vec![
                Message::system("You are Claude"),
                Message::user("Answer the following question: hi"),
            ],
            max_tokens: None,
            temperature: Some(0.7),
        };

        let body = build_messages_request_body(&request);
        assert_eq!(body["system"], "You are Claude");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(
            body["messages"][0]["content"][0]["text"],
            "Answer the following question: hi"
        );
        assert_eq!(
            body["messages"]
                .as_array()
                .expect("messages should be an array")
                .len(),
            1
        );
    }

    #[test]
    fn parses_text_blocks_and_usage() {
        let raw = r#"{
            "content": [
                {"type":"text","text":"first"},
                {"type":"text","text":"second"}
            ],
            "stop_reason":"end_turn",
            "usage":{"input_tokens":10,"output_tokens":3}
        }"#;

        let response = parse_messages_response(raw).expect("response should parse");
        assert_eq!(response.message.text_content(), "first\nsecond");
        assert_eq!(response.message.text_segments().len(), 2);
        assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(response.usage.total_tokens, 13);
    }

    #[test]
    fn regression_unknown_content_blocks_are_skipped() {
        let raw = r#"{
            "content": [
                {"type":"thinking","thinking":"hm"},
                {"type":"text","text":"visible"}
            ],
            "stop_reason":"end_turn",
            "usage":{"input_tokens":1,"output_tokens":1}
        }"#;

        let response = parse_messages_response(raw).expect("response should parse");
        assert_eq!(response.message.text_content(), "visible");
    }
}
