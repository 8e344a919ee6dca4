mod anthropic;
mod google;
mod openai;
mod provider;
mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use google::{GoogleClient, GoogleConfig};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use provider::Provider;
pub use types::{
    ChatRequest, ChatResponse, ChatUsage, ContentBlock, LlmClient, Message, MessageRole,
    QuorumAiError,
};
