use std::sync::Arc;

use async_trait::async_trait;
use quorum_ai::{
    AnthropicClient, AnthropicConfig, ChatRequest, ChatResponse, GoogleClient, GoogleConfig,
    LlmClient, Message, OpenAiClient, OpenAiConfig, Provider, QuorumAiError,
};
use serde::Serialize;

use crate::outcome::TaskOutput;

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-opus-20240229";
pub const DEFAULT_GOOGLE_MODEL: &str = "gemini-pro";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;

const ANSWERER_TEMPERATURE: f32 = 0.7;
const JUDGE_TEMPERATURE: f32 = 0.3;

/// Connection settings for one provider family. `api_key: None` does not
/// block registry construction; the agent degrades to a client that fails
/// at call time.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout_ms: u64,
}

impl ProviderSettings {
    fn for_provider(provider: Provider) -> Self {
        let (api_base, model) = match provider {
            Provider::OpenAi => (DEFAULT_OPENAI_API_BASE, DEFAULT_OPENAI_MODEL),
            Provider::Anthropic => (DEFAULT_ANTHROPIC_API_BASE, DEFAULT_ANTHROPIC_MODEL),
            Provider::Google => (DEFAULT_GOOGLE_API_BASE, DEFAULT_GOOGLE_MODEL),
        };

        Self {
            api_base: api_base.to_string(),
            api_key: None,
            model: model.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
    pub google: ProviderSettings,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            openai: ProviderSettings::for_provider(Provider::OpenAi),
            anthropic: ProviderSettings::for_provider(Provider::Anthropic),
            google: ProviderSettings::for_provider(Provider::Google),
        }
    }
}

/// A named, pre-configured binding to one model backend plus a fixed
/// persona and goal. Immutable after construction and shared by every
/// task that references its role.
pub struct Agent {
    role: String,
    goal: String,
    backstory: String,
    provider: Provider,
    model: String,
    temperature: f32,
    credential_configured: bool,
    client: Arc<dyn LlmClient>,
}

impl Agent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        provider: Provider,
        model: impl Into<String>,
        temperature: f32,
        credential_configured: bool,
        client: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            provider,
            model: model.into(),
            temperature,
            credential_configured,
            client,
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn credential_configured(&self) -> bool {
        self.credential_configured
    }

    fn system_prompt(&self) -> String {
        format!("{}\n\nYour goal: {}", self.backstory, self.goal)
    }

    /// The agent's single capability: submit a task description, get the
    /// generated output back. Provider failures propagate unchanged.
    pub async fn perform(&self, description: &str) -> Result<TaskOutput, QuorumAiError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(self.system_prompt()),
                Message::user(description),
            ],
            max_tokens: None,
            temperature: Some(self.temperature),
        };

        let response = self.client.complete(request).await?;
        Ok(TaskOutput::from_message(&response.message))
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.role)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("credential_configured", &self.credential_configured)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgentSummary {
    pub role: String,
    pub provider: Provider,
    pub model: String,
    pub temperature: f32,
    pub credential_configured: bool,
}

/// Stand-in client for a provider whose credential was absent at startup.
/// Keeps registry construction infallible; the first live call reports
/// the missing key instead.
struct UnconfiguredClient {
    provider: Provider,
}

#[async_trait]
impl LlmClient for UnconfiguredClient {
    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, QuorumAiError> {
        tracing::debug!(provider = self.provider.as_str(), "call on unconfigured provider");
        Err(QuorumAiError::MissingApiKey)
    }
}

/// The four fixed agents, built once per process and shared read-only.
pub struct AgentRegistry {
    chatgpt: Arc<Agent>,
    claude: Arc<Agent>,
    gemini: Arc<Agent>,
    judge: Arc<Agent>,
}

impl AgentRegistry {
    pub fn new(settings: &RegistrySettings) -> Self {
        let (openai_client, openai_configured) = build_openai_client(&settings.openai);
        let (anthropic_client, anthropic_configured) = build_anthropic_client(&settings.anthropic);
        let (google_client, google_configured) = build_google_client(&settings.google);

        let chatgpt = Arc::new(Agent::new(
            "ChatGPT",
            "Answer user prompts using OpenAI's GPT models",
            "You are GPT, providing high-quality answers.",
            Provider::OpenAi,
            settings.openai.model.clone(),
            ANSWERER_TEMPERATURE,
            openai_configured,
            openai_client.clone(),
        ));
        let claude = Arc::new(Agent::new(
            "Claude",
            "Respond using Claude with clarity and ethics",
            "You are Claude from Anthropic, known for nuanced reasoning.",
            Provider::Anthropic,
            settings.anthropic.model.clone(),
            ANSWERER_TEMPERATURE,
            anthropic_configured,
            anthropic_client,
        ));
        let gemini = Arc::new(Agent::new(
            "Gemini",
            "Respond using Google's Gemini model",
            "You are Gemini, optimized for helpful, direct answers.",
            Provider::Google,
            settings.google.model.clone(),
            ANSWERER_TEMPERATURE,
            google_configured,
            google_client,
        ));
        let judge = Arc::new(Agent::new(
            "Comparison Agent",
            "Compare LLM responses and summarize quality and differences",
            "You review and evaluate answers from different LLMs for fairness, clarity, and accuracy.",
            Provider::OpenAi,
            settings.openai.model.clone(),
            JUDGE_TEMPERATURE,
            openai_configured,
            openai_client,
        ));

        Self::from_agents(chatgpt, claude, gemini, judge)
    }

    /// Assemble a registry from pre-built agents. Used by `new` and by
    /// tests that substitute scripted clients.
    pub fn from_agents(
        chatgpt: Arc<Agent>,
        claude: Arc<Agent>,
        gemini: Arc<Agent>,
        judge: Arc<Agent>,
    ) -> Self {
        Self {
            chatgpt,
            claude,
            gemini,
            judge,
        }
    }

    /// The four fixed agents in stable order: the three answerers, then
    /// the judge.
    pub fn agents(&self) -> (Arc<Agent>, Arc<Agent>, Arc<Agent>, Arc<Agent>) {
        (
            self.chatgpt.clone(),
            self.claude.clone(),
            self.gemini.clone(),
            self.judge.clone(),
        )
    }

    pub fn answerers(&self) -> [Arc<Agent>; 3] {
        [
            self.chatgpt.clone(),
            self.claude.clone(),
            self.gemini.clone(),
        ]
    }

    pub fn judge(&self) -> Arc<Agent> {
        self.judge.clone()
    }

    pub fn summary(&self) -> Vec<AgentSummary> {
        let (chatgpt, claude, gemini, judge) = self.agents();
        [chatgpt, claude, gemini, judge]
            .iter()
            .map(|agent| AgentSummary {
                role: agent.role().to_string(),
                provider: agent.provider(),
                model: agent.model().to_string(),
                temperature: agent.temperature(),
                credential_configured: agent.credential_configured(),
            })
            .collect()
    }
}

fn missing_credential(provider: Provider) -> (Arc<dyn LlmClient>, bool) {
    tracing::warn!(
        provider = provider.as_str(),
        "API key is not set; calls through this agent will fail until it is provided"
    );
    (Arc::new(UnconfiguredClient { provider }), false)
}

fn build_openai_client(settings: &ProviderSettings) -> (Arc<dyn LlmClient>, bool) {
    let provider = Provider::OpenAi;
    let Some(api_key) = non_empty(&settings.api_key) else {
        return missing_credential(provider);
    };

    match OpenAiClient::new(OpenAiConfig {
        api_base: settings.api_base.clone(),
        api_key,
        request_timeout_ms: settings.request_timeout_ms.max(1),
    }) {
        Ok(client) => (Arc::new(client), true),
        Err(error) => {
            tracing::warn!(
                provider = provider.as_str(),
                %error,
                "failed to build provider client"
            );
            (Arc::new(UnconfiguredClient { provider }), false)
        }
    }
}

fn build_anthropic_client(settings: &ProviderSettings) -> (Arc<dyn LlmClient>, bool) {
    let provider = Provider::Anthropic;
    let Some(api_key) = non_empty(&settings.api_key) else {
        return missing_credential(provider);
    };

    match AnthropicClient::new(AnthropicConfig {
        api_base: settings.api_base.clone(),
        api_key,
        request_timeout_ms: settings.request_timeout_ms.max(1),
    }) {
        Ok(client) => (Arc::new(client), true),
        Err(error) => {
            tracing::warn!(
                provider = provider.as_str(),
                %error,
                "failed to build provider client"
            );
            (Arc::new(UnconfiguredClient { provider }), false)
        }
    }
}

fn build_google_client(settings: &ProviderSettings) -> (Arc<dyn LlmClient>, bool) {
    let provider = Provider::Google;
    let Some(api_key) = non_empty(&settings.api_key) else {
        return missing_credential(provider);
    };

    match GoogleClient::new(GoogleConfig {
        api_base: settings.api_base.clone(),
        api_key,
        request_timeout_ms: settings.request_timeout_ms.max(1),
    }) {
        Ok(client) => (Arc::new(client), true),
        Err(error) => {
            tracing::warn!(
                provider = provider.as_str(),
                %error,
                "failed to build provider client"
            );
            (Arc::new(UnconfiguredClient { provider }), false)
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use quorum_ai::{Provider, QuorumAiError};

    use super::{AgentRegistry, RegistrySettings};

    #[test]
    fn registry_exposes_four_agents_in_stable_order() {
        let registry = AgentRegistry::new(&RegistrySettings::default());
        let (first, second, third, judge) = registry.agents();

        assert_eq!(first.role(), "ChatGPT");
        assert_eq!(second.role(), "Claude");
        assert_eq!(third.role(), "Gemini");
        assert_eq!(judge.role(), "Comparison Agent");

        let answerers = registry.answerers();
        assert_eq!(
            answerers.iter().map(|a| a.role().to_string()).collect::<Vec<_>>(),
            vec!["ChatGPT", "Claude", "Gemini"]
        );
    }

    #[test]
    fn registry_construction_survives_missing_credentials() {
        let registry = AgentRegistry::new(&RegistrySettings::default());
        let summary = registry.summary();

        assert_eq!(summary.len(), 4);
        assert!(summary.iter().all(|agent| !agent.credential_configured));
    }

    #[test]
    fn judge_shares_the_openai_backend_at_lower_temperature() {
        let mut settings = RegistrySettings::default();
        settings.openai.api_key = Some("test-key".to_string());

        let registry = AgentRegistry::new(&settings);
        let (chatgpt, _, _, judge) = registry.agents();

        assert_eq!(judge.provider(), Provider::OpenAi);
        assert_eq!(judge.model(), chatgpt.model());
        assert!(judge.temperature() < chatgpt.temperature());
        assert!(judge.credential_configured());
    }

    #[tokio::test]
    async fn unconfigured_agent_fails_with_missing_api_key_at_call_time() {
        let registry = AgentRegistry::new(&RegistrySettings::default());
        let (chatgpt, _, _, _) = registry.agents();

        let error = chatgpt
            .perform("Answer the following question: hi")
            .await
            .expect_err("keyless agent must fail at call time");
        assert!(matches!(error, QuorumAiError::MissingApiKey));
    }
}
