use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use quorum_ai::{
    ChatRequest, ChatResponse, ChatUsage, ContentBlock, LlmClient, Message, Provider,
    QuorumAiError,
};
use quorum_core::{
    build_comparison_task, build_response_tasks, gather_responses, run_comparison, Agent,
    AgentRegistry, CompareError,
};

fn response_with(message: Message) -> ChatResponse {
    ChatResponse {
        message,
        finish_reason: Some("stop".to_string()),
        usage: ChatUsage::default(),
    }
}

/// Replies with a fixed message, optionally after a delay, and records
/// every request it sees.
struct ScriptedClient {
    message: Message,
    delay_ms: u64,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    fn text(text: &str) -> Arc<Self> {
        Self::with_message(Message::assistant_text(text), 0)
    }

    fn delayed(text: &str, delay_ms: u64) -> Arc<Self> {
        Self::with_message(Message::assistant_text(text), delay_ms)
    }

    fn with_message(message: Message, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            message,
            delay_ms,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> Option<ChatRequest> {
        self.requests
            .lock()
            .expect("request lock")
            .last()
            .cloned()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, QuorumAiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().expect("request lock").push(request);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        Ok(response_with(self.message.clone()))
    }
}

/// Always fails with a provider-shaped error.
struct FailingClient;

#[async_trait]
impl LlmClient for FailingClient {
    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, QuorumAiError> {
        Err(QuorumAiError::HttpStatus {
            status: 500,
            body: "provider exploded".to_string(),
        })
    }
}

fn answerer(role: &str, provider: Provider, client: Arc<dyn LlmClient>) -> Arc<Agent> {
    Arc::new(Agent::new(
        role,
        "Answer user prompts",
        "You are a test answerer.",
        provider,
        "test-model",
        0.7,
        true,
        client,
    ))
}

fn judge(client: Arc<dyn LlmClient>) -> Arc<Agent> {
    Arc::new(Agent::new(
        "Comparison Agent",
        "Compare LLM responses and summarize quality and differences",
        "You review and evaluate answers.",
        Provider::OpenAi,
        "test-model",
        0.3,
        true,
        client,
    ))
}

fn registry_with(
    chatgpt: Arc<dyn LlmClient>,
    claude: Arc<dyn LlmClient>,
    gemini: Arc<dyn LlmClient>,
    judge_client: Arc<dyn LlmClient>,
) -> AgentRegistry {
    AgentRegistry::from_agents(
        answerer("ChatGPT", Provider::OpenAi, chatgpt),
        answerer("Claude", Provider::Anthropic, claude),
        answerer("Gemini", Provider::Google, gemini),
        judge(judge_client),
    )
}

#[tokio::test]
async fn end_to_end_comparison_produces_the_judge_verdict_verbatim() {
    let judge_client =
        ScriptedClient::text("All three are correct; ChatGPT's answer is most concise.");
    let registry = registry_with(
        ScriptedClient::text("4"),
        ScriptedClient::text("The answer is 4."),
        ScriptedClient::text("Four."),
        judge_client.clone(),
    );

    let comparison = run_comparison(&registry, "What is 2+2?")
        .await
        .expect("comparison should succeed");

    assert_eq!(
        comparison.responses.roles(),
        vec!["ChatGPT", "Claude", "Gemini"]
    );
    assert_eq!(comparison.responses.get("ChatGPT"), Some("4"));
    assert_eq!(comparison.responses.get("Claude"), Some("The answer is 4."));
    assert_eq!(comparison.responses.get("Gemini"), Some("Four."));
    assert_eq!(
        comparison.summary,
        "All three are correct; ChatGPT's answer is most concise."
    );

    let judge_request = judge_client
        .last_request()
        .expect("judge should receive one request");
    let description = judge_request
        .messages
        .last()
        .expect("judge request carries the task description")
        .text_content();
    assert!(description.contains("What is 2+2?"));
    assert!(description.contains("ChatGPT:\n4"));
    assert!(description.contains("Claude:\nThe answer is 4."));
    assert!(description.contains("Gemini:\nFour."));
}

#[tokio::test]
async fn failing_answerer_aborts_before_any_comparison() {
    let judge_client = ScriptedClient::text("never used");
    let registry = registry_with(
        ScriptedClient::text("4"),
        Arc::new(FailingClient),
        ScriptedClient::text("Four."),
        judge_client.clone(),
    );

    let error = run_comparison(&registry, "What is 2+2?")
        .await
        .expect_err("a failing answerer must abort the flow");

    match error {
        CompareError::Gathering { role, source } => {
            assert_eq!(role, "Claude");
            assert!(matches!(source, QuorumAiError::HttpStatus { status: 500, .. }));
        }
        other => panic!("expected a gathering failure, got {other:?}"),
    }
    assert_eq!(judge_client.call_count(), 0);
}

#[tokio::test]
async fn aggregation_keeps_fixed_order_under_scrambled_completion() {
    let registry = registry_with(
        ScriptedClient::delayed("slowest", 60),
        ScriptedClient::delayed("middle", 30),
        ScriptedClient::delayed("fastest", 5),
        ScriptedClient::text("unused"),
    );

    let tasks = build_response_tasks(&registry, "race");
    let responses = gather_responses(&tasks).await.expect("gathering succeeds");

    assert_eq!(responses.len(), 3);
    assert_eq!(responses.roles(), vec!["ChatGPT", "Claude", "Gemini"]);
    assert_eq!(responses.get("ChatGPT"), Some("slowest"));
    assert_eq!(responses.get("Gemini"), Some("fastest"));
}

#[tokio::test]
async fn empty_answer_text_aggregates_as_a_visible_placeholder() {
    let registry = registry_with(
        ScriptedClient::text("4"),
        ScriptedClient::with_message(Message::assistant_blocks(vec![]), 0),
        ScriptedClient::text("Four."),
        ScriptedClient::text("unused"),
    );

    let tasks = build_response_tasks(&registry, "What is 2+2?");
    let responses = gather_responses(&tasks).await.expect("gathering succeeds");

    let claude = responses.get("Claude").expect("entry must exist");
    assert!(!claude.is_empty());
    assert!(claude.contains("Claude"));
    assert_ne!(claude, "4");
}

#[tokio::test]
async fn list_wrapped_judge_verdict_is_unwrapped_to_its_first_element() {
    let judge_client = ScriptedClient::with_message(
        Message::assistant_blocks(vec![
            ContentBlock::text("Answer X is best"),
            ContentBlock::text("trailing block"),
        ]),
        0,
    );
    let registry = registry_with(
        ScriptedClient::text("a"),
        ScriptedClient::text("b"),
        ScriptedClient::text("c"),
        judge_client,
    );

    let comparison = run_comparison(&registry, "pick one")
        .await
        .expect("comparison should succeed");
    assert_eq!(comparison.summary, "Answer X is best");
}

#[tokio::test]
async fn comparison_task_is_built_from_gathered_responses() {
    let registry = registry_with(
        ScriptedClient::text("a"),
        ScriptedClient::text("b"),
        ScriptedClient::text("c"),
        ScriptedClient::text("verdict"),
    );

    let tasks = build_response_tasks(&registry, "prompt under test");
    let responses = gather_responses(&tasks).await.expect("gathering succeeds");
    let task = build_comparison_task(&registry, &responses, "prompt under test");

    assert!(task.description().contains("prompt under test"));
    assert!(task.description().contains("ChatGPT:\na"));
    assert_eq!(task.agent().role(), "Comparison Agent");
}
