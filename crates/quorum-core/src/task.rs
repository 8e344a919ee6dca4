use std::sync::Arc;

use quorum_ai::QuorumAiError;

use crate::driver::AggregatedResponses;
use crate::outcome::TaskOutput;
use crate::registry::{Agent, AgentRegistry};

const COMPARISON_EXPECTED_OUTPUT: &str =
    "A concise summary comparing the responses and declaring a winner with rationale.";

/// One unit of work: an instruction bound to a specific agent, expected
/// to resolve to text. Tasks are created per request and discarded once
/// their result is extracted; the agent is shared, not consumed.
#[derive(Debug)]
pub struct Task {
    description: String,
    expected_output: Option<String>,
    agent: Arc<Agent>,
}

impl Task {
    pub fn new(
        agent: Arc<Agent>,
        description: impl Into<String>,
        expected_output: Option<String>,
    ) -> Self {
        Self {
            description: description.into(),
            expected_output,
            agent,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected_output(&self) -> Option<&str> {
        self.expected_output.as_deref()
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub async fn execute(&self) -> Result<TaskOutput, QuorumAiError> {
        self.agent.perform(&self.description).await
    }
}

/// One task per answerer, in registry order. Construction cannot fail;
/// prompt non-emptiness is enforced by the caller.
pub fn build_response_tasks(registry: &AgentRegistry, prompt: &str) -> Vec<Task> {
    registry
        .answerers()
        .into_iter()
        .map(|agent| {
            Task::new(
                agent,
                format!("Answer the following question: {prompt}"),
                None,
            )
        })
        .collect()
}

/// One task for the judge, embedding the original prompt and every
/// collected answer in the mapping's iteration order.
pub fn build_comparison_task(
    registry: &AgentRegistry,
    responses: &AggregatedResponses,
    prompt: &str,
) -> Task {
    let rendered = responses
        .iter()
        .map(|(role, text)| format!("{role}:\n{text}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    let description = format!(
        "Compare the following answers provided by different LLMs to the prompt '{prompt}'.\n\n\
         {rendered}\n\n\
         Evaluate each answer for clarity, accuracy, completeness, and helpfulness, \
         then declare a winner with a short rationale."
    );

    Task::new(
        registry.judge(),
        description,
        Some(COMPARISON_EXPECTED_OUTPUT.to_string()),
    )
}
