use futures_util::future::try_join_all;
use quorum_ai::QuorumAiError;
use thiserror::Error;

use crate::registry::AgentRegistry;
use crate::task::{build_comparison_task, build_response_tasks, Task};

/// A request-level failure, tagged with the stage that died so the caller
/// can present an actionable message. Never partial: a gathering failure
/// means no mapping was produced and no comparison was attempted.
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("response gathering failed for agent '{role}': {source}")]
    Gathering {
        role: String,
        #[source]
        source: QuorumAiError,
    },
    #[error("comparison failed: {source}")]
    Comparison {
        #[source]
        source: QuorumAiError,
    },
}

/// Role-keyed answer texts in insertion order. Keys are unique; inserting
/// an existing role replaces its text instead of appending a duplicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedResponses {
    entries: Vec<(String, String)>,
}

impl AggregatedResponses {
    pub fn insert(&mut self, role: impl Into<String>, text: impl Into<String>) {
        let role = role.into();
        let text = text.into();
        if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| *existing == role) {
            entry.1 = text;
        } else {
            self.entries.push((role, text));
        }
    }

    pub fn get(&self, role: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == role)
            .map(|(_, text)| text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(role, text)| (role.as_str(), text.as_str()))
    }

    pub fn roles(&self) -> Vec<&str> {
        self.entries.iter().map(|(role, _)| role.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The outbound artifact of a full run: every answer plus the judge's
/// verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub responses: AggregatedResponses,
    pub summary: String,
}

/// Fan the tasks out concurrently and join all of them before building
/// the mapping. Results are individually awaited items gathered in
/// task-supply order; the first failure aborts the whole step and no
/// partial mapping is surfaced.
pub async fn gather_responses(tasks: &[Task]) -> Result<AggregatedResponses, CompareError> {
    let outputs = try_join_all(tasks.iter().map(|task| async move {
        let role = task.agent().role().to_string();
        match task.execute().await {
            Ok(output) => Ok((role, output)),
            Err(source) => Err(CompareError::Gathering { role, source }),
        }
    }))
    .await?;

    let mut responses = AggregatedResponses::default();
    for (role, output) in outputs {
        let text = output.resolve_text(&role);
        responses.insert(role, text);
    }

    Ok(responses)
}

/// The whole flow: build response tasks, gather answers, ask the judge,
/// normalize its verdict to a single string.
pub async fn run_comparison(
    registry: &AgentRegistry,
    prompt: &str,
) -> Result<Comparison, CompareError> {
    let tasks = build_response_tasks(registry, prompt);
    let responses = gather_responses(&tasks).await?;

    let comparison_task = build_comparison_task(registry, &responses, prompt);
    let output = comparison_task
        .execute()
        .await
        .map_err(|source| CompareError::Comparison { source })?;

    Ok(Comparison {
        responses,
        summary: output.into_summary(),
    })
}
