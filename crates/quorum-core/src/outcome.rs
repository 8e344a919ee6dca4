use quorum_ai::Message;

/// The possible shapes of a completed task's result. Providers are not
/// uniform: most return a single text, some return several text blocks,
/// and a degraded result may carry only optional fields.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Text(String),
    Sequence(Vec<String>),
    Structured {
        raw: Option<String>,
        description: Option<String>,
    },
}

impl TaskOutput {
    /// Classify an assistant message: one text block is `Text`, several
    /// are `Sequence`, none leaves an empty `Structured` shell.
    pub fn from_message(message: &Message) -> Self {
        let mut segments = message.text_segments();
        match segments.len() {
            0 => Self::Structured {
                raw: None,
                description: None,
            },
            1 => Self::Text(segments.remove(0)),
            _ => Self::Sequence(segments),
        }
    }

    /// Extraction chain for answerer results: non-empty raw text first,
    /// then a description echo, then a visible placeholder naming the
    /// role so the anomaly reaches the user instead of vanishing.
    pub fn resolve_text(&self, role: &str) -> String {
        if let Some(raw) = self.raw_text() {
            return raw;
        }

        if let TaskOutput::Structured {
            description: Some(description),
            ..
        } = self
        {
            if !description.trim().is_empty() {
                return description.clone();
            }
        }

        tracing::warn!(role, output = ?self, "task result carried no usable text");
        format!("[no response text from {role}: {self:?}]")
    }

    /// Normalization for the judge verdict: a sequence collapses to its
    /// first element, anything without plain text is stringified. The
    /// result is a single text value, never a structured shape.
    pub fn into_summary(self) -> String {
        match self {
            TaskOutput::Text(text) => text,
            TaskOutput::Sequence(mut items) if !items.is_empty() => items.remove(0),
            other => match other.raw_text() {
                Some(raw) => raw,
                None => format!("{other:?}"),
            },
        }
    }

    fn raw_text(&self) -> Option<String> {
        match self {
            TaskOutput::Text(text) if !text.trim().is_empty() => Some(text.clone()),
            TaskOutput::Sequence(items) => {
                let joined = items
                    .iter()
                    .filter(|text| !text.trim().is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n");
                if joined.is_empty() {
                    None
                } else {
                    Some(joined)
                }
            }
            TaskOutput::Structured { raw: Some(raw), .. } if !raw.trim().is_empty() => {
                Some(raw.clone())
            }
            _ => None,
        }
    }
}
