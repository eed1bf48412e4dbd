use bidwise_retrieval::RetrievalResult;
use serde::Serialize;

/// Mutable record threaded through one run of the generation loop.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    /// Query used for retrieval; HyDE rewrites it on every pass.
    pub question: String,
    pub original_question: String,
    /// Restricts retrieval to these `doc_id`s when set.
    pub selected_doc_filter: Option<Vec<String>>,
    pub documents: Vec<RetrievalResult>,
    pub answer: Option<String>,
    pub is_relevant: bool,
    pub retry_count: u32,
    pub passes: u32,
    pub diagnostics: Vec<String>,
}

impl AgentState {
    #[must_use]
    pub fn new(question: &str, selected_doc_filter: Option<Vec<String>>) -> Self {
        Self {
            question: question.to_owned(),
            original_question: question.to_owned(),
            selected_doc_filter: selected_doc_filter.filter(|ids| !ids.is_empty()),
            ..Self::default()
        }
    }

    pub(crate) fn diagnose(&mut self, note: impl Into<String>) {
        self.diagnostics.push(note.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Mean source score: `>= 0.8` high, `>= 0.5` medium, otherwise low.
    #[must_use]
    pub fn from_sources(sources: &[RetrievalResult]) -> Self {
        if sources.is_empty() {
            return Self::Low;
        }
        #[allow(clippy::cast_precision_loss)]
        let avg = sources.iter().map(|s| f64::from(s.score)).sum::<f64>() / sources.len() as f64;
        if avg >= 0.8 {
            Self::High
        } else if avg >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoopOutcome {
    pub answer: String,
    pub sources: Vec<RetrievalResult>,
    pub is_relevant: bool,
    pub retry_count: u32,
    pub passes: u32,
    pub confidence: Confidence,
    pub diagnostics: Vec<String>,
}

impl From<AgentState> for LoopOutcome {
    fn from(state: AgentState) -> Self {
        let confidence = Confidence::from_sources(&state.documents);
        Self {
            answer: state.answer.unwrap_or_default(),
            sources: state.documents,
            is_relevant: state.is_relevant,
            retry_count: state.retry_count,
            passes: state.passes,
            confidence,
            diagnostics: state.diagnostics,
        }
    }
}
