//! Bounded question-answering loop: HyDE, retrieve, rerank, grade, then retry or generate.

mod document;
mod grade;
pub mod prompts;
mod state;

use std::future::Future;

use bidwise_llm::{ChatOptions, FallbackChain, LlmProvider};
use bidwise_retrieval::{
    RetrievalAgent, RetrievalError, RetrievalRequest, RetrievalResponse, SearchFilters,
    format_context,
};

pub use document::{
    DocumentSummary, ExtractionSchema, SectionSummary, TaskError, default_extraction_schema,
    empty_extraction,
};
pub use grade::{Grade, GradeParseError};
pub use state::{AgentState, Confidence, LoopOutcome};

use prompts::{DEGRADED_ANSWER_PREFIX, INSUFFICIENT_INFO_ANSWER};

const GRADE_MAX_TOKENS: u32 = 16;
/// Excerpts shown in a degraded answer when generation fails.
const DEGRADED_EXCERPTS: usize = 3;

/// Where the loop gets its evidence. Implemented by [`RetrievalAgent`].
pub trait EvidenceSource: Send + Sync {
    fn retrieve(
        &self,
        request: RetrievalRequest,
    ) -> impl Future<Output = Result<RetrievalResponse, RetrievalError>> + Send;
}

impl<P: LlmProvider> EvidenceSource for RetrievalAgent<P> {
    fn retrieve(
        &self,
        request: RetrievalRequest,
    ) -> impl Future<Output = Result<RetrievalResponse, RetrievalError>> + Send {
        RetrievalAgent::retrieve(self, request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    pub max_retries: u32,
    /// Hard cap on documents kept after retrieval.
    pub context_cap: usize,
    /// Answers shorter than this (trimmed, in characters) are degenerate.
    pub min_response_chars: usize,
    pub retrieval_top_k: usize,
    pub max_tokens: u32,
    pub retry_max_tokens: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            context_cap: 10,
            min_response_chars: 20,
            retrieval_top_k: 10,
            max_tokens: 2048,
            retry_max_tokens: 4096,
        }
    }
}

impl LoopConfig {
    /// Four stages per pass, `max_retries + 1` passes, one final Generate.
    #[must_use]
    pub fn step_budget(&self) -> u32 {
        4u32.saturating_mul(self.max_retries.saturating_add(1))
            .saturating_add(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Hyde,
    Retrieve,
    Rerank,
    Grade,
    Generate,
}

pub struct GenerationLoop<L, S> {
    llm: FallbackChain<L>,
    source: S,
    config: LoopConfig,
}

impl<L: LlmProvider, S: EvidenceSource> GenerationLoop<L, S> {
    #[must_use]
    pub fn new(llm: FallbackChain<L>, source: S, config: LoopConfig) -> Self {
        Self {
            llm,
            source,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Answer `question`, optionally restricted to `selected_doc_filter`.
    ///
    /// Never fails: retrieval and provider errors end up in `diagnostics`.
    pub async fn run(&self, question: &str, selected_doc_filter: Option<Vec<String>>) -> LoopOutcome {
        let mut state = AgentState::new(question, selected_doc_filter);
        let budget = self.config.step_budget();
        let mut steps = 0u32;
        let mut stage = Stage::Hyde;

        loop {
            if stage != Stage::Generate && steps + 1 >= budget {
                tracing::warn!(steps, budget, ?stage, "step budget reached, generating");
                state.diagnose(format!("step budget of {budget} reached at {stage:?}"));
                stage = Stage::Generate;
            }
            steps += 1;
            tracing::debug!(?stage, step = steps, retry = state.retry_count, "stage");

            stage = match stage {
                Stage::Hyde => {
                    self.hyde(&mut state).await;
                    Stage::Retrieve
                }
                Stage::Retrieve => {
                    self.retrieve(&mut state).await;
                    Stage::Rerank
                }
                Stage::Rerank => {
                    state.documents.truncate(self.config.context_cap);
                    Stage::Grade
                }
                Stage::Grade => {
                    let grade = self.grade(&mut state).await;
                    self.route(grade, &mut state)
                }
                Stage::Generate => {
                    self.generate(&mut state).await;
                    break;
                }
            };
        }

        tracing::info!(
            passes = state.passes,
            retries = state.retry_count,
            relevant = state.is_relevant,
            sources = state.documents.len(),
            "generation loop finished"
        );
        state.into()
    }

    fn route(&self, grade: Grade, state: &mut AgentState) -> Stage {
        match grade {
            Grade::Sufficient => Stage::Generate,
            Grade::Insufficient if state.retry_count >= self.config.max_retries => {
                tracing::debug!(retries = state.retry_count, "retry budget spent");
                Stage::Generate
            }
            Grade::Insufficient => {
                state.retry_count += 1;
                Stage::Hyde
            }
        }
    }

    async fn hyde(&self, state: &mut AgentState) {
        let messages = prompts::hyde(&state.original_question, state.retry_count);
        let options = ChatOptions::with_max_tokens(self.config.max_tokens);
        match self.llm.complete(&messages, &options).await {
            Ok(c) if !c.text.trim().is_empty() => {
                state.question = format!(
                    "Original: {}\nInsight: {}",
                    state.original_question,
                    c.text.trim()
                );
            }
            Ok(c) => {
                state.question.clone_from(&state.original_question);
                state.diagnose(format!("hyde: empty hypothesis from {}", c.served_by()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "hyde failed, using original question");
                state.question.clone_from(&state.original_question);
                state.diagnose(format!("hyde failed: {e}"));
            }
        }
    }

    async fn retrieve(&self, state: &mut AgentState) {
        state.passes += 1;
        let mut request =
            RetrievalRequest::new(state.question.clone()).top_k(self.config.retrieval_top_k);
        if let Some(ids) = &state.selected_doc_filter {
            request = request.filters(SearchFilters::for_documents(ids.clone()));
        }
        match self.source.retrieve(request).await {
            Ok(response) => {
                tracing::debug!(
                    pass = state.passes,
                    found = response.total_found,
                    kept = response.results.len(),
                    "retrieved"
                );
                state.documents = response.results;
            }
            Err(e) => {
                tracing::warn!(pass = state.passes, error = %e, "retrieval failed");
                state.documents.clear();
                state.diagnose(format!("retrieval failed on pass {}: {e}", state.passes));
            }
        }
    }

    async fn grade(&self, state: &mut AgentState) -> Grade {
        if state.documents.is_empty() {
            state.is_relevant = false;
            state.diagnose(format!("no evidence on pass {}", state.passes));
            return Grade::Insufficient;
        }

        let context = state
            .documents
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages = prompts::grade(&context, &state.original_question);
        let grade = match self
            .llm
            .complete(&messages, &ChatOptions::with_max_tokens(GRADE_MAX_TOKENS))
            .await
        {
            Ok(c) => c.text.parse::<Grade>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ambiguous grade, treating as insufficient");
                state.diagnose(format!("pass {}: {e}", state.passes));
                Grade::Insufficient
            }),
            Err(e) => {
                tracing::warn!(error = %e, "grading failed, treating as insufficient");
                state.diagnose(format!("grading failed on pass {}: {e}", state.passes));
                Grade::Insufficient
            }
        };
        state.is_relevant = grade == Grade::Sufficient;
        grade
    }

    async fn generate(&self, state: &mut AgentState) {
        if state.documents.is_empty() {
            state.answer = Some(INSUFFICIENT_INFO_ANSWER.to_owned());
            return;
        }

        let context = format_context(&state.documents);
        let messages = prompts::answer(&context, &state.original_question);
        let first = self
            .llm
            .complete(&messages, &ChatOptions::with_max_tokens(self.config.max_tokens))
            .await;

        let answer = match first {
            Ok(c) => {
                if c.position > 0 {
                    state.diagnose(format!("answer served by fallback {}", c.served_by()));
                }
                if self.is_degenerate(&c.text) {
                    self.retry_degenerate(c.text, &messages, state).await
                } else {
                    c.text
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "answer generation failed");
                state.diagnose(format!("generation failed: {e}"));
                let excerpts = format_context(
                    &state.documents[..state.documents.len().min(DEGRADED_EXCERPTS)],
                );
                annotate(
                    format!("{DEGRADED_ANSWER_PREFIX}\n\n{excerpts}"),
                    &format!("언어 모델 호출 실패 ({e})"),
                )
            }
        };
        state.answer = Some(answer);
    }

    async fn retry_degenerate(
        &self,
        previous: String,
        messages: &[bidwise_llm::Message],
        state: &mut AgentState,
    ) -> String {
        tracing::debug!(
            chars = previous.trim().chars().count(),
            retry_max_tokens = self.config.retry_max_tokens,
            "degenerate answer, retrying"
        );
        let options = ChatOptions::with_max_tokens(self.config.retry_max_tokens);
        let text = match self.llm.complete(messages, &options).await {
            Ok(c) => c.text,
            Err(e) => {
                state.diagnose(format!("degenerate answer retry failed: {e}"));
                previous
            }
        };
        if self.is_degenerate(&text) {
            state.diagnose("answer shorter than minimum after retry");
            annotate(text, "답변이 지나치게 짧습니다")
        } else {
            text
        }
    }

    fn is_degenerate(&self, text: &str) -> bool {
        text.trim().chars().count() < self.config.min_response_chars
    }
}

fn annotate(answer: String, note: &str) -> String {
    let answer = answer.trim_end();
    if answer.is_empty() {
        format!("[진단] {note}")
    } else {
        format!("{answer}\n\n[진단] {note}")
    }
}
