//! Query-facing retrieval API: normalize, filter, search, rerank.

use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bidwise_llm::LlmProvider;
use bidwise_memory::document::normalize::normalize_query;
use serde::Serialize;

use crate::error::{Result, RetrievalError};
use crate::filter::SearchFilters;
use crate::hybrid::{HybridRetriever, HybridWeights};
use crate::lexical::LexicalIndex;
use crate::rerank::Mmr;
use crate::semantic::SemanticSearch;
use crate::types::{RetrievalResult, sort_by_score};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub use_hybrid: bool,
    pub hybrid_alpha: f32,
    pub use_rerank: bool,
    /// MMR diversity: 1.0 is pure relevance.
    pub mmr_lambda: f32,
    /// Candidates fetched per requested result before reranking.
    pub candidate_multiplier: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            use_hybrid: false,
            hybrid_alpha: 0.7,
            use_rerank: true,
            mmr_lambda: 0.5,
            candidate_multiplier: 2,
        }
    }
}

/// Per-call overrides; unset fields fall back to [`RetrievalConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetrievalRequest {
    pub query: String,
    pub top_k: Option<usize>,
    pub filters: Option<SearchFilters>,
    pub use_hybrid: Option<bool>,
    pub use_rerank: Option<bool>,
}

impl RetrievalRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    #[must_use]
    pub fn hybrid(mut self, enabled: bool) -> Self {
        self.use_hybrid = Some(enabled);
        self
    }

    #[must_use]
    pub fn rerank(mut self, enabled: bool) -> Self {
        self.use_rerank = Some(enabled);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResponse {
    /// The normalized query that was searched.
    pub query: String,
    pub results: Vec<RetrievalResult>,
    /// Candidates found before truncation to `top_k`.
    pub total_found: usize,
    pub search_time: Duration,
}

/// Read-only retrieval front end; safe to share across concurrent queries.
pub struct RetrievalAgent<P> {
    semantic: SemanticSearch<P>,
    hybrid: HybridRetriever<P>,
    reranker: Mmr,
    config: RetrievalConfig,
}

impl<P: LlmProvider> RetrievalAgent<P> {
    #[must_use]
    pub fn new(
        semantic: SemanticSearch<P>,
        lexical: Option<Arc<LexicalIndex>>,
        config: RetrievalConfig,
    ) -> Self {
        let hybrid = HybridRetriever::new(
            lexical,
            semantic.clone(),
            HybridWeights::from_alpha(config.hybrid_alpha),
        );
        Self {
            semantic,
            hybrid,
            reranker: Mmr::default(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// # Errors
    ///
    /// Returns an error for `top_k == 0`, or when the selected search path fails.
    pub async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResponse> {
        let started = Instant::now();
        let query = normalize_query(&request.query);
        if query.is_empty() {
            return Ok(RetrievalResponse {
                query,
                results: Vec::new(),
                total_found: 0,
                search_time: started.elapsed(),
            });
        }

        let top_k = request.top_k.unwrap_or(self.config.top_k);
        if top_k == 0 {
            return Err(RetrievalError::InvalidRequest("top_k must be positive".into()));
        }
        let use_hybrid = request.use_hybrid.unwrap_or(self.config.use_hybrid);
        let use_rerank = request.use_rerank.unwrap_or(self.config.use_rerank);
        let filter = request
            .filters
            .as_ref()
            .and_then(SearchFilters::to_vector_filter);
        let fetch = top_k.saturating_mul(self.config.candidate_multiplier.max(1));

        let mut candidates = if use_hybrid {
            self.hybrid.search(&query, fetch, filter.as_ref()).await?
        } else {
            self.semantic.search(&query, fetch, filter.as_ref()).await?
        };
        sort_by_score(&mut candidates);
        let total_found = candidates.len();

        let results = if use_rerank {
            self.reranker
                .rerank(candidates, top_k, self.config.mmr_lambda)
        } else {
            candidates.truncate(top_k);
            candidates
        };

        let search_time = started.elapsed();
        tracing::debug!(
            query = %query,
            hybrid = use_hybrid,
            rerank = use_rerank,
            total_found,
            returned = results.len(),
            elapsed_ms = search_time.as_millis(),
            "retrieval finished"
        );
        Ok(RetrievalResponse {
            query,
            results,
            total_found,
            search_time,
        })
    }
}

/// Render results as numbered context blocks for a prompt.
#[must_use]
pub fn format_context(results: &[RetrievalResult]) -> String {
    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let title = r.metadata.title().unwrap_or(&r.doc_id);
        let section = r.metadata.section_name.as_deref().unwrap_or("-");
        let _ = write!(out, "[문서 {}: {title} / {section}]\n{}", i + 1, r.text);
    }
    out
}
