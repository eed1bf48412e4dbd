//! Min-max normalized convex fusion of BM25 and vector rankings.

use std::collections::HashMap;
use std::sync::Arc;

use bidwise_llm::LlmProvider;
use bidwise_memory::VectorFilter;

use crate::error::{Result, RetrievalError};
use crate::lexical::LexicalIndex;
use crate::semantic::SemanticSearch;
use crate::types::{RetrievalResult, normalize_scores, sort_by_score};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub vector: f32,
    pub lexical: f32,
}

impl HybridWeights {
    /// `alpha` weights the vector signal, `1 - alpha` the lexical one.
    #[must_use]
    pub fn from_alpha(alpha: f32) -> Self {
        let alpha = alpha.clamp(0.0, 1.0);
        Self {
            vector: alpha,
            lexical: 1.0 - alpha,
        }
    }
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self::from_alpha(0.7)
    }
}

pub struct HybridRetriever<P> {
    lexical: Option<Arc<LexicalIndex>>,
    semantic: SemanticSearch<P>,
    weights: HybridWeights,
}

impl<P: LlmProvider> HybridRetriever<P> {
    #[must_use]
    pub fn new(
        lexical: Option<Arc<LexicalIndex>>,
        semantic: SemanticSearch<P>,
        weights: HybridWeights,
    ) -> Self {
        Self {
            lexical,
            semantic,
            weights,
        }
    }

    /// Fused ranking of up to `top_k` results.
    ///
    /// When one side is unavailable the other side's normalized ranking is
    /// returned as is.
    ///
    /// # Errors
    ///
    /// `RetrievalError::Unavailable` when neither side can serve the query.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 {
            return Err(RetrievalError::InvalidRequest("top_k must be positive".into()));
        }

        let lexical = match self.lexical.as_deref() {
            Some(index) if !index.is_empty() => Some(index.search(query, top_k, filter)),
            _ => None,
        };
        let vector = match self.semantic.search(query, top_k, filter).await {
            Ok(hits) => Some(hits),
            Err(e) => {
                tracing::warn!(error = %e, "vector search failed");
                None
            }
        };

        let mut fused = match (lexical, vector) {
            (None, None) => {
                return Err(RetrievalError::Unavailable(
                    "lexical index not built and vector search failed".into(),
                ));
            }
            (Some(mut only), None) => {
                tracing::warn!("vector search unavailable, using lexical ranking only");
                normalize_scores(&mut only);
                only
            }
            (None, Some(mut only)) => {
                tracing::warn!("lexical index unavailable, using vector ranking only");
                normalize_scores(&mut only);
                only
            }
            (Some(lex), Some(vec)) => fuse(lex, vec, self.weights),
        };

        sort_by_score(&mut fused);
        fused.truncate(top_k);
        Ok(fused)
    }
}

/// Weighted sum of normalized scores; a chunk missing from one list gets 0 there.
#[must_use]
pub fn fuse(
    mut lexical: Vec<RetrievalResult>,
    mut vector: Vec<RetrievalResult>,
    weights: HybridWeights,
) -> Vec<RetrievalResult> {
    normalize_scores(&mut lexical);
    normalize_scores(&mut vector);

    let mut merged: HashMap<String, RetrievalResult> = HashMap::new();
    let mut add = |result: RetrievalResult, weight: f32| {
        let score = result.score * weight;
        merged
            .entry(result.chunk_id.clone())
            .and_modify(|existing| existing.score += score)
            .or_insert(RetrievalResult { score, ..result });
    };
    for r in dedup_best(lexical) {
        add(r, weights.lexical);
    }
    for r in dedup_best(vector) {
        add(r, weights.vector);
    }

    let mut fused: Vec<RetrievalResult> = merged.into_values().collect();
    sort_by_score(&mut fused);
    fused
}

/// Collapse repeated chunk ids within one list, keeping the higher score.
fn dedup_best(results: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
    let mut best: HashMap<String, RetrievalResult> = HashMap::new();
    for r in results {
        match best.get(&r.chunk_id) {
            Some(existing) if existing.score >= r.score => {}
            _ => {
                best.insert(r.chunk_id.clone(), r);
            }
        }
    }
    best.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidwise_memory::DocumentMetadata;

    fn r(id: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk_id: id.into(),
            doc_id: id.split('_').next().unwrap_or_default().into(),
            text: String::new(),
            score,
            metadata: DocumentMetadata::default(),
        }
    }

    #[test]
    fn weights_from_alpha() {
        let w = HybridWeights::from_alpha(0.7);
        assert!((w.vector - 0.7).abs() < 1e-6);
        assert!((w.lexical - 0.3).abs() < 1e-6);
        assert!((HybridWeights::from_alpha(1.5).vector - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fuse_combines_normalized_scores() {
        let lexical = vec![r("a_0", 10.0), r("b_0", 5.0)];
        let vector = vec![r("b_0", 0.9), r("c_0", 0.5)];
        let fused = fuse(lexical, vector, HybridWeights::from_alpha(0.7));

        let score = |id: &str| fused.iter().find(|x| x.chunk_id == id).unwrap().score;
        assert!((score("a_0") - 0.3).abs() < 1e-6);
        assert!((score("b_0") - 0.7).abs() < 1e-6);
        assert!(score("c_0").abs() < 1e-6);
        assert_eq!(fused[0].chunk_id, "b_0");
    }

    #[test]
    fn fuse_keeps_higher_duplicate() {
        let vector = vec![r("a_0", 0.2), r("a_0", 0.8), r("b_0", 0.4)];
        let fused = fuse(vec![], vector, HybridWeights::from_alpha(1.0));
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].chunk_id, "a_0");
    }

    #[test]
    fn fuse_is_deterministic_on_ties() {
        let lexical = vec![r("b_0", 1.0), r("a_0", 1.0)];
        let first = fuse(lexical.clone(), vec![], HybridWeights::default());
        let second = fuse(lexical, vec![], HybridWeights::default());
        assert_eq!(first, second);
        assert_eq!(first[0].chunk_id, "a_0");
    }

    #[test]
    fn fuse_empty_inputs() {
        assert!(fuse(vec![], vec![], HybridWeights::default()).is_empty());
    }
}
