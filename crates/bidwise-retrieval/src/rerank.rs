//! Maximal marginal relevance reranking.

use std::collections::HashSet;

use crate::types::RetrievalResult;

/// Pairwise text similarity in `[0, 1]`.
pub trait Similarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f32;
}

/// Token Jaccard over lowercase whitespace tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jaccard;

impl Similarity for Jaccard {
    fn similarity(&self, a: &str, b: &str) -> f32 {
        jaccard(&token_set(a), &token_set(b))
    }
}

fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

#[allow(clippy::cast_precision_loss)]
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

#[derive(Debug, Clone, Default)]
pub struct Mmr<S = Jaccard> {
    similarity: S,
}

impl<S: Similarity> Mmr<S> {
    #[must_use]
    pub fn with_similarity(similarity: S) -> Self {
        Self { similarity }
    }

    /// Select up to `top_k` results trading relevance against redundancy.
    ///
    /// `diversity` is clamped to `[0, 1]`; `1.0` keeps pure relevance order.
    /// The first pick is always the highest-scoring result. Ties go to the
    /// earlier input position and repeated `chunk_id`s are dropped.
    #[must_use]
    pub fn rerank(
        &self,
        results: Vec<RetrievalResult>,
        top_k: usize,
        diversity: f32,
    ) -> Vec<RetrievalResult> {
        let diversity = diversity.clamp(0.0, 1.0);
        let mut pool: Vec<Option<RetrievalResult>> = results.into_iter().map(Some).collect();
        let mut selected: Vec<RetrievalResult> = Vec::with_capacity(top_k.min(pool.len()));
        let mut selected_ids: HashSet<String> = HashSet::new();

        while selected.len() < top_k {
            let mut best: Option<(usize, f32)> = None;
            for (idx, slot) in pool.iter_mut().enumerate() {
                let Some(candidate) = slot else { continue };
                if selected_ids.contains(&candidate.chunk_id) {
                    *slot = None;
                    continue;
                }
                let value = if selected.is_empty() {
                    candidate.score
                } else {
                    let max_sim = selected
                        .iter()
                        .map(|s| self.similarity.similarity(&candidate.text, &s.text))
                        .fold(0.0f32, f32::max);
                    diversity * candidate.score - (1.0 - diversity) * max_sim
                };
                if best.is_none_or(|(_, v)| value > v) {
                    best = Some((idx, value));
                }
            }
            let Some((idx, _)) = best else { break };
            if let Some(pick) = pool[idx].take() {
                selected_ids.insert(pick.chunk_id.clone());
                selected.push(pick);
            }
        }
        selected
    }
}
