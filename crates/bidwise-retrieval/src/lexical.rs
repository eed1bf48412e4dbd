//! In-process BM25 index over chunk text.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use bidwise_memory::document::jsonl;
use bidwise_memory::vector_store::Payload;
use bidwise_memory::{Chunk, VectorFilter};

use crate::error::Result;
use crate::types::{RetrievalResult, sort_by_score};

const K1: f32 = 1.2;
const B: f32 = 0.75;

struct IndexedChunk {
    result: RetrievalResult,
    payload: Payload,
    len: f32,
}

/// Okapi BM25 (`k1 = 1.2`, `b = 0.75`). Immutable once built; share as `Arc<LexicalIndex>`.
pub struct LexicalIndex {
    chunks: Vec<IndexedChunk>,
    postings: HashMap<String, Vec<(usize, u32)>>,
    avg_len: f32,
}

impl std::fmt::Debug for LexicalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexicalIndex")
            .field("chunks", &self.chunks.len())
            .field("terms", &self.postings.len())
            .finish()
    }
}

impl LexicalIndex {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn build(chunks: &[Chunk]) -> Self {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut indexed = Vec::with_capacity(chunks.len());
        let mut total_len = 0usize;

        for (idx, chunk) in chunks.iter().enumerate() {
            let tokens = tokenize(&chunk.text);
            total_len += tokens.len();

            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.clone()).or_default() += 1;
            }
            for (term, count) in tf {
                postings.entry(term).or_default().push((idx, count));
            }

            let mut payload = chunk.to_payload();
            payload.remove(bidwise_memory::document::types::fields::TEXT);
            indexed.push(IndexedChunk {
                result: RetrievalResult::from_chunk(chunk, 0.0),
                payload,
                len: tokens.len() as f32,
            });
        }

        let avg_len = if indexed.is_empty() {
            0.0
        } else {
            total_len as f32 / indexed.len() as f32
        };
        tracing::debug!(chunks = indexed.len(), terms = postings.len(), "built lexical index");
        Self {
            chunks: indexed,
            postings,
            avg_len,
        }
    }

    /// Build from the chunk JSONL artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be read.
    pub async fn from_jsonl(path: &Path) -> Result<Self> {
        let chunks = jsonl::read_jsonl(path).await?;
        Ok(Self::build(&chunks))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Raw BM25 scores (unnormalized), best first, ties by `chunk_id`.
    /// Chunks without any matching term are omitted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&VectorFilter>,
    ) -> Vec<RetrievalResult> {
        if self.chunks.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let n = self.chunks.len() as f32;
        let allowed: Option<Vec<bool>> = filter.filter(|f| !f.is_empty()).map(|f| {
            self.chunks
                .iter()
                .map(|c| f.matches(&c.payload))
                .collect()
        });

        let mut scores = vec![0.0f32; self.chunks.len()];
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        for term in &terms {
            let Some(posting) = self.postings.get(term) else {
                continue;
            };
            let df = posting.len() as f32;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            for &(idx, tf) in posting {
                if allowed.as_ref().is_some_and(|a| !a[idx]) {
                    continue;
                }
                let tf = tf as f32;
                let norm = 1.0 - B + B * self.chunks[idx].len / self.avg_len.max(f32::EPSILON);
                scores[idx] += idf * (tf * (K1 + 1.0)) / (tf + K1 * norm);
            }
        }

        let mut results: Vec<RetrievalResult> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, s)| *s > 0.0)
            .map(|(idx, score)| RetrievalResult {
                score,
                ..self.chunks[idx].result.clone()
            })
            .collect();
        sort_by_score(&mut results);
        results.truncate(top_k);
        results
    }
}

fn is_hangul(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

/// Lowercased alphanumeric words. Hangul words longer than two syllables also
/// yield syllable bigrams, since Korean compounds are written without spaces.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tokens = Vec::new();
    for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        tokens.push(word.to_owned());
        let chars: Vec<char> = word.chars().collect();
        if chars.len() > 2 && chars.iter().any(|c| is_hangul(*c)) {
            tokens.extend(chars.windows(2).map(|pair| pair.iter().collect::<String>()));
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidwise_memory::{DocumentMetadata, FieldCondition};

    fn chunk(id: &str, doc: &str, text: &str, org: &str) -> Chunk {
        Chunk {
            chunk_id: id.into(),
            doc_id: doc.into(),
            chunk_index: 0,
            text: text.into(),
            char_offset_start: 0,
            char_offset_end: text.chars().count(),
            metadata: DocumentMetadata {
                organization: Some(org.into()),
                ..DocumentMetadata::default()
            },
        }
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("A_0", "A", "정보시스템 구축 사업 보안 요구사항", "조달청"),
            chunk("B_0", "B", "전력 설비 유지보수 용역", "한국전력"),
            chunk("C_0", "C", "보안 관제 보안 점검 용역", "조달청"),
        ]
    }

    #[test]
    fn tokenize_splits_and_adds_hangul_bigrams() {
        let tokens = tokenize("정보시스템 RFP-2024");
        assert!(tokens.contains(&"정보시스템".to_owned()));
        assert!(tokens.contains(&"시스".to_owned()));
        assert!(tokens.contains(&"rfp".to_owned()));
        assert!(tokens.contains(&"2024".to_owned()));
        assert_eq!(tokenize("보안"), ["보안"]);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = LexicalIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.search("보안", 5, None).is_empty());
    }

    #[test]
    fn higher_term_frequency_ranks_first() {
        let index = LexicalIndex::build(&corpus());
        let hits = index.search("보안", 10, None);
        let ids: Vec<_> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, ["C_0", "A_0"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn compound_words_match_through_bigrams() {
        let index = LexicalIndex::build(&corpus());
        let hits = index.search("시스템", 10, None);
        assert_eq!(hits[0].chunk_id, "A_0");
    }

    #[test]
    fn filter_restricts_candidates() {
        let index = LexicalIndex::build(&corpus());
        let filter = VectorFilter {
            must: vec![FieldCondition::text("organization", "한국전력")],
            must_not: vec![],
        };
        let hits = index.search("용역", 10, Some(&filter));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "B_0");
    }

    #[test]
    fn top_k_truncates() {
        let index = LexicalIndex::build(&corpus());
        assert_eq!(index.search("용역 보안", 1, None).len(), 1);
        assert!(index.search("보안", 0, None).is_empty());
    }

    #[test]
    fn search_is_idempotent() {
        let index = LexicalIndex::build(&corpus());
        assert_eq!(index.search("보안 용역", 10, None), index.search("보안 용역", 10, None));
    }

    #[tokio::test]
    async fn loads_from_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.jsonl");
        jsonl::write_jsonl(&path, &corpus()).await.unwrap();
        let index = LexicalIndex::from_jsonl(&path).await.unwrap();
        assert_eq!(index.len(), 3);
    }
}
