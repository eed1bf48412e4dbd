use bidwise_memory::document::types::fields;
use bidwise_memory::vector_store::Payload;
use bidwise_memory::{Chunk, DocumentMetadata};
use serde::Serialize;

/// One retrieved chunk. `score` is in `[0, 1]` once normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub doc_id: String,
    pub text: String,
    pub score: f32,
    pub metadata: DocumentMetadata,
}

impl RetrievalResult {
    #[must_use]
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            doc_id: chunk.doc_id.clone(),
            text: chunk.text.clone(),
            score,
            metadata: chunk.metadata.clone(),
        }
    }

    /// Rebuild from a vector-store payload. Returns `None` without a `chunk_id`.
    #[must_use]
    pub fn from_payload(payload: &Payload, score: f32) -> Option<Self> {
        let field = |key: &str| {
            payload
                .get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        };
        Some(Self {
            chunk_id: field(fields::CHUNK_ID)?,
            doc_id: field(fields::DOC_ID).unwrap_or_default(),
            text: field(fields::TEXT).unwrap_or_default(),
            score,
            metadata: DocumentMetadata::from_payload(payload),
        })
    }
}

/// Min-max normalize scores into `[0, 1]`. A constant set maps to 1.0.
pub fn normalize_scores(results: &mut [RetrievalResult]) {
    let Some(first) = results.first() else {
        return;
    };
    let (min, max) = results
        .iter()
        .fold((first.score, first.score), |(lo, hi), r| {
            (lo.min(r.score), hi.max(r.score))
        });
    let range = max - min;
    for r in results.iter_mut() {
        r.score = if range > f32::EPSILON {
            (r.score - min) / range
        } else {
            1.0
        };
    }
}

/// Score descending, ties by `chunk_id`.
pub fn sort_by_score(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk_id: id.into(),
            doc_id: "D".into(),
            text: String::new(),
            score,
            metadata: DocumentMetadata::default(),
        }
    }

    #[test]
    fn normalize_maps_to_unit_interval() {
        let mut rs = vec![result("a", 2.0), result("b", 4.0), result("c", 3.0)];
        normalize_scores(&mut rs);
        let scores: Vec<_> = rs.iter().map(|r| r.score).collect();
        assert_eq!(scores, [0.0, 1.0, 0.5]);
    }

    #[test]
    fn normalize_constant_set_is_one() {
        let mut rs = vec![result("a", 0.3), result("b", 0.3)];
        normalize_scores(&mut rs);
        assert!(rs.iter().all(|r| (r.score - 1.0).abs() < f32::EPSILON));
    }

    #[test]
    fn normalize_empty_is_noop() {
        normalize_scores(&mut []);
    }

    #[test]
    fn sort_breaks_ties_by_chunk_id() {
        let mut rs = vec![result("b", 0.5), result("c", 0.9), result("a", 0.5)];
        sort_by_score(&mut rs);
        let ids: Vec<_> = rs.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn from_payload_requires_chunk_id() {
        let chunk = Chunk {
            chunk_id: "D_0".into(),
            doc_id: "D".into(),
            chunk_index: 0,
            text: "본문".into(),
            char_offset_start: 0,
            char_offset_end: 2,
            metadata: DocumentMetadata {
                organization: Some("조달청".into()),
                ..DocumentMetadata::default()
            },
        };
        let payload = chunk.to_payload();
        let r = RetrievalResult::from_payload(&payload, 0.7).unwrap();
        assert_eq!(r, RetrievalResult::from_chunk(&chunk, 0.7));

        assert!(RetrievalResult::from_payload(&Payload::new(), 1.0).is_none());
    }
}
