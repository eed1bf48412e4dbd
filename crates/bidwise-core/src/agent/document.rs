//! Single-document tasks: summaries and structured extraction.

use bidwise_llm::{ChatOptions, LlmError, LlmProvider};
use bidwise_retrieval::{RetrievalError, RetrievalRequest, RetrievalResult, SearchFilters};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value, json};

use super::{EvidenceSource, GenerationLoop, prompts};

const DOCUMENT_TOP_K: usize = 20;
const SECTION_TOP_K: usize = 10;
const MAX_KEY_POINTS: usize = 10;

pub type ExtractionSchema = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("no chunks found for document {0}")]
    DocumentNotFound(String),
    #[error("no chunks found for section {section:?} of document {doc_id}")]
    SectionNotFound { doc_id: String, section: String },
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub summary: String,
    /// Bullet lines of the summary.
    pub key_points: Vec<String>,
    pub budget: Option<f64>,
    pub deadline: Option<NaiveDate>,
    pub sources: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionSummary {
    pub doc_id: String,
    pub section_name: String,
    pub summary: String,
    pub sources: usize,
}

/// Budget, deadline, submission method, qualifications and evaluation criteria.
#[must_use]
pub fn default_extraction_schema() -> ExtractionSchema {
    let schema = json!({
        "budget": { "type": "float", "description": "사업 예산 금액 (원)" },
        "deadline": { "type": "datetime", "description": "입찰 참여 마감일" },
        "submission_method": { "type": "string", "description": "제출 방식" },
        "required_qualifications": {
            "type": "array",
            "items": { "type": "string" },
            "description": "필수 자격 요건 리스트"
        },
        "evaluation_criteria": {
            "type": "array",
            "items": { "type": "string" },
            "description": "평가 기준 리스트"
        }
    });
    match schema {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Every schema key present: `[]` for arrays, `null` otherwise.
#[must_use]
pub fn empty_extraction(schema: &ExtractionSchema) -> Map<String, Value> {
    schema
        .iter()
        .map(|(key, spec)| {
            let empty = if spec.get("type").and_then(Value::as_str) == Some("array") {
                Value::Array(Vec::new())
            } else {
                Value::Null
            };
            (key.clone(), empty)
        })
        .collect()
}

impl<L: LlmProvider, S: EvidenceSource> GenerationLoop<L, S> {
    /// Summarize one document from its retrieved chunks.
    ///
    /// # Errors
    ///
    /// Fails when the document has no indexed chunks, retrieval fails or every provider fails.
    pub async fn summarize_document(&self, doc_id: &str) -> Result<DocumentSummary, TaskError> {
        let chunks = self
            .document_chunks(format!("문서 {doc_id}"), doc_id, DOCUMENT_TOP_K)
            .await?;
        let Some(first) = chunks.first() else {
            return Err(TaskError::DocumentNotFound(doc_id.to_owned()));
        };
        let (budget, deadline) = (first.metadata.amount, first.metadata.deadline);

        let summary = self.summarize(&chunks).await?;
        tracing::info!(doc_id, sources = chunks.len(), "document summarized");
        Ok(DocumentSummary {
            doc_id: doc_id.to_owned(),
            key_points: key_points(&summary),
            summary,
            budget,
            deadline,
            sources: chunks.len(),
        })
    }

    /// Summarize the chunks of `doc_id` whose section heading is `section_name`.
    ///
    /// # Errors
    ///
    /// Fails when no retrieved chunk belongs to the section, retrieval fails or every provider fails.
    pub async fn summarize_section(
        &self,
        doc_id: &str,
        section_name: &str,
    ) -> Result<SectionSummary, TaskError> {
        let mut chunks = self
            .document_chunks(
                format!("문서 {doc_id} 섹션 {section_name}"),
                doc_id,
                SECTION_TOP_K,
            )
            .await?;
        chunks.retain(|c| c.metadata.section_name.as_deref() == Some(section_name));
        if chunks.is_empty() {
            return Err(TaskError::SectionNotFound {
                doc_id: doc_id.to_owned(),
                section: section_name.to_owned(),
            });
        }

        let summary = self.summarize(&chunks).await?;
        Ok(SectionSummary {
            doc_id: doc_id.to_owned(),
            section_name: section_name.to_owned(),
            summary,
            sources: chunks.len(),
        })
    }

    /// Extract `schema` fields (the default schema when `None`) as a JSON object.
    ///
    /// A document without chunks or an unparseable reply yields every key
    /// empty. Keys the model omits are filled the same way.
    ///
    /// # Errors
    ///
    /// Fails when retrieval fails or every provider fails.
    pub async fn extract_info(
        &self,
        doc_id: &str,
        schema: Option<&ExtractionSchema>,
    ) -> Result<Map<String, Value>, TaskError> {
        let default_schema;
        let schema = if let Some(schema) = schema {
            schema
        } else {
            default_schema = default_extraction_schema();
            &default_schema
        };
        let mut extracted = empty_extraction(schema);

        let chunks = self
            .document_chunks(format!("문서 {doc_id}"), doc_id, DOCUMENT_TOP_K)
            .await?;
        if chunks.is_empty() {
            tracing::warn!(doc_id, "no chunks to extract from");
            return Ok(extracted);
        }

        let schema_json = serde_json::to_string_pretty(schema).unwrap_or_default();
        let messages = prompts::extraction(&join_texts(&chunks), &schema_json);
        let completion = self
            .llm
            .complete(&messages, &ChatOptions::with_max_tokens(self.config.max_tokens))
            .await?;

        match parse_json_object(&completion.text) {
            Some(parsed) => extracted.extend(parsed),
            None => tracing::warn!(doc_id, "extraction reply is not a JSON object"),
        }
        Ok(extracted)
    }

    async fn document_chunks(
        &self,
        query: String,
        doc_id: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, TaskError> {
        let request = RetrievalRequest::new(query)
            .top_k(top_k)
            .filters(SearchFilters::for_documents(vec![doc_id.to_owned()]));
        let mut results = self.source.retrieve(request).await?.results;
        results.retain(|r| r.doc_id == doc_id);
        Ok(results)
    }

    async fn summarize(&self, chunks: &[RetrievalResult]) -> Result<String, TaskError> {
        let messages = prompts::summary(&join_texts(chunks));
        let completion = self
            .llm
            .complete(&messages, &ChatOptions::with_max_tokens(self.config.max_tokens))
            .await?;
        Ok(completion.text.trim().to_owned())
    }
}

fn join_texts(chunks: &[RetrievalResult]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn key_points(summary: &str) -> Vec<String> {
    summary
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(['-', '•', '*']))
        .map(|line| line.trim_start_matches(['-', '•', '*', ' ']).trim().to_owned())
        .filter(|point| !point.is_empty())
        .take(MAX_KEY_POINTS)
        .collect()
}

/// The whole reply, or the outermost `{...}` span inside it, as an object.
fn parse_json_object(reply: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str(reply.trim()) {
        return Some(map);
    }
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&reply[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
