//! Retrieval quality metrics over document ids.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;

use crate::error::{Result, RetrievalError};

#[allow(clippy::cast_precision_loss)]
fn hits_at_k(relevant: &[String], retrieved: &[String], k: usize) -> usize {
    let relevant: HashSet<&str> = relevant.iter().map(String::as_str).collect();
    let top: HashSet<&str> = retrieved.iter().take(k).map(String::as_str).collect();
    top.intersection(&relevant).count()
}

/// Share of relevant documents found in the top `k`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn recall_at_k(relevant: &[String], retrieved: &[String], k: usize) -> f64 {
    let unique: HashSet<&String> = relevant.iter().collect();
    if unique.is_empty() {
        return 0.0;
    }
    hits_at_k(relevant, retrieved, k) as f64 / unique.len() as f64
}

/// Relevant documents in the top `k`, divided by `k`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn precision_at_k(relevant: &[String], retrieved: &[String], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    hits_at_k(relevant, retrieved, k) as f64 / k as f64
}

/// Reciprocal rank of the first relevant document.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mrr(relevant: &[String], retrieved: &[String]) -> f64 {
    retrieved
        .iter()
        .position(|id| relevant.contains(id))
        .map_or(0.0, |rank| 1.0 / (rank + 1) as f64)
}

#[must_use]
pub fn f1_at_k(relevant: &[String], retrieved: &[String], k: usize) -> f64 {
    let p = precision_at_k(relevant, retrieved, k);
    let r = recall_at_k(relevant, retrieved, k);
    if p + r == 0.0 {
        return 0.0;
    }
    2.0 * p * r / (p + r)
}

/// Share of ground-truth sources the answer cited. Zero without ground truth.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn citation_recall(cited: &[String], ground_truth: &[String]) -> f64 {
    let truth: HashSet<&str> = ground_truth.iter().map(String::as_str).collect();
    if truth.is_empty() {
        return 0.0;
    }
    let cited: HashSet<&str> = cited.iter().map(String::as_str).collect();
    cited.intersection(&truth).count() as f64 / truth.len() as f64
}

/// Case-insensitive character similarity between a generated and a reference answer.
#[must_use]
pub fn answer_accuracy(predicted: &str, reference: &str) -> f64 {
    let predicted = predicted.to_lowercase();
    let reference = reference.to_lowercase();
    if predicted.is_empty() && reference.is_empty() {
        return 1.0;
    }
    f64::from(similar::TextDiff::from_chars(predicted.as_str(), reference.as_str()).ratio())
}

/// One line of an evaluation set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvalCase {
    pub query: String,
    pub relevant_doc_ids: Vec<String>,
    /// Reference answer, scored only in answer mode.
    #[serde(default)]
    pub answer: Option<String>,
}

/// Answer-level scores for one case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AnswerScores {
    pub citation_recall: f64,
    /// `None` when the case carries no reference answer.
    pub answer_accuracy: Option<f64>,
}

impl AnswerScores {
    #[must_use]
    pub fn compute(case: &EvalCase, answer: &str, cited: &[String]) -> Self {
        Self {
            citation_recall: citation_recall(cited, &case.relevant_doc_ids),
            answer_accuracy: case
                .answer
                .as_deref()
                .map(|reference| answer_accuracy(answer, reference)),
        }
    }
}

/// Means over an answer-mode run. Accuracy averages only cases with a reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AnswerSummary {
    pub cases: usize,
    pub citation_recall: f64,
    pub answer_accuracy: Option<f64>,
}

impl AnswerSummary {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_cases(scores: &[AnswerScores]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let recall = scores.iter().map(|s| s.citation_recall).sum::<f64>() / scores.len() as f64;
        let accuracies: Vec<f64> = scores.iter().filter_map(|s| s.answer_accuracy).collect();
        let accuracy =
            (!accuracies.is_empty()).then(|| accuracies.iter().sum::<f64>() / accuracies.len() as f64);
        Self {
            cases: scores.len(),
            citation_recall: recall,
            answer_accuracy: accuracy,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CaseScores {
    pub recall: f64,
    pub precision: f64,
    pub mrr: f64,
    pub f1: f64,
}

impl CaseScores {
    #[must_use]
    pub fn compute(relevant: &[String], retrieved: &[String], k: usize) -> Self {
        Self {
            recall: recall_at_k(relevant, retrieved, k),
            precision: precision_at_k(relevant, retrieved, k),
            mrr: mrr(relevant, retrieved),
            f1: f1_at_k(relevant, retrieved, k),
        }
    }
}

/// Averages over an evaluation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvalSummary {
    pub k: usize,
    pub cases: usize,
    pub mean: CaseScores,
    pub mean_latency: Duration,
    pub p95_latency: Duration,
}

impl EvalSummary {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_cases(k: usize, scores: &[CaseScores], latencies: &[Duration]) -> Self {
        let n = scores.len();
        if n == 0 {
            return Self {
                k,
                ..Self::default()
            };
        }
        let mean_of = |f: fn(&CaseScores) -> f64| scores.iter().map(f).sum::<f64>() / n as f64;

        let mut sorted = latencies.to_vec();
        sorted.sort();
        let mean_latency = if sorted.is_empty() {
            Duration::ZERO
        } else {
            sorted.iter().sum::<Duration>() / u32::try_from(sorted.len()).unwrap_or(u32::MAX)
        };
        let p95_latency = sorted
            .get((sorted.len() * 95 / 100).min(sorted.len().saturating_sub(1)))
            .copied()
            .unwrap_or_default();

        Self {
            k,
            cases: n,
            mean: CaseScores {
                recall: mean_of(|s| s.recall),
                precision: mean_of(|s| s.precision),
                mrr: mean_of(|s| s.mrr),
                f1: mean_of(|s| s.f1),
            },
            mean_latency,
            p95_latency,
        }
    }
}

/// Read `{query, relevant_doc_ids}` lines. Blank lines are ignored.
///
/// # Errors
///
/// Returns an error on IO failure or a malformed line.
pub async fn load_eval_set(path: &Path) -> Result<Vec<EvalCase>> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = tokio::io::BufReader::new(file).lines();
    let mut cases = Vec::new();
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let case = serde_json::from_str(&line).map_err(|e| {
            RetrievalError::InvalidRequest(format!("{}:{line_no}: {e}", path.display()))
        })?;
        cases.push(case);
    }
    Ok(cases)
}
