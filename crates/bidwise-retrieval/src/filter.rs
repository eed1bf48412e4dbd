//! Caller-facing metadata filters and their translation into store predicates.

use bidwise_memory::document::types::{deadline_ordinal, fields};
use bidwise_memory::{FieldCondition, VectorFilter};
use chrono::NaiveDate;
use serde::Deserialize;

const MAX_FUZZY_MATCHES: usize = 10;

/// Metadata constraints for a retrieval request. Every set field must hold.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchFilters {
    pub organization: Option<String>,
    pub business_name: Option<String>,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
    pub deadline_from: Option<NaiveDate>,
    pub deadline_to: Option<NaiveDate>,
    /// Restrict to these documents.
    pub doc_ids: Option<Vec<String>>,
}

impl SearchFilters {
    #[must_use]
    pub fn for_documents(doc_ids: Vec<String>) -> Self {
        Self {
            doc_ids: Some(doc_ids),
            ..Self::default()
        }
    }

    /// `None` when no constraint is set.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_vector_filter(&self) -> Option<VectorFilter> {
        let mut must = Vec::new();

        if let Some(org) = non_blank(self.organization.as_deref()) {
            must.push(FieldCondition::text(fields::ORGANIZATION, org));
        }
        if let Some(name) = non_blank(self.business_name.as_deref()) {
            must.push(FieldCondition::text(fields::BUSINESS_NAME, name));
        }
        if self.amount_min.is_some() || self.amount_max.is_some() {
            must.push(FieldCondition::range(
                fields::AMOUNT,
                self.amount_min,
                self.amount_max,
            ));
        }
        if self.deadline_from.is_some() || self.deadline_to.is_some() {
            must.push(FieldCondition::range(
                fields::DEADLINE_ORDINAL,
                self.deadline_from.map(|d| deadline_ordinal(d) as f64),
                self.deadline_to.map(|d| deadline_ordinal(d) as f64),
            ));
        }
        if let Some(ids) = &self.doc_ids {
            must.push(FieldCondition::any_of(fields::DOC_ID, ids.clone()));
        }

        (!must.is_empty()).then(|| VectorFilter {
            must,
            must_not: Vec::new(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Known organization names whose character similarity to `query` reaches
/// `threshold`, best match first.
#[must_use]
pub fn fuzzy_match_organization(query: &str, known: &[String], threshold: f32) -> Vec<String> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(f32, &String)> = known
        .iter()
        .map(|name| (similar::TextDiff::from_chars(query, name.as_str()).ratio(), name))
        .filter(|(ratio, _)| *ratio >= threshold)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_FUZZY_MATCHES)
        .map(|(_, name)| name.clone())
        .collect()
}

/// Every whitespace keyword of `query` occurs in `name`, ignoring case.
#[must_use]
pub fn match_business_name(query: &str, name: &str) -> bool {
    let name = name.to_lowercase();
    query
        .to_lowercase()
        .split_whitespace()
        .all(|keyword| name.contains(keyword))
}
