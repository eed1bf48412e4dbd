use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// Payload keys shared by the vector and lexical indexes.
pub mod fields {
    pub const CHUNK_ID: &str = "chunk_id";
    pub const DOC_ID: &str = "doc_id";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const TEXT: &str = "text";
    pub const OFFSET_START: &str = "char_offset_start";
    pub const OFFSET_END: &str = "char_offset_end";
    pub const ORGANIZATION: &str = "organization";
    pub const BUSINESS_NAME: &str = "business_name";
    pub const AMOUNT: &str = "amount";
    pub const DEADLINE: &str = "deadline";
    /// Deadline as `YYYYMMDD` integer, for range filters.
    pub const DEADLINE_ORDINAL: &str = "deadline_ordinal";
    pub const SUMMARY: &str = "summary";
    pub const SECTION_NAME: &str = "section_name";
}

const CHUNK_KEYS: [&str; 7] = [
    fields::CHUNK_ID,
    fields::DOC_ID,
    fields::CHUNK_INDEX,
    fields::TEXT,
    fields::OFFSET_START,
    fields::OFFSET_END,
    fields::DEADLINE_ORDINAL,
];

/// Typed RFP metadata. Korean source field names are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, alias = "발주 기관", skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, alias = "사업명", skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(
        default,
        alias = "사업 금액",
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<f64>,
    #[serde(
        default,
        alias = "입찰 참여 마감일",
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<NaiveDate>,
    #[serde(default, alias = "사업 요약", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, alias = "공고 번호", skip_serializing_if = "Option::is_none")]
    pub notice_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_level: Option<u8>,
    /// Passthrough fields without a typed slot.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DocumentMetadata {
    /// Rebuild metadata from an index payload, ignoring chunk bookkeeping keys.
    #[must_use]
    pub fn from_payload(payload: &HashMap<String, serde_json::Value>) -> Self {
        let map: serde_json::Map<String, serde_json::Value> = payload
            .iter()
            .filter(|(k, _)| !CHUNK_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map)).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "payload metadata did not match schema");
            Self::default()
        })
    }

    /// Label used when citing a source.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.business_name
            .as_deref()
            .or(self.notice_number.as_deref())
    }
}

#[must_use]
pub fn deadline_ordinal(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day())
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => parse_amount(&s),
        _ => None,
    })
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => parse_deadline(&s),
        _ => None,
    })
}

/// Parse `"1,200,000"`, `"1200000원"` and similar into a number.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Accepts `YYYY-MM-DD`, `YYYY.MM.DD`, `YYYY/MM/DD`, optionally followed by a time.
#[must_use]
pub fn parse_deadline(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split_whitespace().next()?;
    let normalized: String = date_part
        .trim_end_matches('.')
        .chars()
        .map(|c| if c == '.' || c == '/' { '-' } else { c })
        .collect();
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").ok()
}

/// A preprocessed document ready for chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub doc_id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Atomic retrieval unit. Offsets count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub char_offset_start: usize,
    pub char_offset_end: usize,
    pub metadata: DocumentMetadata,
}

impl Chunk {
    #[must_use]
    pub fn make_id(doc_id: &str, chunk_index: usize) -> String {
        format!("{doc_id}_{chunk_index}")
    }

    /// Deterministic vector-store point id derived from `chunk_id`.
    #[must_use]
    pub fn point_id(&self) -> String {
        uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, self.chunk_id.as_bytes()).to_string()
    }

    /// Flat payload stored next to the vector.
    #[must_use]
    pub fn to_payload(&self) -> HashMap<String, serde_json::Value> {
        use serde_json::Value;

        let mut payload: HashMap<String, Value> = HashMap::new();
        if let Ok(Value::Object(meta)) = serde_json::to_value(&self.metadata) {
            payload.extend(meta);
        }
        if let Some(deadline) = self.metadata.deadline {
            payload.insert(
                fields::DEADLINE_ORDINAL.into(),
                Value::from(deadline_ordinal(deadline)),
            );
        }
        payload.insert(fields::CHUNK_ID.into(), Value::from(self.chunk_id.clone()));
        payload.insert(fields::DOC_ID.into(), Value::from(self.doc_id.clone()));
        payload.insert(fields::CHUNK_INDEX.into(), Value::from(self.chunk_index));
        payload.insert(fields::TEXT.into(), Value::from(self.text.clone()));
        payload.insert(fields::OFFSET_START.into(), Value::from(self.char_offset_start));
        payload.insert(fields::OFFSET_END.into(), Value::from(self.char_offset_end));
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn korean_aliases_deserialize() {
        let meta: DocumentMetadata = serde_json::from_value(json!({
            "발주 기관": "한국연구재단",
            "사업명": "차세대 연구관리시스템 구축",
            "사업 금액": "1,200,000,000",
            "입찰 참여 마감일": "2024-12-31 10:00:00",
            "사업 요약": "연구관리 고도화",
            "공고 번호": "20241201234",
            "파일명": "rfp.hwp"
        }))
        .unwrap();
        assert_eq!(meta.organization.as_deref(), Some("한국연구재단"));
        assert_eq!(meta.business_name.as_deref(), Some("차세대 연구관리시스템 구축"));
        assert_eq!(meta.amount, Some(1_200_000_000.0));
        assert_eq!(meta.deadline, NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(meta.notice_number.as_deref(), Some("20241201234"));
        assert_eq!(meta.extra.get("파일명"), Some(&json!("rfp.hwp")));
    }

    #[test]
    fn unparseable_values_become_none() {
        let meta: DocumentMetadata = serde_json::from_value(json!({
            "amount": "미정",
            "deadline": "추후 공지",
            "organization": null
        }))
        .unwrap();
        assert!(meta.amount.is_none());
        assert!(meta.deadline.is_none());
        assert!(meta.organization.is_none());
    }

    #[test]
    fn serializes_english_keys_and_roundtrips() {
        let meta = DocumentMetadata {
            organization: Some("조달청".into()),
            amount: Some(5.0e8),
            deadline: NaiveDate::from_ymd_opt(2025, 1, 15),
            ..DocumentMetadata::default()
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["organization"], "조달청");
        assert_eq!(value["deadline"], "2025-01-15");
        assert!(value.get("summary").is_none());
        let back: DocumentMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_amount("35,000,000원"), Some(35_000_000.0));
        assert_eq!(parse_amount("없음"), None);
        assert_eq!(parse_deadline("2024.03.05"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(parse_deadline("2024/03/05 18:00"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(parse_deadline(""), None);
        assert_eq!(
            deadline_ordinal(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
            20_240_305
        );
    }

    #[test]
    fn payload_carries_filter_fields() {
        let chunk = Chunk {
            chunk_id: Chunk::make_id("D1", 0),
            doc_id: "D1".into(),
            chunk_index: 0,
            text: "본문".into(),
            char_offset_start: 0,
            char_offset_end: 2,
            metadata: DocumentMetadata {
                organization: Some("조달청".into()),
                deadline: NaiveDate::from_ymd_opt(2024, 12, 31),
                ..DocumentMetadata::default()
            },
        };
        let payload = chunk.to_payload();
        assert_eq!(payload[fields::CHUNK_ID], "D1_0");
        assert_eq!(payload[fields::DEADLINE_ORDINAL], 20_241_231);
        assert_eq!(payload[fields::ORGANIZATION], "조달청");

        let meta = DocumentMetadata::from_payload(&payload);
        assert_eq!(meta, chunk.metadata);
    }

    #[test]
    fn point_id_is_stable_uuid() {
        let chunk = Chunk {
            chunk_id: "D1_3".into(),
            doc_id: "D1".into(),
            chunk_index: 3,
            text: String::new(),
            char_offset_start: 0,
            char_offset_end: 0,
            metadata: DocumentMetadata::default(),
        };
        let id = chunk.point_id();
        assert_eq!(id, chunk.point_id());
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}
