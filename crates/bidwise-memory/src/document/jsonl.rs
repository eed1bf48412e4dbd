//! Chunk artifact: one JSON object per line.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use super::{Chunk, DocumentError};

/// Write `chunks` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns an error on IO or serialization failure.
pub async fn write_jsonl(path: &Path, chunks: &[Chunk]) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::new(file);
    for chunk in chunks {
        let line = serde_json::to_string(chunk).map_err(|source| DocumentError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Read chunks from `path`. Blank lines are ignored.
///
/// # Errors
///
/// Returns an error on IO failure or a malformed line (with its 1-based number).
pub async fn read_jsonl(path: &Path) -> Result<Vec<Chunk>, DocumentError> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut chunks = Vec::new();
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let chunk = serde_json::from_str(&line).map_err(|source| DocumentError::Record {
            path: path.to_path_buf(),
            line: line_no,
            source,
        })?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Chunker, ChunkerConfig, DocumentMetadata};

    #[tokio::test]
    async fn written_chunks_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/chunks.jsonl");
        let meta = DocumentMetadata {
            business_name: Some("차세대 시스템 구축".into()),
            deadline: chrono::NaiveDate::from_ymd_opt(2024, 5, 31),
            ..DocumentMetadata::default()
        };
        let chunks = Chunker::new(ChunkerConfig::default())
            .unwrap()
            .chunk(&"가나다라".repeat(400), "D1", &meta);

        write_jsonl(&path, &chunks).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), chunks.len());

        let back = read_jsonl(&path).await.unwrap();
        assert_eq!(back, chunks);
    }

    #[tokio::test]
    async fn line_fields_match_chunk_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.jsonl");
        let chunks = Chunker::new(ChunkerConfig::default())
            .unwrap()
            .chunk("본문", "D", &DocumentMetadata::default());
        write_jsonl(&path, &chunks).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            [
                "char_offset_end",
                "char_offset_start",
                "chunk_id",
                "chunk_index",
                "doc_id",
                "metadata",
                "text"
            ]
        );
    }

    #[tokio::test]
    async fn malformed_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "\n{\"broken\": true}\n").unwrap();

        let err = read_jsonl(&path).await.unwrap_err();
        assert!(matches!(err, DocumentError::Record { line: 2, .. }));
    }
}
