use super::error::ChunkError;
use super::sections::{Section, detect_sections};
use super::types::{Chunk, Document, DocumentMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    /// Window each detected section separately.
    pub section_aware: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_size: 100,
            section_aware: false,
        }
    }
}

/// Splits text into overlapping character windows.
///
/// Every chunk satisfies `char_offset_end - char_offset_start == text.chars().count()`
/// and the emitted spans cover the input (or each detected section) without gaps.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Validate `config` and clamp the overlap to half a window.
    ///
    /// # Errors
    ///
    /// `ChunkError::InvalidConfig` when `chunk_size` or `min_chunk_size` is zero, or
    /// when `min_chunk_size` exceeds `chunk_size` (windows would skip text).
    pub fn new(mut config: ChunkerConfig) -> Result<Self, ChunkError> {
        if config.chunk_size == 0 {
            return Err(ChunkError::InvalidConfig("chunk_size must be positive".into()));
        }
        if config.min_chunk_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "min_chunk_size must be positive".into(),
            ));
        }
        if config.min_chunk_size > config.chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "min_chunk_size ({}) exceeds chunk_size ({})",
                config.min_chunk_size, config.chunk_size
            )));
        }
        let max_overlap = config.chunk_size / 2;
        if config.chunk_overlap > max_overlap {
            tracing::debug!(
                requested = config.chunk_overlap,
                clamped = max_overlap,
                "clamping chunk overlap"
            );
            config.chunk_overlap = max_overlap;
        }
        Ok(Self { config })
    }

    /// Effective configuration after clamping.
    #[must_use]
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    #[must_use]
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.chunk(&document.text, &document.doc_id, &document.metadata)
    }

    /// Chunk `text` of document `doc_id`, attaching `metadata` to every chunk.
    #[must_use]
    pub fn chunk(&self, text: &str, doc_id: &str, metadata: &DocumentMetadata) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let sections = if self.config.section_aware {
            detect_sections(text)
        } else {
            Vec::new()
        };

        if sections.is_empty() {
            return self
                .windows(chars.len())
                .into_iter()
                .enumerate()
                .map(|(i, (start, end))| make_chunk(&chars, doc_id, i, start, end, metadata.clone()))
                .collect();
        }

        let mut chunks = Vec::new();
        for section in &sections {
            let section_meta = with_section(metadata, section);
            for (start, end) in self.windows(section.end - section.start) {
                let index = chunks.len();
                chunks.push(make_chunk(
                    &chars,
                    doc_id,
                    index,
                    section.start + start,
                    section.start + end,
                    section_meta.clone(),
                ));
            }
        }
        chunks
    }

    /// Window spans over `[0, len)`, with a short tail merged into its predecessor.
    fn windows(&self, len: usize) -> Vec<(usize, usize)> {
        let ChunkerConfig {
            chunk_size,
            chunk_overlap,
            min_chunk_size,
            ..
        } = self.config;

        let mut spans = Vec::new();
        if len == 0 {
            return spans;
        }

        let mut start = 0;
        loop {
            let end = (start + chunk_size).min(len);
            spans.push((start, end));
            if end == len {
                break;
            }
            start = end.saturating_sub(chunk_overlap).max(start + min_chunk_size);
        }

        if spans.len() >= 2
            && let Some(&(last_start, last_end)) = spans.last()
            && last_end - last_start < min_chunk_size
        {
            spans.pop();
            if let Some(prev) = spans.last_mut() {
                prev.1 = last_end;
            }
        }
        spans
    }
}

fn with_section(metadata: &DocumentMetadata, section: &Section) -> DocumentMetadata {
    let mut meta = metadata.clone();
    meta.section_name = Some(section.name.clone());
    meta.section_level = Some(section.level);
    meta
}

fn make_chunk(
    chars: &[char],
    doc_id: &str,
    chunk_index: usize,
    start: usize,
    end: usize,
    metadata: DocumentMetadata,
) -> Chunk {
    Chunk {
        chunk_id: Chunk::make_id(doc_id, chunk_index),
        doc_id: doc_id.to_owned(),
        chunk_index,
        text: chars[start..end].iter().collect(),
        char_offset_start: start,
        char_offset_end: end,
        metadata,
    }
}
