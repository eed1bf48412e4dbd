use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::normalize::normalize_document_text;
use super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentMetadata};

#[derive(Deserialize)]
struct PreprocessedFile {
    #[serde(default, alias = "content")]
    text: String,
    #[serde(default)]
    metadata: DocumentMetadata,
}

/// Loads preprocessed `*.json` RFP documents (`{"text": ..., "metadata": {...}}`).
pub struct PreprocessedLoader {
    pub max_file_size: u64,
}

impl Default for PreprocessedLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl PreprocessedLoader {
    /// Load a single file. Returns `None` when its normalized text is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, too large or not valid JSON.
    pub async fn load_file(&self, path: &Path) -> Result<Option<Document>, DocumentError> {
        let meta = tokio::fs::metadata(path).await?;
        if meta.len() > self.max_file_size {
            return Err(DocumentError::FileTooLarge(meta.len()));
        }

        let raw = tokio::fs::read_to_string(path).await?;
        let file: PreprocessedFile =
            serde_json::from_str(&raw).map_err(|source| DocumentError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let text = normalize_document_text(&file.text);
        if text.is_empty() {
            tracing::warn!(path = %path.display(), "skipping document with empty text");
            return Ok(None);
        }

        let doc_id = file
            .metadata
            .notice_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_owned)
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "document".to_owned());

        Ok(Some(Document {
            doc_id,
            text,
            metadata: file.metadata,
        }))
    }

    /// Load every `*.json` file in `dir`, sorted by file name.
    ///
    /// Files that fail to parse are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or holds no usable documents.
    pub async fn load_dir(&self, dir: &Path) -> Result<Vec<Document>, DocumentError> {
        let mut paths: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in &paths {
            match self.load_file(path).await {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => {}
                Err(e) => tracing::error!(path = %path.display(), error = %e, "failed to load document"),
            }
        }

        if documents.is_empty() {
            return Err(DocumentError::Empty(dir.to_path_buf()));
        }
        tracing::info!(dir = %dir.display(), count = documents.len(), "loaded documents");
        Ok(documents)
    }
}
