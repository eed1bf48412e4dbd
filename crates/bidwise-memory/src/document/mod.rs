pub mod chunker;
pub mod error;
pub mod jsonl;
pub mod loader;
pub mod normalize;
pub mod sections;
pub mod types;

pub use chunker::{Chunker, ChunkerConfig};
pub use error::{ChunkError, DocumentError};
pub use loader::PreprocessedLoader;
pub use types::{Chunk, Document, DocumentMetadata};

/// Default maximum preprocessed file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
