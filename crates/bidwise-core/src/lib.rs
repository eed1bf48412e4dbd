//! Generation loop, configuration loading, vault and bootstrap.

pub mod agent;
pub mod bootstrap;
pub mod config;
pub mod vault;

pub use agent::{
    AgentState, Confidence, DocumentSummary, EvidenceSource, ExtractionSchema, GenerationLoop,
    Grade, GradeParseError, LoopConfig, LoopOutcome, SectionSummary, Stage, TaskError,
};
pub use config::Config;
