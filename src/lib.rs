//! # PDD Generator
//!
//! Turns a screen-recording video of a manual business process into a draft
//! Process Description Document (PDD): narrative text, a step list, a
//! simplified BPMN diagram, and per-step screenshots.
//!
//! ## Overview
//!
//! A multimodal model watches the recording and returns a structured step
//! list plus optional narrative sections. This library maps each step's
//! timestamp to a concrete video frame, persists the frames as per-step
//! screenshots, and assembles a Markdown document plus a BPMN artifact from
//! the same step list, degrading gracefully when data is missing.
//!
//! ## Architecture
//!
//! - [`model`]: Step / section data model and lenient boundary parsing
//! - [`analysis`]: Multimodal video analysis adapter
//! - [`extract`]: Timestamp-to-frame mapping and screenshot extraction
//! - [`assemble`]: Document and diagram assembly
//! - [`pipeline`]: Stage orchestration and artifact reporting
//! - [`app`]: CLI and configuration management
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │    Video    │───▶│  Analysis   │───▶│    Frame    │───▶│  Document   │
//! │   (input)   │    │  (adapter)  │    │  Extractor  │    │  Assembler  │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!                                                                 │
//!                                                                 ▼
//!                                               PDD.md + BPMN XML + steps.json
//! ```
//!
//! Data flows one way: video + step list → per-step images → document and
//! diagram artifacts. No stage reads back from a later one.

pub mod analysis;
pub mod app;
pub mod assemble;
pub mod extract;
pub mod model;
pub mod pipeline;

// Re-export commonly used types
pub use analysis::{AnalysisReport, ProcessAnalyzer};
pub use assemble::DocumentAssembler;
pub use extract::{ExtractStats, FrameExtractor};
pub use model::{DocumentSections, Step};
pub use pipeline::{Pipeline, PipelineResult};

/// Result type alias for the PDD generator
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDD generator
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Video analysis error: {0}")]
    Analysis(String),

    #[error("Cannot open video: {0}")]
    VideoOpen(String),

    #[error("Invalid video metadata: {0}")]
    VideoMetadata(String),

    #[error("Frame extraction error: {0}")]
    Extraction(String),

    #[error("Document assembly error: {0}")]
    Assembly(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing expected artifact: {0}")]
    MissingArtifact(String),

    #[error("Unexpected pipeline failure: {0}")]
    Unexpected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
