//! Document Assembly
//!
//! Produces the run's output artifacts from one input set: the primary
//! Markdown PDD, the optional BPMN diagram, and an optional structured dump
//! of the step list. Each artifact has independent durability: a diagram or
//! dump failure never invalidates an already-written document.

pub mod document_builder;

pub use document_builder::DocumentBuilder;

use crate::model::{DocumentSections, Step};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Caller-supplied document header fields. All free-text, all optional,
/// no cross-field validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMetadata {
    pub project_name: Option<String>,
    pub project_acronym: Option<String>,
    pub author_name: Option<String>,
    pub version: Option<String>,
    pub status: Option<String>,
}

/// Where the assembler writes its artifacts.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    /// Primary document (Markdown)
    pub document: PathBuf,
    /// Diagram artifact (BPMN XML); only written when the analysis
    /// produced BPMN content
    pub diagram: PathBuf,
    /// Optional structured dump of the step list for downstream reuse
    pub steps_json: Option<PathBuf>,
}

/// What the assembler produced.
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub document_path: PathBuf,
    /// `None` when no BPMN was available or its write failed
    pub diagram_path: Option<PathBuf>,
    pub steps_json_path: Option<PathBuf>,
    /// Steps whose screenshot was missing at assembly time
    pub missing_screenshots: usize,
}

/// Assembles the PDD and its companion artifacts.
///
/// None of the inputs are required to be complete; missing narrative fields
/// and missing screenshots degrade to omitted subsections and visible
/// warnings. Only a primary-document write failure is fatal.
pub struct DocumentAssembler {
    metadata: ProjectMetadata,
}

impl DocumentAssembler {
    pub fn new(metadata: ProjectMetadata) -> Self {
        Self { metadata }
    }

    /// Build and write all artifacts.
    ///
    /// Steps are rendered in the list's given order, keyed by step number;
    /// screenshots are looked up in `screenshot_dir` by the shared
    /// deterministic filename.
    pub fn assemble(
        &self,
        sections: &DocumentSections,
        steps: &[Step],
        screenshot_dir: &Path,
        outputs: &OutputPaths,
    ) -> Result<AssemblyReport> {
        let document_dir = outputs.document.parent().unwrap_or_else(|| Path::new(""));
        let mut builder = DocumentBuilder::new();
        let document = builder.build(&self.metadata, sections, steps, screenshot_dir, document_dir);

        if let Some(parent) = outputs.document.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&outputs.document, &document).map_err(|e| {
            Error::Assembly(format!(
                "cannot write document {}: {e}",
                outputs.document.display()
            ))
        })?;
        info!(
            steps = steps.len(),
            missing_screenshots = builder.missing_screenshots(),
            "wrote document {}",
            outputs.document.display()
        );

        let diagram_path = self.write_diagram(sections, &outputs.diagram);
        let steps_json_path = self.write_steps_dump(steps, outputs.steps_json.as_deref());

        Ok(AssemblyReport {
            document_path: outputs.document.clone(),
            diagram_path,
            steps_json_path,
            missing_screenshots: builder.missing_screenshots(),
        })
    }

    /// Write the BPMN XML verbatim when present and XML-shaped. Absence is
    /// not a failure, and a write failure here does not roll back the
    /// document.
    fn write_diagram(&self, sections: &DocumentSections, dest: &Path) -> Option<PathBuf> {
        let xml = sections.bpmn_xml.as_deref()?;
        if !looks_like_xml(xml) {
            warn!("analysis BPMN content is not XML-shaped, skipping diagram artifact");
            return None;
        }
        match std::fs::write(dest, xml) {
            Ok(()) => {
                info!("wrote diagram {}", dest.display());
                Some(dest.to_path_buf())
            }
            Err(e) => {
                warn!("cannot write diagram {}: {e}", dest.display());
                None
            }
        }
    }

    fn write_steps_dump(&self, steps: &[Step], dest: Option<&Path>) -> Option<PathBuf> {
        let dest = dest?;
        let json = match serde_json::to_string_pretty(steps) {
            Ok(json) => json,
            Err(e) => {
                warn!("cannot serialize step list: {e}");
                return None;
            }
        };
        match std::fs::write(dest, json) {
            Ok(()) => {
                info!("wrote step data {}", dest.display());
                Some(dest.to_path_buf())
            }
            Err(e) => {
                warn!("cannot write step data {}: {e}", dest.display());
                None
            }
        }
    }
}

/// Basic presence check only; BPMN content is never validated or repaired
/// beyond this.
fn looks_like_xml(content: &str) -> bool {
    content.trim_start().starts_with('<')
}
