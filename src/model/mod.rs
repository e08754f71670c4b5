//! PDD Data Model
//!
//! Defines the step list and narrative sections produced by the analysis
//! adapter. Both are constructed once at the boundary from the model's
//! loosely-typed JSON response and are immutable afterwards; the frame
//! extractor and document assembler consume them independently.

pub mod schema;

pub use schema::{parse_analysis, AnalysisSchema};

use serde::{Deserialize, Serialize};

/// One observed unit of user action.
///
/// `step_number` is the join key for every downstream artifact (screenshot
/// filename, document subsection, diagram task). The raw input list is not
/// guaranteed sorted or contiguous, so the number is an opaque unique key,
/// never a positional index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Step {
    /// Unique positive step identifier; missing means the step cannot be
    /// extracted or keyed
    pub step_number: Option<u32>,
    /// Short human-readable action summary
    pub description: Option<String>,
    /// Offset from video start; may be negative or past the video end
    pub timestamp_ms: Option<i64>,
    /// Application the action happened in, passed through verbatim
    pub application_in_focus: Option<String>,
    /// Detailed UI interaction description, passed through verbatim
    pub action_type_inferred: Option<String>,
}

impl Step {
    /// Deterministic screenshot filename for this step, if it has a number.
    pub fn screenshot_filename(&self) -> Option<String> {
        self.step_number.map(screenshot_filename)
    }
}

/// Screenshot filename for a step number.
///
/// Shared between the extractor (writer) and assembler (reader) so the two
/// stages never disagree on the key.
pub fn screenshot_filename(step_number: u32) -> String {
    format!("screenshot_step_{step_number}.png")
}

/// An exception/error scenario suggested by the analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessException {
    /// "Business" or "Application"
    pub exception_type: Option<String>,
    pub description: Option<String>,
    pub potential_trigger: Option<String>,
    pub suggested_handling: Option<String>,
}

/// Narrative and structured sections of the PDD.
///
/// Every field is independently nullable; absence of one never blocks
/// rendering of the others.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSections {
    /// Process name inferred by the model
    pub process_name: Option<String>,
    /// Acronym inferred by the model
    pub acronym: Option<String>,
    /// 1.1 Purpose of documenting the process
    pub purpose: Option<String>,
    /// 1.2 Business objectives
    pub objectives: Option<String>,
    /// 1.3.1 Tasks in scope
    pub scope_in: Option<String>,
    /// 1.3.2 Tasks out of scope
    pub scope_out: Option<String>,
    /// 2.0 Functional context
    pub context: Option<String>,
    /// 3.1 As-is flow summary
    pub as_is_summary: Option<String>,
    /// 3.1 User roles inferred from the applications used
    pub user_roles: Vec<String>,
    /// 3.2 Simplified BPMN 2.0 XML for the observed flow
    pub bpmn_xml: Option<String>,
    /// 3.4 Process inputs
    pub inputs: Option<String>,
    /// 3.5 Process outputs
    pub outputs: Option<String>,
    /// 3.6 Business rules
    pub business_rules: Option<String>,
    /// 4.1 To-be summary
    pub to_be_summary: Option<String>,
    /// 4.3 Human interaction points
    pub human_interaction: Option<String>,
    /// 5. Exception scenarios
    pub exceptions: Vec<ProcessException>,
    /// 6.2 Dependencies
    pub dependencies: Option<String>,
    /// 6.4 Reporting/logging suggestions
    pub reporting: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screenshot_filename_is_keyed_by_step_number() {
        assert_eq!(screenshot_filename(7), "screenshot_step_7.png");

        let step = Step {
            step_number: Some(12),
            ..Default::default()
        };
        assert_eq!(
            step.screenshot_filename().as_deref(),
            Some("screenshot_step_12.png")
        );
    }

    #[test]
    fn test_step_without_number_has_no_filename() {
        let step = Step::default();
        assert!(step.screenshot_filename().is_none());
    }

    #[test]
    fn test_sections_default_is_all_absent() {
        let sections = DocumentSections::default();
        assert!(sections.purpose.is_none());
        assert!(sections.bpmn_xml.is_none());
        assert!(sections.user_roles.is_empty());
        assert!(sections.exceptions.is_empty());
    }
}
