//! Analysis Response Schemas
//!
//! The analysis model has gone through several response-shape iterations:
//! early versions returned a bare JSON array of steps, later ones a composite
//! object keyed by PDD section. One parser handles both, selected by an
//! explicit schema value, with lenient field access throughout: a missing or
//! mistyped optional key defaults to `None`/empty and never errors.

use super::{DocumentSections, ProcessException, Step};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// JSON key holding the detailed step list in the composite schema.
pub const COMPOSITE_STEPS_KEY: &str = "section_3_3_detailed_steps";

/// Shape of the analysis adapter's JSON response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSchema {
    /// A bare JSON array of step objects
    Flat,
    /// A composite object with per-section keys plus the step list
    #[default]
    Composite,
}

/// Parse a raw analysis response into the step list and sections.
///
/// Never fails: unrecognized or missing pieces degrade to empty values so a
/// partially-usable response still drives the rest of the pipeline.
pub fn parse_analysis(raw: &Value, schema: AnalysisSchema) -> (Vec<Step>, DocumentSections) {
    match schema {
        AnalysisSchema::Flat => {
            let steps = parse_steps(raw);
            if steps.is_empty() {
                warn!("flat analysis response contained no steps");
            }
            (steps, DocumentSections::default())
        }
        AnalysisSchema::Composite => {
            let steps = match raw.get(COMPOSITE_STEPS_KEY) {
                Some(list) => parse_steps(list),
                None => {
                    warn!("analysis response is missing '{COMPOSITE_STEPS_KEY}'");
                    Vec::new()
                }
            };
            (steps, parse_sections(raw))
        }
    }
}

/// Parse a JSON array of step objects, skipping non-object entries.
fn parse_steps(value: &Value) -> Vec<Step> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            if item.is_object() {
                Some(parse_step(item))
            } else {
                warn!("skipping non-object step entry: {item}");
                None
            }
        })
        .collect()
}

fn parse_step(item: &Value) -> Step {
    Step {
        step_number: get_u32(item, "step_number"),
        description: get_string(item, "description"),
        timestamp_ms: get_i64(item, "timestamp_ms"),
        application_in_focus: get_string(item, "application_in_focus"),
        action_type_inferred: get_string(item, "action_type_inferred"),
    }
}

fn parse_sections(raw: &Value) -> DocumentSections {
    let metadata = raw.get("pdd_metadata_inferred");

    DocumentSections {
        process_name: metadata.and_then(|m| get_string(m, "process_name_suggestion")),
        acronym: metadata.and_then(|m| get_string(m, "potential_acronym")),
        purpose: get_string(raw, "section_1_1_purpose_text"),
        objectives: get_string(raw, "section_1_2_objectives_text"),
        scope_in: get_string(raw, "section_1_3_1_scope_in_suggestion"),
        scope_out: get_string(raw, "section_1_3_2_scope_out_suggestion"),
        context: get_string(raw, "section_2_0_context_text"),
        as_is_summary: get_string(raw, "section_3_1_as_is_summary_text"),
        user_roles: get_string_list(raw, "section_3_1_user_roles_inferred"),
        bpmn_xml: get_string(raw, "section_3_2_bpmn_xml_code"),
        inputs: get_string(raw, "section_3_4_inputs_suggestion"),
        outputs: get_string(raw, "section_3_5_outputs_suggestion"),
        business_rules: get_string(raw, "section_3_6_rules_suggestion"),
        to_be_summary: get_string(raw, "section_4_1_tobe_summary_suggestion"),
        human_interaction: get_string(raw, "section_4_3_interaction_suggestion"),
        exceptions: parse_exceptions(raw.get("section_5_exceptions_suggestions")),
        dependencies: get_string(raw, "section_6_2_dependencies_suggestion"),
        reporting: get_string(raw, "section_6_4_reporting_suggestion"),
    }
}

fn parse_exceptions(value: Option<&Value>) -> Vec<ProcessException> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| ProcessException {
            exception_type: get_string(item, "exception_type"),
            description: get_string(item, "description"),
            potential_trigger: get_string(item, "potential_trigger"),
            suggested_handling: get_string(item, "suggested_handling_idea"),
        })
        .collect()
}

/// Non-empty string field, or `None`.
fn get_string(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn get_string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Integer field, tolerating float representations (truncated).
fn get_i64(value: &Value, key: &str) -> Option<i64> {
    let field = value.get(key)?;
    field
        .as_i64()
        .or_else(|| field.as_f64().map(|f| f.trunc() as i64))
}

/// Positive integer field; zero, negative, or mistyped values become `None`.
fn get_u32(value: &Value, key: &str) -> Option<u32> {
    get_i64(value, key)
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}
