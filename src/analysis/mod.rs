//! Video Analysis Adapter
//!
//! Wraps the call to an external multimodal model that watches the screen
//! recording and returns a structured step list plus optional narrative and
//! BPMN sections. The model's output is treated as a best-effort source:
//! fenced or prefixed JSON is cleaned up before parsing, and missing
//! optional keys default to empty rather than erroring.

pub mod gemini;
pub mod http_retry;

pub use gemini::{GeminiAnalyzer, GeminiConfig};

use crate::model::{DocumentSections, Step};
use crate::{Error, Result};
use std::path::Path;

/// Parsed output of one analysis call.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Detailed steps in the model's order; may be empty
    pub steps: Vec<Step>,
    /// Narrative/BPMN sections, each independently optional
    pub sections: DocumentSections,
    /// The raw parsed response, persisted for standalone phase reuse
    pub raw: serde_json::Value,
}

/// The analysis seam the orchestrator depends on.
pub trait ProcessAnalyzer {
    /// Analyze a video and return the structured result, or a classified
    /// failure when the model call fails or yields nothing structured.
    fn analyze(&self, video_path: &Path) -> Result<AnalysisReport>;
}

/// Strip Markdown code fences and leading prose from a model response,
/// returning the JSON-looking remainder.
///
/// Models asked for bare JSON still frequently wrap it in ```json fences or
/// prefix it with commentary; tolerate both.
pub fn clean_model_json(raw: &str) -> Result<&str> {
    let mut text = raw.trim();

    for fence in ["```json", "```"] {
        if let Some(stripped) = text.strip_prefix(fence) {
            text = stripped.trim();
            if let Some(stripped) = text.strip_suffix("```") {
                text = stripped.trim();
            }
            break;
        }
    }

    if text.starts_with('{') || text.starts_with('[') {
        return Ok(text);
    }

    // Scan forward to the first JSON opener, whichever comes first
    let object = text.find('{');
    let array = text.find('[');
    let start = match (object, array) {
        (Some(o), Some(a)) => Some(o.min(a)),
        (o, a) => o.or(a),
    };
    match start {
        Some(idx) => Ok(&text[idx..]),
        None => Err(Error::Analysis(
            "model response does not contain a JSON object or array".to_string(),
        )),
    }
}

// Tiered per-million-token prices (USD); the higher tier applies past the
// token threshold
const TOKEN_THRESHOLD: u64 = 200_000;
const INPUT_RATE_LOW: f64 = 1.25;
const INPUT_RATE_HIGH: f64 = 2.50;
const OUTPUT_RATE_LOW: f64 = 10.00;
const OUTPUT_RATE_HIGH: f64 = 15.00;
const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Estimated cost of a model call from its token usage.
pub fn estimate_cost_usd(input_tokens: u64, output_tokens: u64) -> f64 {
    let input_rate = if input_tokens <= TOKEN_THRESHOLD {
        INPUT_RATE_LOW
    } else {
        INPUT_RATE_HIGH
    };
    let output_rate = if output_tokens <= TOKEN_THRESHOLD {
        OUTPUT_RATE_LOW
    } else {
        OUTPUT_RATE_HIGH
    };
    (input_tokens as f64 / TOKENS_PER_MILLION) * input_rate
        + (output_tokens as f64 / TOKENS_PER_MILLION) * output_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_passes_bare_json_through() {
        assert_eq!(clean_model_json("{\"a\": 1}").unwrap(), "{\"a\": 1}");
        assert_eq!(clean_model_json("  [1, 2]  ").unwrap(), "[1, 2]");
    }

    #[test]
    fn test_clean_strips_json_fence() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(clean_model_json(raw).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_strips_plain_fence() {
        let raw = "```\n[1]\n```";
        assert_eq!(clean_model_json(raw).unwrap(), "[1]");
    }

    #[test]
    fn test_clean_skips_leading_prose() {
        let raw = "Here is the analysis you asked for:\n{\"a\": 1}";
        assert_eq!(clean_model_json(raw).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_prefers_earliest_opener() {
        let raw = "noise [1, {\"a\": 2}]";
        assert_eq!(clean_model_json(raw).unwrap(), "[1, {\"a\": 2}]");
    }

    #[test]
    fn test_clean_rejects_json_free_text() {
        assert!(matches!(
            clean_model_json("I cannot analyze this video."),
            Err(Error::Analysis(_))
        ));
    }

    #[test]
    fn test_cost_uses_low_tier_under_threshold() {
        let cost = estimate_cost_usd(100_000, 10_000);
        let expected = 0.1 * INPUT_RATE_LOW + 0.01 * OUTPUT_RATE_LOW;
        assert!((cost - expected).abs() < 1e-9);
    }

    #[test]
    fn test_cost_uses_high_tier_over_threshold() {
        let cost = estimate_cost_usd(300_000, 250_000);
        let expected = 0.3 * INPUT_RATE_HIGH + 0.25 * OUTPUT_RATE_HIGH;
        assert!((cost - expected).abs() < 1e-9);
    }
}
