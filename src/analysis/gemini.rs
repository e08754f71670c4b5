//! Gemini Video Analysis Client
//!
//! Uploads the recording inline (base64) to a Gemini-style
//! `generateContent` REST endpoint together with the PDD extraction prompt,
//! and parses the response into the step list and document sections.

use super::http_retry::send_with_retry;
use super::{clean_model_json, estimate_cost_usd, AnalysisReport, ProcessAnalyzer};
use crate::model::{parse_analysis, AnalysisSchema};
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

/// Environment variable holding the API key when none is configured
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Gemini client configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// REST API base, e.g. `https://generativelanguage.googleapis.com/v1beta`
    pub endpoint: String,
    /// Multimodal model name
    pub model: String,
    /// API key; falls back to `GEMINI_API_KEY` when absent
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling cutoff
    pub top_p: f32,
    /// Top-k sampling cutoff
    pub top_k: u32,
    /// Response token budget
    pub max_output_tokens: u32,
    /// HTTP retry attempts
    pub max_retries: u32,
    /// Request timeout; video uploads are large and slow
    pub timeout_secs: u64,
    /// Expected response shape
    pub schema: AnalysisSchema,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-pro".to_string(),
            api_key: std::env::var(API_KEY_ENV).ok(),
            temperature: 0.5,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 20_000,
            max_retries: 3,
            timeout_secs: 600,
            schema: AnalysisSchema::Composite,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u64,
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: u64,
}

/// Analyzer backed by a Gemini-style REST endpoint.
pub struct GeminiAnalyzer {
    config: GeminiConfig,
    client: Client,
}

impl GeminiAnalyzer {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Analysis(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn request_body(&self, video_bytes: &[u8], mime_type: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: mime_type.to_string(),
                            data: BASE64.encode(video_bytes),
                        }),
                    },
                    Part {
                        text: Some(ANALYSIS_PROMPT.to_string()),
                        inline_data: None,
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }

    fn response_text(response: GenerateResponse) -> Result<String> {
        if let Some(usage) = &response.usage_metadata {
            let cost = estimate_cost_usd(usage.prompt_token_count, usage.candidates_token_count);
            info!(
                input_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                total_tokens = usage.total_token_count,
                "model call used an estimated ${cost:.5}"
            );
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::Analysis("model returned no candidates".to_string()))?;

        let text = candidate
            .content
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text));
        match text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(Error::Analysis(format!(
                "model response was empty or blocked (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ))),
        }
    }
}

impl ProcessAnalyzer for GeminiAnalyzer {
    fn analyze(&self, video_path: &Path) -> Result<AnalysisReport> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            Error::Analysis(format!(
                "no API key configured; set it in the config file or via {API_KEY_ENV}"
            ))
        })?;

        let video_bytes = std::fs::read(video_path).map_err(|e| {
            Error::Analysis(format!("cannot read video {}: {e}", video_path.display()))
        })?;
        let mime_type = video_mime_type(video_path);
        info!(
            bytes = video_bytes.len(),
            mime_type,
            "sending {} for analysis with model {}",
            video_path.display(),
            self.config.model
        );

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model,
            api_key
        );
        let body = self.request_body(&video_bytes, mime_type);

        let response = send_with_retry(
            &self.client,
            |c| c.post(&url).json(&body),
            self.config.max_retries,
            "video analysis",
        )
        .ok_or_else(|| Error::Analysis("model API call failed".to_string()))?;

        let response: GenerateResponse = response
            .json()
            .map_err(|e| Error::Analysis(format!("unparseable API response: {e}")))?;
        let text = Self::response_text(response)?;
        debug!(chars = text.len(), "received model response text");

        let cleaned = clean_model_json(&text)?;
        let raw: Value = serde_json::from_str(cleaned)
            .map_err(|e| Error::Analysis(format!("model output is not valid JSON: {e}")))?;

        let (steps, sections) = parse_analysis(&raw, self.config.schema);
        if steps.is_empty() {
            warn!("analysis produced no detailed steps");
        }
        info!(steps = steps.len(), "analysis complete");

        Ok(AnalysisReport {
            steps,
            sections,
            raw,
        })
    }
}

/// MIME type from the video file extension; the API needs one even when we
/// cannot be sure.
fn video_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        _ => "video/mp4",
    }
}

/// Instructs the model to return one composite JSON object containing the
/// draft PDD sections and the detailed step list.
const ANALYSIS_PROMPT: &str = r#"You are an expert in business process analysis and technical documentation. Analyze the provided screen recording of a manual business process exhaustively and produce a draft for a professional Process Description Document (PDD).

General instructions:
1. Observe every visible action and significant screen change.
2. Infer context and purpose only from what is visible.
3. Output strictly a single valid JSON object: no introductory text, no comments, no markdown fences.
4. For narrative fields, write a concise draft based on the video; return null for any field you cannot usefully infer.

Required JSON structure:

{
  "pdd_metadata_inferred": {
    "process_name_suggestion": "string | null",
    "potential_acronym": "string | null"
  },
  "section_1_1_purpose_text": "string | null",
  "section_1_2_objectives_text": "string | null",
  "section_1_3_1_scope_in_suggestion": "string | null",
  "section_1_3_2_scope_out_suggestion": "string | null",
  "section_2_0_context_text": "string | null",
  "section_3_1_as_is_summary_text": "string | null",
  "section_3_1_user_roles_inferred": ["string"],
  "section_3_2_bpmn_xml_code": "string | null",
  "section_3_3_detailed_steps": [
    {
      "step_number": "integer",
      "description": "string",
      "timestamp_ms": "integer",
      "application_in_focus": "string",
      "action_type_inferred": "string"
    }
  ],
  "section_3_4_inputs_suggestion": "string | null",
  "section_3_5_outputs_suggestion": "string | null",
  "section_3_6_rules_suggestion": "string | null",
  "section_4_1_tobe_summary_suggestion": "string | null",
  "section_4_3_interaction_suggestion": "string | null",
  "section_5_exceptions_suggestions": [
    {
      "exception_type": "string",
      "description": "string",
      "potential_trigger": "string",
      "suggested_handling_idea": "string"
    }
  ],
  "section_6_2_dependencies_suggestion": "string | null",
  "section_6_4_reporting_suggestion": "string | null"
}

Section guidance:
- section_3_3_detailed_steps is the highest priority. step_number is sequential (1, 2, 3...). description is a short action-oriented summary with a clear verb ("Open X", "Click Y", "Enter Z"). timestamp_ms is the key moment as a millisecond offset, as precise as possible. application_in_focus is the main application ("Microsoft Excel", "Google Chrome"), or "Unknown". action_type_inferred is an ultra-detailed interaction description: exact button/menu/link text, visible URLs, typed text, file names. For spreadsheets, always name the exact cell reference, worksheet name, and column header involved.
- section_3_2_bpmn_xml_code must be valid, simplified BPMN 2.0 XML: the XML header, bpmn:definitions with namespaces and a targetNamespace, one bpmn:process, one bpmn:startEvent, one bpmn:userTask per step named from its description with unique ids (Task_1, Task_2...), one bpmn:endEvent, sequence flows connecting start -> tasks -> end, and a bpmndi:BPMNDiagram section with one BPMNShape per element and one BPMNEdge per flow using fixed placeholder coordinates. No collaborations, participants, or lanes.
- section_5_exceptions_suggestions: 2-4 plausible business or application exceptions with trigger and handling idea.
- Remaining narrative fields: brief, clearly speculative drafts for human review.

Prioritize JSON validity and the precision of the detailed steps. Narrative quality is secondary and will be reviewed by a human."#;
