//! Configuration Management
//!
//! One explicit configuration value drives a run: project metadata for the
//! document header, model settings for the analysis call, and artifact
//! paths. No process-wide mutable state.

use crate::analysis::gemini::{GeminiConfig, API_KEY_ENV};
use crate::assemble::{OutputPaths, ProjectMetadata};
use crate::model::AnalysisSchema;
use crate::pipeline::RunPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document header metadata
    pub project: ProjectMetadata,
    /// Analysis model settings
    pub analysis: AnalysisConfig,
    /// Artifact paths
    pub output: OutputConfig,
}

/// Analysis model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// REST API base URL
    pub endpoint: String,
    /// Multimodal model name
    pub model: String,
    /// API key; when unset, `GEMINI_API_KEY` is used
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
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Expected response shape
    pub schema: AnalysisSchema,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let defaults = GeminiConfig::default();
        Self {
            endpoint: defaults.endpoint,
            model: defaults.model,
            api_key: None,
            temperature: defaults.temperature,
            top_p: defaults.top_p,
            top_k: defaults.top_k,
            max_output_tokens: defaults.max_output_tokens,
            max_retries: defaults.max_retries,
            timeout_secs: defaults.timeout_secs,
            schema: defaults.schema,
        }
    }
}

impl AnalysisConfig {
    /// Build the client configuration, resolving the API key from the
    /// environment when not set in the file.
    pub fn to_gemini(&self) -> GeminiConfig {
        GeminiConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key: self
                .api_key
                .clone()
                .or_else(|| std::env::var(API_KEY_ENV).ok()),
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_output_tokens: self.max_output_tokens,
            max_retries: self.max_retries,
            timeout_secs: self.timeout_secs,
            schema: self.schema,
        }
    }
}

/// Artifact path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Per-step screenshot directory
    pub screenshot_dir: PathBuf,
    /// Primary document (Markdown)
    pub document: PathBuf,
    /// Diagram artifact (BPMN XML)
    pub diagram: PathBuf,
    /// Raw analysis response dump
    pub analysis_json: PathBuf,
    /// Structured step-list dump; unset disables it
    pub steps_json: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("screenshots_output"),
            document: PathBuf::from("PDD_Generated_Output.md"),
            diagram: PathBuf::from("Generated_Process.bpmn"),
            analysis_json: PathBuf::from("full_analysis_output.json"),
            steps_json: Some(PathBuf::from("process_steps.json")),
        }
    }
}

impl OutputConfig {
    /// Build run paths, optionally re-rooting every configured path under
    /// `base` (absolute configured paths win over the base, per the usual
    /// join semantics).
    pub fn run_paths(&self, base: Option<&Path>) -> RunPaths {
        let root = |path: &PathBuf| match base {
            Some(base) => base.join(path),
            None => path.clone(),
        };
        RunPaths {
            screenshot_dir: root(&self.screenshot_dir),
            analysis_json: Some(root(&self.analysis_json)),
            outputs: OutputPaths {
                document: root(&self.document),
                diagram: root(&self.diagram),
                steps_json: self.steps_json.as_ref().map(root),
            },
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.analysis.endpoint.trim().is_empty() {
            return Err(crate::Error::Config("endpoint must not be empty".to_string()));
        }
        if self.analysis.model.trim().is_empty() {
            return Err(crate::Error::Config("model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.analysis.temperature) {
            return Err(crate::Error::Config(format!(
                "temperature must be in [0, 2], got {}",
                self.analysis.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.analysis.top_p) {
            return Err(crate::Error::Config(format!(
                "top_p must be in [0, 1], got {}",
                self.analysis.top_p
            )));
        }
        if self.analysis.max_output_tokens == 0 {
            return Err(crate::Error::Config(
                "max_output_tokens must be > 0".to_string(),
            ));
        }
        if self.analysis.timeout_secs == 0 {
            return Err(crate::Error::Config("timeout_secs must be > 0".to_string()));
        }
        Ok(())
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from the default location, or defaults when absent
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<(), crate::Error> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        PathBuf::from("pdd-gen.toml")
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }
}
