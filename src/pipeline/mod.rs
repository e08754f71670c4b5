//! Pipeline Orchestration
//!
//! Sequences ANALYZE → EXTRACT → ASSEMBLE over one video, with no state
//! re-entry. Analysis and assembly failures are fatal; extraction failures
//! are not, because a document with missing screenshots is still valuable
//! output. Panics anywhere in a stage are caught at this boundary and
//! reported as unexpected pipeline failures.

use crate::analysis::ProcessAnalyzer;
use crate::assemble::{AssemblyReport, DocumentAssembler, OutputPaths};
use crate::extract::{ExtractStats, FrameExtractor, VideoOpener};
use crate::{Error, Result};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Where one run writes its artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// Per-step screenshot directory, owned (reset) by the extractor
    pub screenshot_dir: PathBuf,
    /// Raw analysis response, persisted for standalone phase reuse;
    /// `None` disables the dump
    pub analysis_json: Option<PathBuf>,
    /// Assembler artifact paths
    pub outputs: OutputPaths,
}

/// Artifacts and diagnostics of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub document_path: PathBuf,
    pub diagram_path: Option<PathBuf>,
    pub steps_json_path: Option<PathBuf>,
    pub analysis_json_path: Option<PathBuf>,
    pub screenshot_dir: PathBuf,
    pub extract_stats: ExtractStats,
    pub missing_screenshots: usize,
}

/// The three-stage pipeline, generic over the analysis and video seams.
pub struct Pipeline<A, O = crate::extract::FfmpegOpener> {
    analyzer: A,
    extractor: FrameExtractor<O>,
    assembler: DocumentAssembler,
}

impl<A: ProcessAnalyzer, O: VideoOpener> Pipeline<A, O> {
    pub fn new(analyzer: A, extractor: FrameExtractor<O>, assembler: DocumentAssembler) -> Self {
        Self {
            analyzer,
            extractor,
            assembler,
        }
    }

    /// Run the full pipeline on one video.
    ///
    /// Never panics: stage panics are converted into
    /// [`Error::Unexpected`] so the host process can report them cleanly.
    pub fn run(&self, video_path: &Path, paths: &RunPaths) -> Result<PipelineResult> {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_stages(video_path, paths)
        }));
        match outcome {
            Ok(result) => result,
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                error!("pipeline panicked: {detail}");
                Err(Error::Unexpected(detail))
            }
        }
    }

    fn run_stages(&self, video_path: &Path, paths: &RunPaths) -> Result<PipelineResult> {
        // ANALYZE: fatal on adapter error or unusable structured output
        info!("stage 1/3: analyzing {}", video_path.display());
        let analysis = self.analyzer.analyze(video_path)?;
        if let Some(dump) = &paths.analysis_json {
            match serde_json::to_string_pretty(&analysis.raw) {
                Ok(json) => {
                    if let Err(e) = std::fs::write(dump, json) {
                        warn!("cannot save analysis dump {}: {e}", dump.display());
                    }
                }
                Err(e) => warn!("cannot serialize analysis dump: {e}"),
            }
        }

        // EXTRACT: failures degrade, assembly always runs. Even an
        // unopenable video only costs us the screenshots.
        info!("stage 2/3: extracting screenshots");
        let extract_stats = match self
            .extractor
            .extract(&analysis.steps, video_path, &paths.screenshot_dir)
        {
            Ok(stats) => {
                if !stats.is_success() {
                    warn!(
                        errors = stats.errors,
                        "extraction reported errors, continuing with partial screenshots"
                    );
                }
                stats
            }
            Err(e) => {
                warn!("extraction failed ({e}), continuing without screenshots");
                ExtractStats::default()
            }
        };

        // ASSEMBLE: fatal on document write failure
        info!("stage 3/3: assembling document");
        let assembly: AssemblyReport = self.assembler.assemble(
            &analysis.sections,
            &analysis.steps,
            &paths.screenshot_dir,
            &paths.outputs,
        )?;

        info!("pipeline complete: {}", assembly.document_path.display());
        Ok(PipelineResult {
            document_path: assembly.document_path,
            diagram_path: assembly.diagram_path,
            steps_json_path: assembly.steps_json_path,
            analysis_json_path: paths
                .analysis_json
                .as_ref()
                .filter(|p| p.exists())
                .cloned(),
            screenshot_dir: paths.screenshot_dir.clone(),
            extract_stats,
            missing_screenshots: assembly.missing_screenshots,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A video staged to a temporary file, deleted on every exit path.
///
/// Upload layers hand the pipeline a transient copy of the recording; tying
/// deletion to `Drop` guarantees the file is released even when a run
/// returns early or panics, so repeated runs never leak disk space.
pub struct StagedVideo {
    path: PathBuf,
}

impl StagedVideo {
    /// Write video bytes to a fresh temporary file, preserving the original
    /// extension so decoders can sniff the container.
    pub fn from_bytes(bytes: &[u8], extension: &str) -> Result<Self> {
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension.trim_start_matches('.'))
        };
        let temp = tempfile::Builder::new()
            .prefix("pdd_video_")
            .suffix(&suffix)
            .tempfile()?;
        std::fs::write(temp.path(), bytes)?;
        // Keep the file alive past the handle; Drop on Self removes it
        let (_, path) = temp.keep().map_err(|e| Error::Io(e.error))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedVideo {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("could not remove staged video {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_video_removed_on_drop() {
        let staged = StagedVideo::from_bytes(b"fake video", "mp4").unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert!(path.extension().is_some_and(|e| e == "mp4"));
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_staged_video_removed_on_panic() {
        let path_holder = std::sync::Mutex::new(PathBuf::new());
        let result = std::panic::catch_unwind(|| {
            let staged = StagedVideo::from_bytes(b"fake video", "mkv").unwrap();
            *path_holder.lock().unwrap() = staged.path().to_path_buf();
            panic!("stage blew up");
        });
        assert!(result.is_err());
        // The mutex is poisoned by the panic; the data is still usable
        let path = path_holder
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        assert!(!path.exists(), "staged file must be cleaned up by unwind");
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(&"boom" as &(dyn std::any::Any + Send)), "boom");
        let owned: Box<dyn std::any::Any + Send> = Box::new("oops".to_string());
        assert_eq!(panic_message(owned.as_ref()), "oops");
    }
}
