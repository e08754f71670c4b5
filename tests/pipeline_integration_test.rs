//! Pipeline integration tests
//!
//! Exercises the full analyze → extract → assemble sequence with an
//! in-memory analyzer and video, so the tests cover stage wiring and
//! degradation behavior without touching a real model API or decoder.

use pdd_generator::analysis::{AnalysisReport, ProcessAnalyzer};
use pdd_generator::assemble::{DocumentAssembler, OutputPaths, ProjectMetadata};
use pdd_generator::extract::{FrameExtractor, VideoOpener, VideoSource};
use pdd_generator::model::{DocumentSections, Step};
use pdd_generator::pipeline::{Pipeline, RunPaths};
use pdd_generator::{Error, Result};
use std::path::Path;
use tempfile::TempDir;

struct FixedAnalyzer {
    steps: Vec<Step>,
    sections: DocumentSections,
    fail: bool,
}

impl FixedAnalyzer {
    fn with_steps(steps: Vec<Step>) -> Self {
        Self {
            steps,
            sections: DocumentSections::default(),
            fail: false,
        }
    }
}

impl ProcessAnalyzer for FixedAnalyzer {
    fn analyze(&self, _video_path: &Path) -> Result<AnalysisReport> {
        if self.fail {
            return Err(Error::Analysis("model refused the video".to_string()));
        }
        Ok(AnalysisReport {
            steps: self.steps.clone(),
            sections: self.sections.clone(),
            raw: serde_json::json!({"section_3_3_detailed_steps": []}),
        })
    }
}

struct StubVideo {
    fps: f64,
    frame_count: i64,
}

impl VideoSource for StubVideo {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> i64 {
        self.frame_count
    }

    fn read_frame(&mut self, _index: i64, dest: &Path) -> Result<()> {
        std::fs::write(dest, b"png")?;
        Ok(())
    }
}

struct StubOpener {
    fps: f64,
    frame_count: i64,
    fail_open: bool,
}

impl StubOpener {
    fn new(fps: f64, frame_count: i64) -> Self {
        Self {
            fps,
            frame_count,
            fail_open: false,
        }
    }
}

impl VideoOpener for StubOpener {
    type Source = StubVideo;

    fn open(&self, path: &Path) -> Result<StubVideo> {
        if self.fail_open {
            return Err(Error::VideoOpen(format!("cannot open {}", path.display())));
        }
        Ok(StubVideo {
            fps: self.fps,
            frame_count: self.frame_count,
        })
    }
}

fn step(number: u32, timestamp_ms: i64, description: &str) -> Step {
    Step {
        step_number: Some(number),
        description: Some(description.to_string()),
        timestamp_ms: Some(timestamp_ms),
        ..Default::default()
    }
}

fn run_paths(dir: &TempDir) -> RunPaths {
    RunPaths {
        screenshot_dir: dir.path().join("screenshots"),
        analysis_json: Some(dir.path().join("analysis.json")),
        outputs: OutputPaths {
            document: dir.path().join("PDD.md"),
            diagram: dir.path().join("process.bpmn"),
            steps_json: Some(dir.path().join("steps.json")),
        },
    }
}

fn pipeline_with(
    analyzer: FixedAnalyzer,
    opener: StubOpener,
) -> Pipeline<FixedAnalyzer, StubOpener> {
    Pipeline::new(
        analyzer,
        FrameExtractor::with_opener(opener),
        DocumentAssembler::new(ProjectMetadata {
            project_name: Some("Invoice Intake".to_string()),
            author_name: Some("Test Runner".to_string()),
            ..Default::default()
        }),
    )
}

#[test]
fn test_end_to_end_run_produces_all_artifacts() {
    let dir = TempDir::new().unwrap();
    let paths = run_paths(&dir);

    // fps=10, 100 frames: step 1 at 500ms → frame 5; step 2 at 999999ms
    // is far past the end and clamps to frame 99
    let analyzer = FixedAnalyzer::with_steps(vec![
        step(1, 500, "Open the portal"),
        step(2, 999_999, "Download the report"),
    ]);
    let pipeline = pipeline_with(analyzer, StubOpener::new(10.0, 100));

    let result = pipeline.run(Path::new("recording.mp4"), &paths).unwrap();

    assert_eq!(result.extract_stats.extracted, 2);
    assert_eq!(result.extract_stats.skipped, 0);
    assert_eq!(result.extract_stats.errors, 0);
    assert_eq!(result.missing_screenshots, 0);

    assert!(paths.screenshot_dir.join("screenshot_step_1.png").exists());
    assert!(paths.screenshot_dir.join("screenshot_step_2.png").exists());

    let document = std::fs::read_to_string(&result.document_path).unwrap();
    assert!(document.contains("Invoice Intake"));
    assert!(document.contains("#### Step 1"));
    assert!(document.contains("#### Step 2"));
    assert!(document.contains("screenshot_step_1.png"));
    assert!(document.contains("screenshot_step_2.png"));

    assert!(result.analysis_json_path.unwrap().exists());
    let dump = std::fs::read_to_string(result.steps_json_path.unwrap()).unwrap();
    let parsed: Vec<Step> = serde_json::from_str(&dump).unwrap();
    assert_eq!(parsed.len(), 2);
}

#[test]
fn test_empty_step_list_still_yields_document() {
    let dir = TempDir::new().unwrap();
    let paths = run_paths(&dir);

    let pipeline = pipeline_with(
        FixedAnalyzer::with_steps(Vec::new()),
        StubOpener::new(10.0, 100),
    );
    let result = pipeline.run(Path::new("recording.mp4"), &paths).unwrap();

    assert_eq!(result.extract_stats.extracted, 0);
    assert!(result.extract_stats.is_success());
    assert!(result.document_path.exists());
    let document = std::fs::read_to_string(&result.document_path).unwrap();
    assert!(document.contains("### Detailed Steps"));
}

#[test]
fn test_analysis_failure_stops_the_run() {
    let dir = TempDir::new().unwrap();
    let paths = run_paths(&dir);

    let mut analyzer = FixedAnalyzer::with_steps(vec![step(1, 500, "Open the portal")]);
    analyzer.fail = true;
    let pipeline = pipeline_with(analyzer, StubOpener::new(10.0, 100));

    let result = pipeline.run(Path::new("recording.mp4"), &paths);
    assert!(matches!(result, Err(Error::Analysis(_))));
    assert!(!paths.outputs.document.exists());
}

#[test]
fn test_unopenable_video_still_assembles_document() {
    let dir = TempDir::new().unwrap();
    let paths = run_paths(&dir);

    let analyzer = FixedAnalyzer::with_steps(vec![
        step(1, 500, "Open the portal"),
        step(2, 1500, "Log in"),
    ]);
    let mut opener = StubOpener::new(10.0, 100);
    opener.fail_open = true;
    let pipeline = pipeline_with(analyzer, opener);

    let result = pipeline.run(Path::new("recording.mp4"), &paths).unwrap();

    // Extraction produced nothing, but both steps still appear in the
    // document with visible missing-screenshot warnings
    assert_eq!(result.extract_stats.extracted, 0);
    assert_eq!(result.missing_screenshots, 2);
    let document = std::fs::read_to_string(&result.document_path).unwrap();
    assert!(document.contains("#### Step 1"));
    assert!(document.contains("#### Step 2"));
    assert!(document.contains("missing"));
}

#[test]
fn test_partial_step_data_degrades_without_dropping_steps() {
    let dir = TempDir::new().unwrap();
    let paths = run_paths(&dir);

    // Step 2 has no timestamp so it cannot be extracted, but it must still
    // be documented
    let analyzer = FixedAnalyzer::with_steps(vec![
        step(1, 500, "Open the portal"),
        Step {
            step_number: Some(2),
            description: Some("Log in".to_string()),
            ..Default::default()
        },
    ]);
    let pipeline = pipeline_with(analyzer, StubOpener::new(10.0, 100));

    let result = pipeline.run(Path::new("recording.mp4"), &paths).unwrap();

    assert_eq!(result.extract_stats.extracted, 1);
    assert_eq!(result.extract_stats.skipped, 1);
    assert_eq!(result.missing_screenshots, 1);
    let document = std::fs::read_to_string(&result.document_path).unwrap();
    assert!(document.contains("#### Step 2"));
    assert!(document.contains("Log in"));
}

#[test]
fn test_rerun_replaces_previous_screenshots() {
    let dir = TempDir::new().unwrap();
    let paths = run_paths(&dir);

    let first = pipeline_with(
        FixedAnalyzer::with_steps(vec![
            step(1, 500, "Open the portal"),
            step(2, 1500, "Log in"),
            step(3, 2500, "Download"),
        ]),
        StubOpener::new(10.0, 100),
    );
    first.run(Path::new("recording.mp4"), &paths).unwrap();
    assert!(paths.screenshot_dir.join("screenshot_step_3.png").exists());

    // The second analysis only yields one step; the stale screenshots from
    // the first run must be gone afterwards
    let second = pipeline_with(
        FixedAnalyzer::with_steps(vec![step(1, 500, "Open the portal")]),
        StubOpener::new(10.0, 100),
    );
    let result = second.run(Path::new("recording.mp4"), &paths).unwrap();

    assert_eq!(result.extract_stats.extracted, 1);
    assert_eq!(result.extract_stats.cleaned, 3);
    assert!(paths.screenshot_dir.join("screenshot_step_1.png").exists());
    assert!(!paths.screenshot_dir.join("screenshot_step_2.png").exists());
    assert!(!paths.screenshot_dir.join("screenshot_step_3.png").exists());
}

#[test]
fn test_rebased_output_dir_yields_resolvable_screenshot_links() {
    let dir = TempDir::new().unwrap();
    // The layout the CLI produces for `--output-dir out`: everything
    // re-rooted under one base, document next to the screenshot directory
    let base = dir.path().join("out");
    std::fs::create_dir_all(&base).unwrap();
    let paths = RunPaths {
        screenshot_dir: base.join("screenshots_output"),
        analysis_json: None,
        outputs: OutputPaths {
            document: base.join("PDD.md"),
            diagram: base.join("process.bpmn"),
            steps_json: None,
        },
    };

    let pipeline = pipeline_with(
        FixedAnalyzer::with_steps(vec![step(1, 500, "Open the portal")]),
        StubOpener::new(10.0, 100),
    );
    let result = pipeline.run(Path::new("recording.mp4"), &paths).unwrap();
    assert_eq!(result.missing_screenshots, 0);

    let document = std::fs::read_to_string(&result.document_path).unwrap();
    let line = document
        .lines()
        .find(|l| l.starts_with("![Step 1 screenshot]("))
        .expect("embedded screenshot link");
    let link = line
        .trim_start_matches("![Step 1 screenshot](")
        .trim_end_matches(')');

    // A Markdown renderer resolves the link against the document's own
    // directory, so that is where it must point
    let resolved = result.document_path.parent().unwrap().join(link);
    assert!(
        resolved.exists(),
        "link {link} must resolve from the document's directory"
    );
}

#[test]
fn test_step_order_is_preserved_in_document() {
    let dir = TempDir::new().unwrap();
    let paths = run_paths(&dir);

    // The analysis order (3, 1, 2) is authoritative, not numeric order
    let analyzer = FixedAnalyzer::with_steps(vec![
        step(3, 2500, "Download"),
        step(1, 500, "Open the portal"),
        step(2, 1500, "Log in"),
    ]);
    let pipeline = pipeline_with(analyzer, StubOpener::new(10.0, 100));
    let result = pipeline.run(Path::new("recording.mp4"), &paths).unwrap();

    let document = std::fs::read_to_string(&result.document_path).unwrap();
    let pos3 = document.find("#### Step 3").unwrap();
    let pos1 = document.find("#### Step 1").unwrap();
    let pos2 = document.find("#### Step 2").unwrap();
    assert!(pos3 < pos1 && pos1 < pos2);
}

#[test]
fn test_bpmn_and_narrative_sections_land_in_artifacts() {
    let dir = TempDir::new().unwrap();
    let paths = run_paths(&dir);

    let mut analyzer = FixedAnalyzer::with_steps(vec![step(1, 500, "Open the portal")]);
    analyzer.sections = DocumentSections {
        process_name: Some("Quote Download".to_string()),
        purpose: Some("Automate the weekly quote export.".to_string()),
        bpmn_xml: Some("<bpmn:definitions id=\"quote\"/>".to_string()),
        ..Default::default()
    };
    let pipeline = pipeline_with(analyzer, StubOpener::new(10.0, 100));
    let result = pipeline.run(Path::new("recording.mp4"), &paths).unwrap();

    let document = std::fs::read_to_string(&result.document_path).unwrap();
    assert!(document.contains("Automate the weekly quote export."));

    let diagram = result.diagram_path.expect("diagram artifact");
    assert_eq!(
        std::fs::read_to_string(diagram).unwrap(),
        "<bpmn:definitions id=\"quote\"/>"
    );
}
