//! Frame Extraction
//!
//! Maps each step's timestamp to a concrete video frame and persists it as a
//! per-step screenshot. Owns the output directory for the duration of a run:
//! the directory is cleared and repopulated on every call, so repeated runs
//! never accumulate stale images from a previous step list.

pub mod video;

pub use video::{FfmpegOpener, FfmpegVideo, VideoOpener, VideoSource};

use crate::model::{screenshot_filename, Step};
use crate::{Error, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Per-run extraction counters.
///
/// `skipped` covers steps missing required fields (routine partial data);
/// `errors` covers hard decode/save failures. Only the latter makes the run
/// unsuccessful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Screenshots successfully written
    pub extracted: usize,
    /// Steps skipped for missing step_number or timestamp_ms
    pub skipped: usize,
    /// Hard decode/save failures
    pub errors: usize,
    /// Stale entries removed from the output directory
    pub cleaned: usize,
    /// Stale entries that could not be removed
    pub clean_errors: usize,
}

impl ExtractStats {
    /// A run succeeds when no step produced a hard error; skips alone do
    /// not fail a run.
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }
}

/// Map a step timestamp to a frame index, clamped to the valid range.
///
/// Out-of-range timestamps are clamped rather than rejected so an imprecise
/// upstream timestamp still yields some representative frame.
pub fn map_timestamp_to_frame(timestamp_ms: i64, fps: f64, total_frames: i64) -> i64 {
    raw_frame_index(timestamp_ms, fps).clamp(0, total_frames - 1)
}

/// Unclamped frame index for a timestamp; may fall outside the video.
fn raw_frame_index(timestamp_ms: i64, fps: f64) -> i64 {
    ((timestamp_ms as f64 / 1000.0) * fps).floor() as i64
}

/// Extracts one screenshot per usable step from a video.
///
/// Generic over the [`VideoOpener`] seam; production code uses
/// [`FfmpegOpener`], tests substitute an in-memory fake.
pub struct FrameExtractor<O = FfmpegOpener> {
    opener: O,
}

impl FrameExtractor<FfmpegOpener> {
    /// Extractor backed by ffmpeg/ffprobe subprocesses.
    pub fn new() -> Self {
        Self {
            opener: FfmpegOpener::default(),
        }
    }
}

impl Default for FrameExtractor<FfmpegOpener> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: VideoOpener> FrameExtractor<O> {
    /// Extractor with a custom video opener.
    pub fn with_opener(opener: O) -> Self {
        Self { opener }
    }

    /// Extract one screenshot per step into `output_dir`.
    ///
    /// The directory is created if absent and fully cleared first. An
    /// unopenable video or unusable fps/frame-count metadata is fatal
    /// (`Err`); per-step failures are counted in the returned stats and
    /// never abort the loop. An empty step list is vacuously successful.
    pub fn extract(
        &self,
        steps: &[Step],
        video_path: &Path,
        output_dir: &Path,
    ) -> Result<ExtractStats> {
        let mut stats = ExtractStats::default();

        std::fs::create_dir_all(output_dir).map_err(|e| {
            Error::Extraction(format!(
                "cannot create output directory {}: {e}",
                output_dir.display()
            ))
        })?;
        reset_output_dir(output_dir, &mut stats)?;

        if steps.is_empty() {
            info!("no steps to process, extraction is vacuously complete");
            return Ok(stats);
        }

        let mut source = self.opener.open(video_path)?;
        let fps = source.fps();
        let total_frames = source.frame_count();
        info!(
            fps,
            total_frames,
            steps = steps.len(),
            "extracting screenshots from {}",
            video_path.display()
        );

        for step in steps {
            let (step_number, timestamp_ms) = match (step.step_number, step.timestamp_ms) {
                (Some(n), Some(ts)) => (n, ts),
                _ => {
                    debug!(
                        step_number = ?step.step_number,
                        "skipping step with missing step_number or timestamp_ms"
                    );
                    stats.skipped += 1;
                    continue;
                }
            };

            let raw_target = raw_frame_index(timestamp_ms, fps);
            let target = map_timestamp_to_frame(timestamp_ms, fps, total_frames);
            if raw_target != target {
                warn!(
                    step_number,
                    timestamp_ms,
                    raw_target,
                    clamped = target,
                    "timestamp outside video bounds, using nearest valid frame"
                );
            }

            let dest = output_dir.join(screenshot_filename(step_number));
            match source.read_frame(target, &dest) {
                Ok(()) => {
                    debug!(step_number, frame = target, "saved {}", dest.display());
                    stats.extracted += 1;
                }
                Err(e) => {
                    warn!(step_number, frame = target, "frame extraction failed: {e}");
                    stats.errors += 1;
                }
            }
        }
        // `source` dropped here releases the decoder on every path

        info!(
            extracted = stats.extracted,
            skipped = stats.skipped,
            errors = stats.errors,
            "extraction finished"
        );
        Ok(stats)
    }
}

/// Remove every existing entry (files and subdirectories) from the output
/// directory. Individual removal failures are logged and counted but do not
/// abort the run; failing to list the directory at all does.
fn reset_output_dir(output_dir: &Path, stats: &mut ExtractStats) -> Result<()> {
    let entries = std::fs::read_dir(output_dir).map_err(|e| {
        Error::Extraction(format!(
            "cannot read output directory {}: {e}",
            output_dir.display()
        ))
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match removed {
            Ok(()) => stats.cleaned += 1,
            Err(e) => {
                warn!("could not remove stale entry {}: {e}", path.display());
                stats.clean_errors += 1;
            }
        }
    }

    if stats.cleaned > 0 || stats.clean_errors > 0 {
        debug!(
            cleaned = stats.cleaned,
            clean_errors = stats.clean_errors,
            "cleared previous run's output"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// In-memory video: a fixed fps/frame count, with a set of frame
    /// indices that fail to decode.
    struct FakeVideo {
        fps: f64,
        frame_count: i64,
        failing_frames: Vec<i64>,
        reads: RefCell<Vec<i64>>,
    }

    impl VideoSource for FakeVideo {
        fn fps(&self) -> f64 {
            self.fps
        }

        fn frame_count(&self) -> i64 {
            self.frame_count
        }

        fn read_frame(&mut self, index: i64, dest: &Path) -> Result<()> {
            self.reads.borrow_mut().push(index);
            if self.failing_frames.contains(&index) {
                return Err(Error::Extraction(format!("decode failure at {index}")));
            }
            std::fs::write(dest, b"png")?;
            Ok(())
        }
    }

    struct FakeOpener {
        fps: f64,
        frame_count: i64,
        failing_frames: Vec<i64>,
        fail_open: bool,
    }

    impl FakeOpener {
        fn new(fps: f64, frame_count: i64) -> Self {
            Self {
                fps,
                frame_count,
                failing_frames: Vec::new(),
                fail_open: false,
            }
        }
    }

    impl VideoOpener for FakeOpener {
        type Source = FakeVideo;

        fn open(&self, path: &Path) -> Result<FakeVideo> {
            if self.fail_open {
                return Err(Error::VideoOpen(format!("cannot open {}", path.display())));
            }
            Ok(FakeVideo {
                fps: self.fps,
                frame_count: self.frame_count,
                failing_frames: self.failing_frames.clone(),
                reads: RefCell::new(Vec::new()),
            })
        }
    }

    fn step(number: u32, timestamp_ms: i64) -> Step {
        Step {
            step_number: Some(number),
            timestamp_ms: Some(timestamp_ms),
            ..Default::default()
        }
    }

    #[test]
    fn test_clamp_above_range_uses_last_frame() {
        // fps=30, 900 frames (30s video): 40s timestamp → raw 1200 → 899
        assert_eq!(map_timestamp_to_frame(40_000, 30.0, 900), 899);
    }

    #[test]
    fn test_clamp_below_range_uses_first_frame() {
        assert_eq!(map_timestamp_to_frame(-500, 30.0, 900), 0);
    }

    #[test]
    fn test_raw_index_is_the_unclamped_mapping() {
        assert_eq!(raw_frame_index(40_000, 30.0), 1200);
        assert_eq!(raw_frame_index(-500, 30.0), -15);
        assert_eq!(map_timestamp_to_frame(40_000, 30.0, 900), 899);
    }

    #[test]
    fn test_in_range_timestamp_maps_by_floor() {
        assert_eq!(map_timestamp_to_frame(500, 10.0, 100), 5);
        // 999ms at 30fps is frame 29.97 → 29
        assert_eq!(map_timestamp_to_frame(999, 30.0, 900), 29);
    }

    #[test]
    fn test_empty_step_list_is_vacuously_successful() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FrameExtractor::with_opener(FakeOpener::new(30.0, 900));

        let stats = extractor
            .extract(&[], Path::new("unopened.mp4"), dir.path())
            .unwrap();

        assert_eq!(stats.extracted, 0);
        assert!(stats.is_success());
    }

    #[test]
    fn test_missing_fields_skip_but_do_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FrameExtractor::with_opener(FakeOpener::new(10.0, 100));

        let steps = vec![
            step(1, 500),
            Step {
                step_number: Some(2),
                ..Default::default()
            },
            Step {
                timestamp_ms: Some(900),
                ..Default::default()
            },
        ];

        let stats = extractor
            .extract(&steps, Path::new("video.mp4"), dir.path())
            .unwrap();

        assert_eq!(stats.extracted, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.errors, 0);
        assert!(stats.is_success());
        assert!(dir.path().join("screenshot_step_1.png").exists());
    }

    #[test]
    fn test_decode_failure_counts_error_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut opener = FakeOpener::new(10.0, 100);
        opener.failing_frames = vec![5];
        let extractor = FrameExtractor::with_opener(opener);

        let steps = vec![step(1, 500), step(2, 800)];
        let stats = extractor
            .extract(&steps, Path::new("video.mp4"), dir.path())
            .unwrap();

        assert_eq!(stats.extracted, 1);
        assert_eq!(stats.errors, 1);
        assert!(!stats.is_success());
        assert!(!dir.path().join("screenshot_step_1.png").exists());
        assert!(dir.path().join("screenshot_step_2.png").exists());
    }

    #[test]
    fn test_unopenable_video_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut opener = FakeOpener::new(10.0, 100);
        opener.fail_open = true;
        let extractor = FrameExtractor::with_opener(opener);

        let result = extractor.extract(&[step(1, 500)], Path::new("bad.mp4"), dir.path());
        assert!(matches!(result, Err(Error::VideoOpen(_))));
    }

    #[test]
    fn test_output_dir_is_cleared_before_extraction() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("screenshot_step_99.png"), b"stale").unwrap();
        std::fs::create_dir(dir.path().join("old_subdir")).unwrap();
        std::fs::write(dir.path().join("old_subdir/file.txt"), b"x").unwrap();

        let extractor = FrameExtractor::with_opener(FakeOpener::new(10.0, 100));
        let stats = extractor
            .extract(&[step(1, 100)], Path::new("video.mp4"), dir.path())
            .unwrap();

        assert_eq!(stats.cleaned, 2);
        assert!(!dir.path().join("screenshot_step_99.png").exists());
        assert!(!dir.path().join("old_subdir").exists());
        assert!(dir.path().join("screenshot_step_1.png").exists());
    }

    #[test]
    fn test_out_of_range_timestamp_still_extracts() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FrameExtractor::with_opener(FakeOpener::new(10.0, 100));

        // 999999ms at 10fps → frame 9999 → clamped to 99
        let steps = vec![step(1, 500), step(2, 999_999)];
        let stats = extractor
            .extract(&steps, Path::new("video.mp4"), dir.path())
            .unwrap();

        assert_eq!(stats.extracted, 2);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.errors, 0);
        assert!(dir.path().join("screenshot_step_2.png").exists());
    }
}
