//! Video Decoder Seam
//!
//! Frame decoding is delegated to ffmpeg/ffprobe subprocesses behind a small
//! trait pair, so the extractor only depends on the frame-seek contract:
//! open a video, report fps and frame count, decode one frame near a given
//! index. Seeks are best effort; keyframe-dependent codecs may land on a
//! nearby frame, which is an accepted precision limitation of this layer.

use crate::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// An opened video with usable metadata.
///
/// The handle is exclusively owned by one extraction run; seeking is a
/// stateful operation against a single decoder, so frames are read
/// sequentially, never concurrently.
pub trait VideoSource {
    /// Frames per second (validated positive on open)
    fn fps(&self) -> f64;
    /// Total frame count (validated positive on open)
    fn frame_count(&self) -> i64;
    /// Seek to `index` (best effort), decode one frame, and persist it as a
    /// PNG at `dest`.
    fn read_frame(&mut self, index: i64, dest: &Path) -> Result<()>;
}

/// Opens videos; the seam the extractor is generic over.
pub trait VideoOpener {
    type Source: VideoSource;

    /// Open and validate a video. Unopenable input maps to
    /// [`Error::VideoOpen`], unusable fps/frame-count metadata to
    /// [`Error::VideoMetadata`]; both are fatal for an extraction run.
    fn open(&self, path: &Path) -> Result<Self::Source>;
}

/// Production opener shelling out to `ffprobe` for metadata.
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    /// ffprobe binary name or path
    pub ffprobe_bin: String,
    /// ffmpeg binary name or path
    pub ffmpeg_bin: String,
}

impl Default for FfmpegOpener {
    fn default() -> Self {
        Self {
            ffprobe_bin: "ffprobe".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
        }
    }
}

impl VideoOpener for FfmpegOpener {
    type Source = FfmpegVideo;

    fn open(&self, path: &Path) -> Result<FfmpegVideo> {
        if !path.exists() {
            return Err(Error::VideoOpen(format!(
                "video file not found: {}",
                path.display()
            )));
        }

        let output = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=avg_frame_rate,nb_frames,duration",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| Error::VideoOpen(format!("failed to run {}: {e}", self.ffprobe_bin)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::VideoOpen(format!(
                "{} rejected {}: {}",
                self.ffprobe_bin,
                path.display(),
                stderr.trim()
            )));
        }

        let probe: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::VideoMetadata(format!("unparseable ffprobe output: {e}")))?;
        let (fps, frame_count) = probe_metadata(&probe)?;

        debug!(
            fps,
            frame_count,
            video = %path.display(),
            "opened video"
        );

        Ok(FfmpegVideo {
            path: path.to_path_buf(),
            ffmpeg_bin: self.ffmpeg_bin.clone(),
            fps,
            frame_count,
        })
    }
}

/// An ffmpeg-backed video source: frames are decoded one at a time by
/// time-based seek (`-ss index / fps`).
pub struct FfmpegVideo {
    path: PathBuf,
    ffmpeg_bin: String,
    fps: f64,
    frame_count: i64,
}

impl VideoSource for FfmpegVideo {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> i64 {
        self.frame_count
    }

    fn read_frame(&mut self, index: i64, dest: &Path) -> Result<()> {
        let seconds = index as f64 / self.fps;
        let output = Command::new(&self.ffmpeg_bin)
            .args(["-v", "error", "-y", "-ss", &format!("{seconds:.6}"), "-i"])
            .arg(&self.path)
            .args(["-frames:v", "1"])
            .arg(dest)
            .output()
            .map_err(|e| Error::Extraction(format!("failed to run {}: {e}", self.ffmpeg_bin)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Extraction(format!(
                "frame {index} decode failed: {}",
                stderr.trim()
            )));
        }
        // ffmpeg can exit 0 without producing a frame (e.g., seek past EOF)
        if !dest.exists() {
            return Err(Error::Extraction(format!(
                "frame {index} produced no output file"
            )));
        }
        Ok(())
    }
}

/// Extract (fps, frame_count) from an ffprobe JSON document, validating both
/// are positive. Containers like MKV often omit `nb_frames`, in which case
/// the count is derived from the stream or format duration.
fn probe_metadata(probe: &Value) -> Result<(f64, i64)> {
    let stream = probe
        .get("streams")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .ok_or_else(|| Error::VideoMetadata("no video stream found".to_string()))?;

    let fps = stream
        .get("avg_frame_rate")
        .and_then(Value::as_str)
        .and_then(parse_rate)
        .unwrap_or(0.0);
    if fps <= 0.0 || !fps.is_finite() {
        return Err(Error::VideoMetadata(format!("unusable frame rate: {fps}")));
    }

    let mut frame_count = stream
        .get("nb_frames")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0);

    if frame_count <= 0 {
        let duration = stream
            .get("duration")
            .or_else(|| probe.get("format").and_then(|f| f.get("duration")))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);
        frame_count = (duration * fps).floor() as i64;
    }

    if frame_count <= 0 {
        return Err(Error::VideoMetadata(format!(
            "unusable frame count: {frame_count}"
        )));
    }

    Ok((fps, frame_count))
}

/// Parse an ffprobe rational rate like "30000/1001" or "25/1".
fn parse_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => rate.trim().parse().ok(),
    }
}
