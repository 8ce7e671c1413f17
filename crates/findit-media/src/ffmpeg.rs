//! General-purpose FFmpeg CLI decoder
//!
//! Probes through `ffprobe -print_format json`, extracts keyframes and audio
//! through `ffmpeg`, and implements scene detection with the `scdet` filter
//! by parsing its stderr log lines.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::process::{run_tool, run_tool_capture, DEFAULT_TOOL_TIMEOUT};
use crate::{
    DecoderCapability, MediaError, MediaType, ProbeResult, Result, SceneDetect, SceneDetectConfig,
    SceneSpan,
};

/// Extensions the FFmpeg backend advertises. It will still probe anything as
/// the registry's fallback candidate.
const FFMPEG_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "m4v", "mkv", "webm", "avi", "mts", "m2ts", "mxf", "flv", "wmv", "mpg", "mpeg",
    "3gp", "ts",
];

/// FFmpeg-based general purpose decoder (priority 50)
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg_tool: String,
    ffprobe_tool: String,
    timeout: Duration,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self {
            ffmpeg_tool: "ffmpeg".to_string(),
            ffprobe_tool: "ffprobe".to_string(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Override tool names, for tests and non-PATH installs
    pub fn with_tools(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg_tool: ffmpeg.into(),
            ffprobe_tool: ffprobe.into(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn capability(&self) -> DecoderCapability {
        DecoderCapability {
            name: "ffmpeg",
            file_extensions: FFMPEG_EXTENSIONS,
            priority: 50,
        }
    }

    pub async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path.display().to_string(),
        ];

        let output = match run_tool(&self.ffprobe_tool, &args, self.timeout).await {
            Ok(out) => out,
            // An unreadable file is "cannot handle", not a routing error
            Err(MediaError::ToolFailed { .. }) => return Ok(ProbeResult::unsupported()),
            Err(e) => return Err(e),
        };

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
            MediaError::ToolOutputUnparseable {
                tool: self.ffprobe_tool.clone(),
                reason: e.to_string(),
            }
        })?;

        let video = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"));
        let audio = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"));

        let (media_type, stream) = match (video, audio) {
            (Some(v), _) => (MediaType::Video, Some(v)),
            (None, Some(a)) => (MediaType::Audio, Some(a)),
            (None, None) => return Ok(ProbeResult::unsupported()),
        };

        let duration = probe
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok());

        let resolution = stream.and_then(|s| Some((s.width?, s.height?)));
        let fps = stream
            .and_then(|s| s.avg_frame_rate.as_deref())
            .and_then(parse_frame_rate);

        // Generic backend: confident but beatable by specialized probes
        let score = match media_type {
            MediaType::Video => 70,
            MediaType::Audio => 60,
            MediaType::Image => 40,
        };

        Ok(ProbeResult {
            score,
            media_type,
            container: probe
                .format
                .and_then(|f| f.format_name)
                .unwrap_or_default(),
            codec: stream
                .and_then(|s| s.codec_name.clone())
                .unwrap_or_default(),
            duration,
            resolution,
            fps,
            has_audio: audio.is_some(),
        })
    }

    /// Write one JPEG per timestamp into `out_dir`
    ///
    /// Frames are named by the caller-observable convention used across the
    /// indexing pipeline; a timestamp that fails to decode yields `None`.
    pub async fn extract_keyframes(
        &self,
        path: &Path,
        times: &[f64],
        out_dir: &Path,
        max_dim: u32,
    ) -> Result<Vec<Option<PathBuf>>> {
        std::fs::create_dir_all(out_dir)?;
        let mut results = Vec::with_capacity(times.len());

        for (i, &t) in times.iter().enumerate() {
            let out_path = out_dir.join(format!("frame_{i:03}.jpg"));
            match self.extract_single_frame(path, t, &out_path, max_dim).await {
                Ok(()) => results.push(Some(out_path)),
                Err(e) => {
                    warn!(
                        "frame extraction failed at {:.3}s for {}: {}",
                        t,
                        path.display(),
                        e
                    );
                    results.push(None);
                }
            }
        }

        Ok(results)
    }

    async fn extract_single_frame(
        &self,
        path: &Path,
        at: f64,
        out_path: &Path,
        max_dim: u32,
    ) -> Result<()> {
        // Scale so the SHORTER edge equals max_dim, preserving aspect
        let scale = format!("scale='if(gt(iw,ih),-2,{max_dim})':'if(gt(iw,ih),{max_dim},-2)'");
        let args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format!("{at:.3}"),
            "-i".to_string(),
            path.display().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            scale,
            "-q:v".to_string(),
            "3".to_string(),
            out_path.display().to_string(),
        ];

        run_tool(&self.ffmpeg_tool, &args, self.timeout).await?;
        if !out_path.exists() {
            return Err(MediaError::DecodeFailed(format!(
                "no frame produced at {at:.3}s"
            )));
        }
        Ok(())
    }

    /// Extract mono PCM audio at `sample_rate` into `out_path`
    pub async fn extract_audio(
        &self,
        path: &Path,
        out_path: &Path,
        sample_rate: u32,
    ) -> Result<PathBuf> {
        self.extract_audio_inner(path, out_path, sample_rate, None)
            .await
    }

    /// Extract only `[start, start + duration)` of the audio track
    pub async fn extract_audio_range(
        &self,
        path: &Path,
        out_path: &Path,
        sample_rate: u32,
        start: f64,
        duration: f64,
    ) -> Result<PathBuf> {
        self.extract_audio_inner(path, out_path, sample_rate, Some((start, duration)))
            .await
    }

    async fn extract_audio_inner(
        &self,
        path: &Path,
        out_path: &Path,
        sample_rate: u32,
        range: Option<(f64, f64)>,
    ) -> Result<PathBuf> {
        let probe = self.probe(path).await?;
        if !probe.has_audio {
            return Err(MediaError::NoAudioStream(path.to_path_buf()));
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut args = vec!["-y".to_string(), "-v".to_string(), "error".to_string()];
        if let Some((start, duration)) = range {
            args.push("-ss".to_string());
            args.push(format!("{start:.3}"));
            args.push("-t".to_string());
            args.push(format!("{duration:.3}"));
        }
        args.extend([
            "-i".to_string(),
            path.display().to_string(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            sample_rate.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            out_path.display().to_string(),
        ]);

        run_tool(&self.ffmpeg_tool, &args, self.timeout).await?;
        debug!(
            "extracted {}Hz mono audio to {}",
            sample_rate,
            out_path.display()
        );
        Ok(out_path.to_path_buf())
    }
}

#[async_trait]
impl SceneDetect for FfmpegDecoder {
    async fn detect_scenes(
        &self,
        path: &Path,
        duration: f64,
        config: &SceneDetectConfig,
    ) -> Result<Vec<SceneSpan>> {
        let args = vec![
            "-i".to_string(),
            path.display().to_string(),
            "-vf".to_string(),
            format!("scdet=t={}:s=1", config.threshold / 100.0),
            "-an".to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ];

        // scdet logs to stderr; ffmpeg's exit code is not meaningful here
        let output = run_tool_capture(&self.ffmpeg_tool, &args, self.timeout).await?;

        let mut boundaries = Vec::new();
        for line in output.stderr.lines() {
            if let Some((score, time)) = parse_scdet_line(line) {
                if score >= config.threshold {
                    boundaries.push(time);
                }
            }
        }
        boundaries.sort_by(|a, b| a.partial_cmp(b).expect("scdet times are finite"));

        let spans = spans_from_boundaries(&boundaries, duration, config.min_scene_len);
        info!(
            "detected {} scenes in {} ({} raw boundaries)",
            spans.len(),
            path.display(),
            boundaries.len()
        );
        Ok(spans)
    }
}

/// Build ordered, gapless, non-overlapping spans covering `[0, duration]`
///
/// Boundaries outside `(0, duration)` are ignored; boundaries closer than
/// `min_scene_len` to the previous cut are merged into the running scene.
pub(crate) fn spans_from_boundaries(
    boundaries: &[f64],
    duration: f64,
    min_scene_len: f64,
) -> Vec<SceneSpan> {
    if duration <= 0.0 {
        return Vec::new();
    }

    let mut cuts = vec![0.0];
    for &b in boundaries {
        if b <= 0.0 || b >= duration {
            continue;
        }
        let last = *cuts.last().expect("cuts starts non-empty");
        if b - last >= min_scene_len {
            cuts.push(b);
        }
    }

    // The final cut must leave room for a last scene of nonzero length
    if duration - *cuts.last().expect("cuts starts non-empty") < f64::EPSILON {
        cuts.pop();
    }

    let mut spans = Vec::with_capacity(cuts.len());
    for (i, &start) in cuts.iter().enumerate() {
        let end = cuts.get(i + 1).copied().unwrap_or(duration);
        spans.push(SceneSpan { start, end });
    }
    spans
}

/// Parse `[scdet @ 0x...] lavfi.scd.score: 4.793, lavfi.scd.time: 7.433`
fn parse_scdet_line(line: &str) -> Option<(f64, f64)> {
    let score_start = line.find("lavfi.scd.score: ")? + "lavfi.scd.score: ".len();
    let score_end = line[score_start..].find(',')?;
    let score: f64 = line[score_start..score_start + score_end].trim().parse().ok()?;

    let time_start = line.find("lavfi.scd.time: ")? + "lavfi.scd.time: ".len();
    let time: f64 = line[time_start..]
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;

    Some((score, time))
}

fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}
