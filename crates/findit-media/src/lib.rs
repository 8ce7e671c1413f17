//! findit-media: decoder routing and frame/audio extraction
//!
//! This crate provides:
//! - A capability-advertising decoder model (`Decoder`) with score-based probing
//! - A priority-sorted registry (`CompositeMediaService`) that routes probe,
//!   keyframe, audio, and scene-detection requests to the best backend
//! - FFmpeg-CLI based scene detection and keyframe/audio extraction
//! - A pure-Rust MP4/MOV prober and external vendor CLI bridges

pub mod bridge;
pub mod composite;
pub mod ffmpeg;
pub mod native;
pub mod process;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use bridge::{ToolBridge, BRAW_BRIDGE, RED_BRIDGE};
pub use composite::CompositeMediaService;
pub use ffmpeg::FfmpegDecoder;
pub use native::NativeMp4Decoder;

/// Errors produced by decoder routing and extraction
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("no decoder available for {0}")]
    NoDecoderAvailable(PathBuf),

    #[error("operation not supported by decoder {decoder}: {operation}")]
    OperationNotSupported {
        decoder: &'static str,
        operation: &'static str,
    },

    #[error("probe failed for {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    #[error("unparseable output from {tool}: {reason}")]
    ToolOutputUnparseable { tool: String, reason: String },

    #[error("{tool} timed out after {seconds}s")]
    ToolTimedOut { tool: String, seconds: u64 },

    #[error("no audio stream found in {0}")]
    NoAudioStream(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MediaError>;

/// Kind of media a probe identified
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Image,
}

/// Result of probing a file with a single decoder
///
/// `score` is 0..=100; 0 means the decoder cannot handle the file at all.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub score: u8,
    pub media_type: MediaType,
    pub container: String,
    pub codec: String,
    pub duration: Option<f64>,
    pub resolution: Option<(u32, u32)>,
    pub fps: Option<f64>,
    pub has_audio: bool,
}

impl ProbeResult {
    /// A probe that rejects the file outright
    pub fn unsupported() -> Self {
        Self {
            score: 0,
            media_type: MediaType::Video,
            container: String::new(),
            codec: String::new(),
            duration: None,
            resolution: None,
            fps: None,
            has_audio: false,
        }
    }
}

/// Static advertisement of what a decoder handles
#[derive(Debug, Clone, Copy)]
pub struct DecoderCapability {
    pub name: &'static str,
    pub file_extensions: &'static [&'static str],
    pub priority: i32,
}

/// A detected scene: a half-open `[start, end)` range in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneSpan {
    pub start: f64,
    pub end: f64,
}

impl SceneSpan {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Tunables for scene segmentation
#[derive(Debug, Clone)]
pub struct SceneDetectConfig {
    /// scdet score threshold (0..=100); lower detects more cuts
    pub threshold: f64,
    /// Boundaries closer than this to the previous one are merged
    pub min_scene_len: f64,
}

impl Default for SceneDetectConfig {
    fn default() -> Self {
        Self {
            threshold: 10.0,
            min_scene_len: 1.0,
        }
    }
}

/// Orthogonal capability: decoders that can segment a timeline into scenes
///
/// Deliberately separate from the decoding operations; most backends forward
/// to the one registry member that implements it.
#[async_trait]
pub trait SceneDetect: Send + Sync {
    async fn detect_scenes(
        &self,
        path: &Path,
        duration: f64,
        config: &SceneDetectConfig,
    ) -> Result<Vec<SceneSpan>>;
}

/// The known decoder backends
///
/// Modeled as a sum type: routing is over a closed set of backends plus the
/// externally parameterized CLI bridge variant.
pub enum Decoder {
    NativeMp4(NativeMp4Decoder),
    FfmpegCli(FfmpegDecoder),
    CliBridge(ToolBridge),
}

impl Decoder {
    pub fn capability(&self) -> DecoderCapability {
        match self {
            Decoder::NativeMp4(d) => d.capability(),
            Decoder::FfmpegCli(d) => d.capability(),
            Decoder::CliBridge(d) => d.capability(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.capability().name
    }

    /// Whether this backend can write audio output at all
    pub fn supports_audio_output(&self) -> bool {
        match self {
            Decoder::NativeMp4(_) => false,
            Decoder::FfmpegCli(_) => true,
            Decoder::CliBridge(d) => d.supports_audio_output(),
        }
    }

    /// Whether this backend can produce still frames
    pub fn supports_keyframes(&self) -> bool {
        match self {
            Decoder::NativeMp4(_) => false,
            Decoder::FfmpegCli(_) | Decoder::CliBridge(_) => true,
        }
    }

    pub async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        match self {
            Decoder::NativeMp4(d) => d.probe(path).await,
            Decoder::FfmpegCli(d) => d.probe(path).await,
            Decoder::CliBridge(d) => d.probe(path).await,
        }
    }

    /// Extract one JPEG per requested timestamp, best effort
    ///
    /// The returned vector is parallel to `times`; a frame that could not be
    /// decoded is reported as `None` rather than failing the batch.
    pub async fn extract_keyframes(
        &self,
        path: &Path,
        times: &[f64],
        out_dir: &Path,
        max_dim: u32,
    ) -> Result<Vec<Option<PathBuf>>> {
        match self {
            Decoder::NativeMp4(_) => Err(MediaError::OperationNotSupported {
                decoder: self.name(),
                operation: "extract_keyframes",
            }),
            Decoder::FfmpegCli(d) => d.extract_keyframes(path, times, out_dir, max_dim).await,
            Decoder::CliBridge(d) => d.extract_keyframes(path, times, out_dir, max_dim).await,
        }
    }

    pub async fn extract_audio(
        &self,
        path: &Path,
        out_path: &Path,
        sample_rate: u32,
    ) -> Result<PathBuf> {
        match self {
            Decoder::NativeMp4(_) | Decoder::CliBridge(_) => {
                Err(MediaError::OperationNotSupported {
                    decoder: self.name(),
                    operation: "extract_audio",
                })
            }
            Decoder::FfmpegCli(d) => d.extract_audio(path, out_path, sample_rate).await,
        }
    }

    /// Extract only a time range of the audio track
    pub async fn extract_audio_range(
        &self,
        path: &Path,
        out_path: &Path,
        sample_rate: u32,
        start: f64,
        duration: f64,
    ) -> Result<PathBuf> {
        match self {
            Decoder::NativeMp4(_) | Decoder::CliBridge(_) => {
                Err(MediaError::OperationNotSupported {
                    decoder: self.name(),
                    operation: "extract_audio_range",
                })
            }
            Decoder::FfmpegCli(d) => {
                d.extract_audio_range(path, out_path, sample_rate, start, duration)
                    .await
            }
        }
    }

    /// The scene-detection capability, when this backend has one
    pub fn scene_detector(&self) -> Option<&dyn SceneDetect> {
        match self {
            Decoder::FfmpegCli(d) => Some(d),
            Decoder::NativeMp4(_) | Decoder::CliBridge(_) => None,
        }
    }
}

/// Lowercased extension of a path, if any
pub(crate) fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_span_duration() {
        let span = SceneSpan {
            start: 1.5,
            end: 4.0,
        };
        assert!((span.duration() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unsupported_probe_scores_zero() {
        assert_eq!(ProbeResult::unsupported().score, 0);
    }

    #[test]
    fn test_file_extension_lowercases() {
        assert_eq!(
            file_extension(Path::new("/a/B.MOV")),
            Some("mov".to_string())
        );
        assert_eq!(file_extension(Path::new("/a/noext")), None);
    }
}
