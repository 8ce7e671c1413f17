//! Shared fakes for pipeline tests
//!
//! Fabricate scenes, frames, speech, descriptions, and embeddings without
//! touching real codecs or models.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use findit_core::providers::{
    ClipDescription, DetectedLanguage, EmbeddingProvider, MediaService, SttProvider,
    TranscriptSegment, VisionProvider,
};
use findit_core::{FindItError, IndexerDeps, NetworkMonitor, RateLimiter, RateLimiterConfig};
use findit_media::{MediaError, MediaType, ProbeResult, SceneDetectConfig, SceneSpan};

/// Media service that fabricates fixed-length scenes and writes stub JPEGs
pub struct FakeMedia {
    pub duration: f64,
    pub scene_len: f64,
    pub has_audio: bool,
}

impl FakeMedia {
    pub fn new(duration: f64, scene_len: f64) -> Self {
        Self {
            duration,
            scene_len,
            has_audio: true,
        }
    }
}

#[async_trait]
impl MediaService for FakeMedia {
    async fn probe(&self, _path: &Path) -> findit_media::Result<ProbeResult> {
        Ok(ProbeResult {
            score: 90,
            media_type: MediaType::Video,
            container: "mp4".to_string(),
            codec: "h264".to_string(),
            duration: Some(self.duration),
            resolution: Some((1920, 1080)),
            fps: Some(25.0),
            has_audio: self.has_audio,
        })
    }

    async fn detect_scenes(
        &self,
        _path: &Path,
        duration: f64,
        _config: &SceneDetectConfig,
    ) -> findit_media::Result<Vec<SceneSpan>> {
        let mut spans = Vec::new();
        let mut start = 0.0;
        while start < duration {
            let end = (start + self.scene_len).min(duration);
            spans.push(SceneSpan { start, end });
            start = end;
        }
        Ok(spans)
    }

    async fn extract_scene_keyframes(
        &self,
        _path: &Path,
        scenes: &[SceneSpan],
        out_dir: &Path,
        max_frames_per_scene: usize,
        _short_edge: u32,
    ) -> findit_media::Result<Vec<Vec<PathBuf>>> {
        std::fs::create_dir_all(out_dir)?;
        let mut per_scene = Vec::new();
        for (i, _scene) in scenes.iter().enumerate() {
            let mut frames = Vec::new();
            for frame in 0..max_frames_per_scene.max(1).min(2) {
                let path = out_dir.join(format!("scene_{i:03}_frame_{frame:02}.jpg"));
                std::fs::write(&path, b"jpeg")?;
                frames.push(path);
            }
            per_scene.push(frames);
        }
        Ok(per_scene)
    }

    async fn extract_audio(
        &self,
        path: &Path,
        out_path: &Path,
        _sample_rate: u32,
    ) -> findit_media::Result<PathBuf> {
        if !self.has_audio {
            return Err(MediaError::NoAudioStream(path.to_path_buf()));
        }
        std::fs::write(out_path, b"wav")?;
        Ok(out_path.to_path_buf())
    }

    async fn extract_audio_range(
        &self,
        path: &Path,
        out_path: &Path,
        _sample_rate: u32,
        _start: f64,
        _duration: f64,
    ) -> findit_media::Result<PathBuf> {
        if !self.has_audio {
            return Err(MediaError::NoAudioStream(path.to_path_buf()));
        }
        std::fs::write(out_path, b"wav")?;
        Ok(out_path.to_path_buf())
    }
}

/// One segment per ten seconds of timeline, English, high confidence
pub struct FakeStt {
    pub duration: f64,
}

#[async_trait]
impl SttProvider for FakeStt {
    async fn transcribe(
        &self,
        _audio_path: &Path,
        _language_hint: Option<&str>,
    ) -> findit_core::Result<Vec<TranscriptSegment>> {
        let mut segments = Vec::new();
        let mut index = 0;
        let mut start = 0.0;
        while start < self.duration {
            segments.push(TranscriptSegment {
                index,
                start,
                end: start + 5.0,
                text: format!("spoken words number {index}"),
            });
            index += 1;
            start += 10.0;
        }
        Ok(segments)
    }

    async fn detect_language(&self, _audio_path: &Path) -> findit_core::Result<DetectedLanguage> {
        Ok(DetectedLanguage {
            language: "en".to_string(),
            confidence: 0.92,
        })
    }
}

/// Counts calls; optionally reports cancellation after N descriptions
pub struct FakeVision {
    pub calls: AtomicUsize,
    pub cancel_after: Option<usize>,
}

impl FakeVision {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            cancel_after: None,
        }
    }

    pub fn cancelling_after(n: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            cancel_after: Some(n),
        }
    }
}

#[async_trait]
impl VisionProvider for FakeVision {
    async fn describe(&self, _image_paths: &[PathBuf]) -> findit_core::Result<ClipDescription> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = self.cancel_after {
            if call > limit {
                return Err(FindItError::Cancelled);
            }
        }
        Ok(ClipDescription {
            scene: format!("scene {call}"),
            subjects: vec!["kayaker".to_string()],
            actions: vec!["paddling".to_string()],
            objects: vec!["kayak".to_string(), "river".to_string()],
            mood: "calm".to_string(),
            shot_type: "wide".to_string(),
            lighting: "daylight".to_string(),
            colors: "green, blue".to_string(),
            description: format!("a kayaker paddling, call {call}"),
            tags: vec!["kayak".to_string(), "river".to_string()],
        })
    }
}

/// Deterministic eight-dimensional text embedding
pub struct FakeEmbedder;

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> findit_core::Result<Vec<f32>> {
        let mut v = vec![0.0f32; 8];
        for (i, b) in text.bytes().enumerate() {
            v[i % 8] += f32::from(b) / 255.0;
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "fake-embedder"
    }
}

/// Opt-in log output for debugging failing pipeline tests (`RUST_LOG=debug`)
#[allow(dead_code)]
pub fn init_tracing() {
    if let Ok(filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

/// Deps wired entirely to fakes
pub fn fake_deps(
    media: Arc<dyn MediaService>,
    stt: Option<Arc<dyn SttProvider>>,
    vision: Option<Arc<dyn VisionProvider>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
) -> IndexerDeps {
    IndexerDeps {
        media,
        stt,
        vision,
        embedder,
        rate_limiter: Arc::new(RateLimiter::new(RateLimiterConfig::new(
            10_000,
            Duration::from_secs(60),
        ))),
        network: Arc::new(NetworkMonitor::new()),
    }
}
