//! External provider contracts
//!
//! The core never performs neural inference itself; STT, vision description,
//! and text embedding are collaborators behind these traits. Tests ship
//! hand-rolled fakes; the application wires real backends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use findit_media::{CompositeMediaService, ProbeResult, SceneDetectConfig, SceneSpan};

use crate::error::Result;
use crate::model::ClipId;

/// Decoder-backed media operations the indexer consumes
///
/// [`CompositeMediaService`] is the production implementation; tests inject
/// fakes that fabricate scenes and frames without touching real codecs.
#[async_trait]
pub trait MediaService: Send + Sync {
    async fn probe(&self, path: &Path) -> findit_media::Result<ProbeResult>;

    async fn detect_scenes(
        &self,
        path: &Path,
        duration: f64,
        config: &SceneDetectConfig,
    ) -> findit_media::Result<Vec<SceneSpan>>;

    async fn extract_scene_keyframes(
        &self,
        path: &Path,
        scenes: &[SceneSpan],
        out_dir: &Path,
        max_frames_per_scene: usize,
        short_edge: u32,
    ) -> findit_media::Result<Vec<Vec<PathBuf>>>;

    async fn extract_audio(
        &self,
        path: &Path,
        out_path: &Path,
        sample_rate: u32,
    ) -> findit_media::Result<PathBuf>;

    async fn extract_audio_range(
        &self,
        path: &Path,
        out_path: &Path,
        sample_rate: u32,
        start: f64,
        duration: f64,
    ) -> findit_media::Result<PathBuf>;
}

#[async_trait]
impl MediaService for CompositeMediaService {
    async fn probe(&self, path: &Path) -> findit_media::Result<ProbeResult> {
        CompositeMediaService::probe(self, path).await
    }

    async fn detect_scenes(
        &self,
        path: &Path,
        duration: f64,
        config: &SceneDetectConfig,
    ) -> findit_media::Result<Vec<SceneSpan>> {
        CompositeMediaService::detect_scenes(self, path, duration, config).await
    }

    async fn extract_scene_keyframes(
        &self,
        path: &Path,
        scenes: &[SceneSpan],
        out_dir: &Path,
        max_frames_per_scene: usize,
        short_edge: u32,
    ) -> findit_media::Result<Vec<Vec<PathBuf>>> {
        CompositeMediaService::extract_scene_keyframes(
            self,
            path,
            scenes,
            out_dir,
            max_frames_per_scene,
            short_edge,
        )
        .await
    }

    async fn extract_audio(
        &self,
        path: &Path,
        out_path: &Path,
        sample_rate: u32,
    ) -> findit_media::Result<PathBuf> {
        CompositeMediaService::extract_audio(self, path, out_path, sample_rate).await
    }

    async fn extract_audio_range(
        &self,
        path: &Path,
        out_path: &Path,
        sample_rate: u32,
        start: f64,
        duration: f64,
    ) -> findit_media::Result<PathBuf> {
        CompositeMediaService::extract_audio_range(self, path, out_path, sample_rate, start, duration)
            .await
    }
}

/// One transcribed span of speech
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Language identification outcome with confidence in [0,1]
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedLanguage {
    pub language: String,
    pub confidence: f32,
}

/// Speech-to-text collaborator
#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Transcribe an audio file, optionally biased by a language hint
    async fn transcribe(
        &self,
        audio_path: &Path,
        language_hint: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>>;

    /// Identify the spoken language of an audio sample
    async fn detect_language(&self, audio_path: &Path) -> Result<DetectedLanguage>;
}

/// Structured description of a clip's keyframes
#[derive(Debug, Clone, Default)]
pub struct ClipDescription {
    pub scene: String,
    pub subjects: Vec<String>,
    pub actions: Vec<String>,
    pub objects: Vec<String>,
    pub mood: String,
    pub shot_type: String,
    pub lighting: String,
    pub colors: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl ClipDescription {
    /// Tags lowercased, trimmed, deduplicated, empty entries dropped
    pub fn normalized_tags(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect()
    }
}

/// Vision-language collaborator: keyframes in, descriptors out
#[async_trait]
pub trait VisionProvider: Send + Sync {
    async fn describe(&self, image_paths: &[std::path::PathBuf]) -> Result<ClipDescription>;
}

/// Text embedding collaborator
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dimensions(&self) -> usize;
    fn is_available(&self) -> bool;
    fn name(&self) -> &str;
}

/// A persistable nearest-neighbor index over clip vectors
///
/// Similarities are in [0,1]. The index must be rebuildable from the
/// embedding blobs stored in `clips.embedding`.
pub trait VectorIndex: Send + Sync {
    fn add(&mut self, clip_id: ClipId, vector: &[f32]) -> Result<()>;
    fn remove(&mut self, clip_id: ClipId);
    fn search(&self, query: &[f32], k: usize) -> Vec<(ClipId, f32)>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn save(&self, path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_tags() {
        let desc = ClipDescription {
            tags: vec![
                " Sunset ".to_string(),
                "sunset".to_string(),
                String::new(),
                "Beach".to_string(),
            ],
            ..Default::default()
        };
        assert_eq!(desc.normalized_tags(), vec!["sunset", "beach"]);
    }
}
