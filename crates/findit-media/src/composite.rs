//! Score-based decoder routing
//!
//! The composite service owns the registered backends, probes candidates for
//! each path, and routes operations to the winner. Routing decisions are
//! cached per extension; registering a new decoder invalidates the cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::{
    Decoder, FfmpegDecoder, MediaError, NativeMp4Decoder, ProbeResult, Result, SceneDetectConfig,
    SceneSpan, ToolBridge, BRAW_BRIDGE, RED_BRIDGE,
};

/// Which operation a route is being selected for; pixel- and audio-producing
/// operations exclude backends that statically refuse them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RouteKind {
    Probe,
    Keyframes,
    Audio,
}

/// Priority-sorted decoder registry with per-extension route caching
pub struct CompositeMediaService {
    decoders: Vec<Decoder>,
    route_cache: Mutex<HashMap<(String, RouteKind), usize>>,
}

impl Default for CompositeMediaService {
    fn default() -> Self {
        Self::with_builtin_decoders()
    }
}

impl CompositeMediaService {
    /// Empty registry; callers register decoders explicitly
    pub fn new() -> Self {
        Self {
            decoders: Vec::new(),
            route_cache: Mutex::new(HashMap::new()),
        }
    }

    /// The standard lineup: vendor bridges, native prober, FFmpeg fallback
    pub fn with_builtin_decoders() -> Self {
        let mut service = Self::new();
        service.register(Decoder::CliBridge(ToolBridge::new(BRAW_BRIDGE)));
        service.register(Decoder::CliBridge(ToolBridge::new(RED_BRIDGE)));
        service.register(Decoder::NativeMp4(NativeMp4Decoder::new()));
        service.register(Decoder::FfmpegCli(FfmpegDecoder::new()));
        service
    }

    /// Register a decoder, keeping the list priority-sorted
    ///
    /// Sort is stable, so equal priorities keep registration order.
    pub fn register(&mut self, decoder: Decoder) {
        self.decoders.push(decoder);
        self.decoders
            .sort_by_key(|d| std::cmp::Reverse(d.capability().priority));
        self.route_cache
            .lock()
            .expect("route cache lock poisoned")
            .clear();
    }

    pub fn decoder_names(&self) -> Vec<&'static str> {
        self.decoders.iter().map(Decoder::name).collect()
    }

    /// Candidate indices for a path: extension matches first, else everyone
    fn candidates(&self, path: &Path, kind: RouteKind) -> Vec<usize> {
        let ext = crate::file_extension(path);
        let matches_op = |d: &Decoder| match kind {
            RouteKind::Probe => true,
            RouteKind::Keyframes => d.supports_keyframes(),
            RouteKind::Audio => d.supports_audio_output(),
        };

        let mut by_ext: Vec<usize> = self
            .decoders
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                matches_op(d)
                    && ext
                        .as_deref()
                        .map(|e| d.capability().file_extensions.contains(&e))
                        .unwrap_or(false)
            })
            .map(|(i, _)| i)
            .collect();

        if by_ext.is_empty() {
            by_ext = self
                .decoders
                .iter()
                .enumerate()
                .filter(|(_, d)| matches_op(d))
                .map(|(i, _)| i)
                .collect();
        }
        by_ext
    }

    /// Probe all candidates and pick the best scorer
    ///
    /// Ties break on priority, then on registration order; both are already
    /// encoded in the sorted candidate order, so the first max wins.
    async fn select(&self, path: &Path, kind: RouteKind) -> Result<(usize, ProbeResult)> {
        let ext = crate::file_extension(path);

        if let Some(ext) = ext.clone() {
            let cached_idx = {
                let cache = self.route_cache.lock().expect("route cache lock poisoned");
                cache.get(&(ext.clone(), kind)).copied()
            };
            if let Some(idx) = cached_idx {
                let probe = self.decoders[idx].probe(path).await?;
                if probe.score > 0 {
                    return Ok((idx, probe));
                }
                // Cached winner can no longer handle this file; re-select
                self.route_cache
                    .lock()
                    .expect("route cache lock poisoned")
                    .remove(&(ext, kind));
            }
        }

        let mut best: Option<(usize, ProbeResult)> = None;
        for idx in self.candidates(path, kind) {
            let probe = self.decoders[idx].probe(path).await?;
            debug!(
                "probe {} via {}: score {}",
                path.display(),
                self.decoders[idx].name(),
                probe.score
            );
            if probe.score == 0 {
                continue;
            }
            let better = match &best {
                None => true,
                Some((_, b)) => probe.score > b.score,
            };
            if better {
                best = Some((idx, probe));
            }
        }

        let (idx, probe) =
            best.ok_or_else(|| MediaError::NoDecoderAvailable(path.to_path_buf()))?;

        if let Some(ext) = ext {
            self.route_cache
                .lock()
                .expect("route cache lock poisoned")
                .insert((ext, kind), idx);
        }
        info!(
            "routing {} ({:?}) to {} (score {})",
            path.display(),
            kind,
            self.decoders[idx].name(),
            probe.score
        );
        Ok((idx, probe))
    }

    /// Probe a path with the best available backend
    pub async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        let (_, probe) = self.select(path, RouteKind::Probe).await?;
        Ok(probe)
    }

    /// Extract JPEGs at the given timestamps, best effort per frame
    pub async fn extract_keyframes(
        &self,
        path: &Path,
        times: &[f64],
        out_dir: &Path,
        max_dim: u32,
    ) -> Result<Vec<Option<PathBuf>>> {
        let (idx, _) = self.select(path, RouteKind::Keyframes).await?;
        self.decoders[idx]
            .extract_keyframes(path, times, out_dir, max_dim)
            .await
    }

    /// Extract mono audio at `sample_rate`
    ///
    /// Candidates statically known to refuse audio output were never probed,
    /// so selection lands directly on a backend that can produce the format.
    pub async fn extract_audio(
        &self,
        path: &Path,
        out_path: &Path,
        sample_rate: u32,
    ) -> Result<PathBuf> {
        let (idx, _) = self.select(path, RouteKind::Audio).await?;
        self.decoders[idx]
            .extract_audio(path, out_path, sample_rate)
            .await
    }

    /// Extract a bounded slice of the audio track
    pub async fn extract_audio_range(
        &self,
        path: &Path,
        out_path: &Path,
        sample_rate: u32,
        start: f64,
        duration: f64,
    ) -> Result<PathBuf> {
        let (idx, _) = self.select(path, RouteKind::Audio).await?;
        self.decoders[idx]
            .extract_audio_range(path, out_path, sample_rate, start, duration)
            .await
    }

    /// Segment the timeline, delegating to the first capable candidate
    pub async fn detect_scenes(
        &self,
        path: &Path,
        duration: f64,
        config: &SceneDetectConfig,
    ) -> Result<Vec<SceneSpan>> {
        for idx in self.candidates(path, RouteKind::Probe) {
            if let Some(detector) = self.decoders[idx].scene_detector() {
                return detector.detect_scenes(path, duration, config).await;
            }
        }
        Err(MediaError::OperationNotSupported {
            decoder: "composite",
            operation: "detect_scenes",
        })
    }

    /// Per-scene thumbnail extraction
    ///
    /// For every scene, decodes up to `max_frames_per_scene` evenly spaced
    /// frames scaled to `short_edge` and names them
    /// `scene_{NNN}_frame_{MM}.jpg`. Returns one path list per scene;
    /// undecodable frames are simply absent.
    pub async fn extract_scene_keyframes(
        &self,
        path: &Path,
        scenes: &[SceneSpan],
        out_dir: &Path,
        max_frames_per_scene: usize,
        short_edge: u32,
    ) -> Result<Vec<Vec<PathBuf>>> {
        std::fs::create_dir_all(out_dir)?;
        let mut per_scene = Vec::with_capacity(scenes.len());

        for (scene_idx, scene) in scenes.iter().enumerate() {
            let times = sample_times(scene, max_frames_per_scene);
            let raw = self
                .extract_keyframes(path, &times, out_dir, short_edge)
                .await?;

            let mut frames = Vec::new();
            for (frame_idx, produced) in raw.into_iter().enumerate() {
                let Some(tmp) = produced else { continue };
                let final_path =
                    out_dir.join(format!("scene_{scene_idx:03}_frame_{frame_idx:02}.jpg"));
                std::fs::rename(&tmp, &final_path)?;
                frames.push(final_path);
            }
            per_scene.push(frames);
        }

        Ok(per_scene)
    }
}

/// Evenly spaced sample timestamps inside a scene, midpoint-aligned
fn sample_times(scene: &SceneSpan, max_frames: usize) -> Vec<f64> {
    if max_frames == 0 || scene.duration() <= 0.0 {
        return Vec::new();
    }
    // Very short scenes get a single midpoint frame
    let count = if scene.duration() < 1.0 { 1 } else { max_frames };
    let step = scene.duration() / count as f64;
    (0..count)
        .map(|i| scene.start + (i as f64 + 0.5) * step)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_times_midpoints() {
        let scene = SceneSpan {
            start: 10.0,
            end: 16.0,
        };
        let times = sample_times(&scene, 3);
        assert_eq!(times.len(), 3);
        assert!((times[0] - 11.0).abs() < 1e-9);
        assert!((times[1] - 13.0).abs() < 1e-9);
        assert!((times[2] - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_times_short_scene_single_frame() {
        let scene = SceneSpan {
            start: 0.0,
            end: 0.5,
        };
        let times = sample_times(&scene, 3);
        assert_eq!(times.len(), 1);
        assert!((times[0] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_registration_orders_by_priority() {
        let service = CompositeMediaService::with_builtin_decoders();
        let names = service.decoder_names();
        assert_eq!(
            names,
            vec!["braw-bridge", "red-bridge", "native-mp4", "ffmpeg"]
        );
    }

    #[tokio::test]
    async fn test_audio_route_skips_refusing_decoders() {
        // An mp4 path: native wins probes, but audio routing must never pick
        // it because it statically refuses audio output.
        let service = CompositeMediaService::with_builtin_decoders();
        let candidates = service.candidates(Path::new("/a/b.mp4"), RouteKind::Audio);
        for idx in candidates {
            assert!(service.decoders[idx].supports_audio_output());
        }
    }

    #[tokio::test]
    async fn test_no_decoder_available() {
        let service = CompositeMediaService::new();
        let err = service.probe(Path::new("/a/b.xyz")).await.unwrap_err();
        assert!(matches!(err, MediaError::NoDecoderAvailable(_)));
    }

    #[tokio::test]
    async fn test_scene_detection_unsupported_without_ffmpeg() {
        let mut service = CompositeMediaService::new();
        service.register(Decoder::NativeMp4(NativeMp4Decoder::new()));
        let err = service
            .detect_scenes(Path::new("/a/b.mp4"), 10.0, &SceneDetectConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::OperationNotSupported { .. }));
    }
}
