//! Layered indexing pipeline
//!
//! A video advances through five ordered layers: metadata, scenes, speech,
//! vision, embeddings. Each layer reads what the previous layer committed,
//! does its work, and commits its own outputs atomically; within a layer,
//! per-clip commits advance the `last_processed_clip` checkpoint so a crash
//! between clips resumes at the next clip.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use findit_media::{MediaError, SceneDetectConfig};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::{AppPaths, IndexingConfig, INDEX_DIR_NAME};
use crate::embedding::{compose_embedding_text, encode_embedding, l2_normalize};
use crate::error::{FindItError, Result};
use crate::folder_db::FolderDb;
use crate::model::{Clip, ClipId, FolderId, IndexStatus, Video};
use crate::network::NetworkMonitor;
use crate::providers::{
    EmbeddingProvider, MediaService, SttProvider, TranscriptSegment, VisionProvider,
};
use crate::rate_limit::RateLimiter;
use crate::srt::{generate_srt, SrtSegment};

/// How long an external call waits for connectivity before giving up
const NETWORK_WAIT: Duration = Duration::from_secs(120);

/// Samples below this speech score do not vote in language detection
const MIN_SPEECH_SCORE: usize = 2;

/// Bytes hashed from the head of a file for the content hash
const HASH_PREFIX_BYTES: usize = 4 * 1024 * 1024;

/// Collaborators the pipeline calls out to
pub struct IndexerDeps {
    pub media: Arc<dyn MediaService>,
    pub stt: Option<Arc<dyn SttProvider>>,
    pub vision: Option<Arc<dyn VisionProvider>>,
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub network: Arc<NetworkMonitor>,
}

/// Per-video completion report
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub video_path: PathBuf,
    pub success: bool,
    pub clips_created: usize,
    pub clips_analyzed: usize,
    pub clips_embedded: usize,
    pub stt_skipped_no_audio: bool,
    pub error: Option<String>,
}

impl IndexOutcome {
    fn new(video_path: PathBuf) -> Self {
        Self {
            video_path,
            success: false,
            clips_created: 0,
            clips_analyzed: 0,
            clips_embedded: 0,
            stt_skipped_no_audio: false,
            error: None,
        }
    }

    /// Cancellation is an outcome, not a failure
    pub fn is_cancelled(&self) -> bool {
        self.error.as_deref() == Some("cancelled")
    }
}

enum ChangeAction {
    Rebuild,
    Skip,
}

/// Drives one folder's videos through the layer state machine
pub struct LayeredIndexer {
    db: Arc<Mutex<FolderDb>>,
    folder_id: FolderId,
    folder_root: PathBuf,
    paths: AppPaths,
    config: IndexingConfig,
    deps: IndexerDeps,
    /// Background performance mode: pre-sleep external calls under host load
    background_throttle: bool,
}

impl LayeredIndexer {
    pub fn new(
        db: Arc<Mutex<FolderDb>>,
        folder_id: FolderId,
        folder_root: PathBuf,
        paths: AppPaths,
        config: IndexingConfig,
        deps: IndexerDeps,
    ) -> Self {
        Self {
            db,
            folder_id,
            folder_root,
            paths,
            config,
            deps,
            background_throttle: false,
        }
    }

    pub fn with_background_throttle(mut self, enabled: bool) -> Self {
        self.background_throttle = enabled;
        self
    }

    fn db<T>(&self, f: impl FnOnce(&FolderDb) -> Result<T>) -> Result<T> {
        let guard = self
            .db
            .lock()
            .map_err(|_| FindItError::InvalidData("folder db lock poisoned".to_string()))?;
        f(&guard)
    }

    /// Index one video to completion, resuming from prior progress
    ///
    /// Storage failures bubble out; per-video indexing failures and
    /// cancellation are reported inside the outcome.
    pub async fn index_video(
        &self,
        path: &Path,
        force: bool,
        cancel: &CancelToken,
    ) -> Result<IndexOutcome> {
        let path_str = path.to_string_lossy().into_owned();
        let mut outcome = IndexOutcome::new(path.to_path_buf());

        let existing = self.db(|db| db.get_video_by_path(&path_str))?;
        if force {
            if let Some(video) = &existing {
                self.db(|db| db.reset_video_index_state(video.id))?;
                info!("force reindex of {}", path_str);
            }
        } else if let Some(video) = &existing {
            if video.index_status == IndexStatus::Completed
                && video.last_processed_clip.is_none()
            {
                match self.detect_change(video, path)? {
                    ChangeAction::Rebuild => {
                        info!("content changed, rebuilding {}", path_str);
                        self.db(|db| db.reset_video_index_state(video.id))?;
                    }
                    ChangeAction::Skip => {
                        outcome.success = true;
                        return Ok(outcome);
                    }
                }
            }
        }

        match self.run_layers(path, &path_str, cancel, &mut outcome).await {
            Ok(()) => outcome.success = true,
            Err(e) if e.is_cancelled() => {
                debug!("indexing cancelled for {}", path_str);
                outcome.error = Some("cancelled".to_string());
            }
            Err(e) if is_storage_error(&e) => return Err(e),
            Err(e) => {
                let message = e.to_string();
                warn!("indexing failed for {}: {}", path_str, message);
                if let Some(video) = self.db(|db| db.get_video_by_path(&path_str))? {
                    self.db(|db| db.fail_video(video.id, &message))?;
                }
                outcome.error = Some(message);
            }
        }
        Ok(outcome)
    }

    /// Entry change detection for previously completed videos
    fn detect_change(&self, video: &Video, path: &Path) -> Result<ChangeAction> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            // The scanner owns the orphan transition; nothing to do here
            Err(_) => return Ok(ChangeAction::Skip),
        };
        let size = metadata.len() as i64;
        let mtime = epoch_secs(metadata.modified().ok());

        if let Some(stored_size) = video.file_size {
            if stored_size != size {
                return Ok(ChangeAction::Rebuild);
            }
        }
        if video.modified_at != mtime {
            // Size is unchanged (or unknown): backfill the hash on the fast
            // path, but a hash that then disagrees means the bytes changed
            let hash = compute_file_hash(path)?;
            if let Some(stored_hash) = &video.file_hash {
                if *stored_hash != hash {
                    return Ok(ChangeAction::Rebuild);
                }
            }
            self.db(|db| db.set_video_hash(video.id, &hash, mtime.unwrap_or(0)))?;
            return Ok(ChangeAction::Skip);
        }
        Ok(ChangeAction::Skip)
    }

    async fn run_layers(
        &self,
        path: &Path,
        path_str: &str,
        cancel: &CancelToken,
        outcome: &mut IndexOutcome,
    ) -> Result<()> {
        let start_layer = self
            .db(|db| db.get_video_by_path(path_str))?
            .map(|v| v.index_layer)
            .unwrap_or(0);

        for layer in start_layer..=4 {
            if cancel.is_cancelled() {
                return Err(FindItError::Cancelled);
            }
            let video = self.db(|db| db.get_video_by_path(path_str))?;
            match layer {
                0 => self.layer_metadata(path, path_str).await?,
                1 => self.layer_scenes(path, &expect_video(video)?, outcome).await?,
                2 => {
                    self.layer_stt(path, &expect_video(video)?, cancel, outcome)
                        .await?
                }
                3 => {
                    self.layer_vision(&expect_video(video)?, cancel, outcome)
                        .await?
                }
                _ => {
                    self.layer_embeddings(&expect_video(video)?, cancel, outcome)
                        .await?
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------ layer 0

    async fn layer_metadata(&self, path: &Path, path_str: &str) -> Result<()> {
        let probe = self.deps.media.probe(path).await?;
        let metadata = std::fs::metadata(path)?;
        let size = metadata.len() as i64;
        let mtime = epoch_secs(metadata.modified().ok());
        let hash = compute_file_hash(path)?;

        self.db(|db| {
            db.apply_video_metadata(
                self.folder_id,
                path_str,
                probe.duration.unwrap_or(0.0),
                Some(size),
                Some(&hash),
                mtime,
            )
        })?;
        debug!(
            "metadata layer done for {} ({:.1}s, {} bytes)",
            path_str,
            probe.duration.unwrap_or(0.0),
            size
        );
        Ok(())
    }

    // ------------------------------------------------------------ layer 1

    async fn layer_scenes(
        &self,
        path: &Path,
        video: &Video,
        outcome: &mut IndexOutcome,
    ) -> Result<()> {
        let scene_config = SceneDetectConfig {
            threshold: self.config.scene_threshold,
            min_scene_len: self.config.min_scene_len,
        };
        let spans = match self
            .deps
            .media
            .detect_scenes(path, video.duration_secs, &scene_config)
            .await
        {
            Ok(spans) => spans,
            Err(MediaError::OperationNotSupported { .. }) => {
                return Err(FindItError::SceneDetectionUnsupported(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let thumbs_dir = self.thumbnails_dir(path);
        let frames = self
            .deps
            .media
            .extract_scene_keyframes(
                path,
                &spans,
                &thumbs_dir,
                self.config.max_frames_per_scene,
                self.config.thumbnail_short_edge,
            )
            .await?;

        let clips: Vec<(f64, f64, Option<String>)> = spans
            .iter()
            .zip(&frames)
            .map(|(span, scene_frames)| {
                let thumbnail = scene_frames
                    .first()
                    .map(|p| p.to_string_lossy().into_owned());
                (span.start, span.end, thumbnail)
            })
            .collect();

        let ids = self.db(|db| db.complete_scene_layer(video.id, &clips))?;
        outcome.clips_created = ids.len();
        info!("scene layer: {} clips for {}", ids.len(), video.file_path);
        Ok(())
    }

    // ------------------------------------------------------------ layer 2

    async fn layer_stt(
        &self,
        path: &Path,
        video: &Video,
        cancel: &CancelToken,
        outcome: &mut IndexOutcome,
    ) -> Result<()> {
        outcome.stt_skipped_no_audio = video.stt_skipped_no_audio;
        let Some(stt) = self.deps.stt.clone() else {
            warn!("no stt provider configured, skipping speech layer");
            return self.db(|db| db.complete_layer(video.id, 3, IndexStatus::SttDone));
        };
        let clips = self.db(|db| db.clips_for_video(video.id))?;
        if clips.is_empty() {
            return self.db(|db| db.complete_layer(video.id, 3, IndexStatus::SttDone));
        }

        let audio_path = std::env::temp_dir().join(format!("findit_audio_{}.wav", video.id));
        let extraction = self
            .deps
            .media
            .extract_audio(path, &audio_path, self.config.stt_sample_rate)
            .await;
        match extraction {
            Ok(_) => {}
            Err(MediaError::NoAudioStream(_)) => {
                self.db(|db| db.set_stt_skipped_no_audio(video.id, true))?;
                outcome.stt_skipped_no_audio = true;
                info!("no audio track in {}, skipping stt", video.file_path);
                return self.db(|db| db.complete_layer(video.id, 3, IndexStatus::SttDone));
            }
            Err(e) => return Err(e.into()),
        }

        let result = self
            .transcribe_clips(path, video, &clips, stt.as_ref(), &audio_path, cancel)
            .await;
        let _ = std::fs::remove_file(&audio_path);
        result?;

        self.db(|db| db.complete_layer(video.id, 3, IndexStatus::SttDone))
    }

    async fn transcribe_clips(
        &self,
        path: &Path,
        video: &Video,
        clips: &[Clip],
        stt: &dyn SttProvider,
        audio_path: &Path,
        cancel: &CancelToken,
    ) -> Result<()> {
        let hint = self.detect_language(path, clips, stt, cancel).await?;

        let segments = self
            .guarded(cancel, || {
                let audio = audio_path.to_path_buf();
                let hint = hint.clone();
                async move { stt.transcribe(&audio, hint.as_deref()).await }
            })
            .await?;

        self.write_sidecar(path, video, &segments)?;

        let checkpoint = self
            .db(|db| db.get_video(video.id))?
            .and_then(|v| v.last_processed_clip);
        let pending = self.db(|db| db.clips_after_checkpoint(video.id, checkpoint))?;
        for clip in pending {
            if cancel.is_cancelled() {
                return Err(FindItError::Cancelled);
            }
            let text = transcript_for_span(&segments, clip.start_secs, clip.end_secs);
            self.db(|db| db.apply_clip_transcript(video.id, clip.id, &text))?;
        }
        Ok(())
    }

    /// Majority-vote language detection over sampled scenes
    ///
    /// Skips the first scene (often a slate), transcribes up to K samples,
    /// scores each by a CJK-aware token count so silent samples do not vote,
    /// and breaks ties on the highest reported confidence. No conclusive
    /// vote means transcription proceeds without a hint.
    async fn detect_language(
        &self,
        path: &Path,
        clips: &[Clip],
        stt: &dyn SttProvider,
        cancel: &CancelToken,
    ) -> Result<Option<String>> {
        let samples: Vec<&Clip> = clips
            .iter()
            .skip(1)
            .take(self.config.stt_sample_scenes)
            .collect();
        if samples.is_empty() {
            return Ok(None);
        }

        let mut votes: HashMap<String, (usize, f32)> = HashMap::new();
        for (i, clip) in samples.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(FindItError::Cancelled);
            }
            let sample_path =
                std::env::temp_dir().join(format!("findit_lang_{}_{i}.wav", clip.video_id));
            let extracted = self
                .deps
                .media
                .extract_audio_range(
                    path,
                    &sample_path,
                    self.config.stt_sample_rate,
                    clip.start_secs,
                    clip.end_secs - clip.start_secs,
                )
                .await;
            if extracted.is_err() {
                continue;
            }

            let vote = self.language_vote(stt, &sample_path, cancel).await;
            let _ = std::fs::remove_file(&sample_path);
            match vote {
                Ok(Some(detected)) => {
                    let entry = votes
                        .entry(detected.language)
                        .or_insert((0, 0.0));
                    entry.0 += 1;
                    entry.1 = entry.1.max(detected.confidence);
                }
                Ok(None) => {}
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => debug!("language sample failed: {}", e),
            }
        }

        let winner = votes.into_iter().max_by(|a, b| {
            (a.1 .0)
                .cmp(&b.1 .0)
                .then(a.1 .1.partial_cmp(&b.1 .1).unwrap_or(std::cmp::Ordering::Equal))
        });
        match winner {
            Some((language, (count, _))) => {
                info!("detected language {} ({} votes)", language, count);
                Ok(Some(language))
            }
            None => {
                debug!("language detection inconclusive, transcribing without hint");
                Ok(None)
            }
        }
    }

    async fn language_vote(
        &self,
        stt: &dyn SttProvider,
        sample_path: &Path,
        cancel: &CancelToken,
    ) -> Result<Option<crate::providers::DetectedLanguage>> {
        let segments = self
            .guarded(cancel, || {
                let audio = sample_path.to_path_buf();
                async move { stt.transcribe(&audio, None).await }
            })
            .await?;
        let text: String = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if speech_score(&text) < MIN_SPEECH_SCORE {
            return Ok(None);
        }
        let detected = self
            .guarded(cancel, || {
                let audio = sample_path.to_path_buf();
                async move { stt.detect_language(&audio).await }
            })
            .await?;
        Ok(Some(detected))
    }

    /// Write the SRT sidecar next to the video, or under app support when
    /// the video's directory is not writable
    fn write_sidecar(
        &self,
        path: &Path,
        video: &Video,
        segments: &[TranscriptSegment],
    ) -> Result<()> {
        if segments.is_empty() {
            return Ok(());
        }
        let srt_segments: Vec<SrtSegment> = segments
            .iter()
            .map(|s| SrtSegment {
                index: s.index + 1,
                start: s.start,
                end: s.end,
                text: s.text.clone(),
            })
            .collect();
        let document = generate_srt(&srt_segments);

        let sibling = path.with_extension("srt");
        let target = match std::fs::write(&sibling, &document) {
            Ok(()) => sibling,
            Err(_) => {
                let fallback_dir = self.paths.srt_fallback_dir();
                std::fs::create_dir_all(&fallback_dir)?;
                let name = video
                    .file_hash
                    .clone()
                    .unwrap_or_else(|| format!("video_{}", video.id));
                let fallback = fallback_dir.join(format!("{name}.srt"));
                std::fs::write(&fallback, &document)?;
                fallback
            }
        };
        self.db(|db| db.set_video_srt_path(video.id, &target.to_string_lossy()))?;
        Ok(())
    }

    // ------------------------------------------------------------ layer 3

    async fn layer_vision(
        &self,
        video: &Video,
        cancel: &CancelToken,
        outcome: &mut IndexOutcome,
    ) -> Result<()> {
        let Some(vision) = self.deps.vision.clone() else {
            warn!("no vision provider configured, skipping description layer");
            return self.db(|db| db.complete_layer(video.id, 4, IndexStatus::Completed));
        };

        let all_clips = self.db(|db| db.clips_for_video(video.id))?;
        let scene_index: HashMap<ClipId, usize> = all_clips
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();

        let checkpoint = self
            .db(|db| db.get_video(video.id))?
            .and_then(|v| v.last_processed_clip);
        let pending = self.db(|db| db.clips_after_checkpoint(video.id, checkpoint))?;
        let thumbs_dir = self.thumbnails_dir(Path::new(&video.file_path));

        for clip in pending {
            if cancel.is_cancelled() {
                return Err(FindItError::Cancelled);
            }
            let frames = scene_frames(&thumbs_dir, scene_index.get(&clip.id).copied());
            if frames.is_empty() {
                debug!("no keyframes for clip {}, skipping", clip.id);
                self.db(|db| db.advance_checkpoint(video.id, clip.id))?;
                continue;
            }

            let described = self
                .guarded(cancel, || {
                    let vision = vision.clone();
                    let frames = frames.clone();
                    async move { vision.describe(&frames).await }
                })
                .await;
            match described {
                Ok(desc) => {
                    self.db(|db| db.apply_clip_description(video.id, clip.id, &desc))?;
                    outcome.clips_analyzed += 1;
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    // A clip the provider cannot describe does not fail the
                    // video; it is skipped and the checkpoint still advances
                    warn!("vision failed for clip {}: {}", clip.id, e);
                    self.db(|db| db.advance_checkpoint(video.id, clip.id))?;
                }
            }
        }

        self.db(|db| db.complete_layer(video.id, 4, IndexStatus::Completed))
    }

    // ------------------------------------------------------------ layer 4

    async fn layer_embeddings(
        &self,
        video: &Video,
        cancel: &CancelToken,
        outcome: &mut IndexOutcome,
    ) -> Result<()> {
        let finish = |db: &FolderDb| db.complete_layer(video.id, 4, IndexStatus::Completed);

        let Some(embedder) = self.deps.embedder.clone() else {
            return self.db(finish);
        };
        if !embedder.is_available() {
            warn!("embedding provider {} unavailable, skipping", embedder.name());
            return self.db(finish);
        }

        let checkpoint = self
            .db(|db| db.get_video(video.id))?
            .and_then(|v| v.last_processed_clip);
        let pending = self.db(|db| db.clips_after_checkpoint(video.id, checkpoint))?;

        for clip in pending {
            if cancel.is_cancelled() {
                return Err(FindItError::Cancelled);
            }
            let text = compose_embedding_text(&clip);
            if text.is_empty() {
                self.db(|db| db.advance_checkpoint(video.id, clip.id))?;
                continue;
            }

            let embedded = self
                .guarded(cancel, || {
                    let embedder = embedder.clone();
                    let text = text.clone();
                    async move { embedder.embed(&text).await }
                })
                .await;
            match embedded {
                Ok(mut vector) => {
                    if vector.len() != embedder.dimensions() {
                        warn!(
                            "embedding for clip {} has {} dims, expected {}",
                            clip.id,
                            vector.len(),
                            embedder.dimensions()
                        );
                        self.db(|db| db.advance_checkpoint(video.id, clip.id))?;
                        continue;
                    }
                    l2_normalize(&mut vector);
                    let blob = encode_embedding(&vector);
                    self.db(|db| {
                        db.apply_clip_embedding(video.id, clip.id, &blob, embedder.name())
                    })?;
                    outcome.clips_embedded += 1;
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!("embedding failed for clip {}: {}", clip.id, e);
                    self.db(|db| db.advance_checkpoint(video.id, clip.id))?;
                }
            }
        }

        self.db(finish)
    }

    // -------------------------------------------------------------- helpers

    fn thumbnails_dir(&self, video_path: &Path) -> PathBuf {
        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        self.folder_root
            .join(INDEX_DIR_NAME)
            .join("thumbnails")
            .join(stem)
    }

    /// Gate one external call on connectivity and quota, with retry on
    /// reported rate limiting
    async fn guarded<T, Fut>(
        &self,
        cancel: &CancelToken,
        mut call: impl FnMut() -> Fut,
    ) -> Result<T>
    where
        Fut: std::future::Future<Output = Result<T>>,
    {
        loop {
            if cancel.is_cancelled() {
                return Err(FindItError::Cancelled);
            }
            self.deps
                .network
                .wait_for_connection(NETWORK_WAIT, cancel)
                .await?;
            tokio::select! {
                () = cancel.cancelled() => return Err(FindItError::Cancelled),
                () = self.deps.rate_limiter.acquire() => {}
            }
            if self.background_throttle {
                pre_sleep_under_load().await;
            }

            match call().await {
                Ok(value) => {
                    self.deps.rate_limiter.report_success().await;
                    return Ok(value);
                }
                Err(FindItError::RateLimitExceeded(provider)) => {
                    debug!("rate limited by {}, backing off", provider);
                    self.deps.rate_limiter.report_rate_limit().await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Gather a scene's keyframe files, sorted by frame number
fn scene_frames(thumbs_dir: &Path, scene_index: Option<usize>) -> Vec<PathBuf> {
    let Some(index) = scene_index else {
        return Vec::new();
    };
    let prefix = format!("scene_{index:03}_frame_");
    let Ok(entries) = std::fs::read_dir(thumbs_dir) else {
        return Vec::new();
    };
    let mut frames: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix) && n.ends_with(".jpg"))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();
    frames
}

/// Concatenate every transcript segment overlapping `[start, end)`
fn transcript_for_span(segments: &[TranscriptSegment], start: f64, end: f64) -> String {
    segments
        .iter()
        .filter(|s| s.start < end && s.end > start)
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// CJK-aware speech score: CJK text counts characters, Latin counts tokens
fn speech_score(text: &str) -> usize {
    let cjk_chars = text.chars().filter(|&c| crate::search::is_cjk(c)).count();
    if cjk_chars > 0 {
        cjk_chars
    } else {
        text.split_whitespace().count()
    }
}

/// Content hash: file length plus the leading bytes, SHA-256
///
/// Hashing whole camera files would dominate the metadata layer; the length
/// header keeps same-prefix files apart.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();

    let mut hasher = Sha256::new();
    hasher.update(len.to_le_bytes());

    let mut remaining = HASH_PREFIX_BYTES;
    let mut buf = vec![0u8; 64 * 1024];
    while remaining > 0 {
        let want = remaining.min(buf.len());
        let read = file.read(&mut buf[..want])?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        remaining -= read;
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn epoch_secs(time: Option<std::time::SystemTime>) -> Option<i64> {
    time.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}

fn expect_video(video: Option<Video>) -> Result<Video> {
    video.ok_or_else(|| FindItError::InvalidData("video row vanished mid-index".to_string()))
}

fn is_storage_error(e: &FindItError) -> bool {
    matches!(
        e,
        FindItError::Database(_)
            | FindItError::MigrationFailed { .. }
            | FindItError::IndexDirCreate(_)
            | FindItError::SyncConstraint(_)
    )
}

/// Briefly yield when the host is busy; background mode only
async fn pre_sleep_under_load() {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let load = std::fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|s| {
            s.split_whitespace()
                .next()
                .and_then(|v| v.parse::<f64>().ok())
        });
    if let Some(load) = load {
        if load > cpus as f64 {
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_overlap_mapping() {
        let segments = vec![
            TranscriptSegment {
                index: 0,
                start: 0.0,
                end: 2.0,
                text: "first".to_string(),
            },
            TranscriptSegment {
                index: 1,
                start: 1.5,
                end: 4.0,
                text: "second".to_string(),
            },
            TranscriptSegment {
                index: 2,
                start: 6.0,
                end: 8.0,
                text: "third".to_string(),
            },
        ];
        assert_eq!(transcript_for_span(&segments, 0.0, 3.0), "first second");
        assert_eq!(transcript_for_span(&segments, 4.0, 6.0), "");
        assert_eq!(transcript_for_span(&segments, 7.0, 9.0), "third");
        // Touching endpoints do not overlap a half-open span
        assert_eq!(transcript_for_span(&segments, 8.0, 10.0), "");
    }

    #[test]
    fn test_speech_score_cjk_vs_latin() {
        assert_eq!(speech_score("hello there friend"), 3);
        assert_eq!(speech_score("你好世界"), 4);
        assert_eq!(speech_score(""), 0);
        assert_eq!(speech_score("   "), 0);
    }

    #[test]
    fn test_compute_file_hash_distinguishes_length() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"same prefix").unwrap();
        std::fs::write(&b, b"same prefix plus more").unwrap();
        let ha = compute_file_hash(&a).unwrap();
        let hb = compute_file_hash(&b).unwrap();
        assert_ne!(ha, hb);
        assert_eq!(ha, compute_file_hash(&a).unwrap());
    }

    #[test]
    fn test_scene_frames_missing_dir() {
        assert!(scene_frames(Path::new("/nonexistent"), Some(0)).is_empty());
        assert!(scene_frames(Path::new("/tmp"), None).is_empty());
    }
}
