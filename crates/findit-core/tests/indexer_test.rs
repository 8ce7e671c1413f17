//! End-to-end pipeline tests over fake collaborators

mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use common::{fake_deps, FakeEmbedder, FakeMedia, FakeStt, FakeVision};
use findit_core::{
    decode_embedding, scan_folder, AppPaths, CancelToken, FolderDb, IndexScheduler, IndexStatus,
    IndexerDeps, IndexingConfig, LayeredIndexer, PerformanceMode,
};

struct Fixture {
    _folder_dir: tempfile::TempDir,
    _support_dir: tempfile::TempDir,
    video_path: PathBuf,
    db: Arc<Mutex<FolderDb>>,
    folder_id: i64,
    folder_root: PathBuf,
    paths: AppPaths,
}

fn fixture() -> Fixture {
    common::init_tracing();
    let folder_dir = tempfile::tempdir().unwrap();
    let support_dir = tempfile::tempdir().unwrap();
    let video_path = folder_dir.path().join("clip.mp4");
    std::fs::write(&video_path, b"pretend this is sixty seconds of footage").unwrap();

    let db = FolderDb::open(folder_dir.path()).unwrap();
    let (folder, _) = scan_folder(&db, folder_dir.path()).unwrap();

    Fixture {
        video_path,
        folder_id: folder.id,
        folder_root: folder_dir.path().to_path_buf(),
        paths: AppPaths::rooted(support_dir.path()),
        db: Arc::new(Mutex::new(db)),
        _folder_dir: folder_dir,
        _support_dir: support_dir,
    }
}

fn indexer(fixture: &Fixture, deps: IndexerDeps) -> LayeredIndexer {
    LayeredIndexer::new(
        Arc::clone(&fixture.db),
        fixture.folder_id,
        fixture.folder_root.clone(),
        fixture.paths.clone(),
        IndexingConfig::default(),
        deps,
    )
}

fn full_deps(duration: f64) -> IndexerDeps {
    fake_deps(
        Arc::new(FakeMedia::new(duration, 10.0)),
        Some(Arc::new(FakeStt { duration })),
        Some(Arc::new(FakeVision::new())),
        Some(Arc::new(FakeEmbedder)),
    )
}

#[tokio::test]
async fn full_pipeline_produces_searchable_clips() {
    let fx = fixture();
    let idx = indexer(&fx, full_deps(60.0));

    let outcome = idx
        .index_video(&fx.video_path, false, &CancelToken::never())
        .await
        .unwrap();
    assert!(outcome.success, "outcome: {:?}", outcome.error);
    assert_eq!(outcome.clips_created, 6);
    assert_eq!(outcome.clips_analyzed, 6);
    assert_eq!(outcome.clips_embedded, 6);
    assert!(!outcome.stt_skipped_no_audio);

    let db = fx.db.lock().unwrap();
    let video = db
        .get_video_by_path(&fx.video_path.to_string_lossy())
        .unwrap()
        .unwrap();
    assert_eq!(video.index_status, IndexStatus::Completed);
    assert_eq!(video.index_layer, 4);
    assert_eq!(video.last_processed_clip, None);
    assert!(video.file_hash.is_some());
    assert!(video.srt_path.is_some());
    assert!(PathBuf::from(video.srt_path.unwrap()).exists());

    let clips = db.clips_for_video(video.id).unwrap();
    assert_eq!(clips.len(), 6);
    for (i, clip) in clips.iter().enumerate() {
        assert!(clip.start_secs < clip.end_secs);
        if i > 0 {
            assert!(clip.start_secs >= clips[i - 1].end_secs - 1e-9);
        }
        assert!(!clip.transcript.is_empty());
        assert!(!clip.description.is_empty());
        assert_eq!(clip.tags, vec!["kayak", "river"]);
        assert!(clip.thumbnail_path.is_some());

        // Embedding laws: word-aligned blob, unit norm, paired model name
        let blob = clip.embedding.as_ref().unwrap();
        assert_eq!(blob.len() % 4, 0);
        let vector = decode_embedding(blob).unwrap();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
        assert_eq!(clip.embedding_model.as_deref(), Some("fake-embedder"));
    }
}

#[tokio::test]
async fn completed_video_reindex_is_noop() {
    let fx = fixture();
    let idx = indexer(&fx, full_deps(60.0));
    idx.index_video(&fx.video_path, false, &CancelToken::never())
        .await
        .unwrap();

    let outcome = idx
        .index_video(&fx.video_path, false, &CancelToken::never())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.clips_created, 0);
    assert_eq!(outcome.clips_analyzed, 0);
    assert_eq!(outcome.clips_embedded, 0);
}

#[tokio::test]
async fn force_reindex_resets_and_rebuilds() {
    let fx = fixture();
    let idx = indexer(&fx, full_deps(60.0));
    idx.index_video(&fx.video_path, false, &CancelToken::never())
        .await
        .unwrap();

    let outcome = idx
        .index_video(&fx.video_path, true, &CancelToken::never())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.clips_created, 6);
}

#[tokio::test]
async fn vision_layer_resumes_from_checkpoint() {
    let fx = fixture();

    // First attempt dies after the third description lands
    let interrupted = Arc::new(FakeVision::cancelling_after(3));
    let deps = fake_deps(
        Arc::new(FakeMedia::new(60.0, 10.0)),
        Some(Arc::new(FakeStt { duration: 60.0 })),
        Some(interrupted.clone()),
        Some(Arc::new(FakeEmbedder)),
    );
    let idx = indexer(&fx, deps);
    let outcome = idx
        .index_video(&fx.video_path, false, &CancelToken::never())
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("cancelled"));
    assert_eq!(outcome.clips_analyzed, 3);

    let (video_id, checkpoint, layer, third_clip) = {
        let db = fx.db.lock().unwrap();
        let video = db
            .get_video_by_path(&fx.video_path.to_string_lossy())
            .unwrap()
            .unwrap();
        let clips = db.clips_for_video(video.id).unwrap();
        (
            video.id,
            video.last_processed_clip,
            video.index_layer,
            clips[2].id,
        )
    };
    assert_eq!(checkpoint, Some(third_clip));
    assert_eq!(layer, 3);

    // Second attempt with a healthy provider processes only clips 4..6
    let resumed_vision = Arc::new(FakeVision::new());
    let deps = fake_deps(
        Arc::new(FakeMedia::new(60.0, 10.0)),
        Some(Arc::new(FakeStt { duration: 60.0 })),
        Some(resumed_vision.clone()),
        Some(Arc::new(FakeEmbedder)),
    );
    let idx = indexer(&fx, deps);
    let outcome = idx
        .index_video(&fx.video_path, false, &CancelToken::never())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.clips_analyzed, 3);
    assert_eq!(
        resumed_vision.calls.load(std::sync::atomic::Ordering::SeqCst),
        3
    );

    let db = fx.db.lock().unwrap();
    let video = db.get_video(video_id).unwrap().unwrap();
    assert_eq!(video.index_status, IndexStatus::Completed);
    assert_eq!(video.index_layer, 4);
    // Every clip described exactly once across both attempts
    for clip in db.clips_for_video(video_id).unwrap() {
        assert!(!clip.description.is_empty());
    }
}

#[tokio::test]
async fn silent_video_skips_stt_and_still_completes() {
    let fx = fixture();
    let mut media = FakeMedia::new(30.0, 10.0);
    media.has_audio = false;
    let deps = fake_deps(
        Arc::new(media),
        Some(Arc::new(FakeStt { duration: 30.0 })),
        Some(Arc::new(FakeVision::new())),
        Some(Arc::new(FakeEmbedder)),
    );
    let idx = indexer(&fx, deps);

    let outcome = idx
        .index_video(&fx.video_path, false, &CancelToken::never())
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(outcome.stt_skipped_no_audio);

    let db = fx.db.lock().unwrap();
    let video = db
        .get_video_by_path(&fx.video_path.to_string_lossy())
        .unwrap()
        .unwrap();
    assert!(video.stt_skipped_no_audio);
    assert_eq!(video.index_status, IndexStatus::Completed);
    for clip in db.clips_for_video(video.id).unwrap() {
        assert!(clip.transcript.is_empty());
        assert!(!clip.description.is_empty());
    }
}

#[tokio::test]
async fn scheduler_single_concurrency_preserves_submission_order() {
    let folder_dir = tempfile::tempdir().unwrap();
    let support_dir = tempfile::tempdir().unwrap();
    let mut video_paths = Vec::new();
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        let p = folder_dir.path().join(name);
        std::fs::write(&p, format!("footage {name}")).unwrap();
        video_paths.push(p);
    }
    let db = FolderDb::open(folder_dir.path()).unwrap();
    let (folder, _) = scan_folder(&db, folder_dir.path()).unwrap();

    let idx = LayeredIndexer::new(
        Arc::new(Mutex::new(db)),
        folder.id,
        folder_dir.path().to_path_buf(),
        AppPaths::rooted(support_dir.path()),
        IndexingConfig::default(),
        full_deps(20.0),
    );
    let scheduler = IndexScheduler::new(idx, PerformanceMode::Background);

    let order: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
    let order_ref = Arc::clone(&order);
    let report = scheduler
        .run(
            video_paths.clone(),
            false,
            Some(Arc::new(move |outcome| {
                order_ref.lock().unwrap().push(outcome.video_path.clone());
            })),
        )
        .await
        .unwrap();

    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.clips_created, 6);
    assert_eq!(*order.lock().unwrap(), video_paths);
}

#[tokio::test]
async fn cancelled_scheduler_reports_cancelled_not_failed() {
    let folder_dir = tempfile::tempdir().unwrap();
    let support_dir = tempfile::tempdir().unwrap();
    let video = folder_dir.path().join("a.mp4");
    std::fs::write(&video, b"footage").unwrap();
    let db = FolderDb::open(folder_dir.path()).unwrap();
    let (folder, _) = scan_folder(&db, folder_dir.path()).unwrap();

    let idx = LayeredIndexer::new(
        Arc::new(Mutex::new(db)),
        folder.id,
        folder_dir.path().to_path_buf(),
        AppPaths::rooted(support_dir.path()),
        IndexingConfig::default(),
        full_deps(20.0),
    );
    let scheduler = IndexScheduler::new(idx, PerformanceMode::Background);
    scheduler.cancel();

    let report = scheduler.run(vec![video], false, None).await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.succeeded, 0);
}
