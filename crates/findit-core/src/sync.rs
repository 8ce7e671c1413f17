//! Incremental folder→global replication
//!
//! Rows flow one way, keyed by monotonic rowid watermarks stored per folder
//! in the global DB. Replication is an UPSERT workload, so re-running sync at
//! any time is safe; `force_sync` resets the watermarks to re-upsert
//! everything (payload refills that do not change rowids).

use tracing::{debug, info};

use crate::error::Result;
use crate::folder_db::FolderDb;
use crate::global_db::GlobalDb;
use crate::model::{now_epoch, SyncMeta};

/// Rows replicated per batch
pub const SYNC_BATCH: usize = 500;

/// Outcome counters for one sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub videos_synced: usize,
    pub clips_synced: usize,
}

/// Replicate new folder-DB rows into the global DB
///
/// `folder_path` is the normalized watched-folder path, which keys both the
/// sync cursor and every mirrored row.
pub fn sync_folder(
    folder_db: &FolderDb,
    global_db: &GlobalDb,
    folder_path: &str,
) -> Result<SyncReport> {
    let meta = global_db.get_sync_meta(folder_path)?;
    let (mut video_watermark, mut clip_watermark, volume_uuid) = match &meta {
        Some(m) => (m.last_video_rowid, m.last_clip_rowid, m.volume_uuid.clone()),
        None => (0, 0, None),
    };
    let initial = (video_watermark, clip_watermark);
    let mut report = SyncReport::default();

    loop {
        let batch = folder_db.videos_after_rowid(video_watermark, SYNC_BATCH)?;
        if batch.is_empty() {
            break;
        }
        let partial = batch.len() < SYNC_BATCH;
        for (rowid, video) in &batch {
            global_db.upsert_video_mirror(folder_path, video)?;
            video_watermark = video_watermark.max(*rowid);
        }
        report.videos_synced += batch.len();
        debug!("synced {} video rows for {}", batch.len(), folder_path);
        if partial {
            break;
        }
    }

    loop {
        let batch = folder_db.clips_after_rowid(clip_watermark, SYNC_BATCH)?;
        if batch.is_empty() {
            break;
        }
        let partial = batch.len() < SYNC_BATCH;
        for (rowid, clip) in &batch {
            // Videos replicate before clips, so the owner is always mirrored
            // by now; anything else is a broken foreign relationship.
            let mirror_video_id = global_db
                .mirror_video_id(folder_path, clip.video_id)?
                .ok_or_else(|| {
                    crate::error::FindItError::SyncConstraint(format!(
                        "clip {} references unmirrored video {}",
                        clip.id, clip.video_id
                    ))
                })?;
            global_db.upsert_clip_mirror(folder_path, clip, mirror_video_id)?;
            clip_watermark = clip_watermark.max(*rowid);
        }
        report.clips_synced += batch.len();
        debug!("synced {} clip rows for {}", batch.len(), folder_path);
        if partial {
            break;
        }
    }

    if (video_watermark, clip_watermark) != initial || meta.is_none() {
        global_db.set_sync_meta(&SyncMeta {
            folder_path: folder_path.to_string(),
            last_video_rowid: video_watermark,
            last_clip_rowid: clip_watermark,
            last_synced_at: now_epoch(),
            volume_uuid,
        })?;
        info!(
            "synced {}: {} videos, {} clips (watermarks {}, {})",
            folder_path, report.videos_synced, report.clips_synced, video_watermark, clip_watermark
        );
    }

    Ok(report)
}

/// Reset the folder's watermarks and re-upsert every row
pub fn force_sync(
    folder_db: &FolderDb,
    global_db: &GlobalDb,
    folder_path: &str,
) -> Result<SyncReport> {
    global_db.reset_sync_meta(folder_path)?;
    sync_folder(folder_db, global_db, folder_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IndexStatus;

    fn seeded_folder(videos: usize, clips_per_video: usize) -> FolderDb {
        let db = FolderDb::in_memory().unwrap();
        let folder = db.register_folder("/footage", None, None).unwrap();
        for v in 0..videos {
            let vid = db
                .apply_video_metadata(
                    folder.id,
                    &format!("/footage/v{v}.mp4"),
                    30.0,
                    Some(100),
                    None,
                    None,
                )
                .unwrap();
            let spans: Vec<(f64, f64, Option<String>)> = (0..clips_per_video)
                .map(|c| (c as f64 * 5.0, (c + 1) as f64 * 5.0, None))
                .collect();
            db.complete_scene_layer(vid, &spans).unwrap();
        }
        db
    }

    #[test]
    fn test_incremental_sync_watermarks() {
        // Seed: 2 videos, 5 clips total (3 + 2)
        let folder_db = FolderDb::in_memory().unwrap();
        let folder = folder_db.register_folder("/footage", None, None).unwrap();
        let v1 = folder_db
            .apply_video_metadata(folder.id, "/footage/v1.mp4", 30.0, None, None, None)
            .unwrap();
        folder_db
            .complete_scene_layer(v1, &[(0.0, 5.0, None), (5.0, 10.0, None), (10.0, 15.0, None)])
            .unwrap();
        let v2 = folder_db
            .apply_video_metadata(folder.id, "/footage/v2.mp4", 30.0, None, None, None)
            .unwrap();
        folder_db
            .complete_scene_layer(v2, &[(0.0, 5.0, None), (5.0, 10.0, None)])
            .unwrap();

        let global_db = GlobalDb::in_memory().unwrap();
        let report = sync_folder(&folder_db, &global_db, "/footage").unwrap();
        assert_eq!(report.videos_synced, 2);
        assert_eq!(report.clips_synced, 5);

        let stats = global_db.stats().unwrap();
        assert_eq!(stats.videos, 2);
        assert_eq!(stats.clips, 5);
        let meta = global_db.get_sync_meta("/footage").unwrap().unwrap();
        assert_eq!((meta.last_video_rowid, meta.last_clip_rowid), (2, 5));

        // Add 1 video + 3 clips
        let v3 = folder_db
            .apply_video_metadata(folder.id, "/footage/v3.mp4", 30.0, None, None, None)
            .unwrap();
        folder_db
            .complete_scene_layer(v3, &[(0.0, 5.0, None), (5.0, 10.0, None), (10.0, 15.0, None)])
            .unwrap();

        let report = sync_folder(&folder_db, &global_db, "/footage").unwrap();
        assert_eq!(report.videos_synced, 1);
        assert_eq!(report.clips_synced, 3);
        let stats = global_db.stats().unwrap();
        assert_eq!(stats.videos, 3);
        assert_eq!(stats.clips, 8);
        let meta = global_db.get_sync_meta("/footage").unwrap().unwrap();
        assert_eq!((meta.last_video_rowid, meta.last_clip_rowid), (3, 8));

        // Third sync with no changes: nothing moves
        let before = global_db.get_sync_meta("/footage").unwrap().unwrap();
        let report = sync_folder(&folder_db, &global_db, "/footage").unwrap();
        assert_eq!(report, SyncReport::default());
        let after = global_db.get_sync_meta("/footage").unwrap().unwrap();
        assert_eq!(before.last_video_rowid, after.last_video_rowid);
        assert_eq!(before.last_clip_rowid, after.last_clip_rowid);
        assert_eq!(before.last_synced_at, after.last_synced_at);
    }

    #[test]
    fn test_sync_is_convergent() {
        let folder_db = seeded_folder(2, 2);
        let global_db = GlobalDb::in_memory().unwrap();

        sync_folder(&folder_db, &global_db, "/footage").unwrap();
        let report = sync_folder(&folder_db, &global_db, "/footage").unwrap();
        assert_eq!(report.videos_synced, 0);
        assert_eq!(report.clips_synced, 0);
    }

    #[test]
    fn test_force_sync_reupserts_payload() {
        let folder_db = seeded_folder(1, 2);
        let global_db = GlobalDb::in_memory().unwrap();
        sync_folder(&folder_db, &global_db, "/footage").unwrap();

        // Payload change without a rowid change: incremental sync misses it
        let clip = folder_db.clips_for_video(1).unwrap().remove(0);
        folder_db
            .apply_clip_transcript(1, clip.id, "heron takes off")
            .unwrap();
        sync_folder(&folder_db, &global_db, "/footage").unwrap();
        let hits = global_db.fts_search("heron", 10).unwrap();
        assert!(hits.is_empty());

        // Force sync re-upserts every row and refreshes the mirror
        let report = force_sync(&folder_db, &global_db, "/footage").unwrap();
        assert_eq!(report.clips_synced, 2);
        let hits = global_db.fts_search("heron", 10).unwrap();
        assert_eq!(hits.len(), 1);

        // Same clip set as a fresh sync of the same folder DB
        let fresh_global = GlobalDb::in_memory().unwrap();
        sync_folder(&folder_db, &fresh_global, "/footage").unwrap();
        assert_eq!(
            fresh_global.stats().unwrap().clips,
            global_db.stats().unwrap().clips
        );
    }

    #[test]
    fn test_status_updates_flow_through_resync() {
        let folder_db = seeded_folder(1, 1);
        let global_db = GlobalDb::in_memory().unwrap();
        sync_folder(&folder_db, &global_db, "/footage").unwrap();

        folder_db.complete_layer(1, 4, IndexStatus::Completed).unwrap();
        force_sync(&folder_db, &global_db, "/footage").unwrap();

        let status: String = global_db
            .conn()
            .query_row(
                "SELECT index_status FROM videos WHERE source_video_id = 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(status, "completed");
    }
}
