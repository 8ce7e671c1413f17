//! Authoritative per-folder store
//!
//! Lives at `<folder>/.clip-index/index.sqlite`. Owns the watched-folder
//! record, its videos, and their clips; the global DB only ever holds a
//! replicated view of these rows.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::config::{folder_db_path, INDEX_DIR_NAME};
use crate::error::{FindItError, Result};
use crate::migrations::{apply_migrations, folder_migrations};
use crate::model::{
    decode_tags, encode_tags, now_epoch, Clip, ClipId, ColorLabel, FolderId, IndexStatus, Video,
    VideoId, WatchedFolder,
};
use crate::providers::ClipDescription;

/// Index-at-rest status implied by a completed-layer count
///
/// Used when an orphaned video is restored and has to return to the status
/// its layer progress implies.
pub fn status_for_layer(layer: i64) -> IndexStatus {
    match layer {
        0 => IndexStatus::Pending,
        1 => IndexStatus::MetadataDone,
        2 => IndexStatus::Pending,
        3 => IndexStatus::SttDone,
        _ => IndexStatus::Completed,
    }
}

/// Connection wrapper for one folder's store
pub struct FolderDb {
    conn: Connection,
}

impl FolderDb {
    /// Open (or create) the store for a watched folder
    pub fn open(folder: &Path) -> Result<Self> {
        if !folder.is_dir() {
            return Err(FindItError::FolderNotAccessible(folder.to_path_buf()));
        }
        let index_dir = folder.join(INDEX_DIR_NAME);
        std::fs::create_dir_all(&index_dir)
            .map_err(|_| FindItError::IndexDirCreate(index_dir.clone()))?;

        let conn = Connection::open(folder_db_path(folder))?;
        Self::from_connection(conn)
    }

    /// In-memory instance for tests
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        apply_migrations(&conn, folder_migrations())?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // ---------------------------------------------------------------- folders

    /// Register the folder record, returning the existing one when present
    pub fn register_folder(
        &self,
        folder_path: &str,
        volume_name: Option<&str>,
        volume_uuid: Option<&str>,
    ) -> Result<WatchedFolder> {
        let normalized = normalize_path(folder_path);
        self.conn.execute(
            "INSERT OR IGNORE INTO watched_folders (folder_path, volume_name, volume_uuid)
             VALUES (?, ?, ?)",
            params![normalized, volume_name, volume_uuid],
        )?;
        self.watched_folder()?
            .ok_or_else(|| FindItError::FolderNotAccessible(normalized.into()))
    }

    /// The folder record this store belongs to, if registered
    pub fn watched_folder(&self) -> Result<Option<WatchedFolder>> {
        self.conn
            .query_row(
                "SELECT id, folder_path, volume_name, volume_uuid, is_available,
                        total_files, indexed_files, created_at
                 FROM watched_folders LIMIT 1",
                [],
                folder_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn update_folder_counts(&self, id: FolderId, total: i64, indexed: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE watched_folders SET total_files = ?, indexed_files = ? WHERE id = ?",
            params![total, indexed, id],
        )?;
        Ok(())
    }

    pub fn set_folder_available(&self, id: FolderId, available: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE watched_folders SET is_available = ? WHERE id = ?",
            params![available, id],
        )?;
        Ok(())
    }

    // ----------------------------------------------------------------- videos

    /// Insert a discovered file as a pending video, returning its id
    ///
    /// Already-known paths return the existing id untouched.
    pub fn insert_pending_video(&self, folder_id: FolderId, file_path: &str) -> Result<VideoId> {
        if let Some(existing) = self.get_video_by_path(file_path)? {
            return Ok(existing.id);
        }
        let file_name = file_name_of(file_path);
        self.conn.execute(
            "INSERT INTO videos (folder_id, file_path, file_name) VALUES (?, ?, ?)",
            params![folder_id, file_path, file_name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Record metadata-layer output and advance to `metadata_done`
    pub fn apply_video_metadata(
        &self,
        folder_id: FolderId,
        file_path: &str,
        duration_secs: f64,
        file_size: Option<i64>,
        file_hash: Option<&str>,
        modified_at: Option<i64>,
    ) -> Result<VideoId> {
        let tx = self.conn.unchecked_transaction()?;
        let id = match tx
            .query_row(
                "SELECT id FROM videos WHERE file_path = ?",
                [file_path],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
        {
            Some(id) => {
                tx.execute(
                    "UPDATE videos
                     SET duration_secs = ?, file_size = ?, file_hash = ?, modified_at = ?,
                         index_layer = 1, index_status = 'metadata_done', index_error = NULL
                     WHERE id = ?",
                    params![duration_secs, file_size, file_hash, modified_at, id],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO videos
                     (folder_id, file_path, file_name, duration_secs, file_size, file_hash,
                      modified_at, index_layer, index_status)
                     VALUES (?, ?, ?, ?, ?, ?, ?, 1, 'metadata_done')",
                    params![
                        folder_id,
                        file_path,
                        file_name_of(file_path),
                        duration_secs,
                        file_size,
                        file_hash,
                        modified_at
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };
        tx.commit()?;
        Ok(id)
    }

    pub fn get_video(&self, id: VideoId) -> Result<Option<Video>> {
        self.conn
            .query_row(
                &format!("{VIDEO_SELECT} WHERE id = ?"),
                [id],
                video_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_video_by_path(&self, file_path: &str) -> Result<Option<Video>> {
        self.conn
            .query_row(
                &format!("{VIDEO_SELECT} WHERE file_path = ?"),
                [file_path],
                video_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn find_video_by_hash(&self, hash: &str) -> Result<Option<Video>> {
        self.conn
            .query_row(
                &format!("{VIDEO_SELECT} WHERE file_hash = ? LIMIT 1"),
                [hash],
                video_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_videos(&self, status: Option<IndexStatus>) -> Result<Vec<Video>> {
        let mut videos = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = self
                    .conn
                    .prepare_cached(&format!("{VIDEO_SELECT} WHERE index_status = ? ORDER BY id"))?;
                let rows = stmt.query_map([status.as_str()], video_from_row)?;
                for row in rows {
                    videos.push(row?);
                }
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare_cached(&format!("{VIDEO_SELECT} ORDER BY id"))?;
                let rows = stmt.query_map([], video_from_row)?;
                for row in rows {
                    videos.push(row?);
                }
            }
        }
        Ok(videos)
    }

    /// Videos with `rowid` beyond the sync watermark, ascending
    pub fn videos_after_rowid(&self, rowid: i64, limit: usize) -> Result<Vec<(i64, Video)>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{VIDEO_SELECT_ROWID} WHERE rowid > ? ORDER BY rowid ASC LIMIT ?"
        ))?;
        let rows = stmt.query_map(params![rowid, limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, video_from_row_offset(row, 1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Hard-delete a video and its dependents
    pub fn remove_video(&self, file_path: &str) -> Result<Option<VideoId>> {
        let Some(video) = self.get_video_by_path(file_path)? else {
            return Ok(None);
        };
        self.conn
            .execute("DELETE FROM videos WHERE id = ?", [video.id])?;
        info!("removed video {} and its clips", file_path);
        Ok(Some(video.id))
    }

    // -------------------------------------------------- index state machine

    /// Atomically replace a video's clips with freshly detected scenes
    ///
    /// Scene-layer completion: clip rows, thumbnails, and the layer advance
    /// commit together, so a crash can never leave half a scene list behind.
    pub fn complete_scene_layer(
        &self,
        video_id: VideoId,
        clips: &[(f64, f64, Option<String>)],
    ) -> Result<Vec<ClipId>> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM clips WHERE video_id = ?", [video_id])?;

        let mut ids = Vec::with_capacity(clips.len());
        for (start, end, thumbnail) in clips {
            tx.execute(
                "INSERT INTO clips (video_id, start_secs, end_secs, thumbnail_path)
                 VALUES (?, ?, ?, ?)",
                params![video_id, start, end, thumbnail],
            )?;
            ids.push(tx.last_insert_rowid());
        }
        tx.execute(
            "UPDATE videos
             SET index_layer = 2, index_status = 'pending', last_processed_clip = NULL
             WHERE id = ?",
            [video_id],
        )?;
        tx.commit()?;
        debug!("scene layer committed {} clips for video {}", ids.len(), video_id);
        Ok(ids)
    }

    /// Per-clip transcript commit plus checkpoint advance, one transaction
    pub fn apply_clip_transcript(
        &self,
        video_id: VideoId,
        clip_id: ClipId,
        transcript: &str,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE clips SET transcript = ? WHERE id = ? AND video_id = ?",
            params![transcript, clip_id, video_id],
        )?;
        tx.execute(
            "UPDATE videos SET last_processed_clip = ? WHERE id = ?",
            params![clip_id, video_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Per-clip vision-descriptor commit plus checkpoint advance
    pub fn apply_clip_description(
        &self,
        video_id: VideoId,
        clip_id: ClipId,
        desc: &ClipDescription,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE clips
             SET scene = ?, subjects = ?, actions = ?, objects = ?, mood = ?,
                 shot_type = ?, lighting = ?, colors = ?, description = ?, tags = ?
             WHERE id = ? AND video_id = ?",
            params![
                desc.scene,
                desc.subjects.join(", "),
                desc.actions.join(", "),
                desc.objects.join(", "),
                desc.mood,
                desc.shot_type,
                desc.lighting,
                desc.colors,
                desc.description,
                encode_tags(&desc.normalized_tags()),
                clip_id,
                video_id
            ],
        )?;
        tx.execute(
            "UPDATE videos SET last_processed_clip = ? WHERE id = ?",
            params![clip_id, video_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Per-clip embedding commit plus checkpoint advance
    pub fn apply_clip_embedding(
        &self,
        video_id: VideoId,
        clip_id: ClipId,
        embedding: &[u8],
        model: &str,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE clips SET embedding = ?, embedding_model = ? WHERE id = ? AND video_id = ?",
            params![embedding, model, clip_id, video_id],
        )?;
        tx.execute(
            "UPDATE videos SET last_processed_clip = ? WHERE id = ?",
            params![clip_id, video_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Advance the checkpoint past a clip the current layer skipped
    pub fn advance_checkpoint(&self, video_id: VideoId, clip_id: ClipId) -> Result<()> {
        self.conn.execute(
            "UPDATE videos SET last_processed_clip = ? WHERE id = ?",
            params![clip_id, video_id],
        )?;
        Ok(())
    }

    /// Close out a layer: advance the layer counter, set the status the layer
    /// leaves behind, and clear the per-clip checkpoint
    pub fn complete_layer(
        &self,
        video_id: VideoId,
        new_layer: i64,
        status: IndexStatus,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let indexed_at = (status == IndexStatus::Completed).then(now_epoch);
        tx.execute(
            "UPDATE videos
             SET index_layer = ?, index_status = ?, last_processed_clip = NULL,
                 indexed_at = COALESCE(?, indexed_at), index_error = NULL
             WHERE id = ?",
            params![new_layer, status.as_str(), indexed_at, video_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn fail_video(&self, video_id: VideoId, error: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE videos SET index_status = 'failed', index_error = ? WHERE id = ?",
            params![error, video_id],
        )?;
        Ok(())
    }

    /// Force-reindex reset: back to layer 0 with no checkpoint and no hash
    pub fn reset_video_index_state(&self, video_id: VideoId) -> Result<()> {
        self.conn.execute(
            "UPDATE videos
             SET index_layer = 0, index_status = 'pending', last_processed_clip = NULL,
                 file_hash = NULL, index_error = NULL
             WHERE id = ?",
            [video_id],
        )?;
        Ok(())
    }

    pub fn set_video_hash(&self, video_id: VideoId, hash: &str, modified_at: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE videos SET file_hash = ?, modified_at = ? WHERE id = ?",
            params![hash, modified_at, video_id],
        )?;
        Ok(())
    }

    pub fn set_video_srt_path(&self, video_id: VideoId, srt_path: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE videos SET srt_path = ? WHERE id = ?",
            params![srt_path, video_id],
        )?;
        Ok(())
    }

    pub fn set_stt_skipped_no_audio(&self, video_id: VideoId, skipped: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE videos SET stt_skipped_no_audio = ? WHERE id = ?",
            params![skipped, video_id],
        )?;
        Ok(())
    }

    // ---------------------------------------------------------------- orphans

    /// Flag a vanished file; its clips stay searchable until cleanup
    pub fn mark_video_orphaned(&self, video_id: VideoId) -> Result<()> {
        self.conn.execute(
            "UPDATE videos SET index_status = 'orphaned', orphaned_at = ? WHERE id = ?",
            params![now_epoch(), video_id],
        )?;
        Ok(())
    }

    pub fn list_orphaned(&self) -> Result<Vec<Video>> {
        self.list_videos(Some(IndexStatus::Orphaned))
    }

    /// Restore an orphan at a new location, returning it to the status its
    /// layer progress implies; clips are untouched
    pub fn restore_orphaned_video(&self, video_id: VideoId, new_path: &str) -> Result<()> {
        let video = self
            .get_video(video_id)?
            .ok_or_else(|| FindItError::InvalidData(format!("no video {video_id}")))?;
        let status = status_for_layer(video.index_layer);
        self.conn.execute(
            "UPDATE videos
             SET file_path = ?, file_name = ?, index_status = ?, orphaned_at = NULL
             WHERE id = ?",
            params![new_path, file_name_of(new_path), status.as_str(), video_id],
        )?;
        Ok(())
    }

    /// Hard-delete orphans past the retention window; returns removed count
    pub fn cleanup_expired_orphans(&self, retention_secs: i64) -> Result<usize> {
        let cutoff = now_epoch() - retention_secs;
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute(
            "DELETE FROM videos
             WHERE index_status = 'orphaned' AND orphaned_at IS NOT NULL AND orphaned_at <= ?",
            [cutoff],
        )?;
        tx.commit()?;
        if removed > 0 {
            info!("cleaned up {} expired orphaned videos", removed);
        }
        Ok(removed)
    }

    // ----------------------------------------------------------------- clips

    pub fn get_clip(&self, clip_id: ClipId) -> Result<Option<Clip>> {
        self.conn
            .query_row(&format!("{CLIP_SELECT} WHERE id = ?"), [clip_id], clip_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// All clips of a video, ordered by start time
    pub fn clips_for_video(&self, video_id: VideoId) -> Result<Vec<Clip>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{CLIP_SELECT} WHERE video_id = ? ORDER BY start_secs ASC"
        ))?;
        let rows = stmt.query_map([video_id], clip_from_row)?;
        let mut clips = Vec::new();
        for row in rows {
            clips.push(row?);
        }
        Ok(clips)
    }

    /// Clips beyond the resume checkpoint, ascending by id
    pub fn clips_after_checkpoint(
        &self,
        video_id: VideoId,
        checkpoint: Option<ClipId>,
    ) -> Result<Vec<Clip>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{CLIP_SELECT} WHERE video_id = ? AND id > ? ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![video_id, checkpoint.unwrap_or(0)], clip_from_row)?;
        let mut clips = Vec::new();
        for row in rows {
            clips.push(row?);
        }
        Ok(clips)
    }

    /// Clips with `rowid` beyond the sync watermark, ascending
    pub fn clips_after_rowid(&self, rowid: i64, limit: usize) -> Result<Vec<(i64, Clip)>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{CLIP_SELECT_ROWID} WHERE rowid > ? ORDER BY rowid ASC LIMIT ?"
        ))?;
        let rows = stmt.query_map(params![rowid, limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, clip_from_row_offset(row, 1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ------------------------------------------------------------ user edits

    pub fn add_user_tag(&self, clip_id: ClipId, tag: &str) -> Result<()> {
        let clip = self
            .get_clip(clip_id)?
            .ok_or_else(|| FindItError::InvalidData(format!("no clip {clip_id}")))?;
        let mut tags = clip.user_tags;
        let tag = tag.trim();
        if tag.is_empty() || tags.iter().any(|t| t == tag) {
            return Ok(());
        }
        tags.push(tag.to_string());
        self.conn.execute(
            "UPDATE clips SET user_tags = ? WHERE id = ?",
            params![encode_tags(&tags), clip_id],
        )?;
        Ok(())
    }

    pub fn remove_user_tag(&self, clip_id: ClipId, tag: &str) -> Result<()> {
        let clip = self
            .get_clip(clip_id)?
            .ok_or_else(|| FindItError::InvalidData(format!("no clip {clip_id}")))?;
        let tags: Vec<String> = clip.user_tags.into_iter().filter(|t| t != tag).collect();
        self.conn.execute(
            "UPDATE clips SET user_tags = ? WHERE id = ?",
            params![encode_tags(&tags), clip_id],
        )?;
        Ok(())
    }

    pub fn set_rating(&self, clip_id: ClipId, rating: i64) -> Result<()> {
        if !(0..=5).contains(&rating) {
            return Err(FindItError::InvalidData(format!(
                "rating {rating} outside 0..=5"
            )));
        }
        self.conn.execute(
            "UPDATE clips SET rating = ? WHERE id = ?",
            params![rating, clip_id],
        )?;
        Ok(())
    }

    pub fn set_color_label(&self, clip_id: ClipId, label: Option<ColorLabel>) -> Result<()> {
        self.conn.execute(
            "UPDATE clips SET color_label = ? WHERE id = ?",
            params![label.map(ColorLabel::as_str), clip_id],
        )?;
        Ok(())
    }
}

// --------------------------------------------------------------- row mapping

const VIDEO_SELECT: &str = "SELECT id, folder_id, file_path, file_name, duration_secs, file_size,
    file_hash, modified_at, created_at, indexed_at, index_status, index_layer,
    last_processed_clip, index_error, srt_path, stt_skipped_no_audio, orphaned_at FROM videos";

const VIDEO_SELECT_ROWID: &str =
    "SELECT rowid, id, folder_id, file_path, file_name, duration_secs, file_size,
    file_hash, modified_at, created_at, indexed_at, index_status, index_layer,
    last_processed_clip, index_error, srt_path, stt_skipped_no_audio, orphaned_at FROM videos";

const CLIP_SELECT: &str = "SELECT id, video_id, start_secs, end_secs, thumbnail_path, scene,
    subjects, actions, objects, mood, shot_type, lighting, colors, description, transcript,
    tags, user_tags, rating, color_label, embedding, embedding_model, created_at FROM clips";

const CLIP_SELECT_ROWID: &str =
    "SELECT rowid, id, video_id, start_secs, end_secs, thumbnail_path, scene,
    subjects, actions, objects, mood, shot_type, lighting, colors, description, transcript,
    tags, user_tags, rating, color_label, embedding, embedding_model, created_at FROM clips";

fn folder_from_row(row: &Row) -> rusqlite::Result<WatchedFolder> {
    Ok(WatchedFolder {
        id: row.get(0)?,
        folder_path: row.get(1)?,
        volume_name: row.get(2)?,
        volume_uuid: row.get(3)?,
        is_available: row.get(4)?,
        total_files: row.get(5)?,
        indexed_files: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn video_from_row(row: &Row) -> rusqlite::Result<Video> {
    video_from_row_offset(row, 0)
}

fn video_from_row_offset(row: &Row, o: usize) -> rusqlite::Result<Video> {
    let status: String = row.get(o + 10)?;
    Ok(Video {
        id: row.get(o)?,
        folder_id: row.get(o + 1)?,
        file_path: row.get(o + 2)?,
        file_name: row.get(o + 3)?,
        duration_secs: row.get(o + 4)?,
        file_size: row.get(o + 5)?,
        file_hash: row.get(o + 6)?,
        modified_at: row.get(o + 7)?,
        created_at: row.get(o + 8)?,
        indexed_at: row.get(o + 9)?,
        index_status: IndexStatus::parse(&status).unwrap_or(IndexStatus::Pending),
        index_layer: row.get(o + 11)?,
        last_processed_clip: row.get(o + 12)?,
        index_error: row.get(o + 13)?,
        srt_path: row.get(o + 14)?,
        stt_skipped_no_audio: row.get(o + 15)?,
        orphaned_at: row.get(o + 16)?,
    })
}

fn clip_from_row(row: &Row) -> rusqlite::Result<Clip> {
    clip_from_row_offset(row, 0)
}

fn clip_from_row_offset(row: &Row, o: usize) -> rusqlite::Result<Clip> {
    let tags: String = row.get(o + 15)?;
    let user_tags: String = row.get(o + 16)?;
    let color_label: Option<String> = row.get(o + 18)?;
    Ok(Clip {
        id: row.get(o)?,
        video_id: row.get(o + 1)?,
        start_secs: row.get(o + 2)?,
        end_secs: row.get(o + 3)?,
        thumbnail_path: row.get(o + 4)?,
        scene: row.get(o + 5)?,
        subjects: row.get(o + 6)?,
        actions: row.get(o + 7)?,
        objects: row.get(o + 8)?,
        mood: row.get(o + 9)?,
        shot_type: row.get(o + 10)?,
        lighting: row.get(o + 11)?,
        colors: row.get(o + 12)?,
        description: row.get(o + 13)?,
        transcript: row.get(o + 14)?,
        tags: decode_tags(&tags),
        user_tags: decode_tags(&user_tags),
        rating: row.get(o + 17)?,
        color_label: color_label.as_deref().and_then(ColorLabel::parse),
        embedding: row.get(o + 19)?,
        embedding_model: row.get(o + 20)?,
        created_at: row.get(o + 21)?,
    })
}

/// Strip trailing separators so prefix comparisons behave
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
