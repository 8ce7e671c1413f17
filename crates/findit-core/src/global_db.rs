//! Per-user aggregated search store
//!
//! Holds lossy mirrors of every folder DB's videos and clips, the FTS index
//! over clip descriptors, per-folder sync cursors, and the search history.
//! All mirror writes are UPSERTs keyed by `(source_folder, source_id)`.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{FindItError, Result};
use crate::migrations::{
    apply_migrations, create_clips_fts, drop_clips_fts, global_migrations, FTS_WEIGHTS,
};
use crate::model::{
    now_epoch, tags_to_fts_tokens, Clip, ClipFilters, ClipId, ColorLabel, SearchHistoryEntry,
    SortBy, SyncMeta, Video, VideoId,
};

/// Hydration rows are fetched in id-batches below SQLite's bind limit
const HYDRATE_BATCH: usize = 900;

/// Display metadata for one search hit
#[derive(Debug, Clone)]
pub struct ClipResultData {
    pub clip_id: ClipId,
    pub source_folder: String,
    pub source_clip_id: i64,
    pub video_path: String,
    pub file_name: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub thumbnail_path: Option<String>,
    pub scene: String,
    pub description: String,
    pub transcript: String,
    pub tags: String,
    pub shot_type: String,
    pub mood: String,
    pub rating: i64,
    pub color_label: Option<ColorLabel>,
    pub duration_secs: f64,
    pub created_at: i64,
}

/// Aggregate counts for the stats surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalStats {
    pub folders: i64,
    pub videos: i64,
    pub clips: i64,
    pub clips_with_embeddings: i64,
    pub searches_recorded: i64,
}

/// Connection wrapper for the aggregated store
pub struct GlobalDb {
    conn: Connection,
}

impl GlobalDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|_| FindItError::IndexDirCreate(parent.to_path_buf()))?;
        }
        let conn = Connection::open(path)?;
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
        apply_migrations(&conn, global_migrations())?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // ---------------------------------------------------------------- mirrors

    /// UPSERT a folder-DB video into the mirror, returning the mirror id
    pub fn upsert_video_mirror(&self, source_folder: &str, video: &Video) -> Result<VideoId> {
        self.conn.execute(
            "INSERT INTO videos
             (source_folder, source_video_id, file_path, file_name, duration_secs,
              file_size, index_status, orphaned_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(source_folder, source_video_id) DO UPDATE SET
               file_path = excluded.file_path,
               file_name = excluded.file_name,
               duration_secs = excluded.duration_secs,
               file_size = excluded.file_size,
               index_status = excluded.index_status,
               orphaned_at = excluded.orphaned_at",
            params![
                source_folder,
                video.id,
                video.file_path,
                video.file_name,
                video.duration_secs,
                video.file_size,
                video.index_status.as_str(),
                video.orphaned_at
            ],
        )?;
        self.mirror_video_id(source_folder, video.id)?
            .ok_or_else(|| {
                FindItError::SyncConstraint(format!(
                    "video mirror missing after upsert: {source_folder}:{}",
                    video.id
                ))
            })
    }

    pub fn mirror_video_id(
        &self,
        source_folder: &str,
        source_video_id: VideoId,
    ) -> Result<Option<VideoId>> {
        self.conn
            .query_row(
                "SELECT id FROM videos WHERE source_folder = ? AND source_video_id = ?",
                params![source_folder, source_video_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// UPSERT a folder-DB clip into the mirror
    ///
    /// Overwrites every mirrored field so re-syncs after later layers refresh
    /// descriptors and vectors. Tags arrive as arrays and are stored as
    /// whitespace-joined tokens for the FTS index.
    pub fn upsert_clip_mirror(
        &self,
        source_folder: &str,
        clip: &Clip,
        mirror_video_id: VideoId,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO clips
             (source_folder, source_clip_id, video_id, start_secs, end_secs, thumbnail_path,
              scene, subjects, actions, objects, mood, shot_type, lighting, colors,
              description, transcript, tags, user_tags, rating, color_label,
              embedding, embedding_model, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(source_folder, source_clip_id) DO UPDATE SET
               video_id = excluded.video_id,
               start_secs = excluded.start_secs,
               end_secs = excluded.end_secs,
               thumbnail_path = excluded.thumbnail_path,
               scene = excluded.scene,
               subjects = excluded.subjects,
               actions = excluded.actions,
               objects = excluded.objects,
               mood = excluded.mood,
               shot_type = excluded.shot_type,
               lighting = excluded.lighting,
               colors = excluded.colors,
               description = excluded.description,
               transcript = excluded.transcript,
               tags = excluded.tags,
               user_tags = excluded.user_tags,
               rating = excluded.rating,
               color_label = excluded.color_label,
               embedding = excluded.embedding,
               embedding_model = excluded.embedding_model,
               created_at = excluded.created_at",
            params![
                source_folder,
                clip.id,
                mirror_video_id,
                clip.start_secs,
                clip.end_secs,
                clip.thumbnail_path,
                clip.scene,
                clip.subjects,
                clip.actions,
                clip.objects,
                clip.mood,
                clip.shot_type,
                clip.lighting,
                clip.colors,
                clip.description,
                clip.transcript,
                tags_to_fts_tokens(&clip.tags),
                tags_to_fts_tokens(&clip.user_tags),
                clip.rating,
                clip.color_label.map(ColorLabel::as_str),
                clip.embedding,
                clip.embedding_model,
                clip.created_at
            ],
        )?;
        Ok(())
    }

    /// Remove one video's mirror rows (cascades to its clips)
    pub fn remove_video_mirror(
        &self,
        source_folder: &str,
        source_video_id: VideoId,
    ) -> Result<()> {
        self.conn.execute(
            "DELETE FROM videos WHERE source_folder = ? AND source_video_id = ?",
            params![source_folder, source_video_id],
        )?;
        Ok(())
    }

    /// Drop every row belonging to a folder and its cursor, in one transaction
    pub fn remove_folder_data(&self, folder_path: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM clips WHERE source_folder = ?", [folder_path])?;
        tx.execute("DELETE FROM videos WHERE source_folder = ?", [folder_path])?;
        tx.execute("DELETE FROM sync_meta WHERE folder_path = ?", [folder_path])?;
        tx.commit()?;
        info!("removed global data for folder {}", folder_path);
        Ok(())
    }

    // -------------------------------------------------------------- sync meta

    pub fn get_sync_meta(&self, folder_path: &str) -> Result<Option<SyncMeta>> {
        self.conn
            .query_row(
                "SELECT folder_path, last_video_rowid, last_clip_rowid, last_synced_at, volume_uuid
                 FROM sync_meta WHERE folder_path = ?",
                [folder_path],
                |row| {
                    Ok(SyncMeta {
                        folder_path: row.get(0)?,
                        last_video_rowid: row.get(1)?,
                        last_clip_rowid: row.get(2)?,
                        last_synced_at: row.get(3)?,
                        volume_uuid: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn set_sync_meta(&self, meta: &SyncMeta) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_meta
             (folder_path, last_video_rowid, last_clip_rowid, last_synced_at, volume_uuid)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(folder_path) DO UPDATE SET
               last_video_rowid = excluded.last_video_rowid,
               last_clip_rowid = excluded.last_clip_rowid,
               last_synced_at = excluded.last_synced_at,
               volume_uuid = excluded.volume_uuid",
            params![
                meta.folder_path,
                meta.last_video_rowid,
                meta.last_clip_rowid,
                meta.last_synced_at,
                meta.volume_uuid
            ],
        )?;
        Ok(())
    }

    /// Reset both watermarks so the next sync re-upserts every row
    pub fn reset_sync_meta(&self, folder_path: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_meta SET last_video_rowid = 0, last_clip_rowid = 0
             WHERE folder_path = ?",
            [folder_path],
        )?;
        Ok(())
    }

    // -------------------------------------------------------------------- FTS

    /// BM25-ranked FTS hits; ranks are negative, smaller is better
    pub fn fts_search(&self, match_query: &str, limit: usize) -> Result<Vec<(ClipId, f64)>> {
        let weights = FTS_WEIGHTS
            .iter()
            .map(|w| format!("{w:.1}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT rowid, bm25(clips_fts, {weights}) AS rank
             FROM clips_fts WHERE clips_fts MATCH ?
             ORDER BY rank LIMIT ?"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = match stmt.query_map(params![match_query, limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        }) {
            Ok(rows) => rows,
            // Malformed MATCH syntax from raw user text is an empty result,
            // not a surfaced storage failure
            Err(rusqlite::Error::SqliteFailure(_, _)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut hits = Vec::new();
        for row in rows {
            match row {
                Ok(hit) => hits.push(hit),
                Err(rusqlite::Error::SqliteFailure(_, _)) => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            }
        }
        debug!("fts '{}' -> {} hits", match_query, hits.len());
        Ok(hits)
    }

    /// Rebuild the FTS index from the content table
    pub fn rebuild_fts(&self) -> Result<()> {
        self.conn
            .execute("INSERT INTO clips_fts(clips_fts) VALUES ('rebuild')", [])?;
        Ok(())
    }

    /// Drop and recreate the FTS table and triggers, then rebuild
    ///
    /// The restructure path for descriptor-column changes.
    pub fn recreate_fts(&self) -> Result<()> {
        drop_clips_fts(&self.conn)?;
        create_clips_fts(&self.conn)?;
        self.rebuild_fts()
    }

    // -------------------------------------------------------------- hydration

    /// Fetch display metadata for every mentioned clip id
    ///
    /// `folder_filter = Some(∅)` yields no rows (distinct from `None`, which
    /// disables folder filtering); `path_prefix` is a LIKE `prefix/%` match
    /// on the video path.
    pub fn hydrate_clips(
        &self,
        clip_ids: &[ClipId],
        folder_filter: Option<&HashSet<String>>,
        path_prefix: Option<&str>,
    ) -> Result<HashMap<ClipId, ClipResultData>> {
        let mut out = HashMap::with_capacity(clip_ids.len());
        if clip_ids.is_empty() {
            return Ok(out);
        }
        if let Some(filter) = folder_filter {
            if filter.is_empty() {
                return Ok(out);
            }
        }

        for batch in clip_ids.chunks(HYDRATE_BATCH) {
            let id_marks = vec!["?"; batch.len()].join(", ");
            let mut sql = format!(
                "SELECT c.id, c.source_folder, c.source_clip_id, v.file_path, v.file_name,
                        c.start_secs, c.end_secs, c.thumbnail_path, c.scene, c.description,
                        c.transcript, c.tags, c.shot_type, c.mood, c.rating, c.color_label,
                        v.duration_secs, c.created_at
                 FROM clips c JOIN videos v ON v.id = c.video_id
                 WHERE c.id IN ({id_marks})"
            );

            let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = batch
                .iter()
                .map(|id| Box::new(*id) as Box<dyn rusqlite::types::ToSql>)
                .collect();

            if let Some(filter) = folder_filter {
                let folder_marks = vec!["?"; filter.len()].join(", ");
                sql.push_str(&format!(" AND c.source_folder IN ({folder_marks})"));
                for folder in filter {
                    args.push(Box::new(folder.clone()));
                }
            }
            if let Some(prefix) = path_prefix {
                sql.push_str(" AND v.file_path LIKE ?");
                args.push(Box::new(format!("{}/%", prefix.trim_end_matches('/'))));
            }

            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params_from_iter(args.iter().map(|a| a.as_ref())),
                result_data_from_row,
            )?;
            for row in rows {
                let data = row?;
                out.insert(data.clip_id, data);
            }
        }
        Ok(out)
    }

    // ----------------------------------------------------------------- browse

    /// Filtered, sorted clip listing for the browse surface
    pub fn browse_clips(
        &self,
        folder: Option<&str>,
        filters: &ClipFilters,
        sort_by: SortBy,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ClipResultData>> {
        let mut sql = String::from(
            "SELECT c.id, c.source_folder, c.source_clip_id, v.file_path, v.file_name,
                    c.start_secs, c.end_secs, c.thumbnail_path, c.scene, c.description,
                    c.transcript, c.tags, c.shot_type, c.mood, c.rating, c.color_label,
                    v.duration_secs, c.created_at
             FROM clips c JOIN videos v ON v.id = c.video_id
             WHERE 1=1",
        );
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(folder) = folder {
            sql.push_str(" AND c.source_folder = ?");
            args.push(Box::new(folder.to_string()));
        }
        append_filter_sql(&mut sql, &mut args, filters);

        sql.push_str(match sort_by {
            // Browse has no query, relevance falls back to recency
            SortBy::Relevance | SortBy::Date => " ORDER BY c.created_at DESC, c.id ASC",
            SortBy::Duration => " ORDER BY (c.end_secs - c.start_secs) DESC, c.id ASC",
            SortBy::Rating => " ORDER BY c.rating DESC, c.id ASC",
        });
        sql.push_str(" LIMIT ? OFFSET ?");
        args.push(Box::new(limit as i64));
        args.push(Box::new(offset as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(args.iter().map(|a| a.as_ref())),
            result_data_from_row,
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_clip_result(&self, clip_id: ClipId) -> Result<Option<ClipResultData>> {
        let map = self.hydrate_clips(&[clip_id], None, None)?;
        Ok(map.into_values().next())
    }

    /// Every mirrored clip with an embedding for the given model family
    ///
    /// Model matching tolerates pluralized provider names.
    pub fn clips_with_embeddings(
        &self,
        model: &str,
    ) -> Result<Vec<(ClipId, Vec<u8>)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, embedding FROM clips
             WHERE embedding IS NOT NULL AND (embedding_model = ? OR embedding_model = ?)",
        )?;
        let plural = format!("{model}s");
        let rows = stmt.query_map(params![model, plural], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Every folder with mirrored rows
    pub fn list_folders(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT DISTINCT source_folder FROM videos ORDER BY source_folder")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Mirrored video lookup by absolute path
    pub fn get_video_by_path(&self, file_path: &str) -> Result<Option<(i64, String, String)>> {
        self.conn
            .query_row(
                "SELECT id, source_folder, index_status FROM videos WHERE file_path = ?",
                [file_path],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn stats(&self) -> Result<GlobalStats> {
        let folders: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT source_folder) FROM videos",
            [],
            |r| r.get(0),
        )?;
        let videos: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM videos", [], |r| r.get(0))?;
        let clips: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM clips", [], |r| r.get(0))?;
        let clips_with_embeddings: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM clips WHERE embedding IS NOT NULL",
            [],
            |r| r.get(0),
        )?;
        let searches_recorded: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM search_history", [], |r| r.get(0))?;
        Ok(GlobalStats {
            folders,
            videos,
            clips,
            clips_with_embeddings,
            searches_recorded,
        })
    }

    // ---------------------------------------------------------------- history

    pub fn add_search_history(&self, query: &str, result_count: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO search_history (query, created_at, result_count) VALUES (?, ?, ?)",
            params![query, now_epoch(), result_count],
        )?;
        Ok(())
    }

    pub fn recent_searches(&self, limit: usize) -> Result<Vec<SearchHistoryEntry>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, query, created_at, result_count FROM search_history
             ORDER BY id DESC LIMIT ?",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(SearchHistoryEntry {
                id: row.get(0)?,
                query: row.get(1)?,
                created_at: row.get(2)?,
                result_count: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn append_filter_sql(
    sql: &mut String,
    args: &mut Vec<Box<dyn rusqlite::types::ToSql>>,
    filters: &ClipFilters,
) {
    if let Some(min_rating) = filters.min_rating {
        sql.push_str(" AND c.rating >= ?");
        args.push(Box::new(min_rating));
    }
    if !filters.color_labels.is_empty() {
        let marks = vec!["?"; filters.color_labels.len()].join(", ");
        sql.push_str(&format!(" AND c.color_label IN ({marks})"));
        for label in &filters.color_labels {
            args.push(Box::new(label.as_str().to_string()));
        }
    }
    if !filters.shot_types.is_empty() {
        let marks = vec!["?"; filters.shot_types.len()].join(", ");
        sql.push_str(&format!(" AND c.shot_type IN ({marks})"));
        for shot in &filters.shot_types {
            args.push(Box::new(shot.clone()));
        }
    }
    if !filters.moods.is_empty() {
        let marks = vec!["?"; filters.moods.len()].join(", ");
        sql.push_str(&format!(" AND c.mood IN ({marks})"));
        for mood in &filters.moods {
            args.push(Box::new(mood.clone()));
        }
    }
}

fn result_data_from_row(row: &Row) -> rusqlite::Result<ClipResultData> {
    let color_label: Option<String> = row.get(15)?;
    Ok(ClipResultData {
        clip_id: row.get(0)?,
        source_folder: row.get(1)?,
        source_clip_id: row.get(2)?,
        video_path: row.get(3)?,
        file_name: row.get(4)?,
        start_secs: row.get(5)?,
        end_secs: row.get(6)?,
        thumbnail_path: row.get(7)?,
        scene: row.get(8)?,
        description: row.get(9)?,
        transcript: row.get(10)?,
        tags: row.get(11)?,
        shot_type: row.get(12)?,
        mood: row.get(13)?,
        rating: row.get(14)?,
        color_label: color_label.as_deref().and_then(ColorLabel::parse),
        duration_secs: row.get(16)?,
        created_at: row.get(17)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IndexStatus;

    fn mirror_video(id: VideoId, path: &str) -> Video {
        Video {
            id,
            folder_id: 1,
            file_path: path.to_string(),
            file_name: path.rsplit('/').next().unwrap_or(path).to_string(),
            duration_secs: 30.0,
            file_size: Some(1000),
            file_hash: None,
            modified_at: None,
            created_at: 0,
            indexed_at: None,
            index_status: IndexStatus::Completed,
            index_layer: 4,
            last_processed_clip: None,
            index_error: None,
            srt_path: None,
            stt_skipped_no_audio: false,
            orphaned_at: None,
        }
    }

    fn mirror_clip(id: ClipId, video_id: VideoId, description: &str) -> Clip {
        Clip {
            id,
            video_id,
            start_secs: 0.0,
            end_secs: 5.0,
            description: description.to_string(),
            tags: vec!["alpha".to_string(), "beta".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_video_mirror_upsert_is_stable() {
        let db = GlobalDb::in_memory().unwrap();
        let video = mirror_video(7, "/f/a.mp4");
        let first = db.upsert_video_mirror("/f", &video).unwrap();
        let second = db.upsert_video_mirror("/f", &video).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_clip_mirror_tags_become_tokens() {
        let db = GlobalDb::in_memory().unwrap();
        let vid = db.upsert_video_mirror("/f", &mirror_video(1, "/f/a.mp4")).unwrap();
        db.upsert_clip_mirror("/f", &mirror_clip(1, 1, "desc"), vid)
            .unwrap();

        let tags: String = db
            .conn
            .query_row("SELECT tags FROM clips WHERE source_clip_id = 1", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(tags, "alpha beta");
    }

    #[test]
    fn test_fts_finds_mirrored_clip() {
        let db = GlobalDb::in_memory().unwrap();
        let vid = db.upsert_video_mirror("/f", &mirror_video(1, "/f/a.mp4")).unwrap();
        db.upsert_clip_mirror("/f", &mirror_clip(1, 1, "osprey diving for fish"), vid)
            .unwrap();

        let hits = db.fts_search("osprey", 10).unwrap();
        assert_eq!(hits.len(), 1);
        // BM25 ranks are negative
        assert!(hits[0].1 < 0.0);

        // Rebuild is a no-op in steady state
        db.rebuild_fts().unwrap();
        assert_eq!(db.fts_search("osprey", 10).unwrap(), hits);

        db.recreate_fts().unwrap();
        assert_eq!(db.fts_search("osprey", 10).unwrap(), hits);
    }

    #[test]
    fn test_fts_malformed_query_is_empty_not_error() {
        let db = GlobalDb::in_memory().unwrap();
        assert!(db.fts_search("\"unbalanced", 10).unwrap().is_empty());
    }

    #[test]
    fn test_hydrate_respects_folder_filter_semantics() {
        let db = GlobalDb::in_memory().unwrap();
        let vid = db.upsert_video_mirror("/f", &mirror_video(1, "/f/a.mp4")).unwrap();
        db.upsert_clip_mirror("/f", &mirror_clip(1, 1, "x"), vid).unwrap();
        let clip_id: ClipId = db
            .conn
            .query_row("SELECT id FROM clips", [], |r| r.get(0))
            .unwrap();

        // None disables filtering
        assert_eq!(db.hydrate_clips(&[clip_id], None, None).unwrap().len(), 1);
        // Empty set means zero results
        let empty = HashSet::new();
        assert!(db
            .hydrate_clips(&[clip_id], Some(&empty), None)
            .unwrap()
            .is_empty());
        // Matching folder passes
        let mut filter = HashSet::new();
        filter.insert("/f".to_string());
        assert_eq!(
            db.hydrate_clips(&[clip_id], Some(&filter), None).unwrap().len(),
            1
        );
        // Path prefix filters
        assert_eq!(
            db.hydrate_clips(&[clip_id], None, Some("/f")).unwrap().len(),
            1
        );
        assert!(db
            .hydrate_clips(&[clip_id], None, Some("/other"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_remove_folder_data_clears_everything() {
        let db = GlobalDb::in_memory().unwrap();
        let vid = db.upsert_video_mirror("/f", &mirror_video(1, "/f/a.mp4")).unwrap();
        db.upsert_clip_mirror("/f", &mirror_clip(1, 1, "x"), vid).unwrap();
        db.set_sync_meta(&SyncMeta {
            folder_path: "/f".to_string(),
            last_video_rowid: 1,
            last_clip_rowid: 1,
            last_synced_at: 1,
            volume_uuid: None,
        })
        .unwrap();

        db.remove_folder_data("/f").unwrap();
        assert_eq!(db.stats().unwrap().clips, 0);
        assert!(db.get_sync_meta("/f").unwrap().is_none());
    }

    #[test]
    fn test_browse_filters_and_sorts() {
        let db = GlobalDb::in_memory().unwrap();
        let vid = db.upsert_video_mirror("/f", &mirror_video(1, "/f/a.mp4")).unwrap();
        for i in 1..=3 {
            let mut clip = mirror_clip(i, 1, "x");
            clip.rating = i;
            db.upsert_clip_mirror("/f", &clip, vid).unwrap();
        }

        let filters = ClipFilters {
            min_rating: Some(2),
            ..Default::default()
        };
        let rows = db
            .browse_clips(Some("/f"), &filters, SortBy::Rating, 10, 0)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].rating >= rows[1].rating);
    }

    #[test]
    fn test_search_history_appends() {
        let db = GlobalDb::in_memory().unwrap();
        db.add_search_history("kayak", 3).unwrap();
        db.add_search_history("osprey", 0).unwrap();
        let recent = db.recent_searches(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query, "osprey");
        assert_eq!(recent[1].result_count, 3);
    }
}
