//! Self-healing operations: path rebase, orphan recovery, index reset
//!
//! Folders move, volumes get renamed, files vanish. These operations repair
//! the stores without re-running the indexing pipeline wherever possible.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::params;
use tracing::{info, warn};

use crate::config::{folder_db_path, AppPaths, INDEX_DIR_NAME};
use crate::error::{FindItError, Result};
use crate::folder_db::{normalize_path, FolderDb};
use crate::global_db::GlobalDb;
use crate::indexer::compute_file_hash;
use crate::model::VideoId;

/// Outcome of a completed rebase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseReport {
    pub old_prefix: String,
    pub new_prefix: String,
    pub videos_rewritten: usize,
    pub srt_rewritten: usize,
    pub thumbnails_rewritten: usize,
}

/// Detect a moved folder and rewrite every absolute path under the old root
///
/// Returns `None` when the stored root already matches `current_path`.
/// Sidecar paths outside the old root (the app-support SRT fallback) are
/// deliberately left alone. Runs as a single transaction.
pub fn rebase_folder(folder_db: &FolderDb, current_path: &str) -> Result<Option<RebaseReport>> {
    let folder = folder_db
        .watched_folder()?
        .ok_or_else(|| FindItError::InvalidData("folder DB has no registered folder".to_string()))?;

    let old_prefix = normalize_path(&folder.folder_path);
    let new_prefix = normalize_path(current_path);
    if old_prefix == new_prefix {
        return Ok(None);
    }

    let conn = folder_db.conn();
    let tx = conn.unchecked_transaction()?;
    let old_len = old_prefix.len() as i64;

    tx.execute(
        "UPDATE watched_folders SET folder_path = ? WHERE folder_path = ?",
        params![new_prefix, old_prefix],
    )?;
    let videos_rewritten = tx.execute(
        "UPDATE videos SET file_path = ? || substr(file_path, ? + 1)
         WHERE substr(file_path, 1, ?) = ?",
        params![new_prefix, old_len, old_len, old_prefix],
    )?;
    let srt_rewritten = tx.execute(
        "UPDATE videos SET srt_path = ? || substr(srt_path, ? + 1)
         WHERE srt_path IS NOT NULL AND substr(srt_path, 1, ?) = ?",
        params![new_prefix, old_len, old_len, old_prefix],
    )?;
    let thumbnails_rewritten = tx.execute(
        "UPDATE clips SET thumbnail_path = ? || substr(thumbnail_path, ? + 1)
         WHERE thumbnail_path IS NOT NULL AND substr(thumbnail_path, 1, ?) = ?",
        params![new_prefix, old_len, old_len, old_prefix],
    )?;
    tx.commit()?;

    info!(
        "rebased {} -> {}: {} videos, {} srt, {} thumbnails",
        old_prefix, new_prefix, videos_rewritten, srt_rewritten, thumbnails_rewritten
    );
    Ok(Some(RebaseReport {
        old_prefix,
        new_prefix,
        videos_rewritten,
        srt_rewritten,
        thumbnails_rewritten,
    }))
}

/// Restore an orphaned video at a user-provided location
///
/// The replacement must carry the same content hash as the orphaned record;
/// on match the path is rewritten and the video returns to the status its
/// layer progress implies. Clips are untouched.
pub fn restore_orphan(folder_db: &FolderDb, video_id: VideoId, new_path: &Path) -> Result<()> {
    let video = folder_db
        .get_video(video_id)?
        .ok_or_else(|| FindItError::InvalidData(format!("no video {video_id}")))?;
    if video.orphaned_at.is_none() {
        return Err(FindItError::InvalidData(format!(
            "video {video_id} is not orphaned"
        )));
    }

    let stored_hash = video.file_hash.as_deref().ok_or_else(|| {
        FindItError::InvalidData(format!("video {video_id} has no stored content hash"))
    })?;
    let candidate_hash = compute_file_hash(new_path)?;
    if candidate_hash != stored_hash {
        return Err(FindItError::InvalidData(format!(
            "content hash mismatch for {}",
            new_path.display()
        )));
    }

    folder_db.restore_orphaned_video(video_id, &new_path.to_string_lossy())
}

/// Expired-orphan cleanup across both stores; returns removed video count
pub fn cleanup_expired_orphans(
    folder_db: &FolderDb,
    global_db: &GlobalDb,
    folder_path: &str,
    retention_days: i64,
) -> Result<usize> {
    let retention_secs = retention_days * 24 * 60 * 60;
    let cutoff = crate::model::now_epoch() - retention_secs;

    let expired: Vec<VideoId> = folder_db
        .list_orphaned()?
        .into_iter()
        .filter(|v| v.orphaned_at.is_some_and(|t| t <= cutoff))
        .map(|v| v.id)
        .collect();

    for video_id in &expired {
        global_db.remove_video_mirror(folder_path, *video_id)?;
    }
    folder_db.cleanup_expired_orphans(retention_secs)
}

/// Hard-delete one video and its dependents from both stores
pub fn remove_video(
    folder_db: &FolderDb,
    global_db: &GlobalDb,
    folder_path: &str,
    video_path: &str,
) -> Result<bool> {
    match folder_db.remove_video(video_path)? {
        Some(video_id) => {
            global_db.remove_video_mirror(folder_path, video_id)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// What a reset operation touches
#[derive(Debug, Clone)]
pub enum ResetScope {
    /// Aggregated DB and vector index files; folder DBs keep their truth
    Global,
    /// Vector index files only; rebuilt from stored blobs on next search
    Vectors,
    /// One folder's `.clip-index/` plus its global rows
    Folder { folder: PathBuf },
    /// Everything except source video files
    All { folders: Vec<PathBuf> },
}

/// Outcome (or plan, under dry-run) of a reset
#[derive(Debug, Clone, Default)]
pub struct ResetReport {
    pub dry_run: bool,
    pub removed_paths: Vec<PathBuf>,
    pub folders_cleared: Vec<String>,
}

/// Execute (or, with `dry_run`, only plan) a reset
pub fn reset(paths: &AppPaths, scope: &ResetScope, dry_run: bool) -> Result<ResetReport> {
    let mut report = ResetReport {
        dry_run,
        ..Default::default()
    };

    match scope {
        ResetScope::Vectors => {
            remove_files(&vector_files(paths), dry_run, &mut report)?;
        }
        ResetScope::Global => {
            remove_files(&global_files(paths), dry_run, &mut report)?;
        }
        ResetScope::Folder { folder } => {
            reset_folder(paths, folder, dry_run, &mut report)?;
        }
        ResetScope::All { folders } => {
            let mut seen = HashSet::new();
            for folder in folders {
                if seen.insert(folder.clone()) {
                    reset_folder(paths, folder, dry_run, &mut report)?;
                }
            }
            remove_files(&global_files(paths), dry_run, &mut report)?;
        }
    }

    info!(
        "reset {:?}{}: {} paths, {} folders",
        scope,
        if dry_run { " (dry run)" } else { "" },
        report.removed_paths.len(),
        report.folders_cleared.len()
    );
    Ok(report)
}

fn vector_files(paths: &AppPaths) -> Vec<PathBuf> {
    vec![paths.clip_vector_index(), paths.text_vector_index()]
}

fn global_files(paths: &AppPaths) -> Vec<PathBuf> {
    let db = paths.global_db();
    let mut files = vec![
        db.clone(),
        with_suffix(&db, "-wal"),
        with_suffix(&db, "-shm"),
    ];
    files.extend(vector_files(paths));
    files
}

fn reset_folder(
    paths: &AppPaths,
    folder: &Path,
    dry_run: bool,
    report: &mut ResetReport,
) -> Result<()> {
    let folder_str = normalize_path(&folder.to_string_lossy());
    report.folders_cleared.push(folder_str.clone());

    if !dry_run && paths.global_db().exists() {
        let global_db = GlobalDb::open(&paths.global_db())?;
        global_db.remove_folder_data(&folder_str)?;
    }

    let index_dir = folder.join(INDEX_DIR_NAME);
    if index_dir.exists() {
        report.removed_paths.push(index_dir.clone());
        if !dry_run {
            std::fs::remove_dir_all(&index_dir)?;
        }
    } else if folder_db_path(folder).exists() {
        warn!("index db without directory at {}", index_dir.display());
    }
    Ok(())
}

fn remove_files(files: &[PathBuf], dry_run: bool, report: &mut ResetReport) -> Result<()> {
    for file in files {
        if !file.exists() {
            continue;
        }
        report.removed_paths.push(file.clone());
        if !dry_run {
            std::fs::remove_file(file)?;
        }
    }
    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}
