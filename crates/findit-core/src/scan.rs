//! Folder scanning
//!
//! Walks a watched folder for video files, registers new ones as pending
//! videos, flags vanished ones as orphaned, and refreshes the folder's
//! progress counters.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{FindItError, Result};
use crate::folder_db::{normalize_path, FolderDb};
use crate::model::{IndexStatus, WatchedFolder};

/// Extensions picked up by the scanner
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "m4v", "mkv", "webm", "avi", "mts", "m2ts", "mxf", "braw", "r3d", "mpg", "mpeg",
];

/// Outcome of one scan pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub discovered: usize,
    pub known: usize,
    pub orphaned: usize,
}

/// Register (or refresh) a folder and reconcile its video records with disk
pub fn scan_folder(folder_db: &FolderDb, folder: &Path) -> Result<(WatchedFolder, ScanReport)> {
    if !folder.is_dir() {
        return Err(FindItError::FolderNotAccessible(folder.to_path_buf()));
    }
    let folder_path = normalize_path(&folder.to_string_lossy());
    let record = folder_db.register_folder(&folder_path, None, None)?;

    let mut report = ScanReport::default();
    let mut found = std::collections::HashSet::new();

    walk(folder, &mut |file| {
        let path_str = file.to_string_lossy().into_owned();
        found.insert(path_str.clone());
        match folder_db.get_video_by_path(&path_str)? {
            Some(_) => report.known += 1,
            None => {
                folder_db.insert_pending_video(record.id, &path_str)?;
                report.discovered += 1;
            }
        }
        Ok(())
    })?;

    // Records whose file vanished transition to orphaned; their clips stay
    for video in folder_db.list_videos(None)? {
        if video.index_status == IndexStatus::Orphaned {
            continue;
        }
        if !found.contains(&video.file_path) && !Path::new(&video.file_path).exists() {
            debug!("marking vanished file orphaned: {}", video.file_path);
            folder_db.mark_video_orphaned(video.id)?;
            report.orphaned += 1;
        }
    }

    let total = found.len() as i64;
    let indexed = folder_db
        .list_videos(Some(IndexStatus::Completed))?
        .len() as i64;
    folder_db.update_folder_counts(record.id, total, indexed)?;

    info!(
        "scanned {}: {} new, {} known, {} orphaned",
        folder_path, report.discovered, report.known, report.orphaned
    );
    Ok((record, report))
}

/// Recursive walk skipping hidden directories (including `.clip-index`)
fn walk(dir: &Path, visit: &mut dyn FnMut(&Path) -> Result<()>) -> Result<()> {
    let entries = std::fs::read_dir(dir)?;
    let mut paths: Vec<_> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();

    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            walk(&path, visit)?;
        } else if is_video_file(&path) {
            visit(&path)?;
        }
    }
    Ok(())
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_discovers_and_orphans() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("sub/b.MOV"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        // Hidden dirs are skipped
        std::fs::create_dir_all(dir.path().join(".clip-index")).unwrap();
        std::fs::write(dir.path().join(".clip-index/c.mp4"), b"x").unwrap();

        let db = FolderDb::in_memory().unwrap();
        let (_, report) = scan_folder(&db, dir.path()).unwrap();
        assert_eq!(report.discovered, 2);
        assert_eq!(report.known, 0);

        // Second pass: nothing new
        let (_, report) = scan_folder(&db, dir.path()).unwrap();
        assert_eq!(report.discovered, 0);
        assert_eq!(report.known, 2);

        // Remove a file; the record orphans but survives
        std::fs::remove_file(dir.path().join("a.mp4")).unwrap();
        let (_, report) = scan_folder(&db, dir.path()).unwrap();
        assert_eq!(report.orphaned, 1);
        let orphans = db.list_orphaned().unwrap();
        assert_eq!(orphans.len(), 1);
        assert!(orphans[0].file_path.ends_with("a.mp4"));
    }

    #[test]
    fn test_scan_rejects_missing_folder() {
        let db = FolderDb::in_memory().unwrap();
        let err = scan_folder(&db, Path::new("/nonexistent/folder")).unwrap_err();
        assert!(matches!(err, FindItError::FolderNotAccessible(_)));
    }

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("/a/clip.MP4")));
        assert!(is_video_file(Path::new("/a/raw.braw")));
        assert!(!is_video_file(Path::new("/a/notes.txt")));
        assert!(!is_video_file(Path::new("/a/noext")));
    }
}
