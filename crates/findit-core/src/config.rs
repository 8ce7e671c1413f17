//! Application paths and indexing knobs

use std::path::{Path, PathBuf};

use crate::error::{FindItError, Result};

/// Well-known per-user file locations
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
}

impl AppPaths {
    /// `<data-dir>/FindIt` (e.g. `~/.local/share/FindIt` on Linux)
    pub fn default_paths() -> Result<Self> {
        let data = dirs::data_dir()
            .ok_or_else(|| FindItError::FolderNotAccessible(PathBuf::from("<data-dir>")))?;
        Ok(Self {
            root: data.join("FindIt"),
        })
    }

    /// Rooted elsewhere, for tests
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn global_db(&self) -> PathBuf {
        self.root.join("search.sqlite")
    }

    pub fn clip_vector_index(&self) -> PathBuf {
        self.root.join("vectors").join("clip.idx")
    }

    pub fn text_vector_index(&self) -> PathBuf {
        self.root.join("vectors").join("text.idx")
    }

    /// Fallback directory for subtitle sidecars when the video's own
    /// directory is not writable
    pub fn srt_fallback_dir(&self) -> PathBuf {
        self.root.join("srt")
    }
}

/// Name of the per-folder index directory
pub const INDEX_DIR_NAME: &str = ".clip-index";

/// Folder DB location for a watched folder
pub fn folder_db_path(folder: &Path) -> PathBuf {
    folder.join(INDEX_DIR_NAME).join("index.sqlite")
}

/// Tunables for the indexing pipeline
#[derive(Debug, Clone)]
pub struct IndexingConfig {
    /// scdet threshold, 0..=100
    pub scene_threshold: f64,
    /// Boundaries closer than this merge into the running scene
    pub min_scene_len: f64,
    /// Thumbnails are scaled so the shorter edge equals this
    pub thumbnail_short_edge: u32,
    pub max_frames_per_scene: usize,
    /// Scenes sampled for language detection (the first is skipped)
    pub stt_sample_scenes: usize,
    pub stt_sample_rate: u32,
    /// Days an orphaned video survives before cleanup
    pub orphan_retention_days: i64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            scene_threshold: 10.0,
            min_scene_len: 1.0,
            thumbnail_short_edge: 480,
            max_frames_per_scene: 3,
            stt_sample_scenes: 3,
            stt_sample_rate: 16_000,
            orphan_retention_days: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derive_from_root() {
        let paths = AppPaths::rooted("/tmp/findit-test");
        assert_eq!(paths.global_db(), PathBuf::from("/tmp/findit-test/search.sqlite"));
        assert_eq!(
            paths.clip_vector_index(),
            PathBuf::from("/tmp/findit-test/vectors/clip.idx")
        );
        assert_eq!(
            paths.srt_fallback_dir(),
            PathBuf::from("/tmp/findit-test/srt")
        );
    }

    #[test]
    fn test_folder_db_path() {
        assert_eq!(
            folder_db_path(Path::new("/footage/trip")),
            PathBuf::from("/footage/trip/.clip-index/index.sqlite")
        );
    }
}
