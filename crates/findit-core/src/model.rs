//! Data model: folders, videos, clips, sync cursors
//!
//! Folder DBs own their rows; the global DB holds a replicated mirror keyed
//! by `(source_folder, source_id)`. Tags travel as JSON arrays in folder DBs
//! and as whitespace-joined token strings in the global mirror (FTS input).

use serde::{Deserialize, Serialize};

pub type FolderId = i64;
pub type VideoId = i64;
pub type ClipId = i64;

/// Indexing state of a video; advances monotonically toward `Completed`
/// except on explicit rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Pending,
    MetadataDone,
    SttDone,
    Completed,
    Failed,
    Orphaned,
}

impl IndexStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexStatus::Pending => "pending",
            IndexStatus::MetadataDone => "metadata_done",
            IndexStatus::SttDone => "stt_done",
            IndexStatus::Completed => "completed",
            IndexStatus::Failed => "failed",
            IndexStatus::Orphaned => "orphaned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(IndexStatus::Pending),
            "metadata_done" => Some(IndexStatus::MetadataDone),
            "stt_done" => Some(IndexStatus::SttDone),
            "completed" => Some(IndexStatus::Completed),
            "failed" => Some(IndexStatus::Failed),
            "orphaned" => Some(IndexStatus::Orphaned),
            _ => None,
        }
    }
}

/// Fixed color-label palette; a clip may also be unlabeled (`None` column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorLabel {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Gray,
}

impl ColorLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorLabel::Red => "red",
            ColorLabel::Orange => "orange",
            ColorLabel::Yellow => "yellow",
            ColorLabel::Green => "green",
            ColorLabel::Blue => "blue",
            ColorLabel::Purple => "purple",
            ColorLabel::Gray => "gray",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "red" => Some(ColorLabel::Red),
            "orange" => Some(ColorLabel::Orange),
            "yellow" => Some(ColorLabel::Yellow),
            "green" => Some(ColorLabel::Green),
            "blue" => Some(ColorLabel::Blue),
            "purple" => Some(ColorLabel::Purple),
            "gray" => Some(ColorLabel::Gray),
            _ => None,
        }
    }
}

/// A root directory the user registered for indexing
#[derive(Debug, Clone)]
pub struct WatchedFolder {
    pub id: FolderId,
    pub folder_path: String,
    pub volume_name: Option<String>,
    pub volume_uuid: Option<String>,
    pub is_available: bool,
    pub total_files: i64,
    pub indexed_files: i64,
    pub created_at: i64,
}

/// One record per source file within a folder
#[derive(Debug, Clone)]
pub struct Video {
    pub id: VideoId,
    pub folder_id: FolderId,
    pub file_path: String,
    pub file_name: String,
    pub duration_secs: f64,
    pub file_size: Option<i64>,
    pub file_hash: Option<String>,
    pub modified_at: Option<i64>,
    pub created_at: i64,
    pub indexed_at: Option<i64>,
    pub index_status: IndexStatus,
    /// Highest fully-completed layer, 0..=4
    pub index_layer: i64,
    /// Per-layer resume checkpoint: clips with id <= this are done
    pub last_processed_clip: Option<ClipId>,
    pub index_error: Option<String>,
    pub srt_path: Option<String>,
    pub stt_skipped_no_audio: bool,
    pub orphaned_at: Option<i64>,
}

/// The core search unit: a time range within a video plus its descriptors
#[derive(Debug, Clone, Default)]
pub struct Clip {
    pub id: ClipId,
    pub video_id: VideoId,
    pub start_secs: f64,
    pub end_secs: f64,
    pub thumbnail_path: Option<String>,
    pub scene: String,
    pub subjects: String,
    pub actions: String,
    pub objects: String,
    pub mood: String,
    pub shot_type: String,
    pub lighting: String,
    pub colors: String,
    pub description: String,
    pub transcript: String,
    pub tags: Vec<String>,
    pub user_tags: Vec<String>,
    pub rating: i64,
    pub color_label: Option<ColorLabel>,
    pub embedding: Option<Vec<u8>>,
    pub embedding_model: Option<String>,
    pub created_at: i64,
}

/// Per-folder replication cursor held by the global DB
#[derive(Debug, Clone)]
pub struct SyncMeta {
    pub folder_path: String,
    pub last_video_rowid: i64,
    pub last_clip_rowid: i64,
    pub last_synced_at: i64,
    pub volume_uuid: Option<String>,
}

/// Append-only search log entry
#[derive(Debug, Clone)]
pub struct SearchHistoryEntry {
    pub id: i64,
    pub query: String,
    pub created_at: i64,
    pub result_count: i64,
}

/// Post-search filters for browse and search surfaces
#[derive(Debug, Clone, Default)]
pub struct ClipFilters {
    pub min_rating: Option<i64>,
    pub color_labels: Vec<ColorLabel>,
    pub shot_types: Vec<String>,
    pub moods: Vec<String>,
}

/// Sort orders for browse and search surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Relevance,
    Date,
    Duration,
    Rating,
}

/// Unix epoch seconds
pub fn now_epoch() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Encode a tag list for folder-DB storage
pub fn encode_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a folder-DB tag column; malformed data degrades to empty
pub fn decode_tags(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Join a tag array into the whitespace token form the global FTS consumes
pub fn tags_to_fts_tokens(tags: &[String]) -> String {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
