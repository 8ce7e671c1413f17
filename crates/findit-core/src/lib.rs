//! findit-core: storage, sync, layered indexing, and hybrid search
//!
//! This crate provides:
//! - Folder-local authoritative stores plus a per-user aggregated index,
//!   kept consistent by rowid-watermark replication
//! - A resumable five-layer indexing pipeline with per-clip checkpoints
//! - Self-healing for moved folders, vanished files, and index resets
//! - A rate-limiting and connectivity substrate for external providers
//! - Three-way hybrid search: BM25 keywords fused with cross-modal and
//!   text-embedding vector channels

pub mod cancel;
pub mod config;
pub mod embedding;
pub mod error;
pub mod folder_db;
pub mod global_db;
pub mod indexer;
pub mod migrations;
pub mod model;
pub mod network;
pub mod providers;
pub mod query;
pub mod rate_limit;
pub mod repair;
pub mod scan;
pub mod scheduler;
pub mod search;
pub mod srt;
pub mod sync;
pub mod vector;

// Re-exports
pub use cancel::{CancelSource, CancelToken};
pub use config::{folder_db_path, AppPaths, IndexingConfig};
pub use embedding::{compose_embedding_text, decode_embedding, encode_embedding};
pub use error::{FindItError, Result};
pub use folder_db::FolderDb;
pub use global_db::{ClipResultData, GlobalDb, GlobalStats};
pub use indexer::{compute_file_hash, IndexOutcome, IndexerDeps, LayeredIndexer};
pub use model::{
    Clip, ClipFilters, ClipId, ColorLabel, FolderId, IndexStatus, SearchHistoryEntry, SortBy,
    SyncMeta, Video, VideoId, WatchedFolder,
};
pub use network::{NetworkMonitor, NetworkStatus};
pub use providers::{
    ClipDescription, DetectedLanguage, EmbeddingProvider, MediaService, SttProvider,
    TranscriptSegment, VectorIndex, VisionProvider,
};
pub use query::{parse_query, ParsedQuery};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use repair::{
    cleanup_expired_orphans, rebase_folder, remove_video, reset, restore_orphan, RebaseReport,
    ResetReport, ResetScope,
};
pub use scan::{scan_folder, ScanReport};
pub use scheduler::{IndexScheduler, PerformanceMode, ScheduleReport};
pub use search::{
    adaptive_weights, image_search, run_search, search, SearchMode, SearchOptions, SearchRequest,
    SearchResult, SearchWeights,
};
pub use srt::{generate_srt, parse_srt, SrtSegment};
pub use sync::{force_sync, sync_folder, SyncReport};
pub use vector::FlatVectorIndex;
