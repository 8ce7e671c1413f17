//! Error taxonomy for the core indexing and search pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by storage, sync, indexing, and search
#[derive(Debug, Error)]
pub enum FindItError {
    // Storage
    #[error("folder not accessible: {0}")]
    FolderNotAccessible(PathBuf),

    #[error("cannot create index directory {0}")]
    IndexDirCreate(PathBuf),

    #[error("migration '{name}' failed: {source}")]
    MigrationFailed {
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("sync constraint violation: {0}")]
    SyncConstraint(String),

    // Decoder routing and external tooling
    #[error(transparent)]
    Media(#[from] findit_media::MediaError),

    // Providers
    #[error("provider not available: {0}")]
    ProviderUnavailable(String),

    #[error("rate limit exceeded for provider {0}")]
    RateLimitExceeded(String),

    #[error("authentication missing for provider {0}")]
    AuthenticationMissing(String),

    #[error("provider response mismatch: {0}")]
    ProviderResponseInvalid(String),

    // Indexer
    #[error("scene detection unsupported for {0}")]
    SceneDetectionUnsupported(PathBuf),

    #[error("language detection inconclusive")]
    LanguageDetectionInconclusive,

    #[error("indexing failed for {path}: {reason}")]
    VideoFailed { path: PathBuf, reason: String },

    // Network
    #[error("network disconnected and wait timed out")]
    NetworkTimeout,

    // Cancellation (never a failure)
    #[error("cancelled")]
    Cancelled,

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FindItError {
    /// Cancellation propagates as an outcome, not a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FindItError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, FindItError>;
