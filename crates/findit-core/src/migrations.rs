//! Versioned schema evolution for both database kinds
//!
//! Each migration is a named, idempotent step; applied names are recorded in
//! `schema_migrations` so re-running the ladder on an up-to-date database is
//! a no-op. Column additions go through ALTER guarded by `pragma_table_info`;
//! FTS restructuring drops triggers and the virtual table, recreates both,
//! then issues a single `rebuild`.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{FindItError, Result};

/// One step of a migration ladder
pub struct Migration {
    pub name: &'static str,
    pub up: fn(&Connection) -> rusqlite::Result<()>,
}

/// Apply every unapplied step, in order, each in its own transaction
pub fn apply_migrations(conn: &Connection, ladder: &[Migration]) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )?;

    for migration in ladder {
        let applied: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM schema_migrations WHERE name = ?",
                [migration.name],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n > 0)?;
        if applied {
            debug!("migration {} already applied", migration.name);
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        (migration.up)(&tx).map_err(|source| FindItError::MigrationFailed {
            name: migration.name,
            source,
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (name) VALUES (?)",
            [migration.name],
        )?;
        tx.commit()?;
        info!("applied migration {}", migration.name);
    }

    Ok(())
}

/// True when `table` already has `column`
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?",
        [table, column],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
}

// ---------------------------------------------------------------------------
// Folder DB ladder
// ---------------------------------------------------------------------------

const FOLDER_SCHEMA_V1: &str = r"
CREATE TABLE IF NOT EXISTS watched_folders (
    id INTEGER PRIMARY KEY,
    folder_path TEXT NOT NULL UNIQUE,
    volume_name TEXT,
    volume_uuid TEXT,
    is_available INTEGER NOT NULL DEFAULT 1,
    total_files INTEGER NOT NULL DEFAULT 0,
    indexed_files INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY,
    folder_id INTEGER NOT NULL,
    file_path TEXT NOT NULL UNIQUE,
    file_name TEXT NOT NULL,
    duration_secs REAL NOT NULL DEFAULT 0,
    file_size INTEGER,
    file_hash TEXT,
    modified_at INTEGER,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    indexed_at INTEGER,
    index_status TEXT NOT NULL DEFAULT 'pending',
    index_layer INTEGER NOT NULL DEFAULT 0,
    last_processed_clip INTEGER,
    index_error TEXT,
    srt_path TEXT,
    FOREIGN KEY (folder_id) REFERENCES watched_folders(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS clips (
    id INTEGER PRIMARY KEY,
    video_id INTEGER NOT NULL,
    start_secs REAL NOT NULL,
    end_secs REAL NOT NULL,
    thumbnail_path TEXT,
    scene TEXT NOT NULL DEFAULT '',
    subjects TEXT NOT NULL DEFAULT '',
    actions TEXT NOT NULL DEFAULT '',
    objects TEXT NOT NULL DEFAULT '',
    mood TEXT NOT NULL DEFAULT '',
    shot_type TEXT NOT NULL DEFAULT '',
    lighting TEXT NOT NULL DEFAULT '',
    colors TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    transcript TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '[]',
    user_tags TEXT NOT NULL DEFAULT '[]',
    rating INTEGER NOT NULL DEFAULT 0,
    color_label TEXT,
    embedding BLOB,
    embedding_model TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_videos_index_status ON videos(index_status);
CREATE INDEX IF NOT EXISTS idx_videos_file_hash ON videos(file_hash);
CREATE INDEX IF NOT EXISTS idx_clips_video_id ON clips(video_id);
CREATE INDEX IF NOT EXISTS idx_clips_embedding_model ON clips(embedding_model);
CREATE INDEX IF NOT EXISTS idx_clips_rating ON clips(rating);
CREATE INDEX IF NOT EXISTS idx_clips_color_label ON clips(color_label);
";

fn folder_schema_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(FOLDER_SCHEMA_V1)
}

fn folder_stt_skip_flag(conn: &Connection) -> rusqlite::Result<()> {
    if !column_exists(conn, "videos", "stt_skipped_no_audio")? {
        conn.execute(
            "ALTER TABLE videos ADD COLUMN stt_skipped_no_audio INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }
    Ok(())
}

fn folder_orphan_timestamps(conn: &Connection) -> rusqlite::Result<()> {
    if !column_exists(conn, "videos", "orphaned_at")? {
        conn.execute("ALTER TABLE videos ADD COLUMN orphaned_at INTEGER", [])?;
    }
    Ok(())
}

pub fn folder_migrations() -> &'static [Migration] {
    &[
        Migration {
            name: "folder_schema_v1",
            up: folder_schema_v1,
        },
        Migration {
            name: "folder_stt_skip_flag",
            up: folder_stt_skip_flag,
        },
        Migration {
            name: "folder_orphan_timestamps",
            up: folder_orphan_timestamps,
        },
    ]
}

// ---------------------------------------------------------------------------
// Global DB ladder
// ---------------------------------------------------------------------------

const GLOBAL_SCHEMA_V1: &str = r"
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY,
    source_folder TEXT NOT NULL,
    source_video_id INTEGER NOT NULL,
    file_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    duration_secs REAL NOT NULL DEFAULT 0,
    file_size INTEGER,
    index_status TEXT NOT NULL DEFAULT 'pending',
    orphaned_at INTEGER,
    UNIQUE(source_folder, source_video_id)
);

CREATE TABLE IF NOT EXISTS clips (
    id INTEGER PRIMARY KEY,
    source_folder TEXT NOT NULL,
    source_clip_id INTEGER NOT NULL,
    video_id INTEGER NOT NULL,
    start_secs REAL NOT NULL,
    end_secs REAL NOT NULL,
    thumbnail_path TEXT,
    scene TEXT NOT NULL DEFAULT '',
    subjects TEXT NOT NULL DEFAULT '',
    actions TEXT NOT NULL DEFAULT '',
    objects TEXT NOT NULL DEFAULT '',
    mood TEXT NOT NULL DEFAULT '',
    shot_type TEXT NOT NULL DEFAULT '',
    lighting TEXT NOT NULL DEFAULT '',
    colors TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    transcript TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '',
    user_tags TEXT NOT NULL DEFAULT '',
    rating INTEGER NOT NULL DEFAULT 0,
    color_label TEXT,
    embedding BLOB,
    embedding_model TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE(source_folder, source_clip_id),
    FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS search_history (
    id INTEGER PRIMARY KEY,
    query TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS sync_meta (
    folder_path TEXT PRIMARY KEY,
    last_video_rowid INTEGER NOT NULL DEFAULT 0,
    last_clip_rowid INTEGER NOT NULL DEFAULT 0,
    last_synced_at INTEGER NOT NULL DEFAULT 0,
    volume_uuid TEXT
);

CREATE INDEX IF NOT EXISTS idx_global_clips_video_id ON clips(video_id);
CREATE INDEX IF NOT EXISTS idx_global_clips_source ON clips(source_folder);
CREATE INDEX IF NOT EXISTS idx_global_videos_source ON videos(source_folder);
CREATE INDEX IF NOT EXISTS idx_global_clips_embedding_model ON clips(embedding_model);
";

/// The ten FTS columns, in rank-weight order
pub const FTS_COLUMNS: [&str; 10] = [
    "tags",
    "description",
    "transcript",
    "user_tags",
    "scene",
    "subjects",
    "actions",
    "objects",
    "mood",
    "shot_type",
];

/// BM25 column weights, matching [`FTS_COLUMNS`] order
pub const FTS_WEIGHTS: [f64; 10] = [10.0, 5.0, 3.0, 8.0, 4.0, 3.0, 3.0, 2.0, 2.0, 1.0];

fn global_schema_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(GLOBAL_SCHEMA_V1)
}

fn global_clips_fts(conn: &Connection) -> rusqlite::Result<()> {
    create_clips_fts(conn)?;
    conn.execute("INSERT INTO clips_fts(clips_fts) VALUES ('rebuild')", [])?;
    Ok(())
}

fn global_history_result_count(conn: &Connection) -> rusqlite::Result<()> {
    if !column_exists(conn, "search_history", "result_count")? {
        conn.execute(
            "ALTER TABLE search_history ADD COLUMN result_count INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }
    Ok(())
}

pub fn global_migrations() -> &'static [Migration] {
    &[
        Migration {
            name: "global_schema_v1",
            up: global_schema_v1,
        },
        Migration {
            name: "global_clips_fts",
            up: global_clips_fts,
        },
        Migration {
            name: "global_history_result_count",
            up: global_history_result_count,
        },
    ]
}

/// Create the `clips_fts` virtual table and its maintenance triggers
///
/// The ten indexed columns are a versioned contract: adding a descriptor
/// column means a new ladder step that calls [`drop_clips_fts`], recreates
/// through this function, and rebuilds.
pub fn create_clips_fts(conn: &Connection) -> rusqlite::Result<()> {
    let columns = FTS_COLUMNS.join(",\n    ");
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS clips_fts USING fts5(
    {columns},
    content='clips',
    content_rowid='id',
    tokenize='unicode61 remove_diacritics 2'
);"
    ))?;

    let cols = FTS_COLUMNS.join(", ");
    let new_values = FTS_COLUMNS
        .iter()
        .map(|c| format!("new.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let old_values = FTS_COLUMNS
        .iter()
        .map(|c| format!("old.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    conn.execute_batch(&format!(
        "CREATE TRIGGER IF NOT EXISTS clips_fts_ai AFTER INSERT ON clips BEGIN
    INSERT INTO clips_fts(rowid, {cols}) VALUES (new.id, {new_values});
END;
CREATE TRIGGER IF NOT EXISTS clips_fts_ad AFTER DELETE ON clips BEGIN
    INSERT INTO clips_fts(clips_fts, rowid, {cols}) VALUES ('delete', old.id, {old_values});
END;
CREATE TRIGGER IF NOT EXISTS clips_fts_au AFTER UPDATE ON clips BEGIN
    INSERT INTO clips_fts(clips_fts, rowid, {cols}) VALUES ('delete', old.id, {old_values});
    INSERT INTO clips_fts(rowid, {cols}) VALUES (new.id, {new_values});
END;"
    ))
}

/// Drop the FTS table and its triggers, for restructuring
pub fn drop_clips_fts(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "DROP TRIGGER IF EXISTS clips_fts_ai;
         DROP TRIGGER IF EXISTS clips_fts_ad;
         DROP TRIGGER IF EXISTS clips_fts_au;
         DROP TABLE IF EXISTS clips_fts;",
    )
}
