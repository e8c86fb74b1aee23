#![forbid(unsafe_code)]

//! Persistence for ingested rows.
//!
//! The table is append-only: every call to [`RecordSink::insert`] adds one
//! row and is committed on its own.

use std::path::Path;

use anyhow::{Context, Result};
use libsql::{Builder, Connection, params};
use tracing::info;

use crate::record::VideoRecord;

pub const VIDEOS_TABLE: &str = "youtube_videos";
const IN_MEMORY: &str = ":memory:";

/// Destination for finished rows.
#[allow(async_fn_in_trait)]
pub trait RecordSink {
    async fn insert(&self, record: &VideoRecord) -> Result<()>;
}

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS youtube_videos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            category_name TEXT NOT NULL,
            view_count INTEGER NOT NULL DEFAULT 0,
            like_count INTEGER NOT NULL DEFAULT 0,
            comment_count INTEGER NOT NULL DEFAULT 0,
            published_at TEXT NOT NULL,
            thumbnail_url TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '',
            subscriber_count INTEGER NOT NULL DEFAULT 0,
            video_count INTEGER NOT NULL DEFAULT 0,
            is_weekend INTEGER NOT NULL DEFAULT 0,
            video_length TEXT NOT NULL
        );
        "#,
    )
    .await?;
    Ok(())
}

/// Wrapper around the SQLite-compatible connection that receives rows.
pub struct VideoStore {
    conn: Connection,
}

// `libsql::Connection` does not implement `Debug`, so the derive cannot be used.
impl std::fmt::Debug for VideoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoStore").finish_non_exhaustive()
    }
}

impl VideoStore {
    /// Opens (and if necessary creates) the database and the
    /// `youtube_videos` table. `:memory:` gives a throwaway database.
    pub async fn open(path: &Path) -> Result<Self> {
        if path.as_os_str() != IN_MEMORY
            && let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening database {}", path.display()))?;

        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn)
            .await
            .with_context(|| format!("creating {VIDEOS_TABLE} table"))?;

        info!(path = %path.display(), "database ready");
        Ok(Self { conn })
    }
}

impl RecordSink for VideoStore {
    async fn insert(&self, record: &VideoRecord) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO youtube_videos (
                    title, category_name, view_count, like_count, comment_count,
                    published_at, thumbnail_url, tags, subscriber_count, video_count,
                    is_weekend, video_length
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    record.title.as_str(),
                    record.category_name.as_str(),
                    record.view_count,
                    record.like_count,
                    record.comment_count,
                    record.published_at.as_str(),
                    record.thumbnail_url.as_str(),
                    record.tags.as_str(),
                    record.subscriber_count,
                    record.video_count,
                    i64::from(record.is_weekend),
                    record.video_length.as_str(),
                ],
            )
            .await
            .with_context(|| format!("inserting {:?} into {VIDEOS_TABLE}", record.title))?;
        Ok(())
    }
}

/// Sink for `--dry-run`: prints each row as JSON instead of storing it.
#[derive(Debug, Default)]
pub struct DryRunSink;

impl RecordSink for DryRunSink {
    async fn insert(&self, record: &VideoRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("serializing record")?;
        info!(target: "dry_run", "{json}");
        Ok(())
    }
}
