//! Persistent [`VectorStore`] backed by a SQLite file.
//!
//! A store is a directory holding `index.sqlite` with two tables:
//!
//! - `records`: one row per chunk with its text, metadata, insertion position, and the
//!   embedding as a little-endian `f32` BLOB.
//! - `store_meta`: key/value manifest with `embedding_model`, `dims`,
//!   `record_count`, `built_at`.
//!
//! Rebuilds never modify the live directory in place. The new database is
//! written to a hidden sibling staging directory; once it is complete the old
//! directory is removed and the staging directory renamed into its place. A
//! failed write removes the staging directory and leaves the old store as it
//! was.
//!
//! Reads open the database read-only. A store directory that does not exist
//! yet reads as empty.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{RagError, Result};
use crate::models::{IndexedRecord, RetrievalResult};

use super::{rank, VectorStore};

/// Database file name inside the store directory.
pub const DB_FILE: &str = "index.sqlite";

pub struct SqliteStore {
    dir: PathBuf,
}

impl SqliteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.join(DB_FILE)
    }

    /// Open the live database read-only, or `None` if there is none.
    async fn open_existing(&self) -> Result<Option<SqlitePool>> {
        let db_path = self.db_path();
        if !db_path.is_file() {
            return Ok(None);
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                RagError::retrieval(format!("failed to open {}: {}", db_path.display(), e))
            })?;

        Ok(Some(pool))
    }

    fn staging_dir(&self) -> Result<PathBuf> {
        let name = self
            .dir
            .file_name()
            .ok_or_else(|| {
                RagError::indexing(format!(
                    "store directory has no final component: {}",
                    self.dir.display()
                ))
            })?
            .to_string_lossy()
            .to_string();

        let parent = match self.dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(parent.join(format!(".{}.staging-{}", name, Uuid::new_v4())))
    }

    async fn write_staging(
        &self,
        staging: &Path,
        model: &str,
        records: &[IndexedRecord],
    ) -> Result<()> {
        std::fs::create_dir_all(staging).map_err(|e| {
            RagError::indexing(format!("failed to create {}: {}", staging.display(), e))
        })?;

        // Rollback journal, so the finished database is a single file.
        let options = SqliteConnectOptions::new()
            .filename(staging.join(DB_FILE))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(RagError::indexing)?;

        let written = write_records(&pool, model, records).await;
        pool.close().await;
        written
    }

    fn swap_in(&self, staging: &Path) -> Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir).map_err(|e| {
                RagError::indexing(format!(
                    "failed to remove old store {}: {}",
                    self.dir.display(),
                    e
                ))
            })?;
        }
        std::fs::rename(staging, &self.dir).map_err(|e| {
            RagError::indexing(format!(
                "failed to move {} to {}: {}",
                staging.display(),
                self.dir.display(),
                e
            ))
        })
    }
}

async fn write_records(pool: &SqlitePool, model: &str, records: &[IndexedRecord]) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE records (
            id TEXT PRIMARY KEY,
            position INTEGER NOT NULL,
            source TEXT NOT NULL,
            page INTEGER,
            chunk_index INTEGER NOT NULL,
            start_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(RagError::indexing)?;

    sqlx::query(
        r#"
        CREATE TABLE store_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(RagError::indexing)?;

    let mut tx = pool.begin().await.map_err(RagError::indexing)?;

    for (position, record) in records.iter().enumerate() {
        let chunk = &record.chunk;
        sqlx::query(
            "INSERT INTO records (id, position, source, page, chunk_index, start_index, text, hash, embedding, dims) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(position as i64)
        .bind(&chunk.source)
        .bind(chunk.page.map(i64::from))
        .bind(chunk.chunk_index)
        .bind(chunk.start_index as i64)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .bind(vec_to_blob(&record.embedding))
        .bind(record.embedding.len() as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| RagError::indexing(format!("failed to insert {}: {}", chunk.id, e)))?;
    }

    let dims = records.first().map(|r| r.embedding.len()).unwrap_or(0);
    let meta = [
        ("embedding_model", model.to_string()),
        ("dims", dims.to_string()),
        ("record_count", records.len().to_string()),
        ("built_at", chrono::Utc::now().to_rfc3339()),
    ];
    for (key, value) in meta {
        sqlx::query("INSERT INTO store_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(RagError::indexing)?;
    }

    tx.commit().await.map_err(RagError::indexing)?;
    Ok(())
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn replace_all(&self, model: &str, records: Vec<IndexedRecord>) -> Result<()> {
        let staging = self.staging_dir()?;

        let swapped = match self.write_staging(&staging, model, &records).await {
            Ok(()) => self.swap_in(&staging),
            Err(e) => Err(e),
        };

        if let Err(e) = swapped {
            if staging.exists() {
                if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                    tracing::warn!(
                        staging = %staging.display(),
                        error = %cleanup,
                        "failed to remove staging directory"
                    );
                }
            }
            return Err(e);
        }

        tracing::info!(
            dir = %self.dir.display(),
            records = records.len(),
            model,
            "store rebuilt"
        );
        Ok(())
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let Some(pool) = self.open_existing().await? else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            "SELECT id, source, page, start_index, text, embedding FROM records ORDER BY position",
        )
        .fetch_all(&pool)
        .await;
        pool.close().await;
        let rows = rows.map_err(RagError::retrieval)?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.try_get("embedding").map_err(RagError::retrieval)?;
            let page: Option<i64> = row.try_get("page").map_err(RagError::retrieval)?;
            let start_index: i64 = row.try_get("start_index").map_err(RagError::retrieval)?;
            candidates.push(RetrievalResult {
                chunk_id: row.try_get("id").map_err(RagError::retrieval)?,
                text: row.try_get("text").map_err(RagError::retrieval)?,
                source: row.try_get("source").map_err(RagError::retrieval)?,
                page: page.map(|p| p as u32),
                start_index: start_index as usize,
                score: cosine_similarity(query, &blob_to_vec(&blob)) as f64,
            });
        }

        Ok(rank(candidates, k))
    }

    async fn count(&self) -> Result<usize> {
        let Some(pool) = self.open_existing().await? else {
            return Ok(0);
        };
        let count: std::result::Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT COUNT(*) FROM records")
                .fetch_one(&pool)
                .await;
        pool.close().await;
        Ok(count.map_err(RagError::retrieval)? as usize)
    }

    async fn embedding_model(&self) -> Result<Option<String>> {
        let Some(pool) = self.open_existing().await? else {
            return Ok(None);
        };
        let model: std::result::Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT value FROM store_meta WHERE key = 'embedding_model'")
                .fetch_optional(&pool)
                .await;
        pool.close().await;
        model.map_err(RagError::retrieval)
    }
}
