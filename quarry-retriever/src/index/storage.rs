//! SQLite persistence for the vector index.
//!
//! Each persist writes a full snapshot of the in-memory index: the previous
//! rows are dropped and the current entries inserted inside one transaction,
//! so a restarted build overwrites its old artifact instead of appending to
//! it. Unit rows keep their insertion order through the AUTOINCREMENT id,
//! which `load` uses to restore the index in its original order.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE units (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     source_path TEXT NOT NULL,       -- file the unit came from
//!     sequence INTEGER NOT NULL,       -- sentence position within the file
//!     core_text TEXT NOT NULL,         -- the embedded sentence
//!     window_text TEXT NOT NULL,       -- sentence plus neighbors for prompts
//!     embedding BLOB NOT NULL          -- f16 embedding vector
//! );
//!
//! CREATE TABLE index_meta (
//!     id INTEGER PRIMARY KEY CHECK (id = 1),
//!     dimension INTEGER NOT NULL,
//!     unit_count INTEGER NOT NULL,
//!     created_at TIMESTAMP NOT NULL,
//!     updated_at TIMESTAMP NOT NULL
//! );
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quarry_ingest::IndexableUnit;
use serde::Serialize;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};

use crate::error::{Result, RetrieverError};
use crate::index::{IndexEntry, VectorIndex};

const INDEX_FILE: &str = "index.db";

/// Handle to the on-disk index database.
#[derive(Clone, Debug)]
pub struct IndexStorage {
    db_path: PathBuf,
    pool: SqlitePool,
}

/// Summary of a persisted index, read from the metadata row.
#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub unit_count: usize,
    pub dimension: usize,
    pub source_files: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IndexStorage {
    /// Open (or create) the index database under `dir`.
    pub async fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Self::connect(dir.join(INDEX_FILE), true).await
    }

    /// Open the index database under `dir`, failing if no snapshot exists yet.
    pub async fn open_existing(dir: &Path) -> Result<Self> {
        let db_path = dir.join(INDEX_FILE);
        if !db_path.is_file() {
            return Err(RetrieverError::reload(format!(
                "no persisted index at {}",
                db_path.display()
            )));
        }
        Self::connect(db_path, false).await
    }

    async fn connect(db_path: PathBuf, create: bool) -> Result<Self> {
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(&db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .create_if_missing(create)
                .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::Full)
                .page_size(1 << 16)
                .optimize_on_close(true, 1 << 10),
        )
        .await?;

        Self::create_tables(&pool).await?;

        Ok(Self { db_path, pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS units (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_path TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                core_text TEXT NOT NULL,
                window_text TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                dimension INTEGER NOT NULL,
                unit_count INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_units_source ON units(source_path)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Path of the underlying database file.
    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    /// Write a full snapshot of `index`, replacing any previous snapshot.
    pub async fn persist(&self, index: &VectorIndex) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(RetrieverError::persist)?;

        sqlx::query("DELETE FROM units")
            .execute(&mut *tx)
            .await
            .map_err(RetrieverError::persist)?;

        for entry in index.entries() {
            sqlx::query(
                r#"
                INSERT INTO units (source_path, sequence, core_text, window_text, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&entry.unit.source_path)
            .bind(entry.unit.sequence as i64)
            .bind(&entry.unit.core_text)
            .bind(&entry.unit.window_text)
            .bind(bytemuck::cast_slice::<half::f16, u8>(&entry.embedding))
            .execute(&mut *tx)
            .await
            .map_err(RetrieverError::persist)?;
        }

        sqlx::query(
            r#"
            INSERT INTO index_meta (id, dimension, unit_count, created_at, updated_at)
            VALUES (1, ?1, ?2, ?3, ?3)
            ON CONFLICT(id) DO UPDATE SET
                dimension = excluded.dimension,
                unit_count = excluded.unit_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(index.dimension() as i64)
        .bind(index.len() as i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(RetrieverError::persist)?;

        tx.commit().await.map_err(RetrieverError::persist)
    }

    /// Load the most recent snapshot back into memory.
    pub async fn load(&self) -> Result<VectorIndex> {
        let meta = sqlx::query("SELECT dimension FROM index_meta WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RetrieverError::reload(format!("metadata query failed: {e}")))?;

        let Some(meta) = meta else {
            return Err(RetrieverError::reload(format!(
                "no persisted index at {}",
                self.db_path.display()
            )));
        };
        let dimension: i64 = meta.get("dimension");
        let dimension = dimension as usize;

        let rows = sqlx::query(
            "SELECT source_path, sequence, core_text, window_text, embedding
             FROM units ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RetrieverError::reload(format!("unit query failed: {e}")))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let source_path: String = row.get("source_path");
            let sequence: i64 = row.get("sequence");
            let embedding_bytes: Vec<u8> = row.get("embedding");

            if embedding_bytes.len() != dimension * 2 {
                return Err(RetrieverError::reload(format!(
                    "corrupt embedding blob for {source_path}#{sequence}: \
                     {} bytes for dimension {dimension}",
                    embedding_bytes.len()
                )));
            }
            let embedding = bytemuck::cast_slice::<u8, half::f16>(&embedding_bytes).to_vec();

            entries.push(IndexEntry {
                unit: IndexableUnit {
                    core_text: row.get("core_text"),
                    window_text: row.get("window_text"),
                    source_path,
                    sequence: sequence as usize,
                },
                embedding,
            });
        }

        Ok(VectorIndex::from_entries(dimension, entries))
    }

    /// Read the metadata row, if a snapshot has been written.
    pub async fn stats(&self) -> Result<Option<StorageStats>> {
        let meta = sqlx::query(
            "SELECT dimension, unit_count, created_at, updated_at FROM index_meta WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(meta) = meta else {
            return Ok(None);
        };

        let source_files: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT source_path) FROM units")
                .fetch_one(&self.pool)
                .await?;

        let dimension: i64 = meta.get("dimension");
        let unit_count: i64 = meta.get("unit_count");
        Ok(Some(StorageStats {
            unit_count: unit_count as usize,
            dimension: dimension as usize,
            source_files: source_files as usize,
            created_at: meta.get("created_at"),
            updated_at: meta.get("updated_at"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;
    use tempfile::tempdir;

    fn entry(path: &str, seq: usize, fill: f32) -> IndexEntry {
        IndexEntry {
            unit: IndexableUnit {
                core_text: format!("core {seq}"),
                window_text: format!("window {seq}"),
                source_path: path.to_string(),
                sequence: seq,
            },
            embedding: vec![f16::from_f32(fill); 4],
        }
    }

    #[tokio::test]
    async fn test_persist_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let storage = IndexStorage::open(dir.path()).await.unwrap();

        let mut index = VectorIndex::new(4);
        index
            .insert_batch(vec![
                entry("a.pdf", 0, 0.25),
                entry("a.pdf", 1, 0.5),
                entry("b.pdf", 0, 0.75),
            ])
            .unwrap();
        storage.persist(&index).await.unwrap();

        let loaded = storage.load().await.unwrap();
        assert_eq!(loaded.dimension(), 4);
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.entries(), index.entries());
    }

    #[tokio::test]
    async fn test_persist_replaces_previous_snapshot() {
        let dir = tempdir().unwrap();
        let storage = IndexStorage::open(dir.path()).await.unwrap();

        let mut first = VectorIndex::new(4);
        first
            .insert_batch(vec![entry("a.pdf", 0, 0.1), entry("a.pdf", 1, 0.2)])
            .unwrap();
        storage.persist(&first).await.unwrap();

        let mut second = VectorIndex::new(4);
        second.insert_batch(vec![entry("c.pdf", 0, 0.9)]).unwrap();
        storage.persist(&second).await.unwrap();

        let loaded = storage.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entries()[0].unit.source_path, "c.pdf");

        let stats = storage.stats().await.unwrap().unwrap();
        assert_eq!(stats.unit_count, 1);
        assert_eq!(stats.source_files, 1);
    }

    #[tokio::test]
    async fn test_load_without_snapshot_errors() {
        let dir = tempdir().unwrap();
        let storage = IndexStorage::open(dir.path()).await.unwrap();

        let result = storage.load().await;
        assert!(matches!(result, Err(RetrieverError::Reload { .. })));
    }

    #[tokio::test]
    async fn test_open_existing_requires_database_file() {
        let dir = tempdir().unwrap();
        let result = IndexStorage::open_existing(dir.path()).await;
        assert!(matches!(result, Err(RetrieverError::Reload { .. })));
    }

    #[tokio::test]
    async fn test_stats_before_any_persist_is_none() {
        let dir = tempdir().unwrap();
        let storage = IndexStorage::open(dir.path()).await.unwrap();
        assert!(storage.stats().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_reports_counts_and_dimension() {
        let dir = tempdir().unwrap();
        let storage = IndexStorage::open(dir.path()).await.unwrap();

        let mut index = VectorIndex::new(4);
        index
            .insert_batch(vec![
                entry("a.pdf", 0, 0.25),
                entry("a.pdf", 1, 0.5),
                entry("b.pdf", 0, 0.75),
            ])
            .unwrap();
        storage.persist(&index).await.unwrap();

        let stats = storage.stats().await.unwrap().unwrap();
        assert_eq!(stats.unit_count, 3);
        assert_eq!(stats.dimension, 4);
        assert_eq!(stats.source_files, 2);
        assert!(stats.updated_at >= stats.created_at);
    }
}
