//! SQLite-backed [`VectorStore`].
//!
//! Records live in a single `records` table keyed by `(collection, id)`,
//! with vectors stored as little-endian `f32` BLOBs. Every mutating call
//! runs in one transaction. Queries are brute force: the candidate rows are
//! loaded, scored with cosine distance in Rust and ranked with
//! [`rank_hits`], so results match [`InMemoryStore`] exactly.
//!
//! [`InMemoryStore`]: ragline_core::store::memory::InMemoryStore

use std::path::Path;

use async_trait::async_trait;
use ragline_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use ragline_core::models::{IndexedRecord, QueryHit, RecordMetadata};
use ragline_core::store::{rank_hits, MetadataFilter, VectorStore};
use ragline_core::{Error, Result};
use sqlx::{Row, SqlitePool};

use crate::{db, migrate};

pub struct SqliteStore {
    pool: SqlitePool,
}

fn store_err(e: sqlx::Error) -> Error {
    Error::store(e.to_string())
}

/// SQL condition and bound value for an optional metadata filter.
fn filter_clause(filter: Option<&MetadataFilter>) -> (&'static str, Option<&str>) {
    match filter {
        Some(MetadataFilter::DocId(id)) => (" AND doc_id = ?", Some(id.as_str())),
        Some(MetadataFilter::SourceFile(file)) => (" AND source_file = ?", Some(file.as_str())),
        None => ("", None),
    }
}

impl SqliteStore {
    /// Open the database at `path`, creating it and its schema if needed.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        tracing::debug!(path = %path.display(), "opened sqlite vector store");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn ensure_collection(&self, collection: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)")
            .bind(collection)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[IndexedRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query("INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)")
            .bind(collection)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO records
                    (collection, id, doc_id, source_file, chunk_index, text, embedding, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    doc_id = excluded.doc_id,
                    source_file = excluded.source_file,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    dims = excluded.dims
                "#,
            )
            .bind(collection)
            .bind(&record.id)
            .bind(&record.metadata.doc_id)
            .bind(&record.metadata.source_file)
            .bind(record.metadata.chunk_index as i64)
            .bind(&record.text)
            .bind(vec_to_blob(&record.vector))
            .bind(record.vector.len() as i64)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let (clause, value) = filter_clause(filter);
        let sql = format!(
            "SELECT id, doc_id, source_file, chunk_index, text, embedding \
             FROM records WHERE collection = ?{}",
            clause
        );
        let mut query = sqlx::query(&sql).bind(collection);
        if let Some(value) = value {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(store_err)?;

        let hits = rows
            .iter()
            .map(|row| {
                let embedding: Vec<u8> = row.get("embedding");
                QueryHit {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata: metadata_from_row(row),
                    distance: cosine_distance(vector, &blob_to_vec(&embedding)),
                }
            })
            .collect();
        Ok(rank_hits(hits, top_k))
    }

    async fn delete(&self, collection: &str, filter: &MetadataFilter) -> Result<usize> {
        let (clause, value) = filter_clause(Some(filter));
        let sql = format!("DELETE FROM records WHERE collection = ?{}", clause);
        let mut query = sqlx::query(&sql).bind(collection);
        if let Some(value) = value {
            query = query.bind(value);
        }
        let result = query.execute(&self.pool).await.map_err(store_err)?;
        Ok(result.rows_affected() as usize)
    }

    async fn scan(&self, collection: &str) -> Result<Vec<RecordMetadata>> {
        let rows = sqlx::query(
            "SELECT doc_id, source_file, chunk_index FROM records \
             WHERE collection = ? ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.iter().map(metadata_from_row).collect())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn recreate_collection(&self, collection: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        sqlx::query("INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)")
            .bind(collection)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }
}

fn metadata_from_row(row: &sqlx::sqlite::SqliteRow) -> RecordMetadata {
    let chunk_index: i64 = row.get("chunk_index");
    RecordMetadata {
        source_file: row.get("source_file"),
        chunk_index: chunk_index as usize,
        doc_id: row.get("doc_id"),
    }
}
