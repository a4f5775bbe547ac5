//! Vector index engine abstraction.
//!
//! The [`VectorStore`] trait is the boundary to whatever actually holds
//! vectors: named collections of [`IndexedRecord`]s with upsert-by-id,
//! k-nearest-neighbour query by cosine distance, delete-by-filter and
//! whole-collection drop. [`crate::index::VectorIndex`] builds the
//! document-level operations on top of it.
//!
//! Every mutating call must be atomic with respect to other calls on the
//! same engine: a concurrent reader sees either none or all of an upsert.
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{IndexedRecord, QueryHit, RecordMetadata};

/// Equality filter over record metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataFilter {
    DocId(String),
    SourceFile(String),
}

impl MetadataFilter {
    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        match self {
            MetadataFilter::DocId(id) => metadata.doc_id == *id,
            MetadataFilter::SourceFile(file) => metadata.source_file == *file,
        }
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist yet.
    async fn ensure_collection(&self, collection: &str) -> Result<()>;

    /// Insert or overwrite records by id, as one atomic write.
    async fn upsert(&self, collection: &str, records: &[IndexedRecord]) -> Result<()>;

    /// The `top_k` nearest records by cosine distance, ascending.
    /// A missing or empty collection yields no hits.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>>;

    /// Remove every record matching `filter`; returns how many were removed.
    async fn delete(&self, collection: &str, filter: &MetadataFilter) -> Result<usize>;

    /// Metadata of every record in insertion order.
    async fn scan(&self, collection: &str) -> Result<Vec<RecordMetadata>>;

    /// Remove the collection and everything in it.
    async fn drop_collection(&self, collection: &str) -> Result<()>;

    /// Replace the collection with an empty one, as one atomic write.
    async fn recreate_collection(&self, collection: &str) -> Result<()>;
}

/// Sort hits by ascending distance (ties broken by id) and keep `top_k`.
///
/// Shared by the brute-force engines so they rank identically.
pub fn rank_hits(mut hits: Vec<QueryHit>, top_k: usize) -> Vec<QueryHit> {
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(top_k);
    hits
}
