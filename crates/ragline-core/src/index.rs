//! Document-level vector index operations.
//!
//! [`VectorIndex`] binds a [`VectorStore`] collection to an
//! [`EmbeddingGateway`]. Writes follow one rule: vectors are computed
//! before anything touches the store, so a failed embedding call leaves
//! the index exactly as it was.
//!
//! Re-inserting a document overwrites records with the same chunk ids.
//! If the chunker configuration changed in between and the document now
//! has fewer chunks, the higher-indexed records from the earlier run stay
//! until [`VectorIndex::delete_document`] is called.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::embedding::EmbeddingGateway;
use crate::error::{Error, Result};
use crate::models::{Document, IndexInfo, IndexedRecord, QueryHit};
use crate::store::{MetadataFilter, VectorStore};

pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    gateway: EmbeddingGateway,
    collection: String,
}

impl VectorIndex {
    /// Bind to `collection`, creating it if needed.
    pub async fn open(
        store: Arc<dyn VectorStore>,
        gateway: EmbeddingGateway,
        collection: impl Into<String>,
    ) -> Result<Self> {
        let collection = collection.into();
        store.ensure_collection(&collection).await?;
        Ok(Self {
            store,
            gateway,
            collection,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed every chunk in one gateway call and upsert the records.
    ///
    /// Returns the number of records written.
    pub async fn insert(&self, document: &Document) -> Result<usize> {
        if document.chunks.is_empty() {
            return Err(Error::EmptyChunks(document.metadata.filename.clone()));
        }

        let texts: Vec<String> = document.chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.gateway.embed_many(&texts).await?;

        let records: Vec<IndexedRecord> = document
            .chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedRecord::from_chunk(&document.doc_id, chunk, vector))
            .collect();

        self.store.upsert(&self.collection, &records).await?;
        tracing::info!(
            doc_id = %document.doc_id,
            file = %document.metadata.filename,
            chunks = records.len(),
            "indexed document"
        );
        Ok(records.len())
    }

    /// Up to `top_k` hits ranked by ascending distance.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        self.search(text, top_k, None).await
    }

    /// Like [`VectorIndex::query`], restricted to records matching `filter`.
    pub async fn query_filtered(
        &self,
        text: &str,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<QueryHit>> {
        self.search(text, top_k, Some(filter)).await
    }

    async fn search(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.gateway.embed_one(text).await?;
        let hits = self
            .store
            .query(&self.collection, &vector, top_k, filter)
            .await?;
        tracing::debug!(top_k, hits = hits.len(), "vector query");
        Ok(hits)
    }

    /// Remove every record of `doc_id`. Returns the number removed.
    pub async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let removed = self
            .store
            .delete(&self.collection, &MetadataFilter::DocId(doc_id.to_string()))
            .await?;
        tracing::info!(doc_id, removed, "deleted document");
        Ok(removed)
    }

    /// Empty the collection in one store call.
    pub async fn clear_all(&self) -> Result<()> {
        self.store.recreate_collection(&self.collection).await?;
        tracing::info!(collection = %self.collection, "cleared index");
        Ok(())
    }

    pub async fn get_document_info(&self) -> Result<IndexInfo> {
        let metadata = self.store.scan(&self.collection).await?;
        let files: BTreeSet<String> = metadata.iter().map(|m| m.source_file.clone()).collect();
        Ok(IndexInfo {
            total_chunks: metadata.len(),
            unique_documents: files.len(),
            document_files: files.into_iter().collect(),
        })
    }

    /// Distinct document ids, sorted.
    pub async fn list_documents(&self) -> Result<Vec<String>> {
        let metadata = self.store.scan(&self.collection).await?;
        let ids: BTreeSet<String> = metadata.into_iter().map(|m| m.doc_id).collect();
        Ok(ids.into_iter().collect())
    }
}
