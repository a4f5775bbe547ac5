//! In-memory [`VectorStore`] implementation.
//!
//! All collections sit behind a single `std::sync::RwLock`, so each
//! mutating call is applied under one write guard and is atomic with
//! respect to readers. Query is brute-force cosine distance over every
//! stored vector.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::{Error, Result};
use crate::models::{IndexedRecord, QueryHit, RecordMetadata};

use super::{rank_hits, MetadataFilter, VectorStore};

#[derive(Default)]
struct Collection {
    records: Vec<IndexedRecord>,
    positions: HashMap<String, usize>,
}

impl Collection {
    fn upsert(&mut self, record: IndexedRecord) {
        match self.positions.get(&record.id) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    fn retain(&mut self, keep: impl Fn(&IndexedRecord) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(|r| keep(r));
        self.positions = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        before - self.records.len()
    }
}

/// In-memory vector store for tests, tooling and ephemeral indexes.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .read()
            .map_err(|_| Error::store("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .write()
            .map_err(|_| Error::store("in-memory store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self, collection: &str) -> Result<()> {
        self.write()?.entry(collection.to_string()).or_default();
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[IndexedRecord]) -> Result<()> {
        let mut collections = self.write()?;
        let target = collections.entry(collection.to_string()).or_default();
        for record in records {
            target.upsert(record.clone());
        }
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
        let collections = self.read()?;
        let Some(target) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let hits = target
            .records
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches(&r.metadata)))
            .map(|r| QueryHit {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                distance: cosine_distance(vector, &r.vector),
            })
            .collect();
        Ok(rank_hits(hits, top_k))
    }

    async fn delete(&self, collection: &str, filter: &MetadataFilter) -> Result<usize> {
        let mut collections = self.write()?;
        Ok(collections
            .get_mut(collection)
            .map_or(0, |target| target.retain(|r| !filter.matches(&r.metadata))))
    }

    async fn scan(&self, collection: &str) -> Result<Vec<RecordMetadata>> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .map(|target| target.records.iter().map(|r| r.metadata.clone()).collect())
            .unwrap_or_default())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.write()?.remove(collection);
        Ok(())
    }

    async fn recreate_collection(&self, collection: &str) -> Result<()> {
        self.write()?
            .insert(collection.to_string(), Collection::default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, doc_id: &str, index: usize, vector: Vec<f32>) -> IndexedRecord {
        IndexedRecord {
            id: id.into(),
            vector,
            text: format!("text of {}", id),
            metadata: RecordMetadata {
                source_file: format!("{}.txt", doc_id),
                chunk_index: index,
                doc_id: doc_id.into(),
            },
        }
    }

    #[tokio::test]
    async fn test_query_empty_collection() {
        let store = InMemoryStore::new();
        assert!(store.query("docs", &[1.0, 0.0], 5, None).await.unwrap().is_empty());
        store.ensure_collection("docs").await.unwrap();
        assert!(store.query("docs", &[1.0, 0.0], 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let store = InMemoryStore::new();
        store
            .upsert("docs", &[record("a", "d1", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        let mut replacement = record("a", "d1", 0, vec![0.0, 1.0]);
        replacement.text = "new text".into();
        store.upsert("docs", &[replacement]).await.unwrap();

        assert_eq!(store.scan("docs").await.unwrap().len(), 1);
        let hits = store.query("docs", &[0.0, 1.0], 1, None).await.unwrap();
        assert_eq!(hits[0].text, "new text");
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_ranks_by_distance_with_filter() {
        let store = InMemoryStore::new();
        store
            .upsert(
                "docs",
                &[
                    record("a", "d1", 0, vec![1.0, 0.0]),
                    record("b", "d1", 1, vec![0.7, 0.7]),
                    record("c", "d2", 0, vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.query("docs", &[1.0, 0.1], 3, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let filter = MetadataFilter::DocId("d2".into());
        let hits = store
            .query("docs", &[1.0, 0.1], 3, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "c");
    }

    #[tokio::test]
    async fn test_delete_and_drop() {
        let store = InMemoryStore::new();
        store
            .upsert(
                "docs",
                &[
                    record("a", "d1", 0, vec![1.0]),
                    record("b", "d1", 1, vec![1.0]),
                    record("c", "d2", 0, vec![1.0]),
                ],
            )
            .await
            .unwrap();

        let removed = store
            .delete("docs", &MetadataFilter::DocId("d1".into()))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        let removed = store
            .delete("docs", &MetadataFilter::DocId("missing".into()))
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(store.scan("docs").await.unwrap().len(), 1);

        // upsert after delete must still resolve positions correctly
        store
            .upsert("docs", &[record("c", "d2", 0, vec![2.0])])
            .await
            .unwrap();
        assert_eq!(store.scan("docs").await.unwrap().len(), 1);

        store.drop_collection("docs").await.unwrap();
        assert!(store.scan("docs").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recreate_collection_empties_in_place() {
        let store = InMemoryStore::new();
        store
            .upsert("docs", &[record("a", "d1", 0, vec![1.0]), record("b", "d2", 0, vec![0.5])])
            .await
            .unwrap();
        store
            .upsert("other", &[record("x", "d3", 0, vec![1.0])])
            .await
            .unwrap();

        store.recreate_collection("docs").await.unwrap();
        assert!(store.scan("docs").await.unwrap().is_empty());
        assert!(store.query("docs", &[1.0], 5, None).await.unwrap().is_empty());
        assert_eq!(store.scan("other").await.unwrap().len(), 1);

        // Positions start over after the reset.
        store
            .upsert("docs", &[record("b", "d2", 0, vec![0.5])])
            .await
            .unwrap();
        assert_eq!(store.scan("docs").await.unwrap().len(), 1);
    }
}
