//! Embedding backend trait, the batching gateway, and vector utilities.
//!
//! Network backends (Ollama, OpenAI) live in the `ragline` app crate and
//! implement [`Embedder`]. Everything that needs vectors goes through an
//! [`EmbeddingGateway`], which enforces the contract the index relies on:
//!
//! - one vector per input text, in input order
//! - no empty vectors
//! - backend failures surface as [`Error::EmbeddingBackend`], never as
//!   placeholder vectors, and are never retried here

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// An embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality, or `0` when unknown.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per text, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::embedding("backend returned no vector for the query"))
    }
}

/// Batch and single-text vector production over an [`Embedder`].
#[derive(Clone)]
pub struct EmbeddingGateway {
    backend: Arc<dyn Embedder>,
    batch_size: usize,
}

impl EmbeddingGateway {
    pub fn new(backend: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            backend,
            batch_size: batch_size.max(1),
        }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self
            .backend
            .embed_query(text)
            .await
            .map_err(as_embedding_error)?;
        if vector.is_empty() {
            return Err(Error::embedding("backend returned an empty vector"));
        }
        Ok(vector)
    }

    /// Embed `texts` in batches of `batch_size`, preserving order.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self
                .backend
                .embed_documents(batch)
                .await
                .map_err(as_embedding_error)?;
            if embedded.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "backend returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            if embedded.iter().any(|v| v.is_empty()) {
                return Err(Error::embedding("backend returned an empty vector"));
            }
            vectors.extend(embedded);
        }
        tracing::debug!(
            model = self.backend.model_name(),
            count = vectors.len(),
            "embedded texts"
        );
        Ok(vectors)
    }
}

fn as_embedding_error(err: Error) -> Error {
    match err {
        Error::EmbeddingBackend(_) => err,
        other => Error::embedding(other.to_string()),
    }
}

/// Deterministic feature-hashing embedder.
///
/// Lowercased alphanumeric tokens are hashed (FNV-1a) into `dims` signed
/// buckets and the result is L2-normalized. Texts sharing vocabulary land
/// close together. Needs no network or model download, which makes it
/// useful offline and in tests; it has no semantic understanding.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty());
        for token in tokens {
            let hash = fnv1a(&token.to_lowercase());
            let bucket = (hash % self.dims as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use ragline_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different
/// lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance, `1 - cosine_similarity`. Lower is more similar.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ShortBackend;

    #[async_trait]
    impl Embedder for ShortBackend {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl Embedder for FailingBackend {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            0
        }
        async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::store("socket closed"))
        }
    }

    /// Records the batch sizes it was called with.
    struct LengthBackend {
        calls: std::sync::Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Embedder for LengthBackend {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_hashing_embedder_similarity() {
        let embedder = HashingEmbedder::new(256);
        let a = embedder.embed("zebras graze on the savanna");
        let b = embedder.embed("Where do zebras graze?");
        let c = embedder.embed("compilers lower syntax trees");
        assert_eq!(a.len(), 256);
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
        assert_eq!(a, embedder.embed("zebras graze on the savanna"));
    }

    #[tokio::test]
    async fn test_gateway_rejects_count_mismatch() {
        let gateway = EmbeddingGateway::new(Arc::new(ShortBackend), 16);
        let err = gateway
            .embed_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmbeddingBackend(_)));
    }

    #[tokio::test]
    async fn test_gateway_wraps_backend_errors() {
        let gateway = EmbeddingGateway::new(Arc::new(FailingBackend), 16);
        let err = gateway.embed_one("question").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingBackend(ref m) if m.contains("socket closed")));
    }

    #[tokio::test]
    async fn test_gateway_batches_in_order() {
        let backend = Arc::new(LengthBackend {
            calls: std::sync::Mutex::new(Vec::new()),
        });
        let gateway = EmbeddingGateway::new(backend.clone(), 2);
        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let vectors = gateway.embed_many(&texts).await.unwrap();
        let lengths: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(*backend.calls.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_gateway_empty_input() {
        let gateway = EmbeddingGateway::new(Arc::new(HashingEmbedder::new(8)), 4);
        assert!(gateway.embed_many(&[]).await.unwrap().is_empty());
    }
}
