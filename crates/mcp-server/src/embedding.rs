//! Placeholder embedder.
//!
//! The real embedding model is an external collaborator (spec'd at the
//! `Embedder` trait boundary in `context_vector_store`, not owned by this
//! crate). `HashEmbedder` is a deterministic stand-in: same text always
//! produces the same vector, vectors are unit-normalized, and dimension
//! tracks the target table so `search_code`/`search_docs` never hit a
//! `DimensionMismatch`. Used both as the production default (until a real
//! model is wired in) and directly by the test suite.

use async_trait::async_trait;
use context_vector_store::{Domain, Embedder};
use sha2::{Digest, Sha256};

pub const CODE_DIM: usize = 384;
pub const DOCS_DIM: usize = 768;

pub struct HashEmbedder;

impl HashEmbedder {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn embed_one(text: &str, dim: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(dim);
        let mut counter: u32 = 0;
        while out.len() < dim {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for chunk in digest.chunks(4) {
                if out.len() >= dim {
                    break;
                }
                let raw = u32::from_le_bytes(chunk.try_into().unwrap_or([0; 4]));
                // Map into [-1.0, 1.0).
                let value = (raw as f64 / u32::MAX as f64) * 2.0 - 1.0;
                out.push(value as f32);
            }
            counter += 1;
        }
        let norm: f32 = out.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut out {
                *v /= norm;
            }
        }
        out
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(
        &self,
        texts: &[String],
        domain: Domain,
    ) -> context_vector_store::Result<Vec<Vec<f32>>> {
        let dim = self.dimension(domain);
        Ok(texts.iter().map(|t| Self::embed_one(t, dim)).collect())
    }

    fn dimension(&self, domain: Domain) -> usize {
        match domain {
            Domain::Code | Domain::Query => CODE_DIM,
            Domain::Docs => DOCS_DIM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_same_vector() {
        let embedder = HashEmbedder::new();
        let a = embedder
            .embed(&["fn main() {}".to_string()], Domain::Code)
            .await
            .unwrap();
        let b = embedder
            .embed(&["fn main() {}".to_string()], Domain::Code)
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn dimension_matches_domain() {
        let embedder = HashEmbedder::new();
        let code = embedder.embed(&["x".to_string()], Domain::Code).await.unwrap();
        let docs = embedder.embed(&["x".to_string()], Domain::Docs).await.unwrap();
        assert_eq!(code[0].len(), CODE_DIM);
        assert_eq!(docs[0].len(), DOCS_DIM);
    }

    #[tokio::test]
    async fn different_text_different_vector() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed(&["alpha".to_string()], Domain::Code).await.unwrap();
        let b = embedder.embed(&["beta".to_string()], Domain::Code).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn vectors_are_unit_normalized() {
        let embedder = HashEmbedder::new();
        let v = embedder.embed(&["normalize me".to_string()], Domain::Docs).await.unwrap();
        let norm: f32 = v[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
