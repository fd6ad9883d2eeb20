use crate::error::Result;
use async_trait::async_trait;

/// Which side of a query/document pair a text belongs to, and (for
/// documents) which table it's destined for. The embedder uses this to
/// select its model and output dimension; callers never need to know the
/// model's internal details beyond the dimension it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Code,
    Query,
    Docs,
}

/// External collaborator boundary: a pure function from rendered text to
/// dense vectors. The model loader, batching strategy, and GPU/CPU
/// placement all live on the other side of this trait and are out of
/// scope here — callers only see `embed`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `texts`, all belonging to `domain`. Every vector in the
    /// returned batch has the same length as its peers. A failed embedding
    /// for one text must surface as an error for the whole call rather than
    /// ever producing a zero vector (a zero vector would match every query
    /// spuriously).
    async fn embed(&self, texts: &[String], domain: Domain) -> Result<Vec<Vec<f32>>>;

    /// The dimension this embedder produces for `domain`.
    fn dimension(&self, domain: Domain) -> usize;
}
