use crate::error::Result;
use crate::types::{EmbeddingVector, OutputRow};

/// Batch embedding capability shared by the remote and local backends.
///
/// `embed_batch` must return exactly one vector per input, in input order,
/// each with `dim()` components. Callers still verify the shape.
pub trait EmbedProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-small:d1536`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality, constant for the provider's lifetime.
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;
}

/// Ordered-column row insert into the analytics store.
pub trait RowSink: Send + Sync {
    fn insert(&self, rows: &[OutputRow]) -> Result<()>;
}
