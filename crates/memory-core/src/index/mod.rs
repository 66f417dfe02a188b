pub mod usearch;

use crate::error::Result;
use uuid::Uuid;

/// The ANN half of the persistence port. `Store` adapters compose this
/// with metadata storage to answer `knn`.
pub trait VectorIndex: Send + Sync {
    fn add(&self, id: Uuid, vector: &[f32]) -> Result<()>;
    fn remove(&self, id: Uuid) -> Result<()>;
    /// Returns `(id, similarity)` pairs, `similarity = 1 - cosine_distance`.
    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(Uuid, f32)>>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
