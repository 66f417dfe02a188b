use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::index::VectorIndex;
use uuid::Uuid;

/// HNSW-backed cosine-similarity index. `usearch` keys memories by a
/// dense `u64`, so this adapter maintains the `Uuid <-> u64` mapping the
/// engine actually cares about.
pub struct UsearchIndex {
    index: RwLock<usearch::Index>,
    uuid_to_key: RwLock<HashMap<Uuid, u64>>,
    key_to_uuid: RwLock<HashMap<u64, Uuid>>,
    next_key: RwLock<u64>,
    dimensions: usize,
}

impl UsearchIndex {
    pub fn new(dimensions: usize) -> Result<Self> {
        let opts = usearch::IndexOptions {
            dimensions,
            metric: usearch::MetricKind::Cos,
            quantization: usearch::ScalarKind::F32,
            ..Default::default()
        };
        let index = usearch::Index::new(&opts).map_err(|e| Error::Index(e.to_string()))?;
        index.reserve(10_000).map_err(|e| Error::Index(e.to_string()))?;

        Ok(Self {
            index: RwLock::new(index),
            uuid_to_key: RwLock::new(HashMap::new()),
            key_to_uuid: RwLock::new(HashMap::new()),
            next_key: RwLock::new(0),
            dimensions,
        })
    }

    fn allocate_key(&self, id: Uuid) -> u64 {
        let mut next = self.next_key.write().unwrap();
        let key = *next;
        *next += 1;
        self.uuid_to_key.write().unwrap().insert(id, key);
        self.key_to_uuid.write().unwrap().insert(key, id);
        key
    }
}

impl VectorIndex for UsearchIndex {
    fn add(&self, id: Uuid, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::Validation(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                vector.len()
            )));
        }

        if self.uuid_to_key.read().unwrap().contains_key(&id) {
            self.remove(id)?;
        }

        let key = self.allocate_key(id);
        let index = self.index.read().unwrap();

        if index.size() >= index.capacity() {
            index
                .reserve(index.capacity() + 10_000)
                .map_err(|e| Error::Index(e.to_string()))?;
        }

        index.add(key, vector).map_err(|e| Error::Index(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, id: Uuid) -> Result<()> {
        let key = {
            let map = self.uuid_to_key.read().unwrap();
            match map.get(&id) {
                Some(&k) => k,
                None => return Ok(()),
            }
        };

        let index = self.index.read().unwrap();
        index.remove(key).map_err(|e| Error::Index(e.to_string()))?;

        self.uuid_to_key.write().unwrap().remove(&id);
        self.key_to_uuid.write().unwrap().remove(&key);
        Ok(())
    }

    /// Returns `(id, similarity)` pairs, `similarity = 1 - cosine_distance`,
    /// oversampling internally so the caller can still apply its own
    /// `is_deleted`/retention filtering and truncate to the requested
    /// `limit` (ANN recall is not guaranteed exhaustive — callers must
    /// tolerate recall < 1).
    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(Uuid, f32)>> {
        let index = self.index.read().unwrap();
        let oversampled = (limit * 4).max(limit).min(index.size().max(1));
        let results = index
            .search(query, oversampled)
            .map_err(|e| Error::Index(e.to_string()))?;

        let key_map = self.key_to_uuid.read().unwrap();
        let mut output = Vec::new();
        for (key, distance) in results.keys.iter().zip(results.distances.iter()) {
            if let Some(&uuid) = key_map.get(key) {
                output.push((uuid, 1.0 - *distance));
            }
        }
        Ok(output)
    }

    fn len(&self) -> usize {
        self.index.read().unwrap().size()
    }
}
