// Vector Store Module
//
// In-memory brute-force similarity search over embedding vectors. Exact
// scores and deterministic ordering: results sort by score descending and
// equal scores keep first-indexed order, so repeated runs over the same
// index return identical rankings.

use std::collections::{HashMap, HashSet};

use super::{SimilarityResult, cosine_similarity};
use crate::errors::{Result, VestigeError};

/// Vector store for embedding similarity search
pub struct VectorStore {
    dimensions: usize,
    /// Entries in first-insert order; replacing an id keeps its slot.
    entries: Vec<(String, Vec<f32>)>,
    slots: HashMap<String, usize>,
}

impl VectorStore {
    /// Create a new vector store for embeddings of the given dimensions
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
            slots: HashMap::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Store a vector under `id`. A repeated id replaces the vector in
    /// place, keeping the original discovery order for tie-breaking.
    pub fn store_vector(&mut self, id: String, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(VestigeError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        match self.slots.get(&id) {
            Some(&slot) => self.entries[slot].1 = vector,
            None => {
                self.slots.insert(id.clone(), self.entries.len());
                self.entries.push((id, vector));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every stored vector. Used when an index run replaces the
    /// persisted index wholesale.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.slots.clear();
    }

    /// Rank stored vectors against `query`, best first. When `allowed` is
    /// present only those ids participate. Equal scores keep insertion
    /// order (stable sort over a deterministic iteration).
    pub fn search_similar(
        &self,
        query: &[f32],
        limit: usize,
        allowed: Option<&HashSet<String>>,
    ) -> Result<Vec<SimilarityResult>> {
        if query.len() != self.dimensions {
            return Err(VestigeError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let mut results: Vec<SimilarityResult> = self
            .entries
            .iter()
            .filter(|(id, _)| allowed.is_none_or(|set| set.contains(id)))
            .map(|(id, vector)| SimilarityResult {
                element_id: id.clone(),
                similarity_score: cosine_similarity(query, vector),
            })
            .collect();

        results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        results.truncate(limit);
        Ok(results)
    }
}
