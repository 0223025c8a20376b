//! Shared test fixtures for the integration suite.

use kuzu_vector_index::hnsw::VectorId;
use kuzu_vector_index::hooks::EmbeddingSource;

/// Linear-scan embedding lookup over a flat `ids.len() * dim` buffer,
/// mirroring `build_partition`'s own internal `SliceEmbeddingSource` — kept
/// here since that one is private to the crate.
pub struct SliceSource<'a> {
    ids: &'a [VectorId],
    vectors: &'a [f32],
    dim: usize,
}

impl<'a> SliceSource<'a> {
    #[must_use]
    pub fn new(ids: &'a [VectorId], vectors: &'a [f32], dim: usize) -> Self {
        Self { ids, vectors, dim }
    }
}

impl EmbeddingSource for SliceSource<'_> {
    fn fetch(&mut self, vid: VectorId) -> Option<&[f32]> {
        let pos = self.ids.iter().position(|&v| v == vid)?;
        Some(&self.vectors[pos * self.dim..(pos + 1) * self.dim])
    }
}
