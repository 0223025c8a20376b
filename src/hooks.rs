//! External hooks the core consumes instead of owning storage, catalog, or
//! WAL machinery directly (§4.10). Everything above these traits — the
//! node/rel table storage engine, the buffer manager, the WAL — is an
//! external collaborator.

use crate::hnsw::graph::VectorId;

/// Resolves a vid to its embedding, analogous to the source's
/// `fetch_embedding(vid) -> (frame_ref, offset_in_frame)`.
///
/// Implementations must return an 8×f32-aligned slice (§3 "Arena"); callers
/// never assume the returned slice stays valid past the next `fetch` call on
/// the same hook instance (mirrors the source's pinned-chunk-state reuse
/// contract, §4.4 "NodeTable").
pub trait EmbeddingSource {
    /// Returns the embedding for `vid`, or `None` if the embedding column
    /// held a null or wrong-length value (a [`crate::error::DataError`]
    /// case — the caller skips `vid` and continues).
    fn fetch(&mut self, vid: VectorId) -> Option<&[f32]>;
}

/// Appends a compressed SQ8 code for `vid` to a column-chunk sink.
///
/// Calls must be monotonic in `vid` within a partition (§4.10).
pub trait CompressedCodeSink {
    /// Stores `code` (one [`crate::quantization::Sq8Quantizer::code_size`]
    /// block) for `vid`.
    fn store(&mut self, vid: VectorId, code: &[u8]);
}

/// Appends one `(src, dst, rel_idx)` triple to a partition's persisted
/// adjacency sequence (§4.5 "Publish").
pub trait PartitionBufferSink {
    /// Appends one adjacency edge. `rel_idx` is a globally monotonically
    /// increasing integer reflecting partition-major, node-major,
    /// slot-major emission order.
    fn append(&mut self, partition: u32, src: VectorId, dst: VectorId, rel_idx: u64);
}

/// Supplies a reproducible RNG seed, analogous to the source's
/// `get_rng_seed() -> u64` (§4.10, §9 "Random number generation").
pub trait RngSeedSource {
    /// Returns the seed to use for this build.
    fn seed(&self) -> u64;
}

/// A fixed seed, for deterministic tests.
pub struct FixedSeed(pub u64);

impl RngSeedSource for FixedSeed {
    fn seed(&self) -> u64 {
        self.0
    }
}

/// An in-memory [`EmbeddingSource`]/[`CompressedCodeSink`]/[`PartitionBufferSink`]
/// triple backed by plain `Vec`s, for tests and small embedded use.
#[derive(Default)]
pub struct InMemoryHooks {
    /// `dim`-length embeddings, indexed by vid.
    pub embeddings: Vec<Vec<f32>>,
    /// Compressed codes stored by [`CompressedCodeSink::store`], indexed by vid.
    pub codes: std::collections::HashMap<VectorId, Vec<u8>>,
    /// Adjacency triples appended by [`PartitionBufferSink::append`], in emission order.
    pub partition_buffer: Vec<(u32, VectorId, VectorId, u64)>,
}

impl EmbeddingSource for InMemoryHooks {
    fn fetch(&mut self, vid: VectorId) -> Option<&[f32]> {
        self.embeddings.get(vid as usize).map(Vec::as_slice)
    }
}

impl CompressedCodeSink for InMemoryHooks {
    fn store(&mut self, vid: VectorId, code: &[u8]) {
        self.codes.insert(vid, code.to_vec());
    }
}

impl PartitionBufferSink for InMemoryHooks {
    fn append(&mut self, partition: u32, src: VectorId, dst: VectorId, rel_idx: u64) {
        self.partition_buffer.push((partition, src, dst, rel_idx));
    }
}
