//! Partitioned lower-layer adjacency storage (§4.5).
//!
//! A forward-only CSR-like store: one contiguous block per partition,
//! pre-filled with [`INVALID_VID`]. Readers (search) never mutate and may
//! run fully concurrently with each other; writers (the builder) coordinate
//! through per-node mutexes held outside this type (§hnsw::builder).

use crate::hooks::PartitionBufferSink;

/// Vector identifier: an unsigned 64-bit offset into the vector table.
pub type VectorId = u64;

/// Sentinel marking an empty neighbor slot.
pub const INVALID_VID: VectorId = u64::MAX;

/// Partitioned adjacency store for the lower (full) HNSW layer.
pub struct PartitionedGraph {
    partitions: Vec<Vec<VectorId>>,
    max_degree: usize,
    partition_size: usize,
    num_vectors: usize,
}

impl PartitionedGraph {
    /// Allocates storage for `num_vectors` vids, `max_degree` neighbor slots
    /// per vid, split into partitions of `partition_size` vids each.
    #[must_use]
    pub fn new(num_vectors: usize, max_degree: usize, partition_size: usize) -> Self {
        let num_partitions = num_vectors.div_ceil(partition_size).max(1);
        let partitions = (0..num_partitions)
            .map(|_| vec![INVALID_VID; partition_size * max_degree])
            .collect();
        Self {
            partitions,
            max_degree,
            partition_size,
            num_vectors,
        }
    }

    /// The partition index containing `vid`.
    #[must_use]
    pub fn partition_of(&self, vid: VectorId) -> usize {
        vid as usize / self.partition_size
    }

    /// Max out-degree per vid.
    #[must_use]
    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    fn slot_range(&self, vid: VectorId) -> (usize, usize, usize) {
        let partition = self.partition_of(vid);
        let local = vid as usize % self.partition_size;
        let begin = local * self.max_degree;
        (partition, begin, begin + self.max_degree)
    }

    /// Returns `vid`'s neighbor slots, mutable.
    pub fn neighbors_mut(&mut self, vid: VectorId) -> &mut [VectorId] {
        let (partition, begin, end) = self.slot_range(vid);
        &mut self.partitions[partition][begin..end]
    }

    /// Returns `vid`'s neighbor slots.
    #[must_use]
    pub fn neighbors(&self, vid: VectorId) -> &[VectorId] {
        let (partition, begin, end) = self.slot_range(vid);
        &self.partitions[partition][begin..end]
    }

    /// Drains every partition's adjacency, skipping [`INVALID_VID`] slots,
    /// into `sink` as `(src, dst, rel_idx)` triples in partition-major,
    /// node-major, slot-major order (§4.5 "Publish").
    pub fn populate_partition_buffer(&self, sink: &mut impl PartitionBufferSink) {
        let mut rel_idx: u64 = 0;
        for (partition_idx, partition) in self.partitions.iter().enumerate() {
            let nodes_in_partition = self.partition_size.min(
                self.num_vectors
                    .saturating_sub(partition_idx * self.partition_size),
            );
            for local in 0..nodes_in_partition {
                let src = (partition_idx * self.partition_size + local) as VectorId;
                let begin = local * self.max_degree;
                for &dst in &partition[begin..begin + self.max_degree] {
                    if dst == INVALID_VID {
                        continue;
                    }
                    sink.append(partition_idx as u32, src, dst, rel_idx);
                    rel_idx += 1;
                }
            }
        }
    }
}
