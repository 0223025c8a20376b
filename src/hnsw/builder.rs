//! Partitioned concurrent HNSW builder (§4.7): greedy upper-layer descent,
//! best-first lower-layer search, ACORN-style neighbor shrink, and the
//! upper/lower per-level insert passes with back-edge repair.
//!
//! Per-node mutual exclusion is one [`parking_lot::Mutex`] per vid in the
//! partition (§4.7 "Per-node mutual exclusion uses one
//! `Vec<parking_lot::Mutex<()>>`"); the adjacency arrays themselves sit
//! behind a [`parking_lot::RwLock`] so Rust's aliasing rules are satisfied
//! without unsafe — the *real* exclusivity guarantee comes from the node
//! lock, held for the duration of a node's mutation, not from the RwLock's
//! own contention (which is always uncontended in practice: only the
//! lock-holding thread ever takes the write guard for that node's slice).
//!
//! Cyclic back-edges (§9 "Cyclic back-edges"): `insert_node` never holds
//! the source node's lock while acquiring a destination's lock for repair;
//! each `make_connection` call acquires exactly one node's lock for the
//! duration of its own mutation.

use std::collections::HashSet;
use std::sync::Barrier;

use parking_lot::{Mutex, MutexGuard, RwLock};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::{DistanceFunc, IndexConfig};
use crate::distance::{DistanceComputer, NodeTableComputer};
use crate::error::{DataError, InvariantError, ResourceError};
use crate::hooks::{CompressedCodeSink, EmbeddingSource, PartitionBufferSink};
use crate::quantization::{BatchTrainer, Sq8Quantizer};

use super::graph::{PartitionedGraph, VectorId, INVALID_VID};
use super::header::{EntrypointState, PartitionHeader};
use super::mq::{NodeDistCloser, NodeDistFarther};
use super::visited::VisitedTable;

/// Admissions before the ACORN shrink's neigh-of-neigh set starts growing
/// (§4.7 step 3 "admit node A if admitted fewer than `maxNbrsBeta` nodes").
const MAX_NBRS_BETA: usize = 2;

/// Greedy walk on the upper layer following the single best neighbor at each
/// step; terminates when no neighbor improves the distance (§4.7 item 1).
///
/// `pub(crate)` rather than private: search-time entrypoint seeding
/// ([`crate::search::entry::resolve_entry`]) performs the same upper-layer
/// descent the builder does at insert time, over the same header.
pub(crate) fn search_nn_upper(
    dc: &mut dyn DistanceComputer,
    header: &PartitionHeader,
    start: u32,
    start_dist: f32,
) -> (u32, f32) {
    let mut best = start;
    let mut best_dist = start_dist;
    loop {
        let mut improved = false;
        for raw in header.neighbors(best) {
            if raw == INVALID_VID {
                continue;
            }
            let candidate = raw as u32;
            let actual = header.actual_id(candidate);
            let Some(d) = dc.compute_id(actual) else {
                continue;
            };
            if d < best_dist {
                best_dist = d;
                best = candidate;
                improved = true;
            }
        }
        if !improved {
            break;
        }
    }
    (best, best_dist)
}

/// Resolves the lower-layer entrypoint for a fresh query against `header`:
/// greedy-descends the upper layer if the partition has one (§4.7 item 1),
/// mapping back to the lower-layer vid; returns the L0 entrypoint directly
/// if the partition never promoted anything; `None` if nothing has been
/// inserted into the partition yet, or a data error prevents computing a
/// distance to the candidate entrypoint.
///
/// Shared by [`HnswPartitionBuilder::insert_lower`] (insert-time) and
/// [`crate::search::entry::resolve_entry`] (search-time) — insertion keeps
/// its own `insert_lower` match arm rather than calling this, since it must
/// special-case "the entrypoint is the vid being inserted".
pub(crate) fn resolve_lower_entry(
    header: &PartitionHeader,
    dc: &mut dyn DistanceComputer,
) -> Option<(VectorId, f32)> {
    match header.entrypoint() {
        EntrypointState::None => None,
        EntrypointState::L0 { vid } => dc.compute_id(vid).map(|d| (vid, d)),
        EntrypointState::L1 { upper_id } => {
            let actual = header.actual_id(upper_id);
            let dist = dc.compute_id(actual)?;
            let (nearest_upper, _) = search_nn_upper(dc, header, upper_id, dist);
            let actual = header.actual_id(nearest_upper);
            dc.compute_id(actual).map(|d| (actual, d))
        }
    }
}

/// Standard HNSW best-first search (§4.7 item 2).
///
/// `candidates` is a min-heap by distance (popping nearest first);
/// `results` is bounded at `ef` and evicts its farthest member whenever a
/// closer candidate arrives. Returns `results` sorted nearest-first.
///
/// The heap choice looks inverted at a glance: [`NodeDistFarther`]'s `Ord`
/// makes the *nearest* item compare greatest, so a plain
/// `std::collections::BinaryHeap` (which pops the greatest) yields nearest
/// first for `candidates`; [`NodeDistCloser`]'s `Ord` makes the *farthest*
/// item compare greatest, so the same max-heap yields farthest first for
/// `results`, which is exactly the eviction order we want.
fn search_ann(
    dc: &mut dyn DistanceComputer,
    entry: VectorId,
    entry_dist: f32,
    ef: usize,
    visited: &mut VisitedTable,
    neighbors_of: impl Fn(VectorId) -> Vec<VectorId>,
) -> Vec<NodeDistCloser> {
    let mut candidates = std::collections::BinaryHeap::new();
    let mut results = std::collections::BinaryHeap::new();

    visited.set(entry as usize);
    candidates.push(NodeDistFarther {
        vid: entry,
        dist: entry_dist,
    });
    results.push(NodeDistCloser {
        vid: entry,
        dist: entry_dist,
    });

    while let Some(NodeDistFarther { vid, dist }) = candidates.pop() {
        if results.len() >= ef {
            if let Some(worst) = results.peek() {
                if dist > worst.dist {
                    break;
                }
            }
        }
        for nbr in neighbors_of(vid) {
            if nbr == INVALID_VID || visited.get(nbr as usize) {
                continue;
            }
            visited.set(nbr as usize);
            let Some(d) = dc.compute_id(nbr) else {
                continue;
            };
            let improves = results.len() < ef || results.peek().is_some_and(|w| d < w.dist);
            if improves {
                candidates.push(NodeDistFarther { vid: nbr, dist: d });
                results.push(NodeDistCloser { vid: nbr, dist: d });
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    results.into_sorted_vec()
}

/// ACORN-style neighbor shrink with beta look-ahead (§4.7 item 3).
///
/// `ordered` must be nearest-first. Admits a candidate once
/// [`MAX_NBRS_BETA`] nodes are already admitted only if it is not already a
/// neighbor of a previously admitted node, preserving diversity while still
/// favoring near neighbors.
fn shrink_neighbors_acorn(
    ordered: &[NodeDistCloser],
    max_size: usize,
    neighbors_of: impl Fn(VectorId) -> Vec<VectorId>,
) -> Vec<VectorId> {
    let mut admitted = Vec::with_capacity(max_size);
    let mut neigh_of_neigh: HashSet<VectorId> = HashSet::new();

    for cand in ordered {
        if admitted.len() >= max_size || neigh_of_neigh.len() >= max_size {
            break;
        }
        let admit = admitted.len() < MAX_NBRS_BETA || !neigh_of_neigh.contains(&cand.vid);
        if admit {
            admitted.push(cand.vid);
            if admitted.len() > MAX_NBRS_BETA {
                for n in neighbors_of(cand.vid) {
                    if n != INVALID_VID {
                        neigh_of_neigh.insert(n);
                    }
                }
            }
        }
    }
    admitted
}

/// Partition-scoped, concurrently-insertable HNSW core (§4.7).
///
/// One instance owns exactly one partition's upper and lower layers. A
/// caller wanting true cross-thread parallelism spawns one thread per
/// disjoint id range and calls [`HnswPartitionBuilder::insert`] directly on
/// each, since the per-node locks (not any API-level batching) are what
/// make concurrent inserts into the same partition safe.
pub struct HnswPartitionBuilder {
    config: IndexConfig,
    partition_size: usize,
    graph: RwLock<PartitionedGraph>,
    header: PartitionHeader,
    locks: Vec<Mutex<()>>,
}

impl HnswPartitionBuilder {
    /// Creates an empty partition sized for up to `partition_size` vids.
    #[must_use]
    pub fn new(config: IndexConfig, partition_size: usize) -> Self {
        let max_lower = config.effective_max_nbrs_lower();
        let max_upper = config.effective_max_nbrs_upper();
        Self {
            graph: RwLock::new(PartitionedGraph::new(
                partition_size,
                max_lower,
                partition_size,
            )),
            header: PartitionHeader::new(max_upper),
            locks: (0..partition_size).map(|_| Mutex::new(())).collect(),
            config,
            partition_size,
        }
    }

    /// The partition's upper-layer header.
    #[must_use]
    pub fn header(&self) -> &PartitionHeader {
        &self.header
    }

    /// The partition's lower-layer adjacency, for readers and for flushing.
    #[must_use]
    pub fn graph(&self) -> &RwLock<PartitionedGraph> {
        &self.graph
    }

    fn local(&self, vid: VectorId) -> usize {
        vid as usize % self.partition_size
    }

    fn lock_node(&self, vid: VectorId) -> MutexGuard<'_, ()> {
        self.locks[self.local(vid)].lock()
    }

    fn lower_neighbors(&self, vid: VectorId) -> Vec<VectorId> {
        self.graph.read().neighbors(vid).to_vec()
    }

    fn upper_neighbors(&self, upper_id: u32) -> Vec<VectorId> {
        self.header.neighbors(upper_id)
    }

    /// Appends `dst` to `src`'s neighbor block if a free slot exists;
    /// otherwise recomputes the shrunken set from `src`'s current neighbors
    /// plus `dst` (§4.7 item 4). Caller must already hold `src`'s node lock.
    fn make_connection_lower(&self, dc: &mut dyn DistanceComputer, src: VectorId, dst: VectorId) {
        {
            let mut g = self.graph.write();
            let slots = g.neighbors_mut(src);
            if let Some(slot) = slots.iter_mut().find(|s| **s == INVALID_VID) {
                *slot = dst;
                return;
            }
        }
        let current = self.lower_neighbors(src);
        let mut candidates: Vec<NodeDistCloser> = current
            .iter()
            .filter(|&&v| v != INVALID_VID && v != dst)
            .chain(std::iter::once(&dst))
            .filter_map(|&v| dc.compute_pair(src, v).map(|d| NodeDistCloser { vid: v, dist: d }))
            .collect();
        candidates.sort_unstable_by(|a, b| a.dist.total_cmp(&b.dist));
        let max_nbrs = self.config.effective_max_nbrs_lower();
        let shrunk = shrink_neighbors_acorn(&candidates, max_nbrs, |v| self.lower_neighbors(v));
        let mut g = self.graph.write();
        let slots = g.neighbors_mut(src);
        for (slot, v) in slots
            .iter_mut()
            .zip(shrunk.iter().chain(std::iter::repeat(&INVALID_VID)))
        {
            *slot = *v;
        }
    }

    /// Upper-layer analogue of [`Self::make_connection_lower`]. `src`/`dst`
    /// are upper-layer ids; caller must hold `actual_id(src)`'s node lock.
    fn make_connection_upper(&self, dc: &mut dyn DistanceComputer, src: u32, dst: u32) {
        let current = self.upper_neighbors(src);
        if let Some(empty_idx) = current.iter().position(|&v| v == INVALID_VID) {
            let mut row = current;
            row[empty_idx] = u64::from(dst);
            self.header.set_neighbors(src, &row);
            return;
        }
        let src_actual = self.header.actual_id(src);
        let mut candidates: Vec<NodeDistCloser> = current
            .iter()
            .filter(|&&v| v != INVALID_VID && v as u32 != dst)
            .map(|&v| v as u32)
            .chain(std::iter::once(dst))
            .filter_map(|upper_id| {
                let actual = self.header.actual_id(upper_id);
                dc.compute_pair(src_actual, actual)
                    .map(|d| NodeDistCloser { vid: u64::from(upper_id), dist: d })
            })
            .collect();
        candidates.sort_unstable_by(|a, b| a.dist.total_cmp(&b.dist));
        let max_nbrs = self.config.effective_max_nbrs_upper();
        let shrunk = shrink_neighbors_acorn(&candidates, max_nbrs, |upper_id| {
            self.upper_neighbors(upper_id as u32)
        });
        self.header.set_neighbors(src, &shrunk);
    }

    /// Resolves the greedy upper-layer entrypoint, if one exists, returning
    /// `(upper_id, dist)` nearest to `dc`'s current query.
    fn resolve_upper_entry(&self, dc: &mut dyn DistanceComputer) -> Option<(u32, f32)> {
        match self.header.entrypoint() {
            EntrypointState::L1 { upper_id } => {
                let actual = self.header.actual_id(upper_id);
                let dist = dc.compute_id(actual)?;
                Some(search_nn_upper(dc, &self.header, upper_id, dist))
            }
            EntrypointState::None | EntrypointState::L0 { .. } => None,
        }
    }

    /// Inserts `id` (already fetched into `dc`'s query slot) into this
    /// partition: upper-layer promotion/connect (if sampled), then the
    /// lower-layer insert and back-edge repair (§4.7 "Per-level insert").
    pub fn insert(&self, id: VectorId, dc: &mut dyn DistanceComputer, rng: &mut ChaCha8Rng) {
        let _guard = self.lock_node(id);
        self.header.set_initial_entrypoint(id);

        if PartitionHeader::should_promote(rng, self.config.sampling_probability) {
            self.insert_upper(id, dc);
        }
        self.insert_lower(id, dc);
    }

    fn insert_upper(&self, id: VectorId, dc: &mut dyn DistanceComputer) {
        let entry = self.resolve_upper_entry(dc);
        let upper_id = self.header.promote(id);

        let Some((entry_upper_id, entry_dist)) = entry else {
            return; // this vid is the first upper-layer member; no search needed.
        };

        let mut visited = VisitedTable::new(self.header.num_vectors_in_upper_level().max(1));
        let ef = self.config.ef_construction as usize;
        let results = search_ann(
            dc,
            u64::from(entry_upper_id),
            entry_dist,
            ef,
            &mut visited,
            |uid| self.upper_neighbors(uid as u32),
        );
        let max_nbrs = self.config.effective_max_nbrs_upper();
        let back_nbrs = shrink_neighbors_acorn(&results, max_nbrs, |uid| self.upper_neighbors(uid as u32));
        self.header.set_neighbors(upper_id, &back_nbrs);

        for &back in &back_nbrs {
            let back_upper = back as u32;
            let back_actual = self.header.actual_id(back_upper);
            let _g = self.lock_node(back_actual);
            self.make_connection_upper(dc, back_upper, upper_id);
        }
    }

    fn insert_lower(&self, id: VectorId, dc: &mut dyn DistanceComputer) {
        let entry = match self.header.entrypoint() {
            EntrypointState::None => None,
            EntrypointState::L0 { vid } if vid == id => None,
            EntrypointState::L0 { vid } => dc.compute_id(vid).map(|d| (vid, d)),
            EntrypointState::L1 { upper_id } => {
                let (nearest_upper, _) = self
                    .resolve_upper_entry(dc)
                    .unwrap_or((upper_id, f32::INFINITY));
                let actual = self.header.actual_id(nearest_upper);
                dc.compute_id(actual).map(|d| (actual, d))
            }
        };

        let Some((entry_vid, entry_dist)) = entry else {
            return; // first-ever vid in the partition; no neighbors to search for.
        };

        let mut visited = VisitedTable::new(self.partition_size);
        let ef = self.config.ef_construction as usize;
        let results = search_ann(dc, entry_vid, entry_dist, ef, &mut visited, |v| {
            self.lower_neighbors(v)
        });
        let max_nbrs = self.config.effective_max_nbrs_lower();
        let back_nbrs = shrink_neighbors_acorn(&results, max_nbrs, |v| self.lower_neighbors(v));

        {
            let mut g = self.graph.write();
            let slots = g.neighbors_mut(id);
            for (slot, v) in slots
                .iter_mut()
                .zip(back_nbrs.iter().copied().chain(std::iter::repeat(INVALID_VID)))
            {
                *slot = v;
            }
        }

        for &cand in &back_nbrs {
            let _g = self.lock_node(cand);
            self.make_connection_lower(dc, cand, id);
        }
    }

    /// Invariant checks for §8's quantified properties: no lower-layer
    /// self-loop, no duplicate vid in the upper-layer `actualIds` list.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantError`] found, if any.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let g = self.graph.read();
        for local in 0..self.partition_size {
            let vid = local as VectorId;
            if g.neighbors(vid).contains(&vid) {
                return Err(InvariantError::SelfLoop { vid });
            }
        }

        let mut seen = HashSet::new();
        for upper_id in 0..self.header.num_vectors_in_upper_level() as u32 {
            let vid = self.header.actual_id(upper_id);
            if !seen.insert(vid) {
                return Err(InvariantError::DuplicateUpperLayerVid { partition: 0, vid });
            }
        }
        Ok(())
    }
}

/// A barrier equivalent to the source's `compressionLatch` (§5, §9
/// "Latches"): every training thread must arrive before the quantization
/// pass starts. Trivial with `std::sync::Barrier`; exposed as a thin
/// constructor so callers don't need to depend on `std::sync` directly.
#[must_use]
pub fn compression_latch(num_threads: usize) -> Barrier {
    Barrier::new(num_threads.max(1))
}

/// Builds one partition end-to-end (§2 control flow): inserts every vector
/// into the graph, trains + applies SQ8 if `config.sq_enabled`, and flushes
/// the adjacency into `partition_buffer_sink` via
/// [`PartitionedGraph::populate_partition_buffer`].
///
/// `vectors` is `ids.len() * dim` contiguous f32s, row `i` corresponding to
/// `ids[i]`. Rows with the wrong length are impossible by construction here
/// (the caller owns the contiguous layout); a null/missing embedding for a
/// live offset is instead the caller's concern when assembling `vectors`
/// from the node table (§7 kind 3 data errors) — this function only sees
/// already-resolved rows.
///
/// # Errors
///
/// Returns [`ResourceError::TrainingFailed`] if `config.sq_enabled` and
/// `config.dim <= 0`.
pub fn build_partition(
    config: &IndexConfig,
    ids: &[VectorId],
    vectors: &[f32],
    rng_seed: u64,
    code_sink: &mut impl CompressedCodeSink,
    partition_buffer_sink: &mut impl PartitionBufferSink,
) -> Result<HnswPartitionBuilder, ResourceError> {
    let dim = config.dim as usize;
    debug_assert_eq!(vectors.len(), ids.len() * dim);

    let partition_size = ids.len();
    let builder = HnswPartitionBuilder::new(*config, partition_size);
    let mut rng = ChaCha8Rng::seed_from_u64(rng_seed);

    let mut source = SliceEmbeddingSource { ids, vectors, dim };
    for &id in ids {
        let Some(row) = source.fetch(id) else {
            log::warn!("vid {id} has no embedding, skipping");
            continue;
        };
        let row = row.to_vec();
        let mut dc = NodeTableComputer::new(&mut source, dim, config.distance_func);
        dc.set_query(&row);
        builder.insert(id, &mut dc, &mut rng);
    }

    if config.sq_enabled {
        let mut trainer = BatchTrainer::new(dim)?;
        let rows: Vec<&[f32]> = (0..ids.len()).map(|i| &vectors[i * dim..(i + 1) * dim]).collect();
        trainer.observe(&rows);
        let quantizer: Sq8Quantizer = trainer.finalize();
        let mut code = vec![0u8; quantizer.code_size()];
        for (i, &id) in ids.iter().enumerate() {
            quantizer.encode(&vectors[i * dim..(i + 1) * dim], &mut code);
            code_sink.store(id, &code);
        }
    }

    builder.graph.read().populate_partition_buffer(partition_buffer_sink);
    Ok(builder)
}

/// Resolves a vid to its row in a contiguous `ids.len() * dim` embedding
/// array (linear scan; fine for the batch sizes this crate's tests use —
/// `build_partition` is not the hot path callers optimize).
struct SliceEmbeddingSource<'a> {
    ids: &'a [VectorId],
    vectors: &'a [f32],
    dim: usize,
}

impl EmbeddingSource for SliceEmbeddingSource<'_> {
    fn fetch(&mut self, vid: VectorId) -> Option<&[f32]> {
        let pos = self.ids.iter().position(|&v| v == vid)?;
        Some(&self.vectors[pos * self.dim..(pos + 1) * self.dim])
    }
}

/// Surfaces a data error for a fetch that returned nothing (§7 kind 3);
/// callers of [`EmbeddingSource::fetch`] outside this module construct this
/// directly rather than through a helper, since the vid and expected length
/// are already in scope at the call site.
#[must_use]
pub fn missing_embedding_error(vid: VectorId) -> DataError {
    DataError::NullEmbedding { vid }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::InMemoryHooks;

    fn line_vectors(n: usize) -> (Vec<VectorId>, Vec<f32>) {
        let ids: Vec<VectorId> = (0..n as u64).collect();
        let mut vectors = Vec::with_capacity(n * 2);
        for i in 0..n {
            vectors.push(i as f32);
            vectors.push(0.0);
        }
        (ids, vectors)
    }

    #[test]
    fn tiny_l2_index_exact_top1() {
        use crate::search::search_partition;

        let mut config = IndexConfig::new(2);
        config.max_nbrs_at_lower_level = 4;
        config.ef_construction = 16;
        config.ef_search = 16;
        config.distance_func = DistanceFunc::L2;
        config.sq_enabled = false;

        let (ids, vectors) = line_vectors(8);
        let mut hooks = InMemoryHooks::default();
        let mut sink = InMemoryHooks::default();
        let builder = build_partition(&config, &ids, &vectors, 7, &mut hooks, &mut sink).unwrap();
        builder.check_invariants().unwrap();

        let query = [3.4f32, 0.0];
        let mut source = SliceEmbeddingSource {
            ids: &ids,
            vectors: &vectors,
            dim: 2,
        };
        let mut dc = NodeTableComputer::new(&mut source, 2, DistanceFunc::L2);
        dc.set_query(&query);

        let graph = builder.graph().read();
        let top = search_partition(&graph, builder.header(), 0, ids.len(), &mut dc, 1, config.ef_search, 2);
        assert_eq!(top.first().map(|r| r.vid), Some(3));
    }

    #[test]
    fn no_self_loops_or_duplicates_after_insert() {
        let mut config = IndexConfig::new(2);
        config.max_nbrs_at_lower_level = 4;
        config.sq_enabled = false;
        let (ids, vectors) = line_vectors(20);
        let mut hooks = InMemoryHooks::default();
        let mut sink = InMemoryHooks::default();
        let builder = build_partition(&config, &ids, &vectors, 1, &mut hooks, &mut sink).unwrap();
        builder.check_invariants().unwrap();
    }

    #[test]
    fn single_vector_partition_has_no_neighbors() {
        let mut config = IndexConfig::new(2);
        config.sq_enabled = false;
        let (ids, vectors) = line_vectors(1);
        let mut hooks = InMemoryHooks::default();
        let mut sink = InMemoryHooks::default();
        let builder = build_partition(&config, &ids, &vectors, 1, &mut hooks, &mut sink).unwrap();
        assert!(builder.graph.read().neighbors(0).iter().all(|&v| v == INVALID_VID));
    }

    #[test]
    fn sampling_probability_zero_keeps_upper_layer_empty() {
        let mut config = IndexConfig::new(2);
        config.sampling_probability = 0.0;
        config.sq_enabled = false;
        let (ids, vectors) = line_vectors(16);
        let mut hooks = InMemoryHooks::default();
        let mut sink = InMemoryHooks::default();
        let builder = build_partition(&config, &ids, &vectors, 3, &mut hooks, &mut sink).unwrap();
        assert_eq!(builder.header.num_vectors_in_upper_level(), 0);
    }

    #[test]
    fn sq_enabled_persists_one_code_per_vid() {
        let mut config = IndexConfig::new(2);
        config.sq_enabled = true;
        let (ids, vectors) = line_vectors(10);
        let mut hooks = InMemoryHooks::default();
        let mut sink = InMemoryHooks::default();
        build_partition(&config, &ids, &vectors, 9, &mut hooks, &mut sink).unwrap();
        assert_eq!(hooks.codes.len(), ids.len());
    }
}
