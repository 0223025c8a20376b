//! Top-level search driver (§2 "driver drains top-k from MQs and merges",
//! §4.9): resolves one partition's entrypoint from a bare query vector,
//! dispatches one [`VectorSearchTask`] per thread slot against that
//! partition's shared multi-queue, and drains the merged nearest-first
//! top-`k`.
//!
//! Tasks within a partition already merge through the multi-queue itself —
//! it is the one structure every task pushes into and the one the caller
//! drains — so "merging" here is draining that shared queue rather than
//! reconciling N separate result lists.

use std::sync::atomic::AtomicBool;

use crate::distance::DistanceComputer;
use crate::hnsw::graph::{PartitionedGraph, VectorId};
use crate::hnsw::header::PartitionHeader;
use crate::hnsw::mq::{NodeDistCloser, ParallelMultiQueue};

use super::entry::resolve_entry;
use super::engine::{SearchTaskConfig, VectorSearchTask};
use super::strategy::default_max_neighbours_check;

/// Splits `ef_search` across `num_threads` worker slots (§4.9
/// `ef_per_thread = ef * 1.2 / maxNumThreads`).
fn per_thread_config(ef_search: i32, num_threads: usize) -> SearchTaskConfig {
    let num_threads = num_threads.max(1) as f32;
    SearchTaskConfig {
        ef_per_thread: (ef_search.max(1) as f32 * 1.2) / num_threads,
        max_probes: default_max_neighbours_check(ef_search),
    }
}

/// Answers an unfiltered query against one partition.
///
/// Resolves the lower-layer entrypoint from `dc`'s current query (seeded
/// via [`resolve_entry`]), then runs `num_threads` search tasks — each with
/// its own visited table, all sharing one [`ParallelMultiQueue`] sized for
/// `k` per slot — and drains that queue into a nearest-first `Vec` of at
/// most `k` results.
///
/// Returns an empty vec if the partition has no entrypoint yet (nothing was
/// ever inserted), or if the entrypoint's own embedding can't be resolved
/// (a data error already logged by the distance computer).
#[must_use]
pub fn search_partition(
    graph: &PartitionedGraph,
    header: &PartitionHeader,
    partition_idx: u32,
    partition_size: usize,
    dc: &mut dyn DistanceComputer,
    k: usize,
    ef_search: i32,
    num_threads: usize,
) -> Vec<NodeDistCloser> {
    let Some((entry, entry_dist)) = resolve_entry(header, dc) else {
        return Vec::new();
    };

    let num_threads = num_threads.max(1);
    let config = per_thread_config(ef_search, num_threads);
    let mq: ParallelMultiQueue<NodeDistCloser> =
        ParallelMultiQueue::new(num_threads, k.max(1) * num_threads);
    let cancelled = AtomicBool::new(false);

    for slot in 0..num_threads {
        let mut task = VectorSearchTask::new(
            partition_idx,
            slot,
            graph,
            &mq,
            &cancelled,
            partition_size,
            config,
        );
        task.run_unfiltered(dc, entry, entry_dist);
    }

    drain_top_k(&mq, k)
}

/// Answers a filtered query against one partition, using the same
/// entrypoint-seeding and multi-task dispatch as [`search_partition`] but
/// routing each task through [`VectorSearchTask::run_filtered`]'s
/// selectivity-adaptive strategy (§4.9).
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn search_partition_filtered(
    graph: &PartitionedGraph,
    header: &PartitionHeader,
    partition_idx: u32,
    partition_size: usize,
    dc: &mut dyn DistanceComputer,
    k: usize,
    ef_search: i32,
    num_threads: usize,
    mask: &dyn Fn(VectorId) -> bool,
    selectivity: f32,
    max_k: usize,
) -> Vec<NodeDistCloser> {
    let Some((entry, entry_dist)) = resolve_entry(header, dc) else {
        return Vec::new();
    };

    let num_threads = num_threads.max(1);
    let config = per_thread_config(ef_search, num_threads);
    let mq: ParallelMultiQueue<NodeDistCloser> =
        ParallelMultiQueue::new(num_threads, k.max(1) * num_threads);
    let cancelled = AtomicBool::new(false);

    for slot in 0..num_threads {
        let mut task = VectorSearchTask::new(
            partition_idx,
            slot,
            graph,
            &mq,
            &cancelled,
            partition_size,
            config,
        );
        task.run_filtered(dc, entry, entry_dist, mask, selectivity, max_k, || None);
    }

    drain_top_k(&mq, k)
}

fn drain_top_k(mq: &ParallelMultiQueue<NodeDistCloser>, k: usize) -> Vec<NodeDistCloser> {
    let mut out = Vec::with_capacity(k);
    while out.len() < k {
        match mq.pop_min() {
            Some(item) => out.push(item),
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DistanceFunc, IndexConfig};
    use crate::distance::NodeTableComputer;
    use crate::hnsw::build_partition;
    use crate::hooks::InMemoryHooks;

    #[test]
    fn search_partition_finds_exact_nearest() {
        let mut config = IndexConfig::new(2);
        config.max_nbrs_at_lower_level = 4;
        config.ef_construction = 16;
        config.ef_search = 16;
        config.distance_func = DistanceFunc::L2;
        config.sq_enabled = false;

        let ids: Vec<u64> = (0..8).collect();
        let vectors: Vec<f32> = (0..8).flat_map(|i| [i as f32, 0.0]).collect();

        let mut codes = InMemoryHooks::default();
        let mut partition_buffer = InMemoryHooks::default();
        let builder = build_partition(&config, &ids, &vectors, 7, &mut codes, &mut partition_buffer)
            .expect("build should succeed");

        let mut source = InMemoryHooks {
            embeddings: (0..8).map(|i| vec![i as f32, 0.0]).collect(),
            ..Default::default()
        };
        let mut dc = NodeTableComputer::new(&mut source, 2, config.distance_func);
        dc.set_query(&[3.4, 0.0]);

        let graph = builder.graph().read();
        let top = search_partition(
            &graph,
            builder.header(),
            0,
            8,
            &mut dc,
            1,
            config.ef_search,
            2,
        );
        assert_eq!(top.first().map(|r| r.vid), Some(3));
    }
}
