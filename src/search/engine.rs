//! Parallel filtered/unfiltered search engine (§4.9): one [`VectorSearchTask`]
//! per `(partition, thread_slot)`, each driving a local best-first walk and
//! periodically flushing into the partition's shared [`ParallelMultiQueue`].
//!
//! `VectorSearchTask::run*` is reconstructed from the prose description of
//! `searchANN` (§4.7) and the filtered-BFS heuristic (§4.9) — the source's
//! own implementation of this method is almost entirely commented out.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::distance::DistanceComputer;
use crate::error::SearchStatus;
use crate::hnsw::graph::{PartitionedGraph, VectorId, INVALID_VID};
use crate::hnsw::mq::{NodeDistCloser, NodeDistFarther, ParallelMultiQueue};
use crate::hnsw::visited::VisitedTable;

use super::strategy::{choose_strategy, FilterStrategy};

/// Flush the task's local results into the shared MQ every this many
/// expansion iterations (§4.9 "Main loop").
pub const SYNC_AFTER_ITER: usize = 3;

/// Per-task, per-thread-slot search configuration derived from the index's
/// `ef_search` (§4.9: "`maxNumThreads` slots per partition yield a divided
/// budget `ef_per_thread = ef * 1.2 / maxNumThreads`").
#[derive(Debug, Clone, Copy)]
pub struct SearchTaskConfig {
    /// This task's share of the partition's candidate-list budget.
    pub ef_per_thread: f32,
    /// Probe budget for in-filter BFS (`maxNeighboursCheck`, §6.3).
    pub max_probes: usize,
}

/// One `(partition, thread_slot)` search task (§4.9).
pub struct VectorSearchTask<'a> {
    partition_idx: u32,
    thread_slot: usize,
    graph: &'a PartitionedGraph,
    mq: &'a ParallelMultiQueue<NodeDistCloser>,
    visited: VisitedTable,
    cancelled: &'a AtomicBool,
    config: SearchTaskConfig,
}

impl<'a> VectorSearchTask<'a> {
    /// Creates a task for `partition_idx`'s `thread_slot`-th worker, with a
    /// fresh per-task visited table sized for `partition_size` vids (owned
    /// per task, never shared — §5 "Shared-resource policy").
    #[must_use]
    pub fn new(
        partition_idx: u32,
        thread_slot: usize,
        graph: &'a PartitionedGraph,
        mq: &'a ParallelMultiQueue<NodeDistCloser>,
        cancelled: &'a AtomicBool,
        partition_size: usize,
        config: SearchTaskConfig,
    ) -> Self {
        Self {
            partition_idx,
            thread_slot,
            graph,
            mq,
            visited: VisitedTable::new(partition_size.max(1)),
            cancelled,
            config,
        }
    }

    /// The partition this task searches.
    #[must_use]
    pub fn partition_idx(&self) -> u32 {
        self.partition_idx
    }

    /// This task's slot index among the partition's concurrent searchers.
    #[must_use]
    pub fn thread_slot(&self) -> usize {
        self.thread_slot
    }

    /// Unfiltered best-first search (§4.9 "Main loop"). Terminates when
    /// local candidates are exhausted, the best candidate no longer beats
    /// the shared MQ's current top, or this task's `ef_per_thread` budget
    /// of results has been produced.
    pub fn run_unfiltered(
        &mut self,
        dc: &mut dyn DistanceComputer,
        entry: VectorId,
        entry_dist: f32,
    ) -> SearchStatus {
        let ef_budget = self.config.ef_per_thread.ceil().max(1.0) as usize;
        let mut candidates: BinaryHeap<NodeDistFarther> = BinaryHeap::new();
        let mut results: Vec<NodeDistCloser> = Vec::new();

        self.visited.set(entry as usize);
        candidates.push(NodeDistFarther { vid: entry, dist: entry_dist });
        results.push(NodeDistCloser { vid: entry, dist: entry_dist });

        let mut iter = 0usize;
        while let Some(NodeDistFarther { vid, dist }) = candidates.pop() {
            if self.cancelled.load(Ordering::Relaxed) {
                return SearchStatus::Cancelled;
            }
            if let Some(top) = self.mq.top() {
                if dist > top.dist {
                    break;
                }
            }
            for &nbr in self.graph.neighbors(vid) {
                if nbr == INVALID_VID || self.visited.get(nbr as usize) {
                    continue;
                }
                self.visited.set(nbr as usize);
                let Some(d) = dc.compute_id(nbr) else {
                    continue;
                };
                candidates.push(NodeDistFarther { vid: nbr, dist: d });
                results.push(NodeDistCloser { vid: nbr, dist: d });
            }

            iter += 1;
            if results.len() >= ef_budget {
                break;
            }
            if iter % SYNC_AFTER_ITER == 0 && !results.is_empty() {
                self.mq.bulk_push(&results);
                results.clear();
            }
        }

        if !results.is_empty() {
            self.mq.bulk_push(&results);
        }
        SearchStatus::Ok
    }

    /// Filtered search, dispatching to post-filter or in-filter per the
    /// selectivity heuristic (§4.9). `selectivity` is the fraction of nodes
    /// `mask` selects; short-circuit selectivity contributes nothing, since
    /// the caller is expected to brute-force exact distances instead.
    pub fn run_filtered(
        &mut self,
        dc: &mut dyn DistanceComputer,
        entry: VectorId,
        entry_dist: f32,
        mask: &dyn Fn(VectorId) -> bool,
        selectivity: f32,
        max_k: usize,
        mut fallback_seed: impl FnMut() -> Option<VectorId>,
    ) -> SearchStatus {
        match choose_strategy(selectivity) {
            FilterStrategy::ShortCircuit => SearchStatus::Ok,
            FilterStrategy::PostFilter => self.run_post_filter(dc, entry, entry_dist, mask),
            FilterStrategy::InFilter => {
                self.run_in_filter(dc, entry, entry_dist, mask, max_k, &mut fallback_seed)
            }
        }
    }

    fn run_post_filter(
        &mut self,
        dc: &mut dyn DistanceComputer,
        entry: VectorId,
        entry_dist: f32,
        mask: &dyn Fn(VectorId) -> bool,
    ) -> SearchStatus {
        let ef_budget = self.config.ef_per_thread.ceil().max(1.0) as usize;
        let mut candidates: BinaryHeap<NodeDistFarther> = BinaryHeap::new();
        let mut results: Vec<NodeDistCloser> = Vec::new();

        self.visited.set(entry as usize);
        candidates.push(NodeDistFarther { vid: entry, dist: entry_dist });
        if mask(entry) {
            results.push(NodeDistCloser { vid: entry, dist: entry_dist });
        }

        let mut iter = 0usize;
        let mut matched = 0usize;
        while let Some(NodeDistFarther { vid, dist }) = candidates.pop() {
            if self.cancelled.load(Ordering::Relaxed) {
                return SearchStatus::Cancelled;
            }
            if let Some(top) = self.mq.top() {
                if dist > top.dist {
                    break;
                }
            }
            for &nbr in self.graph.neighbors(vid) {
                if nbr == INVALID_VID || self.visited.get(nbr as usize) {
                    continue;
                }
                self.visited.set(nbr as usize);
                let Some(d) = dc.compute_id(nbr) else {
                    continue;
                };
                candidates.push(NodeDistFarther { vid: nbr, dist: d });
                if mask(nbr) {
                    results.push(NodeDistCloser { vid: nbr, dist: d });
                    matched += 1;
                }
            }

            iter += 1;
            if matched >= ef_budget {
                break;
            }
            if iter % SYNC_AFTER_ITER == 0 && !results.is_empty() {
                self.mq.bulk_push(&results);
                results.clear();
            }
        }

        if !results.is_empty() {
            self.mq.bulk_push(&results);
        }
        SearchStatus::Ok
    }

    /// Bounded BFS yielding only masked nodes, capped at `max_k` hits or
    /// `config.max_probes` expansions, reseeding from `fallback_seed` when
    /// the frontier collapses before either cap is reached (§4.9).
    ///
    /// `fallback_seed` should eventually return `None`; a caller that keeps
    /// returning already-visited vids causes this to loop until it does.
    fn run_in_filter(
        &mut self,
        dc: &mut dyn DistanceComputer,
        entry: VectorId,
        entry_dist: f32,
        mask: &dyn Fn(VectorId) -> bool,
        max_k: usize,
        fallback_seed: &mut impl FnMut() -> Option<VectorId>,
    ) -> SearchStatus {
        let mut candidates: BinaryHeap<NodeDistFarther> = BinaryHeap::new();
        let mut results: Vec<NodeDistCloser> = Vec::new();
        let mut probes = 0usize;

        self.visited.set(entry as usize);
        candidates.push(NodeDistFarther { vid: entry, dist: entry_dist });
        if mask(entry) {
            results.push(NodeDistCloser { vid: entry, dist: entry_dist });
        }

        loop {
            while let Some(NodeDistFarther { vid, .. }) = candidates.pop() {
                if self.cancelled.load(Ordering::Relaxed) {
                    return SearchStatus::Cancelled;
                }
                probes += 1;
                if probes >= self.config.max_probes || results.len() >= max_k {
                    if !results.is_empty() {
                        self.mq.bulk_push(&results);
                    }
                    return SearchStatus::Ok;
                }
                for &nbr in self.graph.neighbors(vid) {
                    if nbr == INVALID_VID || self.visited.get(nbr as usize) {
                        continue;
                    }
                    self.visited.set(nbr as usize);
                    let Some(d) = dc.compute_id(nbr) else {
                        continue;
                    };
                    candidates.push(NodeDistFarther { vid: nbr, dist: d });
                    if mask(nbr) && results.len() < max_k {
                        results.push(NodeDistCloser { vid: nbr, dist: d });
                    }
                }
            }

            match fallback_seed() {
                Some(v) if !self.visited.get(v as usize) => {
                    self.visited.set(v as usize);
                    let Some(d) = dc.compute_id(v) else { continue };
                    candidates.push(NodeDistFarther { vid: v, dist: d });
                    if mask(v) {
                        results.push(NodeDistCloser { vid: v, dist: d });
                    }
                }
                Some(_) => continue,
                None => break,
            }
        }

        if !results.is_empty() {
            self.mq.bulk_push(&results);
        }
        SearchStatus::Ok
    }
}
