//! Filtered search dispatch across all three selectivity strategies,
//! exercised against a graph built by the real partition builder.

use std::sync::atomic::AtomicBool;

use kuzu_vector_index::config::{DistanceFunc, IndexConfig};
use kuzu_vector_index::error::SearchStatus;
use kuzu_vector_index::hnsw::{build_partition, NodeDistCloser, ParallelMultiQueue};
use kuzu_vector_index::hooks::InMemoryHooks;
use kuzu_vector_index::search::strategy::{choose_strategy, select_max_k, FilterStrategy};
use kuzu_vector_index::search::{SearchTaskConfig, VectorSearchTask};

mod support;
use support::SliceSource;

fn build_line(n: usize) -> (Vec<u64>, Vec<f32>, kuzu_vector_index::HnswPartitionBuilder) {
    let mut config = IndexConfig::new(2);
    config.max_nbrs_at_lower_level = 6;
    config.distance_func = DistanceFunc::L2;
    config.sq_enabled = false;
    config.sampling_probability = 0.0;

    let ids: Vec<u64> = (0..n as u64).collect();
    let vectors: Vec<f32> = (0..n).flat_map(|i| [i as f32, 0.0]).collect();
    let mut codes = InMemoryHooks::default();
    let mut partition_buffer = InMemoryHooks::default();
    let builder = build_partition(&config, &ids, &vectors, 11, &mut codes, &mut partition_buffer)
        .expect("build should succeed");
    (ids, vectors, builder)
}

#[test]
fn post_filter_strategy_only_returns_masked_nodes() {
    let (ids, vectors, builder) = build_line(30);
    let graph = builder.graph().read();
    let mq: ParallelMultiQueue<NodeDistCloser> = ParallelMultiQueue::new(1, 64);
    let cancelled = AtomicBool::new(false);
    let mut task = VectorSearchTask::new(
        0,
        0,
        &graph,
        &mq,
        &cancelled,
        ids.len(),
        SearchTaskConfig { ef_per_thread: 12.0, max_probes: 200 },
    );

    let mut source = SliceSource::new(&ids, &vectors, 2);
    let mut dc = kuzu_vector_index::distance::NodeTableComputer::new(&mut source, 2, DistanceFunc::L2);
    dc.set_query(&[15.0, 0.0]);

    let selectivity = 0.2; // PostFilter band
    assert_eq!(choose_strategy(selectivity), FilterStrategy::PostFilter);
    let max_k = select_max_k(selectivity).unwrap() as usize;
    let mask = |v: u64| v % 3 == 0;
    let status = task.run_filtered(&mut dc, 15, 0.0, &mask, selectivity, max_k, || None);
    assert_eq!(status, SearchStatus::Ok);
    while let Some(item) = mq.pop_min() {
        assert_eq!(item.vid % 3, 0);
    }
}

#[test]
fn in_filter_strategy_respects_max_k() {
    let (ids, vectors, builder) = build_line(60);
    let graph = builder.graph().read();
    let mq: ParallelMultiQueue<NodeDistCloser> = ParallelMultiQueue::new(1, 64);
    let cancelled = AtomicBool::new(false);
    let mut task = VectorSearchTask::new(
        0,
        0,
        &graph,
        &mq,
        &cancelled,
        ids.len(),
        SearchTaskConfig { ef_per_thread: 12.0, max_probes: 200 },
    );

    let mut source = SliceSource::new(&ids, &vectors, 2);
    let mut dc = kuzu_vector_index::distance::NodeTableComputer::new(&mut source, 2, DistanceFunc::L2);
    dc.set_query(&[30.0, 0.0]);

    let selectivity = 0.6; // InFilter band
    assert_eq!(choose_strategy(selectivity), FilterStrategy::InFilter);
    let max_k = select_max_k(selectivity).unwrap() as usize;
    let mask = |_: u64| true;
    let status = task.run_filtered(&mut dc, 30, 0.0, &mask, selectivity, max_k, || None);
    assert_eq!(status, SearchStatus::Ok);
    assert!(mq.size() <= max_k);
}

#[test]
fn short_circuit_selectivity_skips_graph_traversal() {
    let (ids, vectors, builder) = build_line(30);
    let graph = builder.graph().read();
    let mq: ParallelMultiQueue<NodeDistCloser> = ParallelMultiQueue::new(1, 64);
    let cancelled = AtomicBool::new(false);
    let mut task = VectorSearchTask::new(
        0,
        0,
        &graph,
        &mq,
        &cancelled,
        ids.len(),
        SearchTaskConfig { ef_per_thread: 12.0, max_probes: 200 },
    );
    let mut source = SliceSource::new(&ids, &vectors, 2);
    let mut dc = kuzu_vector_index::distance::NodeTableComputer::new(&mut source, 2, DistanceFunc::L2);
    dc.set_query(&[15.0, 0.0]);

    let selectivity = 0.001;
    assert_eq!(choose_strategy(selectivity), FilterStrategy::ShortCircuit);
    let mask = |_: u64| true;
    let status = task.run_filtered(&mut dc, 15, 0.0, &mask, selectivity, 5, || None);
    assert_eq!(status, SearchStatus::Ok);
    assert_eq!(mq.size(), 0);
}
