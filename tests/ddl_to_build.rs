//! `WITH (...)` option-clause parsing feeding straight into a real build,
//! end to end from the CLI surface down to a validated partition.

use kuzu_vector_index::config::{DistanceFunc, IndexConfig};
use kuzu_vector_index::ddl::parse_with_clause;
use kuzu_vector_index::hnsw::build_partition;
use kuzu_vector_index::hooks::InMemoryHooks;

#[test]
fn parsed_option_clause_drives_a_successful_build() {
    let base = IndexConfig::new(3);
    let config = parse_with_clause(
        "MAXNBRSATLOWERLEVEL=6, EFSEARCH=32, DISTANCEFUNC=\"L2\", SQENABLED=false",
        base,
    )
    .expect("clause should parse");
    config.validate().expect("parsed config should validate");
    assert_eq!(config.max_nbrs_at_lower_level, 6);
    assert_eq!(config.distance_func, DistanceFunc::L2);
    assert!(!config.sq_enabled);

    let ids: Vec<u64> = (0..10).collect();
    let vectors: Vec<f32> = (0..10).flat_map(|i| [i as f32, 0.0, 1.0]).collect();
    let mut codes = InMemoryHooks::default();
    let mut partition_buffer = InMemoryHooks::default();
    let builder = build_partition(&config, &ids, &vectors, 2, &mut codes, &mut partition_buffer)
        .expect("build from a parsed config should succeed");
    builder.check_invariants().expect("graph invariants should hold");
    assert!(codes.codes.is_empty(), "SQENABLED=false must skip code storage");
}

#[test]
fn rejects_option_clause_that_fails_downstream_validation() {
    let base = IndexConfig::new(8);
    let config = parse_with_clause("SAMPLINGPROBABILITY=0.9", base).unwrap();
    assert!(config.validate().is_err());
}
