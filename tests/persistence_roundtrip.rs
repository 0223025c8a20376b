//! Header serialization round-trip against a header assembled from a real
//! built partition (not just hand-constructed fixtures).

use kuzu_vector_index::config::IndexConfig;
use kuzu_vector_index::hnsw::{build_partition, EntrypointState, INVALID_VID};
use kuzu_vector_index::hooks::InMemoryHooks;
use kuzu_vector_index::persistence::{
    deserialize, serialize, PersistedHeader, PersistedIdentifiers, PersistedPartition,
    PersistedQuantizer,
};

#[test]
fn header_built_from_a_real_partition_round_trips() {
    let mut config = IndexConfig::new(4);
    config.sq_enabled = true;
    config.sampling_probability = 1.0; // force promotion so the upper layer is non-empty

    let ids: Vec<u64> = (0..12).collect();
    let vectors: Vec<f32> = (0..12)
        .flat_map(|i| [i as f32, (i * 2) as f32, 0.0, 1.0])
        .collect();

    let mut codes = InMemoryHooks::default();
    let mut partition_buffer = InMemoryHooks::default();
    let builder = build_partition(&config, &ids, &vectors, 5, &mut codes, &mut partition_buffer)
        .expect("build should succeed");

    let num_upper = builder.header().num_vectors_in_upper_level();
    let max_upper = builder.header().max_nbrs_upper();
    let actual_ids: Vec<u64> = (0..num_upper as u32)
        .map(|u| builder.header().actual_id(u))
        .collect();
    let neighbors: Vec<u64> = (0..num_upper as u32)
        .flat_map(|u| builder.header().neighbors(u))
        .collect();
    assert_eq!(neighbors.len(), num_upper * max_upper);

    let (entrypoint_vid, entrypoint_level) = match builder.header().entrypoint() {
        EntrypointState::None => (INVALID_VID, 0),
        EntrypointState::L0 { vid } => (vid, 0),
        EntrypointState::L1 { upper_id } => (builder.header().actual_id(upper_id), 1),
    };

    let header = PersistedHeader {
        dim: config.dim,
        num_vectors: ids.len() as u64,
        config,
        partitions: vec![PersistedPartition {
            entrypoint_vid,
            entrypoint_level,
            actual_ids,
            neighbors,
            num_vectors_in_upper_level: num_upper as u64,
        }],
        quantizer: Some(PersistedQuantizer {
            dim: 4,
            vmin: vec![0.0; 4],
            vdiff: vec![1.0; 4],
            alpha: vec![0.5; 4],
            beta: vec![0.1; 4],
            alpha_sqr: vec![0.25; 4],
            beta_sqr: vec![0.01; 4],
        }),
        identifiers: PersistedIdentifiers {
            node_table_id: 1,
            embedding_property_id: 2,
            compressed_property_id: 3,
            csr_rel_table_id: 4,
        },
    };

    let bytes = serialize(&header);
    let back = deserialize(&bytes).expect("a just-serialized header must deserialize");
    assert_eq!(back.partitions, header.partitions);
    assert_eq!(back.quantizer, header.quantizer);
    assert_eq!(back.identifiers, header.identifiers);
    assert_eq!(back.num_vectors, header.num_vectors);
}
