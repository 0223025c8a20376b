//! Partitioned HNSW approximate-nearest-neighbor vector index with SQ8
//! scalar quantization, built to be embedded inside a host graph database
//! rather than run as a standalone service.
//!
//! The index is split into partitions of `numVectorsPerPartition` vids
//! each; every partition is a two-layer graph (a sparse sampled upper
//! layer over a full lower layer) built concurrently by
//! [`hnsw::build_partition`] and queried by a lock-striped multi-queue
//! search engine in [`search`]. Embeddings, compressed codes, and the
//! persisted adjacency CSR all live in the host database; this crate talks
//! to them only through the [`hooks`] traits.
//!
//! ## Layout
//!
//! - [`config`] — `IndexConfig`, the per-index build/search knobs.
//! - [`ddl`] — `CREATE VECTOR INDEX ... WITH (...)` option-clause parsing.
//! - [`distance`] — the distance-computer façade over raw, node-table, and
//!   quantized embedding sources.
//! - [`error`] — the four-kind error taxonomy (`Config`, `Resource`,
//!   `Data`, `Invariant`) plus the search-time `SearchStatus`.
//! - [`hnsw`] — the partitioned graph, its header, the concurrent builder,
//!   visited-set tables, and the lock-striped multi-queue.
//! - [`hooks`] — the external-collaborator traits (`EmbeddingSource`,
//!   `CompressedCodeSink`, `PartitionBufferSink`, `RngSeedSource`) and an
//!   in-memory implementation for tests.
//! - [`persistence`] — the persisted header's fixed-width (de)serializer.
//! - [`quantization`] — the SQ8 scalar quantizer.
//! - [`search`] — the parallel filtered/unfiltered search engine, its
//!   entrypoint seeding, and the driver that answers a bare query vector.
//! - [`simd`] — capability detection and the `l2sq`/`cos`/`dot` kernels.
//!
//! ## Example
//!
//! ```rust
//! use kuzu_vector_index::config::IndexConfig;
//! use kuzu_vector_index::hnsw::build_partition;
//! use kuzu_vector_index::hooks::InMemoryHooks;
//!
//! let config = IndexConfig::new(4);
//! let ids: Vec<u64> = (0..8).collect();
//! let vectors: Vec<f32> = (0..8)
//!     .flat_map(|i| [i as f32, 0.0, 0.0, 0.0])
//!     .collect();
//!
//! let mut codes = InMemoryHooks::default();
//! let mut partition_buffer = InMemoryHooks::default();
//! let builder = build_partition(&config, &ids, &vectors, 42, &mut codes, &mut partition_buffer)
//!     .expect("partition build should succeed");
//! builder.check_invariants().expect("graph invariants should hold");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod ddl;
pub mod distance;
pub mod error;
pub mod hnsw;
pub mod hooks;
pub mod persistence;
pub mod quantization;
pub mod search;
pub mod simd;

pub use config::IndexConfig;
pub use error::{ConfigError, DataError, InvariantError, ResourceError, SearchStatus, VectorIndexError};
pub use hnsw::{build_partition, compression_latch, HnswPartitionBuilder, PartitionedGraph, VectorId};
pub use search::{choose_strategy, select_max_k, VectorSearchTask};
