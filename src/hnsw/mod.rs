//! Two-layer partitioned HNSW core: the lower-layer adjacency store, the
//! upper-layer header, the concurrent builder, the visited-set tables, and
//! the lock-striped multi-queue search structures share this module.

pub mod builder;
pub mod graph;
pub mod header;
pub mod mq;
pub mod visited;

pub use builder::{build_partition, compression_latch, HnswPartitionBuilder};
pub use graph::{PartitionedGraph, VectorId, INVALID_VID};
pub use header::{EntrypointState, PartitionHeader};
pub use mq::{BoundedHeap, NodeDistCloser, NodeDistFarther, ParallelMultiQueue, Spinlock, DUMMY_ITER};
pub use visited::{AtomicBitVisited, AtomicByteVisited, VisitedTable};
