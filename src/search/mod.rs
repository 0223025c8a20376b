//! Parallel filtered/unfiltered vector search (§4.9): the per-task engine,
//! the filter-selectivity strategy it dispatches on, search-time entrypoint
//! seeding, and the top-level driver that resolves an entrypoint from a bare
//! query vector and merges the tasks' shared multi-queue into a top-`k`.

pub mod driver;
pub mod engine;
pub mod entry;
pub mod strategy;

pub use driver::{search_partition, search_partition_filtered};
pub use engine::{SearchTaskConfig, VectorSearchTask, SYNC_AFTER_ITER};
pub use entry::resolve_entry;
pub use strategy::{choose_strategy, default_max_neighbours_check, select_max_k, FilterStrategy};
