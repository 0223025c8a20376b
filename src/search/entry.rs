//! Search-time entrypoint seeding (§2, §4.9): before a [`super::engine::VectorSearchTask`]
//! can run its best-first descent on the lower layer, it needs a lower-layer
//! vid to start from. That vid comes from the same greedy upper-layer
//! descent the builder performs at insert time (§4.7 item 1), run here
//! against the caller's query instead of a vid already in the graph.

use crate::distance::DistanceComputer;
use crate::hnsw::builder::resolve_lower_entry;
use crate::hnsw::graph::VectorId;
use crate::hnsw::header::PartitionHeader;

/// Resolves `(entry_vid, entry_dist)` for `dc`'s current query against
/// `header`: greedy-descends the upper layer to the nearest sampled node,
/// then maps back to its lower-layer vid (or returns the L0 entrypoint
/// directly if the partition never promoted anything).
///
/// Returns `None` if the partition holds no entrypoint yet (nothing has
/// been inserted), or if a data error prevents resolving a distance to the
/// candidate entrypoint (§7 kind-3 — the caller's logger already saw the
/// `log::warn!` this raised inside the distance computer).
#[must_use]
pub fn resolve_entry(
    header: &PartitionHeader,
    dc: &mut dyn DistanceComputer,
) -> Option<(VectorId, f32)> {
    resolve_lower_entry(header, dc)
}
