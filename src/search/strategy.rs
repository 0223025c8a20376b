//! Filter selectivity heuristic and the `maxK` step function (§4.9, §6.3).

/// Below this selectivity the caller is expected to brute-force exact
/// distances instead of dispatching a search task at all (§4.9).
const SHORT_CIRCUIT_THRESHOLD: f32 = 0.005;

/// Above this selectivity, in-filter BFS is preferred over post-filtering
/// an unfiltered walk (§4.9).
const IN_FILTER_THRESHOLD: f32 = 0.3;

/// How a filtered search should traverse the graph, chosen from the
/// fraction of nodes the filter mask selects (§4.9 "Filter selectivity
/// heuristic").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStrategy {
    /// Selectivity too low to be worth graph traversal at all; the caller
    /// should brute-force exact distances over the masked set directly.
    ShortCircuit,
    /// Walk the graph ignoring the mask, then drop unmasked results.
    PostFilter,
    /// Bounded BFS that only yields masked nodes, reseeding from an
    /// unvisited masked node if the frontier collapses.
    InFilter,
}

/// Chooses a [`FilterStrategy`] from `selectivity` (the fraction `m/n` of
/// nodes the filter mask selects).
#[must_use]
pub fn choose_strategy(selectivity: f32) -> FilterStrategy {
    if selectivity <= SHORT_CIRCUIT_THRESHOLD {
        FilterStrategy::ShortCircuit
    } else if selectivity <= IN_FILTER_THRESHOLD {
        FilterStrategy::PostFilter
    } else {
        FilterStrategy::InFilter
    }
}

/// The `maxK` step function (§6.3): the BFS hit budget for an in-filter
/// search, as a function of selectivity. `None` below the short-circuit
/// threshold, where the caller skips graph traversal entirely.
#[must_use]
pub fn select_max_k(selectivity: f32) -> Option<u32> {
    if selectivity < 0.005 {
        None
    } else if selectivity < 0.1 {
        Some(20)
    } else if selectivity < 0.4 {
        Some(30)
    } else {
        Some(40)
    }
}

/// Default `maxNeighboursCheck` (probe budget) for an in-filter search: a
/// small multiple of `ef_search`, since the source uses approximately
/// `ef_search` itself but exposes the multiplier as a tunable (§6.3).
#[must_use]
pub fn default_max_neighbours_check(ef_search: i32) -> usize {
    (ef_search.max(1) as usize) * 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectivity_below_threshold_short_circuits() {
        assert_eq!(choose_strategy(0.001), FilterStrategy::ShortCircuit);
        assert_eq!(select_max_k(0.001), None);
    }

    #[test]
    fn mid_selectivity_uses_post_filter() {
        assert_eq!(choose_strategy(0.2), FilterStrategy::PostFilter);
        assert_eq!(select_max_k(0.2), Some(30));
    }

    #[test]
    fn high_selectivity_uses_in_filter() {
        assert_eq!(choose_strategy(0.6), FilterStrategy::InFilter);
        assert_eq!(select_max_k(0.6), Some(40));
    }

    #[test]
    fn step_table_boundaries_match_spec() {
        assert_eq!(select_max_k(0.05), Some(20));
        assert_eq!(select_max_k(0.35), Some(30));
        assert_eq!(select_max_k(0.45), Some(40));
    }

    #[test]
    fn max_neighbours_check_scales_with_ef_search() {
        assert_eq!(default_max_neighbours_check(200), 400);
    }
}
