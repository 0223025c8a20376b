//! Per-partition upper-layer index header (§4.6): the entrypoint, the
//! upper-layer vid set, and the flattened upper-layer adjacency CSR, plus
//! reservoir sampling for upper-layer promotion at insert time.

use parking_lot::Mutex;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::graph::{VectorId, INVALID_VID};

/// Which layer holds the current entrypoint, and its id within that layer.
///
/// The index starts with no entrypoint at all; the first inserted vid
/// becomes the L0 entrypoint, and is promoted to an L1 entrypoint the first
/// time any vid is sampled into the upper layer (§4.6 "Entrypoint").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrypointState {
    /// No vid has been inserted into this partition yet.
    None,
    /// `vid` is the entrypoint, and no upper-layer vid exists yet.
    L0 { vid: VectorId },
    /// `upper_id` (an index into the upper-layer vid list) is the entrypoint.
    L1 { upper_id: u32 },
}

/// One partition's upper-layer header: entrypoint, upper-layer vid list, and
/// flattened upper-layer adjacency (§4.6).
pub struct PartitionHeader {
    entrypoint: Mutex<EntrypointState>,
    /// Upper-layer vids, in promotion order. `actual_ids[i]` is the vid for
    /// upper-layer id `i`.
    actual_ids: Mutex<Vec<VectorId>>,
    /// Flattened CSR: row `i` (width `max_nbrs_upper`) holds upper-layer id
    /// `i`'s neighbors (also upper-layer ids), [`INVALID_VID`]-filled.
    neighbors: Mutex<Vec<VectorId>>,
    max_nbrs_upper: usize,
}

impl PartitionHeader {
    /// Creates an empty header with no entrypoint and no upper-layer vids.
    #[must_use]
    pub fn new(max_nbrs_upper: usize) -> Self {
        Self {
            entrypoint: Mutex::new(EntrypointState::None),
            actual_ids: Mutex::new(Vec::new()),
            neighbors: Mutex::new(Vec::new()),
            max_nbrs_upper,
        }
    }

    /// Current entrypoint state.
    #[must_use]
    pub fn entrypoint(&self) -> EntrypointState {
        *self.entrypoint.lock()
    }

    /// Number of vids promoted into the upper layer.
    #[must_use]
    pub fn num_vectors_in_upper_level(&self) -> usize {
        self.actual_ids.lock().len()
    }

    /// The vid backing upper-layer id `upper_id`.
    #[must_use]
    pub fn actual_id(&self, upper_id: u32) -> VectorId {
        self.actual_ids.lock()[upper_id as usize]
    }

    /// Records the first-ever insert into this (previously empty) partition
    /// as the L0 entrypoint. No-op if an entrypoint already exists.
    pub fn set_initial_entrypoint(&self, vid: VectorId) {
        let mut ep = self.entrypoint.lock();
        if *ep == EntrypointState::None {
            *ep = EntrypointState::L0 { vid };
        }
    }

    /// Promotes `vid` into the upper layer, returning its new upper-layer id.
    /// If no upper-layer entrypoint exists yet, `vid` becomes it (§4.6).
    pub fn promote(&self, vid: VectorId) -> u32 {
        let mut actual_ids = self.actual_ids.lock();
        let upper_id = actual_ids.len() as u32;
        actual_ids.push(vid);
        let row_start = upper_id as usize * self.max_nbrs_upper;
        {
            let mut neighbors = self.neighbors.lock();
            neighbors.resize(row_start + self.max_nbrs_upper, INVALID_VID);
        }
        drop(actual_ids);
        let mut ep = self.entrypoint.lock();
        if matches!(*ep, EntrypointState::None | EntrypointState::L0 { .. }) {
            *ep = EntrypointState::L1 { upper_id };
        }
        upper_id
    }

    /// Whether `sampling_probability` promotes this insert, decided by an
    /// independent Bernoulli draw per vid (§4.6, §9 "Random number
    /// generation": the reservoir sampler may use a different RNG stream
    /// than the multi-queue picker).
    pub fn should_promote(rng: &mut ChaCha8Rng, sampling_probability: f32) -> bool {
        rng.gen::<f32>() < sampling_probability
    }

    /// Neighbor slots for upper-layer id `upper_id`.
    #[must_use]
    pub fn neighbors(&self, upper_id: u32) -> Vec<VectorId> {
        let neighbors = self.neighbors.lock();
        let begin = upper_id as usize * self.max_nbrs_upper;
        neighbors[begin..begin + self.max_nbrs_upper].to_vec()
    }

    /// Overwrites upper-layer id `upper_id`'s neighbor slots.
    pub fn set_neighbors(&self, upper_id: u32, new_neighbors: &[VectorId]) {
        let mut neighbors = self.neighbors.lock();
        let begin = upper_id as usize * self.max_nbrs_upper;
        let row = &mut neighbors[begin..begin + self.max_nbrs_upper];
        for (slot, &v) in row.iter_mut().zip(
            new_neighbors
                .iter()
                .chain(std::iter::repeat(&INVALID_VID)),
        ) {
            *slot = v;
        }
    }

    /// Max out-degree per upper-layer id.
    #[must_use]
    pub fn max_nbrs_upper(&self) -> usize {
        self.max_nbrs_upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn first_insert_becomes_l0_entrypoint() {
        let h = PartitionHeader::new(8);
        assert_eq!(h.entrypoint(), EntrypointState::None);
        h.set_initial_entrypoint(42);
        assert_eq!(h.entrypoint(), EntrypointState::L0 { vid: 42 });
        h.set_initial_entrypoint(99); // no-op, entrypoint already set
        assert_eq!(h.entrypoint(), EntrypointState::L0 { vid: 42 });
    }

    #[test]
    fn promotion_upgrades_entrypoint_to_l1() {
        let h = PartitionHeader::new(8);
        h.set_initial_entrypoint(5);
        let upper_id = h.promote(5);
        assert_eq!(upper_id, 0);
        assert_eq!(h.entrypoint(), EntrypointState::L1 { upper_id: 0 });
        assert_eq!(h.num_vectors_in_upper_level(), 1);
        assert_eq!(h.actual_id(0), 5);
    }

    #[test]
    fn neighbors_round_trip_and_invalid_fill() {
        let h = PartitionHeader::new(4);
        h.promote(10);
        h.promote(20);
        h.set_neighbors(0, &[20]);
        let nbrs = h.neighbors(0);
        assert_eq!(nbrs, vec![20, INVALID_VID, INVALID_VID, INVALID_VID]);
    }

    #[test]
    fn should_promote_respects_probability_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(!PartitionHeader::should_promote(&mut rng, 0.0));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(PartitionHeader::should_promote(&mut rng, 1.0));
    }
}
