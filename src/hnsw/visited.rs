//! Visited-vid sets (§4.3): a single-threaded generation-counter table, a
//! single-threaded precomputed-tail variant is not needed here, and an
//! atomic bit-vector table safe to share across search threads.

use std::sync::atomic::{AtomicU8, Ordering};

/// Generation at which the backing byte array is fully wiped and the
/// counter restarts at 1 (§4.3).
const WRAP_GENERATION: u8 = 250;

/// Single-threaded visited table: one generation byte per vid.
///
/// `reset` is O(1) in the common case (bump the generation); only every
/// 250th `reset` pays the O(n) wipe.
pub struct VisitedTable {
    table: Vec<u8>,
    generation: u8,
}

impl VisitedTable {
    /// Creates a table sized for `capacity` vids, all initially unvisited.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            table: vec![0u8; capacity],
            generation: 1,
        }
    }

    /// Marks `vid` visited in the current generation.
    pub fn set(&mut self, vid: usize) {
        self.table[vid] = self.generation;
    }

    /// Returns whether `vid` was marked visited in the current generation.
    #[must_use]
    pub fn get(&self, vid: usize) -> bool {
        self.table[vid] == self.generation
    }

    /// Starts a new generation. Every 250th call fully zeroes the backing
    /// array instead of merely advancing the counter, to bound the byte
    /// range before it could alias a future generation's marker.
    pub fn reset(&mut self) {
        if self.generation >= WRAP_GENERATION {
            self.table.iter_mut().for_each(|b| *b = 0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }
}

/// Thread-safe packed-bit visited table: one bit per vid, acquire-load /
/// release-RMW semantics (§4.3 "Parallel bit-vector").
///
/// `reset` is not atomic and requires exclusive access, matching the
/// source's contract that resets only happen between queries, never
/// concurrently with `is_set`/`set`.
pub struct AtomicBitVisited {
    bits: Vec<AtomicU8>,
}

impl AtomicBitVisited {
    /// Creates a table sized for `capacity` vids, all initially unvisited.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let bytes = capacity.div_ceil(8);
        Self {
            bits: (0..bytes).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    /// Acquire-ordered load-and-test of `vid`'s bit.
    #[must_use]
    pub fn is_set(&self, vid: usize) -> bool {
        let byte = self.bits[vid / 8].load(Ordering::Acquire);
        byte & (1 << (vid % 8)) != 0
    }

    /// Release-ordered OR-fetch setting `vid`'s bit.
    pub fn set(&self, vid: usize) {
        self.bits[vid / 8].fetch_or(1 << (vid % 8), Ordering::Release);
    }

    /// Release-ordered AND-fetch clearing `vid`'s bit.
    pub fn clear(&self, vid: usize) {
        self.bits[vid / 8].fetch_and(!(1 << (vid % 8)), Ordering::Release);
    }

    /// Zeroes every bit. Requires exclusive (`&mut`) access.
    pub fn reset(&mut self) {
        for b in &mut self.bits {
            *b = AtomicU8::new(0);
        }
    }
}

/// Thread-safe per-vid byte visited table, used by the builder's "set once"
/// hot path where a full bit-pack is unnecessary overhead (ambient
/// supplement to §4.3, see `SPEC_FULL.md` §4.3).
pub struct AtomicByteVisited {
    table: Vec<AtomicU8>,
}

impl AtomicByteVisited {
    /// Creates a table sized for `capacity` vids, all initially unvisited.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            table: (0..capacity).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    /// Relaxed-ordered test of whether `vid` was visited.
    #[must_use]
    pub fn is_set(&self, vid: usize) -> bool {
        self.table[vid].load(Ordering::Relaxed) != 0
    }

    /// Sets `vid`'s byte and returns whether it was already set
    /// (a compare-and-swap "get and set" used to deduplicate concurrent
    /// first-visits).
    pub fn get_and_set(&self, vid: usize) -> bool {
        self.table[vid].swap(1, Ordering::AcqRel) != 0
    }

    /// Zeroes every byte. Requires exclusive (`&mut`) access.
    pub fn reset(&mut self) {
        for b in &mut self.table {
            *b = AtomicU8::new(0);
        }
    }
}
