//! Unified error hierarchy for the vector-index core.
//!
//! Four kinds, matching the source's error taxonomy:
//!
//! - [`ConfigError`] — rejected synchronously at `CREATE`/`UPDATE` time, no partial state.
//! - [`ResourceError`] — fatal for the current partition; the partition is left incomplete.
//! - [`DataError`] — a single offending vid is skipped; routed through `log::warn!`.
//! - [`InvariantError`] — a bug. `debug_assert!` in debug builds, returned (not panicked) in release.
//!
//! Search never returns these: a missing partition, a stale header, or a cancelled task
//! just yields an empty result set plus a [`SearchStatus`].

use thiserror::Error;

/// Top-level error type for the vector-index core.
#[derive(Debug, Error)]
pub enum VectorIndexError {
    /// Rejected at `CREATE VECTOR INDEX` / `UPDATE VECTOR INDEX` time.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Fatal for the partition currently being built.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// A single vid was skipped; the index remains usable.
    #[error(transparent)]
    Data(#[from] DataError),

    /// An internal invariant was violated.
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}

/// Errors surfaced synchronously to the caller of `CREATE`/`UPDATE VECTOR INDEX`.
///
/// No partial state is persisted when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `dim` must be positive.
    #[error("invalid dimension: {0} (must be > 0)")]
    InvalidDimension(i32),

    /// `samplingProbability` must lie in `[0, 0.4]`.
    #[error("samplingProbability {0} out of range [0, 0.4]")]
    SamplingProbabilityOutOfRange(f32),

    /// Unrecognized `DISTANCEFUNC` value.
    #[error("unknown distance function: {0:?} (expected L2, COSINE, or IP)")]
    UnknownDistanceFunc(String),

    /// An option key in `WITH (...)` that the core does not recognize.
    #[error("unrecognized index option: {0}")]
    UnrecognizedOption(String),

    /// A numeric option value failed to parse.
    #[error("invalid value for option {key}: {value}")]
    InvalidOptionValue {
        /// The option key.
        key: String,
        /// The raw value that failed to parse.
        value: String,
    },
}

/// Errors fatal to the partition currently under construction.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Allocation of an adjacency array failed.
    #[error("allocation failed for partition {partition}: {requested_bytes} bytes")]
    AllocationFailed {
        /// Partition index.
        partition: u32,
        /// Requested allocation size.
        requested_bytes: usize,
    },

    /// The persisted file could not be mapped or read.
    #[error("I/O error reading/writing persisted index: {0}")]
    Io(#[from] std::io::Error),

    /// Training the quantizer failed (e.g. `dim == 0`).
    #[error("quantizer training failed: {0}")]
    TrainingFailed(String),
}

/// Errors confined to a single vid; the index remains usable without it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// The embedding column held a null value at a live offset.
    #[error("null embedding at vid {vid}")]
    NullEmbedding {
        /// The offending vid.
        vid: u64,
    },

    /// The embedding column held a vector of the wrong length.
    #[error("wrong-length embedding at vid {vid}: expected {expected}, got {actual}")]
    WrongLengthEmbedding {
        /// The offending vid.
        vid: u64,
        /// Expected dimension.
        expected: usize,
        /// Actual length found.
        actual: usize,
    },
}

/// A violated internal invariant. Always a bug in the core, never caused by bad input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantError {
    /// `actualIds` contained the same vid twice within one partition.
    #[error("duplicate vid {vid} in upper-layer actualIds of partition {partition}")]
    DuplicateUpperLayerVid {
        /// Partition index.
        partition: u32,
        /// The duplicated vid.
        vid: u64,
    },

    /// A neighbor block contained a self-loop.
    #[error("self-loop at vid {vid}")]
    SelfLoop {
        /// The offending vid.
        vid: u64,
    },

    /// `entrypoint.level` was outside `{0, 1}`.
    #[error("entrypoint level {0} out of {{0,1}}")]
    InvalidEntrypointLevel(u8),
}

/// Outcome of a search call that cannot fail with a hard error.
///
/// Search-time problems (missing partition, stale header, cooperative cancellation)
/// never panic and never return `Err`; they degrade to an empty result set plus one
/// of these statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// The search completed normally.
    Ok,
    /// The requested partition does not exist (yet, or any more).
    PartitionMissing,
    /// The header referenced a partition whose builder has not published it.
    PartitionUnpublished,
    /// The search was cancelled cooperatively before completion.
    Cancelled,
}
