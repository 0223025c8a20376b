//! On-disk layout for the persisted index header (§6.2): a hand-written
//! fixed-width encoding, not `postcard`, so the byte layout stays exactly
//! what the format prescribes rather than whatever a varint encoder
//! happens to produce.
//!
//! Compressed codes and the adjacency CSR are the host database's concern
//! (`CompressedCodeSink`, `PartitionBufferSink` in [`crate::hooks`]); this
//! module only covers the index-level header round-trip.

pub mod header;

pub use header::{
    deserialize, serialize, PersistedHeader, PersistedIdentifiers, PersistedPartition,
    PersistedQuantizer, MAGIC, VERSION,
};

use thiserror::Error;

/// Errors from reading or writing a persisted header.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The underlying file could not be read or written.
    #[error("I/O error reading/writing persisted index: {0}")]
    Io(#[from] std::io::Error),

    /// The leading bytes did not match [`MAGIC`].
    #[error("invalid magic number: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: [u8; 4],
        /// Actual magic bytes read.
        actual: [u8; 4],
    },

    /// The version byte is newer than this build understands.
    #[error("unsupported header version: {0}")]
    UnsupportedVersion(u8),

    /// The byte stream ended before a complete header was read.
    #[error("truncated data: expected more bytes")]
    TruncatedData,

    /// A field held a value outside its valid range (e.g. an unknown
    /// `distanceFunc` discriminant).
    #[error("corrupted header: {0}")]
    Corrupted(String),
}
