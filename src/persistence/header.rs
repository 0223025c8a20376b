//! Hand-written fixed-width (de)serializer for the persisted index header
//! (§6.2): one index-level header, a block per partition, an optional
//! quantizer block, and an identifiers block, all little-endian.
//!
//! `postcard`'s varint encoding would not reproduce this byte-for-byte, so
//! the format is written directly over a `Vec<u8>` cursor instead.

use crate::config::{DistanceFunc, IndexConfig};
use crate::hnsw::{VectorId, INVALID_VID};
use crate::persistence::PersistenceError;

/// Magic bytes identifying a persisted vector-index header.
pub const MAGIC: [u8; 4] = *b"KZVI";

/// Format version of this header layout. Bumped on incompatible changes.
pub const VERSION: u8 = 1;

/// One partition's entrypoint state and upper-layer adjacency, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedPartition {
    /// Entrypoint vid, or `INVALID_VID` if the partition has no entrypoint.
    pub entrypoint_vid: VectorId,
    /// Entrypoint level (`0` or `1`; meaningless when `entrypoint_vid` is invalid).
    pub entrypoint_level: u8,
    /// `actualIds[upper_id]`, the lower-layer vid each upper-layer id maps to.
    pub actual_ids: Vec<VectorId>,
    /// Upper-layer adjacency, flattened as `num_upper * maxNbrsUpper`, padded with `INVALID_VID`.
    pub neighbors: Vec<VectorId>,
    /// Count of vids promoted to the upper layer.
    pub num_vectors_in_upper_level: u64,
}

/// The quantizer's per-dimension parameter arrays, in persisted order.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedQuantizer {
    /// Vector dimensionality; each array below has this length.
    pub dim: i32,
    pub vmin: Vec<f32>,
    pub vdiff: Vec<f32>,
    pub alpha: Vec<f32>,
    pub beta: Vec<f32>,
    pub alpha_sqr: Vec<f32>,
    pub beta_sqr: Vec<f32>,
}

/// The host database's column/table identifiers this index is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedIdentifiers {
    pub node_table_id: u64,
    pub embedding_property_id: u64,
    pub compressed_property_id: u64,
    pub csr_rel_table_id: u64,
}

/// A fully assembled persisted index header, ready to serialize or just
/// deserialized from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedHeader {
    pub dim: i32,
    pub num_vectors: u64,
    pub config: IndexConfig,
    pub partitions: Vec<PersistedPartition>,
    /// `None` when `config.sq_enabled` is false.
    pub quantizer: Option<PersistedQuantizer>,
    pub identifiers: PersistedIdentifiers,
}

fn write_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_vid_vec(out: &mut Vec<u8>, xs: &[VectorId]) {
    write_u64(out, xs.len() as u64);
    for &x in xs {
        write_u64(out, x);
    }
}

fn write_f32_array(out: &mut Vec<u8>, xs: &[f32]) {
    for &x in xs {
        write_f32(out, x);
    }
}

/// Serializes `header` into its persisted byte layout.
#[must_use]
pub fn serialize(header: &PersistedHeader) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    write_u8(&mut out, VERSION);

    write_i32(&mut out, header.dim);
    write_u64(&mut out, header.num_vectors);

    let cfg = &header.config;
    write_i32(&mut out, cfg.max_nbrs_at_upper_level);
    write_i32(&mut out, cfg.max_nbrs_at_lower_level);
    write_f32(&mut out, cfg.sampling_probability);
    write_i32(&mut out, cfg.ef_construction);
    write_i32(&mut out, cfg.ef_search);
    write_f32(&mut out, cfg.alpha);
    write_i32(&mut out, cfg.num_vectors_per_partition);
    write_u8(&mut out, u8::from(cfg.sq_enabled));
    write_i32(&mut out, cfg.distance_func as i32);

    // Not itself one of the four numbered fields, but needed to know how
    // many partition blocks to read back; the writer is the only place
    // that knows this.
    write_u64(&mut out, header.partitions.len() as u64);
    for p in &header.partitions {
        write_u64(&mut out, p.entrypoint_vid);
        write_u8(&mut out, p.entrypoint_level);
        write_vid_vec(&mut out, &p.actual_ids);
        write_vid_vec(&mut out, &p.neighbors);
        write_u64(&mut out, p.num_vectors_in_upper_level);
    }

    match &header.quantizer {
        Some(q) => {
            write_u8(&mut out, 1);
            write_i32(&mut out, q.dim);
            write_f32_array(&mut out, &q.vmin);
            write_f32_array(&mut out, &q.vdiff);
            write_f32_array(&mut out, &q.alpha);
            write_f32_array(&mut out, &q.beta);
            write_f32_array(&mut out, &q.alpha_sqr);
            write_f32_array(&mut out, &q.beta_sqr);
        }
        None => write_u8(&mut out, 0),
    }

    write_u64(&mut out, header.identifiers.node_table_id);
    write_u64(&mut out, header.identifiers.embedding_property_id);
    write_u64(&mut out, header.identifiers.compressed_property_id);
    write_u64(&mut out, header.identifiers.csr_rel_table_id);

    out
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PersistenceError> {
        if self.pos + n > self.data.len() {
            return Err(PersistenceError::TruncatedData);
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u8(&mut self) -> Result<u8, PersistenceError> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool, PersistenceError> {
        Ok(self.u8()? != 0)
    }

    fn i32(&mut self) -> Result<i32, PersistenceError> {
        let b: [u8; 4] = self.take(4)?.try_into().expect("4 bytes");
        Ok(i32::from_le_bytes(b))
    }

    fn u64(&mut self) -> Result<u64, PersistenceError> {
        let b: [u8; 8] = self.take(8)?.try_into().expect("8 bytes");
        Ok(u64::from_le_bytes(b))
    }

    fn f32(&mut self) -> Result<f32, PersistenceError> {
        let b: [u8; 4] = self.take(4)?.try_into().expect("4 bytes");
        Ok(f32::from_le_bytes(b))
    }

    fn vid_vec(&mut self) -> Result<Vec<VectorId>, PersistenceError> {
        let n = self.u64()? as usize;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.u64()?);
        }
        Ok(out)
    }

    fn f32_array(&mut self, n: usize) -> Result<Vec<f32>, PersistenceError> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.f32()?);
        }
        Ok(out)
    }
}

fn distance_func_from_i32(v: i32) -> Result<DistanceFunc, PersistenceError> {
    match v {
        0 => Ok(DistanceFunc::L2),
        1 => Ok(DistanceFunc::Cosine),
        2 => Ok(DistanceFunc::Ip),
        other => Err(PersistenceError::Corrupted(format!(
            "unknown distanceFunc discriminant {other}"
        ))),
    }
}

/// Deserializes a persisted header from `data`, validating the magic and version.
///
/// # Errors
///
/// Returns [`PersistenceError::InvalidMagic`] if the leading 4 bytes don't
/// match [`MAGIC`], [`PersistenceError::UnsupportedVersion`] if the version
/// byte is newer than this crate understands, and
/// [`PersistenceError::TruncatedData`] if `data` ends before a complete
/// header has been read.
pub fn deserialize(data: &[u8]) -> Result<PersistedHeader, PersistenceError> {
    let mut cur = Cursor::new(data);

    let magic: [u8; 4] = cur.take(4)?.try_into().expect("4 bytes");
    if magic != MAGIC {
        return Err(PersistenceError::InvalidMagic {
            expected: MAGIC,
            actual: magic,
        });
    }
    let version = cur.u8()?;
    if version > VERSION {
        return Err(PersistenceError::UnsupportedVersion(version));
    }

    let dim = cur.i32()?;
    let num_vectors = cur.u64()?;

    let max_nbrs_at_upper_level = cur.i32()?;
    let max_nbrs_at_lower_level = cur.i32()?;
    let sampling_probability = cur.f32()?;
    let ef_construction = cur.i32()?;
    let ef_search = cur.i32()?;
    let alpha = cur.f32()?;
    let num_vectors_per_partition = cur.i32()?;
    let sq_enabled = cur.bool()?;
    let distance_func = distance_func_from_i32(cur.i32()?)?;

    let config = IndexConfig {
        dim,
        max_nbrs_at_upper_level,
        max_nbrs_at_lower_level,
        sampling_probability,
        ef_construction,
        ef_search,
        alpha,
        // `gamma` is not part of the persisted layout (§6.2 predates it);
        // partitions are always rebuilt with the config supplied at open
        // time, so the default here is overwritten by the caller.
        gamma: 1.0,
        num_vectors_per_partition,
        sq_enabled,
        distance_func,
    };

    let num_partitions = cur.u64()? as usize;
    let mut partitions = Vec::with_capacity(num_partitions);
    for _ in 0..num_partitions {
        let entrypoint_vid = cur.u64()?;
        let entrypoint_level = cur.u8()?;
        let actual_ids = cur.vid_vec()?;
        let neighbors = cur.vid_vec()?;
        let num_vectors_in_upper_level = cur.u64()?;
        partitions.push(PersistedPartition {
            entrypoint_vid,
            entrypoint_level,
            actual_ids,
            neighbors,
            num_vectors_in_upper_level,
        });
    }

    let quantizer = if cur.bool()? {
        let qdim = cur.i32()?;
        let n = qdim.max(0) as usize;
        Some(PersistedQuantizer {
            dim: qdim,
            vmin: cur.f32_array(n)?,
            vdiff: cur.f32_array(n)?,
            alpha: cur.f32_array(n)?,
            beta: cur.f32_array(n)?,
            alpha_sqr: cur.f32_array(n)?,
            beta_sqr: cur.f32_array(n)?,
        })
    } else {
        None
    };

    let identifiers = PersistedIdentifiers {
        node_table_id: cur.u64()?,
        embedding_property_id: cur.u64()?,
        compressed_property_id: cur.u64()?,
        csr_rel_table_id: cur.u64()?,
    };

    Ok(PersistedHeader {
        dim,
        num_vectors,
        config,
        partitions,
        quantizer,
        identifiers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PersistedHeader {
        PersistedHeader {
            dim: 4,
            num_vectors: 3,
            config: IndexConfig::new(4),
            partitions: vec![PersistedPartition {
                entrypoint_vid: 0,
                entrypoint_level: 1,
                actual_ids: vec![0, 2],
                neighbors: vec![2, INVALID_VID, 0, INVALID_VID],
                num_vectors_in_upper_level: 2,
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
                node_table_id: 10,
                embedding_property_id: 11,
                compressed_property_id: 12,
                csr_rel_table_id: 13,
            },
        }
    }

    #[test]
    fn round_trips_with_quantizer() {
        let h = sample();
        let bytes = serialize(&h);
        let back = deserialize(&bytes).unwrap();
        assert_eq!(back.dim, h.dim);
        assert_eq!(back.num_vectors, h.num_vectors);
        assert_eq!(back.partitions, h.partitions);
        assert_eq!(back.quantizer, h.quantizer);
        assert_eq!(back.identifiers, h.identifiers);
    }

    #[test]
    fn round_trips_without_quantizer() {
        let mut h = sample();
        h.quantizer = None;
        h.config.sq_enabled = false;
        let bytes = serialize(&h);
        let back = deserialize(&bytes).unwrap();
        assert!(back.quantizer.is_none());
        assert!(!back.config.sq_enabled);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = serialize(&sample());
        bytes[0] = b'X';
        assert!(matches!(
            deserialize(&bytes),
            Err(PersistenceError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn rejects_truncated_data() {
        let bytes = serialize(&sample());
        let truncated = &bytes[..bytes.len() - 4];
        assert!(matches!(
            deserialize(truncated),
            Err(PersistenceError::TruncatedData)
        ));
    }

    #[test]
    fn rejects_future_version() {
        let mut bytes = serialize(&sample());
        bytes[4] = VERSION + 1;
        assert!(matches!(
            deserialize(&bytes),
            Err(PersistenceError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn empty_partition_list_round_trips() {
        let mut h = sample();
        h.partitions.clear();
        let bytes = serialize(&h);
        let back = deserialize(&bytes).unwrap();
        assert!(back.partitions.is_empty());
    }
}
