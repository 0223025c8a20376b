//! Distance-computer façade: a sum type over `{L2, Cos, IP}` plus a thin
//! trait, with raw-memory, node-table, and quantized adapters (§4.4, §9
//! "Polymorphic distance computer").

use crate::config::DistanceFunc;
use crate::hnsw::graph::VectorId;
use crate::hooks::EmbeddingSource;
use crate::quantization::Sq8Quantizer;
use crate::simd;

/// One of the three distance kinds the core supports.
pub type DistanceKind = DistanceFunc;

/// Strategy over `{L2, Cos, IP}` plus the three storage adapters (raw
/// memory, node-table, quantized). Batch entrypoints compensate for the
/// per-call dispatch overhead of the trait object (§9).
pub trait DistanceComputer {
    /// Sets the query vector used by subsequent `compute_*` calls.
    fn set_query(&mut self, query: &[f32]);

    /// Distance between the current query and the embedding at `vid`.
    /// Returns `None` if `vid`'s embedding could not be resolved (a data
    /// error the caller should skip).
    fn compute_id(&mut self, vid: VectorId) -> Option<f32>;

    /// Distance between the embeddings at `vid_a` and `vid_b` (ignores the
    /// query set by `set_query`).
    fn compute_pair(&mut self, vid_a: VectorId, vid_b: VectorId) -> Option<f32>;

    /// Distance between the current query and a raw fp32 pointer (used when
    /// the caller already holds the slice, e.g. during insertion).
    fn compute_ptr(&self, ptr: &[f32]) -> f32;

    /// Batch form of [`DistanceComputer::compute_id`].
    fn batch_compute_ids(&mut self, vids: &[VectorId], out: &mut [f32]) {
        debug_assert_eq!(vids.len(), out.len());
        for (i, &vid) in vids.iter().enumerate() {
            out[i] = self.compute_id(vid).unwrap_or(f32::INFINITY);
        }
    }
}

fn distance_fn(kind: DistanceKind) -> fn(&[f32], &[f32]) -> f32 {
    match kind {
        DistanceKind::L2 => simd::l2sq,
        DistanceKind::Cosine => simd::cos,
        DistanceKind::Ip => |a, b| -simd::dot(a, b),
    }
}

/// Distance computer over a contiguous `data[0..n*dim]` arena (§4.4 "RawMemory").
pub struct RawMemoryComputer<'a> {
    data: &'a [f32],
    dim: usize,
    kind: DistanceKind,
    query: Vec<f32>,
}

impl<'a> RawMemoryComputer<'a> {
    /// Builds a computer over `data` (laid out as `n` contiguous `dim`-length
    /// rows) for the given `kind`.
    #[must_use]
    pub fn new(data: &'a [f32], dim: usize, kind: DistanceKind) -> Self {
        Self {
            data,
            dim,
            kind,
            query: vec![0.0; dim],
        }
    }

    fn row(&self, vid: VectorId) -> &[f32] {
        let begin = vid as usize * self.dim;
        &self.data[begin..begin + self.dim]
    }
}

impl DistanceComputer for RawMemoryComputer<'_> {
    fn set_query(&mut self, query: &[f32]) {
        self.query.clear();
        self.query.extend_from_slice(query);
    }

    fn compute_id(&mut self, vid: VectorId) -> Option<f32> {
        Some(distance_fn(self.kind)(&self.query, self.row(vid)))
    }

    fn compute_pair(&mut self, vid_a: VectorId, vid_b: VectorId) -> Option<f32> {
        Some(distance_fn(self.kind)(self.row(vid_a), self.row(vid_b)))
    }

    fn compute_ptr(&self, ptr: &[f32]) -> f32 {
        distance_fn(self.kind)(&self.query, ptr)
    }
}

/// Distance computer that resolves vids through an [`EmbeddingSource`] hook
/// before delegating to an inner computer (§4.4 "NodeTable").
///
/// This is the zero-copy-frame adapter the source implements via
/// `fastLookup`/`Column::ChunkState` reuse; here the reuse is expressed as
/// "the hook owns whatever pinning state it needs across calls", since the
/// buffer-manager chunk machinery itself is out of scope.
pub struct NodeTableComputer<'a, S: EmbeddingSource> {
    source: &'a mut S,
    dim: usize,
    kind: DistanceKind,
    query: Vec<f32>,
}

impl<'a, S: EmbeddingSource> NodeTableComputer<'a, S> {
    /// Builds a computer that resolves vids through `source`.
    #[must_use]
    pub fn new(source: &'a mut S, dim: usize, kind: DistanceKind) -> Self {
        Self {
            source,
            dim,
            kind,
            query: vec![0.0; dim],
        }
    }
}

impl<S: EmbeddingSource> DistanceComputer for NodeTableComputer<'_, S> {
    fn set_query(&mut self, query: &[f32]) {
        self.query.clear();
        self.query.extend_from_slice(query);
    }

    fn compute_id(&mut self, vid: VectorId) -> Option<f32> {
        let Some(row) = self.source.fetch(vid) else {
            log::warn!("vid {vid} has no embedding, skipping");
            return None;
        };
        Some(distance_fn(self.kind)(&self.query, row))
    }

    fn compute_pair(&mut self, vid_a: VectorId, vid_b: VectorId) -> Option<f32> {
        let Some(a) = self.source.fetch(vid_a) else {
            log::warn!("vid {vid_a} has no embedding, skipping");
            return None;
        };
        let a = a.to_vec();
        let Some(b) = self.source.fetch(vid_b) else {
            log::warn!("vid {vid_b} has no embedding, skipping");
            return None;
        };
        Some(distance_fn(self.kind)(&a, b))
    }

    fn compute_ptr(&self, ptr: &[f32]) -> f32 {
        distance_fn(self.kind)(&self.query, ptr)
    }
}

/// Distance computer wrapping the SQ8 asymmetric/symmetric computers (§4.2,
/// §4.4 "Quantized"). The query is kept as a raw fp32 vector; `compute_id`
/// reads the encoded code for `vid` from `codes`.
pub struct QuantizedComputer<'a> {
    quantizer: &'a Sq8Quantizer,
    codes: &'a [u8],
    kind: DistanceKind,
    query: Vec<f32>,
}

impl<'a> QuantizedComputer<'a> {
    /// Builds an asymmetric (fp32 query × u8 code) computer over a flat
    /// `codes` buffer (`vid`'s code starts at `vid * quantizer.code_size()`).
    #[must_use]
    pub fn new(quantizer: &'a Sq8Quantizer, codes: &'a [u8], kind: DistanceKind) -> Self {
        Self {
            quantizer,
            codes,
            kind,
            query: vec![0.0; quantizer.dim()],
        }
    }

    fn code(&self, vid: VectorId) -> &[u8] {
        let size = self.quantizer.code_size();
        let begin = vid as usize * size;
        &self.codes[begin..begin + size]
    }

    /// The symmetric inner-product distance between two codes already
    /// resolved by the caller. Only `DistanceKind::Ip` supports a symmetric
    /// form (§4.2); callers must not call this for `L2`/`Cosine`.
    #[must_use]
    pub fn sym_ip(&self, vid_a: VectorId, vid_b: VectorId) -> f32 {
        debug_assert_eq!(self.kind, DistanceKind::Ip);
        -self.quantizer.sym_ip(self.code(vid_a), self.code(vid_b))
    }
}

impl DistanceComputer for QuantizedComputer<'_> {
    fn set_query(&mut self, query: &[f32]) {
        self.query.clear();
        self.query.extend_from_slice(query);
    }

    fn compute_id(&mut self, vid: VectorId) -> Option<f32> {
        let code = self.code(vid);
        Some(match self.kind {
            DistanceKind::L2 => self.quantizer.asym_l2sq(&self.query, code),
            DistanceKind::Cosine => self.quantizer.asym_cosine(&self.query, code),
            DistanceKind::Ip => -self.quantizer.asym_ip(&self.query, code),
        })
    }

    fn compute_pair(&mut self, vid_a: VectorId, vid_b: VectorId) -> Option<f32> {
        if self.kind == DistanceKind::Ip {
            return Some(self.sym_ip(vid_a, vid_b));
        }
        // L2/Cosine have no symmetric quantized form (§4.2); decode both and
        // fall back to the raw-memory kernel.
        let dim = self.quantizer.dim();
        let mut a = vec![0.0f32; dim];
        let mut b = vec![0.0f32; dim];
        self.quantizer.decode(self.code(vid_a), &mut a);
        self.quantizer.decode(self.code(vid_b), &mut b);
        Some(distance_fn(self.kind)(&a, &b))
    }

    fn compute_ptr(&self, ptr: &[f32]) -> f32 {
        // `ptr` here is a full fp32 vector, not an encoded code (the trait
        // contract is "raw fp32 pointer"); there is no quantized form of
        // this call, so it bypasses the codes and uses the plain kernel.
        distance_fn(self.kind)(&self.query, ptr)
    }
}
