//! SQ8 scalar quantizer: per-dimension histogram-trimmed range training,
//! 8-bit encode/decode, and symmetric/asymmetric distance computers (§4.2).
//!
//! Grounded byte-for-byte on the source's `SQ8Bit` (`quantization.h`):
//! `NUM_BINS = 512`, `BREAK_POINT_DATA_RATIO = 0.95`, and the exact
//! `vmin/vdiff/α/β/α²/β²` derivation and serialization field order.

use crate::error::ResourceError;

/// Number of histogram bins used to trim outliers from each dimension's range.
pub const NUM_BINS: usize = 512;

/// Minimum fraction of training mass the trimmed window must retain.
pub const BREAK_POINT_DATA_RATIO: f32 = 0.95;

/// Trained per-dimension quantizer parameters.
///
/// `encode`/`decode` and the distance computers below all read these six
/// parallel arrays, one entry per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Sq8Quantizer {
    dim: usize,
    vmin: Vec<f32>,
    vdiff: Vec<f32>,
    alpha: Vec<f32>,
    beta: Vec<f32>,
    alpha_sqr: Vec<f32>,
    beta_sqr: Vec<f32>,
}

/// Accumulates running min/max across training batches before the
/// histogram-trim pass. Call [`BatchTrainer::observe`] once per training
/// batch, then [`BatchTrainer::finalize`].
pub struct BatchTrainer {
    dim: usize,
    vmin: Vec<f32>,
    vmax: Vec<f32>,
    samples: Vec<Vec<f32>>,
}

impl BatchTrainer {
    /// Starts a new trainer for `dim`-dimensional vectors.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::TrainingFailed`] if `dim == 0`.
    pub fn new(dim: usize) -> Result<Self, ResourceError> {
        if dim == 0 {
            return Err(ResourceError::TrainingFailed(
                "dim must be > 0".to_string(),
            ));
        }
        Ok(Self {
            dim,
            vmin: vec![f32::MAX; dim],
            vmax: vec![f32::MIN; dim],
            samples: vec![Vec::new(); dim],
        })
    }

    /// Folds one batch of training vectors (each of length `dim`) into the
    /// running min/max and the retained per-dimension sample lists used for
    /// the histogram-trim pass.
    pub fn observe(&mut self, vectors: &[&[f32]]) {
        for v in vectors {
            debug_assert_eq!(v.len(), self.dim, "training vector has wrong dimension");
            for (j, &val) in v.iter().enumerate() {
                if val < self.vmin[j] {
                    self.vmin[j] = val;
                }
                if val > self.vmax[j] {
                    self.vmax[j] = val;
                }
                self.samples[j].push(val);
            }
        }
    }

    /// Runs the 512-bin, 95%-mass histogram trim per dimension and derives
    /// `α, β, α², β²` from the trimmed `(vmin, vdiff)`.
    #[must_use]
    pub fn finalize(self) -> Sq8Quantizer {
        let dim = self.dim;
        let mut vmin = vec![0.0f32; dim];
        let mut vdiff = vec![0.0f32; dim];

        for j in 0..dim {
            let raw_min = self.vmin[j];
            let raw_max = self.vmax[j];
            let raw_diff = (raw_max - raw_min).max(f32::EPSILON);
            let (trimmed_min, trimmed_diff) =
                determine_smallest_breakpoint(&self.samples[j], raw_min, raw_diff);
            vmin[j] = trimmed_min;
            vdiff[j] = trimmed_diff;
        }

        let mut alpha = vec![0.0f32; dim];
        let mut beta = vec![0.0f32; dim];
        let mut alpha_sqr = vec![0.0f32; dim];
        let mut beta_sqr = vec![0.0f32; dim];
        for j in 0..dim {
            alpha[j] = vdiff[j] / 255.0;
            beta[j] = 0.5 * alpha[j] + vmin[j];
            alpha_sqr[j] = alpha[j] * alpha[j];
            beta_sqr[j] = beta[j] * beta[j];
        }

        Sq8Quantizer {
            dim,
            vmin,
            vdiff,
            alpha,
            beta,
            alpha_sqr,
            beta_sqr,
        }
    }
}

/// Finds the shortest contiguous bin window covering at least
/// `BREAK_POINT_DATA_RATIO` of `samples`, and returns the trimmed
/// `(vmin, vdiff)` for that window.
///
/// `raw_min`/`raw_diff` bound the initial (untrimmed) histogram range.
fn determine_smallest_breakpoint(samples: &[f32], raw_min: f32, raw_diff: f32) -> (f32, f32) {
    if samples.is_empty() {
        return (raw_min, raw_diff);
    }

    let mut hist = [0u32; NUM_BINS];
    let scale = NUM_BINS as f32 / raw_diff;
    for &s in samples {
        let bin = (((s - raw_min) * scale) as i64).clamp(0, NUM_BINS as i64 - 1) as usize;
        hist[bin] += 1;
    }

    let total = samples.len() as f32;
    let threshold = total * BREAK_POINT_DATA_RATIO;

    // Sliding window: smallest [start, end) with cumulative mass >= threshold.
    let mut best_width = NUM_BINS;
    let mut best_start = 0usize;
    let mut start = 0usize;
    let mut running = 0.0f32;
    for end in 0..NUM_BINS {
        running += hist[end] as f32;
        while running - hist[start] as f32 >= threshold {
            running -= hist[start] as f32;
            start += 1;
        }
        if running >= threshold {
            let width = end - start + 1;
            if width < best_width {
                best_width = width;
                best_start = start;
            }
        }
    }

    let bin_width = raw_diff / NUM_BINS as f32;
    let trimmed_min = raw_min + best_start as f32 * bin_width;
    let trimmed_diff = (best_width as f32 * bin_width).max(f32::EPSILON);
    (trimmed_min, trimmed_diff)
}

impl Sq8Quantizer {
    /// Vector dimensionality this quantizer was trained for.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Size in bytes of one encoded code block: `dim` u8 codes plus a
    /// trailing fp32 precomputed tail.
    #[must_use]
    pub fn code_size(&self) -> usize {
        self.dim + 4
    }

    /// Encodes `x` into `out` (which must be at least [`Self::code_size`]
    /// bytes): `dim` saturating u8 codes followed by the little-endian fp32
    /// tail `Σⱼ c[j]·α[j]·β[j]`.
    ///
    /// # Panics
    ///
    /// Panics if `x.len() != self.dim` or `out.len() < self.code_size()`
    /// (no runtime bounds check on the hot path beyond this, per §4.2).
    pub fn encode(&self, x: &[f32], out: &mut [u8]) {
        debug_assert_eq!(x.len(), self.dim);
        debug_assert!(out.len() >= self.code_size());
        let mut tail = 0.0f32;
        for j in 0..self.dim {
            let normalized = (x[j] - self.vmin[j]) / self.vdiff[j] * 255.0;
            let code = normalized.floor().clamp(0.0, 255.0) as u8;
            out[j] = code;
            tail += f32::from(code) * self.alpha[j] * self.beta[j];
        }
        out[self.dim..self.dim + 4].copy_from_slice(&tail.to_le_bytes());
    }

    /// Decodes the `dim` u8 codes in `code` (ignoring the trailing tail
    /// bytes) into `out`: `x̂[j] = α[j]·c[j] + β[j]`.
    pub fn decode(&self, code: &[u8], out: &mut [f32]) {
        debug_assert!(code.len() >= self.dim);
        debug_assert_eq!(out.len(), self.dim);
        for j in 0..self.dim {
            out[j] = self.alpha[j] * f32::from(code[j]) + self.beta[j];
        }
    }

    fn tail(&self, code: &[u8]) -> f32 {
        f32::from_le_bytes([
            code[self.dim],
            code[self.dim + 1],
            code[self.dim + 2],
            code[self.dim + 3],
        ])
    }

    /// Asymmetric squared-L2 distance between a raw fp32 query and an
    /// encoded `u8` code, decoding on the fly.
    #[must_use]
    pub fn asym_l2sq(&self, q: &[f32], code: &[u8]) -> f32 {
        debug_assert_eq!(q.len(), self.dim);
        let mut sum = 0.0f32;
        for j in 0..self.dim {
            let xhat = self.alpha[j] * f32::from(code[j]) + self.beta[j];
            let d = q[j] - xhat;
            sum += d * d;
        }
        sum
    }

    /// Asymmetric cosine distance between a raw fp32 query and an encoded
    /// `u8` code: `1 − ab/√(a²b²)`, with a small epsilon guarding the
    /// denominator.
    #[must_use]
    pub fn asym_cosine(&self, q: &[f32], code: &[u8]) -> f32 {
        debug_assert_eq!(q.len(), self.dim);
        let mut ab = 0.0f32;
        let mut aa = 0.0f32;
        let mut bb = 0.0f32;
        for j in 0..self.dim {
            let xhat = self.alpha[j] * f32::from(code[j]) + self.beta[j];
            ab += q[j] * xhat;
            aa += q[j] * q[j];
            bb += xhat * xhat;
        }
        let denom = (aa * bb).sqrt();
        if denom <= f32::EPSILON {
            return 1.0;
        }
        1.0 - ab / denom
    }

    /// Asymmetric inner product between a raw fp32 query and an encoded
    /// `u8` code.
    #[must_use]
    pub fn asym_ip(&self, q: &[f32], code: &[u8]) -> f32 {
        debug_assert_eq!(q.len(), self.dim);
        let mut sum = 0.0f32;
        for j in 0..self.dim {
            let xhat = self.alpha[j] * f32::from(code[j]) + self.beta[j];
            sum += q[j] * xhat;
        }
        sum
    }

    /// Symmetric inner product between two encoded `u8` codes:
    /// `Σⱼ (c1[j]·c2[j]·α²[j] + β²[j])` plus `c1`'s precomputed tail.
    ///
    /// This is the only symmetric form the source provides; requesting a
    /// symmetric L2/cosine computer is a configuration error (there is no
    /// algebraic symmetric expansion for those metrics over SQ8 codes).
    #[must_use]
    pub fn sym_ip(&self, code1: &[u8], code2: &[u8]) -> f32 {
        let mut sum = 0.0f32;
        for j in 0..self.dim {
            sum += f32::from(code1[j]) * f32::from(code2[j]) * self.alpha_sqr[j] + self.beta_sqr[j];
        }
        sum + self.tail(code1)
    }

    /// Per-dimension `vmin` (for serialization).
    #[must_use]
    pub fn vmin(&self) -> &[f32] {
        &self.vmin
    }
    /// Per-dimension `vdiff` (for serialization).
    #[must_use]
    pub fn vdiff(&self) -> &[f32] {
        &self.vdiff
    }
    /// Per-dimension `α` (for serialization).
    #[must_use]
    pub fn alpha(&self) -> &[f32] {
        &self.alpha
    }
    /// Per-dimension `β` (for serialization).
    #[must_use]
    pub fn beta(&self) -> &[f32] {
        &self.beta
    }
    /// Per-dimension `α²` (for serialization).
    #[must_use]
    pub fn alpha_sqr(&self) -> &[f32] {
        &self.alpha_sqr
    }
    /// Per-dimension `β²` (for serialization).
    #[must_use]
    pub fn beta_sqr(&self) -> &[f32] {
        &self.beta_sqr
    }

    /// Reconstructs a quantizer from its six serialized per-dimension arrays
    /// (used by header deserialization, §6.2 item 3).
    #[must_use]
    pub fn from_parts(
        vmin: Vec<f32>,
        vdiff: Vec<f32>,
        alpha: Vec<f32>,
        beta: Vec<f32>,
        alpha_sqr: Vec<f32>,
        beta_sqr: Vec<f32>,
    ) -> Self {
        let dim = vmin.len();
        Self {
            dim,
            vmin,
            vdiff,
            alpha,
            beta,
            alpha_sqr,
            beta_sqr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn rejects_zero_dim() {
        assert!(BatchTrainer::new(0).is_err());
    }

    #[test]
    fn encode_decode_roundtrip_within_one_alpha() {
        let mut trainer = BatchTrainer::new(4).unwrap();
        let vectors: Vec<Vec<f32>> = (0..1000)
            .map(|i| {
                let t = i as f32 / 1000.0;
                vec![t, t * 2.0, -t, t - 0.5]
            })
            .collect();
        let refs: Vec<&[f32]> = vectors.iter().map(|v| v.as_slice()).collect();
        trainer.observe(&refs);
        let q = trainer.finalize();

        let x = vec![0.3f32, 0.6, -0.3, -0.2];
        let mut code = vec![0u8; q.code_size()];
        q.encode(&x, &mut code);
        let mut decoded = vec![0.0f32; 4];
        q.decode(&code, &mut decoded);
        for j in 0..4 {
            assert!((decoded[j] - x[j]).abs() <= q.alpha()[j] + 1e-4);
        }
    }

    #[test]
    fn window_trim_excludes_outliers() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut trainer = BatchTrainer::new(1).unwrap();
        let mut data = Vec::with_capacity(10_010);
        for _ in 0..10_000 {
            // Crude Box-Muller for an N(0,1) sample.
            let u1: f32 = rng.gen_range(1e-6..1.0);
            let u2: f32 = rng.gen_range(0.0..1.0);
            let z = (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos();
            data.push(vec![z]);
        }
        for _ in 0..10 {
            data.push(vec![1e6]);
        }
        for _ in 0..10 {
            data.push(vec![-1e6]);
        }
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        trainer.observe(&refs);
        let q = trainer.finalize();
        assert!(q.vdiff()[0] <= 10.0, "vdiff[0] = {}", q.vdiff()[0]);
    }

    #[test]
    fn sym_ip_adds_precomputed_tail() {
        let mut trainer = BatchTrainer::new(2).unwrap();
        trainer.observe(&[&[0.0, 0.0], &[1.0, 1.0]]);
        let q = trainer.finalize();
        let mut c1 = vec![0u8; q.code_size()];
        let mut c2 = vec![0u8; q.code_size()];
        q.encode(&[0.2, 0.7], &mut c1);
        q.encode(&[0.9, 0.1], &mut c2);
        let sym = q.sym_ip(&c1, &c2);
        assert!(sym.is_finite());
    }
}
