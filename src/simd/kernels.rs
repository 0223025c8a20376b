//! `l2sq`, `cos`, `dot`, and `normalize` kernels over `&[f32]`.
//!
//! Dispatch is selected exactly once per process (see [`Dispatch::get`]),
//! using the runtime capabilities from [`super::detect::capabilities`]. The
//! per-target-feature bodies are ordinary `#[target_feature]`-gated
//! functions reached only through the cached function-pointer table, never
//! through a per-call `is_x86_feature_detected!` probe — satisfying §4.1's
//! "kernel selection happens once per process ... must not dispatch
//! per-call."

#![allow(clippy::cast_ptr_alignment, clippy::missing_panics_doc)]

use std::sync::OnceLock;

use super::detect::capabilities;

type L2SqFn = fn(&[f32], &[f32]) -> f32;
type DotFn = fn(&[f32], &[f32]) -> f32;
type NormalizeFn = fn(&mut [f32]);

struct Dispatch {
    l2sq: L2SqFn,
    dot: DotFn,
    normalize: NormalizeFn,
}

static DISPATCH: OnceLock<Dispatch> = OnceLock::new();

fn dispatch() -> &'static Dispatch {
    DISPATCH.get_or_init(|| {
        let caps = capabilities();

        #[cfg(target_arch = "x86_64")]
        if caps.avx2 && caps.fma {
            return Dispatch {
                l2sq: x86::l2sq_avx2_fma,
                dot: x86::dot_avx2_fma,
                normalize: x86::normalize_avx2_fma,
            };
        }

        #[cfg(target_arch = "aarch64")]
        if caps.neon {
            return Dispatch {
                l2sq: neon::l2sq_neon,
                dot: neon::dot_neon,
                normalize: neon::normalize_neon,
            };
        }

        Dispatch {
            l2sq: scalar::l2sq,
            dot: scalar::dot,
            normalize: scalar::normalize,
        }
    })
}

/// Squared Euclidean distance: `Σ(xᵢ−yᵢ)²`.
///
/// # Panics
///
/// Panics (via `assert_eq!`) if `x.len() != y.len()`.
#[must_use]
pub fn l2sq(x: &[f32], y: &[f32]) -> f32 {
    assert_eq!(x.len(), y.len(), "l2sq: dimension mismatch");
    (dispatch().l2sq)(x, y)
}

/// Plain inner product: `Σ xᵢ·yᵢ`.
///
/// # Panics
///
/// Panics (via `assert_eq!`) if `x.len() != y.len()`.
#[must_use]
pub fn dot(x: &[f32], y: &[f32]) -> f32 {
    assert_eq!(x.len(), y.len(), "dot: dimension mismatch");
    (dispatch().dot)(x, y)
}

/// Cosine distance: `1 − (x·y)/(‖x‖·‖y‖)`. Returns `1.0` when either norm is zero.
///
/// # Panics
///
/// Panics (via `assert_eq!`) if `x.len() != y.len()`.
#[must_use]
pub fn cos(x: &[f32], y: &[f32]) -> f32 {
    assert_eq!(x.len(), y.len(), "cos: dimension mismatch");
    let d = dispatch();
    let xy = (d.dot)(x, y);
    let xx = (d.dot)(x, x);
    let yy = (d.dot)(y, y);
    let denom = xx.sqrt() * yy.sqrt();
    if denom <= f32::EPSILON {
        return 1.0;
    }
    1.0 - xy / denom
}

/// Normalizes `x` in place to unit L2 norm. No-op (leaves `x` unchanged) if
/// `x`'s norm is zero.
pub fn normalize(x: &mut [f32]) {
    (dispatch().normalize)(x);
}

mod scalar {
    pub fn l2sq(x: &[f32], y: &[f32]) -> f32 {
        x.iter().zip(y).map(|(a, b)| (a - b) * (a - b)).sum()
    }

    pub fn dot(x: &[f32], y: &[f32]) -> f32 {
        x.iter().zip(y).map(|(a, b)| a * b).sum()
    }

    pub fn normalize(x: &mut [f32]) {
        let norm_sq: f32 = x.iter().map(|v| v * v).sum();
        if norm_sq <= f32::EPSILON {
            return;
        }
        let inv_norm = 1.0 / norm_sq.sqrt();
        for v in x.iter_mut() {
            *v *= inv_norm;
        }
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use std::arch::x86_64::{
        __m256, _mm256_add_ps, _mm256_castps256_ps128, _mm256_extractf128_ps, _mm256_fmadd_ps,
        _mm256_loadu_ps, _mm256_setzero_ps, _mm256_sub_ps, _mm_add_ps, _mm_add_ss, _mm_cvtss_f32,
        _mm_movehl_ps, _mm_shuffle_ps,
    };

    #[inline]
    unsafe fn hsum256(v: __m256) -> f32 {
        let lo = _mm256_castps256_ps128(v);
        let hi = _mm256_extractf128_ps(v, 1);
        let sum128 = _mm_add_ps(lo, hi);
        let shuf = _mm_shuffle_ps(sum128, sum128, 0b01_00_11_10);
        let sums = _mm_add_ps(sum128, shuf);
        let shuf2 = _mm_movehl_ps(sums, sums);
        let result = _mm_add_ss(sums, shuf2);
        _mm_cvtss_f32(result)
    }

    /// # Safety
    /// Caller must only invoke this when AVX2+FMA are available at runtime
    /// (checked once in `dispatch()`).
    #[target_feature(enable = "avx2", enable = "fma")]
    pub unsafe fn l2sq_avx2_fma(x: &[f32], y: &[f32]) -> f32 {
        let n = x.len();
        let mut i = 0;
        let mut acc = _mm256_setzero_ps();
        while i + 8 <= n {
            let vx = _mm256_loadu_ps(x.as_ptr().add(i));
            let vy = _mm256_loadu_ps(y.as_ptr().add(i));
            let diff = _mm256_sub_ps(vx, vy);
            acc = _mm256_fmadd_ps(diff, diff, acc);
            i += 8;
        }
        let mut sum = hsum256(acc);
        while i < n {
            let d = x[i] - y[i];
            sum += d * d;
            i += 1;
        }
        sum
    }

    /// # Safety
    /// See [`l2sq_avx2_fma`].
    #[target_feature(enable = "avx2", enable = "fma")]
    pub unsafe fn dot_avx2_fma(x: &[f32], y: &[f32]) -> f32 {
        let n = x.len();
        let mut i = 0;
        let mut acc = _mm256_setzero_ps();
        while i + 8 <= n {
            let vx = _mm256_loadu_ps(x.as_ptr().add(i));
            let vy = _mm256_loadu_ps(y.as_ptr().add(i));
            acc = _mm256_fmadd_ps(vx, vy, acc);
            i += 8;
        }
        let mut sum = hsum256(acc);
        while i < n {
            sum += x[i] * y[i];
            i += 1;
        }
        sum
    }

    /// # Safety
    /// See [`l2sq_avx2_fma`].
    #[target_feature(enable = "avx2", enable = "fma")]
    pub unsafe fn normalize_avx2_fma(x: &mut [f32]) {
        let n = x.len();
        let mut i = 0;
        let mut acc = _mm256_setzero_ps();
        while i + 8 <= n {
            let vx = _mm256_loadu_ps(x.as_ptr().add(i));
            acc = _mm256_fmadd_ps(vx, vx, acc);
            i += 8;
        }
        let mut norm_sq = hsum256(acc);
        while i < n {
            norm_sq += x[i] * x[i];
            i += 1;
        }
        if norm_sq <= f32::EPSILON {
            return;
        }
        let inv_norm = 1.0 / norm_sq.sqrt();
        for v in x.iter_mut() {
            *v *= inv_norm;
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn avx2_matches_scalar() {
            if !std::is_x86_feature_detected!("avx2") || !std::is_x86_feature_detected!("fma") {
                return;
            }
            let x: Vec<f32> = (0..37).map(|i| i as f32 * 0.37).collect();
            let y: Vec<f32> = (0..37).map(|i| (i as f32 * 0.11).cos()).collect();
            let scalar_l2 = super::super::scalar::l2sq(&x, &y);
            let simd_l2 = unsafe { l2sq_avx2_fma(&x, &y) };
            assert!((scalar_l2 - simd_l2).abs() < 1e-2);
        }
    }
}

#[cfg(target_arch = "aarch64")]
mod neon {
    use std::arch::aarch64::{vaddvq_f32, vdupq_n_f32, vfmaq_f32, vld1q_f32, vsubq_f32};

    /// # Safety
    /// Caller must only invoke this when NEON is available at runtime
    /// (checked once in `dispatch()`). NEON is mandatory on aarch64, so
    /// this is in practice unconditionally safe there.
    #[target_feature(enable = "neon")]
    pub unsafe fn l2sq_neon(x: &[f32], y: &[f32]) -> f32 {
        let n = x.len();
        let mut i = 0;
        let mut acc = vdupq_n_f32(0.0);
        while i + 4 <= n {
            let vx = vld1q_f32(x.as_ptr().add(i));
            let vy = vld1q_f32(y.as_ptr().add(i));
            let diff = vsubq_f32(vx, vy);
            acc = vfmaq_f32(acc, diff, diff);
            i += 4;
        }
        let mut sum = vaddvq_f32(acc);
        while i < n {
            let d = x[i] - y[i];
            sum += d * d;
            i += 1;
        }
        sum
    }

    /// # Safety
    /// See [`l2sq_neon`].
    #[target_feature(enable = "neon")]
    pub unsafe fn dot_neon(x: &[f32], y: &[f32]) -> f32 {
        let n = x.len();
        let mut i = 0;
        let mut acc = vdupq_n_f32(0.0);
        while i + 4 <= n {
            let vx = vld1q_f32(x.as_ptr().add(i));
            let vy = vld1q_f32(y.as_ptr().add(i));
            acc = vfmaq_f32(acc, vx, vy);
            i += 4;
        }
        let mut sum = vaddvq_f32(acc);
        while i < n {
            sum += x[i] * y[i];
            i += 1;
        }
        sum
    }

    /// # Safety
    /// See [`l2sq_neon`].
    ///
    /// This is the kernel named in the source's `compute_normalized_factor_neon`.
    /// The source indexes the loaded vector at a fixed `vector + 4` inside the
    /// accumulation loop instead of `vector + i`; that bug is not reproduced
    /// here (see `SPEC_FULL.md` §9 / Design Note "NEON `vector+i` bugfix").
    #[target_feature(enable = "neon")]
    pub unsafe fn normalize_neon(x: &mut [f32]) {
        let n = x.len();
        let mut i = 0;
        let mut acc = vdupq_n_f32(0.0);
        while i + 4 <= n {
            let vx = vld1q_f32(x.as_ptr().add(i));
            acc = vfmaq_f32(acc, vx, vx);
            i += 4;
        }
        let mut norm_sq = vaddvq_f32(acc);
        while i < n {
            norm_sq += x[i] * x[i];
            i += 1;
        }
        if norm_sq <= f32::EPSILON {
            return;
        }
        let inv_norm = 1.0 / norm_sq.sqrt();
        for v in x.iter_mut() {
            *v *= inv_norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2sq_matches_definition() {
        let x = [1.0f32, 2.0, 3.0];
        let y = [0.0f32, 0.0, 0.0];
        assert!((l2sq(&x, &y) - 14.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "dimension mismatch")]
    fn l2sq_rejects_mismatched_len() {
        let x = [1.0f32, 2.0];
        let y = [1.0f32];
        let _ = l2sq(&x, &y);
    }

    #[test]
    fn cos_zero_for_parallel_vectors() {
        let x = [1.0f32, 0.0, 0.0, 0.0];
        let y = [2.0f32, 0.0, 0.0, 0.0];
        assert!(cos(&x, &y).abs() < 1e-6);
    }

    #[test]
    fn cos_is_one_for_zero_vector() {
        let x = [0.0f32, 0.0, 0.0];
        let y = [1.0f32, 2.0, 3.0];
        assert!((cos(&x, &y) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_produces_unit_norm() {
        let mut x = [3.0f32, 4.0, 0.0];
        normalize(&mut x);
        let norm: f32 = x.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn normalize_noop_on_zero_vector() {
        let mut x = [0.0f32, 0.0, 0.0];
        normalize(&mut x);
        assert_eq!(x, [0.0, 0.0, 0.0]);
    }
}
