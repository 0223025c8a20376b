//! SIMD capability detection and the `l2sq`/`cos`/`dot`/`normalize` kernels (§4.1).
//!
//! Capability detection ([`detect`]) and kernel dispatch ([`kernels`]) are
//! both cached once per process behind a `OnceLock` — neither re-probes the
//! CPU on the hot path.

pub mod detect;
pub mod kernels;

pub use detect::{capabilities, warn_if_suboptimal, SimdCapabilities};
pub use kernels::{cos, dot, l2sq, normalize};
