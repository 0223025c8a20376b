//! Index configuration: the fields an operator supplies via
//! `CREATE VECTOR INDEX ... WITH (...)`, plus the self-validation the core
//! performs before any partition is built.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Distance function a partition's quantizer and search paths are built around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum DistanceFunc {
    /// Squared Euclidean distance.
    L2 = 0,
    /// `1 - cosine similarity`.
    Cosine = 1,
    /// Inner product (only metric with a symmetric quantized form).
    Ip = 2,
}

impl DistanceFunc {
    /// Parses a `DISTANCEFUNC` option value, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownDistanceFunc`] for anything other than
    /// `L2`, `COSINE`, or `IP`.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_ascii_uppercase().as_str() {
            "L2" => Ok(Self::L2),
            "COSINE" => Ok(Self::Cosine),
            "IP" => Ok(Self::Ip),
            other => Err(ConfigError::UnknownDistanceFunc(other.to_string())),
        }
    }
}

/// Per-index build/search configuration.
///
/// Defaults mirror the source's `VectorIndexConfig`. `gamma` is not present
/// in the original struct definition but is referenced at call sites as
/// `config.gamma`; this crate declares it explicitly with the default the
/// source implicitly relies on (see `SPEC_FULL.md` §9 Open Questions).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector dimensionality. Validated to be positive.
    pub dim: i32,
    /// Max out-degree in the upper (sampled) layer.
    pub max_nbrs_at_upper_level: i32,
    /// Max out-degree in the lower (full) layer.
    pub max_nbrs_at_lower_level: i32,
    /// Probability a newly inserted vid is also promoted to the upper layer.
    pub sampling_probability: f32,
    /// Candidate-list size used during construction.
    pub ef_construction: i32,
    /// Candidate-list size used during search (caller may override per query).
    pub ef_search: i32,
    /// ACORN shrink look-ahead admission parameter.
    pub alpha: f32,
    /// Filter-friendliness multiplier applied to `max_nbrs_*` at insert time.
    pub gamma: f32,
    /// Number of vectors per partition.
    pub num_vectors_per_partition: i32,
    /// Whether vectors are SQ8-quantized for storage and distance computation.
    pub sq_enabled: bool,
    /// Distance function.
    pub distance_func: DistanceFunc,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dim: 0,
            max_nbrs_at_upper_level: 64,
            max_nbrs_at_lower_level: 128,
            sampling_probability: 0.05,
            ef_construction: 200,
            ef_search: 200,
            alpha: 1.0,
            gamma: 1.0,
            num_vectors_per_partition: 5_000_000,
            sq_enabled: true,
            distance_func: DistanceFunc::Cosine,
        }
    }
}

impl IndexConfig {
    /// Builds a config for the given dimension, all other fields defaulted.
    #[must_use]
    pub fn new(dim: i32) -> Self {
        Self {
            dim,
            ..Self::default()
        }
    }

    /// Validates the config per §7 kind 1 (configuration errors).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDimension`] if `dim <= 0`, or
    /// [`ConfigError::SamplingProbabilityOutOfRange`] if
    /// `sampling_probability` is outside `[0, 0.4]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dim <= 0 {
            return Err(ConfigError::InvalidDimension(self.dim));
        }
        if !(0.0..=0.4).contains(&self.sampling_probability) {
            return Err(ConfigError::SamplingProbabilityOutOfRange(
                self.sampling_probability,
            ));
        }
        Ok(())
    }

    /// Effective max out-degree for the upper layer after the gamma multiplier.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn effective_max_nbrs_upper(&self) -> usize {
        ((self.max_nbrs_at_upper_level as f32) * self.gamma).round() as usize
    }

    /// Effective max out-degree for the lower layer after the gamma multiplier.
    ///
    /// The source doubles the lower-layer budget relative to the upper layer
    /// (`maxNbrsLower * gamma * 2`, §4.7 Per-level insert).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn effective_max_nbrs_lower(&self) -> usize {
        ((self.max_nbrs_at_lower_level as f32) * self.gamma * 2.0).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = IndexConfig::new(128);
        assert_eq!(c.max_nbrs_at_upper_level, 64);
        assert_eq!(c.max_nbrs_at_lower_level, 128);
        assert!((c.sampling_probability - 0.05).abs() < f32::EPSILON);
        assert_eq!(c.ef_construction, 200);
        assert_eq!(c.ef_search, 200);
        assert!((c.alpha - 1.0).abs() < f32::EPSILON);
        assert!((c.gamma - 1.0).abs() < f32::EPSILON);
        assert_eq!(c.num_vectors_per_partition, 5_000_000);
        assert!(c.sq_enabled);
        assert_eq!(c.distance_func, DistanceFunc::Cosine);
    }

    #[test]
    fn rejects_nonpositive_dim() {
        let c = IndexConfig::new(0);
        assert!(matches!(c.validate(), Err(ConfigError::InvalidDimension(0))));
    }

    #[test]
    fn rejects_sampling_probability_out_of_range() {
        let mut c = IndexConfig::new(8);
        c.sampling_probability = 0.5;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::SamplingProbabilityOutOfRange(_))
        ));
    }

    #[test]
    fn distance_func_parses_case_insensitively() {
        assert_eq!(DistanceFunc::parse("cosine").unwrap(), DistanceFunc::Cosine);
        assert_eq!(DistanceFunc::parse("L2").unwrap(), DistanceFunc::L2);
        assert_eq!(DistanceFunc::parse("ip").unwrap(), DistanceFunc::Ip);
        assert!(DistanceFunc::parse("euclidean").is_err());
    }

    #[test]
    fn gamma_defaults_to_one_and_scales_budgets() {
        let c = IndexConfig::new(8);
        assert_eq!(c.effective_max_nbrs_upper(), 64);
        assert_eq!(c.effective_max_nbrs_lower(), 256);
    }
}
