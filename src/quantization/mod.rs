//! Vector quantization: the SQ8 scalar quantizer (§4.2).

/// SQ8 scalar quantization: training, encode/decode, and symmetric/asymmetric
/// distance computers.
pub mod sq8;

pub use sq8::{BatchTrainer, Sq8Quantizer, BREAK_POINT_DATA_RATIO, NUM_BINS};
