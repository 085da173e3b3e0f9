//! Deterministic utilities for reproducible training
//!
//! Seeded RNG streams and split tie-breaking, so that the same dataset and
//! seed produce identical models across runs.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Independent RNG stream derived from the run seed.
///
/// Each consumer (split, bootstrap of tree `i`, ...) asks for its own
/// stream so adding trees never perturbs the split.
pub fn seeded_rng(seed: u64, stream: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Deterministic tie-breaker for split selection
/// Orders equal-gain candidates by (feature_idx, threshold position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub position: usize,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, position: usize) -> Self {
        Self {
            feature_idx,
            position,
        }
    }
}
