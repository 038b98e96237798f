//! Per-stream RNG seeding with ChaCha8.
//!
//! Random-mode sampling and per-combination seeds draw from separate
//! ChaCha8 streams of the same global seed. Same seed -> same sequence, always.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Stream used by random-mode index sampling.
pub const SAMPLING_STREAM: u64 = 0;
/// Stream used for the seeds attached to yielded combinations.
pub const VARIANT_SEED_STREAM: u64 = 1;

/// Create a deterministic RNG for a given global seed and stream.
pub fn stream_rng(global_seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(global_seed);
    rng.set_stream(stream);
    rng
}

/// Source of the seeds attached to yielded combinations.
#[derive(Debug, Clone)]
pub struct VariantSeeds {
    rng: ChaCha8Rng,
}

impl VariantSeeds {
    pub fn new(global_seed: u64) -> Self {
        Self {
            rng: stream_rng(global_seed, VARIANT_SEED_STREAM),
        }
    }

    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen()
    }
}
