use rand::seq::SliceRandom;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shuffle {
    #[default]
    DontShuffle,
    Seeded(u64),
}

/// Portable RNG for everything that must be reproducible across runs and platforms.
///
/// `stream` separates independent consumers of the same experiment seed
/// (e.g. one stream per round) without them sharing state.
pub fn deterministic_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

pub fn deterministic_shuffle<T>(items: &mut [T], seed: u64) {
    items.shuffle(&mut deterministic_rng(seed, 0));
}

impl Shuffle {
    pub fn apply<T>(&self, items: &mut [T]) {
        if let Shuffle::Seeded(seed) = self {
            deterministic_shuffle(items, *seed);
        }
    }
}
