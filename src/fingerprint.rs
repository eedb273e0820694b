//! Folding a multi-word hash output into a single 64-bit key.
//!
//! The counter only accepts `u64` keys while `H x` spans `ceil(l / 64)` words.
//! Equal outputs must give equal keys; distinct outputs should only collide at
//! about the birthday bound of a 64-bit value.

use xxhash_rust::xxh3::Xxh3;

/// Starting value of the accumulator, also folded in with every word.
pub const FOLD_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// SplitMix64 finalizer. A bijection on `u64` where every input bit reaches
/// every output bit.
#[inline]
pub fn mix64(mut v: u64) -> u64 {
    v ^= v >> 30;
    v = v.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    v ^= v >> 27;
    v = v.wrapping_mul(0x94d0_49bb_1331_11eb);
    v ^= v >> 31;
    v
}

/// Folds `words` into one key, in index order.
///
/// The accumulator takes part in every step through shifted copies of itself,
/// so `[a, b]` and `[b, a]` give different keys.
#[inline]
pub fn fingerprint(words: &[u64]) -> u64 {
    words.iter().fold(FOLD_SEED, |h, &w| {
        h ^ mix64(w)
            .wrapping_add(FOLD_SEED)
            .wrapping_add(h << 6)
            .wrapping_add(h >> 2)
    })
}

/// Maps a hash output to the key that is offered to the counter.
pub trait Fingerprinter {
    fn fingerprint(&self, words: &[u64]) -> u64;
}

/// The default combiner, see [`fingerprint`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitMixFold;

impl Fingerprinter for SplitMixFold {
    #[inline]
    fn fingerprint(&self, words: &[u64]) -> u64 {
        fingerprint(words)
    }
}

/// xxh3-64 over the little-endian bytes of the words.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh3Fingerprint {
    seed: u64,
}

impl Xxh3Fingerprint {
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl Fingerprinter for Xxh3Fingerprint {
    fn fingerprint(&self, words: &[u64]) -> u64 {
        let mut h = Xxh3::with_seed(self.seed);
        for w in words {
            h.update(&w.to_le_bytes());
        }
        h.digest()
    }
}
