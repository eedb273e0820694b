use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const WORD_BITS: usize = 64;

/// Number of 64-bit words needed to hold `bits` bits.
#[inline]
pub fn words_for(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

/// Mask of the valid bits in the last word of a `bits`-wide vector.
#[inline]
pub fn tail_mask(bits: usize) -> u64 {
    let excess = words_for(bits) * WORD_BITS - bits;
    u64::MAX >> excess
}

/// Clears every bit at position `>= bits`.
#[inline]
pub fn mask_tail(words: &mut [u64], bits: usize) {
    if let Some(last) = words.last_mut() {
        *last &= tail_mask(bits);
    }
}

/// Returns true if no bit at position `>= bits` is set.
pub fn is_masked(words: &[u64], bits: usize) -> bool {
    match words.last() {
        Some(last) => last & !tail_mask(bits) == 0,
        None => true,
    }
}

/// A fixed-width bit vector stored as little-endian 64-bit words.
///
/// Bit `i` lives in word `i / 64` at position `i % 64`. Bits at positions
/// `>= width` are always zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BitVec {
    width: usize,
    words: Vec<u64>,
}

impl BitVec {
    /// Creates an all-zero vector of `width` bits.
    pub fn zeros(width: usize) -> Self {
        Self {
            width,
            words: vec![0; words_for(width)],
        }
    }

    /// Wraps `words` as a `width`-bit vector.
    ///
    /// Fails with [`Error::ShapeMismatch`] if the word count is not `ceil(width / 64)`
    /// and with [`Error::InvalidParameter`] if a bit beyond `width` is set.
    pub fn from_words(words: Vec<u64>, width: usize) -> Result<Self> {
        let expected = words_for(width);
        if words.len() != expected {
            return Err(Error::ShapeMismatch {
                expected,
                actual: words.len(),
            });
        }
        if !is_masked(&words, width) {
            return Err(Error::InvalidParameter(format!(
                "bits set beyond width {width}"
            )));
        }
        Ok(Self { width, words })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Mutable access to the words. Callers must keep the tail masked.
    pub(crate) fn words_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }

    pub fn into_words(self) -> Vec<u64> {
        self.words
    }

    /// Reads a `width`-bit vector from little-endian bytes. Short input is
    /// zero-extended; input longer than `ceil(width / 64)` words or with a bit
    /// set beyond `width` is rejected as in [`Self::from_words`].
    pub fn from_le_bytes(bytes: &[u8], width: usize) -> Result<Self> {
        let mut words: Vec<u64> = bytes
            .chunks(8)
            .map(|chunk| {
                let mut buf = [0u8; 8];
                buf[..chunk.len()].copy_from_slice(chunk);
                u64::from_le_bytes(buf)
            })
            .collect();
        if words.len() < words_for(width) {
            words.resize(words_for(width), 0);
        }
        Self::from_words(words, width)
    }

    /// Little-endian bytes of the words, `8 * ceil(width / 64)` long.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    /// Returns bit `i`, or false when `i >= width`.
    pub fn get(&self, i: usize) -> bool {
        i < self.width && (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1
    }

    /// Sets bit `i`. Out-of-range positions are ignored.
    pub fn set(&mut self, i: usize) {
        if i < self.width {
            self.words[i / WORD_BITS] |= 1 << (i % WORD_BITS);
        }
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }
}

impl AsRef<[u64]> for BitVec {
    fn as_ref(&self) -> &[u64] {
        &self.words
    }
}
