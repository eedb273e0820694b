use rand::RngCore;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bitvec::{is_masked, mask_tail, words_for, BitVec, WORD_BITS};
use crate::error::{Error, Result};
use crate::sampler::seeded_rng;

/// A random linear map `F2^u -> F2^l`, stored as an `l x u` bit matrix.
///
/// Row `i` decides output bit `i`: it is the parity of `row[i] & x`. Rows are
/// kept row-major in one flat buffer, `input_words()` words per row, and every
/// row has its bits beyond `u` cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearHash {
    l: usize,
    u: usize,
    seed: u64,
    rows: Vec<u64>,
}

impl LinearHash {
    /// Builds the matrix for `l` output bits and `u` input bits from `seed`.
    ///
    /// Rows are filled one after the other with uniform 64-bit words, then the
    /// last word of each row is masked down to `u` bits. Fails with
    /// [`Error::InvalidDimension`] before touching the generator if either
    /// dimension is zero.
    pub fn new(l: usize, u: usize, seed: u64) -> Result<Self> {
        if l == 0 || u == 0 {
            return Err(Error::InvalidDimension { l, u });
        }
        let in_words = words_for(u);
        let mut rng = seeded_rng(seed);
        let mut rows = vec![0u64; l * in_words];
        for row in rows.chunks_exact_mut(in_words) {
            for word in row.iter_mut() {
                *word = rng.next_u64();
            }
            mask_tail(row, u);
        }
        Ok(Self { l, u, seed, rows })
    }

    /// Output width in bits.
    pub fn l(&self) -> usize {
        self.l
    }

    /// Input width in bits.
    pub fn u(&self) -> usize {
        self.u
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Words per input vector, `ceil(u / 64)`.
    pub fn input_words(&self) -> usize {
        words_for(self.u)
    }

    /// Words per output vector, `ceil(l / 64)`.
    pub fn output_words(&self) -> usize {
        words_for(self.l)
    }

    /// Returns row `i` of the matrix, or `None` if `i >= l`.
    pub fn row(&self, i: usize) -> Option<&[u64]> {
        let w = self.input_words();
        self.rows.get(i * w..(i + 1) * w)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u64]> + '_ {
        self.rows.chunks_exact(self.input_words())
    }

    /// Computes `y = H x` over GF(2).
    ///
    /// `x` must hold exactly `input_words()` words, otherwise
    /// [`Error::ShapeMismatch`] is returned.
    pub fn hash(&self, x: &[u64]) -> Result<BitVec> {
        let mut y = BitVec::zeros(self.l);
        self.hash_into(x, y.words_mut())?;
        Ok(y)
    }

    /// Same as [`Self::hash`] but writes into a caller-provided buffer of
    /// `output_words()` words. The buffer is fully overwritten.
    pub fn hash_into(&self, x: &[u64], out: &mut [u64]) -> Result<()> {
        let in_words = self.input_words();
        if x.len() != in_words {
            return Err(Error::ShapeMismatch {
                expected: in_words,
                actual: x.len(),
            });
        }
        if out.len() != self.output_words() {
            return Err(Error::ShapeMismatch {
                expected: self.output_words(),
                actual: out.len(),
            });
        }

        out.fill(0);
        for (i, row) in self.rows.chunks_exact(in_words).enumerate() {
            // low bit of the summed popcounts is the parity of the dot product
            let parity = row
                .iter()
                .zip(x)
                .fold(0u32, |acc, (r, x)| acc ^ (r & x).count_ones())
                & 1;
            out[i / WORD_BITS] |= (parity as u64) << (i % WORD_BITS);
        }
        Ok(())
    }

    /// Hashes every vector of `xs`. Stops at the first malformed input.
    pub fn hash_batch<X: AsRef<[u64]>>(&self, xs: &[X]) -> Result<Vec<BitVec>> {
        xs.iter().map(|x| self.hash(x.as_ref())).collect()
    }

    /// Checks the shape of the matrix and that no row has a bit set beyond `u`.
    pub fn is_well_formed(&self) -> bool {
        self.l > 0
            && self.u > 0
            && self.rows.len() == self.l * self.input_words()
            && self.rows().all(|row| is_masked(row, self.u))
    }

    #[cfg(feature = "serde")]
    /// Serializes the matrix with bincode.
    /// the serde feature must be enabled
    pub fn save<W: std::io::Write>(&self, mut writer: W) -> std::io::Result<()> {
        bincode::serialize_into(&mut writer, &self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    #[cfg(feature = "serde")]
    /// Loads a matrix written by [`Self::save`], rejecting corrupted shapes and
    /// rows with bits set beyond `u`.
    /// the serde feature must be enabled
    pub fn load<R: std::io::Read>(mut reader: R) -> std::io::Result<Self> {
        let hash: LinearHash = bincode::deserialize_from(&mut reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        if !hash.is_well_formed() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Invalid LinearHash matrix!",
            ));
        }

        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn test_invalid_dimension() {
        assert_eq!(
            LinearHash::new(0, 8, 1),
            Err(Error::InvalidDimension { l: 0, u: 8 })
        );
        assert_eq!(
            LinearHash::new(4, 0, 1),
            Err(Error::InvalidDimension { l: 4, u: 0 })
        );
        assert!(LinearHash::new(1, 1, 1).is_ok());
    }

    #[test]
    fn test_rows_are_masked() {
        for u in [1, 7, 63, 64, 65, 100, 128, 200] {
            for seed in 0..8 {
                let h = LinearHash::new(13, u, seed).unwrap();
                assert_eq!(h.rows().count(), 13);
                assert!(h.rows().all(|row| row.len() == words_for(u)));
                assert!(h.rows().all(|row| is_masked(row, u)), "u = {u}");
                assert!(h.is_well_formed());
            }
        }
    }

    #[test]
    fn test_same_seed_same_matrix() {
        let a = LinearHash::new(20, 150, 42).unwrap();
        let b = LinearHash::new(20, 150, 42).unwrap();
        let c = LinearHash::new(20, 150, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_matrix_is_pinned() {
        let h = LinearHash::new(4, 8, 42).unwrap();
        let rows: Vec<u64> = h.rows().map(|row| row[0]).collect();
        assert_eq!(rows, vec![0x9b, 0x6f, 0x26, 0xb7]);
    }

    #[test]
    fn test_shape_mismatch() {
        let h = LinearHash::new(10, 100, 3).unwrap();
        assert_eq!(
            h.hash(&[1]),
            Err(Error::ShapeMismatch {
                expected: 2,
                actual: 1
            })
        );
        let mut out = [0u64; 2];
        assert!(h.hash_into(&[1, 2], &mut out).is_err());
    }

    #[test]
    fn test_zero_maps_to_zero() {
        let h = LinearHash::new(70, 130, 9).unwrap();
        let y = h.hash(&[0, 0, 0]).unwrap();
        assert!(y.is_zero());
        assert_eq!(y.width(), 70);
        assert_eq!(y.words().len(), 2);
    }

    #[test]
    fn test_unit_vector_selects_column() {
        let h = LinearHash::new(70, 100, 5).unwrap();
        for j in [0, 1, 63, 64, 99] {
            let mut x = BitVec::zeros(100);
            x.set(j);
            let y = h.hash(x.words()).unwrap();
            for i in 0..70 {
                let row = h.row(i).unwrap();
                let bit = (row[j / 64] >> (j % 64)) & 1 == 1;
                assert_eq!(y.get(i), bit, "row {i} column {j}");
            }
        }
    }

    #[test]
    fn test_linearity() {
        let mut rng = StdRng::seed_from_u64(42);
        let u = 150;
        let h = LinearHash::new(90, u, 11).unwrap();
        for _ in 0..100 {
            let mut a: Vec<u64> = (0..3).map(|_| rng.gen()).collect();
            let mut b: Vec<u64> = (0..3).map(|_| rng.gen()).collect();
            mask_tail(&mut a, u);
            mask_tail(&mut b, u);
            let sum: Vec<u64> = a.iter().zip(&b).map(|(x, y)| x ^ y).collect();

            let ha = h.hash(&a).unwrap();
            let hb = h.hash(&b).unwrap();
            let hs = h.hash(&sum).unwrap();
            let expected: Vec<u64> = ha.words().iter().zip(hb.words()).map(|(x, y)| x ^ y).collect();
            assert_eq!(hs.words(), expected.as_slice());
            assert!(is_masked(hs.words(), 90));
        }
    }

    #[test]
    fn test_hash_batch_matches_hash() {
        let mut rng = StdRng::seed_from_u64(7);
        let h = LinearHash::new(12, 40, 1).unwrap();
        let xs: Vec<Vec<u64>> = (0..50).map(|_| vec![rng.gen::<u64>() & 0xff_ffff_ffff]).collect();
        let ys = h.hash_batch(&xs).unwrap();
        assert_eq!(ys.len(), xs.len());
        for (x, y) in xs.iter().zip(&ys) {
            assert_eq!(&h.hash(x).unwrap(), y);
        }
        assert!(h.hash_batch(&[vec![0u64, 0]]).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_save_and_load() {
        let h = LinearHash::new(33, 77, 1234).unwrap();
        let mut buf = Vec::new();
        h.save(&mut buf).expect("Failed to save LinearHash");
        let loaded = LinearHash::load(buf.as_slice()).expect("Failed to load LinearHash");
        assert_eq!(h, loaded);

        let x = [0x1234_5678_9abc_def0, 0x1fff];
        assert_eq!(h.hash(&x), loaded.hash(&x));
    }
}
