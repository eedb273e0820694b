//! Input distributions over `F2^u`.
//!
//! A sampler owns its generator, seeded explicitly by the trial that uses it.
//! There is no process-wide generator anywhere in the crate.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bitvec::{mask_tail, words_for, BitVec, WORD_BITS};
use crate::error::{Error, Result};

/// Generator behind every hash matrix and every sampler.
pub type SeededRng = Pcg64Mcg;

pub fn seeded_rng(seed: u64) -> SeededRng {
    Pcg64Mcg::seed_from_u64(seed)
}

/// A source of `width`-bit input vectors.
pub trait Sampler {
    /// Width of the produced vectors in bits.
    fn width(&self) -> usize;

    /// Overwrites `out` (`ceil(width / 64)` words) with the next sample. Bits
    /// beyond `width` are left zero.
    fn sample_into(&mut self, out: &mut [u64]);

    fn sample(&mut self) -> BitVec {
        let mut v = BitVec::zeros(self.width());
        self.sample_into(v.words_mut());
        v
    }
}

/// Named input distribution.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Distribution {
    /// Uniform over all of `F2^u`.
    #[default]
    Uniform,
    /// Independent bits, each set with probability `p`.
    Bernoulli { p: f64 },
    /// Uniform over the vectors with exactly `weight` bits set.
    HammingWeight { weight: usize },
}

impl Distribution {
    /// Resolves a distribution by name and optional parameter.
    ///
    /// `"uniform"` takes no parameter, `"bernoulli"` needs `p` and
    /// `"hamming_weight"` needs the weight.
    pub fn parse(name: &str, param: Option<f64>) -> Result<Self> {
        match (name, param) {
            ("uniform", None) => Ok(Distribution::Uniform),
            ("bernoulli", Some(p)) => {
                let dist = Distribution::Bernoulli { p };
                dist.check_param()?;
                Ok(dist)
            }
            ("hamming_weight" | "Hamming_weight", Some(w)) => {
                if w < 0.0 || w.fract() != 0.0 || !w.is_finite() {
                    return Err(Error::InvalidParameter(format!(
                        "hamming weight must be a non-negative integer, got {w}"
                    )));
                }
                Ok(Distribution::HammingWeight { weight: w as usize })
            }
            ("uniform" | "bernoulli" | "hamming_weight" | "Hamming_weight", _) => Err(
                Error::InvalidParameter(format!("wrong parameter {param:?} for {name:?}")),
            ),
            _ => Err(Error::UnsupportedDistribution(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Distribution::Uniform => "uniform",
            Distribution::Bernoulli { .. } => "bernoulli",
            Distribution::HammingWeight { .. } => "hamming_weight",
        }
    }

    fn check_param(&self) -> Result<()> {
        match *self {
            Distribution::Bernoulli { p } if !(0.0..=1.0).contains(&p) => Err(
                Error::InvalidParameter(format!("p must be in [0, 1], got {p}")),
            ),
            _ => Ok(()),
        }
    }

    /// Checks that the distribution can produce `width`-bit vectors.
    pub fn validate(&self, width: usize) -> Result<()> {
        self.check_param()?;
        match *self {
            Distribution::HammingWeight { weight } if weight > width => {
                Err(Error::InvalidParameter(format!(
                    "hamming weight {weight} exceeds width {width}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Creates a sampler of `width`-bit vectors driven by a generator seeded
    /// with `seed`.
    pub fn sampler(&self, width: usize, seed: u64) -> Result<DistSampler> {
        self.validate(width)?;
        Ok(DistSampler {
            dist: *self,
            width,
            rng: seeded_rng(seed),
        })
    }
}

/// Accepts `uniform`, `bernoulli:<p>` and `hamming_weight:<w>`.
impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            None => Distribution::parse(s, None),
            Some((name, param)) => {
                let value = param.trim().parse::<f64>().map_err(|_| {
                    Error::InvalidParameter(format!("cannot parse parameter {param:?} of {name:?}"))
                })?;
                Distribution::parse(name, Some(value))
            }
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Uniform => write!(f, "uniform"),
            Distribution::Bernoulli { p } => write!(f, "bernoulli:{p}"),
            Distribution::HammingWeight { weight } => write!(f, "hamming_weight:{weight}"),
        }
    }
}

/// Sampler for a [`Distribution`], built by [`Distribution::sampler`].
#[derive(Debug, Clone)]
pub struct DistSampler {
    dist: Distribution,
    width: usize,
    rng: SeededRng,
}

impl DistSampler {
    pub fn distribution(&self) -> Distribution {
        self.dist
    }
}

impl Sampler for DistSampler {
    fn width(&self) -> usize {
        self.width
    }

    fn sample_into(&mut self, out: &mut [u64]) {
        debug_assert_eq!(out.len(), words_for(self.width));
        match self.dist {
            Distribution::Uniform => {
                for word in out.iter_mut() {
                    *word = self.rng.next_u64();
                }
                mask_tail(out, self.width);
            }
            Distribution::Bernoulli { p } => {
                out.fill(0);
                for i in 0..self.width {
                    if self.rng.gen_bool(p) {
                        out[i / WORD_BITS] |= 1 << (i % WORD_BITS);
                    }
                }
            }
            Distribution::HammingWeight { weight } => {
                out.fill(0);
                if weight == self.width {
                    out.fill(u64::MAX);
                    mask_tail(out, self.width);
                    return;
                }
                for i in rand::seq::index::sample(&mut self.rng, self.width, weight) {
                    out[i / WORD_BITS] |= 1 << (i % WORD_BITS);
                }
            }
        }
    }
}
