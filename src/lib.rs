// Max-load estimation for random linear hashes over GF(2).
// The counter is the Space-Saving algorithm of Metwally, Agrawal and El Abbadi,
// "Efficient Computation of Frequent and Top-k Elements in Data Streams".

//! Monte Carlo estimation of the max load of random linear hash functions.
//!
//! A trial draws `m` inputs from `F2^u`, maps them through a random `l x u`
//! bit matrix and reports the largest bucket. Output spaces of `2^l` buckets
//! are usually far too large for an exact table, so buckets are folded into
//! 64-bit keys and counted by a Space-Saving counter of bounded capacity.
//!
//! ```
//! use maxload::{run_trial, run_trials, TrialConfig};
//!
//! let cfg = TrialConfig::new(8, 4, 1000).with_seeds(7, 42).with_capacity(10);
//! let load = run_trial(&cfg).unwrap();
//! assert!((1..=1000).contains(&load));
//!
//! let loads = run_trials(8, 4, 1000, "uniform", &[1, 2, 3], &[42, 42, 42], 10, 0).unwrap();
//! assert_eq!(loads.len(), 3);
//! ```

#[cfg(feature = "python")]
mod python;
#[cfg(feature = "python")]
pub use python::*;

mod bitvec;
mod error;
mod experiment;
mod fingerprint;
mod linear;
mod parallel;
mod sampler;
mod space_saving;
mod trial;

pub use bitvec::{is_masked, words_for, BitVec};
pub use error::{Error, Result};
pub use experiment::{
    exceed_fraction, max_loads, run_grid, tail_probability, threshold, GridConfig, GridPoint,
};
pub use fingerprint::{fingerprint, mix64, Fingerprinter, SplitMixFold, Xxh3Fingerprint};
pub use linear::LinearHash;
pub use parallel::{resolve_threads, run_many, run_trials};
pub use sampler::{seeded_rng, DistSampler, Distribution, Sampler, SeededRng};
pub use space_saving::{Entry, SpaceSaving};
pub use trial::{exact_max_load, run_trial, run_trial_exact, run_trial_with, TrialConfig};

/// Default capacity of the Space-Saving counter in a trial.
pub const DEFAULT_CAPACITY: usize = 50_000;
