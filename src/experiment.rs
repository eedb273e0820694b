//! Tail-probability experiments on the max load.
//!
//! For `n = 2^l` buckets, the experiments count how often the max load of a
//! fixed input sample reaches `r * ln n / ln ln n` over many random hashes,
//! and put that next to the `1 / r^2` bound.

use std::f64::consts::LN_2;

use log::debug;
use rand::RngCore;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parallel::run_many;
use crate::sampler::{seeded_rng, Distribution};
use crate::trial::TrialConfig;
use crate::DEFAULT_CAPACITY;

/// `ceil(r * ln n / ln ln n)` with `n = 2^l`.
///
/// Needs `l >= 2`, below that `ln ln n` is not positive.
pub fn threshold(l: usize, r: f64) -> Result<u32> {
    if l < 2 {
        return Err(Error::InvalidParameter(format!(
            "threshold needs l >= 2, got {l}"
        )));
    }
    if !r.is_finite() || r < 0.0 {
        return Err(Error::InvalidParameter(format!(
            "r must be finite and non-negative, got {r}"
        )));
    }
    let ln_n = l as f64 * LN_2;
    Ok((r * ln_n / ln_n.ln()).ceil() as u32)
}

/// Max loads of `trials` hashes applied to the sample fixed by `template`.
///
/// The sampler seed of `template` is kept for every trial. Hash seeds are drawn
/// from a generator seeded with `seed`.
pub fn max_loads(
    template: &TrialConfig,
    trials: usize,
    seed: u64,
    num_threads: usize,
) -> Result<Vec<u32>> {
    if trials == 0 {
        return Err(Error::InvalidParameter("trials must be positive".into()));
    }
    let mut rng = seeded_rng(seed);
    let configs: Vec<TrialConfig> = (0..trials)
        .map(|_| {
            template
                .clone()
                .with_seeds(template.seed_sampler, rng.next_u64())
        })
        .collect();
    run_many(&configs, num_threads)
}

/// Fraction of `loads` at or above `threshold`.
pub fn exceed_fraction(loads: &[u32], threshold: u32) -> f64 {
    if loads.is_empty() {
        return 0.0;
    }
    loads.iter().filter(|&&load| load >= threshold).count() as f64 / loads.len() as f64
}

/// Estimates `P[max load >= threshold(l, r)]` over `trials` random hashes.
pub fn tail_probability(
    template: &TrialConfig,
    trials: usize,
    seed: u64,
    r: f64,
    num_threads: usize,
) -> Result<f64> {
    let t = threshold(template.l, r)?;
    let loads = max_loads(template, trials, seed, num_threads)?;
    Ok(exceed_fraction(&loads, t))
}

/// A sweep over input widths, output widths and threshold factors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridConfig {
    pub u_values: Vec<usize>,
    pub l_values: Vec<usize>,
    pub r_values: Vec<f64>,
    /// Inputs per bucket, `m = floor(m_factor * 2^l)`.
    pub m_factor: f64,
    pub trials: usize,
    pub distribution: Distribution,
    pub k: usize,
    pub seed: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            u_values: vec![200],
            l_values: vec![20],
            r_values: vec![6.0, 7.0, 8.0],
            m_factor: 1.4,
            trials: 1000,
            distribution: Distribution::Uniform,
            k: DEFAULT_CAPACITY,
            seed: 123,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        if self.u_values.is_empty() || self.l_values.is_empty() || self.r_values.is_empty() {
            return Err(Error::InvalidParameter("empty grid axis".into()));
        }
        if !self.m_factor.is_finite() || self.m_factor < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "m_factor must be finite and non-negative, got {}",
                self.m_factor
            )));
        }
        if self.trials == 0 {
            return Err(Error::InvalidParameter("trials must be positive".into()));
        }
        for &l in &self.l_values {
            // every l needs a threshold, and m must fit the counters
            threshold(l, 1.0)?;
            if self.inputs_for(l) > u32::MAX as u64 {
                return Err(Error::InvalidParameter(format!(
                    "m = {} * 2^{l} is too large",
                    self.m_factor
                )));
            }
        }
        for &r in &self.r_values {
            threshold(2, r)?;
        }
        Ok(())
    }

    /// Sample size for output width `l`.
    pub fn inputs_for(&self, l: usize) -> u64 {
        (self.m_factor * (l as f64).exp2()).floor() as u64
    }
}

/// One cell of a grid result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridPoint {
    pub u: usize,
    pub l: usize,
    pub m: u64,
    pub r: f64,
    pub threshold: u32,
    /// Observed fraction of trials reaching the threshold.
    pub p_hat: f64,
    /// `1 / r^2`.
    pub theory: f64,
}

/// Runs the sweep described by `cfg`.
///
/// Each `(u, l)` pair gets one fixed input sample and one batch of `trials`
/// hashes; the batch is shared by every `r`.
pub fn run_grid(cfg: &GridConfig, num_threads: usize) -> Result<Vec<GridPoint>> {
    cfg.validate()?;
    let mut rng = seeded_rng(cfg.seed);
    let mut points = Vec::with_capacity(cfg.u_values.len() * cfg.l_values.len() * cfg.r_values.len());

    for &u in &cfg.u_values {
        for &l in &cfg.l_values {
            let m = cfg.inputs_for(l);
            let template = TrialConfig::new(u, l, m)
                .with_seeds(rng.next_u64(), 0)
                .with_capacity(cfg.k)
                .with_distribution(cfg.distribution);
            debug!(
                "grid cell u={u} l={l} m={m} dist={}: {} trials",
                cfg.distribution, cfg.trials
            );
            let loads = max_loads(&template, cfg.trials, rng.next_u64(), num_threads)?;

            for &r in &cfg.r_values {
                let t = threshold(l, r)?;
                points.push(GridPoint {
                    u,
                    l,
                    m,
                    r,
                    threshold: t,
                    p_hat: exceed_fraction(&loads, t),
                    theory: if r > 0.0 { 1.0 / (r * r) } else { f64::INFINITY },
                });
            }
        }
    }
    Ok(points)
}
