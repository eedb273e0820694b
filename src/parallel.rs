//! Fan-out of independent trials over a scoped worker pool.
//!
//! Workers claim trial indices from one shared atomic counter. Each index is
//! handed out exactly once, so each result slot has exactly one writer and the
//! result array needs no lock.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::sampler::Distribution;
use crate::trial::{run_trial, TrialConfig};

/// Number of workers for a requested thread count. `0` means one per available
/// hardware thread.
pub fn resolve_threads(num_threads: usize) -> usize {
    if num_threads > 0 {
        return num_threads;
    }
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Runs every config and returns the results in input order.
///
/// All configs are validated before any worker is spawned, so a malformed
/// batch does no work at all. `result[i]` is always `run_trial(&configs[i])`,
/// whatever the thread count or schedule.
pub fn run_many(configs: &[TrialConfig], num_threads: usize) -> Result<Vec<u32>> {
    for cfg in configs {
        cfg.validate()?;
    }
    if configs.is_empty() {
        return Ok(Vec::new());
    }

    let workers = resolve_threads(num_threads).min(configs.len());
    debug!(
        "dispatching {} trials over {} worker threads",
        configs.len(),
        workers
    );

    let next = AtomicUsize::new(0);
    let slots: Vec<AtomicU32> = configs.iter().map(|_| AtomicU32::new(0)).collect();
    let failure: Mutex<Option<(usize, Error)>> = Mutex::new(None);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                if i >= configs.len() {
                    break;
                }
                match run_trial(&configs[i]) {
                    Ok(load) => {
                        trace!("trial {i} finished with max load {load}");
                        slots[i].store(load, Ordering::Relaxed);
                    }
                    Err(e) => record_failure(&failure, i, e),
                }
            });
        }
    });

    // the scope joined every worker, so all stores are visible here
    let failure = failure.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some((_, e)) = failure {
        return Err(e);
    }
    Ok(slots.into_iter().map(AtomicU32::into_inner).collect())
}

/// Keeps the failure with the lowest trial index.
fn record_failure(failure: &Mutex<Option<(usize, Error)>>, index: usize, error: Error) {
    let mut slot = failure.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if slot.as_ref().map_or(true, |(first, _)| index < *first) {
        *slot = Some((index, error));
    }
}

/// Runs one trial per seed pair, all sharing `(u, l, m, distribution, k)`.
///
/// `seeds_sampler[i]` and `seeds_hash[i]` seed trial `i`. Fails with
/// [`Error::ConfigMismatch`] if the two slices differ in length and with
/// [`Error::UnsupportedDistribution`] for an unknown distribution name, both
/// before any trial starts.
#[allow(clippy::too_many_arguments)]
pub fn run_trials(
    u: usize,
    l: usize,
    m: u64,
    distribution: &str,
    seeds_sampler: &[u64],
    seeds_hash: &[u64],
    k: usize,
    num_threads: usize,
) -> Result<Vec<u32>> {
    if seeds_sampler.len() != seeds_hash.len() {
        return Err(Error::ConfigMismatch {
            seeds_sampler: seeds_sampler.len(),
            seeds_hash: seeds_hash.len(),
        });
    }
    let distribution: Distribution = distribution.parse()?;
    let template = TrialConfig::new(u, l, m)
        .with_capacity(k)
        .with_distribution(distribution);
    let configs: Vec<TrialConfig> = seeds_sampler
        .iter()
        .zip(seeds_hash)
        .map(|(&s, &h)| template.clone().with_seeds(s, h))
        .collect();
    run_many(&configs, num_threads)
}
