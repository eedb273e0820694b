/// Errors raised by hash construction, trial validation and batch dispatch.
///
/// Every variant is detected synchronously at the violated precondition. None of
/// them is transient, so nothing in the crate retries.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid dimension: l = {l}, u = {u} (both must be positive)")]
    InvalidDimension { l: usize, u: usize },

    #[error("shape mismatch: expected {expected} words, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("invalid trial config: {0}")]
    InvalidConfig(&'static str),

    #[error("seed sequences differ in length: {seeds_sampler} sampler seeds, {seeds_hash} hash seeds")]
    ConfigMismatch {
        seeds_sampler: usize,
        seeds_hash: usize,
    },

    #[error("unsupported distribution: {0:?}")]
    UnsupportedDistribution(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, Error>;
