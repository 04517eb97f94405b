//! Error kinds surfaced by summaries, the sampler and the reporter.

/// Errors returned by this crate.
///
/// `Config` and `ContractViolation` indicate misuse and should be surfaced to
/// whoever wired the benchmark together. `Empty` is an ordinary run
/// condition: the reporter skips the affected percentile and carries on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A target or configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The quantile was not declared when the summary was built.
    #[error("quantile {phi} was not declared for this summary")]
    Query {
        /// The rejected quantile.
        phi: f64,
    },
    /// The summary has not seen any samples.
    #[error("no samples have been recorded")]
    Empty,
    /// The caller broke the usage contract of a summary, sampler or reporter.
    #[error("contract violation: {0}")]
    ContractViolation(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
