//! This crate reports latency percentiles for parallel benchmarks.
//!
//! Averages hide tails. When many workers hammer the same code at once the
//! interesting number is often P99 rather than the mean, and finding it means
//! looking at every iteration's latency without storing every iteration or
//! slowing the iterations down to look at them.
//!
//! The pieces, from the bottom up:
//!
//! * [`Ckms`], a streaming summary answering declared quantiles within a
//!   declared rank error in bounded memory, and [`Exact`], which keeps
//!   everything and serves as a reference.
//! * [`ConcurrentSampler`], which gives each worker a private shard so that
//!   recording a latency takes no lock, and times iterations from one clock
//!   read per boundary.
//! * [`PercentileReporter`], which merges the shards once the workers are
//!   done and scales each percentile to the benchmark's iteration count.
//! * [`ParallelBench`], a minimal driver tying the three together.
//!
//! ```
//! use parbench::{Config, ParallelBench};
//!
//! let config = Config::default().percentile(0.5).percentile(0.99).parallelism(2);
//! let report = ParallelBench::new("BenchmarkNoop", config)
//!     .run(10_000, || ())
//!     .unwrap();
//! print!("{}", report.render("BenchmarkNoop", 20));
//! ```
#![deny(missing_docs, missing_copy_implementations, missing_debug_implementations,
        unstable_features, unused_import_braces)]

pub mod ckms;
pub mod config;
pub mod error;
pub mod exact;
pub mod harness;
pub mod reporter;
pub mod sampler;
pub mod summary;
pub mod target;
#[doc(hidden)]
pub mod util;

pub use crate::ckms::Ckms;
pub use crate::config::{Config, Percentile};
pub use crate::error::{Error, Result};
pub use crate::exact::Exact;
pub use crate::harness::{Iterations, IterationBudget, ParallelBench};
pub use crate::reporter::{PercentileReporter, PercentileResult, Phase, Report};
pub use crate::sampler::{Clock, ConcurrentSampler, MonotonicClock, WorkerHandle};
pub use crate::summary::{Sample, Summary};
pub use crate::target::{Target, Targets};
