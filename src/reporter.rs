//! End-of-run merging and percentile reporting.
//!
//! A reporter walks one run through its phases, strictly forward:
//!
//! ```text
//! Idle -> Sampling -> Merging -> Reported
//! ```
//!
//! Workers record only while the reporter is `Sampling`. `merge` closes the
//! sampler, which fails while any worker is still active, and folds every
//! shard into one summary. Only then can percentiles be read.
use std::fmt;
use std::time::Duration;

use crate::ckms::Ckms;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sampler::{Clock, ConcurrentSampler, MonotonicClock};
use crate::summary::Summary;

/// Where a run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Configured, nothing sampled yet.
    Idle,
    /// Workers are recording into their shards.
    Sampling,
    /// Shards are being combined.
    Merging,
    /// The merged summary is ready to be read.
    Reported,
}

/// One reported percentile.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileResult {
    /// `P<percent>`, suffixed with `-<workers>` when more than one worker ran.
    pub label: String,
    /// The quantile reported.
    pub phi: f64,
    /// Estimated latency of a single operation at this percentile.
    pub per_op: Duration,
    /// Iteration count the result is scaled to.
    pub iterations: usize,
    /// `per_op` repeated `iterations` times, saturating.
    pub total: Duration,
}

impl PercentileResult {
    fn new(phi: f64, workers: usize, per_op: Duration, iterations: usize) -> PercentileResult {
        PercentileResult {
            label: label(phi, workers),
            phi,
            per_op,
            iterations,
            total: scale(per_op, iterations),
        }
    }

    /// Whole nanoseconds per operation, recovered from the scaled total.
    pub fn ns_per_op(&self) -> u128 {
        if self.iterations == 0 {
            0
        } else {
            self.total.as_nanos() / self.iterations as u128
        }
    }

    fn measurements(&self) -> String {
        format!("{:8}\t{:10} ns/op", self.iterations, self.ns_per_op())
    }
}

impl fmt::Display for PercentileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.label, self.measurements())
    }
}

/// Every percentile a run produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    lines: Vec<PercentileResult>,
    skipped: Vec<f64>,
}

impl Report {
    /// Results in declared order.
    pub fn lines(&self) -> &[PercentileResult] {
        &self.lines
    }

    /// Declared percentiles that could not be answered.
    pub fn skipped(&self) -> &[f64] {
        &self.skipped
    }

    /// Benchmark-style lines, `name/label` left aligned to `width`
    pub fn render(&self, name: &str, width: usize) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let full = format!("{}/{}", name, line.label);
            out.push_str(&format!("{:<width$}\t{}\n", full, line.measurements(), width = width));
        }
        out
    }
}

/// Collects shards from a [`ConcurrentSampler`] and reports percentiles over
/// their union.
#[derive(Debug)]
pub struct PercentileReporter<S = Ckms<Duration>, C = MonotonicClock> {
    phis: Vec<f64>,
    workers: usize,
    phase: Phase,
    sampler: ConcurrentSampler<S, C>,
    merged: Option<S>,
}

impl<S> PercentileReporter<S, MonotonicClock>
where
    S: Summary<Duration>,
{
    /// A reporter for the percentiles declared in `config`.
    pub fn new(config: &Config) -> Result<PercentileReporter<S, MonotonicClock>> {
        PercentileReporter::with_clock(config, MonotonicClock)
    }
}

impl<S, C> PercentileReporter<S, C>
where
    S: Summary<Duration>,
    C: Clock,
{
    /// A reporter whose workers read time from `clock`.
    pub fn with_clock(config: &Config, clock: C) -> Result<PercentileReporter<S, C>> {
        config.validate()?;
        let sampler = ConcurrentSampler::with_clock(config.targets()?, clock)
            .batch_size(config.batch_size)
            .expect_workers(config.parallelism);
        Ok(PercentileReporter {
            phis: config.phis(),
            workers: config.parallelism,
            phase: Phase::Idle,
            sampler,
            merged: None,
        })
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn transition(&mut self, from: Phase, to: Phase) -> Result<()> {
        if self.phase != from {
            return Err(Error::ContractViolation("reporter phase out of order"));
        }
        tracing::debug!(?from, ?to, "reporter phase change");
        self.phase = to;
        Ok(())
    }

    /// Open sampling and hand out the sampler workers begin on.
    pub fn start(&mut self) -> Result<&ConcurrentSampler<S, C>> {
        self.transition(Phase::Idle, Phase::Sampling)?;
        Ok(&self.sampler)
    }

    /// Close sampling and combine every worker's shard
    ///
    /// Fails with [`Error::ContractViolation`] if sampling has not started or
    /// workers are still active. In the latter case sampling stays open.
    pub fn merge(&mut self) -> Result<()> {
        if self.phase != Phase::Sampling {
            return Err(Error::ContractViolation("reporter phase out of order"));
        }
        let shards = self.sampler.drain()?;
        self.transition(Phase::Sampling, Phase::Merging)?;

        let count = shards.len();
        let merged = shards
            .into_iter()
            .fold(None, |acc: Option<S>, shard| match acc {
                None => Some(shard),
                Some(acc) => Some(acc.merge(shard)),
            })
            .unwrap_or_else(|| S::with_targets(self.sampler.targets().clone()));
        tracing::debug!(shards = count, samples = merged.count(), "merged shards");

        self.merged = Some(merged);
        self.transition(Phase::Merging, Phase::Reported)
    }

    fn merged(&self) -> Result<&S> {
        match (self.phase, self.merged.as_ref()) {
            (Phase::Reported, Some(merged)) => Ok(merged),
            _ => Err(Error::ContractViolation("percentiles read before merging")),
        }
    }

    /// The merged φ-quantile latency.
    pub fn query(&self, phi: f64) -> Result<Duration> {
        self.merged()?.query(phi)
    }

    /// Samples in the merged summary.
    pub fn count(&self) -> Result<usize> {
        Ok(self.merged()?.count())
    }

    /// Every declared percentile, scaled to `iterations`
    ///
    /// A percentile that cannot be answered is logged and left out of the
    /// report's lines; the rest still report.
    pub fn report(&self, iterations: usize) -> Result<Report> {
        let merged = self.merged()?;
        let mut report = Report::default();
        for &phi in &self.phis {
            match merged.query(phi) {
                Ok(per_op) => report
                    .lines
                    .push(PercentileResult::new(phi, self.workers, per_op, iterations)),
                Err(err) => {
                    tracing::warn!(phi, %err, "skipping percentile");
                    report.skipped.push(phi);
                }
            }
        }
        Ok(report)
    }
}

/// The label a percentile reports under, `P99.9` or `P50-8`.
///
/// The percent is printed with five significant digits and padded to at
/// least two characters, so P5 reads `P05`. The worker count is appended
/// only when more than one worker ran.
pub fn label(phi: f64, workers: usize) -> String {
    let mut label = format!("P{:0>2}", significant(phi * 100.0, 5));
    if workers > 1 {
        label.push_str(&format!("-{}", workers));
    }
    label
}

// `%g` style: fixed notation for moderate exponents, scientific otherwise,
// trailing zeros dropped either way.
fn significant(v: f64, digits: usize) -> String {
    if v == 0.0 || !v.is_finite() {
        return format!("{}", v);
    }
    let sci = format!("{:.*e}", digits - 1, v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= digits as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (digits as i32 - 1 - exp).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, v)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn scale(per_op: Duration, iterations: usize) -> Duration {
    let nanos = per_op.as_nanos().saturating_mul(iterations as u128);
    if nanos > u128::from(u64::MAX) {
        Duration::from_nanos(u64::MAX)
    } else {
        Duration::from_nanos(nanos as u64)
    }
}
