//! The seam between a benchmark harness and the sampler.
//!
//! A harness owns iteration: it decides how many iterations run and which
//! worker runs each one. The sampler only needs to ask, at every boundary,
//! whether another iteration is available. [`Iterations`] is that question.
//! [`ParallelBench`] is a small driver built on it for callers without a
//! harness of their own.
use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::ckms::Ckms;
use crate::config::{Config, Percentile};
use crate::error::Result;
use crate::reporter::{PercentileReporter, Report};

/// The harness's answer to "is there another iteration?"
pub trait Iterations {
    /// Claim the next iteration, if any remain.
    fn next(&mut self) -> bool;
}

impl<F> Iterations for F
where
    F: FnMut() -> bool,
{
    #[inline]
    fn next(&mut self) -> bool {
        self()
    }
}

/// Largest number of iterations a worker claims at once.
const MAX_GRAIN: usize = 10_000;

/// A fixed number of iterations shared among workers
///
/// Workers claim iterations in grains so the shared counter is touched once
/// per grain rather than once per iteration. Every iteration is claimed by
/// exactly one worker.
#[derive(Debug)]
pub struct IterationBudget {
    total: usize,
    grain: usize,
    claimed: AtomicUsize,
}

impl IterationBudget {
    /// A budget of `total` iterations for `workers` workers.
    pub fn new(total: usize, workers: usize) -> IterationBudget {
        // about a hundred claims per worker
        let grain = total / (workers.max(1) * 100);
        IterationBudget {
            total,
            grain: grain.max(1).min(MAX_GRAIN),
            claimed: AtomicUsize::new(0),
        }
    }

    /// Total iterations in the budget.
    pub fn total(&self) -> usize {
        self.total
    }

    /// A worker's view of the budget.
    pub fn iter(&self) -> BudgetIter<'_> {
        BudgetIter {
            budget: self,
            cached: 0,
        }
    }

    fn claim(&self) -> usize {
        let end = self.claimed.fetch_add(self.grain, Ordering::Relaxed) + self.grain;
        if end <= self.total {
            self.grain
        } else if end < self.total + self.grain {
            self.total + self.grain - end
        } else {
            // keep the counter from creeping toward overflow
            self.claimed.fetch_sub(self.grain, Ordering::Relaxed);
            0
        }
    }
}

/// Iterations claimed from an [`IterationBudget`] by one worker.
#[derive(Debug)]
pub struct BudgetIter<'a> {
    budget: &'a IterationBudget,
    cached: usize,
}

impl<'a> Iterations for BudgetIter<'a> {
    #[inline]
    fn next(&mut self) -> bool {
        if self.cached == 0 {
            self.cached = self.budget.claim();
            if self.cached == 0 {
                return false;
            }
        }
        self.cached -= 1;
        true
    }
}

/// Runs a body in parallel and reports latency percentiles for it
///
/// ```
/// use parbench::{Config, ParallelBench};
///
/// let mut bench = ParallelBench::new("sum", Config::default().parallelism(2));
/// bench.report_percentile(0.5).report_percentile(0.99);
/// let report = bench.run(1_000, || {
///     std::hint::black_box((0..100u64).sum::<u64>());
/// }).unwrap();
/// assert_eq!(report.lines().len(), 2);
/// assert_eq!(report.lines()[0].iterations, 1_000);
/// ```
#[derive(Debug, Clone)]
pub struct ParallelBench {
    name: String,
    config: Config,
}

impl ParallelBench {
    /// A benchmark called `name`.
    pub fn new<N: Into<String>>(name: N, config: Config) -> ParallelBench {
        ParallelBench {
            name: name.into(),
            config,
        }
    }

    /// The benchmark's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration runs will use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Declare one more percentile to report, at the default rank error.
    pub fn report_percentile(&mut self, phi: f64) -> &mut ParallelBench {
        self.config.percentiles.push(Percentile { phi, epsilon: None });
        self
    }

    /// Run `iterations` calls of `body` spread over the configured number of
    /// threads, timing each call
    ///
    /// A panic in `body` propagates once every thread has stopped.
    pub fn run<F>(&self, iterations: usize, body: F) -> Result<Report>
    where
        F: Fn() + Sync,
    {
        self.config.validate()?;
        let workers = self.config.parallelism;
        let mut reporter: PercentileReporter<Ckms<Duration>> = PercentileReporter::new(&self.config)?;
        let budget = IterationBudget::new(iterations, workers);
        tracing::debug!(name = %self.name, iterations, workers, "starting parallel run");

        let sampler = reporter.start()?;
        let outcome = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let (budget, body) = (&budget, &body);
                    s.spawn(move || -> Result<usize> {
                        let mut worker = sampler.begin(budget.iter())?;
                        while worker.next() {
                            body();
                        }
                        Ok(worker.finish())
                    })
                })
                .collect();
            let mut outcome = Ok(0);
            for handle in handles {
                match handle.join() {
                    Ok(Ok(recorded)) => {
                        if let Ok(total) = outcome.as_mut() {
                            *total += recorded;
                        }
                    }
                    Ok(Err(err)) => outcome = Err(err),
                    Err(payload) => panic::resume_unwind(payload),
                }
            }
            outcome
        });
        let recorded = outcome?;
        tracing::debug!(name = %self.name, recorded, "parallel run finished");

        reporter.merge()?;
        reporter.report(iterations)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn closures_are_iterations() {
        let mut left = 3;
        let mut it = move || {
            left -= 1;
            left >= 0
        };
        assert!(Iterations::next(&mut it));
        assert!(Iterations::next(&mut it));
        assert!(Iterations::next(&mut it));
        assert!(!Iterations::next(&mut it));
    }

    #[test]
    fn budget_hands_out_every_iteration_once() {
        fn inner(total: u16, workers: u8) -> bool {
            let total = usize::from(total);
            let workers = usize::from(workers % 8) + 1;
            let budget = IterationBudget::new(total, workers);
            let mut iters: Vec<_> = (0..workers).map(|_| budget.iter()).collect();
            let mut seen = 0;
            // interleave the workers one claim at a time
            loop {
                let mut progressed = false;
                for it in iters.iter_mut() {
                    if it.next() {
                        seen += 1;
                        progressed = true;
                    }
                }
                if !progressed {
                    break;
                }
            }
            seen == total
        }
        quickcheck::QuickCheck::new().quickcheck(inner as fn(u16, u8) -> bool);
    }

    #[test]
    fn empty_budget_yields_nothing() {
        let budget = IterationBudget::new(0, 4);
        assert!(!budget.iter().next());
        assert_eq!(budget.total(), 0);
    }

    #[test]
    fn run_calls_body_once_per_iteration() {
        let calls = AtomicUsize::new(0);
        let mut bench = ParallelBench::new("count", Config::default().parallelism(3).batch_size(7));
        bench.report_percentile(0.5);
        let report = bench
            .run(5_000, || {
                calls.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 5_000);
        assert_eq!(report.lines().len(), 1);
        assert_eq!(report.lines()[0].label, "P50-3");
    }

    #[test]
    fn run_without_percentiles_fails() {
        let bench = ParallelBench::new("none", Config::default());
        assert!(bench.run(10, || ()).is_err());
    }

    #[test]
    #[should_panic(expected = "body failed")]
    fn run_propagates_body_panics() {
        let mut bench = ParallelBench::new("boom", Config::default().parallelism(2));
        bench.report_percentile(0.5);
        let _ = bench.run(100, || panic!("body failed"));
    }
}
