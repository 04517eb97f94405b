//! 'exact' keeps every sample and sorts on query.
//!
//! Storage grows linearly with the number of samples, so this is only fit for
//! short runs or as a reference to check approximate summaries against. It
//! answers the same declared-quantile contract as [`crate::Ckms`] with no rank
//! error at all.
use std::cmp;

use crate::error::{Error, Result};
use crate::summary::{Sample, Summary};
use crate::target::Targets;

/// A summary retaining every sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Exact<T> {
    targets: Targets,
    samples: Vec<T>,
}

impl<T> Exact<T>
where
    T: Sample,
{
    /// Create a new Exact summary answering `(phi, epsilon)` targets
    ///
    /// The ε of each target is validated but otherwise unused.
    pub fn new<I>(targets: I) -> Result<Exact<T>>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        Ok(Exact::with_targets(Targets::new(targets)?))
    }
}

impl<T> Summary<T> for Exact<T>
where
    T: Sample,
{
    fn with_targets(targets: Targets) -> Exact<T> {
        Exact {
            targets,
            samples: Vec::new(),
        }
    }

    fn targets(&self) -> &Targets {
        &self.targets
    }

    fn insert(&mut self, v: T) -> Result<()> {
        if !v.is_comparable() {
            return Err(Error::ContractViolation("sample cannot be ordered"));
        }
        self.samples.push(v);
        Ok(())
    }

    /// The sample of rank `ceil(phi * n)`, the minimum for φ of 0. The
    /// minimum and maximum are answered whether declared or not.
    fn query(&self, phi: f64) -> Result<T> {
        if !self.targets.answers(phi) {
            return Err(Error::Query { phi });
        }
        if self.samples.is_empty() {
            return Err(Error::Empty);
        }
        let n = self.samples.len();
        let rank = (phi * n as f64).ceil() as usize;
        let idx = cmp::min(rank.saturating_sub(1), n - 1);

        let mut sorted = self.samples.clone();
        let (_, v, _) = sorted.select_nth_unstable_by(idx, |a, b| {
            a.partial_cmp(b).unwrap_or(cmp::Ordering::Equal)
        });
        Ok(*v)
    }

    fn count(&self) -> usize {
        self.samples.len()
    }

    fn merge(mut self, other: Exact<T>) -> Exact<T> {
        self.targets = self.targets.union(&other.targets);
        self.samples.extend(other.samples);
        self
    }
}
