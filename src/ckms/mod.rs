//! A streaming summary answering targeted quantiles in bounded memory.
//!
//! This follows Cormode, Korn, Muthukrishnan and Srivastava's "Effective
//! Computation of Biased Quantiles over Data Streams", in the targeted form:
//! each declared (φ, ε) pair supplies its own band (see [`crate::target`]) and
//! the summary keeps the pointwise tightest. Tail quantiles such as P99 can so
//! be held to a much smaller absolute error than the median without paying
//! that precision across the whole rank space.
//!
//! The paper's targeted variant is flawed as published. The band used here is
//! a corrected one whose flat region around each target is wide enough for
//! the query guarantee to follow from the Greenwald-Khanna argument: a query
//! for a declared φ over `n` samples returns a value whose rank is within
//! `εn` of `φn`, plus at most one rank when `εn < 1`.
use std::cmp;
use std::ops::AddAssign;

mod entry;
mod store;

use self::store::Store;
use crate::error::{Error, Result};
use crate::summary::{Sample, Summary};
use crate::target::Targets;

/// A structure to provide approximate quantiles queries in bounded memory and
/// with bounded error.
#[derive(Clone, PartialEq, Debug)]
pub struct Ckms<T> {
    targets: Targets,

    // Compression is amortised: it runs once every compress_threshold
    // insertions, floor(1 / 2ε) for the tightest ε declared.
    compress_threshold: usize,
    inserts: usize,

    samples: Store<T>,
}

fn compress_threshold(targets: &Targets) -> usize {
    let threshold = 1.0 / (2.0 * targets.tightest());
    cmp::max(1, threshold as usize)
}

impl<T> Ckms<T>
where
    T: Sample,
{
    /// Create a new Ckms
    ///
    /// Each `(phi, epsilon)` pair declares a quantile the summary will answer
    /// and the rank error acceptable for it. Fails with
    /// [`Error::Config`] if any φ falls outside `[0, 1]`, any ε outside
    /// `(0, 1)`, or no pairs are given.
    ///
    /// # Examples
    /// ```
    /// use parbench::{Ckms, Summary};
    ///
    /// let mut ckms = Ckms::<u32>::new(vec![(0.5, 0.01), (0.99, 0.001)]).unwrap();
    /// for i in 1..1001 {
    ///     ckms.insert(i).unwrap();
    /// }
    /// assert_eq!(ckms.query(0.75).is_err(), true); // not declared
    /// assert_eq!(ckms.query(0.0), Ok(1));
    /// let p99 = ckms.query(0.99).unwrap();
    /// assert!(p99 >= 988 && p99 <= 992);
    ///
    /// assert!(Ckms::<u32>::new(vec![(1.5, 0.01)]).is_err());
    /// ```
    pub fn new<I>(targets: I) -> Result<Ckms<T>>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        Ok(Ckms::with_targets(Targets::new(targets)?))
    }

    /// Number of entries currently stored
    ///
    /// This is the memory footprint of the summary and fluctuates as
    /// compression happens. See [`Summary::count`] for the number of samples
    /// seen.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Merge away redundant entries now rather than at the next threshold.
    pub fn compress(&mut self) {
        let before = self.samples.len();
        self.samples.compress(&self.targets);
        self.inserts = 0;
        tracing::trace!(before, after = self.samples.len(), "compressed summary");
    }

    fn note_inserts(&mut self, count: usize) {
        self.inserts += count;
        if self.inserts >= self.compress_threshold {
            self.compress();
        }
    }
}

impl<T> Summary<T> for Ckms<T>
where
    T: Sample,
{
    fn with_targets(targets: Targets) -> Ckms<T> {
        Ckms {
            compress_threshold: compress_threshold(&targets),
            targets,
            inserts: 0,
            samples: Store::new(),
        }
    }

    fn targets(&self) -> &Targets {
        &self.targets
    }

    /// Insert a sample into the Ckms
    ///
    /// This implementation is biased toward fast writes and slower queries.
    /// Storage grows gradually but remains bounded.
    fn insert(&mut self, v: T) -> Result<()> {
        if !v.is_comparable() {
            return Err(Error::ContractViolation("sample cannot be ordered"));
        }
        self.samples.insert(v);
        self.note_inserts(1);
        Ok(())
    }

    /// Insert a batch of samples in one pass
    ///
    /// The batch is sorted in place first. If any value cannot be ordered the
    /// whole batch is rejected and the summary is left untouched.
    fn insert_batch(&mut self, values: &mut [T]) -> Result<()> {
        if values.iter().any(|v| !v.is_comparable()) {
            return Err(Error::ContractViolation("sample cannot be ordered"));
        }
        values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(cmp::Ordering::Equal));
        self.samples.insert_sorted(values);
        self.note_inserts(values.len());
        Ok(())
    }

    /// Query Ckms for a declared quantile
    ///
    /// The minimum and maximum, φ of 0.0 and 1.0 respectively, are always
    /// known precisely and answered whether declared or not.
    fn query(&self, phi: f64) -> Result<T> {
        if !self.targets.answers(phi) {
            return Err(Error::Query { phi });
        }
        self.samples.query(phi).ok_or(Error::Empty)
    }

    fn count(&self) -> usize {
        self.samples.count()
    }

    /// Merge two summaries
    ///
    /// The result answers the union of both target sets, with the looser ε
    /// where they overlap. When both sides saw the same workload, as shards
    /// of one benchmark do, the merged answers hold to that ε.
    fn merge(self, other: Ckms<T>) -> Ckms<T> {
        let targets = self.targets.union(&other.targets);
        let mut merged = Ckms {
            compress_threshold: compress_threshold(&targets),
            targets,
            inserts: 0,
            samples: self.samples.merge(other.samples),
        };
        merged.compress();
        merged
    }
}

impl<T> AddAssign for Ckms<T>
where
    T: Sample,
{
    fn add_assign(&mut self, rhs: Ckms<T>) {
        let lhs = Ckms::with_targets(self.targets.clone());
        let lhs = std::mem::replace(self, lhs);
        *self = lhs.merge(rhs);
    }
}
