//! The contract shared by every quantile summary in this crate.
use std::fmt::Debug;
use std::time::Duration;

use crate::error::Result;
use crate::target::Targets;

/// A value a summary can order.
///
/// Summaries rely on a total order over what they store. Values that do not
/// compare equal to themselves, such as a floating point NaN, are rejected on
/// insertion instead of being allowed to scramble that order.
pub trait Sample: Copy + PartialOrd + Debug {
    /// Whether this value takes part in the order.
    fn is_comparable(&self) -> bool {
        self.partial_cmp(self).is_some()
    }
}

impl Sample for Duration {}
impl Sample for u16 {}
impl Sample for u32 {}
impl Sample for u64 {}
impl Sample for i32 {}
impl Sample for i64 {}
impl Sample for f32 {}
impl Sample for f64 {}

/// A summary answering quantile queries over the samples inserted into it
///
/// Implementations differ in how much they keep. All of them answer only the
/// quantiles they were declared with, plus the exact minimum and maximum at
/// φ of 0 and 1. Asking for any other φ is an
/// [`Error::Query`](crate::Error::Query).
pub trait Summary<T>: Sized
where
    T: Sample,
{
    /// An empty summary answering `targets`.
    fn with_targets(targets: Targets) -> Self;

    /// The targets this summary answers.
    fn targets(&self) -> &Targets;

    /// Insert a sample
    ///
    /// Fails with [`Error::ContractViolation`](crate::Error::ContractViolation)
    /// if the value cannot be ordered. The summary is left untouched in that
    /// case.
    fn insert(&mut self, v: T) -> Result<()>;

    /// Insert a batch of samples
    ///
    /// The slice may be reordered. The default inserts one at a time and stops
    /// at the first rejected value.
    fn insert_batch(&mut self, values: &mut [T]) -> Result<()> {
        for v in values.iter() {
            self.insert(*v)?;
        }
        Ok(())
    }

    /// The approximate φ-quantile of everything inserted so far.
    fn query(&self, phi: f64) -> Result<T>;

    /// Total samples inserted over the lifetime of the summary, including
    /// those inherited through merges.
    fn count(&self) -> usize;

    /// Combine two summaries into one answering for the samples of both.
    fn merge(self, other: Self) -> Self;
}
