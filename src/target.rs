//! Quantile targets and the error allowance they impose on a summary.
//!
//! A target (φ, ε) asks that a query for φ over `n` samples return a value
//! whose rank is within `εn` of `φn`. Each target contributes a banding
//! function `f(r, n)` bounding how much rank uncertainty, `g + delta`, an
//! entry may carry when `r` samples are known to rank below it:
//!
//! ```text
//! f(r, n) = 2εn + ε/(1-φ+ε) * max(0, (φ-ε)n - r) + ε/(φ+ε) * max(0, r - (φ+ε)n)
//! ```
//!
//! The function is flat at `2εn` around the target rank and grows away from
//! it, so regions far from every declared quantile are summarised coarsely.
//! It never decreases as samples arrive, whether a new sample lands below `r`
//! or not, which is what lets an entry that fit the band once keep fitting it.
//! The left-hand slope never exceeds 1, which is what bounds the query error.
//! A summary with several targets uses the pointwise minimum.
use std::cmp;

use crate::error::{Error, Result};

/// Two quantiles closer than this are considered the same target.
pub const PHI_TOLERANCE: f64 = 1e-12;

// Absorbs float rounding so that a band sitting exactly on an integer does not
// flicker between two floors as `n` grows.
const BAND_SLOP: f64 = 1e-9;

/// A quantile φ paired with the rank error ε acceptable when answering it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    phi: f64,
    epsilon: f64,
}

impl Target {
    /// Create a new target
    ///
    /// `phi` must lie in `[0, 1]` and `epsilon` in `(0, 1)`. Out of range
    /// values are rejected rather than clamped.
    ///
    /// # Examples
    /// ```
    /// use parbench::Target;
    ///
    /// assert!(Target::new(0.99, 0.001).is_ok());
    /// assert!(Target::new(1.5, 0.01).is_err());
    /// assert!(Target::new(0.5, 0.0).is_err());
    /// ```
    pub fn new(phi: f64, epsilon: f64) -> Result<Target> {
        if !(0.0..=1.0).contains(&phi) {
            return Err(Error::Config(format!("quantile {} outside [0, 1]", phi)));
        }
        if !(epsilon > 0.0 && epsilon < 1.0) {
            return Err(Error::Config(format!("error {} outside (0, 1)", epsilon)));
        }
        Ok(Target { phi, epsilon })
    }

    /// The quantile of this target.
    pub fn phi(&self) -> f64 {
        self.phi
    }

    /// The permitted rank error, as a fraction of the sample count.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn allowance(&self, r: f64, n: f64) -> f64 {
        let (phi, eps) = (self.phi, self.epsilon);
        let lo = (phi - eps) * n;
        let hi = (phi + eps) * n;
        let mut f = 2.0 * eps * n;
        if r < lo {
            f += eps / (1.0 - phi + eps) * (lo - r);
        } else if r > hi {
            f += eps / (phi + eps) * (r - hi);
        }
        f
    }
}

/// The set of targets a summary was declared with.
///
/// Targets are kept ordered by φ. Declaring the same φ twice keeps the
/// tighter ε.
#[derive(Debug, Clone, PartialEq)]
pub struct Targets {
    targets: Vec<Target>,
}

impl Targets {
    /// Build a target set from `(phi, epsilon)` pairs
    ///
    /// Fails with [`Error::Config`] if any pair is out of range or if no
    /// pairs are given.
    ///
    /// # Examples
    /// ```
    /// use parbench::Targets;
    ///
    /// let targets = Targets::new(vec![(0.5, 0.01), (0.99, 0.001)]).unwrap();
    /// assert_eq!(targets.len(), 2);
    /// assert_eq!(targets.error_for(0.99), Some(0.001));
    /// assert_eq!(targets.error_for(0.9), None);
    /// ```
    pub fn new<I>(pairs: I) -> Result<Targets>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let targets = pairs
            .into_iter()
            .map(|(phi, epsilon)| Target::new(phi, epsilon))
            .collect::<Result<Vec<_>>>()?;
        Targets::from_targets(targets)
    }

    /// Build a target set from already validated targets.
    pub fn from_targets(mut targets: Vec<Target>) -> Result<Targets> {
        if targets.is_empty() {
            return Err(Error::Config("at least one quantile target is required".to_string()));
        }
        targets.sort_by(|a, b| {
            a.phi
                .partial_cmp(&b.phi)
                .unwrap_or(cmp::Ordering::Equal)
                .then(a.epsilon.partial_cmp(&b.epsilon).unwrap_or(cmp::Ordering::Equal))
        });
        // sorted by epsilon within equal phi, so the first kept is the tightest
        targets.dedup_by(|later, kept| (later.phi - kept.phi).abs() <= PHI_TOLERANCE);
        Ok(Targets { targets })
    }

    /// Number of distinct quantiles declared.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always false; an empty target set cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterate targets in increasing φ.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    /// The ε declared for `phi`, if `phi` was declared.
    pub fn error_for(&self, phi: f64) -> Option<f64> {
        self.targets
            .iter()
            .find(|t| (t.phi - phi).abs() <= PHI_TOLERANCE)
            .map(|t| t.epsilon)
    }

    /// Whether `phi` was declared.
    pub fn contains(&self, phi: f64) -> bool {
        self.error_for(phi).is_some()
    }

    /// Whether a summary built on these targets answers `phi`: any declared
    /// quantile, plus the minimum and maximum, which are always exact.
    pub fn answers(&self, phi: f64) -> bool {
        phi.abs() <= PHI_TOLERANCE || (phi - 1.0).abs() <= PHI_TOLERANCE || self.contains(phi)
    }

    /// The smallest ε across all targets.
    pub fn tightest(&self) -> f64 {
        self.targets
            .iter()
            .map(|t| t.epsilon)
            .fold(f64::INFINITY, f64::min)
    }

    /// Combine two target sets for a merged summary
    ///
    /// Quantiles present in both keep the looser ε, since the merged summary
    /// can promise no better than its least precise input.
    pub fn union(&self, other: &Targets) -> Targets {
        let mut targets = self.targets.clone();
        for t in &other.targets {
            match targets
                .iter_mut()
                .find(|mine| (mine.phi - t.phi).abs() <= PHI_TOLERANCE)
            {
                Some(mine) => mine.epsilon = mine.epsilon.max(t.epsilon),
                None => targets.push(*t),
            }
        }
        targets.sort_by(|a, b| a.phi.partial_cmp(&b.phi).unwrap_or(cmp::Ordering::Equal));
        Targets { targets }
    }

    /// The largest `g + delta` an entry may carry when `r` samples rank below
    /// it in a summary of `n` samples. Never less than 1.
    pub(crate) fn band(&self, r: usize, n: usize) -> usize {
        let (r, n) = (r as f64, n as f64);
        let f = self
            .targets
            .iter()
            .map(|t| t.allowance(r, n))
            .fold(f64::INFINITY, f64::min);
        assert!(
            f.is_finite() && f >= 0.0,
            "error band {} at rank {} of {} is not a valid bound",
            f,
            r,
            n
        );
        cmp::max(1, (f + BAND_SLOP).floor() as usize)
    }
}
