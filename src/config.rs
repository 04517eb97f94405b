//! Tunables for a percentile-reporting run.
use std::env;
use std::str::FromStr;

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sampler::DEFAULT_BATCH_SIZE;
use crate::target::{Target, Targets, PHI_TOLERANCE};

/// Rank error used for percentiles declared without one.
pub const DEFAULT_EPSILON: f64 = 0.001;

/// A percentile to report, as a fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Percentile {
    /// The quantile, 0.99 for P99.
    pub phi: f64,
    /// Acceptable rank error. Falls back to [`Config::epsilon`] when unset.
    #[cfg_attr(feature = "serde_support", serde(default))]
    pub epsilon: Option<f64>,
}

/// Everything a [`PercentileReporter`](crate::PercentileReporter) needs
/// before sampling starts.
///
/// ```
/// use parbench::Config;
///
/// let config = Config::default()
///     .percentile(0.5)
///     .percentile_with_error(0.999, 0.0001)
///     .parallelism(4);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.targets().unwrap().error_for(0.999), Some(0.0001));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde_support", serde(default))]
pub struct Config {
    /// Declared percentiles, in report order.
    pub percentiles: Vec<Percentile>,
    /// Default rank error.
    pub epsilon: f64,
    /// Number of workers sampling at once.
    pub parallelism: usize,
    /// Samples a worker buffers before folding them into its shard.
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            percentiles: Vec::new(),
            epsilon: DEFAULT_EPSILON,
            parallelism: num_cpus::get(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Config {
    /// Report the `phi` percentile at the default rank error.
    pub fn percentile(mut self, phi: f64) -> Config {
        self.percentiles.push(Percentile { phi, epsilon: None });
        self
    }

    /// Report the `phi` percentile within `epsilon` rank error.
    pub fn percentile_with_error(mut self, phi: f64, epsilon: f64) -> Config {
        self.percentiles.push(Percentile {
            phi,
            epsilon: Some(epsilon),
        });
        self
    }

    /// Set the default rank error.
    pub fn epsilon(mut self, epsilon: f64) -> Config {
        self.epsilon = epsilon;
        self
    }

    /// Set the worker count.
    pub fn parallelism(mut self, parallelism: usize) -> Config {
        self.parallelism = parallelism;
        self
    }

    /// Set the per-worker buffer length.
    pub fn batch_size(mut self, batch_size: usize) -> Config {
        self.batch_size = batch_size;
        self
    }

    /// The declared percentiles as summary targets.
    pub fn targets(&self) -> Result<Targets> {
        if self.percentiles.is_empty() {
            return Err(Error::Config("no percentiles declared".to_string()));
        }
        let targets = self
            .percentiles
            .iter()
            .map(|p| Target::new(p.phi, p.epsilon.unwrap_or(self.epsilon)))
            .collect::<Result<Vec<_>>>()?;
        Targets::from_targets(targets)
    }

    /// Declared φ values in report order, repeats removed.
    pub fn phis(&self) -> Vec<f64> {
        let mut phis: Vec<f64> = Vec::with_capacity(self.percentiles.len());
        for p in &self.percentiles {
            if !phis.iter().any(|q| (q - p.phi).abs() <= PHI_TOLERANCE) {
                phis.push(p.phi);
            }
        }
        phis
    }

    /// Check that a run could start from this configuration.
    pub fn validate(&self) -> Result<()> {
        self.targets()?;
        if self.parallelism == 0 {
            return Err(Error::Config("parallelism must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Defaults overridden from `PARBENCH_*` environment variables
    ///
    /// `PARBENCH_PERCENTILES` is a comma separated list of fractions, for
    /// example `0.5,0.99,0.999`. `PARBENCH_EPSILON`, `PARBENCH_PARALLELISM`
    /// and `PARBENCH_BATCH_SIZE` set the matching fields. Unset variables
    /// leave the default in place; unparsable ones are an [`Error::Config`].
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        if let Some(raw) = lookup("PARBENCH_PERCENTILES") {
            for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                config = config.percentile(parse("PARBENCH_PERCENTILES", item)?);
            }
        }
        if let Some(raw) = lookup("PARBENCH_EPSILON") {
            config.epsilon = parse("PARBENCH_EPSILON", &raw)?;
        }
        if let Some(raw) = lookup("PARBENCH_PARALLELISM") {
            config.parallelism = parse("PARBENCH_PARALLELISM", &raw)?;
        }
        if let Some(raw) = lookup("PARBENCH_BATCH_SIZE") {
            config.batch_size = parse("PARBENCH_BATCH_SIZE", &raw)?;
        }
        Ok(config)
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{}: cannot parse {:?}", key, raw)))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_need_percentiles() {
        let config = Config::default();
        assert_eq!(config.epsilon, DEFAULT_EPSILON);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.parallelism >= 1);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(config.percentile(0.5).validate().is_ok());
    }

    #[test]
    fn per_percentile_error_overrides_default() {
        let config = Config::default()
            .epsilon(0.01)
            .percentile(0.5)
            .percentile_with_error(0.99, 0.001);
        let targets = config.targets().unwrap();
        assert_eq!(targets.error_for(0.5), Some(0.01));
        assert_eq!(targets.error_for(0.99), Some(0.001));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::default().percentile(1.5).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::default().percentile(0.5).parallelism(0).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::default().percentile(0.5).batch_size(0).validate(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn phis_keep_declared_order() {
        let config = Config::default()
            .percentile(0.99)
            .percentile(0.5)
            .percentile_with_error(0.99, 0.0001);
        assert_eq!(config.phis(), vec![0.99, 0.5]);
    }

    #[test]
    fn reads_environment() {
        let config = Config::from_lookup(lookup(&[
            ("PARBENCH_PERCENTILES", "0.5, 0.99,0.999"),
            ("PARBENCH_EPSILON", "0.005"),
            ("PARBENCH_PARALLELISM", "3"),
            ("PARBENCH_BATCH_SIZE", "64"),
        ]))
        .unwrap();
        assert_eq!(config.phis(), vec![0.5, 0.99, 0.999]);
        assert_eq!(config.epsilon, 0.005);
        assert_eq!(config.parallelism, 3);
        assert_eq!(config.batch_size, 64);

        let unset = Config::from_lookup(lookup(&[])).unwrap();
        assert!(unset.percentiles.is_empty());
    }

    #[test]
    fn environment_parse_failure_is_config_error() {
        let err = Config::from_lookup(lookup(&[("PARBENCH_PARALLELISM", "many")])).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("PARBENCH_PARALLELISM")));
        assert!(Config::from_lookup(lookup(&[("PARBENCH_PERCENTILES", "0.5,x")])).is_err());
    }
}
