//! Scheduler configuration
//!
//! Every knob of the quality engine, the reference constraints, the solver
//! and validation lives here. All fields have defaults, so an empty TOML file
//! (or no file at all) yields the stock behaviour.
//!
//! ```toml
//! [quality]
//! rounds = 5
//!
//! [solver]
//! max_iterations = 500
//! time_limit_secs = 30.0
//! ```

use crate::error::{TradfError, TradfResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Fixed-point rounds for cyclic graphs
    pub rounds: usize,
    /// Stop early once no actor's noise power moves by more than this
    pub residual_tolerance: Option<f64>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            rounds: 5,
            residual_tolerance: None,
        }
    }
}

/// Percentiles of the channel delay used for the tightest and loosest
/// reference constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub low_percentile: f64,
    pub high_percentile: f64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            low_percentile: 0.001,
            high_percentile: 0.999,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Step tolerance
    pub xtol: f64,
    /// Projected gradient tolerance
    pub gtol: f64,
    /// Initial step length (trust radius)
    pub initial_step: f64,
    pub max_step: f64,
    pub max_iterations: usize,
    pub max_backtracks: usize,
    /// Wall-clock cap; exceeding it counts as solver failure
    pub time_limit_secs: Option<f64>,
    /// Slack allowed on linear constraints and bounds
    pub feasibility_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            xtol: 1e-18,
            gtol: 1e-18,
            initial_step: 0.5,
            max_step: 1e3,
            max_iterations: 2000,
            max_backtracks: 60,
            time_limit_secs: None,
            feasibility_tolerance: 1e-9,
        }
    }
}

impl SolverConfig {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs_f64)
    }
}

/// Tolerances of the final constraint check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub rel_tolerance: f64,
    pub abs_tolerance: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            rel_tolerance: 1e-9,
            abs_tolerance: 1e-6,
        }
    }
}

impl ValidationConfig {
    /// `a >= b` up to tolerance
    pub fn at_least(&self, a: f64, b: f64) -> bool {
        a >= b || (a - b).abs() <= (self.rel_tolerance * a.abs().max(b.abs())).max(self.abs_tolerance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Maximum relative deviation of a random share from the uniform share
    pub spread: f64,
    /// Seed for the random policy; entropy when absent
    pub seed: Option<u64>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            spread: 0.4,
            seed: None,
        }
    }
}

/// Complete scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub quality: QualityConfig,
    pub reference: ReferenceConfig,
    pub solver: SolverConfig,
    pub validation: ValidationConfig,
    pub allocation: AllocationConfig,
    /// Percentile margin used to size channel buffers
    pub buffer_epsilon: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quality: QualityConfig::default(),
            reference: ReferenceConfig::default(),
            solver: SolverConfig::default(),
            validation: ValidationConfig::default(),
            allocation: AllocationConfig::default(),
            buffer_epsilon: 1e-3,
        }
    }
}

impl SchedulerConfig {
    /// Load config from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> TradfResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TradfError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate config from a TOML string
    pub fn from_toml(contents: &str) -> TradfResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> TradfResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> TradfResult<()> {
        if self.quality.rounds == 0 {
            return Err(TradfError::config("quality.rounds must be at least 1"));
        }
        if let Some(tol) = self.quality.residual_tolerance {
            positive("quality.residual_tolerance", tol)?;
        }

        let low = self.reference.low_percentile;
        let high = self.reference.high_percentile;
        if !(low > 0.0 && high < 1.0 && low < high) {
            return Err(TradfError::config(format!(
                "reference percentiles must satisfy 0 < low < high < 1, got {} and {}",
                low, high
            )));
        }

        positive("solver.xtol", self.solver.xtol)?;
        positive("solver.gtol", self.solver.gtol)?;
        positive("solver.initial_step", self.solver.initial_step)?;
        positive("solver.max_step", self.solver.max_step)?;
        positive("solver.feasibility_tolerance", self.solver.feasibility_tolerance)?;
        if self.solver.max_iterations == 0 {
            return Err(TradfError::config("solver.max_iterations must be at least 1"));
        }
        if let Some(limit) = self.solver.time_limit_secs {
            positive("solver.time_limit_secs", limit)?;
        }

        positive("validation.rel_tolerance", self.validation.rel_tolerance)?;
        positive("validation.abs_tolerance", self.validation.abs_tolerance)?;

        if !(0.0..1.0).contains(&self.allocation.spread) {
            return Err(TradfError::config(format!(
                "allocation.spread must be within [0, 1), got {}",
                self.allocation.spread
            )));
        }
        if !(self.buffer_epsilon > 0.0 && self.buffer_epsilon < 0.5) {
            return Err(TradfError::config(format!(
                "buffer_epsilon must be within (0, 0.5), got {}",
                self.buffer_epsilon
            )));
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> TradfResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(TradfError::config(format!("{} must be positive, got {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.quality.rounds, 5);
        assert_eq!(config.solver.initial_step, 0.5);
        assert_eq!(config.solver.xtol, 1e-18);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = SchedulerConfig::from_toml(
            r#"
            buffer_epsilon = 0.01

            [quality]
            rounds = 8
            residual_tolerance = 1e-12

            [solver]
            time_limit_secs = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(config.quality.rounds, 8);
        assert_eq!(config.quality.residual_tolerance, Some(1e-12));
        assert_eq!(config.solver.time_limit(), Some(Duration::from_millis(2500)));
        assert_eq!(config.solver.max_iterations, 2000);
        assert_eq!(config.buffer_epsilon, 0.01);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(SchedulerConfig::from_toml("[quality]\nrounds = 0").is_err());
        assert!(SchedulerConfig::from_toml("[reference]\nlow_percentile = 0.9\nhigh_percentile = 0.1").is_err());
        assert!(SchedulerConfig::from_toml("[allocation]\nspread = 1.0").is_err());
        assert!(SchedulerConfig::from_toml("[solver]\ninitial_step = -1.0").is_err());
        let err = SchedulerConfig::from_toml("[quality]\nrounds = \"five\"").unwrap_err();
        assert!(matches!(err, TradfError::Toml(_)));
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tradf.toml");
        std::fs::write(&path, "[allocation]\nseed = 7\n").unwrap();

        let config = SchedulerConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.allocation.seed, Some(7));

        let missing = dir.path().join("missing.toml");
        assert!(SchedulerConfig::load(&missing).is_err());
        assert_eq!(
            SchedulerConfig::load_or_default(None::<&Path>).unwrap(),
            SchedulerConfig::default()
        );
    }

    #[test]
    fn test_tolerant_comparison() {
        let v = ValidationConfig::default();
        assert!(v.at_least(1.0, 1.0 + 1e-12));
        assert!(v.at_least(2.0, 1.0));
        assert!(!v.at_least(1.0, 1.1));
    }
}
