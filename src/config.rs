//! Experiment configuration.

use crate::{
    task::{Gamma, Time},
    gen::{Tasks, UtilGen},
    error::ConfigError
};

/// Default period domain; its least common multiple, the hyperperiod, is `10_000`.
pub const PERIODS: [Time; 6] = [250, 500, 1_000, 2_000, 5_000, 10_000];

/// Parameters of a Monte Carlo experiment.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub num_tasks: usize,
    pub hi_count: usize,
    pub periods: Vec<Time>,
    /// MID budget of LOW tasks relative to their LOW budget.
    pub low_factor: f64,
    /// HIGH budget of HIGH tasks relative to their LOW budget.
    pub high_multiplier: f64,
    /// Trials per utilization level.
    pub trials: usize,
    /// Target LOW-mode utilizations, one report line each.
    pub utilizations: Vec<f64>,
    /// Fixed gammas evaluated alongside the optimized one.
    pub presets: Vec<Gamma>,
    pub seed: u64,
    pub utils: UtilGen
}

impl Default for Config {
    /// Five tasks, three of them HIGH, over the default period domain, swept
    /// from `0.10` to `0.95` utilization.
    fn default() -> Self {
        let num_tasks = 5;

        Self {
            num_tasks,
            hi_count: num_tasks.div_ceil(2),
            periods: PERIODS.to_vec(),
            low_factor: 0.7,
            high_multiplier: 3.0,
            trials: 10_000,
            utilizations: (2 ..= 19).map(|x| f64::from(x) * 0.05).collect(),
            presets: (1 ..= 9).filter_map(|x| Gamma::from_percent(10 * x)).collect(),
            seed: 0,
            utils: UtilGen::UUniFast
        }
    }
}

impl Config {
    /// Returns the task-set generator described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any synthesis parameter is invalid.
    pub fn tasks(&self) -> Result<Tasks<'_>, ConfigError> {
        Tasks::new(
            self.num_tasks,
            self.hi_count,
            &self.periods,
            self.low_factor,
            self.high_multiplier
        ).map(|t| t.with_utils(self.utils))
    }

    /// Checks every parameter.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tasks()?;

        if self.trials == 0 {
            return Err(ConfigError::NoTrials);
        }

        if self.utilizations.is_empty() {
            return Err(ConfigError::NoUtilizations);
        }

        if let Some(&util) = self.utilizations.iter().find(|&&u| !(u > 0.0 && u < 1.0)) {
            return Err(ConfigError::Utilization { util, max: 1.0 });
        }

        Ok(())
    }
}
