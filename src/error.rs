//! Error types.
//!
//! Infeasibility is never an error: the analysis reports it as a value. The
//! types here cover invalid experiment parameters and task-sets that violate
//! the task model.

use crate::task::Time;

use thiserror::Error;

/// An invalid experiment or synthesis parameter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("number of tasks must be positive")]
    NoTasks,

    #[error("number of HIGH tasks ({hi_count}) must be between 1 and the number of tasks ({num_tasks})")]
    HighCount { hi_count: usize, num_tasks: usize },

    #[error("period domain is empty")]
    NoPeriods,

    #[error("periods must be positive")]
    ZeroPeriod,

    #[error("LOW degradation factor must be in (0, 1], got {0}")]
    LowFactor(f64),

    #[error("HIGH budget multiplier must be greater than 1, got {0}")]
    HighMultiplier(f64),

    #[error("target utilization {util} must be in (0, {max})")]
    Utilization { util: f64, max: f64 },

    #[error("utilization sweep is empty")]
    NoUtilizations,

    #[error("trial count must be positive")]
    NoTrials,

    #[error("gamma must be a multiple of 0.01 in [0, 1), got {0}")]
    Gamma(f64),

    #[error("cannot parse gamma '{0}'")]
    GammaSyntax(String)
}

/// A task-set that violates the task model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskSetError {
    #[error("task {task} has a zero period")]
    ZeroPeriod { task: usize },

    #[error("task {task} has a zero LOW or MID budget")]
    ZeroBudget { task: usize },

    #[error("task {task} with period {period} precedes a task with shorter period {next}")]
    PriorityOrder { task: usize, period: Time, next: Time },

    #[error("HIGH task {task} has budgets low={low} mid={mid} high={high}, expected low <= mid <= high")]
    BudgetOrder { task: usize, low: Time, mid: Time, high: Time },

    #[error("task-set has no HIGH task to overrun")]
    NoHighTask
}

/// Any error raised while setting up or running an experiment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    TaskSet(#[from] TaskSetError)
}
