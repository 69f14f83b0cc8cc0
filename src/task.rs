//! The mixed-criticality task model.

use crate::error::{ConfigError, TaskSetError};

use dashu::{
    rational::Relaxed,
    integer::Sign
};
use num_order::NumOrd;

use std::{
    ops::Index,
    str::FromStr,
    fmt
};

/// Type of time instants and durations.
///
/// Any integral time unit works as long as periods and budgets use the same
/// one; the experiments use microsecond-like units with periods in the
/// hundreds to tens of thousands.
pub type Time = u64;

/// Criticality level of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Criticality {
    /// May be degraded in MID mode and is dropped in HIGH mode.
    Low,
    /// May overrun its LOW budget up to its HIGH budget.
    High
}

/// System-wide criticality mode, selecting which budget each task is charged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Low,
    Mid,
    High
}

/// Degradation factor for the MID budgets of HIGH tasks.
///
/// Stored exactly in hundredths, so that `Gamma(37)` is `0.37`; the only
/// representable values are `0.00 ..= 0.99`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Gamma(u8);

impl Gamma {
    /// Number of steps in the unit interval.
    pub const STEPS: u8 = 100;

    /// Returns the gamma of `percent` hundredths, if below `1`.
    pub const fn from_percent(percent: u8) -> Option<Self> {
        if percent < Self::STEPS {
            Some(Self(percent))
        } else {
            None
        }
    }

    /// Returns the value in hundredths.
    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Returns `ceil(slack * gamma)`, computed exactly.
    pub fn scale(self, slack: Time) -> Time {
        (slack * Time::from(self.0)).div_ceil(Time::from(Self::STEPS))
    }
}

impl TryFrom<f64> for Gamma {
    type Error = ConfigError;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let scaled = value * f64::from(Self::STEPS);
        let percent = scaled.round();

        if !(0.0 .. f64::from(Self::STEPS)).contains(&percent) || (scaled - percent).abs() > 1e-6 {
            return Err(ConfigError::Gamma(value));
        }

        Ok(Self(percent as u8))
    }
}

impl FromStr for Gamma {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<f64>()
                     .map_err(|_| ConfigError::GammaSyntax(s.to_owned()))?;

        Self::try_from(value)
    }
}

impl fmt::Display for Gamma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / Self::STEPS, self.0 % Self::STEPS)
    }
}

/// A single periodic task with implicit deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Task {
    pub criticality: Criticality,
    /// The task's period, also its relative deadline.
    pub period: Time,
    /// Worst-case execution time in LOW mode.
    pub budget_low: Time,
    /// Execution budget in MID (approximate computing) mode.
    pub budget_mid: Time,
    /// Worst-case execution time in HIGH mode; zero for LOW tasks, which are
    /// dropped in that mode.
    pub budget_high: Time
}

impl Task {
    /// Constructs a new LOW task with the given `budget_low` and `period`, running
    /// at full budget in MID mode.
    pub fn new(budget_low: Time, period: Time) -> Self {
        Self {
            criticality: Criticality::Low,
            period,
            budget_low,
            budget_mid: budget_low,
            budget_high: 0
        }
    }

    /// Returns the task with its MID budget reduced by `factor`, rounding up and
    /// never below one time unit.
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss,
            clippy::cast_possible_truncation)]
    pub fn degraded(self, factor: f64) -> Self {
        let budget_mid = ((self.budget_low as f64 * factor).ceil() as Time).max(1);

        Self { budget_mid, ..self }
    }

    /// Returns the task as a HIGH task whose HIGH budget is its LOW budget
    /// multiplied by `multiplier`, rounding up.
    ///
    /// The MID budget is left equal to the LOW budget until a [`Gamma`] is
    /// applied with [`with_gamma`](`Task::with_gamma`).
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss,
            clippy::cast_possible_truncation)]
    pub fn high(self, multiplier: f64) -> Self {
        let budget_high = (self.budget_low as f64 * multiplier).ceil() as Time;

        Self {
            criticality: Criticality::High,
            budget_mid: self.budget_low,
            budget_high,
            ..self
        }
    }

    /// Returns the task with its MID budget derived from `gamma`.
    ///
    /// LOW tasks are returned unchanged; their MID budget does not depend on gamma.
    pub fn with_gamma(self, gamma: Gamma) -> Self {
        match self.criticality {
            Criticality::Low => self,
            Criticality::High => Self {
                budget_mid: self.budget_low + gamma.scale(self.budget_high.saturating_sub(self.budget_low)),
                ..self
            }
        }
    }

    pub fn is_high(&self) -> bool {
        self.criticality == Criticality::High
    }

    pub fn deadline(&self) -> Time {
        self.period
    }

    /// Returns the budget the task is charged in `mode`.
    pub fn budget(&self, mode: Mode) -> Time {
        match mode {
            Mode::Low  => self.budget_low,
            Mode::Mid  => self.budget_mid,
            Mode::High => self.budget_high
        }
    }
}

/// Trait for tasks and collections of tasks.
pub trait Set {
    /// Returns the exact total utilization in `mode`.
    ///
    /// The value is left as a [`Relaxed`] rational, since it is mostly summed or
    /// compared; use [`Relaxed::canonicalize`] if the reduced form is needed.
    fn utilization(self, mode: Mode) -> Relaxed;

    /// Tests whether the utilization in `mode` exceeds `1`, in which case no
    /// uniprocessor schedule can exist.
    fn overloaded(self, mode: Mode) -> bool;
}

/// A `Task` is a `Set` of one element.
impl Set for &'_ Task {
    fn utilization(self, mode: Mode) -> Relaxed {
        Relaxed::from_parts_const(
            Sign::Positive,
            self.budget(mode).into(),
            self.period.into()
        )
    }

    fn overloaded(self, mode: Mode) -> bool {
        self.budget(mode) > self.period
    }
}

/// Any collection of tasks is a `Set`, summing the utilization of its elements.
impl<I, T: Set> Set for I where I: IntoIterator<Item = T> {
    fn utilization(self, mode: Mode) -> Relaxed {
        let mut out = Relaxed::default();

        for x in self {
            out += x.utilization(mode);
        }

        out
    }

    fn overloaded(self, mode: Mode) -> bool {
        !self.utilization(mode).num_le(&1usize)
    }
}

/// A task-set ordered by priority, index `0` being the highest.
///
/// Priorities are deadline-monotonic: periods never decrease along the set.
/// The indices of HIGH and LOW tasks are kept separately, in priority order.
#[derive(Clone, Debug)]
pub struct TaskSet {
    tasks: Box<[Task]>,
    high: Box<[usize]>,
    low: Box<[usize]>
}

impl TaskSet {
    /// Constructs a new `TaskSet` from tasks already in priority order.
    ///
    /// # Errors
    ///
    /// Returns a [`TaskSetError`] if any task has a zero period or budget, if
    /// periods are not in deadline-monotonic order, or if a HIGH task does not
    /// have `budget_low <= budget_mid <= budget_high`.
    pub fn new(tasks: impl Into<Box<[Task]>>) -> Result<Self, TaskSetError> {
        let tasks = tasks.into();

        for (i, task) in tasks.iter().enumerate() {
            if task.period == 0 {
                return Err(TaskSetError::ZeroPeriod { task: i });
            }

            if task.budget_low == 0 || task.budget_mid == 0 {
                return Err(TaskSetError::ZeroBudget { task: i });
            }

            if task.is_high() && !(task.budget_low <= task.budget_mid && task.budget_mid <= task.budget_high) {
                return Err(TaskSetError::BudgetOrder {
                    task: i,
                    low: task.budget_low,
                    mid: task.budget_mid,
                    high: task.budget_high
                });
            }
        }

        for (i, pair) in tasks.windows(2).enumerate() {
            if pair[0].period > pair[1].period {
                return Err(TaskSetError::PriorityOrder {
                    task: i,
                    period: pair[0].period,
                    next: pair[1].period
                });
            }
        }

        let (high, low): (Vec<_>, Vec<_>) = (0 .. tasks.len()).partition(|&i| tasks[i].is_high());

        Ok(Self {
            tasks,
            high: high.into_boxed_slice(),
            low: low.into_boxed_slice()
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Indices of HIGH tasks, in priority order.
    pub fn high(&self) -> &[usize] {
        &self.high
    }

    /// Indices of LOW tasks, in priority order.
    pub fn low(&self) -> &[usize] {
        &self.low
    }

    /// Sets the MID budget of every HIGH task from `gamma`.
    pub fn apply_gamma(&mut self, gamma: Gamma) {
        for &i in self.high.iter() {
            self.tasks[i] = self.tasks[i].with_gamma(gamma);
        }
    }

    /// Returns the LOW-mode utilization as a float, for reporting.
    #[allow(clippy::cast_precision_loss)]
    pub fn nominal_utilization(&self) -> f64 {
        self.tasks.iter()
                  .map(|t| t.budget_low as f64 / t.period as f64)
                  .sum()
    }
}

impl Index<usize> for TaskSet {
    type Output = Task;

    fn index(&self, index: usize) -> &Task {
        &self.tasks[index]
    }
}

impl<'a> IntoIterator for &'a TaskSet {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}
