//! Classification of a single HIGH-task overrun, with and without approximate
//! computing.

use crate::{
    task::{TaskSet, Time},
    rta::{self, Regime}
};

use rand::Rng;

/// A single job of a HIGH task running past its LOW budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overrun {
    /// Index of the overrunning task.
    pub task: usize,
    /// Actual execution demand of the job.
    pub demand: Time
}

impl Overrun {
    /// Picks a HIGH task of `ts` uniformly at random and draws its demand
    /// uniformly from `budget_low .. budget_high`.
    ///
    /// Returns `None` if `ts` has no HIGH task.
    pub fn sample(ts: &TaskSet, rng: &mut impl Rng) -> Option<Self> {
        let high = ts.high();

        if high.is_empty() {
            return None;
        }

        let task = high[rng.gen_range(0 .. high.len())];
        let t = &ts[task];

        let demand = if t.budget_low < t.budget_high {
            rng.gen_range(t.budget_low .. t.budget_high)
        } else {
            t.budget_low
        };

        Some(Self { task, demand })
    }

    /// Tests whether the overrun exhausts the MID budget of its task, in which
    /// case the system must go to HIGH mode.
    pub fn exceeds_mid(&self, ts: &TaskSet) -> bool {
        self.demand > ts[self.task].budget_mid
    }
}

/// Outcome of an overrun under both methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// All HIGH tasks survive a direct switch to HIGH mode.
    pub baseline: bool,
    /// The system survives the overrun with approximate computing.
    pub degraded: bool,
    /// LOW tasks still meeting their deadlines with approximate computing.
    pub low_served: usize,
    /// Number of LOW tasks in the task-set.
    pub low_total: usize
}

impl Outcome {
    /// Tests whether approximate computing saves a task-set the baseline loses.
    pub fn rescued(&self) -> bool {
        !self.baseline && self.degraded
    }
}

/// Classifies `overrun` on `ts`, whose MID budgets must already be set.
///
/// Without approximate computing the overrun switches straight to HIGH mode and
/// every HIGH task must survive a LOW to HIGH switch. With it, an overrun within
/// the MID budget only moves to MID mode: LOW tasks keep running at their MID
/// budget and HIGH tasks must survive a LOW to MID switch; an overrun past the
/// MID budget moves on to HIGH mode, dropping LOW tasks, and HIGH tasks must
/// survive a MID to HIGH switch.
///
/// LOW tasks served in MID mode only count if every HIGH task is safe.
pub fn classify(ts: &TaskSet, overrun: Overrun) -> Outcome {
    let baseline = ts.high().iter().all(|&i| rta::schedulable(i, ts, Regime::LowToHigh));
    let low_total = ts.low().len();

    if overrun.exceeds_mid(ts) {
        let degraded = ts.high().iter().all(|&i| rta::schedulable(i, ts, Regime::MidToHigh));

        return Outcome { baseline, degraded, low_served: 0, low_total };
    }

    let high_ok = ts.high().iter().all(|&i| rta::schedulable(i, ts, Regime::LowToMid));
    let served = ts.low().iter().filter(|&&i| rta::schedulable(i, ts, Regime::Mid)).count();

    Outcome {
        baseline,
        degraded: high_ok && served == low_total,
        low_served: if high_ok { served } else { 0 },
        low_total
    }
}

/// Samples an overrun on `ts` and classifies it.
///
/// Returns `None` if `ts` has no HIGH task.
pub fn evaluate(ts: &TaskSet, rng: &mut impl Rng) -> Option<(Overrun, Outcome)> {
    let overrun = Overrun::sample(ts, rng)?;

    Some((overrun, classify(ts, overrun)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::task::{Gamma, Task};

    use rand::{rngs::StdRng, SeedableRng};

    fn gamma(percent: u8) -> Gamma {
        Gamma::from_percent(percent).unwrap()
    }

    /// HIGH task at the top, a LOW task below it.
    fn pair(low_budget: Time) -> TaskSet {
        let mut ts = TaskSet::new([
            Task::new(2, 10).high(3.0),
            Task::new(low_budget, 20).degraded(0.5)
        ]).unwrap();

        ts.apply_gamma(gamma(50));
        ts
    }

    #[test]
    fn sample_stays_within_budgets() {
        let ts = pair(4);
        let mut rng = StdRng::seed_from_u64(21);

        for _ in 0 .. 500 {
            let o = Overrun::sample(&ts, &mut rng).unwrap();
            assert_eq!(o.task, 0);
            assert!((2 .. 6).contains(&o.demand));
        }
    }

    #[test]
    fn sample_needs_high_task() {
        let ts = TaskSet::new([Task::new(2, 10)]).unwrap();
        let mut rng = StdRng::seed_from_u64(22);

        assert!(Overrun::sample(&ts, &mut rng).is_none());
        assert!(evaluate(&ts, &mut rng).is_none());
    }

    #[test]
    fn overrun_equal_to_mid_stays_in_mid() {
        let ts = pair(4);
        assert_eq!(ts[0].budget_mid, 4);

        let at_mid = Overrun { task: 0, demand: 4 };
        assert!(!at_mid.exceeds_mid(&ts));

        let out = classify(&ts, at_mid);
        assert_eq!(out.low_total, 1);
        assert_eq!(out.low_served, 1, "MID-wide check counts LOW service");
        assert!(out.degraded);

        let past_mid = Overrun { task: 0, demand: 5 };
        assert!(past_mid.exceeds_mid(&ts));

        let out = classify(&ts, past_mid);
        assert_eq!(out.low_served, 0, "LOW tasks are dropped in HIGH mode");
        assert!(out.degraded);
    }

    #[test]
    fn baseline_uses_low_to_high() {
        // LO-HI for task 1: 9 + 6 ceil(R/10) -> 15 -> 21 > 20
        let ts = TaskSet::new([
            Task::new(2, 10).high(3.0),
            Task::new(3, 20).high(3.0)
        ]).unwrap();

        let out = classify(&ts, Overrun { task: 1, demand: 3 });
        assert!(!out.baseline);
        // gamma = 0: LO-MI equals LOW mode, which fits
        assert!(out.degraded);
        assert!(out.rescued());
        assert_eq!(out.low_total, 0);
    }

    #[test]
    fn unsafe_high_task_voids_low_service() {
        // LOW task 0 is fine in MID mode; HIGH task 1 misses its deadline across
        // LO-MI: R_LO = 10, then 16 + 6 ceil(10/10) + 3 ceil(6/10) = 25 > 16
        let mut ts = TaskSet::new([
            Task::new(6, 10).degraded(0.5),
            Task::new(4, 16).high(4.0)
        ]).unwrap();

        ts.apply_gamma(gamma(99));
        assert_eq!(ts[1].budget_mid, 16);

        let out = classify(&ts, Overrun { task: 1, demand: 4 });
        assert!(rta::schedulable(0, &ts, Regime::Mid));
        assert!(!out.degraded);
        assert_eq!(out.low_served, 0);
        assert_eq!(out.low_total, 1);
    }

    #[test]
    fn missing_low_task_fails_degraded_but_counts_the_rest() {
        // LOW task 2 cannot fit in MID mode behind the others
        let ts = TaskSet::new([
            Task::new(1, 10).high(2.0),
            Task::new(2, 10).degraded(1.0),
            Task::new(20, 25).degraded(1.0)
        ]).unwrap();

        let out = classify(&ts, Overrun { task: 0, demand: 1 });
        assert!(out.baseline);
        assert!(!out.degraded);
        assert_eq!(out.low_served, 1);
        assert_eq!(out.low_total, 2);
    }
}
