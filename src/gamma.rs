//! Search for the largest degradation factor that keeps MID mode schedulable.

use crate::{
    task::{Gamma, Mode, Set, TaskSet},
    rta::{self, Regime}
};

use tracing::trace;

use std::array;

/// Number of candidate values searched.
pub const CANDIDATES: usize = Gamma::STEPS as usize - 1;

/// Returns the candidate values `0.01 ..= 0.99`, in increasing order.
#[allow(clippy::cast_possible_truncation)]
pub fn candidates() -> [Gamma; CANDIDATES] {
    array::from_fn(|i| Gamma::from_percent(i as u8 + 1).unwrap_or_default())
}

/// Tests whether `ts`, with its current MID budgets, survives a switch to MID mode.
///
/// Every LOW task must meet its deadline in steady MID mode; every HIGH task
/// must meet it both across a LOW to MID switch and across a MID to HIGH switch.
pub fn mid_schedulable(ts: &TaskSet) -> bool {
    if ts.overloaded(Mode::Mid) {
        return false;
    }

    ts.low().iter().all(|&i| rta::schedulable(i, ts, Regime::Mid))
        && ts.high().iter().all(|&i| {
            let r = rta::response_time(i, ts, Regime::LowToMid)
                       .max(rta::response_time(i, ts, Regime::MidToHigh));

            r <= ts[i].deadline()
        })
}

/// Finds the largest candidate gamma under which `ts` is [`mid_schedulable`],
/// assuming schedulability only degrades as gamma grows.
///
/// The MID budgets for the returned gamma are left applied to `ts`. If no
/// candidate is schedulable the smallest one is returned anyway; callers must
/// check feasibility on their own.
pub fn optimize(ts: &mut TaskSet) -> Gamma {
    let grid = candidates();

    let feasible = grid.partition_point(|&gamma| {
        ts.apply_gamma(gamma);
        let ok = mid_schedulable(ts);
        trace!(%gamma, ok, "gamma candidate");
        ok
    });

    let gamma = grid[feasible.saturating_sub(1)];
    ts.apply_gamma(gamma);

    gamma
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        gen::Tasks,
        task::{Task, Time}
    };

    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn candidate_grid() {
        let grid = candidates();
        assert_eq!(grid.len(), 99);
        assert_eq!(grid[0].percent(), 1);
        assert_eq!(grid[98].percent(), 99);
        assert!(grid.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn idle_system_takes_largest_gamma() {
        let mut ts = TaskSet::new([
            Task::new(1, 100).high(3.0),
            Task::new(1, 200).degraded(0.7)
        ]).unwrap();

        let gamma = optimize(&mut ts);
        assert_eq!(gamma.percent(), 99);
        assert_eq!(ts[0].budget_mid, 3);
        assert!(mid_schedulable(&ts));
    }

    #[test]
    fn finds_boundary() {
        // MID budget of task 0 is 2 + ceil(16 gamma); its own checks always pass.
        // The LOW task fits iff a single job of task 0 interferes: 10 + mid_0 <= 20.
        let mut ts = TaskSet::new([
            Task::new(2, 20).high(9.0),
            Task::new(10, 25).degraded(1.0)
        ]).unwrap();

        let gamma = optimize(&mut ts);

        assert_eq!(gamma.percent(), 50);
        assert_eq!(ts[0].budget_mid, 10);
        assert!(mid_schedulable(&ts));

        ts.apply_gamma(Gamma::from_percent(51).unwrap());
        assert!(!mid_schedulable(&ts));
    }

    #[test]
    fn infeasible_returns_smallest() {
        let mut ts = TaskSet::new([
            Task::new(8, 10).high(3.0),
            Task::new(8, 10).degraded(1.0)
        ]).unwrap();

        let gamma = optimize(&mut ts);
        assert_eq!(gamma.percent(), 1);
        assert!(!mid_schedulable(&ts));
    }

    #[test]
    fn deterministic_and_downward_closed() {
        const PERIODS: [Time; 6] = [250, 500, 1000, 2000, 5000, 10000];

        let gen = Tasks::new(5, 3, &PERIODS, 0.7, 3.0).unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0 .. 50 {
            let mut ts = gen.gen(0.4, &mut rng).unwrap();
            let first = optimize(&mut ts);
            let second = optimize(&mut ts);
            assert_eq!(first, second);

            if !mid_schedulable(&ts) {
                continue;
            }

            for gamma in candidates().into_iter().take_while(|&g| g <= first) {
                let mut lower = ts.clone();
                lower.apply_gamma(gamma);
                assert!(mid_schedulable(&lower), "gamma {gamma} below optimum {first} must be feasible");
            }
        }
    }
}
