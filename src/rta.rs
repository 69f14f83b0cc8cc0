//! Response-time analysis for fixed-priority preemptive scheduling across
//! criticality modes and mode changes.
//!
//! The analysis is the classic busy-period fixed point
//!
//! ```text
//! R(0)   = C_i
//! R(k+1) = C_i + sum over j in hp(i) of I_j(R(k))
//! ```
//!
//! where `hp(i)` are the tasks with strictly higher priority (lower index) and
//! `I_j` depends on the [`Regime`]. In a mode change the busy period is split at
//! the task's own response times in the earlier modes: jobs of LOW tasks counted
//! up to a switch point keep the earlier budget, later ones are charged the
//! later budget. HIGH tasks are charged their budget in the final mode over the
//! whole window.
//!
//! Iteration stops at the first value above the task's deadline, so it always
//! terminates within `ceil(D_i / T_min) + 1` iterations per interfering task,
//! `T_min` being the shortest higher-priority period: while not converged `R`
//! grows by at least one whole job of some interfering task per step, and no
//! task releases more than `ceil(D_i / T_j) + 1` jobs in a window of length
//! `D_i`. With a single interfering task this is `ceil(D_i / T_min) + 1`
//! iterations in total.

use crate::task::{Criticality, Mode, Task, TaskSet, Time};

use tracing::trace;

/// Scheduling regime under which a response time is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Regime {
    /// Steady LOW mode: everyone at LOW budget.
    Low,
    /// Steady MID mode: everyone at MID budget.
    Mid,
    /// Steady HIGH mode: LOW tasks dropped, HIGH tasks at HIGH budget.
    High,
    LowToMid,
    MidToHigh,
    LowToHigh
}

impl Regime {
    pub const ALL: [Regime; 6] = [
        Regime::Low, Regime::Mid, Regime::High,
        Regime::LowToMid, Regime::MidToHigh, Regime::LowToHigh
    ];

    /// Returns the steady regime of `mode`.
    pub fn steady(mode: Mode) -> Self {
        match mode {
            Mode::Low  => Regime::Low,
            Mode::Mid  => Regime::Mid,
            Mode::High => Regime::High
        }
    }

    /// Modes traversed by the regime, in order; the last one is the mode the
    /// task under analysis completes in.
    pub fn modes(self) -> &'static [Mode] {
        match self {
            Regime::Low       => &[Mode::Low],
            Regime::Mid       => &[Mode::Mid],
            Regime::High      => &[Mode::High],
            Regime::LowToMid  => &[Mode::Low, Mode::Mid],
            Regime::MidToHigh => &[Mode::Low, Mode::Mid, Mode::High],
            Regime::LowToHigh => &[Mode::Low, Mode::High]
        }
    }

    /// Mode whose budget the task under analysis is charged.
    pub fn target(self) -> Mode {
        match self {
            Regime::Low                                         => Mode::Low,
            Regime::Mid | Regime::LowToMid                      => Mode::Mid,
            Regime::High | Regime::MidToHigh | Regime::LowToHigh => Mode::High
        }
    }

    /// Short name, as used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Regime::Low       => "LO",
            Regime::Mid       => "MI",
            Regime::High      => "HI",
            Regime::LowToMid  => "LO-MI",
            Regime::MidToHigh => "MI-HI",
            Regime::LowToHigh => "LO-HI"
        }
    }
}

/// Interference of higher-priority tasks within a busy window, for a fixed
/// regime and fixed switch points.
struct Interference<'a> {
    modes: &'static [Mode],
    /// Own response times in all but the last of `modes`.
    switches: &'a [Time]
}

impl Interference<'_> {
    /// Demand of task `j` in a busy window of length `r`.
    fn demand(&self, j: &Task, r: Time) -> Time {
        let (&last, earlier) = match self.modes.split_last() {
            Some(split) => split,
            None => return 0
        };

        match j.criticality {
            Criticality::High => r.div_ceil(j.period) * j.budget(last),
            Criticality::Low => {
                let mut start = 0;
                let mut out = 0;

                for (&mode, &end) in earlier.iter().zip(self.switches) {
                    out += end.saturating_sub(start).div_ceil(j.period) * j.budget(mode);
                    start = end;
                }

                out + r.saturating_sub(start).div_ceil(j.period) * j.budget(last)
            }
        }
    }
}

/// Computes the worst-case response time of the task at index `task` of `ts`
/// under `regime`.
///
/// The result is either the least fixed point or, if it would exceed the task's
/// deadline, the first iterate that does; callers compare it against
/// [`Task::deadline`]. A task whose budget in the regime's final mode is zero
/// (a LOW task in HIGH mode) is dropped and returns zero.
pub fn response_time(task: usize, ts: &TaskSet, regime: Regime) -> Time {
    let tua = &ts[task];
    let own = tua.budget(regime.target());

    if own == 0 {
        return 0;
    }

    let modes = regime.modes();
    let switches = modes[.. modes.len() - 1].iter()
                                            .map(|&m| response_time(task, ts, Regime::steady(m)))
                                            .collect::<Box<_>>();

    let inter = Interference { modes, switches: &switches };
    let hp = &ts.tasks()[.. task];

    let mut r = own;
    let mut steps = 0usize;

    loop {
        let next = own + hp.iter().map(|j| inter.demand(j, r)).sum::<Time>();
        steps += 1;

        if next > tua.deadline() || next == r {
            trace!(task, regime = regime.name(), response = next, steps, "response time");
            return next;
        }

        r = next;
    }
}

/// Tests whether the task at index `task` of `ts` meets its deadline under `regime`.
pub fn schedulable(task: usize, ts: &TaskSet, regime: Regime) -> bool {
    response_time(task, ts, regime) <= ts[task].deadline()
}

/// Tests whether every task of `ts` meets its deadline under `regime`.
pub fn all_schedulable(ts: &TaskSet, regime: Regime) -> bool {
    (0 .. ts.len()).all(|i| schedulable(i, ts, regime))
}
