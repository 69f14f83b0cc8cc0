//! Generators for utilization vectors and mixed-criticality task-sets.

use crate::{
    task::{Task, TaskSet, Time},
    error::{ConfigError, Error}
};

use rand::{
    seq::{index, SliceRandom},
    Rng
};
use tracing::trace;

use std::mem;

/// Algorithm used to split a total utilization among tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum UtilGen {
    /// Bini and Buttazzo's UUniFast.
    #[default]
    #[value(name = "uunifast")]
    UUniFast,
    /// Stafford's RandFixedSum, which also bounds each share by `1`.
    #[value(name = "randfixedsum")]
    RandFixedSum
}

impl UtilGen {
    /// Returns `num` positive shares summing to `total`.
    ///
    /// The caller must ensure `num > 0` and `0 < total < num`.
    pub fn gen(self, num: usize, total: f64, rng: &mut impl Rng) -> Box<[f64]> {
        match self {
            UtilGen::UUniFast     => uunifast(num, total, rng),
            UtilGen::RandFixedSum => Rfs::new(num, total).gen(rng)
        }
    }
}

/// Bini and Buttazzo's UUniFast: uniform over the simplex of `num` shares summing
/// to `total`.
#[allow(clippy::cast_precision_loss)]
fn uunifast(num: usize, total: f64, rng: &mut impl Rng) -> Box<[f64]> {
    let mut out = Vec::with_capacity(num);
    let mut sum = total;

    for i in 1 .. num {
        let next = sum * rng.gen::<f64>().powf(((num - i + 1) as f64).recip());
        out.push(sum - next);
        sum = next;
    }

    out.push(sum);
    out.into_boxed_slice()
}

/// Generator that implements Stafford's RandFixedSum on the unit cube.
struct Rfs {
    /// Transition probabilities; `t[i][j]` is used only where `j <= i + 1`.
    t: Box<[Box<[f64]>]>,
    s: f64,
    k: usize
}

impl Rfs {
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss,
            clippy::cast_possible_truncation)]
    fn new(length: usize, s: f64) -> Self {
        let k = (s as usize).clamp(0, length - 1); // must have 0 <= k <= length-1
        let s = s.clamp(k as f64, (k+1) as f64);   // must have k <= s <= k+1

        let mut w = vec![0.0; length].into_boxed_slice();
        let mut t = (1 .. length).map(|l| vec![0.0; l + 1].into_boxed_slice())
                                 .collect::<Box<_>>();

        w[0] = f64::MAX;

        let delta = s - k as f64;

        for i in 1 .. length {
            let mut lastw = 0.0;

            for j in 0 .. i {
                let coe1 = (j as f64       + delta) / i as f64;
                let coe2 = ((i - j) as f64 - delta) / i as f64;

                let tmp1 = w[j]  * coe1;
                let tmp2 = lastw * coe2;

                lastw = mem::replace(&mut w[j], tmp1 + tmp2);

                t[i-1][j] = if w[j] == 0.0 {
                    f64::from(u8::from(coe1 >= 0.5))
                } else {
                    tmp2 / w[j]
                };
            }
        }

        Self { t, s, k }
    }

    #[allow(clippy::cast_precision_loss)]
    fn gen(&self, rng: &mut impl Rng) -> Box<[f64]> {
        let length = self.t.len() + 1;

        let mut out = vec![0.0; length].into_boxed_slice();

        // start with sum zero & product 1
        let mut sm = 0.0;
        let mut pr = 1.0;

        let mut j = self.k; // for indexing in the t table

        for i in (1 .. length).rev() { // work backwards in the t table
            let s = self.s - (self.k - j) as f64;
            let e = rng.gen::<f64>() < self.t[i-1][j];             // choose a transition
            let sx = rng.gen::<f64>().powf((i as f64).recip());    // compute next simplex coord.
            sm += (1.0 - sx) * pr * s / (i + 1) as f64;            // update sum
            pr *= sx;                                              // update product
            out[length - i] = f64::from(u8::from(e)).mul_add(pr, sm);
            // transition adjustment
            j -= usize::from(e);
        }

        out[0] = (self.s - (self.k - j) as f64).mul_add(pr, sm);
        out.shuffle(rng);

        out
    }
}

/// Synthesizer for mixed-criticality task-sets.
#[derive(Clone, Debug)]
pub struct Tasks<'a> {
    num: usize,
    hi_count: usize,
    periods: &'a [Time],
    low_factor: f64,
    high_multiplier: f64,
    utils: UtilGen
}

impl<'a> Tasks<'a> {
    /// Constructs a new `Tasks` with the given parameters.
    ///
    /// Each generated task-set will have `num` tasks, exactly `hi_count` of them
    /// HIGH, with periods picked uniformly at random from `periods`. LOW tasks get
    /// MID budgets scaled by `low_factor`, HIGH tasks get HIGH budgets scaled by
    /// `high_multiplier`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for any parameter outside its domain.
    pub fn new(
        num: usize,
        hi_count: usize,
        periods: &'a [Time],
        low_factor: f64,
        high_multiplier: f64
    ) -> Result<Self, ConfigError> {
        if num == 0 {
            return Err(ConfigError::NoTasks);
        }

        if hi_count == 0 || hi_count > num {
            return Err(ConfigError::HighCount { hi_count, num_tasks: num });
        }

        if periods.is_empty() {
            return Err(ConfigError::NoPeriods);
        }

        if periods.contains(&0) {
            return Err(ConfigError::ZeroPeriod);
        }

        if !(low_factor > 0.0 && low_factor <= 1.0) {
            return Err(ConfigError::LowFactor(low_factor));
        }

        if !(high_multiplier > 1.0 && high_multiplier.is_finite()) {
            return Err(ConfigError::HighMultiplier(high_multiplier));
        }

        Ok(Self {
            num,
            hi_count,
            periods,
            low_factor,
            high_multiplier,
            utils: UtilGen::default()
        })
    }

    /// Returns the generator with utilization vectors drawn by `utils`.
    pub fn with_utils(self, utils: UtilGen) -> Self {
        Self { utils, ..self }
    }

    /// Runs the generator for total LOW-mode utilization `util`.
    ///
    /// Tasks are kept in deadline-monotonic order, ties in order of generation.
    /// Task-sets that are not schedulable even in LOW mode are returned as well.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Utilization`] unless `0 < util < num`.
    /// The [`TaskSetError`](`crate::error::TaskSetError`) case cannot occur for a
    /// generator built by [`Tasks::new`].
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss,
            clippy::cast_possible_truncation)]
    pub fn gen(&self, util: f64, rng: &mut impl Rng) -> Result<TaskSet, Error> {
        let max = self.num as f64;

        if !(util > 0.0 && util < max) {
            return Err(ConfigError::Utilization { util, max }.into());
        }

        let shares = self.utils.gen(self.num, util, rng);

        let mut tasks = IntoIterator::into_iter(shares).map(|u| {
            let period = self.periods[rng.gen_range(0 .. self.periods.len())];

            Task::new(
                ((period as f64 * u).floor() as Time).max(1),
                period
            )
        }).collect::<Box<_>>();

        // stable, so equal periods keep generation order
        tasks.sort_by_key(|t| t.period);

        for i in index::sample(rng, self.num, self.hi_count) {
            tasks[i] = tasks[i].high(self.high_multiplier);
        }

        for task in tasks.iter_mut().filter(|t| !t.is_high()) {
            *task = task.degraded(self.low_factor);
        }

        trace!(util, tasks = ?tasks, "synthesized task-set");

        Ok(TaskSet::new(tasks)?)
    }
}
