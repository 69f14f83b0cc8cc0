//! Monte Carlo experiments over randomly synthesized task-sets.

use crate::{
    config::Config,
    error::{Error, TaskSetError},
    gamma,
    gen::Tasks,
    overrun::{self, Outcome},
    rta::{self, Regime},
    task::{Gamma, TaskSet}
};

use itertools::Itertools;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, trace};

use std::{fmt, thread};

/// Counters for one preset gamma.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Preset {
    pub degraded: usize,
    pub rescued: usize,
    pub low_served: usize
}

impl Preset {
    fn collect(&mut self, out: &Outcome) {
        self.degraded += usize::from(out.degraded);
        self.rescued += usize::from(out.rescued());
        self.low_served += out.low_served;
    }
}

/// Counters accumulated over the trials of one utilization level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub trials: usize,
    /// Trials where every HIGH task survives a direct LOW to HIGH switch.
    pub baseline: usize,
    /// Trials the system survives with approximate computing at the optimized gamma.
    pub degraded: usize,
    /// Trials lost by the baseline but saved by approximate computing.
    pub rescued: usize,
    /// Task-sets not schedulable even in LOW mode; they are evaluated anyway.
    pub low_unschedulable: usize,
    /// Counters at each preset gamma, on the same overruns as the optimized one.
    pub presets: Box<[Preset]>,
    /// LOW tasks served at the optimized gamma.
    pub low_served: usize,
    pub low_total: usize,
    /// Sum of optimized gammas, in hundredths.
    pub gamma_sum: u64
}

impl Tally {
    fn new(presets: usize) -> Self {
        Self {
            presets: vec![Preset::default(); presets].into_boxed_slice(),
            ..Self::default()
        }
    }

    fn collect(&mut self, out: &Outcome, gamma: Gamma) {
        self.trials += 1;
        self.baseline += usize::from(out.baseline);
        self.degraded += usize::from(out.degraded);
        self.rescued += usize::from(out.rescued());
        self.low_served += out.low_served;
        self.low_total += out.low_total;
        self.gamma_sum += u64::from(gamma.percent());
    }

    /// Mean optimized gamma over all trials.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_gamma(&self) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }

        self.gamma_sum as f64 / (self.trials as f64 * f64::from(Gamma::STEPS))
    }
}

/// Aggregate results for one target utilization.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub util: f64,
    pub tally: Tally
}

/// Results of a whole experiment, printed as a tab-separated table.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub presets: Vec<Gamma>,
    pub records: Vec<Record>
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = ["util", "trials", "baseline", "degraded", "rescued", "low_unsched"]
            .into_iter()
            .map(str::to_owned)
            .chain(self.presets.iter().map(|g| format!("degraded@{g}")))
            .chain(self.presets.iter().map(|g| format!("rescued@{g}")))
            .chain(self.presets.iter().map(|g| format!("low@{g}")))
            .chain(["low@opt", "low_total", "mean_gamma"].into_iter().map(str::to_owned))
            .join("\t");

        write!(f, "{header}")?;

        for Record { util, tally } in &self.records {
            let row = [
                format!("{util:.3}"),
                tally.trials.to_string(),
                tally.baseline.to_string(),
                tally.degraded.to_string(),
                tally.rescued.to_string(),
                tally.low_unschedulable.to_string()
            ].into_iter()
             .chain(tally.presets.iter().map(|p| p.degraded.to_string()))
             .chain(tally.presets.iter().map(|p| p.rescued.to_string()))
             .chain(tally.presets.iter().map(|p| p.low_served.to_string()))
             .chain([
                tally.low_served.to_string(),
                tally.low_total.to_string(),
                format!("{:.4}", tally.mean_gamma())
             ])
             .join("\t");

            writeln!(f)?;
            write!(f, "{row}")?;
        }

        Ok(())
    }
}

/// A Monte Carlo experiment.
pub struct Experiment<'a> {
    config: &'a Config,
    tasks: Tasks<'a>
}

impl<'a> Experiment<'a> {
    /// Constructs a new `Experiment` for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not [validate](`Config::validate`).
    pub fn new(config: &'a Config) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self { config, tasks: config.tasks()? })
    }

    /// Runs every utilization level, each on its own thread.
    ///
    /// Each level draws from its own generator, seeded in level order from the
    /// configured seed, so the report only depends on the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any level.
    pub fn run(&self) -> Result<Report, Error> {
        let mut master = StdRng::seed_from_u64(self.config.seed);
        let seeds = self.config.utilizations.iter()
                                            .map(|_| master.gen::<u64>())
                                            .collect::<Vec<_>>();

        let records = thread::scope(|s| {
            let handles = self.config.utilizations.iter().zip(seeds)
                .map(|(&util, seed)| s.spawn(move || self.level(util, seed)))
                .collect::<Vec<_>>();

            handles.into_iter()
                   .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                   .collect::<Result<Vec<_>, _>>()
        })?;

        Ok(Report {
            presets: self.config.presets.clone(),
            records
        })
    }

    /// Runs all trials for target utilization `util`.
    ///
    /// # Errors
    ///
    /// Returns an error if a task-set cannot be synthesized.
    pub fn level(&self, util: f64, seed: u64) -> Result<Record, Error> {
        debug!(util, seed, trials = self.config.trials, "starting level");

        let mut rng = StdRng::seed_from_u64(seed);
        let mut tally = Tally::new(self.config.presets.len());

        for _ in 0 .. self.config.trials {
            self.trial(util, &mut rng, &mut tally)?;
        }

        debug!(util, ?tally, "finished level");

        Ok(Record { util, tally })
    }

    fn trial(&self, util: f64, rng: &mut StdRng, tally: &mut Tally) -> Result<(), Error> {
        let ts = self.tasks.gen(util, rng)?;

        self.assess(ts, rng, tally)
    }

    /// Optimizes gamma for `ts`, draws one overrun and classifies it at the
    /// optimized gamma and at every preset.
    ///
    /// `tally` is left untouched on error.
    fn assess(&self, mut ts: TaskSet, rng: &mut StdRng, tally: &mut Tally) -> Result<(), Error> {
        let low_ok = rta::all_schedulable(&ts, Regime::Low);
        let gamma = gamma::optimize(&mut ts);
        let (overrun, out) = overrun::evaluate(&ts, rng).ok_or(TaskSetError::NoHighTask)?;

        if !low_ok {
            trace!(nominal = ts.nominal_utilization(), "task-set not schedulable in LOW mode");
            tally.low_unschedulable += 1;
        }

        for (counts, &preset) in tally.presets.iter_mut().zip(&self.config.presets) {
            ts.apply_gamma(preset);
            counts.collect(&overrun::classify(&ts, overrun));
        }

        trace!(%gamma, ?overrun, ?out, "trial");
        tally.collect(&out, gamma);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        overrun::Overrun,
        task::Task
    };

    fn small() -> Config {
        Config {
            trials: 200,
            utilizations: vec![0.2, 0.5, 0.8],
            seed: 42,
            ..Config::default()
        }
    }

    #[test]
    fn tallies_are_consistent() {
        let config = small();
        let report = Experiment::new(&config).unwrap().run().unwrap();

        assert_eq!(report.records.len(), 3);

        for Record { tally, .. } in &report.records {
            assert_eq!(tally.trials, 200);
            assert!(tally.baseline <= tally.trials);
            assert!(tally.degraded <= tally.trials);
            assert!(tally.rescued <= tally.degraded);
            assert_eq!(tally.low_total, 200 * (config.num_tasks - config.hi_count));
            assert!(tally.low_served <= tally.low_total);

            for p in &*tally.presets {
                assert!(p.degraded <= tally.trials);
                assert!(p.rescued <= p.degraded);
                assert!(p.rescued <= tally.trials - tally.baseline);
                assert!(p.low_served <= tally.low_total);
            }

            assert!((0.01 ..= 0.99).contains(&tally.mean_gamma()));
        }
    }

    #[test]
    fn light_load_is_mostly_safe() {
        let config = Config {
            trials: 100,
            utilizations: vec![0.1],
            ..small()
        };

        let report = Experiment::new(&config).unwrap().run().unwrap();
        let tally = &report.records[0].tally;

        assert_eq!(tally.low_unschedulable, 0);
        assert!(tally.degraded >= 90, "{tally:?}");
    }

    #[test]
    fn same_seed_same_report() {
        let config = small();
        let a = Experiment::new(&config).unwrap().run().unwrap();
        let b = Experiment::new(&config).unwrap().run().unwrap();

        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn report_layout() {
        let config = Config {
            trials: 10,
            utilizations: vec![0.3, 0.6],
            ..small()
        };

        let text = Experiment::new(&config).unwrap().run().unwrap().to_string();
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("util\ttrials\tbaseline\tdegraded\trescued\tlow_unsched\tdegraded@0.10"));
        assert!(lines[0].contains("\tdegraded@0.90\trescued@0.10\t"));
        assert!(lines[0].contains("\trescued@0.90\tlow@0.10\t"));
        assert!(lines[0].ends_with("\tlow@0.90\tlow@opt\tlow_total\tmean_gamma"));

        let columns = 6 + 3 * config.presets.len() + 3;
        assert!(lines.iter().all(|l| l.split('\t').count() == columns));
        assert!(lines[1].starts_with("0.300\t10\t"));
    }

    #[test]
    fn presets_share_the_overrun() {
        let config = Config {
            presets: vec![Gamma::from_percent(50).unwrap(), Gamma::from_percent(99).unwrap()],
            ..small()
        };
        let experiment = Experiment::new(&config).unwrap();

        // task 1 misses across LO-HI and MI-HI: 9 + 6 ceil(R/10) = 21 > 20.
        // Across LO-MI it fits at 0.50 (6 + 4 = 10) but not at 0.99 (9 + 2 * 6 = 21).
        let ts = TaskSet::new([
            Task::new(2, 10).high(3.0),
            Task::new(3, 20).high(3.0)
        ]).unwrap();

        let mut rng = StdRng::seed_from_u64(9);
        let mut replay = rng.clone();
        let mut tally = Tally::new(config.presets.len());

        for _ in 0 .. 200 {
            experiment.assess(ts.clone(), &mut rng, &mut tally).unwrap();
        }

        // MID budgets at 0.50 are 4 and 6
        let within_mid = (0 .. 200).filter(|_| {
            let o = Overrun::sample(&ts, &mut replay).unwrap();
            o.demand <= [4, 6][o.task]
        }).count();

        assert!(within_mid > 0 && within_mid < 200);
        assert_eq!(tally.trials, 200);
        assert_eq!(tally.baseline, 0);
        assert_eq!(tally.presets[0], Preset { degraded: within_mid, rescued: within_mid, low_served: 0 });
        assert_eq!(tally.presets[1], Preset::default());
    }

    #[test]
    fn set_without_high_task_leaves_tally_untouched() {
        let config = small();
        let experiment = Experiment::new(&config).unwrap();

        // not schedulable in LOW mode either: 5 + 12 = 17 > 12
        let ts = TaskSet::new([Task::new(6, 10), Task::new(5, 12)]).unwrap();

        let mut rng = StdRng::seed_from_u64(10);
        let mut tally = Tally::new(config.presets.len());

        assert_eq!(
            experiment.assess(ts, &mut rng, &mut tally),
            Err(Error::TaskSet(TaskSetError::NoHighTask))
        );
        assert_eq!(tally, Tally::new(config.presets.len()));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = Config { hi_count: 0, ..small() };
        assert!(matches!(Experiment::new(&config), Err(Error::Config(_))));
    }
}
