#![warn(clippy::pedantic)]

use mcap::{
    task::{Gamma, TaskSet, Time, Criticality},
    config::Config,
    gen::UtilGen,
    harness::Experiment,
    rta::{self, Regime},
    gamma
};

use anyhow::Context;
use clap::Parser;
use itertools::Itertools;
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::fmt;

/// Per-task response times of a single task-set in every regime.
struct Analysis<'a> {
    ts: &'a TaskSet,
    gamma: Gamma
}

impl fmt::Display for Analysis<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "gamma\t{}\tmid_schedulable\t{}", self.gamma, gamma::mid_schedulable(self.ts))?;

        write!(f, "idx\tcrit\tT\tC_LO\tC_MI\tC_HI")?;

        for regime in Regime::ALL {
            write!(f, "\t{}", regime.name())?;
        }

        for (i, task) in self.ts.tasks().iter().enumerate() {
            let crit = match task.criticality {
                Criticality::Low  => "LO",
                Criticality::High => "HI"
            };

            let times = Regime::ALL.iter().map(|&regime| {
                let r = rta::response_time(i, self.ts, regime);

                if r > task.deadline() {
                    format!("{r}!")
                } else {
                    r.to_string()
                }
            }).join("\t");

            writeln!(f)?;
            write!(f, "{i}\t{crit}\t{}\t{}\t{}\t{}\t{times}",
                   task.period, task.budget_low, task.budget_mid, task.budget_high)?;
        }

        Ok(())
    }
}

#[derive(Parser)]
struct TaskArgs {
    #[arg(short = 'n', default_value_t = 5)]
    /// Number of tasks per task-set
    num_tasks: usize,
    #[arg(short = 'k')]
    /// Number of HIGH tasks [default: half the tasks, rounded up]
    hi_count: Option<usize>,
    #[arg(short = 'p', value_delimiter = ',')]
    /// Comma-separated period domain [default: 250,500,1000,2000,5000,10000]
    periods: Vec<Time>,
    #[arg(short = 'l', default_value_t = 0.7)]
    /// MID budget of LOW tasks relative to their LOW budget
    low_factor: f64,
    #[arg(short = 'm', default_value_t = 3.0)]
    /// HIGH budget of HIGH tasks relative to their LOW budget
    high_multiplier: f64,
    #[arg(short = 's', default_value_t = 0)]
    /// Random seed
    seed: u64,
    #[arg(value_enum, short = 'g', default_value_t = UtilGen::UUniFast)]
    /// Utilization vector generator
    utils: UtilGen
}

impl TaskArgs {
    fn config(self) -> Config {
        let defaults = Config::default();

        Config {
            hi_count: self.hi_count.unwrap_or(self.num_tasks.div_ceil(2)),
            num_tasks: self.num_tasks,
            periods: if self.periods.is_empty() { defaults.periods.clone() } else { self.periods },
            low_factor: self.low_factor,
            high_multiplier: self.high_multiplier,
            seed: self.seed,
            utils: self.utils,
            ..defaults
        }
    }
}

#[derive(Parser)]
#[command(version)]
enum Command {
    /// Sweep target utilizations and print aggregate counters per level
    Run {
        #[command(flatten)]
        args: TaskArgs,
        #[arg(short = 't', default_value_t = 10_000)]
        /// Trials per utilization level
        trials: usize,
        #[arg(short = 'u', value_delimiter = ',')]
        /// Comma-separated target utilizations [default: 0.10 to 0.95, step 0.05]
        utilizations: Vec<f64>,
        #[arg(short = 'G', value_delimiter = ',')]
        /// Comma-separated preset gammas [default: 0.1 to 0.9, step 0.1]
        presets: Vec<Gamma>
    },
    /// Synthesize one task-set, optimize gamma and print all response times
    Analyze {
        #[command(flatten)]
        args: TaskArgs,
        #[arg(short = 'u', default_value_t = 0.7)]
        /// Target utilization
        util: f64
    }
}

fn main() -> anyhow::Result<()> {
    // logs go to stderr, results to stdout; level from RUST_LOG
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    match Command::parse() {
        Command::Run { args, trials, utilizations, presets } => {
            let mut config = Config { trials, ..args.config() };

            if !utilizations.is_empty() {
                config.utilizations = utilizations;
            }

            if !presets.is_empty() {
                config.presets = presets;
            }

            info!(?config, "starting experiment");

            let report = Experiment::new(&config)
                .context("invalid configuration")?
                .run()?;

            println!("{report}");
        }
        Command::Analyze { args, util } => {
            let config = args.config();
            info!(?config, util, "analyzing a single task-set");

            let mut rng = StdRng::seed_from_u64(config.seed);
            let mut ts = config.tasks()
                               .context("invalid configuration")?
                               .gen(util, &mut rng)?;

            let gamma = gamma::optimize(&mut ts);

            println!("{}", Analysis { ts: &ts, gamma });
        }
    }

    Ok(())
}
