use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "LSN lab driver - run the numerical simulation exercises, read their results and plot them.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used by parameter sweeps.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

/// Options shared by every exercise: where the project lives and how runs are performed.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Path to a TOML configuration file.
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Project root holding `bin/`, `results/`, `data/` and `solutions/`. Defaults to `..`.
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Directory where charts are written. Defaults to `<root>/plots`.
    #[arg(long, global = true, value_name = "DIR")]
    pub plots_dir: Option<PathBuf>,

    /// Override a configuration value (e.g., -S ising.n-spins=50). Can be repeated.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", global = true)]
    pub set_values: Vec<String>,

    /// Print the simulator command lines instead of running them.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(flatten)]
    pub cache: CacheFlags,
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct CacheFlags {
    /// Skip runs whose results are already on disk.
    #[arg(long, global = true, conflicts_with = "no_cache")]
    pub use_cached: bool,

    /// Always run the simulators, even when results exist.
    #[arg(long, global = true)]
    pub no_cache: bool,
}

impl CacheFlags {
    pub fn resolve(&self) -> Option<bool> {
        if self.use_cached {
            Some(true)
        } else if self.no_cache {
            Some(false)
        } else {
            None
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Exercise 06: Metropolis and Gibbs sampling of the 1-D Ising model.
    Ising(IsingArgs),
    /// Exercise 07: Monte Carlo and molecular dynamics of a Lennard-Jones fluid.
    Md(MdArgs),
    /// Exercise 08: variational Monte Carlo with simulated annealing in a double well.
    Annealing(AnnealingArgs),
    /// Exercise 09: genetic algorithm for the travelling salesman problem.
    Tsp(TspArgs),
    /// Exercise 10: parallel genetic algorithm with migrations between MPI continents.
    Migration(MigrationArgs),
    /// Block uncertainties and correlation times of the columns of any CSV file.
    Stats(StatsArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsingAction {
    /// Equilibrate every temperature of the sweep.
    Equilibrate,
    /// Autocorrelation of the equilibrated runs.
    Autocorrelate,
    /// Block measures at every temperature, resuming from the equilibrated spins.
    Measure,
    /// Measures with a single sampler for each configured block size.
    BlockMeasure,
    /// Charts of the equilibrations, autocorrelations and results.
    Plot,
    /// Equilibrate, autocorrelate and measure.
    All,
}

/// Arguments for the `ising` subcommand.
#[derive(Args, Debug, Clone)]
pub struct IsingArgs {
    #[arg(value_enum)]
    pub action: IsingAction,

    /// Temperatures: `start:stop:count` or a comma-separated list.
    #[arg(short = 'T', long, value_name = "GRID")]
    pub temperatures: Option<String>,

    /// Comma-separated samplers (metropolis, gibbs).
    #[arg(long, value_name = "LIST")]
    pub samplers: Option<String>,

    /// External magnetic field.
    #[arg(long, allow_hyphen_values = true)]
    pub field: Option<f64>,

    /// Spin coupling.
    #[arg(long, allow_hyphen_values = true)]
    pub coupling: Option<f64>,

    #[arg(long, value_name = "NUM")]
    pub n_spins: Option<u32>,

    /// Line of the primes file used to seed the generator.
    #[arg(long, value_name = "LINE")]
    pub prime_line: Option<usize>,

    /// Compute autocorrelations in-process instead of running the simulator.
    #[arg(long)]
    pub in_process: bool,

    /// Comma-separated block sizes for `block-measure`.
    #[arg(long, value_name = "LIST")]
    pub block_sizes: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdAction {
    /// Two warmup runs of each phase.
    Equilibrate,
    /// Measures of each phase, starting from the first warmup.
    Run,
    /// Warmup then measures of every phase.
    Simulate,
    /// Warmup of the Monte Carlo / molecular dynamics comparison.
    CompareEquilibrate,
    /// Measures of the Monte Carlo / molecular dynamics comparison.
    Compare,
    /// Warmup then measures of the comparison, for every phase.
    CompareAll,
    /// Block uncertainties and correlation times of the measured runs.
    Analyse,
    /// Charts of the comparison runs.
    Plot,
}

/// Arguments for the `md` subcommand.
#[derive(Args, Debug, Clone)]
pub struct MdArgs {
    #[arg(value_enum)]
    pub action: MdAction,

    /// Comma-separated phases (e.g., solid,liquid,gas).
    #[arg(long, value_name = "LIST")]
    pub phases: Option<String>,

    /// Line of the primes file used to seed the generator.
    #[arg(long, value_name = "LINE")]
    pub p_line: Option<usize>,

    /// Bins of the radial distribution function.
    #[arg(long, value_name = "NUM")]
    pub n_bins: Option<usize>,

    /// Comma-separated methods (mc, md).
    #[arg(long, value_name = "LIST")]
    pub methods: Option<String>,

    /// Configuration the comparison run starts from (warmup or run).
    #[arg(long, value_name = "STEP")]
    pub start_from: Option<String>,

    #[arg(long, value_name = "NUM")]
    pub block_size: Option<usize>,

    #[arg(long, value_name = "NUM")]
    pub n_lags: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnealingAction {
    /// Simulated annealing of (µ, σ).
    Anneal,
    /// Estimate of `<H>` and histogram of |ψ|² for a (µ, σ) pair.
    Estimate,
    /// Anneal, then estimate with the parameters found.
    All,
    /// Charts of the annealing and of the ground state.
    Plot,
}

/// Arguments for the `annealing` subcommand.
#[derive(Args, Debug, Clone)]
pub struct AnnealingArgs {
    #[arg(value_enum)]
    pub action: AnnealingAction,

    /// Run number, selecting `results/08/<run>`.
    #[arg(long)]
    pub run: Option<u32>,

    #[arg(long, value_name = "LINE")]
    pub p_line: Option<usize>,

    #[arg(long, value_name = "NUM")]
    pub n_temperature_steps: Option<usize>,

    #[arg(long, value_name = "NUM")]
    pub n_explore: Option<usize>,

    /// Initial and final temperature, `T0,Tf`.
    #[arg(long, value_name = "T0,TF")]
    pub t_bounds: Option<String>,

    /// Initial parameters, `µ,σ`.
    #[arg(long, value_name = "MU,SIGMA")]
    pub initial_guess: Option<String>,

    #[arg(long)]
    pub stddev: Option<f64>,

    /// µ used by `estimate`. Defaults to the best annealed value.
    #[arg(long, allow_hyphen_values = true)]
    pub mu: Option<f64>,

    /// σ used by `estimate`. Defaults to the best annealed value.
    #[arg(long)]
    pub sigma: Option<f64>,

    #[arg(long, value_name = "NUM")]
    pub n_bins: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TspAction {
    /// Write the city coordinates of a circle or square problem.
    Generate,
    /// Genetic runs for every crossover and primes line.
    Run,
    /// Best routes and distance trajectories.
    Plot,
}

/// Arguments for the `tsp` subcommand.
#[derive(Args, Debug, Clone)]
pub struct TspArgs {
    #[arg(value_enum)]
    pub action: TspAction,

    /// Problem: circle, square or america.
    #[arg(long)]
    pub tsp: Option<String>,

    /// Comma-separated crossovers (ex, exmod, my2, fusion, dummy).
    #[arg(long, value_name = "LIST")]
    pub algos: Option<String>,

    /// Comma-separated primes lines, one run each.
    #[arg(long, value_name = "LIST")]
    pub p_lines: Option<String>,

    /// City coordinates file.
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    #[arg(long, value_name = "NUM")]
    pub n_iter: Option<usize>,

    #[arg(long, value_name = "NUM")]
    pub pop_size: Option<usize>,

    #[arg(long)]
    pub mut_rate: Option<f64>,

    #[arg(long)]
    pub fusion_p: Option<f64>,

    /// Seed of the square problem's cities.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationAction {
    /// One MPI run for every configuration.
    Run,
    /// Configurations sorted by the best distance found.
    Rank,
    /// Route of the best configurations on the capitals map.
    Plot,
}

/// Arguments for the `migration` subcommand.
#[derive(Args, Debug, Clone)]
pub struct MigrationArgs {
    #[arg(value_enum)]
    pub action: MigrationAction,

    /// City coordinates file. Defaults to the America problem, derived from the capitals when missing.
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Comma-separated crossovers.
    #[arg(long, value_name = "LIST")]
    pub algos: Option<String>,

    /// Comma-separated numbers of continents.
    #[arg(long, value_name = "LIST")]
    pub continents: Option<String>,

    /// Comma-separated fusion probabilities, used by the fusion crossover.
    #[arg(long, value_name = "LIST")]
    pub fusion_ps: Option<String>,

    #[arg(long, value_name = "NUM")]
    pub migration_length: Option<usize>,

    #[arg(long, value_name = "NUM")]
    pub n_migrations: Option<usize>,

    #[arg(long, value_name = "NUM")]
    pub pop_size: Option<usize>,

    #[arg(long)]
    pub mut_rate: Option<f64>,

    #[arg(long, value_name = "LINE")]
    pub p_line: Option<usize>,

    /// How many configurations `rank` prints and `plot` draws.
    #[arg(long, value_name = "NUM")]
    pub top: Option<usize>,
}

/// Arguments for the `stats` subcommand.
#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// CSV file to analyse.
    #[arg(value_name = "PATH")]
    pub file: PathBuf,

    /// Comma-separated columns. Defaults to every column.
    #[arg(long, value_name = "LIST")]
    pub columns: Option<String>,

    #[arg(long, value_name = "NUM", default_value_t = 100)]
    pub block_size: usize,

    /// Comma-separated block sizes to scan.
    #[arg(long, value_name = "LIST")]
    pub scan: Option<String>,

    /// Lags of the autocorrelation; `0` skips the correlation-time fit.
    #[arg(long, value_name = "NUM", default_value_t = 0)]
    pub n_lags: usize,

    /// Data rows skipped at the start of the file.
    #[arg(long, value_name = "NUM")]
    pub skip_rows: Option<usize>,

    /// The file has no header row; columns are named 0, 1, ...
    #[arg(long)]
    pub headerless: bool,

    /// Write the block-size scan to this CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_options_parse_after_the_subcommand() {
        let cli = Cli::parse_from([
            "lsn",
            "ising",
            "equilibrate",
            "-T",
            "0.5:2.0:4",
            "--root",
            "/lab",
            "-S",
            "ising.n-spins=20",
            "-S",
            "project.use-cached=true",
            "--dry-run",
            "-vv",
        ]);

        assert_eq!(cli.verbose, 2);
        assert!(cli.project.dry_run);
        assert_eq!(cli.project.root, Some(PathBuf::from("/lab")));
        assert_eq!(
            cli.project.set_values,
            vec!["ising.n-spins=20", "project.use-cached=true"]
        );
        let Commands::Ising(args) = cli.command else {
            panic!("Expected 'ising' subcommand");
        };
        assert_eq!(args.action, IsingAction::Equilibrate);
        assert_eq!(args.temperatures.as_deref(), Some("0.5:2.0:4"));
    }

    #[test]
    fn cache_flags_conflict() {
        let result = Cli::try_parse_from(["lsn", "tsp", "run", "--use-cached", "--no-cache"]);
        assert!(result.is_err());
    }

    #[test]
    fn cache_flags_resolve_to_an_override() {
        let cli = Cli::parse_from(["lsn", "tsp", "run", "--no-cache"]);
        assert_eq!(cli.project.cache.resolve(), Some(false));
        let cli = Cli::parse_from(["lsn", "tsp", "run"]);
        assert_eq!(cli.project.cache.resolve(), None);
    }

    #[test]
    fn negative_fields_are_accepted() {
        let cli = Cli::parse_from(["lsn", "ising", "measure", "--field", "-0.02"]);
        let Commands::Ising(args) = cli.command else {
            panic!("Expected 'ising' subcommand");
        };
        assert_eq!(args.field, Some(-0.02));
    }
}
