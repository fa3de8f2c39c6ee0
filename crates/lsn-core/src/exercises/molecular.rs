use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

use crate::core::charts::{Panel, Series};
use crate::core::fit::{CorrelationTime, FitOptions, estimate_correlation_time};
use crate::core::layout::ProjectLayout;
use crate::core::stats::{autocorrelation, block_size_scan, block_uncertainty};
use crate::core::table::Table;
use crate::engine::context::LabContext;
use crate::engine::error::{ConfigError, EngineError};
use crate::engine::invocation::Invocation;
use crate::engine::runner::{Outcome, run_unless_cached};
use crate::engine::seeding::RngSeeding;
use crate::engine::sweep::sweep;

pub const SECTION: &str = "07";
/// Monte Carlo NVT runs of a single phase.
pub const SINGLE: &str = "07_2";
/// Monte Carlo and molecular dynamics side by side.
pub const COMPARISON: &str = "07_4";
pub const THERMO_FILE: &str = "thermo.csv";
pub const RADIAL_FILE: &str = "g_r.csv";
pub const SETTINGS_FILE: &str = "input";

/// Sub-exercise numbers, used as the first level of both input and result directories.
const SINGLE_PART: u32 = 2;
const COMPARISON_PART: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Mc,
    Md,
}

impl Method {
    pub const ALL: [Method; 2] = [Method::Mc, Method::Md];

    pub fn tag(&self) -> &'static str {
        match self {
            Method::Mc => "mc",
            Method::Md => "md",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mc" => Ok(Method::Mc),
            "md" => Ok(Method::Md),
            other => Err(ConfigError::InvalidValue {
                name: "method",
                reason: format!("unknown method '{}', expected 'mc' or 'md'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Warmup,
    Run,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Warmup => "warmup",
            Step::Run => "run",
        }
    }
}

impl FromStr for Step {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warmup" => Ok(Step::Warmup),
            "run" => Ok(Step::Run),
            other => Err(ConfigError::InvalidValue {
                name: "step",
                reason: format!("unknown step '{}', expected 'warmup' or 'run'", other),
            }),
        }
    }
}

// --- Paths ---

fn nested(base: PathBuf, part: u32, phase: &str, step: Step, method: Option<Method>) -> PathBuf {
    let dir = base.join(part.to_string()).join(phase).join(step.as_str());
    match method {
        Some(m) => dir.join(m.tag()),
        None => dir,
    }
}

/// Hand-written starting point of a simulation: settings file and initial configuration.
pub fn zero_dir(
    layout: &ProjectLayout,
    part: u32,
    phase: &str,
    step: Step,
    method: Option<Method>,
) -> PathBuf {
    nested(layout.input_dir(SECTION), part, phase, step, method)
}

/// Where the results of a phase and step are stored.
pub fn measures_dir(
    layout: &ProjectLayout,
    part: u32,
    phase: &str,
    step: Step,
    method: Option<Method>,
) -> PathBuf {
    nested(layout.results_dir(SECTION), part, phase, step, method)
}

fn warmup_run_dir(layout: &ProjectLayout, phase: &str, run: usize) -> PathBuf {
    measures_dir(layout, SINGLE_PART, phase, Step::Warmup, None).join(run.to_string())
}

// --- Runs ---

/// Two independent equilibrations of `phase`, on prime lines `p_line` and `p_line + 1`.
///
/// Each run is skipped on its own when caching and its `thermo.csv` already exists.
pub fn equilibrate_single(
    ctx: &LabContext,
    phase: &str,
    p_line: usize,
) -> Result<[Outcome; 2], EngineError> {
    let settings = zero_dir(ctx.layout, SINGLE_PART, phase, Step::Warmup, None);
    let run = |index: usize, line: usize| {
        let out = warmup_run_dir(ctx.layout, phase, index);
        let invocation = Invocation::new(ctx.layout.executable(SINGLE))
            .flag("in", &settings)
            .flag("out", &out)
            .seeded(&ctx.seeding(line))
            .capture_output(true);
        run_unless_cached(ctx.runner, ctx.cache, &out.join(THERMO_FILE), &invocation)
    };
    Ok([run(1, p_line)?, run(2, p_line + 1)?])
}

/// Measures starting from the first equilibration, with the settings of the `run` step.
pub fn run_single(ctx: &LabContext, phase: &str, p_line: usize) -> Result<Outcome, EngineError> {
    let out = measures_dir(ctx.layout, SINGLE_PART, phase, Step::Run, None);
    let invocation = Invocation::new(ctx.layout.executable(SINGLE))
        .flag("in", warmup_run_dir(ctx.layout, phase, 1))
        .flag("out", &out)
        .flag(
            "settings",
            zero_dir(ctx.layout, SINGLE_PART, phase, Step::Run, None).join(SETTINGS_FILE),
        )
        .seeded(&RngSeeding::primes_only(ctx.layout, p_line))
        .capture_output(true);
    run_unless_cached(ctx.runner, ctx.cache, &out.join(THERMO_FILE), &invocation)
}

fn method_switches(invocation: Invocation, methods: &[Method]) -> Invocation {
    invocation.switches(methods.iter().map(Method::tag))
}

/// Equilibrates both methods from the hand-written configurations. Never cached.
pub fn equilibrate_comparison(
    ctx: &LabContext,
    phase: &str,
    p_line: usize,
    methods: &[Method],
) -> Result<Outcome, EngineError> {
    let zero = |m| zero_dir(ctx.layout, COMPARISON_PART, phase, Step::Warmup, Some(m));
    let invocation = Invocation::new(ctx.layout.executable(COMPARISON))
        .flag("in_mc", zero(Method::Mc))
        .flag("in_md", zero(Method::Md))
        .flag(
            "out",
            measures_dir(ctx.layout, COMPARISON_PART, phase, Step::Warmup, None),
        )
        .seeded(&ctx.seeding(p_line))
        .flag("n_bins", 0usize)
        .switch("warmup", true)
        .capture_output(true);
    ctx.runner
        .run(&method_switches(invocation, methods))
        .map(Outcome::Ran)
}

/// Block measures of both methods, radial distribution included when `n_bins > 0`.
///
/// `start_from` picks the configurations the run resumes from, usually the equilibration.
pub fn run_comparison(
    ctx: &LabContext,
    phase: &str,
    n_bins: usize,
    p_line: usize,
    methods: &[Method],
    start_from: Step,
) -> Result<Outcome, EngineError> {
    let start = |m| measures_dir(ctx.layout, COMPARISON_PART, phase, start_from, Some(m));
    let settings = |m| {
        zero_dir(ctx.layout, COMPARISON_PART, phase, Step::Run, Some(m)).join(SETTINGS_FILE)
    };
    let invocation = Invocation::new(ctx.layout.executable(COMPARISON))
        .flag("in_mc", start(Method::Mc))
        .flag("mc_settings", settings(Method::Mc))
        .flag("in_md", start(Method::Md))
        .flag("md_settings", settings(Method::Md))
        .flag(
            "out",
            measures_dir(ctx.layout, COMPARISON_PART, phase, Step::Run, None),
        )
        .seeded(&ctx.seeding(p_line))
        .flag("n_bins", n_bins)
        .capture_output(true);
    ctx.runner
        .run(&method_switches(invocation, methods))
        .map(Outcome::Ran)
}

/// Equilibrates then measures every phase, phases in parallel.
#[instrument(skip_all, name = "md_single_phases")]
pub fn simulate_phases(
    ctx: &LabContext,
    phases: &[String],
    p_line: usize,
) -> Result<Vec<Outcome>, EngineError> {
    info!(n = phases.len(), "Simulating phases");
    sweep(ctx, "Phases", phases, |phase| {
        for outcome in equilibrate_single(ctx, phase, p_line)? {
            log_acceptance(phase, &outcome);
        }
        let outcome = run_single(ctx, phase, p_line)?;
        log_acceptance(phase, &outcome);
        Ok(outcome)
    })
}

/// Equilibration and measures of both methods for every phase, phases in parallel.
#[instrument(skip_all, name = "md_comparison_phases")]
pub fn compare_phases(
    ctx: &LabContext,
    phases: &[String],
    n_bins: usize,
    p_line: usize,
    methods: &[Method],
) -> Result<Vec<Outcome>, EngineError> {
    info!(n = phases.len(), n_bins, "Comparing methods");
    sweep(ctx, "Phases", phases, |phase| {
        log_acceptance(phase, &equilibrate_comparison(ctx, phase, p_line, methods)?);
        let outcome = run_comparison(ctx, phase, n_bins, p_line, methods, Step::Warmup)?;
        log_acceptance(phase, &outcome);
        Ok(outcome)
    })
}

/// The simulators print their acceptance rate on stdout.
fn log_acceptance(phase: &str, outcome: &Outcome) {
    let Some(report) = outcome.report() else {
        return;
    };
    if !report.success {
        warn!(phase, command = %report.command, "Run failed");
    }
    if let Some(stdout) = report.stdout.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        info!(phase, acceptance = stdout, "Run finished");
    }
}

// --- Readers ---

pub fn read_equilibration_single(
    layout: &ProjectLayout,
    phase: &str,
) -> Result<(Table, Table), EngineError> {
    let read = |run| Table::read_csv(&warmup_run_dir(layout, phase, run).join(THERMO_FILE));
    Ok((read(1)?, read(2)?))
}

pub fn read_measures_single(layout: &ProjectLayout, phase: &str) -> Result<Table, EngineError> {
    Ok(Table::read_csv(
        &measures_dir(layout, SINGLE_PART, phase, Step::Run, None).join(THERMO_FILE),
    )?)
}

/// Thermodynamic block estimates of one method, and the radial distribution when it was computed.
pub fn read_measures_comparison(
    layout: &ProjectLayout,
    phase: &str,
    method: Method,
) -> Result<(Table, Option<Table>), EngineError> {
    let dir = measures_dir(layout, COMPARISON_PART, phase, Step::Run, Some(method));
    let thermo = Table::read_csv(&dir.join(THERMO_FILE))?;
    let radial = Table::read_csv(&dir.join(RADIAL_FILE))
        .inspect_err(|e| debug!(error = %e, "No radial distribution"))
        .ok();
    Ok((thermo, radial))
}

// --- Analysis ---

/// Block uncertainty of the mean of every column.
pub fn block_uncertainties(
    table: &Table,
    block_size: usize,
) -> Result<Vec<(String, f64)>, EngineError> {
    table
        .columns()
        .map(|(name, values)| Ok((name.to_string(), block_uncertainty(values, block_size)?)))
        .collect()
}

/// Block uncertainty of every column for each candidate block size, as a table with a
/// leading `block_size` column.
pub fn block_size_scans(table: &Table, sizes: &[usize]) -> Result<Table, EngineError> {
    let valid: Vec<usize> = match table.columns().next() {
        Some((_, values)) => block_size_scan(values, sizes)
            .into_iter()
            .map(|(s, _)| s)
            .collect(),
        None => Vec::new(),
    };
    let mut columns = vec![(
        "block_size".to_string(),
        valid.iter().map(|&s| s as f64).collect::<Vec<f64>>(),
    )];
    for (name, values) in table.columns() {
        let errors = valid
            .iter()
            .map(|&s| block_uncertainty(values, s))
            .collect::<Result<Vec<f64>, _>>()?;
        columns.push((name.to_string(), errors));
    }
    Ok(Table::from_columns(columns)?)
}

/// Autocorrelation of one thermodynamic series and the correlation time fitted to it.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationAnalysis {
    pub acf: Vec<f64>,
    pub time: CorrelationTime,
}

pub fn correlation_analysis(
    series: &[f64],
    n_lags: usize,
    options: FitOptions,
) -> Result<CorrelationAnalysis, EngineError> {
    let acf = autocorrelation(series, n_lags)?;
    let time = estimate_correlation_time(&acf, options)?;
    debug!(tau = time.tau, error = time.std_error(), "Correlation time");
    Ok(CorrelationAnalysis { acf, time })
}

// --- Panels ---

/// Autocorrelation functions of several series with the e⁻¹ reference line.
pub fn autocorrelation_panel(title: &str, acfs: &[(String, Vec<f64>)]) -> Panel {
    acfs.iter()
        .fold(
            Panel::new(title).x_desc("lag").y_desc("acf"),
            |panel, (label, acf)| {
                let lags: Vec<f64> = (0..acf.len()).map(|k| k as f64).collect();
                panel.with_series(Series::line(label.as_str(), &lags, acf))
            },
        )
        .hline((-1f64).exp())
}

/// Uncertainty against block size, one series per column of a [`block_size_scans`] table.
pub fn block_scan_panel(title: &str, scans: &Table) -> Panel {
    let Some(sizes) = scans.column("block_size") else {
        return Panel::new(title);
    };
    scans
        .columns()
        .filter(|(name, _)| *name != "block_size")
        .fold(
            Panel::new(title).x_desc("block size").y_desc("uncertainty"),
            |panel, (name, errors)| panel.with_series(Series::line(name, sizes, errors)),
        )
}

/// Progressive `<variable>_mean` with its `<variable>_error`, one series per method.
pub fn comparison_panel(variable: &str, runs: &[(Method, Table)]) -> Panel {
    let mean = format!("{}_mean", variable);
    let error = format!("{}_error", variable);
    runs.iter().fold(
        Panel::new(variable).x_desc("block"),
        |panel, (method, table)| match (table.column(&mean), table.column(&error)) {
            (Some(means), Some(errors)) => {
                let blocks: Vec<f64> = (1..=means.len()).map(|b| b as f64).collect();
                panel.with_series(Series::error_bars(method.tag(), &blocks, means, errors))
            }
            _ => panel,
        },
    )
}

pub fn radial_panel(phase: &str, radial: &[(Method, Table)]) -> Panel {
    radial.iter().fold(
        Panel::new(format!("g(r), {}", phase)).x_desc("r").y_desc("g"),
        |panel, (method, table)| {
            match (table.column("r"), table.column("g_mean"), table.column("g_error")) {
                (Some(r), Some(g), Some(e)) => {
                    panel.with_series(Series::error_bars(method.tag(), r, g, e))
                }
                _ => panel,
            }
        },
    )
}
