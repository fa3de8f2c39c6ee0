use phf::phf_map;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

use crate::core::charts::{Panel, Series};
use crate::core::layout::{ProjectLayout, float_label};
use crate::core::physics::ising::{IsingTheory, VARIABLES, theory};
use crate::core::stats::autocorrelation;
use crate::core::table::{ReadOptions, Table};
use crate::engine::context::LabContext;
use crate::engine::error::{ConfigError, EngineError};
use crate::engine::invocation::Invocation;
use crate::engine::runner::{Outcome, run_unless_cached};
use crate::engine::sweep::sweep;

pub const SECTION: &str = "06";
pub const EQUILIBRATE: &str = "06_warmup";
pub const AUTOCORRELATE: &str = "06_correlation";
pub const MEASURE: &str = "06_measure";
pub const DEFAULT_PRIME_LINE: usize = 1;

/// Columns registered by the samplers, with the names used on charts.
pub static DISPLAY_NAMES: phf::Map<&'static str, &'static str> = phf_map! {
    "H" => "H",
    "Sum_s" => "Σ s_i",
    "Sum_s2" => "Σ s_i s_j",
};

pub fn display_name(column: &str) -> &str {
    DISPLAY_NAMES.get(column).copied().unwrap_or(column)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sampler {
    Metropolis,
    Gibbs,
}

impl Sampler {
    pub const ALL: [Sampler; 2] = [Sampler::Metropolis, Sampler::Gibbs];

    pub fn tag(&self) -> &'static str {
        match self {
            Sampler::Metropolis => "metropolis",
            Sampler::Gibbs => "gibbs",
        }
    }
}

impl fmt::Display for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Sampler {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metropolis" => Ok(Sampler::Metropolis),
            "gibbs" => Ok(Sampler::Gibbs),
            other => Err(ConfigError::InvalidValue {
                name: "sampler",
                reason: format!("unknown sampler '{}'", other),
            }),
        }
    }
}

// --- Paths ---

pub fn data_dir(layout: &ProjectLayout, temperature: f64) -> PathBuf {
    layout
        .results_dir(SECTION)
        .join(float_label(temperature))
}

fn file_name(sampler: Sampler, field: f64, suffix: &str) -> String {
    format!("{}_{:.6}_{}.csv", sampler.tag(), field, suffix)
}

/// Last spin configuration of a previous run, used to resume.
pub fn spins_path(layout: &ProjectLayout, temperature: f64, field: f64, sampler: Sampler) -> PathBuf {
    data_dir(layout, temperature).join(file_name(sampler, field, "spins"))
}

pub fn equilibration_path(
    layout: &ProjectLayout,
    temperature: f64,
    field: f64,
    run: usize,
    sampler: Sampler,
) -> PathBuf {
    data_dir(layout, temperature).join(file_name(sampler, field, &format!("warmup{}", run)))
}

pub fn autocorrelation_path(
    layout: &ProjectLayout,
    temperature: f64,
    field: f64,
    sampler: Sampler,
) -> PathBuf {
    data_dir(layout, temperature).join(file_name(sampler, field, "autocorrelation"))
}

pub fn variables_path(
    layout: &ProjectLayout,
    temperature: f64,
    field: f64,
    sampler: Sampler,
) -> PathBuf {
    data_dir(layout, temperature).join(file_name(sampler, field, "variables"))
}

// --- Parameters ---

/// The physical system and the samplers every Ising run shares.
#[derive(Debug, Clone, PartialEq)]
pub struct IsingSystem {
    pub coupling: f64,
    pub field: f64,
    pub n_spins: u32,
    pub samplers: Vec<Sampler>,
    pub prime_line: usize,
    pub save_spins: bool,
}

impl IsingSystem {
    pub fn theory(&self, temperature: f64) -> IsingTheory {
        theory(self.coupling, temperature, self.field, self.n_spins)
    }

    fn physics_flags(&self, invocation: Invocation, temperature: f64) -> Invocation {
        invocation
            .flag("n_spins", self.n_spins)
            .flag("coupling", self.coupling)
            .flag("external_field", self.field)
            .flag("temperature", temperature)
    }

    fn sampler_switches(&self, invocation: Invocation) -> Invocation {
        invocation.switches(self.samplers.iter().map(Sampler::tag))
    }

    /// Both field values a run registers: `0` for u, c and X, and the applied field for m.
    pub fn fields(&self) -> [f64; 2] {
        [0.0, self.field]
    }
}

#[derive(Default)]
pub struct IsingSystemBuilder {
    coupling: Option<f64>,
    field: Option<f64>,
    n_spins: Option<u32>,
    samplers: Option<Vec<Sampler>>,
    prime_line: Option<usize>,
    save_spins: Option<bool>,
}

impl IsingSystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coupling(mut self, coupling: f64) -> Self {
        self.coupling = Some(coupling);
        self
    }
    pub fn field(mut self, field: f64) -> Self {
        self.field = Some(field);
        self
    }
    pub fn n_spins(mut self, n_spins: u32) -> Self {
        self.n_spins = Some(n_spins);
        self
    }
    pub fn samplers(mut self, samplers: Vec<Sampler>) -> Self {
        self.samplers = Some(samplers);
        self
    }
    pub fn prime_line(mut self, line: usize) -> Self {
        self.prime_line = Some(line);
        self
    }
    pub fn save_spins(mut self, save: bool) -> Self {
        self.save_spins = Some(save);
        self
    }

    pub fn build(self) -> Result<IsingSystem, ConfigError> {
        let samplers = self
            .samplers
            .ok_or(ConfigError::MissingParameter("samplers"))?;
        if samplers.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "samplers",
                reason: "at least one sampler is required".to_string(),
            });
        }
        Ok(IsingSystem {
            coupling: self
                .coupling
                .ok_or(ConfigError::MissingParameter("coupling"))?,
            field: self.field.ok_or(ConfigError::MissingParameter("field"))?,
            n_spins: self
                .n_spins
                .ok_or(ConfigError::MissingParameter("n_spins"))?,
            samplers,
            prime_line: self.prime_line.unwrap_or(DEFAULT_PRIME_LINE),
            save_spins: self.save_spins.unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquilibrationParams {
    /// Steps whose values are written out, taken at the end of the run.
    pub n_register: usize,
    pub n_steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutocorrelationParams {
    pub n_lags: usize,
    /// Leading steps of the equilibration excluded from the analysis.
    pub skip: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureParams {
    pub n_steps: usize,
    pub block_size: usize,
}

// --- Runs ---

fn has_csv(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|e| e.path().extension().is_some_and(|ext| ext == "csv"))
        })
        .unwrap_or(false)
}

/// Two equilibration runs from a random start, registering H, Sum_s and Sum_s2 for the last
/// `n_register` of `n_steps` steps.
pub fn run_equilibration(
    ctx: &LabContext,
    system: &IsingSystem,
    params: &EquilibrationParams,
    temperature: f64,
) -> Result<Outcome, EngineError> {
    if params.n_steps < params.n_register {
        return Err(EngineError::InvalidParameters(format!(
            "n_steps ({}) must be at least n_register ({})",
            params.n_steps, params.n_register
        )));
    }
    let out = data_dir(ctx.layout, temperature);
    if ctx.cache.use_cached && has_csv(&out) {
        debug!(dir = %out.display(), "Equilibration results already present");
        return Ok(Outcome::Cached(out));
    }

    let invocation = Invocation::new(ctx.layout.executable(EQUILIBRATE))
        .seeded(&ctx.seeding(system.prime_line))
        .flag("n_steps", params.n_register)
        .flag("block_size", 1usize)
        .flag("n_warmup", params.n_steps - params.n_register)
        .flag("out", &out);
    let invocation = system.sampler_switches(invocation).switch("save_spins", system.save_spins);
    let invocation = system.physics_flags(invocation, temperature);

    ctx.runner.run(&invocation).map(Outcome::Ran)
}

/// Autocorrelation of the first equilibration run through the external tool, for every sampler
/// and both field values.
pub fn run_autocorrelation(
    ctx: &LabContext,
    system: &IsingSystem,
    params: &AutocorrelationParams,
    temperature: f64,
) -> Result<Vec<Outcome>, EngineError> {
    let mut outcomes = Vec::new();
    for &sampler in &system.samplers {
        for field in system.fields() {
            let output = autocorrelation_path(ctx.layout, temperature, field, sampler);
            let invocation = Invocation::new(ctx.layout.executable(AUTOCORRELATE))
                .flag(
                    "in",
                    equilibration_path(ctx.layout, temperature, field, 1, sampler),
                )
                .flag("out", &output)
                .flag("n_lags", params.n_lags)
                .flag("skip", params.skip);
            outcomes.push(run_unless_cached(ctx.runner, ctx.cache, &output, &invocation)?);
        }
    }
    Ok(outcomes)
}

/// Same files as [`run_autocorrelation`], computed in-process from the merged first run.
///
/// Columns that are constant or incomplete get a `NaN` autocorrelation. In the zero-field file
/// `Sum_s` is zeroed; in the field file `H` and `Sum_s2` are.
pub fn compute_autocorrelation(
    layout: &ProjectLayout,
    system: &IsingSystem,
    params: &AutocorrelationParams,
    temperature: f64,
) -> Result<(), EngineError> {
    for &sampler in &system.samplers {
        let run = read_equilibration(
            layout,
            temperature,
            system.field,
            1,
            sampler,
            ReadOptions::default(),
        )?
        .skip(params.skip);

        let mut columns = Vec::with_capacity(run.n_cols());
        for (name, values) in run.columns() {
            let acf = autocorrelation(values, params.n_lags).unwrap_or_else(|e| {
                warn!(column = name, error = %e, "Autocorrelation undefined");
                Vec::new()
            });
            columns.push((name.to_string(), acf));
        }
        let n_rows = columns.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
        for (_, acf) in columns.iter_mut() {
            acf.resize(n_rows, f64::NAN);
        }
        let acfs = Table::from_columns(columns)?;

        let mut zero_field = acfs.clone();
        zero_field.fill_column("Sum_s", 0.0)?;
        zero_field.write_csv(&autocorrelation_path(layout, temperature, 0.0, sampler))?;

        let mut with_field = acfs;
        with_field.fill_column("H", 0.0)?;
        with_field.fill_column("Sum_s2", 0.0)?;
        with_field.write_csv(&autocorrelation_path(
            layout,
            temperature,
            system.field,
            sampler,
        ))?;
        debug!(%sampler, temperature, "Autocorrelation written");
    }
    Ok(())
}

/// Block-averaged measures, resuming from the saved spins when the first sampler has them.
///
/// With caching on, a temperature that has nothing to resume from is skipped.
pub fn run_measures(
    ctx: &LabContext,
    system: &IsingSystem,
    params: &MeasureParams,
    temperature: f64,
) -> Result<Outcome, EngineError> {
    let out = data_dir(ctx.layout, temperature);
    let resume = system
        .samplers
        .first()
        .is_some_and(|&s| spins_path(ctx.layout, temperature, system.field, s).exists());
    if ctx.cache.use_cached && !resume {
        return Ok(Outcome::Cached(out));
    }

    let invocation = Invocation::new(ctx.layout.executable(MEASURE))
        .seeded(&ctx.seeding(system.prime_line))
        .flag("n_steps", params.n_steps)
        .flag("block_size", params.block_size)
        .flag("n_warmup", 0usize)
        .flag("out", &out);
    let invocation = system
        .sampler_switches(invocation)
        .switch("save_spins", system.save_spins)
        .switch("resume", resume);
    let invocation = system.physics_flags(invocation, temperature);

    ctx.runner.run(&invocation).map(Outcome::Ran)
}

/// A measures run of a single sampler with `n_blocks` blocks of `block_size` steps.
pub fn run_block_measures(
    ctx: &LabContext,
    system: &IsingSystem,
    n_blocks: usize,
    temperature: f64,
    sampler: Sampler,
    block_size: usize,
) -> Result<Outcome, EngineError> {
    let resume = spins_path(ctx.layout, temperature, system.field, sampler).exists();
    let invocation = Invocation::new(ctx.layout.executable(MEASURE))
        .seeded(&ctx.seeding(system.prime_line))
        .flag("n_steps", n_blocks * block_size)
        .flag("block_size", block_size)
        .flag("n_warmup", 0usize)
        .flag("out", data_dir(ctx.layout, temperature))
        .switch(sampler.tag(), true)
        .switch("save_spins", system.save_spins)
        .switch("resume", resume);
    let invocation = system.physics_flags(invocation, temperature);
    ctx.runner.run(&invocation).map(Outcome::Ran)
}

#[instrument(skip_all, name = "ising_equilibration")]
pub fn equilibrate_all(
    ctx: &LabContext,
    system: &IsingSystem,
    params: &EquilibrationParams,
    temperatures: &[f64],
) -> Result<Vec<Outcome>, EngineError> {
    info!(n = temperatures.len(), "Equilibrating Ising chains");
    sweep(ctx, "Equilibration", temperatures, |&t| {
        run_equilibration(ctx, system, params, t)
    })
}

#[instrument(skip_all, name = "ising_autocorrelation")]
pub fn autocorrelate_all(
    ctx: &LabContext,
    system: &IsingSystem,
    params: &AutocorrelationParams,
    temperatures: &[f64],
    in_process: bool,
) -> Result<(), EngineError> {
    info!(n = temperatures.len(), in_process, "Computing autocorrelations");
    sweep(ctx, "Autocorrelation", temperatures, |&t| {
        if in_process {
            compute_autocorrelation(ctx.layout, system, params, t)
        } else {
            run_autocorrelation(ctx, system, params, t).map(|_| ())
        }
    })
    .map(|_| ())
}

#[instrument(skip_all, name = "ising_measures")]
pub fn measure_all(
    ctx: &LabContext,
    system: &IsingSystem,
    params: &MeasureParams,
    temperatures: &[f64],
) -> Result<Vec<Outcome>, EngineError> {
    info!(n = temperatures.len(), "Measuring thermodynamic variables");
    sweep(ctx, "Measures", temperatures, |&t| {
        run_measures(ctx, system, params, t)
    })
}

// --- Readers ---

/// One equilibration run: the zero-field table with `Sum_s` taken from the field run.
pub fn read_equilibration(
    layout: &ProjectLayout,
    temperature: f64,
    field: f64,
    run: usize,
    sampler: Sampler,
    options: ReadOptions,
) -> Result<Table, EngineError> {
    let read = |h| {
        Table::read_csv_with(
            &equilibration_path(layout, temperature, h, run, sampler),
            options,
        )
    };
    merge_field_run(read(0.0)?, &read(field)?)
}

fn merge_field_run(mut zero_field: Table, with_field: &Table) -> Result<Table, EngineError> {
    zero_field.fill_column("Sum_s", f64::NAN)?;
    zero_field.fill_missing_from(with_field);
    Ok(zero_field)
}

/// Both equilibration runs of a sampler.
pub fn read_equilibrations(
    layout: &ProjectLayout,
    temperature: f64,
    field: f64,
    sampler: Sampler,
    options: ReadOptions,
) -> Result<[Table; 2], EngineError> {
    Ok([
        read_equilibration(layout, temperature, field, 1, sampler, options)?,
        read_equilibration(layout, temperature, field, 2, sampler, options)?,
    ])
}

pub fn read_autocorrelation(
    layout: &ProjectLayout,
    temperature: f64,
    field: f64,
    sampler: Sampler,
) -> Result<Table, EngineError> {
    let read = |h| Table::read_csv(&autocorrelation_path(layout, temperature, h, sampler));
    merge_field_run(read(0.0)?, &read(field)?)
}

pub fn read_state(
    layout: &ProjectLayout,
    temperature: f64,
    field: f64,
    sampler: Sampler,
) -> Result<Table, EngineError> {
    Ok(Table::read_csv(&spins_path(
        layout,
        temperature,
        field,
        sampler,
    ))?)
}

/// Block-by-block estimate and error of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSeries {
    pub name: String,
    pub estimate: Vec<f64>,
    pub error: Vec<f64>,
}

/// Groups `<variable>_<quantity>` columns by variable. Columns without an underscore are ignored.
pub fn split_variables(table: &Table) -> Vec<VariableSeries> {
    let mut series: Vec<VariableSeries> = Vec::new();
    for (column, values) in table.columns() {
        let Some((name, quantity)) = column.split_once('_') else {
            continue;
        };
        let index = match series.iter().position(|s| s.name == name) {
            Some(i) => i,
            None => {
                series.push(VariableSeries {
                    name: name.to_string(),
                    estimate: vec![f64::NAN; values.len()],
                    error: vec![f64::NAN; values.len()],
                });
                series.len() - 1
            }
        };
        match quantity {
            "estimate" => series[index].estimate = values.to_vec(),
            "error" => series[index].error = values.to_vec(),
            _ => {}
        }
    }
    series
}

/// Progressive estimates at one temperature: zero-field and field tables side by side.
pub fn read_measures(
    layout: &ProjectLayout,
    temperature: f64,
    field: f64,
    sampler: Sampler,
    options: ReadOptions,
) -> Result<Table, EngineError> {
    let read = |h| Table::read_csv_with(&variables_path(layout, temperature, h, sampler), options);
    Ok(read(0.0)?.join(&read(field)?)?)
}

/// Final estimate of every variable at each temperature, with a leading `T` column.
pub fn read_results(
    layout: &ProjectLayout,
    temperatures: &[f64],
    field: f64,
    sampler: Sampler,
) -> Result<Table, EngineError> {
    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::with_capacity(temperatures.len());
    for &t in temperatures {
        let measures = read_measures(layout, t, field, sampler, ReadOptions::default())?;
        let last = measures.last_row().ok_or_else(|| {
            EngineError::InvalidParameters(format!("no measures at T={}", float_label(t)))
        })?;
        headers.get_or_insert_with(|| measures.headers().to_vec());
        rows.push((t, last));
    }

    let headers = headers.unwrap_or_default();
    let mut columns = vec![("T".to_string(), rows.iter().map(|(t, _)| *t).collect())];
    for (i, header) in headers.iter().enumerate() {
        let values = rows
            .iter()
            .map(|(_, row)| row.get(i).copied().unwrap_or(f64::NAN))
            .collect();
        columns.push((header.clone(), values));
    }
    Ok(Table::from_columns(columns)?)
}

// --- Panels ---

/// One panel per registered column, overlaying both runs.
pub fn equilibration_panels(runs: &[Table; 2], sampler: Sampler, temperature: f64) -> Vec<Panel> {
    runs[0]
        .headers()
        .iter()
        .map(|column| {
            let title = format!(
                "{} {} (T={})",
                display_name(column),
                sampler,
                float_label(temperature)
            );
            runs.iter()
                .enumerate()
                .fold(Panel::new(title).x_desc("step"), |panel, (i, run)| {
                    let Some(values) = run.column(column) else {
                        return panel;
                    };
                    let steps: Vec<f64> = (0..values.len()).map(|s| s as f64).collect();
                    panel.with_series(Series::line(format!("run {}", i + 1), &steps, values))
                })
        })
        .collect()
}

/// Autocorrelation of every column, with the ±e⁻² reference lines.
pub fn autocorrelation_panel(table: &Table, sampler: Sampler, lags: Option<usize>) -> Panel {
    let table = lags.map_or_else(|| table.clone(), |n| table.head(n));
    let lag_axis: Vec<f64> = (0..table.n_rows()).map(|k| k as f64).collect();
    let threshold = (-2f64).exp();
    table
        .columns()
        .fold(
            Panel::new(format!("{} autocorrelation", sampler)).x_desc("lag"),
            |panel, (name, values)| {
                panel.with_series(Series::line(display_name(name), &lag_axis, values))
            },
        )
        .hline(threshold)
        .hline(-threshold)
}

/// One panel per variable: progressive estimates of each sampler against the exact value.
pub fn measures_panels(measures: &[(Sampler, Table)], theory: &IsingTheory) -> Vec<Panel> {
    VARIABLES
        .iter()
        .map(|&variable| {
            let panel = measures.iter().fold(
                Panel::new(variable).x_desc("block"),
                |panel, (sampler, table)| {
                    match split_variables(table).into_iter().find(|s| s.name == variable) {
                        Some(series) => {
                            let blocks: Vec<f64> =
                                (0..series.estimate.len()).map(|i| i as f64).collect();
                            panel.with_series(Series::error_bars(
                                sampler.tag(),
                                &blocks,
                                &series.estimate,
                                &series.error,
                            ))
                        }
                        None => panel,
                    }
                },
            );
            panel.hline(theory.get(variable).unwrap_or(f64::NAN))
        })
        .collect()
}

/// One panel per variable: final estimate minus the exact value, against temperature.
pub fn results_panels(results: &[(Sampler, Table)], system: &IsingSystem) -> Vec<Panel> {
    VARIABLES
        .iter()
        .map(|&variable| {
            results
                .iter()
                .fold(
                    Panel::new(format!("{}: estimate - theory", variable))
                        .x_desc("T")
                        .y_desc("Δ"),
                    |panel, (sampler, table)| {
                        let Some(temps) = table.column("T") else {
                            return panel;
                        };
                        let Some(series) =
                            split_variables(table).into_iter().find(|s| s.name == variable)
                        else {
                            return panel;
                        };
                        let deltas: Vec<f64> = temps
                            .iter()
                            .zip(&series.estimate)
                            .map(|(&t, e)| {
                                e - system.theory(t).get(variable).unwrap_or(f64::NAN)
                            })
                            .collect();
                        panel.with_series(Series::error_bars(
                            sampler.tag(),
                            temps,
                            &deltas,
                            &series.error,
                        ))
                    },
                )
                .hline(0.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::runner::{CachePolicy, RecordingRunner};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn system() -> IsingSystem {
        IsingSystemBuilder::new()
            .coupling(1.0)
            .field(0.02)
            .n_spins(50)
            .samplers(Sampler::ALL.to_vec())
            .save_spins(true)
            .build()
            .unwrap()
    }

    fn lab() -> (TempDir, ProjectLayout) {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::with_root(dir.path());
        (dir, layout)
    }

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn file_names_use_six_decimal_fields_and_temperature_directories() {
        let layout = ProjectLayout::default();
        assert_eq!(
            variables_path(&layout, 1.0, 0.02, Sampler::Gibbs),
            Path::new("../results/06/1.0/gibbs_0.020000_variables.csv")
        );
        assert_eq!(
            equilibration_path(&layout, 0.5, 0.0, 2, Sampler::Metropolis),
            Path::new("../results/06/0.5/metropolis_0.000000_warmup2.csv")
        );
        assert_eq!(
            spins_path(&layout, 2.25, 0.02, Sampler::Metropolis),
            Path::new("../results/06/2.25/metropolis_0.020000_spins.csv")
        );
    }

    #[test]
    fn samplers_parse_from_their_tags() {
        assert_eq!("Gibbs".parse::<Sampler>().unwrap(), Sampler::Gibbs);
        assert_eq!(Sampler::Metropolis.to_string(), "metropolis");
        assert!("heatbath".parse::<Sampler>().is_err());
    }

    #[test]
    fn builder_requires_the_physical_parameters() {
        assert_eq!(
            IsingSystemBuilder::new()
                .samplers(vec![Sampler::Gibbs])
                .build()
                .unwrap_err(),
            ConfigError::MissingParameter("coupling")
        );
        assert!(IsingSystemBuilder::new().samplers(vec![]).build().is_err());
        let system = system();
        assert_eq!(system.prime_line, DEFAULT_PRIME_LINE);
    }

    #[test]
    fn equilibration_command_line() {
        let (_dir, layout) = lab();
        let runner = RecordingRunner::new();
        let reporter = ProgressReporter::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::default());
        let params = EquilibrationParams {
            n_register: 1000,
            n_steps: 5000,
        };

        run_equilibration(&ctx, &system(), &params, 1.5).unwrap();

        let root = layout.root().display().to_string();
        let argv = &runner.argvs()[0];
        assert_eq!(argv[0], format!("{}/bin/06_warmup", root));
        assert_eq!(
            &argv[1..],
            &[
                format!("--primes_path={}/data/primes/Primes", root),
                format!("--seeds_path={}/data/seeds/seed.in", root),
                "--primes_line=1".to_string(),
                "--n_steps=1000".to_string(),
                "--block_size=1".to_string(),
                "--n_warmup=4000".to_string(),
                format!("--out={}/results/06/1.5", root),
                "--metropolis".to_string(),
                "--gibbs".to_string(),
                "--save_spins".to_string(),
                "--n_spins=50".to_string(),
                "--coupling=1.0".to_string(),
                "--external_field=0.02".to_string(),
                "--temperature=1.5".to_string(),
            ]
        );
    }

    #[test]
    fn equilibration_rejects_more_registered_than_total_steps() {
        let (_dir, layout) = lab();
        let runner = RecordingRunner::new();
        let reporter = ProgressReporter::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::default());
        let params = EquilibrationParams {
            n_register: 10,
            n_steps: 5,
        };
        assert!(matches!(
            run_equilibration(&ctx, &system(), &params, 1.0),
            Err(EngineError::InvalidParameters(_))
        ));
        assert_eq!(runner.count(), 0);
    }

    #[test]
    fn cached_equilibration_skips_temperatures_with_any_csv() {
        let (_dir, layout) = lab();
        write(&data_dir(&layout, 1.0).join("anything.csv"), "x\n1\n");
        let runner = RecordingRunner::new();
        let reporter = ProgressReporter::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::new(true));
        let params = EquilibrationParams {
            n_register: 10,
            n_steps: 10,
        };

        let outcomes = equilibrate_all(&ctx, &system(), &params, &[1.0, 2.0]).unwrap();
        assert!(outcomes[0].was_cached());
        assert!(!outcomes[1].was_cached());
        assert_eq!(runner.count(), 1);
    }

    #[test]
    fn measures_resume_only_from_saved_spins() {
        let (_dir, layout) = lab();
        let system = system();
        write(
            &spins_path(&layout, 1.0, system.field, Sampler::Metropolis),
            "s\n1\n",
        );
        let runner = RecordingRunner::new();
        let reporter = ProgressReporter::new();
        let params = MeasureParams {
            n_steps: 100,
            block_size: 10,
        };

        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::new(true));
        let outcomes = measure_all(&ctx, &system, &params, &[1.0, 2.0]).unwrap();
        assert!(!outcomes[0].was_cached());
        assert!(outcomes[1].was_cached());
        let argv = &runner.argvs()[0];
        assert!(argv.contains(&"--resume".to_string()));
        assert!(argv.contains(&"--n_warmup=0".to_string()));
        assert!(argv.contains(&"--block_size=10".to_string()));

        let fresh = RecordingRunner::new();
        let ctx = LabContext::new(&layout, &fresh, &reporter, CachePolicy::default());
        run_measures(&ctx, &system, &params, 2.0).unwrap();
        assert!(!fresh.argvs()[0].contains(&"--resume".to_string()));
    }

    #[test]
    fn block_measures_use_a_single_sampler() {
        let (_dir, layout) = lab();
        let runner = RecordingRunner::new();
        let reporter = ProgressReporter::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::default());
        run_block_measures(&ctx, &system(), 20, 1.0, Sampler::Gibbs, 50).unwrap();
        let argv = &runner.argvs()[0];
        assert!(argv.contains(&"--n_steps=1000".to_string()));
        assert!(argv.contains(&"--gibbs".to_string()));
        assert!(!argv.contains(&"--metropolis".to_string()));
    }

    #[test]
    fn external_autocorrelation_runs_per_sampler_and_field() {
        let (_dir, layout) = lab();
        let system = system();
        write(
            &autocorrelation_path(&layout, 1.0, 0.0, Sampler::Metropolis),
            "H\n1\n",
        );
        let runner = RecordingRunner::new();
        let reporter = ProgressReporter::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::new(true));
        let params = AutocorrelationParams {
            n_lags: 100,
            skip: 10,
        };

        let outcomes = run_autocorrelation(&ctx, &system, &params, 1.0).unwrap();
        assert_eq!(outcomes.len(), 4);
        assert_eq!(runner.count(), 3);
        let argv = &runner.argvs()[0];
        assert!(argv[0].ends_with("bin/06_correlation"));
        assert!(argv[1].ends_with("metropolis_0.020000_warmup1.csv"));
        assert_eq!(&argv[3..], &["--n_lags=100", "--skip=10"]);
    }

    fn write_equilibration(layout: &ProjectLayout, system: &IsingSystem, run: usize) {
        for sampler in Sampler::ALL {
            write(
                &equilibration_path(layout, 1.0, 0.0, run, sampler),
                "H,Sum_s,Sum_s2\n-40,0,40\n-38,0,38\n-42,0,42\n-36,0,36\n-44,0,44\n",
            );
            write(
                &equilibration_path(layout, 1.0, system.field, run, sampler),
                "H,Sum_s,Sum_s2\n,4,\n,-2,\n,6,\n,0,\n,2,\n",
            );
        }
    }

    #[test]
    fn equilibration_reader_takes_sum_s_from_the_field_run() {
        let (_dir, layout) = lab();
        let system = system();
        write_equilibration(&layout, &system, 1);
        write_equilibration(&layout, &system, 2);

        let [first, second] =
            read_equilibrations(&layout, 1.0, system.field, Sampler::Gibbs, ReadOptions::default())
                .unwrap();
        assert_eq!(first.column("H").unwrap()[0], -40.0);
        assert_eq!(first.column("Sum_s").unwrap(), &[4.0, -2.0, 6.0, 0.0, 2.0]);
        assert_eq!(second.n_rows(), 5);

        let limited = read_equilibration(
            &layout,
            1.0,
            system.field,
            1,
            Sampler::Gibbs,
            ReadOptions::default().rows(Some(1), Some(2)),
        )
        .unwrap();
        assert_eq!(limited.column("Sum_s").unwrap(), &[-2.0, 6.0]);
    }

    #[test]
    fn in_process_autocorrelation_writes_both_field_files() {
        let (_dir, layout) = lab();
        let system = system();
        write_equilibration(&layout, &system, 1);
        let params = AutocorrelationParams { n_lags: 2, skip: 1 };

        compute_autocorrelation(&layout, &system, &params, 1.0).unwrap();

        let zero = Table::read_csv(&autocorrelation_path(&layout, 1.0, 0.0, Sampler::Gibbs)).unwrap();
        assert_eq!(zero.n_rows(), 3);
        assert_eq!(zero.column("Sum_s").unwrap(), &[0.0, 0.0, 0.0]);
        assert_eq!(zero.column("H").unwrap()[0], 1.0);

        let merged = read_autocorrelation(&layout, 1.0, system.field, Sampler::Gibbs).unwrap();
        assert_eq!(merged.column("Sum_s").unwrap()[0], 1.0);
        assert_eq!(merged.column("Sum_s2").unwrap()[0], 1.0);
    }

    fn write_measures(layout: &ProjectLayout, temperature: f64, field: f64) {
        for sampler in Sampler::ALL {
            write(
                &variables_path(layout, temperature, 0.0, sampler),
                "u_estimate,u_error,c_estimate,c_error,X_estimate,X_error\n\
                 -0.70,0.02,0.40,0.05,7.0,0.5\n\
                 -0.76,0.01,0.42,0.03,7.3,0.2\n",
            );
            write(
                &variables_path(layout, temperature, field, sampler),
                "m_estimate,m_error\n0.30,0.05\n0.25,0.02\n",
            );
        }
    }

    #[test]
    fn measures_are_joined_and_split_by_variable() {
        let (_dir, layout) = lab();
        write_measures(&layout, 1.0, 0.02);
        let table =
            read_measures(&layout, 1.0, 0.02, Sampler::Metropolis, ReadOptions::default())
                .unwrap();
        assert_eq!(table.n_cols(), 8);

        let variables = split_variables(&table);
        let names: Vec<&str> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, VARIABLES.to_vec());
        assert_eq!(variables[3].estimate, vec![0.30, 0.25]);
        assert_eq!(variables[0].error, vec![0.02, 0.01]);
    }

    #[test]
    fn results_hold_the_last_estimate_per_temperature() {
        let (_dir, layout) = lab();
        write_measures(&layout, 1.0, 0.02);
        write_measures(&layout, 2.0, 0.02);
        let results = read_results(&layout, &[1.0, 2.0], 0.02, Sampler::Gibbs).unwrap();
        assert_eq!(results.column("T").unwrap(), &[1.0, 2.0]);
        assert_eq!(results.column("u_estimate").unwrap(), &[-0.76, -0.76]);
        assert_eq!(results.column("m_error").unwrap(), &[0.02, 0.02]);

        let panels = results_panels(&[(Sampler::Gibbs, results)], &system());
        assert_eq!(panels.len(), 4);
        assert_eq!(panels[0].series[0].points.len(), 2);
        assert_eq!(panels[0].hlines, vec![0.0]);
    }

    #[test]
    fn panels_carry_reference_lines() {
        let (_dir, layout) = lab();
        write_measures(&layout, 1.0, 0.02);
        let table =
            read_measures(&layout, 1.0, 0.02, Sampler::Gibbs, ReadOptions::default()).unwrap();
        let theory = system().theory(1.0);
        let panels = measures_panels(&[(Sampler::Gibbs, table)], &theory);
        assert_eq!(panels[1].title, "c");
        assert_eq!(panels[1].hlines, vec![theory.c]);

        let acf = Table::from_columns([("H", vec![1.0, 0.5, 0.2]), ("Sum_s", vec![1.0, 0.1, 0.0])])
            .unwrap();
        let panel = autocorrelation_panel(&acf, Sampler::Gibbs, Some(2));
        assert_eq!(panel.series.len(), 2);
        assert_eq!(panel.series[1].label.as_deref(), Some("Σ s_i"));
        assert_eq!(panel.series[0].points.len(), 2);
        assert_eq!(panel.hlines.len(), 2);
    }
}
