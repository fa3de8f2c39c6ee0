mod defaults;
pub mod models;

use crate::cli::{AnnealingArgs, IsingArgs, MdArgs, MigrationArgs, ProjectArgs, TspArgs};
use crate::error::{CliError, Result};
use crate::utils::parser::{self, ParseError};
use defaults::DefaultsConfig;
use lsn::core::layout::ProjectLayoutBuilder;
use lsn::engine::error::ConfigError;
use lsn::engine::runner::CachePolicy;
use lsn::exercises::annealing::AnnealingParams;
use lsn::exercises::ising::{
    AutocorrelationParams, EquilibrationParams, IsingSystemBuilder, MeasureParams, Sampler,
};
use lsn::exercises::migration::{GpParams, MigrationConfig};
use lsn::exercises::molecular::{Method, Step};
use lsn::exercises::tsp::{self, Algo, DEFAULT_FUSION_P, GaParams, Tsp};
use models::{
    AnnealingSettings, EstimationDraft, IsingSettings, MdSettings, MigrationSettings,
    ProjectSettings, TspSettings,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// A list written either as a TOML array, a single value, or comma-separated text
/// (`"0.5:2.0:16"` for temperature grids).
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
enum ListValue<T> {
    Items(Vec<T>),
    One(T),
    Text(String),
}

impl<T> ListValue<T> {
    fn into_values(
        self,
        parse_text: fn(&str) -> std::result::Result<Vec<T>, ParseError>,
    ) -> std::result::Result<Vec<T>, ParseError> {
        match self {
            ListValue::Items(items) => Ok(items),
            ListValue::One(item) => Ok(vec![item]),
            ListValue::Text(text) => parse_text(&text),
        }
    }
}

impl ListValue<String> {
    fn into_names(self) -> Vec<String> {
        match self {
            ListValue::Items(items) => items.into_iter().map(|s| s.trim().to_string()).collect(),
            ListValue::One(text) | ListValue::Text(text) => split_names(&text),
        }
    }
}

fn split_names(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn usize_list(text: &str) -> std::result::Result<Vec<usize>, ParseError> {
    parser::parse_list(text, parser::parse_usize)
}

fn f64_list(text: &str) -> std::result::Result<Vec<f64>, ParseError> {
    parser::parse_list(text, parser::parse_f64)
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialProjectConfig {
    root: Option<PathBuf>,
    bin_dir: Option<PathBuf>,
    results_dir: Option<PathBuf>,
    inputs_dir: Option<PathBuf>,
    primes_path: Option<PathBuf>,
    seeds_path: Option<PathBuf>,
    plots_dir: Option<PathBuf>,
    use_cached: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialIsingConfig {
    coupling: Option<f64>,
    field: Option<f64>,
    n_spins: Option<u32>,
    samplers: Option<ListValue<String>>,
    prime_line: Option<usize>,
    save_spins: Option<bool>,
    temperatures: Option<ListValue<f64>>,
    n_register: Option<usize>,
    equilibration_steps: Option<usize>,
    n_lags: Option<usize>,
    skip: Option<usize>,
    measure_steps: Option<usize>,
    block_size: Option<usize>,
    block_sizes: Option<ListValue<usize>>,
    n_blocks: Option<usize>,
    in_process: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialMdConfig {
    phases: Option<ListValue<String>>,
    p_line: Option<usize>,
    n_bins: Option<usize>,
    methods: Option<ListValue<String>>,
    start_from: Option<String>,
    block_size: Option<usize>,
    n_lags: Option<usize>,
    scan_sizes: Option<ListValue<usize>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialEstimationConfig {
    n_blocks: Option<usize>,
    block_size: Option<usize>,
    sampling_bound: Option<f64>,
    n_bins: Option<usize>,
    mu: Option<f64>,
    sigma: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialAnnealingConfig {
    run: Option<u32>,
    p_line: Option<usize>,
    temperature_steps: Option<usize>,
    n_explore: Option<usize>,
    temperatures: Option<ListValue<f64>>,
    n_blocks: Option<usize>,
    block_size: Option<usize>,
    initial_guess: Option<ListValue<f64>>,
    stddev: Option<f64>,
    estimation: Option<PartialEstimationConfig>,
    matrix_points: Option<usize>,
    temperature_classes: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialTspConfig {
    problem: Option<String>,
    algos: Option<ListValue<String>>,
    p_lines: Option<ListValue<usize>>,
    input: Option<PathBuf>,
    n_iter: Option<usize>,
    pop_size: Option<usize>,
    mut_rate: Option<f64>,
    fusion_p: Option<f64>,
    radius: Option<f64>,
    side: Option<f64>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialMigrationConfig {
    input: Option<PathBuf>,
    algos: Option<ListValue<String>>,
    continents: Option<ListValue<usize>>,
    fusion_ps: Option<ListValue<f64>>,
    migration_length: Option<usize>,
    n_migrations: Option<usize>,
    pop_size: Option<usize>,
    mut_rate: Option<f64>,
    p_line: Option<usize>,
    top: Option<usize>,
}

/// The configuration file after `-S` overrides, before command-line flags and defaults.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    project: Option<PartialProjectConfig>,
    ising: Option<PartialIsingConfig>,
    md: Option<PartialMdConfig>,
    annealing: Option<PartialAnnealingConfig>,
    tsp: Option<PartialTspConfig>,
    migration: Option<PartialMigrationConfig>,
}

impl PartialConfig {
    /// Reads the optional file, applies the `KEY=VALUE` overrides on top of it and checks the
    /// result against the known sections.
    pub fn load(path: Option<&Path>, set_values: &[String]) -> Result<Self> {
        let mut table = match path {
            Some(path) => read_table(path)?,
            None => toml::Table::new(),
        };
        apply_set_values(&mut table, set_values)?;

        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| match path {
                Some(path) if set_values.is_empty() => CliError::FileParsing {
                    path: path.to_path_buf(),
                    source: e.into(),
                },
                _ => CliError::Config(format!("Invalid configuration: {}", e)),
            })
    }

    pub fn resolve_project(&self, args: &ProjectArgs) -> Result<ProjectSettings> {
        let defaults = DefaultsConfig::default();
        let file = self.project.clone().unwrap_or_default();

        let root = args
            .root
            .clone()
            .or(file.root)
            .unwrap_or_else(|| PathBuf::from(defaults.root));

        let mut builder = ProjectLayoutBuilder::new().root(root.clone());
        if let Some(dir) = file.bin_dir {
            builder = builder.bin_dir(dir);
        }
        if let Some(dir) = file.results_dir {
            builder = builder.results_root(dir);
        }
        if let Some(dir) = file.inputs_dir {
            builder = builder.inputs_root(dir);
        }
        if let Some(path) = file.primes_path {
            builder = builder.primes_path(path);
        }
        if let Some(path) = file.seeds_path {
            builder = builder.seeds_path(path);
        }

        let plots_dir = args
            .plots_dir
            .clone()
            .or(file.plots_dir)
            .unwrap_or_else(|| root.join(defaults.plots_dir));
        let use_cached = args
            .cache
            .resolve()
            .or(file.use_cached)
            .unwrap_or(defaults.use_cached);

        Ok(ProjectSettings {
            layout: builder.build(),
            plots_dir,
            cache: CachePolicy::new(use_cached),
            dry_run: args.dry_run,
        })
    }

    pub fn resolve_ising(&self, args: &IsingArgs) -> Result<IsingSettings> {
        let d = DefaultsConfig::default();
        let file = self.ising.clone().unwrap_or_default();

        let temperatures = match resolve_values(
            args.temperatures.as_deref(),
            file.temperatures,
            parser::parse_grid,
        )? {
            Some(values) => values,
            None => parser::parse_grid(d.ising_temperatures)?,
        };
        if temperatures.is_empty() {
            return Err(CliError::Config(
                "At least one temperature is required.".to_string(),
            ));
        }

        let samplers: Vec<Sampler> = parse_names(
            resolve_names(args.samplers.as_deref(), file.samplers, d.ising_samplers),
        )?;

        let system = IsingSystemBuilder::new()
            .coupling(args.coupling.or(file.coupling).unwrap_or(d.ising_coupling))
            .field(args.field.or(file.field).unwrap_or(d.ising_field))
            .n_spins(args.n_spins.or(file.n_spins).unwrap_or(d.ising_n_spins))
            .samplers(samplers)
            .prime_line(
                args.prime_line
                    .or(file.prime_line)
                    .unwrap_or(d.ising_prime_line),
            )
            .save_spins(file.save_spins.unwrap_or(d.ising_save_spins))
            .build()
            .map_err(config_error)?;

        let block_sizes = resolve_values(args.block_sizes.as_deref(), file.block_sizes, usize_list)?
            .unwrap_or_else(|| d.ising_block_sizes.to_vec());

        Ok(IsingSettings {
            system,
            temperatures,
            equilibration: EquilibrationParams {
                n_register: file.n_register.unwrap_or(d.ising_n_register),
                n_steps: file.equilibration_steps.unwrap_or(d.ising_warmup_steps),
            },
            autocorrelation: AutocorrelationParams {
                n_lags: file.n_lags.unwrap_or(d.ising_n_lags),
                skip: file.skip.unwrap_or(d.ising_skip),
            },
            measures: MeasureParams {
                n_steps: file.measure_steps.unwrap_or(d.ising_measure_steps),
                block_size: file.block_size.unwrap_or(d.ising_block_size),
            },
            in_process: args.in_process || file.in_process.unwrap_or(false),
            block_sizes,
            n_blocks: file.n_blocks.unwrap_or(d.ising_n_blocks),
        })
    }

    pub fn resolve_md(&self, args: &MdArgs) -> Result<MdSettings> {
        let d = DefaultsConfig::default();
        let file = self.md.clone().unwrap_or_default();

        let phases = resolve_names(args.phases.as_deref(), file.phases, d.md_phases);
        if phases.is_empty() {
            return Err(CliError::Config("At least one phase is required.".to_string()));
        }
        let methods: Vec<Method> =
            parse_names(resolve_names(args.methods.as_deref(), file.methods, d.md_methods))?;
        let start_from: Step = args
            .start_from
            .as_deref()
            .or(file.start_from.as_deref())
            .unwrap_or(d.md_start_from)
            .parse()
            .map_err(config_error)?;
        let scan_sizes = resolve_values(None, file.scan_sizes, usize_list)?
            .unwrap_or_else(|| d.md_scan_sizes.to_vec());

        Ok(MdSettings {
            phases,
            p_line: args.p_line.or(file.p_line).unwrap_or(d.md_p_line),
            n_bins: args.n_bins.or(file.n_bins).unwrap_or(d.md_n_bins),
            methods,
            start_from,
            block_size: args
                .block_size
                .or(file.block_size)
                .unwrap_or(d.md_block_size),
            n_lags: args.n_lags.or(file.n_lags).unwrap_or(d.md_n_lags),
            scan_sizes,
        })
    }

    pub fn resolve_annealing(&self, args: &AnnealingArgs) -> Result<AnnealingSettings> {
        let d = DefaultsConfig::default();
        let file = self.annealing.clone().unwrap_or_default();
        let estimation = file.estimation.clone().unwrap_or_default();

        let annealing = AnnealingParams {
            n_temperature_steps: args
                .n_temperature_steps
                .or(file.temperature_steps)
                .unwrap_or(d.annealing_temperature_steps),
            n_explore: args
                .n_explore
                .or(file.n_explore)
                .unwrap_or(d.annealing_n_explore),
            temperatures: resolve_pair(
                "temperatures",
                args.t_bounds.as_deref(),
                file.temperatures,
            )?
            .unwrap_or(d.annealing_temperatures),
            n_blocks: file.n_blocks.unwrap_or(d.annealing_n_blocks),
            block_size: file.block_size.unwrap_or(d.annealing_block_size),
            initial_guess: resolve_pair(
                "initial-guess",
                args.initial_guess.as_deref(),
                file.initial_guess,
            )?
            .unwrap_or(d.annealing_initial_guess),
            stddev: args.stddev.or(file.stddev).unwrap_or(d.annealing_stddev),
        };
        annealing.validate().map_err(config_error)?;

        Ok(AnnealingSettings {
            run: args.run.or(file.run).unwrap_or(d.annealing_run),
            p_line: args
                .p_line
                .or(file.p_line)
                .unwrap_or(d.annealing_p_line),
            annealing,
            estimation: EstimationDraft {
                n_blocks: estimation.n_blocks.unwrap_or(d.estimation_n_blocks),
                block_size: estimation.block_size.unwrap_or(d.estimation_block_size),
                sampling_bound: estimation
                    .sampling_bound
                    .unwrap_or(d.estimation_sampling_bound),
                n_bins: args
                    .n_bins
                    .or(estimation.n_bins)
                    .unwrap_or(d.estimation_n_bins),
                mu: args.mu.or(estimation.mu),
                sigma: args.sigma.or(estimation.sigma),
            },
            matrix_points: file.matrix_points.unwrap_or(d.matrix_points),
            temperature_classes: file
                .temperature_classes
                .unwrap_or(d.temperature_classes),
        })
    }

    pub fn resolve_tsp(&self, args: &TspArgs, project: &ProjectSettings) -> Result<TspSettings> {
        let d = DefaultsConfig::default();
        let file = self.tsp.clone().unwrap_or_default();

        let problem: Tsp = args
            .tsp
            .as_deref()
            .or(file.problem.as_deref())
            .unwrap_or(d.tsp_problem)
            .parse()
            .map_err(config_error)?;
        let algos: Vec<Algo> =
            parse_names(resolve_names(args.algos.as_deref(), file.algos, d.tsp_algos))?;
        let p_lines = resolve_values(args.p_lines.as_deref(), file.p_lines, usize_list)?
            .unwrap_or_else(|| d.tsp_p_lines.to_vec());
        let input = args
            .input
            .clone()
            .or(file.input)
            .unwrap_or_else(|| tsp::cities_path(&project.layout, problem));

        Ok(TspSettings {
            tsp: problem,
            algos,
            p_lines,
            input,
            params: GaParams {
                n_iter: args.n_iter.or(file.n_iter).unwrap_or(d.tsp_n_iter),
                pop_size: args.pop_size.or(file.pop_size).unwrap_or(d.tsp_pop_size),
                mut_rate: args.mut_rate.or(file.mut_rate).unwrap_or(d.tsp_mut_rate),
                fusion_p: args.fusion_p.or(file.fusion_p).unwrap_or(DEFAULT_FUSION_P),
            },
            radius: file.radius.unwrap_or(d.tsp_radius),
            side: file.side.unwrap_or(d.tsp_side),
            seed: args.seed.or(file.seed).unwrap_or(d.tsp_seed),
        })
    }

    pub fn resolve_migration(
        &self,
        args: &MigrationArgs,
        project: &ProjectSettings,
    ) -> Result<MigrationSettings> {
        let d = DefaultsConfig::default();
        let file = self.migration.clone().unwrap_or_default();

        let algos: Vec<Algo> = parse_names(resolve_names(
            args.algos.as_deref(),
            file.algos,
            d.migration_algos,
        ))?;
        let continents = resolve_values(args.continents.as_deref(), file.continents, usize_list)?
            .unwrap_or_else(|| d.migration_continents.to_vec());
        let fusion_ps = resolve_values(args.fusion_ps.as_deref(), file.fusion_ps, f64_list)?
            .unwrap_or_else(|| d.migration_fusion_ps.to_vec());

        let configs = expand_configs(&algos, &continents, &fusion_ps)?;
        let input = args
            .input
            .clone()
            .or(file.input)
            .unwrap_or_else(|| tsp::cities_path(&project.layout, Tsp::America));

        Ok(MigrationSettings {
            input,
            params: GpParams {
                migration_length: args
                    .migration_length
                    .or(file.migration_length)
                    .unwrap_or(d.migration_length),
                n_migrations: args
                    .n_migrations
                    .or(file.n_migrations)
                    .unwrap_or(d.migration_n_migrations),
                pop_size: args
                    .pop_size
                    .or(file.pop_size)
                    .unwrap_or(d.migration_pop_size),
                mut_rate: args
                    .mut_rate
                    .or(file.mut_rate)
                    .unwrap_or(d.migration_mut_rate),
            },
            configs,
            p_line: args
                .p_line
                .or(file.p_line)
                .unwrap_or(d.migration_p_line),
            top: args.top.or(file.top).unwrap_or(d.migration_top),
        })
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    debug!("Loading configuration from file: {:?}", path);
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e: toml::de::Error| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

/// Writes each `a.b.c=value` into the nested tables, creating missing sections. Values are read
/// as TOML literals when they parse as one and kept as text otherwise.
fn apply_set_values(table: &mut toml::Table, set_values: &[String]) -> Result<()> {
    for pair in set_values {
        let (key, raw) = parser::parse_key_value(pair)?;
        let mut segments: Vec<&str> = key.split('.').collect();
        let Some(leaf) = segments.pop() else {
            return Err(CliError::Config(format!("Invalid --set key '{}'", key)));
        };

        let mut current = &mut *table;
        for segment in segments {
            let entry = current
                .entry(segment.to_string())
                .or_insert(toml::Value::Table(toml::Table::new()));
            current = match entry {
                toml::Value::Table(section) => section,
                _ => {
                    return Err(CliError::Config(format!(
                        "Cannot set '{}': '{}' is not a section",
                        key, segment
                    )));
                }
            };
        }
        debug!(key, value = raw, "Applying configuration override");
        current.insert(leaf.to_string(), override_value(raw));
    }
    Ok(())
}

fn override_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {}", raw))
        .ok()
        .and_then(|mut parsed| parsed.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

fn config_error(e: ConfigError) -> CliError {
    CliError::Config(e.to_string())
}

fn resolve_values<T>(
    cli: Option<&str>,
    file: Option<ListValue<T>>,
    parse_text: fn(&str) -> std::result::Result<Vec<T>, ParseError>,
) -> Result<Option<Vec<T>>> {
    if let Some(text) = cli {
        return Ok(Some(parse_text(text)?));
    }
    Ok(file.map(|value| value.into_values(parse_text)).transpose()?)
}

fn resolve_pair(
    name: &str,
    cli: Option<&str>,
    file: Option<ListValue<f64>>,
) -> Result<Option<(f64, f64)>> {
    match resolve_values(cli, file, f64_list)? {
        None => Ok(None),
        Some(values) => match values.as_slice() {
            [a, b] => Ok(Some((*a, *b))),
            _ => Err(CliError::Config(format!(
                "'{}' expects two values, got {}",
                name,
                values.len()
            ))),
        },
    }
}

fn resolve_names(cli: Option<&str>, file: Option<ListValue<String>>, default: &str) -> Vec<String> {
    match (cli, file) {
        (Some(text), _) => split_names(text),
        (None, Some(value)) => value.into_names(),
        (None, None) => split_names(default),
    }
}

fn parse_names<T>(names: Vec<String>) -> Result<Vec<T>>
where
    T: FromStr<Err = ConfigError>,
{
    names
        .iter()
        .map(|name| name.parse().map_err(config_error))
        .collect()
}

/// One configuration per crossover and number of continents; the fusion crossover gets one per
/// fusion probability as well.
fn expand_configs(
    algos: &[Algo],
    continents: &[usize],
    fusion_ps: &[f64],
) -> Result<Vec<MigrationConfig>> {
    if algos.contains(&Algo::Fusion) && fusion_ps.is_empty() {
        return Err(CliError::Config(
            "The fusion crossover requires at least one fusion probability.".to_string(),
        ));
    }
    let mut configs = Vec::new();
    for &algo in algos {
        for &n_continents in continents {
            if algo == Algo::Fusion {
                for &p in fusion_ps {
                    configs.push(MigrationConfig::new(algo, n_continents, Some(p)));
                }
            } else {
                configs.push(MigrationConfig::new(algo, n_continents, None));
            }
        }
    }
    for config in &configs {
        config.validate().map_err(config_error)?;
    }
    Ok(configs)
}
