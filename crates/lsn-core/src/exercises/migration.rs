use rayon::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use super::tsp::{Algo, BestRoute, best_route_in};
use crate::core::charts::{Panel, route_panel};
use crate::core::layout::ProjectLayout;
use crate::core::table::TableError;
use crate::engine::context::LabContext;
use crate::engine::error::{ConfigError, EngineError};
use crate::engine::invocation::Invocation;
use crate::engine::runner::{Outcome, run_unless_cached};
use crate::engine::sweep::sweep;

pub const SECTION: &str = "10";
pub const PARALLEL: &str = "10_2";
pub const MPI_LAUNCHER: &str = "mpirun";
pub const CAPITALS_FILE: &str = "capitals.csv";

/// What identifies a set of results: crossover, number of MPI continents and fusion probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MigrationConfig {
    pub algo: Algo,
    pub n_continents: usize,
    /// `None` (or `NaN`) for every algorithm but [`Algo::Fusion`].
    pub fusion_p: Option<f64>,
}

impl MigrationConfig {
    pub fn new(algo: Algo, n_continents: usize, fusion_p: Option<f64>) -> Self {
        Self {
            algo,
            n_continents,
            fusion_p,
        }
    }

    /// The fusion probability, unless missing or `NaN`.
    pub fn fusion_level(&self) -> Option<f64> {
        self.fusion_p.filter(|p| !p.is_nan())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.algo == Algo::Fusion && self.fusion_level().is_none() {
            return Err(ConfigError::InvalidValue {
                name: "fusion_p",
                reason: "the fusion crossover requires a fusion probability".to_string(),
            });
        }
        if self.n_continents == 0 {
            return Err(ConfigError::InvalidValue {
                name: "n_continents",
                reason: "at least one continent is required".to_string(),
            });
        }
        Ok(())
    }
}

pub fn results_dir(layout: &ProjectLayout, n_continents: usize, fusion_p: Option<f64>) -> PathBuf {
    let dir = layout
        .results_dir(SECTION)
        .join(n_continents.to_string());
    match fusion_p.filter(|p| !p.is_nan()) {
        Some(p) => dir.join(format!("fusion_{:.3}", p)),
        None => dir,
    }
}

pub fn results_path(layout: &ProjectLayout, config: &MigrationConfig) -> Result<PathBuf, EngineError> {
    config.validate()?;
    Ok(results_dir(layout, config.n_continents, config.fusion_level())
        .join(format!("{}.csv", config.algo.tag())))
}

pub fn capitals_path(layout: &ProjectLayout) -> PathBuf {
    layout.results_dir(SECTION).join(CAPITALS_FILE)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpParams {
    /// Iterations between two migrations.
    pub migration_length: usize,
    pub n_migrations: usize,
    /// Total population, split among the continents.
    pub pop_size: usize,
    pub mut_rate: f64,
}

/// Launches `n_continents` MPI processes evolving their own population and exchanging
/// individuals every `migration_length` iterations.
pub fn run_gp(
    ctx: &LabContext,
    input: &Path,
    params: &GpParams,
    config: &MigrationConfig,
    p_line: usize,
) -> Result<Outcome, EngineError> {
    let expected = results_path(ctx.layout, config)?;
    let invocation = Invocation::new(ctx.layout.executable(PARALLEL))
        .launcher([
            MPI_LAUNCHER.to_string(),
            "-c".to_string(),
            config.n_continents.to_string(),
        ])
        .flag(
            "out",
            results_dir(ctx.layout, config.n_continents, config.fusion_level()),
        )
        .flag("in", input)
        .flag("crossover", config.algo.tag())
        .flag("migration_length", params.migration_length)
        .flag("n_migrations", params.n_migrations)
        .flag("pop_size", params.pop_size)
        .flag("mut_rate", params.mut_rate)
        .flag("fusion_p", config.fusion_level().unwrap_or(0.0))
        .seeded(&ctx.seeding(p_line));
    run_unless_cached(ctx.runner, ctx.cache, &expected, &invocation)
}

/// One run per configuration. The MPI jobs run one at a time, each already using
/// `n_continents` processes.
#[instrument(skip_all, name = "migration_runs")]
pub fn run_configs(
    ctx: &LabContext,
    input: &Path,
    params: &GpParams,
    configs: &[MigrationConfig],
    p_line: usize,
) -> Result<Vec<Outcome>, EngineError> {
    info!(n = configs.len(), "Running parallel genetic algorithms");
    configs
        .iter()
        .map(|config| {
            ctx.reporter
                .phase(&format!("{} x{}", config.algo, config.n_continents), || {
                    run_gp(ctx, input, params, config, p_line)
                })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub config: MigrationConfig,
    pub best: BestRoute,
}

pub fn collect_best_result(
    layout: &ProjectLayout,
    config: &MigrationConfig,
) -> Result<RankedResult, EngineError> {
    Ok(RankedResult {
        config: *config,
        best: best_route_in(&results_path(layout, config)?)?,
    })
}

/// Best route of every configuration, shortest first. Files are read in parallel.
pub fn collect_best_results(
    layout: &ProjectLayout,
    configs: &[MigrationConfig],
) -> Result<Vec<RankedResult>, EngineError> {
    let mut results = configs
        .par_iter()
        .map(|config| collect_best_result(layout, config))
        .collect::<Result<Vec<_>, _>>()?;
    results.sort_by(|a, b| a.best.distance.total_cmp(&b.best.distance));
    Ok(results)
}

/// Collects the best results with progress reporting, for large configuration grids.
pub fn rank_configs(
    ctx: &LabContext,
    configs: &[MigrationConfig],
) -> Result<Vec<RankedResult>, EngineError> {
    let mut results = sweep(ctx, "Collecting results", configs, |config| {
        collect_best_result(ctx.layout, config)
    })?;
    results.sort_by(|a, b| a.best.distance.total_cmp(&b.best.distance));
    Ok(results)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Capital {
    pub city: String,
    pub longitude: f64,
    pub latitude: f64,
}

pub fn read_capitals(path: &Path) -> Result<Vec<Capital>, EngineError> {
    let csv_error = |e: csv::Error| {
        EngineError::from(TableError::Csv {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error)?;
    reader
        .deserialize::<Capital>()
        .map(|record| record.map_err(csv_error))
        .collect()
}

/// Capitals as `(longitude, latitude)` city coordinates.
pub fn capital_coordinates(capitals: &[Capital]) -> Vec<(f64, f64)> {
    capitals.iter().map(|c| (c.longitude, c.latitude)).collect()
}

/// The route of a ranked result drawn over the capitals.
pub fn capitals_route_panel(
    result: &RankedResult,
    capitals: &[Capital],
) -> Result<Panel, EngineError> {
    let cities = capital_coordinates(capitals);
    let route = super::tsp::route_coordinates(&result.best, &cities)?;
    let mut title = format!(
        "{}, {} continents, total distance: {:.3}",
        result.config.algo, result.config.n_continents, result.best.distance
    );
    if let Some(p) = result.config.fusion_level() {
        title.push_str(&format!(", p = {:.3}", p));
    }
    Ok(route_panel(title, &cities, &route)
        .x_desc("longitude")
        .y_desc("latitude"))
}
