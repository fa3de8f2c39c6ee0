use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, instrument};

use crate::core::charts::{Panel, Series, route_panel};
use crate::core::layout::ProjectLayout;
use crate::core::table::{ReadOptions, Table, TableError};
use crate::engine::context::LabContext;
use crate::engine::error::{ConfigError, EngineError};
use crate::engine::invocation::Invocation;
use crate::engine::runner::{Outcome, run_unless_cached};
use crate::engine::sweep::sweep;

pub const SECTION: &str = "09";
pub const GENETIC: &str = "09_1";
pub const N_CITIES: usize = 34;
pub const DEFAULT_FUSION_P: f64 = 0.4;
pub const DISTANCE_COLUMN: &str = "total_distance";

/// Crossover operator of the genetic algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algo {
    Exercise,
    ExerciseMod,
    MyAlgo2,
    /// Picks `MyAlgo2` with probability `fusion_p`, `ExerciseMod` otherwise.
    Fusion,
    Dummy,
}

impl Algo {
    pub const ALL: [Algo; 5] = [
        Algo::Exercise,
        Algo::ExerciseMod,
        Algo::MyAlgo2,
        Algo::Fusion,
        Algo::Dummy,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Algo::Exercise => "ex",
            Algo::ExerciseMod => "exmod",
            Algo::MyAlgo2 => "my2",
            Algo::Fusion => "fusion",
            Algo::Dummy => "dummy",
        }
    }
}

impl fmt::Display for Algo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Algo {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algo::ALL
            .into_iter()
            .find(|a| a.tag() == s)
            .ok_or_else(|| ConfigError::InvalidValue {
                name: "algo",
                reason: format!("unknown crossover '{}'", s),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tsp {
    Circle,
    Square,
    America,
}

impl Tsp {
    pub fn tag(&self) -> &'static str {
        match self {
            Tsp::Circle => "circle",
            Tsp::Square => "square",
            Tsp::America => "america",
        }
    }
}

impl fmt::Display for Tsp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Tsp {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "circle" => Ok(Tsp::Circle),
            "square" => Ok(Tsp::Square),
            "america" => Ok(Tsp::America),
            other => Err(ConfigError::InvalidValue {
                name: "tsp",
                reason: format!("unknown problem '{}'", other),
            }),
        }
    }
}

// --- Paths ---

pub fn results_dir(layout: &ProjectLayout, tsp: Tsp, p_line: usize) -> PathBuf {
    layout
        .results_dir(SECTION)
        .join(tsp.tag())
        .join(p_line.to_string())
}

/// Final population: one row per individual, city indices then `total_distance`.
pub fn results_path(layout: &ProjectLayout, tsp: Tsp, algo: Algo, p_line: usize) -> PathBuf {
    results_dir(layout, tsp, p_line).join(format!("{}.csv", algo.tag()))
}

/// Average distance of the better half of the population at each iteration.
pub fn distances_path(layout: &ProjectLayout, tsp: Tsp, algo: Algo, p_line: usize) -> PathBuf {
    results_dir(layout, tsp, p_line).join(format!("{}_stats.csv", algo.tag()))
}

/// Where the city coordinates of a problem are kept, `results/09/<tsp>/cities.csv`.
pub fn cities_path(layout: &ProjectLayout, tsp: Tsp) -> PathBuf {
    layout.results_dir(SECTION).join(tsp.tag()).join("cities.csv")
}

// --- Cities ---

/// Writes header-less `x,y` pairs, creating the parent directories.
pub fn write_coordinates(path: &Path, points: &[(f64, f64)]) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }
    let csv_error = |e: csv::Error| {
        EngineError::from(TableError::Csv {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_error)?;
    for (x, y) in points {
        writer
            .write_record([x.to_string(), y.to_string()])
            .map_err(csv_error)?;
    }
    writer.flush().map_err(|e| EngineError::io(path, e))?;
    debug!(path = %path.display(), n = points.len(), "Coordinates written");
    Ok(())
}

/// Cities evenly spaced on a circle of the given radius.
pub fn circle_cities(radius: f64) -> Vec<(f64, f64)> {
    (0..N_CITIES)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / N_CITIES as f64;
            (radius * theta.cos(), radius * theta.sin())
        })
        .collect()
}

/// Cities uniformly distributed in a square of the given side centered on the origin.
pub fn square_cities(seed: u64, side: f64) -> Vec<(f64, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let half = side / 2.0;
    (0..N_CITIES)
        .map(|_| (rng.gen_range(-half..half), rng.gen_range(-half..half)))
        .collect()
}

pub fn generate_circle_coordinates(path: &Path, radius: f64) -> Result<(), EngineError> {
    write_coordinates(path, &circle_cities(radius))
}

pub fn generate_square_coordinates(path: &Path, seed: u64, side: f64) -> Result<(), EngineError> {
    write_coordinates(path, &square_cities(seed, side))
}

/// Header-less `x,y` pairs, one city per line.
pub fn read_coordinates(path: &Path) -> Result<Vec<(f64, f64)>, EngineError> {
    let table = Table::read_csv_with(path, ReadOptions::headerless())?;
    let xs = table.try_column("0")?;
    let ys = table.try_column("1")?;
    Ok(xs.iter().copied().zip(ys.iter().copied()).collect())
}

// --- Runs ---

#[derive(Debug, Clone, PartialEq)]
pub struct GaParams {
    pub n_iter: usize,
    pub pop_size: usize,
    pub mut_rate: f64,
    pub fusion_p: f64,
}

pub fn run_ga(
    ctx: &LabContext,
    input: &Path,
    params: &GaParams,
    algo: Algo,
    tsp: Tsp,
    p_line: usize,
) -> Result<Outcome, EngineError> {
    let invocation = Invocation::new(ctx.layout.executable(GENETIC))
        .flag("out", results_dir(ctx.layout, tsp, p_line))
        .flag("in", input)
        .flag("crossover", algo.tag())
        .flag("n_iter", params.n_iter)
        .flag("pop_size", params.pop_size)
        .flag("mut_rate", params.mut_rate)
        .flag("fusion_p", params.fusion_p)
        .seeded(&ctx.seeding(p_line));
    run_unless_cached(
        ctx.runner,
        ctx.cache,
        &results_path(ctx.layout, tsp, algo, p_line),
        &invocation,
    )
}

/// Every crossover on every prime line, all runs in parallel.
#[instrument(skip_all, name = "tsp_panel", fields(tsp = %tsp))]
pub fn run_all(
    ctx: &LabContext,
    input: &Path,
    params: &GaParams,
    tsp: Tsp,
    algos: &[Algo],
    p_lines: &[usize],
) -> Result<Vec<Outcome>, EngineError> {
    let runs: Vec<(Algo, usize)> = algos
        .iter()
        .flat_map(|&a| p_lines.iter().map(move |&l| (a, l)))
        .collect();
    info!(n = runs.len(), "Running genetic algorithms");
    sweep(ctx, "Genetic runs", &runs, |&(algo, line)| {
        run_ga(ctx, input, params, algo, tsp, line)
    })
}

// --- Readers ---

/// The best individual of a population.
#[derive(Debug, Clone, PartialEq)]
pub struct BestRoute {
    pub distance: f64,
    pub cities: Vec<usize>,
}

/// Reads a population file, returning the individual with the shortest `total_distance`.
pub fn best_route_in(path: &Path) -> Result<BestRoute, EngineError> {
    let population = Table::read_csv(path)?.sort_by(DISTANCE_COLUMN)?;
    let best = population
        .row(0)
        .ok_or_else(|| EngineError::InvalidParameters(format!("'{}' is empty", path.display())))?;
    let distance_index = population
        .headers()
        .iter()
        .position(|h| h == DISTANCE_COLUMN)
        .unwrap_or(best.len());
    let cities = best
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != distance_index)
        .map(|(_, &c)| {
            if c.is_finite() && c >= 0.0 && c.fract() == 0.0 {
                Ok(c as usize)
            } else {
                Err(EngineError::InvalidParameters(format!(
                    "'{}' holds a non-index city '{}'",
                    path.display(),
                    c
                )))
            }
        })
        .collect::<Result<Vec<usize>, EngineError>>()?;
    Ok(BestRoute {
        distance: best[distance_index],
        cities,
    })
}

pub fn read_population(
    layout: &ProjectLayout,
    tsp: Tsp,
    algo: Algo,
    p_line: usize,
) -> Result<Table, EngineError> {
    Ok(Table::read_csv(&results_path(layout, tsp, algo, p_line))?)
}

pub fn read_distances(
    layout: &ProjectLayout,
    tsp: Tsp,
    algo: Algo,
    p_line: usize,
) -> Result<Table, EngineError> {
    Ok(Table::read_csv(&distances_path(layout, tsp, algo, p_line))?)
}

pub fn best_route(
    layout: &ProjectLayout,
    tsp: Tsp,
    algo: Algo,
    p_line: usize,
) -> Result<BestRoute, EngineError> {
    best_route_in(&results_path(layout, tsp, algo, p_line))
}

/// Coordinates of the cities in visiting order.
pub fn route_coordinates(
    route: &BestRoute,
    cities: &[(f64, f64)],
) -> Result<Vec<(f64, f64)>, EngineError> {
    route
        .cities
        .iter()
        .map(|&i| {
            cities.get(i).copied().ok_or_else(|| {
                EngineError::InvalidParameters(format!(
                    "city {} out of range ({} cities)",
                    i,
                    cities.len()
                ))
            })
        })
        .collect()
}

// --- Panels ---

pub fn best_route_panel(
    title: &str,
    route: &BestRoute,
    cities: &[(f64, f64)],
) -> Result<Panel, EngineError> {
    Ok(route_panel(
        format!("{}, total distance: {:.3}", title, route.distance),
        cities,
        &route_coordinates(route, cities)?,
    ))
}

/// Average distance of the better half against the iteration, one series per crossover.
pub fn distances_panel(runs: &[(Algo, Table)]) -> Panel {
    runs.iter().fold(
        Panel::new("Average distance, best half")
            .x_desc("iteration")
            .y_desc("distance"),
        |panel, (algo, table)| match table.column("avg_distance") {
            Some(distances) => {
                let iterations: Vec<f64> = (0..distances.len()).map(|i| i as f64).collect();
                panel.with_series(Series::line(algo.tag(), &iterations, distances))
            }
            None => panel,
        },
    )
}
