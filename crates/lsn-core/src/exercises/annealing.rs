use std::path::PathBuf;
use tracing::{info, instrument, warn};

use crate::core::charts::{Panel, Series, histogram_panel};
use crate::core::layout::{ProjectLayout, float_label};
use crate::core::physics::quantum_well::{self, BoundStates};
use crate::core::table::Table;
use crate::engine::context::LabContext;
use crate::engine::error::{ConfigError, EngineError};
use crate::engine::invocation::Invocation;
use crate::engine::runner::{Outcome, run_unless_cached};

pub const SECTION: &str = "08";
pub const ANNEALING: &str = "08_2";
pub const ESTIMATION: &str = "08_2_psi";
pub const DEFAULT_PRIME_LINE: usize = 0;

pub fn run_results(layout: &ProjectLayout, run: u32) -> PathBuf {
    layout.results_dir(SECTION).join(run.to_string())
}

/// Parameters, temperature and `<H>` estimate at every annealing step.
pub fn annealing_path(layout: &ProjectLayout, run: u32) -> PathBuf {
    run_results(layout, run).join("annealing.csv")
}

/// Progressive estimate of the ground state energy.
pub fn min_energy_path(layout: &ProjectLayout, run: u32) -> PathBuf {
    run_results(layout, run).join("H_min.csv")
}

/// Histogram of |ψ|² sampled with the optimal parameters.
pub fn psi_path(layout: &ProjectLayout, run: u32) -> PathBuf {
    run_results(layout, run).join("psi.csv")
}

/// Search of the (µ, σ) pair minimizing `<H>`, cooling logarithmically from `T0` to `Tf`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnealingParams {
    /// Number of temperature reductions.
    pub n_temperature_steps: usize,
    /// Metropolis steps at each temperature.
    pub n_explore: usize,
    pub temperatures: (f64, f64),
    /// Blocks used to estimate `<H>` for every proposed pair.
    pub n_blocks: usize,
    pub block_size: usize,
    pub initial_guess: (f64, f64),
    /// Standard deviation of the gaussian proposal in parameter space.
    pub stddev: f64,
}

impl AnnealingParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (t0, tf) = self.temperatures;
        if !(t0 > 0.0 && tf > 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "temperatures",
                reason: format!("temperatures must be positive, got ({}, {})", t0, tf),
            });
        }
        if self.stddev <= 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "stddev",
                reason: "the proposal width must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimationParams {
    pub n_blocks: usize,
    pub block_size: usize,
    /// `x` is sampled in `(-sampling_bound, sampling_bound)`.
    pub sampling_bound: f64,
    /// Should be odd so that a bin is centered on `x = 0`.
    pub n_bins: usize,
    pub mu: f64,
    pub sigma: f64,
}

pub fn run_simulated_annealing(
    ctx: &LabContext,
    run: u32,
    params: &AnnealingParams,
    p_line: usize,
) -> Result<Outcome, EngineError> {
    params.validate()?;
    let (t0, tf) = params.temperatures;
    let invocation = Invocation::new(ctx.layout.executable(ANNEALING))
        .flag("out", run_results(ctx.layout, run))
        .seeded(&ctx.seeding(p_line))
        .flag("n_steps", params.n_temperature_steps)
        .flag("n_explore", params.n_explore)
        .flag("n_blocks", params.n_blocks)
        .flag("block_size", params.block_size)
        .flag("T0", t0)
        .flag("Tf", tf)
        .flag("p0", params.initial_guess)
        .flag("stddev", params.stddev);
    run_unless_cached(
        ctx.runner,
        ctx.cache,
        &annealing_path(ctx.layout, run),
        &invocation,
    )
}

/// Estimates `<H>` for the given parameters and samples the histogram of |ψ|².
pub fn run_estimation(
    ctx: &LabContext,
    run: u32,
    params: &EstimationParams,
    p_line: usize,
) -> Result<Outcome, EngineError> {
    if params.n_bins % 2 != 1 {
        warn!(
            n_bins = params.n_bins,
            "The number of bins should be odd so that a bin is centered on x = 0"
        );
    }
    let bound = params.sampling_bound;
    let invocation = Invocation::new(ctx.layout.executable(ESTIMATION))
        .flag("out", run_results(ctx.layout, run))
        .seeded(&ctx.seeding(p_line))
        .flag("n_blocks", params.n_blocks)
        .flag("block_size", params.block_size)
        .flag("bounds", (-bound, bound))
        .flag("n_bins", params.n_bins)
        .flag("mu", params.mu)
        .flag("sigma", params.sigma);
    ctx.runner.run(&invocation).map(Outcome::Ran)
}

/// Annealing followed by the estimation at the optimal parameters it found.
#[instrument(skip_all, name = "vmc_workflow", fields(run = run))]
pub fn anneal_and_estimate(
    ctx: &LabContext,
    run: u32,
    annealing: &AnnealingParams,
    estimation: &EstimationParams,
    p_line: usize,
) -> Result<(f64, f64), EngineError> {
    let reporter = ctx.reporter;
    reporter
        .phase("Simulated annealing", || {
            run_simulated_annealing(ctx, run, annealing, p_line)
        })?
        .require_success()?;

    let (mu, sigma) = best_parameters(&read_annealing(ctx.layout, run)?)?;
    info!(mu, sigma, "Optimal parameters");
    let estimation = EstimationParams {
        mu,
        sigma,
        ..estimation.clone()
    };
    reporter
        .phase("Ground state estimation", || {
            run_estimation(ctx, run, &estimation, p_line)
        })?
        .require_success()?;
    Ok((mu, sigma))
}

pub fn read_annealing(layout: &ProjectLayout, run: u32) -> Result<Table, EngineError> {
    Ok(Table::read_csv(&annealing_path(layout, run))?)
}

pub fn read_min_energy(layout: &ProjectLayout, run: u32) -> Result<Table, EngineError> {
    Ok(Table::read_csv(&min_energy_path(layout, run))?)
}

pub fn read_psi(layout: &ProjectLayout, run: u32) -> Result<Table, EngineError> {
    Ok(Table::read_csv(&psi_path(layout, run))?)
}

/// Parameters reached at the end of the annealing.
pub fn best_parameters(annealing: &Table) -> Result<(f64, f64), EngineError> {
    let mu = annealing.try_column("mu")?;
    let sigma = annealing.try_column("sigma")?;
    match (mu.last(), sigma.last()) {
        (Some(&mu), Some(&sigma)) => Ok((mu, sigma)),
        _ => Err(EngineError::InvalidParameters(
            "the annealing produced no step".to_string(),
        )),
    }
}

/// Matrix-method eigenstates of the double well, the reference for the variational result.
pub fn compute_states(n_points: usize, bounds: (f64, f64)) -> Result<BoundStates, EngineError> {
    Ok(quantum_well::compute_states(n_points, bounds)?)
}

/// Density histogram: the `psi` counts divided by `Σ counts × bin width`.
///
/// Returns the left bin edges and the densities.
pub fn psi_density(psi: &Table) -> Result<(Vec<f64>, Vec<f64>), EngineError> {
    let counts = psi.try_column("psi")?;
    let edges = psi.try_column("l_edge")?;
    let [first, second, ..] = edges else {
        return Err(EngineError::InvalidParameters(
            "at least two bins are needed to infer the bin width".to_string(),
        ));
    };
    let width = second - first;
    let norm = counts.iter().sum::<f64>() * width;
    if norm == 0.0 {
        return Err(EngineError::InvalidParameters(
            "the histogram is empty".to_string(),
        ));
    }
    Ok((edges.to_vec(), counts.iter().map(|c| c / norm).collect()))
}

/// Digitizes `log10(T)` into `n_classes` equal-width classes numbered from 1 (hottest last).
pub fn temperature_classes(temperatures: &[f64], n_classes: usize) -> Vec<usize> {
    let logs: Vec<f64> = temperatures.iter().map(|t| t.log10()).collect();
    let (min, max) = logs
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let width = (max - min) / n_classes.max(1) as f64;
    logs.iter()
        .map(|&v| {
            (0..n_classes)
                .filter(|&i| min + width * i as f64 <= v)
                .count()
        })
        .collect()
}

/// `<H>` estimate at every `stride`-th annealing step, starting from the second.
pub fn energy_panel(annealing: &Table, stride: usize) -> Result<Panel, EngineError> {
    let estimate = annealing.try_column("H_estimate")?;
    let error = annealing.try_column("H_error")?;
    let stride = stride.max(1);
    let picked: Vec<usize> = (1..estimate.len()).step_by(stride).collect();
    let steps: Vec<f64> = picked.iter().map(|&i| i as f64).collect();
    let pick = |values: &[f64]| picked.iter().map(|&i| values[i]).collect::<Vec<f64>>();
    Ok(Panel::new("Simulated annealing")
        .x_desc("step")
        .y_desc("<H>")
        .with_series(Series::error_bars(
            "H",
            &steps,
            &pick(estimate),
            &pick(error),
        )))
}

/// The (µ, σ) trajectory, one point series per temperature class.
pub fn trajectory_panel(annealing: &Table, n_classes: usize) -> Result<Panel, EngineError> {
    let mu = annealing.try_column("mu")?;
    let sigma = annealing.try_column("sigma")?;
    let classes = temperature_classes(annealing.try_column("T")?, n_classes);
    let panel = (1..=n_classes).fold(
        Panel::new("Parameter trajectory").x_desc("µ").y_desc("σ"),
        |panel, class| {
            let (xs, ys): (Vec<f64>, Vec<f64>) = classes
                .iter()
                .zip(mu.iter().zip(sigma))
                .filter(|(c, _)| **c == class)
                .map(|(_, (&m, &s))| (m, s))
                .unzip();
            if xs.is_empty() {
                return panel;
            }
            panel.with_series(Series::points(format!("class {}", class), &xs, &ys))
        },
    );
    Ok(panel)
}

/// Sampled |ψ|² against the matrix-method ground state.
pub fn psi_panel(psi: &Table, states: &BoundStates) -> Result<Panel, EngineError> {
    let (edges, density) = psi_density(psi)?;
    let reference = states.ground_state().map(|(energy, ground)| {
        (
            format!("|ψ₀|², E₀ = {}", float_label((energy * 1e4).round() / 1e4)),
            ground.iter().map(|p| p * p).collect::<Vec<f64>>(),
        )
    });
    Ok(match &reference {
        Some((label, density_ref)) => histogram_panel(
            "Ground state",
            &edges,
            &density,
            Some((label.as_str(), &states.x, density_ref)),
        ),
        None => histogram_panel("Ground state", &edges, &density, None),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::charts::Figure;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::runner::{CachePolicy, RecordingRunner};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn annealing_params() -> AnnealingParams {
        AnnealingParams {
            n_temperature_steps: 100,
            n_explore: 20,
            temperatures: (1.0, 0.001),
            n_blocks: 10,
            block_size: 100,
            initial_guess: (1.0, 0.5),
            stddev: 0.05,
        }
    }

    fn estimation_params() -> EstimationParams {
        EstimationParams {
            n_blocks: 50,
            block_size: 1000,
            sampling_bound: 3.0,
            n_bins: 101,
            mu: 0.8,
            sigma: 0.6,
        }
    }

    #[test]
    fn paths_live_under_the_run_directory() {
        let layout = ProjectLayout::default();
        assert_eq!(
            annealing_path(&layout, 2),
            Path::new("../results/08/2/annealing.csv")
        );
        assert_eq!(min_energy_path(&layout, 0), Path::new("../results/08/0/H_min.csv"));
        assert_eq!(psi_path(&layout, 1), Path::new("../results/08/1/psi.csv"));
    }

    #[test]
    fn annealing_command_line() {
        let layout = ProjectLayout::default();
        let runner = RecordingRunner::new();
        let reporter = ProgressReporter::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::default());

        run_simulated_annealing(&ctx, 1, &annealing_params(), 0).unwrap();
        let argv = &runner.argvs()[0];
        assert_eq!(argv[0], "../bin/08_2");
        assert_eq!(argv[1], "--out=../results/08/1");
        assert_eq!(argv[4], "--primes_line=0");
        assert_eq!(
            &argv[5..],
            &[
                "--n_steps=100",
                "--n_explore=20",
                "--n_blocks=10",
                "--block_size=100",
                "--T0=1.0",
                "--Tf=0.001",
                "--p0=1.0,0.5",
                "--stddev=0.05",
            ]
        );
    }

    #[test]
    fn annealing_is_skipped_when_cached_and_rejects_bad_temperatures() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::with_root(dir.path());
        fs::create_dir_all(run_results(&layout, 0)).unwrap();
        fs::write(annealing_path(&layout, 0), "mu\n1\n").unwrap();
        let runner = RecordingRunner::new();
        let reporter = ProgressReporter::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::new(true));

        assert!(
            run_simulated_annealing(&ctx, 0, &annealing_params(), 0)
                .unwrap()
                .was_cached()
        );
        let bad = AnnealingParams {
            temperatures: (0.0, 1.0),
            ..annealing_params()
        };
        assert!(matches!(
            run_simulated_annealing(&ctx, 1, &bad, 0),
            Err(EngineError::Config { .. })
        ));
        assert_eq!(runner.count(), 0);
    }

    #[test]
    fn estimation_command_line_uses_symmetric_bounds() {
        let layout = ProjectLayout::default();
        let runner = RecordingRunner::new();
        let reporter = ProgressReporter::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::new(true));

        let params = EstimationParams {
            n_bins: 100,
            ..estimation_params()
        };
        run_estimation(&ctx, 3, &params, 2).unwrap();
        let argv = &runner.argvs()[0];
        assert_eq!(argv[0], "../bin/08_2_psi");
        assert_eq!(
            &argv[5..],
            &[
                "--n_blocks=50",
                "--block_size=1000",
                "--bounds=-3.0,3.0",
                "--n_bins=100",
                "--mu=0.8",
                "--sigma=0.6",
            ]
        );
    }

    #[test]
    fn estimation_passes_the_sampling_bound_through() {
        let layout = ProjectLayout::default();
        let runner = RecordingRunner::new();
        let reporter = ProgressReporter::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::new(true));

        let params = EstimationParams {
            sampling_bound: -2.0,
            ..estimation_params()
        };
        run_estimation(&ctx, 3, &params, 2).unwrap();
        assert!(runner.argvs()[0].contains(&"--bounds=2.0,-2.0".to_string()));
    }

    #[test]
    fn energy_panel_of_a_single_step_renders_empty_axes() {
        let dir = tempdir().unwrap();
        let annealing =
            Table::from_columns([("H_estimate", vec![-0.4]), ("H_error", vec![0.01])]).unwrap();

        let energy = energy_panel(&annealing, 1).unwrap();
        assert!(energy.series[0].points.is_empty());

        let path = dir.path().join("annealing_0.svg");
        Figure::single(energy).render_svg(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn workflow_estimates_at_the_last_annealed_parameters() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::with_root(dir.path());
        let annealing = annealing_path(&layout, 1);
        let runner = RecordingRunner::with_hook(move |invocation| {
            if invocation.program().ends_with(ANNEALING) {
                fs::create_dir_all(annealing.parent().unwrap()).unwrap();
                fs::write(
                    &annealing,
                    "H_estimate,H_error,mu,sigma,T\n-0.3,0.01,1.0,0.5,1\n-0.44,0.002,0.81,0.62,0.01\n",
                )
                .unwrap();
            }
        });
        let reporter = ProgressReporter::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::default());

        let best =
            anneal_and_estimate(&ctx, 1, &annealing_params(), &estimation_params(), 0).unwrap();
        assert_eq!(best, (0.81, 0.62));
        let argvs = runner.argvs();
        assert_eq!(argvs.len(), 2);
        assert!(argvs[1].contains(&"--mu=0.81".to_string()));
        assert!(argvs[1].contains(&"--sigma=0.62".to_string()));
    }

    #[test]
    fn psi_density_integrates_to_one() {
        let psi = Table::from_columns([
            ("psi", vec![1.0, 3.0, 1.0]),
            ("l_edge", vec![-0.75, -0.25, 0.25]),
        ])
        .unwrap();
        let (edges, density) = psi_density(&psi).unwrap();
        assert_eq!(edges, vec![-0.75, -0.25, 0.25]);
        let integral: f64 = density.iter().map(|d| d * 0.5).sum();
        assert!((integral - 1.0).abs() < 1e-12);
        assert!((density[1] - 1.2).abs() < 1e-12);

        let single = Table::from_columns([("psi", vec![1.0]), ("l_edge", vec![0.0])]).unwrap();
        assert!(psi_density(&single).is_err());
    }

    #[test]
    fn temperature_classes_digitize_the_log_scale() {
        let temps = [1.0, 0.1, 0.01, 0.001];
        assert_eq!(temperature_classes(&temps, 2), vec![2, 2, 1, 1]);
        let temps = [1.0, 0.05, 0.005, 0.001];
        assert_eq!(temperature_classes(&temps, 3), vec![3, 2, 1, 1]);
    }

    #[test]
    fn panels_from_annealing_data() {
        let annealing = Table::from_columns([
            ("H_estimate", vec![-0.1, -0.2, -0.3, -0.4, -0.45]),
            ("H_error", vec![0.1, 0.05, 0.02, 0.01, 0.005]),
            ("mu", vec![1.0, 0.9, 0.85, 0.82, 0.81]),
            ("sigma", vec![0.5, 0.55, 0.6, 0.61, 0.62]),
            ("T", vec![1.0, 0.3, 0.1, 0.03, 0.01]),
        ])
        .unwrap();
        let energy = energy_panel(&annealing, 2).unwrap();
        let steps: Vec<f64> = energy.series[0].points.iter().map(|p| p.0).collect();
        assert_eq!(steps, vec![1.0, 3.0]);

        let trajectory = trajectory_panel(&annealing, 2).unwrap();
        let total: usize = trajectory.series.iter().map(|s| s.points.len()).sum();
        assert_eq!(total, 5);

        let psi = Table::from_columns([
            ("psi", vec![1.0, 2.0, 1.0]),
            ("l_edge", vec![-1.5, -0.5, 0.5]),
        ])
        .unwrap();
        let states = compute_states(200, (-3.0, 3.0)).unwrap();
        let panel = psi_panel(&psi, &states).unwrap();
        assert_eq!(panel.series.len(), 2);
        assert_eq!(panel.series[1].points.len(), 200);
    }
}
