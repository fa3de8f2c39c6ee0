use lsn::core::layout::ProjectLayout;
use lsn::engine::runner::CachePolicy;
use lsn::exercises::annealing::{AnnealingParams, EstimationParams};
use lsn::exercises::ising::{
    AutocorrelationParams, EquilibrationParams, IsingSystem, MeasureParams,
};
use lsn::exercises::migration::{GpParams, MigrationConfig};
use lsn::exercises::molecular::{Method, Step};
use lsn::exercises::tsp::{Algo, GaParams, Tsp};
use std::path::PathBuf;

pub struct ProjectSettings {
    pub layout: ProjectLayout,
    pub plots_dir: PathBuf,
    pub cache: CachePolicy,
    pub dry_run: bool,
}

pub struct IsingSettings {
    pub system: IsingSystem,
    pub temperatures: Vec<f64>,
    pub equilibration: EquilibrationParams,
    pub autocorrelation: AutocorrelationParams,
    pub measures: MeasureParams,
    pub in_process: bool,
    pub block_sizes: Vec<usize>,
    pub n_blocks: usize,
}

pub struct MdSettings {
    pub phases: Vec<String>,
    pub p_line: usize,
    pub n_bins: usize,
    pub methods: Vec<Method>,
    pub start_from: Step,
    pub block_size: usize,
    pub n_lags: usize,
    pub scan_sizes: Vec<usize>,
}

pub struct AnnealingSettings {
    pub run: u32,
    pub p_line: usize,
    pub annealing: AnnealingParams,
    pub estimation: EstimationDraft,
    pub matrix_points: usize,
    pub temperature_classes: usize,
}

/// Estimation parameters whose (µ, σ) may still come from the annealing results.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationDraft {
    pub n_blocks: usize,
    pub block_size: usize,
    pub sampling_bound: f64,
    pub n_bins: usize,
    pub mu: Option<f64>,
    pub sigma: Option<f64>,
}

impl EstimationDraft {
    /// Fills the missing parameters from `best`.
    pub fn complete(&self, best: (f64, f64)) -> EstimationParams {
        EstimationParams {
            n_blocks: self.n_blocks,
            block_size: self.block_size,
            sampling_bound: self.sampling_bound,
            n_bins: self.n_bins,
            mu: self.mu.unwrap_or(best.0),
            sigma: self.sigma.unwrap_or(best.1),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.mu.is_some() && self.sigma.is_some()
    }
}

pub struct TspSettings {
    pub tsp: Tsp,
    pub algos: Vec<Algo>,
    pub p_lines: Vec<usize>,
    pub input: PathBuf,
    pub params: GaParams,
    pub radius: f64,
    pub side: f64,
    pub seed: u64,
}

pub struct MigrationSettings {
    pub input: PathBuf,
    pub params: GpParams,
    pub configs: Vec<MigrationConfig>,
    pub p_line: usize,
    pub top: usize,
}
