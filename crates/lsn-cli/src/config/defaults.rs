/// Values used when neither the command line, a `-S` override nor the configuration file sets a
/// parameter.
pub struct DefaultsConfig {
    pub root: &'static str,
    pub plots_dir: &'static str,
    pub use_cached: bool,

    pub ising_coupling: f64,
    pub ising_field: f64,
    pub ising_n_spins: u32,
    pub ising_samplers: &'static str,
    pub ising_prime_line: usize,
    pub ising_save_spins: bool,
    pub ising_temperatures: &'static str,
    pub ising_n_register: usize,
    pub ising_warmup_steps: usize,
    pub ising_n_lags: usize,
    pub ising_skip: usize,
    pub ising_measure_steps: usize,
    pub ising_block_size: usize,
    pub ising_block_sizes: &'static [usize],
    pub ising_n_blocks: usize,

    pub md_phases: &'static str,
    pub md_p_line: usize,
    pub md_n_bins: usize,
    pub md_methods: &'static str,
    pub md_start_from: &'static str,
    pub md_block_size: usize,
    pub md_n_lags: usize,
    pub md_scan_sizes: &'static [usize],

    pub annealing_run: u32,
    pub annealing_p_line: usize,
    pub annealing_temperature_steps: usize,
    pub annealing_n_explore: usize,
    pub annealing_temperatures: (f64, f64),
    pub annealing_n_blocks: usize,
    pub annealing_block_size: usize,
    pub annealing_initial_guess: (f64, f64),
    pub annealing_stddev: f64,
    pub estimation_n_blocks: usize,
    pub estimation_block_size: usize,
    pub estimation_sampling_bound: f64,
    pub estimation_n_bins: usize,
    pub matrix_points: usize,
    pub temperature_classes: usize,

    pub tsp_problem: &'static str,
    pub tsp_algos: &'static str,
    pub tsp_p_lines: &'static [usize],
    pub tsp_n_iter: usize,
    pub tsp_pop_size: usize,
    pub tsp_mut_rate: f64,
    pub tsp_radius: f64,
    pub tsp_side: f64,
    pub tsp_seed: u64,

    pub migration_algos: &'static str,
    pub migration_continents: &'static [usize],
    pub migration_fusion_ps: &'static [f64],
    pub migration_length: usize,
    pub migration_n_migrations: usize,
    pub migration_pop_size: usize,
    pub migration_mut_rate: f64,
    pub migration_p_line: usize,
    pub migration_top: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            root: "..",
            plots_dir: "plots",
            use_cached: false,

            ising_coupling: 1.0,
            ising_field: 0.02,
            ising_n_spins: 50,
            ising_samplers: "metropolis,gibbs",
            ising_prime_line: 1,
            ising_save_spins: true,
            ising_temperatures: "0.5:2.0:16",
            ising_n_register: 10_000,
            ising_warmup_steps: 20_000,
            ising_n_lags: 500,
            ising_skip: 1_000,
            ising_measure_steps: 100_000,
            ising_block_size: 1_000,
            ising_block_sizes: &[1, 10, 100, 1_000],
            ising_n_blocks: 100,

            md_phases: "solid,liquid,gas",
            md_p_line: 0,
            md_n_bins: 100,
            md_methods: "mc,md",
            md_start_from: "warmup",
            md_block_size: 100,
            md_n_lags: 200,
            md_scan_sizes: &[10, 20, 50, 100, 200, 500, 1_000, 2_000],

            annealing_run: 0,
            annealing_p_line: 0,
            annealing_temperature_steps: 100,
            annealing_n_explore: 100,
            annealing_temperatures: (1.0, 0.001),
            annealing_n_blocks: 20,
            annealing_block_size: 1_000,
            annealing_initial_guess: (1.0, 0.5),
            annealing_stddev: 0.1,
            estimation_n_blocks: 100,
            estimation_block_size: 10_000,
            estimation_sampling_bound: 3.0,
            estimation_n_bins: 101,
            matrix_points: 1_000,
            temperature_classes: 5,

            tsp_problem: "circle",
            tsp_algos: "ex,exmod,my2,fusion",
            tsp_p_lines: &[0],
            tsp_n_iter: 1_000,
            tsp_pop_size: 500,
            tsp_mut_rate: 0.1,
            tsp_radius: 1.0,
            tsp_side: 2.0,
            tsp_seed: 42,

            migration_algos: "exmod,my2,fusion",
            migration_continents: &[1, 2, 4, 8],
            migration_fusion_ps: &[0.4],
            migration_length: 50,
            migration_n_migrations: 20,
            migration_pop_size: 1_000,
            migration_mut_rate: 0.1,
            migration_p_line: 0,
            migration_top: 3,
        }
    }
}
