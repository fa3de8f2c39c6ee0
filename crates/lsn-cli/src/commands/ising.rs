use super::{Lab, summarize};
use crate::cli::{IsingAction, IsingArgs, ProjectArgs};
use crate::config::models::IsingSettings;
use crate::error::Result;
use lsn::core::charts::Figure;
use lsn::core::layout::float_label;
use lsn::core::table::ReadOptions;
use lsn::engine::sweep::sweep;
use lsn::exercises::ising::{self, SECTION, Sampler};
use tracing::{info, warn};

pub async fn run(args: IsingArgs, project_args: ProjectArgs) -> Result<()> {
    let (config, project) = super::load(&project_args)?;
    info!("Merging configuration from file and CLI arguments...");
    let settings = config.resolve_ising(&args)?;
    let lab = Lab::new(project);

    println!(
        "Ising chain of {} spins, J={}, h={}, {} temperature(s).",
        settings.system.n_spins,
        float_label(settings.system.coupling),
        float_label(settings.system.field),
        settings.temperatures.len()
    );
    tokio::task::block_in_place(|| execute(&lab, &settings, args.action))
}

fn execute(lab: &Lab, settings: &IsingSettings, action: IsingAction) -> Result<()> {
    match action {
        IsingAction::Equilibrate => equilibrate(lab, settings),
        IsingAction::Autocorrelate => autocorrelate(lab, settings),
        IsingAction::Measure => measure(lab, settings),
        IsingAction::BlockMeasure => block_measure(lab, settings),
        IsingAction::Plot => plot(lab, settings),
        IsingAction::All => {
            equilibrate(lab, settings)?;
            autocorrelate(lab, settings)?;
            measure(lab, settings)
        }
    }
}

fn equilibrate(lab: &Lab, settings: &IsingSettings) -> Result<()> {
    let ctx = lab.context();
    let outcomes = ctx.reporter.phase("Equilibration", || {
        ising::equilibrate_all(
            &ctx,
            &settings.system,
            &settings.equilibration,
            &settings.temperatures,
        )
    })?;
    summarize("Equilibration", &outcomes);
    Ok(())
}

fn autocorrelate(lab: &Lab, settings: &IsingSettings) -> Result<()> {
    let ctx = lab.context();
    ctx.reporter.phase("Autocorrelation", || {
        ising::autocorrelate_all(
            &ctx,
            &settings.system,
            &settings.autocorrelation,
            &settings.temperatures,
            settings.in_process,
        )
    })?;
    println!(
        "Autocorrelation: {} temperature(s) analysed{}.",
        settings.temperatures.len(),
        if settings.in_process { " in-process" } else { "" }
    );
    Ok(())
}

fn measure(lab: &Lab, settings: &IsingSettings) -> Result<()> {
    let ctx = lab.context();
    let outcomes = ctx.reporter.phase("Measures", || {
        ising::measure_all(
            &ctx,
            &settings.system,
            &settings.measures,
            &settings.temperatures,
        )
    })?;
    summarize("Measures", &outcomes);
    Ok(())
}

/// Every (temperature, sampler, block size) combination, each a single-sampler run.
fn block_measure(lab: &Lab, settings: &IsingSettings) -> Result<()> {
    let ctx = lab.context();
    let jobs: Vec<(f64, Sampler, usize)> = settings
        .temperatures
        .iter()
        .flat_map(|&t| {
            settings.system.samplers.iter().flat_map(move |&sampler| {
                settings
                    .block_sizes
                    .iter()
                    .map(move |&block_size| (t, sampler, block_size))
            })
        })
        .collect();

    let outcomes = ctx.reporter.phase("Block measures", || {
        sweep(&ctx, "Block measures", &jobs, |&(t, sampler, block_size)| {
            ising::run_block_measures(
                &ctx,
                &settings.system,
                settings.n_blocks,
                t,
                sampler,
                block_size,
            )
        })
    })?;
    summarize("Block measures", &outcomes);
    Ok(())
}

fn plot(lab: &Lab, settings: &IsingSettings) -> Result<()> {
    let layout = &lab.project.layout;
    let system = &settings.system;
    let n_samplers = system.samplers.len();

    for &t in &settings.temperatures {
        let label = float_label(t);

        for &sampler in &system.samplers {
            match ising::read_equilibrations(layout, t, system.field, sampler, ReadOptions::default())
            {
                Ok(runs) => {
                    let panels = ising::equilibration_panels(&runs, sampler, t);
                    let figure = panels
                        .into_iter()
                        .fold(Figure::new(3), |figure, panel| figure.with_panel(panel));
                    lab.render(&figure, SECTION, &format!("equilibration_{}_{}", sampler, label))?;
                }
                Err(e) => warn!(temperature = t, %sampler, "No equilibration to plot: {}", e),
            }

            match ising::read_autocorrelation(layout, t, system.field, sampler) {
                Ok(table) => {
                    let panel = ising::autocorrelation_panel(
                        &table,
                        sampler,
                        Some(settings.autocorrelation.n_lags),
                    );
                    lab.render(
                        &Figure::single(panel),
                        SECTION,
                        &format!("autocorrelation_{}_{}", sampler, label),
                    )?;
                }
                Err(e) => warn!(temperature = t, %sampler, "No autocorrelation to plot: {}", e),
            }
        }

        let measures: Vec<(Sampler, _)> = system
            .samplers
            .iter()
            .filter_map(|&sampler| {
                ising::read_measures(layout, t, system.field, sampler, ReadOptions::default())
                    .map_err(|e| warn!(temperature = t, %sampler, "No measures to plot: {}", e))
                    .ok()
                    .map(|table| (sampler, table))
            })
            .collect();
        if !measures.is_empty() {
            let figure = ising::measures_panels(&measures, &system.theory(t))
                .into_iter()
                .fold(Figure::new(2), |figure, panel| figure.with_panel(panel));
            lab.render(&figure, SECTION, &format!("measures_{}", label))?;
        }
    }

    let mut results = Vec::with_capacity(n_samplers);
    for &sampler in &system.samplers {
        match ising::read_results(layout, &settings.temperatures, system.field, sampler) {
            Ok(table) => results.push((sampler, table)),
            Err(e) => warn!(%sampler, "Results are incomplete: {}", e),
        }
    }
    if !results.is_empty() {
        let figure = ising::results_panels(&results, system)
            .into_iter()
            .fold(Figure::new(2), |figure, panel| figure.with_panel(panel));
        lab.render(&figure, SECTION, "results")?;
    }
    Ok(())
}
