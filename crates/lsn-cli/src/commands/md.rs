use super::{Lab, summarize};
use crate::cli::{MdAction, MdArgs, ProjectArgs};
use crate::config::models::MdSettings;
use crate::error::Result;
use lsn::core::charts::Figure;
use lsn::core::fit::FitOptions;
use lsn::core::layout::float_label;
use lsn::core::table::Table;
use lsn::engine::runner::Outcome;
use lsn::engine::sweep::sweep;
use lsn::exercises::molecular::{self, Method, SECTION};
use tracing::{info, warn};

pub async fn run(args: MdArgs, project_args: ProjectArgs) -> Result<()> {
    let (config, project) = super::load(&project_args)?;
    info!("Merging configuration from file and CLI arguments...");
    let settings = config.resolve_md(&args)?;
    let lab = Lab::new(project);

    println!(
        "Lennard-Jones phases: {} (methods: {}).",
        settings.phases.join(", "),
        settings
            .methods
            .iter()
            .map(Method::tag)
            .collect::<Vec<_>>()
            .join(", ")
    );
    tokio::task::block_in_place(|| execute(&lab, &settings, args.action))
}

fn execute(lab: &Lab, settings: &MdSettings, action: MdAction) -> Result<()> {
    let ctx = lab.context();
    match action {
        MdAction::Equilibrate => {
            let outcomes: Vec<Outcome> = ctx
                .reporter
                .phase("Equilibration", || {
                    sweep(&ctx, "Phases", &settings.phases, |phase| {
                        molecular::equilibrate_single(&ctx, phase, settings.p_line)
                    })
                })?
                .into_iter()
                .flatten()
                .collect();
            summarize("Equilibration", &outcomes);
        }
        MdAction::Run => {
            let outcomes = ctx.reporter.phase("Measures", || {
                sweep(&ctx, "Phases", &settings.phases, |phase| {
                    molecular::run_single(&ctx, phase, settings.p_line)
                })
            })?;
            summarize("Measures", &outcomes);
        }
        MdAction::Simulate => {
            let outcomes = ctx.reporter.phase("Phases", || {
                molecular::simulate_phases(&ctx, &settings.phases, settings.p_line)
            })?;
            summarize("Measures", &outcomes);
        }
        MdAction::CompareEquilibrate => {
            let outcomes = ctx.reporter.phase("Comparison warmup", || {
                sweep(&ctx, "Phases", &settings.phases, |phase| {
                    molecular::equilibrate_comparison(
                        &ctx,
                        phase,
                        settings.p_line,
                        &settings.methods,
                    )
                })
            })?;
            summarize("Comparison warmup", &outcomes);
        }
        MdAction::Compare => {
            let outcomes = ctx.reporter.phase("Comparison", || {
                sweep(&ctx, "Phases", &settings.phases, |phase| {
                    molecular::run_comparison(
                        &ctx,
                        phase,
                        settings.n_bins,
                        settings.p_line,
                        &settings.methods,
                        settings.start_from,
                    )
                })
            })?;
            summarize("Comparison", &outcomes);
        }
        MdAction::CompareAll => {
            let outcomes = ctx.reporter.phase("Comparison", || {
                molecular::compare_phases(
                    &ctx,
                    &settings.phases,
                    settings.n_bins,
                    settings.p_line,
                    &settings.methods,
                )
            })?;
            summarize("Comparison", &outcomes);
        }
        MdAction::Analyse => {
            for phase in &settings.phases {
                match molecular::read_measures_single(&lab.project.layout, phase) {
                    Ok(table) => analyse(lab, settings, phase, &table)?,
                    Err(e) => warn!(phase, "No measures to analyse: {}", e),
                }
            }
        }
        MdAction::Plot => plot(lab, settings)?,
    }
    Ok(())
}

/// Prints block uncertainties and correlation times, and charts the block size scan and the
/// autocorrelation functions of one phase.
fn analyse(lab: &Lab, settings: &MdSettings, phase: &str, table: &Table) -> Result<()> {
    println!(
        "\n{} ({} rows, block size {}):",
        phase,
        table.n_rows(),
        settings.block_size
    );
    match molecular::block_uncertainties(table, settings.block_size) {
        Ok(errors) => {
            for (name, error) in errors {
                println!("  {:<12} σ = {:.3e}", name, error);
            }
        }
        Err(e) => warn!(phase, "Block uncertainties unavailable: {}", e),
    }

    let scans = molecular::block_size_scans(table, &settings.scan_sizes)?;
    if scans.is_empty() {
        warn!(phase, "No candidate block size fits the series");
    } else {
        let figure = Figure::single(molecular::block_scan_panel(phase, &scans));
        lab.render(&figure, SECTION, &format!("block_scan_{}", phase))?;
    }

    if settings.n_lags == 0 {
        return Ok(());
    }
    let mut acfs = Vec::with_capacity(table.n_cols());
    for (name, values) in table.columns() {
        match molecular::correlation_analysis(values, settings.n_lags, FitOptions::default()) {
            Ok(analysis) => {
                println!(
                    "  {:<12} τ = {} ± {}",
                    name,
                    float_label(analysis.time.tau),
                    float_label(analysis.time.std_error())
                );
                acfs.push((name.to_string(), analysis.acf));
            }
            Err(e) => warn!(phase, column = name, "Correlation time unavailable: {}", e),
        }
    }
    if !acfs.is_empty() {
        let figure = Figure::single(molecular::autocorrelation_panel(phase, &acfs));
        lab.render(&figure, SECTION, &format!("autocorrelation_{}", phase))?;
    }
    Ok(())
}

/// Progressive block estimates of every variable and the radial distribution, per phase.
fn plot(lab: &Lab, settings: &MdSettings) -> Result<()> {
    for phase in &settings.phases {
        let mut thermo = Vec::with_capacity(settings.methods.len());
        let mut radial = Vec::new();
        for &method in &settings.methods {
            match molecular::read_measures_comparison(&lab.project.layout, phase, method) {
                Ok((table, g)) => {
                    thermo.push((method, table));
                    if let Some(g) = g {
                        radial.push((method, g));
                    }
                }
                Err(e) => warn!(phase, %method, "No comparison measures to plot: {}", e),
            }
        }
        let Some((_, first)) = thermo.first() else {
            continue;
        };

        let variables: Vec<&str> = first
            .headers()
            .iter()
            .filter_map(|header| header.strip_suffix("_mean"))
            .collect();
        let figure = variables
            .iter()
            .map(|variable| molecular::comparison_panel(variable, &thermo))
            .fold(Figure::new(2), |figure, panel| figure.with_panel(panel));
        lab.render(&figure, SECTION, &format!("comparison_{}", phase))?;

        if !radial.is_empty() {
            let figure = Figure::single(molecular::radial_panel(phase, &radial));
            lab.render(&figure, SECTION, &format!("g_r_{}", phase))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use lsn::exercises::molecular::Step;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn settings() -> MdSettings {
        MdSettings {
            phases: vec!["solid".to_string(), "gas".to_string()],
            p_line: 0,
            n_bins: 50,
            methods: vec![Method::Mc, Method::Md],
            start_from: Step::Warmup,
            block_size: 10,
            n_lags: 5,
            scan_sizes: vec![1, 2, 5, 10],
        }
    }

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn equilibrate_runs_two_warmups_per_phase() {
        let dir = tempdir().unwrap();
        let (lab, runner) = test_support::recording_lab(dir.path());

        execute(&lab, &settings(), MdAction::Equilibrate).unwrap();

        assert_eq!(runner.count(), 4);
    }

    #[test]
    fn compare_all_warms_up_before_measuring() {
        let dir = tempdir().unwrap();
        let (lab, runner) = test_support::recording_lab(dir.path());

        execute(&lab, &settings(), MdAction::CompareAll).unwrap();

        let argvs = runner.argvs();
        assert_eq!(argvs.len(), 4);
        let warmups = argvs
            .iter()
            .filter(|argv| argv.contains(&"--warmup".to_string()))
            .count();
        assert_eq!(warmups, 2);
    }

    #[test]
    fn analyse_charts_block_scan_and_autocorrelation() {
        let dir = tempdir().unwrap();
        let (lab, _runner) = test_support::recording_lab(dir.path());
        let mut csv = String::from("U,T\n");
        for i in 0..100 {
            let x = (i as f64 * 0.7).sin();
            csv.push_str(&format!("{},{}\n", x, 1.0 + 0.1 * x));
        }
        write(
            &molecular::measures_dir(&lab.project.layout, 2, "solid", Step::Run, None)
                .join(molecular::THERMO_FILE),
            &csv,
        );

        let mut settings = settings();
        settings.phases = vec!["solid".to_string()];
        execute(&lab, &settings, MdAction::Analyse).unwrap();

        let plots = dir.path().join("plots").join(SECTION);
        assert!(plots.join("block_scan_solid.svg").exists());
        assert!(plots.join("autocorrelation_solid.svg").exists());
    }

    #[test]
    fn plot_uses_every_mean_column() {
        let dir = tempdir().unwrap();
        let (lab, _runner) = test_support::recording_lab(dir.path());
        for method in Method::ALL {
            let run = molecular::measures_dir(&lab.project.layout, 4, "gas", Step::Run, Some(method));
            write(
                &run.join(molecular::THERMO_FILE),
                "U_mean,U_error,P_mean,P_error\n1.0,0.1,2.0,0.2\n1.1,0.05,2.1,0.1\n",
            );
        }

        let mut settings = settings();
        settings.phases = vec!["gas".to_string()];
        plot(&lab, &settings).unwrap();

        let plots = dir.path().join("plots").join(SECTION);
        assert!(plots.join("comparison_gas.svg").exists());
        assert!(!plots.join("g_r_gas.svg").exists());
    }
}
