use super::{Lab, summarize};
use crate::cli::{AnnealingAction, AnnealingArgs, ProjectArgs};
use crate::config::models::AnnealingSettings;
use crate::error::Result;
use lsn::core::charts::Figure;
use lsn::core::layout::float_label;
use lsn::exercises::annealing::{self, EstimationParams, SECTION};
use tracing::{info, warn};

/// Annealing steps drawn in the energy chart.
const ENERGY_POINTS: usize = 50;

pub async fn run(args: AnnealingArgs, project_args: ProjectArgs) -> Result<()> {
    let (config, project) = super::load(&project_args)?;
    info!("Merging configuration from file and CLI arguments...");
    let settings = config.resolve_annealing(&args)?;
    let lab = Lab::new(project);

    let (t0, tf) = settings.annealing.temperatures;
    println!(
        "Variational ground state, run {}: T from {} to {} in {} step(s).",
        settings.run,
        float_label(t0),
        float_label(tf),
        settings.annealing.n_temperature_steps
    );
    tokio::task::block_in_place(|| execute(&lab, &settings, args.action))
}

fn execute(lab: &Lab, settings: &AnnealingSettings, action: AnnealingAction) -> Result<()> {
    let ctx = lab.context();
    match action {
        AnnealingAction::Anneal => {
            let outcome = ctx.reporter.phase("Simulated annealing", || {
                annealing::run_simulated_annealing(
                    &ctx,
                    settings.run,
                    &settings.annealing,
                    settings.p_line,
                )
            })?;
            summarize("Annealing", std::slice::from_ref(&outcome));
        }
        AnnealingAction::Estimate => {
            let params = estimation_params(lab, settings)?;
            println!(
                "Estimating with µ={}, σ={}.",
                float_label(params.mu),
                float_label(params.sigma)
            );
            let outcome = ctx.reporter.phase("Ground state estimation", || {
                annealing::run_estimation(&ctx, settings.run, &params, settings.p_line)
            })?;
            summarize("Estimation", std::slice::from_ref(&outcome));
        }
        AnnealingAction::All => {
            // The annealed pair always wins here, whatever the draft holds.
            let params = settings.estimation.complete((0.0, 0.0));
            let (mu, sigma) = annealing::anneal_and_estimate(
                &ctx,
                settings.run,
                &settings.annealing,
                &params,
                settings.p_line,
            )?;
            println!(
                "Optimal parameters: µ={}, σ={}.",
                float_label(mu),
                float_label(sigma)
            );
        }
        AnnealingAction::Plot => plot(lab, settings)?,
    }
    Ok(())
}

/// Estimation parameters, with (µ, σ) taken from the annealing when not given.
fn estimation_params(lab: &Lab, settings: &AnnealingSettings) -> Result<EstimationParams> {
    if settings.estimation.is_complete() {
        return Ok(settings.estimation.complete((0.0, 0.0)));
    }
    let table = annealing::read_annealing(&lab.project.layout, settings.run)?;
    let best = annealing::best_parameters(&table)?;
    info!(mu = best.0, sigma = best.1, "Parameters taken from the annealing");
    Ok(settings.estimation.complete(best))
}

fn plot(lab: &Lab, settings: &AnnealingSettings) -> Result<()> {
    let layout = &lab.project.layout;

    match annealing::read_annealing(layout, settings.run) {
        Ok(table) => {
            let stride = (table.n_rows() / ENERGY_POINTS).max(1);
            let figure = Figure::new(2)
                .with_panel(annealing::energy_panel(&table, stride)?)
                .with_panel(annealing::trajectory_panel(
                    &table,
                    settings.temperature_classes,
                )?);
            lab.render(&figure, SECTION, &format!("annealing_{}", settings.run))?;
        }
        Err(e) => warn!(run = settings.run, "No annealing to plot: {}", e),
    }

    match annealing::read_min_energy(layout, settings.run) {
        Ok(table) => {
            if let Some(row) = table.last_row() {
                let values: Vec<String> = table
                    .headers()
                    .iter()
                    .zip(row)
                    .map(|(name, value)| format!("{}={}", name, float_label(value)))
                    .collect();
                println!("Minimum energy estimate: {}", values.join(", "));
            }
        }
        Err(e) => warn!(run = settings.run, "No energy estimate: {}", e),
    }

    match annealing::read_psi(layout, settings.run) {
        Ok(psi) => {
            let bound = settings.estimation.sampling_bound.abs();
            let states = annealing::compute_states(settings.matrix_points, (-bound, bound))?;
            let figure = Figure::single(annealing::psi_panel(&psi, &states)?);
            lab.render(&figure, SECTION, &format!("psi_{}", settings.run))?;
        }
        Err(e) => warn!(run = settings.run, "No |ψ|² histogram to plot: {}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use crate::config::models::EstimationDraft;
    use lsn::exercises::annealing::AnnealingParams;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn settings() -> AnnealingSettings {
        AnnealingSettings {
            run: 3,
            p_line: 0,
            annealing: AnnealingParams {
                n_temperature_steps: 10,
                n_explore: 10,
                temperatures: (1.0, 0.01),
                n_blocks: 5,
                block_size: 100,
                initial_guess: (1.0, 0.5),
                stddev: 0.1,
            },
            estimation: EstimationDraft {
                n_blocks: 10,
                block_size: 100,
                sampling_bound: 3.0,
                n_bins: 11,
                mu: None,
                sigma: None,
            },
            matrix_points: 200,
            temperature_classes: 3,
        }
    }

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn write_annealing(lab: &Lab, run: u32) {
        write(
            &annealing::annealing_path(&lab.project.layout, run),
            "T,mu,sigma,H_estimate,H_error\n\
             1.0,1.0,0.5,-0.3,0.05\n\
             0.1,0.9,0.6,-0.4,0.02\n\
             0.01,0.8,0.62,-0.45,0.01\n",
        );
    }

    #[test]
    fn estimate_takes_missing_parameters_from_the_annealing() {
        let dir = tempdir().unwrap();
        let (lab, runner) = test_support::recording_lab(dir.path());
        write_annealing(&lab, 3);

        execute(&lab, &settings(), AnnealingAction::Estimate).unwrap();

        let argv = &runner.argvs()[0];
        assert!(argv.contains(&"--mu=0.8".to_string()));
        assert!(argv.contains(&"--sigma=0.62".to_string()));
    }

    #[test]
    fn explicit_parameters_skip_the_annealing_results() {
        let dir = tempdir().unwrap();
        let (lab, runner) = test_support::recording_lab(dir.path());
        let mut settings = settings();
        settings.estimation.mu = Some(1.5);
        settings.estimation.sigma = Some(0.7);

        execute(&lab, &settings, AnnealingAction::Estimate).unwrap();

        let argv = &runner.argvs()[0];
        assert!(argv.contains(&"--mu=1.5".to_string()));
    }

    #[test]
    fn estimate_without_annealing_fails() {
        let dir = tempdir().unwrap();
        let (lab, runner) = test_support::recording_lab(dir.path());

        assert!(execute(&lab, &settings(), AnnealingAction::Estimate).is_err());
        assert_eq!(runner.count(), 0);
    }

    #[test]
    fn plot_draws_annealing_and_psi() {
        let dir = tempdir().unwrap();
        let (lab, _runner) = test_support::recording_lab(dir.path());
        write_annealing(&lab, 3);
        write(
            &annealing::psi_path(&lab.project.layout, 3),
            "l_edge,psi\n-1.5,10\n-0.5,30\n0.5,30\n1.5,10\n",
        );

        plot(&lab, &settings()).unwrap();

        let plots = dir.path().join("plots").join(SECTION);
        assert!(plots.join("annealing_3.svg").exists());
        assert!(plots.join("psi_3.svg").exists());
    }
}
