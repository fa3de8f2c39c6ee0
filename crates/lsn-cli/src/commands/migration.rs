use super::{Lab, summarize};
use crate::cli::{MigrationAction, MigrationArgs, ProjectArgs};
use crate::config::models::MigrationSettings;
use crate::error::Result;
use lsn::core::charts::Figure;
use lsn::exercises::migration::{self, RankedResult, SECTION};
use tracing::{info, warn};

pub async fn run(args: MigrationArgs, project_args: ProjectArgs) -> Result<()> {
    let (config, project) = super::load(&project_args)?;
    info!("Merging configuration from file and CLI arguments...");
    let settings = config.resolve_migration(&args, &project)?;
    let lab = Lab::new(project);

    println!(
        "Parallel genetic algorithm: {} configuration(s), {} migration(s) of {} iterations.",
        settings.configs.len(),
        settings.params.n_migrations,
        settings.params.migration_length
    );
    tokio::task::block_in_place(|| execute(&lab, &settings, args.action))
}

fn execute(lab: &Lab, settings: &MigrationSettings, action: MigrationAction) -> Result<()> {
    match action {
        MigrationAction::Run => {
            if !settings.input.exists() {
                info!(path = %settings.input.display(), "Deriving city coordinates from the capitals");
                super::tsp::america_coordinates(lab, &settings.input)?;
            }
            let ctx = lab.context();
            let outcomes = migration::run_configs(
                &ctx,
                &settings.input,
                &settings.params,
                &settings.configs,
                settings.p_line,
            )?;
            summarize("Migration runs", &outcomes);
        }
        MigrationAction::Rank => {
            let ctx = lab.context();
            let ranked = migration::rank_configs(&ctx, &settings.configs)?;
            println!("\nBest configurations:");
            for (position, result) in ranked.iter().take(settings.top).enumerate() {
                println!("  {}. {}", position + 1, describe(result));
            }
        }
        MigrationAction::Plot => plot(lab, settings)?,
    }
    Ok(())
}

fn describe(result: &RankedResult) -> String {
    let config = &result.config;
    let mut text = format!(
        "{:<8} {} continent(s)",
        config.algo.tag(),
        config.n_continents
    );
    if let Some(p) = config.fusion_level() {
        text.push_str(&format!(", p={:.3}", p));
    }
    text.push_str(&format!(": {:.4}", result.best.distance));
    text
}

/// Routes of the `top` best configurations over the capitals.
fn plot(lab: &Lab, settings: &MigrationSettings) -> Result<()> {
    let layout = &lab.project.layout;
    let capitals = migration::read_capitals(&migration::capitals_path(layout))?;
    let ranked = migration::collect_best_results(layout, &settings.configs)?;
    if ranked.is_empty() {
        warn!("No configuration to plot");
        return Ok(());
    }

    for (position, result) in ranked.iter().take(settings.top).enumerate() {
        let figure = Figure::single(migration::capitals_route_panel(result, &capitals)?)
            .panel_size((1000, 700));
        lab.render(&figure, SECTION, &format!("best_{}", position + 1))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use lsn::exercises::migration::{GpParams, MigrationConfig};
    use lsn::exercises::tsp::{self, Algo, Tsp};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn settings(lab: &Lab) -> MigrationSettings {
        MigrationSettings {
            input: tsp::cities_path(&lab.project.layout, Tsp::America),
            params: GpParams {
                migration_length: 10,
                n_migrations: 2,
                pop_size: 40,
                mut_rate: 0.1,
            },
            configs: vec![
                MigrationConfig::new(Algo::ExerciseMod, 2, None),
                MigrationConfig::new(Algo::Fusion, 4, Some(0.4)),
            ],
            p_line: 0,
            top: 1,
        }
    }

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn write_capitals(lab: &Lab) {
        write(
            &migration::capitals_path(&lab.project.layout),
            "city,longitude,latitude\nA,0.0,0.0\nB,1.0,0.0\nC,1.0,1.0\n",
        );
    }

    fn write_population(lab: &Lab, config: &MigrationConfig, distance: f64) {
        write(
            &migration::results_path(&lab.project.layout, config).unwrap(),
            &format!("c0,c1,c2,total_distance\n0,1,2,{}\n0,2,1,9.0\n", distance),
        );
    }

    #[test]
    fn run_derives_the_coordinates_then_launches_mpi() {
        let dir = tempdir().unwrap();
        let (lab, runner) = test_support::recording_lab(dir.path());
        write_capitals(&lab);
        let settings = settings(&lab);

        execute(&lab, &settings, MigrationAction::Run).unwrap();

        assert!(settings.input.exists());
        let argvs = runner.argvs();
        assert_eq!(argvs.len(), 2);
        assert_eq!(argvs[1][..3], ["mpirun", "-c", "4"]);
    }

    #[test]
    fn plot_draws_only_the_top_configurations() {
        let dir = tempdir().unwrap();
        let (lab, _runner) = test_support::recording_lab(dir.path());
        write_capitals(&lab);
        let settings = settings(&lab);
        write_population(&lab, &settings.configs[0], 3.41);
        write_population(&lab, &settings.configs[1], 3.5);

        plot(&lab, &settings).unwrap();

        let plots = dir.path().join("plots").join(SECTION);
        assert!(plots.join("best_1.svg").exists());
        assert!(!plots.join("best_2.svg").exists());
    }

    #[test]
    fn rank_fails_on_missing_results() {
        let dir = tempdir().unwrap();
        let (lab, _runner) = test_support::recording_lab(dir.path());
        let settings = settings(&lab);
        write_population(&lab, &settings.configs[0], 3.41);

        assert!(execute(&lab, &settings, MigrationAction::Rank).is_err());
    }

    #[test]
    fn description_names_the_fusion_level() {
        let result = RankedResult {
            config: MigrationConfig::new(Algo::Fusion, 4, Some(0.4)),
            best: tsp::BestRoute {
                distance: 3.5,
                cities: vec![0, 1, 2],
            },
        };
        assert_eq!(describe(&result), "fusion   4 continent(s), p=0.400: 3.5000");
    }
}
