use super::{Lab, summarize};
use crate::cli::{ProjectArgs, TspAction, TspArgs};
use crate::config::models::TspSettings;
use crate::error::{CliError, Result};
use lsn::core::charts::Figure;
use lsn::exercises::migration;
use lsn::exercises::tsp::{self, SECTION, Tsp};
use std::path::Path;
use tracing::{info, warn};

pub async fn run(args: TspArgs, project_args: ProjectArgs) -> Result<()> {
    let (config, project) = super::load(&project_args)?;
    info!("Merging configuration from file and CLI arguments...");
    let settings = config.resolve_tsp(&args, &project)?;
    let lab = Lab::new(project);

    println!(
        "TSP '{}' from {}, {} crossover(s) x {} primes line(s).",
        settings.tsp,
        settings.input.display(),
        settings.algos.len(),
        settings.p_lines.len()
    );
    tokio::task::block_in_place(|| execute(&lab, &settings, args.action))
}

fn execute(lab: &Lab, settings: &TspSettings, action: TspAction) -> Result<()> {
    match action {
        TspAction::Generate => generate(lab, settings),
        TspAction::Run => {
            if !settings.input.exists() {
                warn!(
                    path = %settings.input.display(),
                    "City coordinates not found, run 'tsp generate' first"
                );
            }
            let ctx = lab.context();
            let outcomes = ctx.reporter.phase("Genetic algorithm", || {
                tsp::run_all(
                    &ctx,
                    &settings.input,
                    &settings.params,
                    settings.tsp,
                    &settings.algos,
                    &settings.p_lines,
                )
            })?;
            summarize("Genetic runs", &outcomes);
            Ok(())
        }
        TspAction::Plot => plot(lab, settings),
    }
}

fn generate(lab: &Lab, settings: &TspSettings) -> Result<()> {
    let path = settings.input.as_path();
    match settings.tsp {
        Tsp::Circle => tsp::generate_circle_coordinates(path, settings.radius)?,
        Tsp::Square => tsp::generate_square_coordinates(path, settings.seed, settings.side)?,
        Tsp::America => america_coordinates(lab, path)?,
    }
    println!("Cities written to: {}", path.display());
    Ok(())
}

/// Longitude and latitude of the capitals, in file order.
pub(crate) fn america_coordinates(lab: &Lab, path: &Path) -> Result<()> {
    let source = migration::capitals_path(&lab.project.layout);
    if !source.exists() {
        return Err(CliError::MissingInput {
            what: "Capitals file",
            path: source,
            hint: "it lists one 'city,longitude,latitude' row per capital",
        });
    }
    let capitals = migration::read_capitals(&source)?;
    tsp::write_coordinates(path, &migration::capital_coordinates(&capitals))?;
    info!(n = capitals.len(), "Capitals converted to city coordinates");
    Ok(())
}

fn plot(lab: &Lab, settings: &TspSettings) -> Result<()> {
    let layout = &lab.project.layout;
    if !settings.input.exists() {
        return Err(CliError::MissingInput {
            what: "City coordinates",
            path: settings.input.clone(),
            hint: "run 'tsp generate' first",
        });
    }
    let cities = tsp::read_coordinates(&settings.input)?;

    for &p_line in &settings.p_lines {
        let mut routes = Figure::new(2);
        let mut n_routes = 0;
        let mut distances = Vec::with_capacity(settings.algos.len());

        for &algo in &settings.algos {
            match tsp::best_route(layout, settings.tsp, algo, p_line) {
                Ok(route) => {
                    println!(
                        "  {:<8} line {}: best distance {:.4}",
                        algo, p_line, route.distance
                    );
                    let title = format!("{}, {}", settings.tsp, algo);
                    routes = routes.with_panel(tsp::best_route_panel(&title, &route, &cities)?);
                    n_routes += 1;
                }
                Err(e) => warn!(%algo, p_line, "No population to plot: {}", e),
            }
            match tsp::read_distances(layout, settings.tsp, algo, p_line) {
                Ok(table) => distances.push((algo, table)),
                Err(e) => warn!(%algo, p_line, "No distance history: {}", e),
            }
        }

        let suffix = format!("{}_{}", settings.tsp, p_line);
        if n_routes > 0 {
            lab.render(&routes, SECTION, &format!("routes_{}", suffix))?;
        }
        if !distances.is_empty() {
            let figure = Figure::single(tsp::distances_panel(&distances));
            lab.render(&figure, SECTION, &format!("distances_{}", suffix))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use lsn::exercises::tsp::{Algo, GaParams, N_CITIES};
    use std::fs;
    use tempfile::tempdir;

    fn settings(lab: &Lab, problem: Tsp) -> TspSettings {
        TspSettings {
            tsp: problem,
            algos: vec![Algo::Exercise, Algo::MyAlgo2],
            p_lines: vec![0, 1],
            input: tsp::cities_path(&lab.project.layout, problem),
            params: GaParams {
                n_iter: 10,
                pop_size: 20,
                mut_rate: 0.1,
                fusion_p: 0.4,
            },
            radius: 1.0,
            side: 2.0,
            seed: 7,
        }
    }

    #[test]
    fn generate_writes_every_city() {
        let dir = tempdir().unwrap();
        let (lab, _runner) = test_support::recording_lab(dir.path());
        let settings = settings(&lab, Tsp::Square);

        execute(&lab, &settings, TspAction::Generate).unwrap();

        assert_eq!(tsp::read_coordinates(&settings.input).unwrap().len(), N_CITIES);
    }

    #[test]
    fn america_coordinates_come_from_the_capitals() {
        let dir = tempdir().unwrap();
        let (lab, _runner) = test_support::recording_lab(dir.path());
        let capitals = migration::capitals_path(&lab.project.layout);
        fs::create_dir_all(capitals.parent().unwrap()).unwrap();
        fs::write(
            &capitals,
            "city,longitude,latitude\nMontgomery,-86.3,32.4\nJuneau,-134.4,58.3\n",
        )
        .unwrap();
        let settings = settings(&lab, Tsp::America);

        execute(&lab, &settings, TspAction::Generate).unwrap();

        assert_eq!(
            tsp::read_coordinates(&settings.input).unwrap(),
            vec![(-86.3, 32.4), (-134.4, 58.3)]
        );
    }

    #[test]
    fn america_without_capitals_names_the_missing_file() {
        let dir = tempdir().unwrap();
        let (lab, _runner) = test_support::recording_lab(dir.path());
        let settings = settings(&lab, Tsp::America);

        let result = execute(&lab, &settings, TspAction::Generate);

        assert!(matches!(
            result,
            Err(CliError::MissingInput { path, .. }) if path.ends_with("capitals.csv")
        ));
    }

    #[test]
    fn run_launches_every_crossover_on_every_line() {
        let dir = tempdir().unwrap();
        let (lab, runner) = test_support::recording_lab(dir.path());

        execute(&lab, &settings(&lab, Tsp::Circle), TspAction::Run).unwrap();

        assert_eq!(runner.count(), 4);
    }

    #[test]
    fn plot_draws_best_routes() {
        let dir = tempdir().unwrap();
        let (lab, _runner) = test_support::recording_lab(dir.path());
        let mut settings = settings(&lab, Tsp::Circle);
        settings.p_lines = vec![0];
        settings.algos = vec![Algo::Exercise];
        execute(&lab, &settings, TspAction::Generate).unwrap();

        let mut population = (0..N_CITIES)
            .map(|i| format!("c{}", i))
            .collect::<Vec<_>>()
            .join(",");
        population.push_str(",total_distance\n");
        let route: Vec<String> = (0..N_CITIES).map(|i| i.to_string()).collect();
        population.push_str(&format!("{},6.27\n", route.join(",")));
        let path = tsp::results_path(&lab.project.layout, Tsp::Circle, Algo::Exercise, 0);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, population).unwrap();

        plot(&lab, &settings).unwrap();

        let plots = dir.path().join("plots").join(SECTION);
        assert!(plots.join("routes_circle_0.svg").exists());
        assert!(!plots.join("distances_circle_0.svg").exists());
    }
}
