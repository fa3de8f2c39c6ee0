pub mod annealing;
pub mod ising;
pub mod md;
pub mod migration;
pub mod stats;
pub mod tsp;

use crate::cli::ProjectArgs;
use crate::config::PartialConfig;
use crate::config::models::ProjectSettings;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use lsn::core::charts::Figure;
use lsn::engine::context::LabContext;
use lsn::engine::error::EngineError;
use lsn::engine::progress::ProgressReporter;
use lsn::engine::runner::{Outcome, ProcessRunner, RecordingRunner, SystemRunner};
use std::path::PathBuf;
use tracing::{info, warn};

/// Reads the configuration file and overrides, and resolves the project layout.
pub fn load(args: &ProjectArgs) -> Result<(PartialConfig, ProjectSettings)> {
    let config = PartialConfig::load(args.config.as_deref(), &args.set_values)?;
    let project = config.resolve_project(args)?;
    info!(
        root = %project.layout.root().display(),
        use_cached = project.cache.use_cached,
        dry_run = project.dry_run,
        "Project resolved"
    );
    Ok((config, project))
}

/// The runner, progress reporting and output locations of one command.
pub struct Lab {
    pub project: ProjectSettings,
    runner: Box<dyn ProcessRunner>,
    reporter: ProgressReporter<'static>,
}

impl Lab {
    pub fn new(project: ProjectSettings) -> Self {
        let runner: Box<dyn ProcessRunner> = if project.dry_run {
            Box::new(RecordingRunner::with_hook(|invocation| {
                println!("{}", invocation.command_line());
            }))
        } else {
            Box::new(SystemRunner)
        };
        let progress_handler = CliProgressHandler::new();
        Self {
            project,
            runner,
            reporter: ProgressReporter::with_callback(progress_handler.get_callback()),
        }
    }

    #[cfg(test)]
    pub fn with_runner(project: ProjectSettings, runner: Box<dyn ProcessRunner>) -> Self {
        Self {
            project,
            runner,
            reporter: ProgressReporter::new(),
        }
    }

    pub fn context(&self) -> LabContext<'_> {
        LabContext::new(
            &self.project.layout,
            self.runner.as_ref(),
            &self.reporter,
            self.project.cache,
        )
    }

    /// Renders `figure` to `<plots dir>/<section>/<name>.svg`.
    pub fn render(&self, figure: &Figure, section: &str, name: &str) -> Result<PathBuf> {
        let path = self
            .project
            .plots_dir
            .join(section)
            .join(format!("{}.svg", name));
        figure.render_svg(&path).map_err(EngineError::from)?;
        info!(path = %path.display(), "Chart written");
        println!("  Chart written to: {}", path.display());
        Ok(path)
    }
}

/// Prints how many runs happened, were served from cache, or failed.
/// Launched, cached and failed runs of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunCounts {
    pub ran: usize,
    pub cached: usize,
    pub failed: usize,
}

impl RunCounts {
    pub fn of(outcomes: &[Outcome]) -> Self {
        let cached = outcomes.iter().filter(|o| o.was_cached()).count();
        let failed = outcomes
            .iter()
            .filter_map(Outcome::report)
            .filter(|report| !report.success)
            .count();
        Self {
            ran: outcomes.len() - cached,
            cached,
            failed,
        }
    }
}

pub fn summarize(label: &str, outcomes: &[Outcome]) -> RunCounts {
    let counts = RunCounts::of(outcomes);
    println!(
        "{}: {} run(s), {} cached, {} failed.",
        label, counts.ran, counts.cached, counts.failed
    );
    for report in outcomes.iter().filter_map(Outcome::report) {
        if !report.success {
            warn!(command = %report.command, "Simulator run failed");
        }
    }
    counts
}


#[cfg(test)]
mod tests {
    use super::*;
    use lsn::core::charts::{Panel, Series};
    use lsn::engine::runner::RunReport;
    use tempfile::tempdir;

    #[test]
    fn render_writes_under_the_section_directory() {
        let dir = tempdir().unwrap();
        let lab = Lab::with_runner(
            test_support::project(dir.path()),
            Box::new(RecordingRunner::new()),
        );
        let figure = Figure::single(
            Panel::new("acf").with_series(Series::line("u", &[0.0, 1.0], &[1.0, 0.5])),
        );

        let path = lab.render(&figure, "07", "acf").unwrap();

        assert_eq!(path, dir.path().join("plots/07/acf.svg"));
        assert!(path.exists());
    }

    #[test]
    fn summary_counts_cached_and_failed_runs() {
        let failed = RunReport {
            command: "bin/09_1 --n_iter=10".to_string(),
            exit_code: Some(1),
            success: false,
            stdout: None,
            stderr: None,
        };
        let ok = RunReport {
            success: true,
            exit_code: Some(0),
            ..failed.clone()
        };
        let counts = summarize(
            "GA",
            &[
                Outcome::Cached(PathBuf::from("a.csv")),
                Outcome::Ran(ok.clone()),
                Outcome::Ran(failed),
            ],
        );

        assert_eq!(
            counts,
            RunCounts {
                ran: 2,
                cached: 1,
                failed: 1
            }
        );
        assert_eq!(
            RunCounts::of(&[Outcome::Ran(ok)]),
            RunCounts {
                ran: 1,
                cached: 0,
                failed: 0
            }
        );
        assert_eq!(
            RunCounts::of(&[]),
            RunCounts {
                ran: 0,
                cached: 0,
                failed: 0
            }
        );
    }

    #[test]
    fn dry_run_lab_records_instead_of_spawning() {
        let dir = tempdir().unwrap();
        let mut project = test_support::project(dir.path());
        project.dry_run = true;
        let lab = Lab::new(project);

        let invocation =
            lsn::engine::invocation::Invocation::new(dir.path().join("bin/missing"));
        let report = lab.context().runner.run(&invocation).unwrap();
        assert!(report.success);
    }
}
