use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use lsn::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SPINNER_TICK_MS: u64 = 80;

struct BarState {
    bar: ProgressBar,
    /// Name and start of the running phase, shown as the bar prefix.
    phase: Option<(String, Instant)>,
}

impl BarState {
    fn start_phase(&mut self, name: String) {
        self.bar.reset();
        self.bar.set_length(0);
        self.bar.set_style(spinner_style());
        self.bar.set_prefix(name.clone());
        self.bar.set_message("");
        self.bar
            .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
        self.phase = Some((name, Instant::now()));
    }

    fn finish_phase(&mut self) {
        self.bar.disable_steady_tick();
        match self.phase.take() {
            Some((name, started)) => {
                let elapsed = started.elapsed();
                debug!(phase = %name, elapsed = ?elapsed, "Phase finished");
                self.bar
                    .finish_with_message(format!("✓ done in {:.1}s", elapsed.as_secs_f64()));
            }
            None => self.bar.finish_with_message("✓ done"),
        }
    }

    fn start_sweep(&mut self, label: String, runs: u64) {
        self.bar.disable_steady_tick();
        self.bar.reset();
        self.bar.set_length(runs);
        self.bar.set_position(0);
        self.bar.set_style(bar_style());
        if self.phase.is_none() {
            self.bar.set_prefix("");
        }
        self.bar.set_message(label);
    }

    fn finish_sweep(&mut self) {
        let length = self.bar.length().unwrap_or(0);
        if self.bar.position() < length {
            self.bar.set_position(length);
        }
        self.bar.finish();
    }

    fn message(&self, text: String) {
        if self.bar.is_finished() {
            self.bar.set_message(text);
        } else {
            self.bar.println(format!("  {}", text));
        }
    }
}

/// Turns engine progress events into one stderr bar: a spinner named after the running phase,
/// replaced by a run counter while a sweep is in flight.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<BarState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
            .with_style(spinner_style());
        bar.finish_and_clear();

        Self {
            state: Arc::new(Mutex::new(BarState { bar, phase: None })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => state.start_phase(name),
                Progress::PhaseFinish => state.finish_phase(),
                Progress::TaskStart { label, total_steps } => {
                    state.start_sweep(label, total_steps)
                }
                Progress::TaskIncrement => state.bar.inc(1),
                Progress::TaskFinish => state.finish_sweep(),
                Progress::Message(text) => state.message(text),
            }
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:.bold} {msg:<16} [{bar:40.cyan/blue}] {pos}/{len} runs ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .with_key(
        "eta",
        |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.0}s left", state.eta().as_secs_f64());
        },
    )
    .progress_chars("=>-")
}
