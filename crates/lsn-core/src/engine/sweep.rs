use rayon::prelude::*;

use super::context::LabContext;
use super::error::EngineError;
use super::progress::Progress;

/// Applies `task` to every value on the rayon pool, reporting one increment per value.
///
/// Results keep the order of `values`. The first error encountered is returned; values already
/// in flight still finish.
pub fn sweep<T, R, F>(
    ctx: &LabContext,
    label: &str,
    values: &[T],
    task: F,
) -> Result<Vec<R>, EngineError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R, EngineError> + Sync,
{
    ctx.reporter.report(Progress::TaskStart {
        label: label.to_string(),
        total_steps: values.len() as u64,
    });
    let results = values
        .par_iter()
        .map(|value| {
            let result = task(value);
            ctx.reporter.report(Progress::TaskIncrement);
            result
        })
        .collect::<Result<Vec<R>, EngineError>>();
    ctx.reporter.report(Progress::TaskFinish);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::ProjectLayout;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::runner::{CachePolicy, RecordingRunner};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn results_keep_input_order_and_progress_counts_every_value() {
        let increments = Arc::new(AtomicUsize::new(0));
        let counter = increments.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event: Progress| {
            if event == Progress::TaskIncrement {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let layout = ProjectLayout::default();
        let runner = RecordingRunner::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::default());

        let temperatures: Vec<f64> = (1..=20).map(|i| i as f64 * 0.1).collect();
        let doubled = sweep(&ctx, "T", &temperatures, |t| Ok(t * 2.0)).unwrap();

        assert_eq!(doubled.len(), 20);
        assert!(doubled.iter().zip(&temperatures).all(|(d, t)| *d == t * 2.0));
        assert_eq!(increments.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn an_error_in_any_task_fails_the_sweep() {
        let reporter = ProgressReporter::new();
        let layout = ProjectLayout::default();
        let runner = RecordingRunner::new();
        let ctx = LabContext::new(&layout, &runner, &reporter, CachePolicy::default());

        let result = sweep(&ctx, "T", &[1, 2, 3], |&v| {
            if v == 2 {
                Err(EngineError::InvalidParameters("bad".into()))
            } else {
                Ok(v)
            }
        });
        assert!(matches!(result, Err(EngineError::InvalidParameters(_))));
    }
}
