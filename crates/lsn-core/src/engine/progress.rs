/// Events emitted while a workflow runs. Front-ends turn them into progress bars or log lines.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: String },
    PhaseFinish,

    /// A batch of `total_steps` independent runs begins.
    TaskStart { label: String, total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    pub fn phase<T>(&self, name: &str, body: impl FnOnce() -> T) -> T {
        self.report(Progress::PhaseStart {
            name: name.to_string(),
        });
        let result = body();
        self.report(Progress::PhaseFinish);
        result
    }

    pub fn message(&self, text: impl Into<String>) {
        self.report(Progress::Message(text.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn phase_wraps_the_body_in_start_and_finish_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |e: Progress| {
            sink.lock().unwrap().push(e)
        }));

        let value = reporter.phase("Equilibration", || {
            reporter.message("T=1.0");
            42
        });

        assert_eq!(value, 42);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                Progress::PhaseStart {
                    name: "Equilibration".to_string()
                },
                Progress::Message("T=1.0".to_string()),
                Progress::PhaseFinish,
            ]
        );
    }

    #[test]
    fn reporter_without_callback_is_silent() {
        ProgressReporter::new().report(Progress::TaskIncrement);
    }
}
