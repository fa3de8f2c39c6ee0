use super::progress::ProgressReporter;
use super::runner::{CachePolicy, ProcessRunner};
use super::seeding::RngSeeding;
use crate::core::layout::ProjectLayout;

/// Everything a workflow needs besides its own parameters.
#[derive(Clone, Copy)]
pub struct LabContext<'a> {
    pub layout: &'a ProjectLayout,
    pub runner: &'a dyn ProcessRunner,
    pub reporter: &'a ProgressReporter<'a>,
    pub cache: CachePolicy,
}

impl<'a> LabContext<'a> {
    pub fn new(
        layout: &'a ProjectLayout,
        runner: &'a dyn ProcessRunner,
        reporter: &'a ProgressReporter<'a>,
        cache: CachePolicy,
    ) -> Self {
        Self {
            layout,
            runner,
            reporter,
            cache,
        }
    }

    pub fn with_cache(self, cache: CachePolicy) -> Self {
        Self { cache, ..self }
    }

    pub fn seeding(&self, primes_line: usize) -> RngSeeding {
        RngSeeding::from_layout(self.layout, primes_line)
    }
}
