use std::path::PathBuf;

use super::invocation::Invocation;
use crate::core::layout::ProjectLayout;

/// Which random number generator configuration a simulator starts from.
///
/// Every simulator reads a pair of primes from line `primes_line` of the primes file and,
/// when given, its seeds from the seeds file. Runs meant to be independent use different lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RngSeeding {
    pub primes_path: PathBuf,
    pub seeds_path: Option<PathBuf>,
    pub primes_line: usize,
}

impl RngSeeding {
    pub fn from_layout(layout: &ProjectLayout, primes_line: usize) -> Self {
        Self {
            primes_path: layout.primes_path().to_path_buf(),
            seeds_path: Some(layout.seeds_path().to_path_buf()),
            primes_line,
        }
    }

    /// Seeding for simulators that restart from a saved generator state and only need the primes.
    pub fn primes_only(layout: &ProjectLayout, primes_line: usize) -> Self {
        Self {
            seeds_path: None,
            ..Self::from_layout(layout, primes_line)
        }
    }

    pub fn with_line(&self, primes_line: usize) -> Self {
        Self {
            primes_line,
            ..self.clone()
        }
    }

    pub fn apply(&self, invocation: Invocation) -> Invocation {
        invocation
            .flag("primes_path", &self.primes_path)
            .flag_opt("seeds_path", self.seeds_path.as_ref())
            .flag("primes_line", self.primes_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_flags_follow_the_layout() {
        let layout = ProjectLayout::with_root("/lab");
        let args = Invocation::new("p")
            .seeded(&RngSeeding::from_layout(&layout, 2))
            .args()
            .to_vec();
        assert_eq!(
            args,
            vec![
                "--primes_path=/lab/data/primes/Primes",
                "--seeds_path=/lab/data/seeds/seed.in",
                "--primes_line=2",
            ]
        );
    }

    #[test]
    fn primes_only_seeding_omits_the_seeds_file() {
        let layout = ProjectLayout::with_root("/lab");
        let seeding = RngSeeding::primes_only(&layout, 0).with_line(5);
        let invocation = Invocation::new("p").seeded(&seeding);
        assert_eq!(
            invocation.args(),
            &["--primes_path=/lab/data/primes/Primes", "--primes_line=5"]
        );
    }
}
