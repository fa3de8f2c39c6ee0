use std::path::{Path, PathBuf};

const DEFAULT_ROOT: &str = "..";

/// Renders a float the way directory names and flag values have always been written:
/// the shortest round-trip digits, with a trailing `.0` for integral values, switching to
/// `1e-05` / `1.5e+16` notation when the decimal exponent is below -4 or at least 16.
pub fn float_label(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value != 0.0 {
        let scientific = format!("{:e}", value);
        if let Some((mantissa, exponent)) = scientific.split_once('e') {
            if let Ok(exponent) = exponent.parse::<i32>() {
                if !(-4..16).contains(&exponent) {
                    let sign = if exponent < 0 { '-' } else { '+' };
                    return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
                }
            }
        }
    }
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Where the executables, their inputs and their results live.
///
/// Every location defaults to the conventional tree below `root`
/// (`bin/`, `results/<section>/`, `data/primes/Primes`, `data/seeds/seed.in`,
/// `solutions/ex<section>/`) and can be overridden through [`ProjectLayoutBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectLayout {
    root: PathBuf,
    bin_dir: PathBuf,
    results_root: PathBuf,
    inputs_root: PathBuf,
    primes_path: PathBuf,
    seeds_path: PathBuf,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self::with_root(DEFAULT_ROOT)
    }
}

impl ProjectLayout {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        ProjectLayoutBuilder::new().root(root.into()).build()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn results_root(&self) -> &Path {
        &self.results_root
    }

    /// Directory containing a section's results, e.g. `results/06`.
    pub fn results_dir(&self, section: &str) -> PathBuf {
        self.results_root.join(section)
    }

    /// Path to the executable named `exercise`.
    pub fn executable(&self, exercise: &str) -> PathBuf {
        self.bin_dir.join(exercise)
    }

    /// The common output scheme `results/<section>/<exercise>.csv`, where the section is the
    /// exercise name up to its first underscore.
    pub fn default_output(&self, exercise: &str) -> PathBuf {
        let section = exercise.split('_').next().unwrap_or(exercise);
        self.results_dir(section).join(format!("{}.csv", exercise))
    }

    /// Directory holding the hand-written inputs of a section, e.g. `solutions/ex07`.
    pub fn input_dir(&self, section: &str) -> PathBuf {
        self.inputs_root.join(format!("ex{}", section))
    }

    pub fn primes_path(&self) -> &Path {
        &self.primes_path
    }

    pub fn seeds_path(&self) -> &Path {
        &self.seeds_path
    }
}

#[derive(Default)]
pub struct ProjectLayoutBuilder {
    root: Option<PathBuf>,
    bin_dir: Option<PathBuf>,
    results_root: Option<PathBuf>,
    inputs_root: Option<PathBuf>,
    primes_path: Option<PathBuf>,
    seeds_path: Option<PathBuf>,
}

impl ProjectLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, root: PathBuf) -> Self {
        self.root = Some(root);
        self
    }
    pub fn bin_dir(mut self, dir: PathBuf) -> Self {
        self.bin_dir = Some(dir);
        self
    }
    pub fn results_root(mut self, dir: PathBuf) -> Self {
        self.results_root = Some(dir);
        self
    }
    pub fn inputs_root(mut self, dir: PathBuf) -> Self {
        self.inputs_root = Some(dir);
        self
    }
    pub fn primes_path(mut self, path: PathBuf) -> Self {
        self.primes_path = Some(path);
        self
    }
    pub fn seeds_path(mut self, path: PathBuf) -> Self {
        self.seeds_path = Some(path);
        self
    }

    pub fn build(self) -> ProjectLayout {
        let root = self.root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
        ProjectLayout {
            bin_dir: self.bin_dir.unwrap_or_else(|| root.join("bin")),
            results_root: self.results_root.unwrap_or_else(|| root.join("results")),
            inputs_root: self.inputs_root.unwrap_or_else(|| root.join("solutions")),
            primes_path: self
                .primes_path
                .unwrap_or_else(|| root.join("data").join("primes").join("Primes")),
            seeds_path: self
                .seeds_path
                .unwrap_or_else(|| root.join("data").join("seeds").join("seed.in")),
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_follows_the_conventional_tree() {
        let layout = ProjectLayout::default();
        assert_eq!(layout.root(), Path::new(".."));
        assert_eq!(layout.results_dir("06"), Path::new("../results/06"));
        assert_eq!(layout.executable("06_measure"), Path::new("../bin/06_measure"));
        assert_eq!(layout.primes_path(), Path::new("../data/primes/Primes"));
        assert_eq!(layout.seeds_path(), Path::new("../data/seeds/seed.in"));
        assert_eq!(layout.input_dir("07"), Path::new("../solutions/ex07"));
    }

    #[test]
    fn default_output_uses_the_section_prefix() {
        let layout = ProjectLayout::with_root("/lab");
        assert_eq!(
            layout.default_output("02_1"),
            Path::new("/lab/results/02/02_1.csv")
        );
        assert_eq!(
            layout.default_output("03"),
            Path::new("/lab/results/03/03.csv")
        );
    }

    #[test]
    fn builder_overrides_individual_locations() {
        let layout = ProjectLayoutBuilder::new()
            .root(PathBuf::from("/lab"))
            .bin_dir(PathBuf::from("/opt/lsn/bin"))
            .seeds_path(PathBuf::from("/tmp/seed.in"))
            .build();
        assert_eq!(layout.executable("09_1"), Path::new("/opt/lsn/bin/09_1"));
        assert_eq!(layout.seeds_path(), Path::new("/tmp/seed.in"));
        assert_eq!(layout.primes_path(), Path::new("/lab/data/primes/Primes"));
        assert_eq!(layout.results_dir("10"), Path::new("/lab/results/10"));
    }

    #[test]
    fn float_label_keeps_a_decimal_point_for_integral_values() {
        assert_eq!(float_label(1.0), "1.0");
        assert_eq!(float_label(0.5), "0.5");
        assert_eq!(float_label(2.25), "2.25");
        assert_eq!(float_label(-3.0), "-3.0");
        assert_eq!(float_label(0.1), "0.1");
        assert_eq!(float_label(-0.0), "-0.0");
    }

    #[test]
    fn float_label_switches_to_exponent_notation_at_the_usual_thresholds() {
        assert_eq!(float_label(0.0001), "0.0001");
        assert_eq!(float_label(1e-5), "1e-05");
        assert_eq!(float_label(2.5e-7), "2.5e-07");
        assert_eq!(float_label(-1e-5), "-1e-05");
        assert_eq!(float_label(1e15), "1000000000000000.0");
        assert_eq!(float_label(1e16), "1e+16");
        assert_eq!(float_label(1.5e16), "1.5e+16");
        assert_eq!(float_label(1e100), "1e+100");
        assert_eq!(float_label(f64::INFINITY), "inf");
        assert_eq!(float_label(f64::NAN), "nan");
    }
}
