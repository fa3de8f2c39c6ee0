use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::seeding::RngSeeding;
use crate::core::layout::float_label;

/// A value that can follow `--name=` on a simulator command line.
pub trait FlagValue {
    fn render(&self) -> Cow<'_, str>;
}

macro_rules! display_flag_value {
    ($($ty:ty),*) => {
        $(impl FlagValue for $ty {
            fn render(&self) -> Cow<'_, str> {
                Cow::Owned(self.to_string())
            }
        })*
    };
}

display_flag_value!(u32, u64, usize, i32, i64);

impl FlagValue for f64 {
    fn render(&self) -> Cow<'_, str> {
        Cow::Owned(float_label(*self))
    }
}

/// Rendered as `a,b`, the form taken by range and pair flags.
impl FlagValue for (f64, f64) {
    fn render(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{},{}", float_label(self.0), float_label(self.1)))
    }
}

impl FlagValue for str {
    fn render(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl FlagValue for String {
    fn render(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl FlagValue for Path {
    fn render(&self) -> Cow<'_, str> {
        self.to_string_lossy()
    }
}

impl FlagValue for PathBuf {
    fn render(&self) -> Cow<'_, str> {
        self.to_string_lossy()
    }
}

impl<T: FlagValue + ?Sized> FlagValue for &T {
    fn render(&self) -> Cow<'_, str> {
        (**self).render()
    }
}

/// One launch of an external simulator.
///
/// Arguments keep the order they were added in. The full argument vector, launcher included,
/// is available through [`Invocation::argv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    launcher: Vec<String>,
    program: PathBuf,
    args: Vec<String>,
    capture_output: bool,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            launcher: Vec::new(),
            program: program.into(),
            args: Vec::new(),
            capture_output: false,
        }
    }

    /// Runs the program through a launcher, e.g. `mpirun -c 4`.
    pub fn launcher<I, S>(mut self, prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.launcher = prefix.into_iter().map(Into::into).collect();
        self
    }

    pub fn flag(mut self, name: &str, value: impl FlagValue) -> Self {
        self.args.push(format!("--{}={}", name, value.render()));
        self
    }

    pub fn flag_opt<T: FlagValue>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.flag(name, value),
            None => self,
        }
    }

    /// A bare `--name`, only emitted when `enabled`.
    pub fn switch(mut self, name: &str, enabled: bool) -> Self {
        if enabled {
            self.args.push(format!("--{}", name));
        }
        self
    }

    pub fn switches<'s>(self, names: impl IntoIterator<Item = &'s str>) -> Self {
        names
            .into_iter()
            .fold(self, |invocation, name| invocation.switch(name, true))
    }

    pub fn seeded(self, seeding: &RngSeeding) -> Self {
        seeding.apply(self)
    }

    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn captures_output(&self) -> bool {
        self.capture_output
    }

    pub fn argv(&self) -> Vec<String> {
        self.launcher
            .iter()
            .cloned()
            .chain(std::iter::once(self.program.to_string_lossy().to_string()))
            .chain(self.args.iter().cloned())
            .collect()
    }

    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }

    pub fn to_command(&self) -> Command {
        let mut argv = self.argv().into_iter();
        // argv always holds at least the program
        let mut command = Command::new(argv.next().unwrap_or_default());
        command.args(argv);
        command
    }
}
