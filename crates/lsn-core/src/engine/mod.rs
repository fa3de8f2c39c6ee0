//! # Engine Module
//!
//! Everything that happens between "I want this simulation run" and "the results are on disk".
//!
//! ## Overview
//!
//! The external simulators are plain executables configured through `--name=value` flags. The
//! engine builds those command lines, launches them through a replaceable runner, skips runs whose
//! results are already cached, and spreads independent runs (one per temperature, one per
//! configuration) over the rayon thread pool while reporting progress.
//!
//! ## Architecture
//!
//! - **Command lines** ([`invocation`]) - Program, launcher prefix, flags and switches
//! - **Random number seeding** ([`seeding`]) - The primes/seeds flags shared by every simulator
//! - **Execution** ([`runner`]) - The [`runner::ProcessRunner`] seam, run reports and caching
//! - **Parallel sweeps** ([`sweep`]) - Order-preserving parallel map with progress events
//! - **Progress Monitoring** ([`progress`]) - Progress events and the reporter callback
//! - **Shared state** ([`context`]) - Layout, runner, reporter and cache policy of a session
//! - **Error Handling** ([`error`]) - Engine-level error type

pub mod context;
pub mod error;
pub mod invocation;
pub mod progress;
pub mod runner;
pub mod seeding;
pub mod sweep;
