//! # LSN Core Library
//!
//! Drivers for the numerical simulation laboratory exercises. The simulations themselves live in
//! precompiled executables; this library knows how to launch them, where their results land, how
//! to read those results back and how to turn them into numbers and charts.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless building blocks: the project layout and its naming
//!   conventions, numeric CSV tables, statistical estimators (block averaging, autocorrelation),
//!   the correlation-time fit, closed-form and numerical physics results, and chart rendering.
//!
//! - **[`engine`]: The Process Layer.** Builds command lines for the external simulators, runs
//!   them through a pluggable [`engine::runner::ProcessRunner`], decides when cached results make
//!   a run unnecessary, and fans parameter sweeps out over a thread pool with progress reporting.
//!
//! - **[`exercises`]: The Public API.** One module per laboratory exercise, combining the two
//!   layers below into the operations a user actually performs: run an equilibration, read the
//!   measures of a temperature sweep, pick the best route of a genetic run, and so on.

pub mod core;
pub mod engine;
pub mod exercises;
