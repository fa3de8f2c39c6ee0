//! # Core Module
//!
//! Stateless building blocks shared by every exercise.
//!
//! - **Naming conventions** ([`layout`]) - Where executables, inputs, seeds and results live
//! - **Tabular data** ([`table`]) - Numeric CSV tables with the reshaping the exercises need
//! - **Statistics** ([`stats`]) - Block averaging and autocorrelation of correlated samples
//! - **Fitting** ([`fit`]) - Correlation time from an autocorrelation function
//! - **Physics** ([`physics`]) - Closed-form Ising results and the 1-D Schrödinger eigenproblem
//! - **Charts** ([`charts`]) - SVG rendering of panels, routes and histograms

pub mod charts;
pub mod fit;
pub mod layout;
pub mod physics;
pub mod stats;
pub mod table;
