//! # Exercises Module
//!
//! One module per laboratory exercise. Each ties the [`crate::engine`] process layer to the
//! [`crate::core`] building blocks: where an exercise's results live, how its simulators are
//! invoked, how their output is read back, and which chart panels summarize it.
//!
//! ## Architecture
//!
//! - **1-D Ising model** ([`ising`]) - Equilibration, autocorrelation and block measures of the
//!   Metropolis and Gibbs samplers over a temperature sweep, compared to the exact solution.
//! - **Lennard-Jones fluid** ([`molecular`]) - Monte Carlo and molecular dynamics runs of the
//!   solid, liquid and gas phases, block uncertainties and correlation times.
//! - **Variational Monte Carlo** ([`annealing`]) - Simulated annealing of a trial wave function
//!   in a double well, the ground state estimate and the matrix-method reference.
//! - **Genetic TSP** ([`tsp`]) - City generation, genetic runs and the best routes found.
//! - **Parallel genetic TSP** ([`migration`]) - MPI "continents" exchanging individuals, and the
//!   best route among many configurations.

pub mod annealing;
pub mod ising;
pub mod migration;
pub mod molecular;
pub mod tsp;
