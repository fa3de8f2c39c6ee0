//! # Physics Module
//!
//! Closed-form and numerically exact reference results the simulations are checked against.
//!
//! - [`ising`] - Thermodynamics of the periodic 1-D Ising chain, per spin
//! - [`quantum_well`] - Bound states of a 1-D potential from a finite-difference Hamiltonian

pub mod ising;
pub mod quantum_well;
