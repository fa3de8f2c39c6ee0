use nalgebra::{DMatrix, SymmetricEigen};
use thiserror::Error;

use super::ising::linspace;

#[derive(Debug, Error, PartialEq)]
pub enum PhysicsError {
    #[error("At least 3 grid points are required, got {0}")]
    TooFewPoints(usize),
    #[error("Invalid interval [{0}, {1}]")]
    InvalidInterval(f64, f64),
}

/// Stationary states of a 1-D Hamiltonian, sorted by ascending energy.
#[derive(Debug, Clone)]
pub struct BoundStates {
    pub energies: Vec<f64>,
    pub x: Vec<f64>,
    /// `psi[i][j]` is the `i`-th eigenfunction at `x[j]`, normalized so that `Σ ψ² dx = 1`.
    pub psi: Vec<Vec<f64>>,
}

impl BoundStates {
    pub fn ground_state(&self) -> Option<(f64, &[f64])> {
        Some((*self.energies.first()?, self.psi.first()?.as_slice()))
    }
}

/// The double well `V(x) = (x² - 2.5) x²`.
pub fn double_well(x: f64) -> f64 {
    (x * x - 2.5) * x * x
}

/// Solves the default double-well problem with ħ = m = 1.
pub fn compute_states(n_points: usize, bounds: (f64, f64)) -> Result<BoundStates, PhysicsError> {
    solve(n_points, bounds, double_well)
}

/// Diagonalizes `-½ d²/dx² + V(x)` discretized with central differences on `n_points`
/// evenly spaced points over `bounds` (ħ = m = 1). The wavefunction vanishes outside the grid.
pub fn solve(
    n_points: usize,
    bounds: (f64, f64),
    potential: impl Fn(f64) -> f64,
) -> Result<BoundStates, PhysicsError> {
    let (a, b) = bounds;
    if n_points < 3 {
        return Err(PhysicsError::TooFewPoints(n_points));
    }
    if !(a.is_finite() && b.is_finite() && a < b) {
        return Err(PhysicsError::InvalidInterval(a, b));
    }

    let x = linspace(a, b, n_points);
    let dx = x[1] - x[0];
    let kinetic = 1.0 / (2.0 * dx * dx);

    let hamiltonian = DMatrix::from_fn(n_points, n_points, |i, j| {
        if i == j {
            2.0 * kinetic + potential(x[i])
        } else if i.abs_diff(j) == 1 {
            -kinetic
        } else {
            0.0
        }
    });

    let eigen = SymmetricEigen::new(hamiltonian);
    let mut order: Vec<usize> = (0..n_points).collect();
    order.sort_by(|&i, &j| eigen.eigenvalues[i].total_cmp(&eigen.eigenvalues[j]));

    let scale = 1.0 / dx.sqrt();
    let energies: Vec<f64> = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let psi: Vec<Vec<f64>> = order
        .iter()
        .map(|&i| eigen.eigenvectors.column(i).iter().map(|v| v * scale).collect())
        .collect();

    Ok(BoundStates { energies, x, psi })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harmonic_oscillator_levels_are_half_integers() {
        let states = solve(300, (-7.0, 7.0), |x| 0.5 * x * x).unwrap();
        for (n, expected) in [0.5, 1.5, 2.5].iter().enumerate() {
            assert!(
                (states.energies[n] - expected).abs() < 1e-2,
                "E{} = {}",
                n,
                states.energies[n]
            );
        }
        assert!(states.energies.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn eigenfunctions_are_normalized_on_the_grid() {
        let states = compute_states(200, (-3.0, 3.0)).unwrap();
        let dx = states.x[1] - states.x[0];
        for psi in states.psi.iter().take(3) {
            let norm: f64 = psi.iter().map(|v| v * v * dx).sum();
            assert!((norm - 1.0).abs() < 1e-9);
        }
        assert_eq!(states.x.len(), 200);
        assert_eq!(states.x[0], -3.0);
    }

    #[test]
    fn double_well_ground_state_is_symmetric_and_below_zero() {
        let states = compute_states(201, (-3.0, 3.0)).unwrap();
        let (energy, psi) = states.ground_state().unwrap();
        assert!(energy < 0.0);
        let n = psi.len();
        for j in 0..n / 2 {
            assert!((psi[j].abs() - psi[n - 1 - j].abs()).abs() < 1e-6);
        }
    }

    #[test]
    fn rejects_degenerate_grids() {
        assert_eq!(
            compute_states(2, (-1.0, 1.0)).unwrap_err(),
            PhysicsError::TooFewPoints(2)
        );
        assert!(matches!(
            compute_states(10, (1.0, 1.0)),
            Err(PhysicsError::InvalidInterval(..))
        ));
    }
}
