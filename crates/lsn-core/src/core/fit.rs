use thiserror::Error;

const MAX_ITERATIONS: usize = 500;
const TOLERANCE: f64 = 1e-12;
const MIN_TAU: f64 = 1e-12;
// A single step changes tau by at most this factor.
const MAX_STEP_FACTOR: f64 = 4.0;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("At least two points are needed for the fit, got {0}")]
    TooFewPoints(usize),
    #[error("Invalid bounds ({lower}, {upper})")]
    InvalidBounds { lower: f64, upper: f64 },
    #[error("Non-finite value at lag {0}")]
    NonFinite(usize),
}

/// A correlation time and the variance of the estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationTime {
    pub tau: f64,
    pub variance: f64,
}

impl CorrelationTime {
    pub fn std_error(&self) -> f64 {
        self.variance.sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub initial_guess: f64,
    pub bounds: (f64, f64),
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            initial_guess: 1.0,
            bounds: (0.0, f64::INFINITY),
        }
    }
}

fn residuals(acf: &[f64], tau: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
    acf.iter().enumerate().map(move |(k, &y)| {
        let k = k as f64;
        let model = (-k / tau).exp();
        (model - y, model * k / (tau * tau))
    })
}

fn sum_of_squares(acf: &[f64], tau: f64) -> f64 {
    residuals(acf, tau).map(|(r, _)| r * r).sum()
}

/// Least-squares fit of `exp(-k / tau)` to `acf[k]`.
///
/// The variance is the one `curve_fit` reports: the residual variance `SSR / (n - 1)`
/// divided by `JᵀJ`.
pub fn estimate_correlation_time(
    acf: &[f64],
    options: FitOptions,
) -> Result<CorrelationTime, FitError> {
    if acf.len() < 2 {
        return Err(FitError::TooFewPoints(acf.len()));
    }
    if let Some(k) = acf.iter().position(|v| !v.is_finite()) {
        return Err(FitError::NonFinite(k));
    }
    let (lower, upper) = options.bounds;
    if lower.is_nan() || upper.is_nan() || lower >= upper || upper <= 0.0 {
        return Err(FitError::InvalidBounds { lower, upper });
    }
    let lower = lower.max(MIN_TAU);
    let clamp = |tau: f64| tau.clamp(lower, upper);

    let mut tau = clamp(if options.initial_guess.is_finite() {
        options.initial_guess
    } else {
        1.0
    });
    let mut ssr = sum_of_squares(acf, tau);
    let mut lambda = 1e-3;

    for _ in 0..MAX_ITERATIONS {
        let (gradient, curvature) = residuals(acf, tau)
            .fold((0.0, 0.0), |(g, c), (r, j)| (g + r * j, c + j * j));
        if curvature == 0.0 {
            break;
        }
        let step = (gradient / (curvature * (1.0 + lambda)))
            .clamp(tau - MAX_STEP_FACTOR * tau, tau - tau / MAX_STEP_FACTOR);
        let candidate = clamp(tau - step);
        let candidate_ssr = sum_of_squares(acf, candidate);
        if candidate_ssr <= ssr {
            let moved = (candidate - tau).abs();
            tau = candidate;
            ssr = candidate_ssr;
            lambda = (lambda / 10.0).max(1e-12);
            if moved <= TOLERANCE * tau.max(1.0) {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
        }
    }

    let curvature: f64 = residuals(acf, tau).map(|(_, j)| j * j).sum();
    let residual_variance = ssr / (acf.len() - 1) as f64;
    let variance = if curvature > 0.0 {
        residual_variance / curvature
    } else {
        f64::INFINITY
    };
    Ok(CorrelationTime { tau, variance })
}
