use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("Block size must be positive")]
    ZeroBlockSize,
    #[error("At least two blocks are required, got {n_blocks} (sample of {len} with block size {block_size})")]
    TooFewBlocks {
        len: usize,
        block_size: usize,
        n_blocks: usize,
    },
    #[error("Cannot compute the autocorrelation of an empty series")]
    EmptySeries,
    #[error("Series has zero variance")]
    ZeroVariance,
    #[error("Series contains a non-finite value at index {0}")]
    NonFinite(usize),
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Means of the equal-size blocks the sample is partitioned into.
///
/// The first `len % block_size` samples are discarded so the remainder splits evenly;
/// the oldest samples are the ones most affected by equilibration.
pub fn block_averages(sample: &[f64], block_size: usize) -> Result<Vec<f64>, StatsError> {
    if block_size == 0 {
        return Err(StatsError::ZeroBlockSize);
    }
    let trimmed = &sample[sample.len() % block_size..];
    Ok(trimmed.chunks_exact(block_size).map(mean).collect())
}

/// Block-averaging estimate of the statistical uncertainty of the sample mean:
/// the sample standard deviation (ddof = 1) of the block means divided by `sqrt(n_blocks)`.
pub fn block_uncertainty(sample: &[f64], block_size: usize) -> Result<f64, StatsError> {
    let blocks = block_averages(sample, block_size)?;
    let n = blocks.len();
    if n < 2 {
        return Err(StatsError::TooFewBlocks {
            len: sample.len(),
            block_size,
            n_blocks: n,
        });
    }
    let avg = mean(&blocks);
    let var = blocks.iter().map(|b| (b - avg).powi(2)).sum::<f64>() / (n - 1) as f64;
    Ok(var.sqrt() / (n as f64).sqrt())
}

/// Uncertainty for each candidate block size. Sizes leaving fewer than two blocks are skipped.
pub fn block_size_scan(sample: &[f64], sizes: &[usize]) -> Vec<(usize, f64)> {
    sizes
        .iter()
        .filter_map(|&size| block_uncertainty(sample, size).ok().map(|e| (size, e)))
        .collect()
}

/// Progressive block average: after each block, the running mean of the block means and its
/// uncertainty. The uncertainty after the first block is 0.
pub fn progressive_estimates(
    sample: &[f64],
    block_size: usize,
) -> Result<Vec<(f64, f64)>, StatsError> {
    let blocks = block_averages(sample, block_size)?;
    let mut sum = 0.0;
    let mut sum2 = 0.0;
    let mut estimates = Vec::with_capacity(blocks.len());
    for (i, block) in blocks.iter().enumerate() {
        sum += block;
        sum2 += block * block;
        let n = (i + 1) as f64;
        let avg = sum / n;
        let error = if i == 0 {
            0.0
        } else {
            ((sum2 / n - avg * avg).max(0.0) / i as f64).sqrt()
        };
        estimates.push((avg, error));
    }
    Ok(estimates)
}

/// Autocorrelation function for lags `0..=n_lags`, using the biased autocovariance
/// estimator `Σ (x_t - x̄)(x_{t+k} - x̄) / n`. Lags past the end of the series are dropped.
pub fn autocorrelation(series: &[f64], n_lags: usize) -> Result<Vec<f64>, StatsError> {
    if series.is_empty() {
        return Err(StatsError::EmptySeries);
    }
    if let Some(i) = series.iter().position(|v| !v.is_finite()) {
        return Err(StatsError::NonFinite(i));
    }
    let n = series.len();
    let avg = mean(series);
    let centered: Vec<f64> = series.iter().map(|x| x - avg).collect();
    let acov = |k: usize| {
        centered[..n - k]
            .iter()
            .zip(&centered[k..])
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n as f64
    };
    let variance = acov(0);
    if variance == 0.0 {
        return Err(StatsError::ZeroVariance);
    }
    Ok((0..=n_lags.min(n - 1)).map(|k| acov(k) / variance).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn block_averages_trim_the_oldest_samples() {
        let sample = [100.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(block_averages(&sample, 2).unwrap(), vec![1.5, 3.5]);
    }

    #[test]
    fn block_uncertainty_matches_hand_computation() {
        // blocks: [1,3] -> 2, [5,7] -> 6, [9,11] -> 10; std(ddof=1) = 4; 4 / sqrt(3)
        let sample = [1.0, 3.0, 5.0, 7.0, 9.0, 11.0];
        let err = block_uncertainty(&sample, 2).unwrap();
        assert!((err - 4.0 / 3f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn block_uncertainty_of_a_constant_sample_is_zero() {
        assert_eq!(block_uncertainty(&[2.5; 40], 4).unwrap(), 0.0);
    }

    #[test]
    fn block_uncertainty_rejects_bad_partitions() {
        assert_eq!(
            block_uncertainty(&[1.0, 2.0], 0),
            Err(StatsError::ZeroBlockSize)
        );
        assert!(matches!(
            block_uncertainty(&[1.0, 2.0, 3.0], 2),
            Err(StatsError::TooFewBlocks { n_blocks: 1, .. })
        ));
    }

    #[test]
    fn block_size_scan_skips_sizes_without_two_blocks() {
        let sample: Vec<f64> = (0..10).map(f64::from).collect();
        let scan = block_size_scan(&sample, &[1, 2, 5, 6, 10]);
        let sizes: Vec<usize> = scan.iter().map(|(s, _)| *s).collect();
        assert_eq!(sizes, vec![1, 2, 5]);
    }

    #[test]
    fn progressive_estimates_converge_to_the_full_mean() {
        let sample = [1.0, 3.0, 5.0, 7.0, 9.0, 11.0];
        let estimates = progressive_estimates(&sample, 2).unwrap();
        assert_eq!(estimates.len(), 3);
        assert_eq!(estimates[0], (2.0, 0.0));
        let (avg, err) = estimates[2];
        assert!((avg - 6.0).abs() < EPS);
        assert!((err - block_uncertainty(&sample, 2).unwrap()).abs() < 1e-9);
    }

    #[test]
    fn autocorrelation_starts_at_one_and_uses_the_biased_estimator() {
        let series = [1.0, -1.0, 1.0, -1.0];
        let acf = autocorrelation(&series, 2).unwrap();
        assert!((acf[0] - 1.0).abs() < EPS);
        assert!((acf[1] + 0.75).abs() < EPS);
        assert!((acf[2] - 0.5).abs() < EPS);
    }

    #[test]
    fn autocorrelation_truncates_lags_and_rejects_degenerate_series() {
        assert_eq!(autocorrelation(&[1.0, 2.0, 3.0], 10).unwrap().len(), 3);
        assert_eq!(autocorrelation(&[], 3), Err(StatsError::EmptySeries));
        assert_eq!(autocorrelation(&[4.0; 5], 3), Err(StatsError::ZeroVariance));
        assert_eq!(
            autocorrelation(&[1.0, f64::NAN], 1),
            Err(StatsError::NonFinite(1))
        );
    }
}
