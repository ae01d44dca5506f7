//! Periodicity search over a smoothed envelope.

/// Slowest tempo searched.
pub const MIN_BPM: f64 = 60.0;
/// Fastest tempo searched.
pub const MAX_BPM: f64 = 200.0;
/// Smallest lag span searched, in envelope samples.
pub const MIN_LAG_SPAN: usize = 4;
/// Correlations at or below this are treated as zero.
pub const NEGLIGIBLE: f64 = 1e-6;

/// Outcome of [`search_lags`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagSearch {
    pub best_lag: usize,
    pub best_correlation: f64,
    pub mean_correlation: f64,
    /// False when the envelope had no variance to correlate.
    pub has_variance: bool,
}

/// Inclusive lag range covering [`MAX_BPM`] down to [`MIN_BPM`] at
/// `envelope_rate`, widened to at least [`MIN_LAG_SPAN`] samples.
pub fn lag_bounds(envelope_rate: f64) -> (usize, usize) {
    let lower = ((envelope_rate * 60.0 / MAX_BPM).round() as usize).max(1);
    let upper = (envelope_rate * 60.0 / MIN_BPM).round() as usize;
    (lower, upper.max(lower + MIN_LAG_SPAN))
}

/// Normalized autocorrelation of `envelope` for every lag in
/// `[min_lag, max_lag]`.
///
/// The envelope is mean-removed first; each lag's sum over the valid
/// overlap is divided by the total energy. Lags that leave no overlap
/// are skipped. The first lag with the highest correlation wins.
pub fn search_lags(envelope: &[f32], min_lag: usize, max_lag: usize) -> LagSearch {
    let silent = LagSearch {
        best_lag: min_lag,
        best_correlation: 0.0,
        mean_correlation: 0.0,
        has_variance: false,
    };
    if envelope.is_empty() {
        return silent;
    }

    let mean = envelope.iter().map(|&v| v as f64).sum::<f64>() / envelope.len() as f64;
    let centered: Vec<f64> = envelope.iter().map(|&v| v as f64 - mean).collect();
    let energy: f64 = centered.iter().map(|z| z * z).sum();
    if energy <= NEGLIGIBLE * NEGLIGIBLE {
        return silent;
    }

    let max_lag = max_lag.min(centered.len() - 1);
    let mut best_lag = min_lag;
    let mut best_correlation = f64::NEG_INFINITY;
    let mut total = 0.0;
    let mut searched = 0usize;

    for lag in min_lag..=max_lag {
        let correlation = centered[..centered.len() - lag]
            .iter()
            .zip(&centered[lag..])
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / energy;
        total += correlation;
        searched += 1;
        if correlation > best_correlation {
            best_correlation = correlation;
            best_lag = lag;
        }
    }

    if searched == 0 {
        return LagSearch {
            has_variance: true,
            ..silent
        };
    }
    LagSearch {
        best_lag,
        best_correlation,
        mean_correlation: total / searched as f64,
        has_variance: true,
    }
}

/// Peakedness of the best lag relative to the average lag, in `[0.2, 1]`.
pub fn confidence(search: &LagSearch) -> f64 {
    if search.best_correlation <= NEGLIGIBLE {
        0.2
    } else if search.mean_correlation > NEGLIGIBLE {
        (search.best_correlation / search.mean_correlation).clamp(0.3, 1.0)
    } else {
        search.best_correlation.clamp(0.3, 1.0)
    }
}
