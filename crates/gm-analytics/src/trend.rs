use gm_core::types::TrendDirection;
use serde::{Deserialize, Serialize};

/// Minimum samples before any trend is reported.
const MIN_SAMPLES: usize = 3;

/// Relative slope below which a series is considered stable.
const STABLE_EPSILON: f64 = 0.01;

/// Classification of a metric series over an observation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSummary {
    pub direction: TrendDirection,
    /// Least-squares slope in value units per sample step.
    pub slope: f64,
    /// Confidence in [0, 1], from sample count and residual fit.
    pub confidence: f64,
    pub samples: usize,
}

/// Fit a least-squares line through `values` (taken as y over uniform x).
///
/// Returns `None` with fewer than 3 samples: insufficient data must yield
/// no trend rather than a false signal.
pub fn linear_trend(values: &[f64]) -> Option<TrendSummary> {
    let n = values.len();
    if n < MIN_SAMPLES {
        return None;
    }

    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    // Residual variance against total variance -> goodness of fit.
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (i, y) in values.iter().enumerate() {
        let fitted = intercept + slope * i as f64;
        ss_res += (y - fitted).powi(2);
        ss_tot += (y - y_mean).powi(2);
    }
    let fit = if ss_tot == 0.0 {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    // Confidence saturates with sample count and degrades with poor fit.
    let count_weight = nf / (nf + 10.0);
    let confidence = (count_weight * (0.5 + 0.5 * fit)).clamp(0.0, 1.0);

    let scale = y_mean.abs().max(1e-9);
    let direction = if slope.abs() / scale < STABLE_EPSILON {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    Some(TrendSummary {
        direction,
        slope,
        confidence,
        samples: n,
    })
}
