// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Arithmetic mean of the trailing `period` values at each position:
//
//   SMA_t = (p_{t-period+1} + ... + p_t) / period
//
// The output is aligned with the input. Positions before the first full
// window are `None`, as is any window containing a non-finite value.
//
// Window sums are taken relative to the window's first value, so a constant
// window averages to exactly that value whatever its binary representation.
// =============================================================================

use super::Series;

/// Mean of a non-empty window, summed as offsets from its first value.
pub(crate) fn window_mean(window: &[f64]) -> f64 {
    let Some(&base) = window.first() else {
        return f64::NAN;
    };
    base + window.iter().map(|x| x - base).sum::<f64>() / window.len() as f64
}

/// Compute the SMA series for `prices` over a trailing window of `period`.
///
/// # Edge cases
/// - `period == 0` => every position is `None`
/// - `prices.len() < period` => every position is `None`
/// - A NaN / ±Inf anywhere inside a window makes that window `None`; the
///   series recovers once the bad value falls out of the window.
pub fn calculate_sma(prices: &[f64], period: usize) -> Series {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return out;
    }

    // Each window is summed directly rather than with a running sum so that a
    // single non-finite value cannot poison every later window.
    for end in period..=prices.len() {
        let window = &prices[end - period..end];
        if window.iter().all(|p| p.is_finite()) {
            let mean = window_mean(window);
            if mean.is_finite() {
                out[end - 1] = Some(mean);
            }
        }
    }

    out
}

/// SMA over a series that may already contain undefined positions.
///
/// Used by RSI to average the gain / loss series, which is undefined wherever
/// a difference touches a non-finite close.
pub fn calculate_sma_series(values: &[Option<f64>], period: usize) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    for end in period..=values.len() {
        let window = &values[end - period..end];
        let sum: Option<f64> = window
            .iter()
            .try_fold(0.0_f64, |acc, v| v.filter(|x| x.is_finite()).map(|x| acc + x));
        if let Some(sum) = sum {
            let mean = sum / period as f64;
            if mean.is_finite() {
                out[end - 1] = Some(mean);
            }
        }
    }

    out
}
