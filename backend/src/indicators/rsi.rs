// =============================================================================
// Relative Strength Index (RSI) — simple-average variant
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes. The first
//          close has no predecessor and contributes a zero change.
// Step 2 — Split into gains (positive deltas) and losses (|negative deltas|).
// Step 3 — Average each over the trailing `period` deltas with the SMA kernel
//          (not Wilder's smoothing).
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// With the leading zero change the delta series is aligned with the closes,
// so the first defined RSI sits at index `period - 1` like the other
// trailing-window kernels.
// =============================================================================

use super::sma::calculate_sma_series;
use super::Series;

/// RSI reported when the window has gains but no losses.
pub const RSI_ZERO_LOSS: f64 = 100.0;
/// RSI reported when the window has neither gains nor losses.
pub const RSI_FLAT: f64 = 50.0;

/// Trailing average gain and average loss, aligned with `closes`.
pub struct GainLossAverages {
    pub avg_gain: Series,
    pub avg_loss: Series,
}

/// Compute the aligned average-gain / average-loss series.
///
/// Index 0 holds a zero change when the first close is finite. A delta
/// touching a non-finite close is undefined, which in turn leaves every window
/// containing it undefined.
pub fn average_gains_losses(closes: &[f64], period: usize) -> GainLossAverages {
    let mut gains: Vec<Option<f64>> = vec![None; closes.len()];
    let mut losses: Vec<Option<f64>> = vec![None; closes.len()];

    if closes.first().is_some_and(|c| c.is_finite()) {
        gains[0] = Some(0.0);
        losses[0] = Some(0.0);
    }

    for (i, w) in closes.windows(2).enumerate() {
        let delta = w[1] - w[0];
        if delta.is_finite() {
            gains[i + 1] = Some(delta.max(0.0));
            losses[i + 1] = Some((-delta).max(0.0));
        }
    }

    GainLossAverages {
        avg_gain: calculate_sma_series(&gains, period),
        avg_loss: calculate_sma_series(&losses, period),
    }
}

/// Compute the full RSI series for the given `closes` and `period`.
///
/// # Edge cases
/// - `period == 0` => every position is `None`
/// - `closes.len() < period` => every position is `None`
/// - average loss zero with gains => [`RSI_ZERO_LOSS`]
/// - average gain and loss both zero => [`RSI_FLAT`]
pub fn calculate_rsi(closes: &[f64], period: usize) -> Series {
    let averages = average_gains_losses(closes, period);
    averages
        .avg_gain
        .iter()
        .zip(averages.avg_loss.iter())
        .map(|(gain, loss)| match (gain, loss) {
            (Some(g), Some(l)) => rsi_from_averages(*g, *l),
            _ => None,
        })
        .collect()
}

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - Both zero => [`RSI_FLAT`] (no movement).
/// - Loss zero => [`RSI_ZERO_LOSS`] (all gains).
/// - `None` when the result is non-finite.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        RSI_FLAT
    } else if avg_loss == 0.0 {
        RSI_ZERO_LOSS
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi.clamp(0.0, 100.0))
    } else {
        None
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn last(series: &Series) -> f64 {
        series.last().copied().flatten().expect("defined last value")
    }

    #[test]
    fn rsi_empty_input() {
        assert!(calculate_rsi(&[], 14).is_empty());
    }

    #[test]
    fn rsi_period_zero() {
        assert_eq!(calculate_rsi(&[1.0, 2.0, 3.0], 0), vec![None, None, None]);
    }

    #[test]
    fn rsi_insufficient_data() {
        let closes: Vec<f64> = (1..=13).map(|x| x as f64).collect();
        let out = calculate_rsi(&closes, 14);
        assert_eq!(out.len(), 13);
        assert!(out.iter().all(Option::is_none));

        // 14 closes: the leading zero change completes the first window.
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        let out = calculate_rsi(&closes, 14);
        assert!(out[..13].iter().all(Option::is_none));
        assert_eq!(out[13], Some(RSI_ZERO_LOSS));
    }

    #[test]
    fn rsi_first_defined_at_period_minus_one() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let out = calculate_rsi(&closes, 14);
        for (i, v) in out.iter().enumerate() {
            assert_eq!(v.is_some(), i >= 13, "index {i}");
        }
    }

    #[test]
    fn rsi_all_gains_is_clamped_to_100() {
        let closes: Vec<f64> = (1..=15).map(|x| x as f64).collect();
        let out = calculate_rsi(&closes, 14);
        assert_eq!(out.len(), 15);
        assert!((last(&out) - RSI_ZERO_LOSS).abs() < 1e-10);
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let out = calculate_rsi(&closes, 14);
        for v in out.iter().flatten() {
            assert!(v.abs() < 1e-10, "expected 0.0, got {v}");
        }
    }

    #[test]
    fn rsi_flat_market_is_neutral() {
        let out = calculate_rsi(&[100.0; 30], 14);
        assert!(out.iter().flatten().count() > 0);
        for v in out.iter().flatten() {
            assert!((v - RSI_FLAT).abs() < 1e-10, "expected 50.0, got {v}");
        }
    }

    #[test]
    fn rsi_known_value() {
        // Deltas over the last 2: +2, -1 => avg_gain 1.0, avg_loss 0.5, RS 2.
        let out = calculate_rsi(&[10.0, 12.0, 11.0], 2);
        assert!((last(&out) - (100.0 - 100.0 / 3.0)).abs() < 1e-10);
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13, 47.0, 41.2,
            45.5, 45.5, 39.9, 50.1,
        ];
        let out = calculate_rsi(&closes, 14);
        for &v in out.iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    #[test]
    fn rsi_nan_close_leaves_windows_undefined() {
        let mut closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        closes[10] = f64::NAN;
        let out = calculate_rsi(&closes, 5);
        // Deltas 10 and 11 are undefined, so windows ending at 10..=15 are too.
        assert!(out[9].is_some());
        for v in &out[10..16] {
            assert!(v.is_none());
        }
        assert!(out[16].is_some());
    }

    #[test]
    fn rsi_defined_from_period_minus_one_for_every_period() {
        let closes = vec![3.0, 2.5, 4.1, 3.9, 5.2, 4.4, 6.0, 5.1, 7.3, 6.6];
        for period in 1..=10 {
            let out = calculate_rsi(&closes, period);
            for (i, v) in out.iter().enumerate() {
                assert_eq!(v.is_some(), i + 1 >= period, "period {period}, index {i}");
            }
        }
    }

    #[test]
    fn rsi_nan_first_close_has_no_leading_change() {
        let out = calculate_rsi(&[f64::NAN, 1.0, 2.0, 3.0], 2);
        assert!(out[..3].iter().all(Option::is_none));
        assert_eq!(out[3], Some(RSI_ZERO_LOSS));
    }

    #[test]
    fn averages_report_zero_loss() {
        let closes: Vec<f64> = (1..=15).map(|x| x as f64).collect();
        let averages = average_gains_losses(&closes, 14);
        assert_eq!(averages.avg_loss.last().copied().flatten(), Some(0.0));
        assert!((averages.avg_gain.last().copied().flatten().unwrap() - 1.0).abs() < 1e-10);
    }
}
