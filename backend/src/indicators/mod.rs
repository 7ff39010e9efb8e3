// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicator kernels evaluated on
// every tick. Every kernel returns a `Series` aligned with its input, so
// callers are forced to handle insufficient-data and numerical-edge-case
// positions explicitly.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

use crate::config::IndicatorParams;
use crate::error::Notice;

use self::bollinger::calculate_bollinger;
use self::ema::calculate_ema;
use self::macd::calculate_macd;
use self::rsi::{average_gains_losses, calculate_rsi};
use self::sma::calculate_sma;

/// An indicator output aligned with its input; `None` marks an undefined slot.
pub type Series = Vec<Option<f64>>;

fn last_of(series: &Series) -> Option<f64> {
    series.last().copied().flatten()
}

/// The most recent value of every configured indicator for one price series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub moving_average: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    /// Degenerate numeric conditions hit while computing the last values.
    pub notices: Vec<Notice>,
}

impl IndicatorSnapshot {
    /// Run every kernel over `closes` and keep the last value of each series.
    pub fn compute(closes: &[f64], params: &IndicatorParams) -> Self {
        let mut notices = Vec::new();

        let moving_average = last_of(&calculate_sma(closes, params.ma_period));
        let ema_fast = last_of(&calculate_ema(closes, params.ema_fast_period, params.ema_seed));
        let ema_slow = last_of(&calculate_ema(closes, params.ema_slow_period, params.ema_seed));

        let rsi = last_of(&calculate_rsi(closes, params.rsi_period));
        if rsi.is_some() {
            let averages = average_gains_losses(closes, params.rsi_period);
            if last_of(&averages.avg_loss) == Some(0.0) {
                notices.push(Notice::NumericDegenerate { indicator: "rsi" });
            }
        }

        let macd = calculate_macd(
            closes,
            params.macd_fast_period,
            params.macd_slow_period,
            params.macd_signal_period,
            params.ema_seed,
        );

        let bands = calculate_bollinger(closes, params.bollinger_period, params.bollinger_num_std);
        let (bb_upper, bb_middle, bb_lower) =
            (last_of(&bands.upper), last_of(&bands.middle), last_of(&bands.lower));
        if let (Some(upper), Some(lower)) = (bb_upper, bb_lower) {
            if upper == lower {
                notices.push(Notice::NumericDegenerate { indicator: "bollinger" });
            }
        }

        Self {
            moving_average,
            ema_fast,
            ema_slow,
            rsi,
            macd: last_of(&macd.line),
            macd_signal: last_of(&macd.signal),
            macd_histogram: last_of(&macd.histogram),
            bb_upper,
            bb_middle,
            bb_lower,
            notices,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::rsi::{RSI_FLAT, RSI_ZERO_LOSS};

    #[test]
    fn snapshot_empty_closes_is_all_undefined() {
        let snap = IndicatorSnapshot::compute(&[], &IndicatorParams::default());
        assert_eq!(snap, IndicatorSnapshot::default());
    }

    #[test]
    fn snapshot_short_window_is_partially_defined() {
        // 25 closes: MA20 / EMA20 / RSI14 / BB20 defined, EMA50 and MACD not.
        let closes: Vec<f64> = (0..25).map(|x| 100.0 + (x as f64 * 0.7).sin()).collect();
        let snap = IndicatorSnapshot::compute(&closes, &IndicatorParams::default());
        assert!(snap.moving_average.is_some());
        assert!(snap.ema_fast.is_some());
        assert!(snap.rsi.is_some());
        assert!(snap.bb_middle.is_some());
        assert!(snap.ema_slow.is_none());
        assert!(snap.macd.is_none());
        assert!(snap.macd_signal.is_none());
    }

    #[test]
    fn snapshot_flat_window() {
        let snap = IndicatorSnapshot::compute(&[25.0; 60], &IndicatorParams::default());
        assert_eq!(snap.rsi, Some(RSI_FLAT));
        assert!(snap.macd.unwrap().abs() < 1e-10);
        assert_eq!(snap.bb_upper, snap.bb_middle);
        assert_eq!(snap.bb_middle, snap.bb_lower);
        assert!(snap.notices.contains(&Notice::NumericDegenerate { indicator: "rsi" }));
        assert!(snap.notices.contains(&Notice::NumericDegenerate { indicator: "bollinger" }));
    }

    #[test]
    fn snapshot_flat_inexact_prices() {
        for price in [100.1, 0.1] {
            let snap = IndicatorSnapshot::compute(&[price; 60], &IndicatorParams::default());
            assert_eq!(snap.macd, Some(0.0));
            assert_eq!(snap.macd_histogram, Some(0.0));
            assert_eq!(snap.bb_upper, Some(price));
            assert_eq!(snap.bb_middle, Some(price));
            assert_eq!(snap.bb_lower, Some(price));
            assert_eq!(snap.moving_average, Some(price));
            assert_eq!(snap.rsi, Some(RSI_FLAT));
            assert!(snap.notices.contains(&Notice::NumericDegenerate { indicator: "bollinger" }));
        }
    }

    #[test]
    fn snapshot_rising_window_flags_zero_loss() {
        let closes: Vec<f64> = (1..=60).map(|x| x as f64).collect();
        let snap = IndicatorSnapshot::compute(&closes, &IndicatorParams::default());
        assert_eq!(snap.rsi, Some(RSI_ZERO_LOSS));
        assert_eq!(snap.notices, vec![Notice::NumericDegenerate { indicator: "rsi" }]);
        assert!((snap.moving_average.unwrap() - 50.5).abs() < 1e-10);
    }

    #[test]
    fn snapshot_respects_custom_periods() {
        let params = IndicatorParams {
            ma_period: 3,
            ema_fast_period: 2,
            ema_slow_period: 4,
            rsi_period: 2,
            macd_fast_period: 2,
            macd_slow_period: 3,
            macd_signal_period: 2,
            bollinger_period: 3,
            ..IndicatorParams::default()
        };
        let snap = IndicatorSnapshot::compute(&[1.0, 3.0, 2.0, 5.0, 4.0], &params);
        assert!((snap.moving_average.unwrap() - 11.0 / 3.0).abs() < 1e-10);
        assert!(snap.ema_slow.is_some());
        assert!(snap.macd_signal.is_some());
        assert!(snap.rsi.is_some());
    }
}
