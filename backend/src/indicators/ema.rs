// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = EMA_{t-1} + multiplier * (close_t - EMA_{t-1})
//
// Written as a step towards the new close, so a run of equal closes leaves
// the average exactly at that close.
// Seeding is selectable (see `EmaSeed`). The output is aligned with the input;
// positions before the seed are `None`.
//
// A non-finite input (or an undefined slot when smoothing another series)
// yields `None` at that position and resets the running average, which then
// re-seeds from the following values under the same rule.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::sma::window_mean;
use super::Series;

/// How the first EMA value is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmaSeed {
    /// Seed with the SMA of the first `period` values. First defined index is
    /// `period - 1`.
    Sma,
    /// Seed with the first value itself. Defined from the first value on.
    FirstValue,
}

impl Default for EmaSeed {
    fn default() -> Self {
        Self::Sma
    }
}

impl std::fmt::Display for EmaSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sma => write!(f, "sma"),
            Self::FirstValue => write!(f, "first_value"),
        }
    }
}

/// Compute the EMA series for the given `closes` and look-back `period`.
///
/// # Edge cases
/// - `period == 0` => every position is `None`
/// - `closes.len() < period` with `EmaSeed::Sma` => every position is `None`
/// - NaN / ±Inf => `None` at that position, then re-seed
pub fn calculate_ema(closes: &[f64], period: usize, seed: EmaSeed) -> Series {
    let values: Vec<Option<f64>> = closes.iter().map(|&c| Some(c)).collect();
    calculate_ema_series(&values, period, seed)
}

/// EMA over a series that may contain undefined positions (e.g. the MACD
/// line, whose leading values are undefined until the slow EMA is seeded).
pub fn calculate_ema_series(values: &[Option<f64>], period: usize, seed: EmaSeed) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let mut prev_ema: Option<f64> = None;
    // Pending seed window for `EmaSeed::Sma`.
    let mut seed_window: Vec<f64> = Vec::with_capacity(period);

    for (i, value) in values.iter().enumerate() {
        let Some(price) = value.filter(|p| p.is_finite()) else {
            prev_ema = None;
            seed_window.clear();
            continue;
        };

        let next = match (prev_ema, seed) {
            (Some(prev), _) => Some(prev + multiplier * (price - prev)),
            (None, EmaSeed::FirstValue) => Some(price),
            (None, EmaSeed::Sma) => {
                seed_window.push(price);
                (seed_window.len() == period).then(|| window_mean(&seed_window))
            }
        };

        match next {
            Some(ema) if ema.is_finite() => {
                out[i] = Some(ema);
                prev_ema = Some(ema);
                seed_window.clear();
            }
            Some(_) => {
                // Overflowed to a non-finite value; start over.
                prev_ema = None;
                seed_window.clear();
            }
            None => {}
        }
    }

    out
}
