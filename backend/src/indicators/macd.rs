// =============================================================================
// MACD (Moving Average Convergence Divergence)
// =============================================================================
//
//   line      = EMA(fast) - EMA(slow)
//   signal    = EMA(signal_period) of line
//   histogram = line - signal
//
// All three are aligned with the input. The line is defined where both EMAs
// are; the signal EMA skips the line's undefined prefix and seeds from the
// first defined line values.
// =============================================================================

use super::ema::{calculate_ema, calculate_ema_series, EmaSeed};
use super::Series;

/// Aligned MACD output.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Series,
    pub signal: Series,
    pub histogram: Series,
}

/// Compute MACD over `closes`.
pub fn calculate_macd(
    closes: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    seed: EmaSeed,
) -> MacdSeries {
    let fast = calculate_ema(closes, fast_period, seed);
    let slow = calculate_ema(closes, slow_period, seed);

    let line: Series = fast
        .iter()
        .zip(slow.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s).filter(|v| v.is_finite()),
            _ => None,
        })
        .collect();

    let signal = calculate_ema_series(&line, signal_period, seed);

    let histogram = line
        .iter()
        .zip(signal.iter())
        .map(|(l, s)| match (l, s) {
            (Some(l), Some(s)) => Some(l - s),
            _ => None,
        })
        .collect();

    MacdSeries {
        line,
        signal,
        histogram,
    }
}
