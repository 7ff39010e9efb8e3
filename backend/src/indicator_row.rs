// =============================================================================
// Indicator Row — one derived record per symbol per tick
// =============================================================================
//
// A row is the last bar of the evaluated window (timestamp + OHLCV, copied
// verbatim) plus the last value of every indicator series. It is built once
// and never mutated. Undefined indicator values serialise as `null`.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSnapshot;
use crate::market_data::Bar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub moving_average_20: Option<f64>,
    pub expo_average_20: Option<f64>,
    pub expo_average_50: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
}

impl IndicatorRow {
    /// Combine the window's last bar with the indicator snapshot.
    pub fn assemble(last: &Bar, snapshot: &IndicatorSnapshot) -> Self {
        Self {
            timestamp: last.timestamp,
            symbol: last.symbol.clone(),
            open: last.open,
            high: last.high,
            low: last.low,
            close: last.close,
            volume: last.volume,
            moving_average_20: snapshot.moving_average,
            expo_average_20: snapshot.ema_fast,
            expo_average_50: snapshot.ema_slow,
            rsi_14: snapshot.rsi,
            macd: snapshot.macd,
            macd_signal: snapshot.macd_signal,
            macd_histogram: snapshot.macd_histogram,
            bb_upper: snapshot.bb_upper,
            bb_middle: snapshot.bb_middle,
            bb_lower: snapshot.bb_lower,
        }
    }

    /// Number of indicator fields that are defined.
    pub fn defined_indicators(&self) -> usize {
        [
            self.moving_average_20,
            self.expo_average_20,
            self.expo_average_50,
            self.rsi_14,
            self.macd,
            self.macd_signal,
            self.macd_histogram,
            self.bb_upper,
            self.bb_middle,
            self.bb_lower,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndicatorParams;
    use chrono::TimeZone;

    fn bar(close: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(1_700_000_600, 0).unwrap(),
            symbol: "AAPL".into(),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 12_345.0,
        }
    }

    #[test]
    fn row_copies_last_bar_fields() {
        let last = bar(187.25);
        let row = IndicatorRow::assemble(&last, &IndicatorSnapshot::default());
        assert_eq!(row.timestamp, last.timestamp);
        assert_eq!(row.symbol, "AAPL");
        assert_eq!(row.open, last.open);
        assert_eq!(row.high, last.high);
        assert_eq!(row.low, last.low);
        assert_eq!(row.close, last.close);
        assert_eq!(row.volume, last.volume);
        assert_eq!(row.defined_indicators(), 0);
    }

    #[test]
    fn row_maps_snapshot_fields() {
        let closes: Vec<f64> = (1..=60).map(|x| x as f64).collect();
        let snap = IndicatorSnapshot::compute(&closes, &IndicatorParams::default());
        let row = IndicatorRow::assemble(&bar(60.0), &snap);
        assert_eq!(row.moving_average_20, snap.moving_average);
        assert_eq!(row.expo_average_20, snap.ema_fast);
        assert_eq!(row.expo_average_50, snap.ema_slow);
        assert_eq!(row.rsi_14, snap.rsi);
        assert_eq!(row.macd, snap.macd);
        assert_eq!(row.macd_signal, snap.macd_signal);
        assert_eq!(row.macd_histogram, snap.macd_histogram);
        assert_eq!(row.bb_lower, snap.bb_lower);
        assert_eq!(row.defined_indicators(), 10);
    }

    #[test]
    fn undefined_fields_serialise_as_null() {
        let row = IndicatorRow::assemble(&bar(10.0), &IndicatorSnapshot::default());
        let json = serde_json::to_value(&row).unwrap();
        assert!(json["rsi_14"].is_null());
        assert!(json["bb_upper"].is_null());
        assert!(json["macd_histogram"].is_null());
        assert_eq!(json["symbol"], "AAPL");
    }
}
