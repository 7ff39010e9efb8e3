// =============================================================================
// Symbol Window — per-tick snapshot of one symbol's bars
// =============================================================================
//
// The window is fetched once per symbol per tick and owned by that symbol's
// evaluation, so ingestion appending to the store mid-computation is never
// observed. Minimum-record threshold is `WindowOptions::min_bars` (1 by
// default): windows below it are skipped without a row or an error. Windows
// shorter than the longest indicator period are still evaluated and produce
// rows with undefined fields.
// =============================================================================

use crate::config::WindowOptions;
use crate::error::EngineError;

use super::{Bar, SeriesSource};

/// The ordered bars of one symbol as seen by one tick.
#[derive(Debug, Clone)]
pub struct SymbolWindow {
    symbol: String,
    bars: Vec<Bar>,
}

impl SymbolWindow {
    /// Fetch and validate the window for `symbol`.
    ///
    /// Returns `Ok(None)` when the window holds fewer than `opts.min_bars`
    /// bars (the symbol is skipped for this tick).
    pub fn fetch(
        source: &dyn SeriesSource,
        symbol: &str,
        opts: &WindowOptions,
    ) -> Result<Option<Self>, EngineError> {
        let mut bars = source
            .get_series(symbol)
            .map_err(|e| EngineError::SourceUnavailable {
                symbol: symbol.to_string(),
                reason: format!("{e:#}"),
            })?;

        if let Some(lookback) = opts.lookback_bars {
            let excess = bars.len().saturating_sub(lookback);
            bars.drain(..excess);
        }

        let window = Self {
            symbol: symbol.to_string(),
            bars,
        };
        window.validate()?;

        if window.bars.is_empty() || window.bars.len() < opts.min_bars {
            return Ok(None);
        }
        Ok(Some(window))
    }

    fn validate(&self) -> Result<(), EngineError> {
        if let Some(foreign) = self.bars.iter().find(|b| b.symbol != self.symbol) {
            return Err(EngineError::MalformedData {
                symbol: self.symbol.clone(),
                reason: format!("series contains a bar for {}", foreign.symbol),
            });
        }
        if let Some(pos) = self
            .bars
            .windows(2)
            .position(|w| w[1].timestamp < w[0].timestamp)
        {
            return Err(EngineError::MalformedData {
                symbol: self.symbol.clone(),
                reason: format!("timestamp decreases at bar {}", pos + 1),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// The most recent bar. Always present for a fetched window.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Closing prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Whether every indicator needing `required` bars can be defined.
    pub fn is_sufficient_for(&self, required: usize) -> bool {
        self.bars.len() >= required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::{TimeZone, Utc};

    struct FixedSource(Vec<Bar>);

    impl SeriesSource for FixedSource {
        fn get_series(&self, symbol: &str) -> anyhow::Result<Vec<Bar>> {
            Ok(self.0.iter().filter(|b| b.symbol == symbol).cloned().collect())
        }
    }

    struct RawSource(Vec<Bar>);

    impl SeriesSource for RawSource {
        fn get_series(&self, _symbol: &str) -> anyhow::Result<Vec<Bar>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    impl SeriesSource for BrokenSource {
        fn get_series(&self, _symbol: &str) -> anyhow::Result<Vec<Bar>> {
            Err(anyhow!("connection refused"))
        }
    }

    fn bar(symbol: &str, secs: i64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            symbol: symbol.into(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10.0,
        }
    }

    fn bars(symbol: &str, n: usize) -> Vec<Bar> {
        (0..n).map(|i| bar(symbol, i as i64 * 60, i as f64)).collect()
    }

    #[test]
    fn empty_window_is_skipped() {
        let source = FixedSource(bars("AAPL", 3));
        let window = SymbolWindow::fetch(&source, "TSLA", &WindowOptions::default()).unwrap();
        assert!(window.is_none());
    }

    #[test]
    fn single_bar_is_enough_by_default() {
        let source = FixedSource(bars("AAPL", 1));
        let window = SymbolWindow::fetch(&source, "AAPL", &WindowOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(window.len(), 1);
        assert!(!window.is_sufficient_for(50));
        assert_eq!(window.last().unwrap().symbol, "AAPL");
    }

    #[test]
    fn min_bars_threshold_skips_short_windows() {
        let source = FixedSource(bars("AAPL", 4));
        let opts = WindowOptions {
            min_bars: 5,
            lookback_bars: None,
        };
        assert!(SymbolWindow::fetch(&source, "AAPL", &opts).unwrap().is_none());
    }

    #[test]
    fn lookback_keeps_trailing_bars() {
        let source = FixedSource(bars("AAPL", 10));
        let opts = WindowOptions {
            min_bars: 1,
            lookback_bars: Some(4),
        };
        let window = SymbolWindow::fetch(&source, "AAPL", &opts).unwrap().unwrap();
        assert_eq!(window.closes(), vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(window.last().unwrap().close, 9.0);
    }

    #[test]
    fn source_failure_maps_to_source_unavailable() {
        let err = SymbolWindow::fetch(&BrokenSource, "AAPL", &WindowOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "source_unavailable");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn decreasing_timestamps_are_malformed() {
        let source = RawSource(vec![bar("AAPL", 120, 1.0), bar("AAPL", 60, 2.0)]);
        let err = SymbolWindow::fetch(&source, "AAPL", &WindowOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "malformed_data");
    }

    #[test]
    fn foreign_symbol_is_malformed() {
        let source = RawSource(vec![bar("AAPL", 0, 1.0), bar("TSLA", 60, 2.0)]);
        let err = SymbolWindow::fetch(&source, "AAPL", &WindowOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "malformed_data");
    }
}
