use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::SeriesSource;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

// ---------------------------------------------------------------------------
// BarStore -- thread-safe append-only series per symbol
// ---------------------------------------------------------------------------

/// Thread-safe store holding the most recent bars per symbol, oldest first.
///
/// Appends must not go back in time within a symbol; equal timestamps are
/// accepted. Each series is trimmed to `max_bars` from the front.
pub struct BarStore {
    series: RwLock<HashMap<String, VecDeque<Bar>>>,
    max_bars: usize,
}

impl BarStore {
    /// Create a new store that retains at most `max_bars` bars per symbol.
    pub fn new(max_bars: usize) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            max_bars: max_bars.max(1),
        }
    }

    /// Append a bar to its symbol's series.
    ///
    /// Fails when the bar is older than the symbol's latest bar.
    pub fn append(&self, bar: Bar) -> Result<()> {
        let mut map = self.series.write();
        let ring = map
            .entry(bar.symbol.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.max_bars.min(1024)));

        if let Some(last) = ring.back() {
            if bar.timestamp < last.timestamp {
                bail!(
                    "out-of-order bar for {}: {} is before {}",
                    bar.symbol,
                    bar.timestamp,
                    last.timestamp
                );
            }
        }

        ring.push_back(bar);
        while ring.len() > self.max_bars {
            ring.pop_front();
        }
        Ok(())
    }

    /// Return a copy of the symbol's series (oldest first). Empty when the
    /// symbol has never been seen.
    pub fn snapshot(&self, symbol: &str) -> Vec<Bar> {
        let map = self.series.read();
        map.get(symbol)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent bar for a symbol, if any.
    pub fn last_bar(&self, symbol: &str) -> Option<Bar> {
        let map = self.series.read();
        map.get(symbol).and_then(|ring| ring.back().cloned())
    }

    /// Number of bars stored for a symbol.
    pub fn count(&self, symbol: &str) -> usize {
        let map = self.series.read();
        map.get(symbol).map_or(0, VecDeque::len)
    }

    /// Bulk-load bars from a JSON-lines file (one `Bar` object per line).
    ///
    /// Blank lines are ignored. Lines that fail to parse or arrive out of
    /// order are skipped with a warning. Returns the number of bars stored.
    pub fn load_jsonl(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open seed file {}", path.display()))?;

        let mut loaded = 0usize;
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .with_context(|| format!("failed to read line {} of {}", idx + 1, path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let bar: Bar = match serde_json::from_str(&line) {
                Ok(bar) => bar,
                Err(e) => {
                    warn!(line = idx + 1, error = %e, "skipping unparsable seed bar");
                    continue;
                }
            };
            match self.append(bar) {
                Ok(()) => loaded += 1,
                Err(e) => warn!(line = idx + 1, error = %e, "skipping seed bar"),
            }
        }

        info!(path = %path.display(), bars = loaded, "seed bars loaded");
        Ok(loaded)
    }
}

impl SeriesSource for BarStore {
    fn get_series(&self, symbol: &str) -> Result<Vec<Bar>> {
        let bars = self.snapshot(symbol);
        debug!(symbol = %symbol, bars = bars.len(), "series snapshot taken");
        Ok(bars)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
