// =============================================================================
// Output Sinks — where finished indicator rows go
// =============================================================================
//
// The scheduler only depends on `OutputSink::append`. Appends are issued from
// the scheduler task one at a time, so implementations only need to be safe
// for a single writer, but they must be `Send + Sync` to live behind an `Arc`.
// =============================================================================

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::indicator_row::IndicatorRow;

/// Receiver of completed indicator rows.
pub trait OutputSink: Send + Sync {
    fn append(&self, row: IndicatorRow) -> Result<()>;
}

// -----------------------------------------------------------------------------
// MemorySink
// -----------------------------------------------------------------------------

/// Keeps every appended row in memory, in append order.
#[derive(Default)]
pub struct MemorySink {
    rows: RwLock<Vec<IndicatorRow>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn rows(&self) -> Vec<IndicatorRow> {
        self.rows.read().clone()
    }

    pub fn rows_for(&self, symbol: &str) -> Vec<IndicatorRow> {
        self.rows
            .read()
            .iter()
            .filter(|r| r.symbol == symbol)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl OutputSink for MemorySink {
    fn append(&self, row: IndicatorRow) -> Result<()> {
        self.rows.write().push(row);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// JsonlSink
// -----------------------------------------------------------------------------

/// Appends each row as one JSON object per line and flushes after every row.
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    /// Open (or create) `path` in append mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open output file {}", path.display()))?;

        info!(path = %path.display(), "JSON-lines sink opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }
}

impl OutputSink for JsonlSink {
    fn append(&self, row: IndicatorRow) -> Result<()> {
        let mut line = serde_json::to_vec(&row).context("failed to serialise indicator row")?;
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)
            .and_then(|_| file.flush())
            .with_context(|| format!("failed to append row to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorSnapshot;
    use crate::market_data::Bar;
    use chrono::{TimeZone, Utc};

    fn row(symbol: &str, close: f64) -> IndicatorRow {
        let bar = Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            symbol: symbol.into(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        };
        IndicatorRow::assemble(&bar, &IndicatorSnapshot::default())
    }

    #[test]
    fn memory_sink_keeps_rows_per_symbol() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.append(row("AAPL", 1.0)).unwrap();
        sink.append(row("TSLA", 2.0)).unwrap();
        sink.append(row("AAPL", 3.0)).unwrap();
        assert_eq!(sink.len(), 3);
        let aapl = sink.rows_for("AAPL");
        assert_eq!(aapl.len(), 2);
        assert_eq!(aapl[1].close, 3.0);
    }

    #[test]
    fn jsonl_sink_appends_lines() {
        let path = std::env::temp_dir().join(format!(
            "indicator_engine_rows_{}.jsonl",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let sink = JsonlSink::open(&path).unwrap();
        sink.append(row("AAPL", 1.5)).unwrap();
        sink.append(row("GOOG", 2.5)).unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<IndicatorRow> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "AAPL");
        assert_eq!(rows[1].close, 2.5);
        assert!(rows[1].rsi_14.is_none());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn jsonl_sink_open_fails_for_missing_directory() {
        assert!(JsonlSink::open("/definitely/not/a/dir/rows.jsonl").is_err());
    }
}
