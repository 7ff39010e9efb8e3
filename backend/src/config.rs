// =============================================================================
// Engine Configuration — JSON file + env overrides, atomic save
// =============================================================================
//
// Every tunable of the evaluation engine lives here: the tracked symbol set,
// the tick interval, per-symbol timeout, window options and the indicator
// parameters. All fields carry `#[serde(default)]` so that a partial (or
// empty) JSON file still loads.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::ema::EmaSeed;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec!["AAPL".to_string(), "TSLA".to_string(), "GOOG".to_string()]
}

fn default_tick_interval_ms() -> u64 {
    10_000
}

fn default_eval_timeout_ms() -> u64 {
    2_000
}

fn default_min_bars() -> usize {
    1
}

fn default_ma_period() -> usize {
    20
}

fn default_ema_fast_period() -> usize {
    20
}

fn default_ema_slow_period() -> usize {
    50
}

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast_period() -> usize {
    12
}

fn default_macd_slow_period() -> usize {
    26
}

fn default_macd_signal_period() -> usize {
    9
}

fn default_bollinger_period() -> usize {
    20
}

fn default_bollinger_num_std() -> f64 {
    2.0
}

fn default_output_path() -> Option<String> {
    Some("indicator_rows.jsonl".to_string())
}

fn default_retention() -> usize {
    5_000
}

fn default_feed_interval_ms() -> u64 {
    1_000
}

fn default_initial_price() -> f64 {
    200.0
}

fn default_return_std() -> f64 {
    0.005
}

// =============================================================================
// IndicatorParams
// =============================================================================

/// Periods and multipliers for every kernel evaluated on a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorParams {
    /// Simple moving average window (`moving_average_20`).
    #[serde(default = "default_ma_period")]
    pub ma_period: usize,

    /// Fast EMA period (`expo_average_20`).
    #[serde(default = "default_ema_fast_period")]
    pub ema_fast_period: usize,

    /// Slow EMA period (`expo_average_50`).
    #[serde(default = "default_ema_slow_period")]
    pub ema_slow_period: usize,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_macd_fast_period")]
    pub macd_fast_period: usize,

    #[serde(default = "default_macd_slow_period")]
    pub macd_slow_period: usize,

    #[serde(default = "default_macd_signal_period")]
    pub macd_signal_period: usize,

    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,

    /// Band offset in standard deviations. Must be >= 0.
    #[serde(default = "default_bollinger_num_std")]
    pub bollinger_num_std: f64,

    /// Seeding rule shared by every EMA (including MACD's).
    #[serde(default)]
    pub ema_seed: EmaSeed,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_period: default_ma_period(),
            ema_fast_period: default_ema_fast_period(),
            ema_slow_period: default_ema_slow_period(),
            rsi_period: default_rsi_period(),
            macd_fast_period: default_macd_fast_period(),
            macd_slow_period: default_macd_slow_period(),
            macd_signal_period: default_macd_signal_period(),
            bollinger_period: default_bollinger_period(),
            bollinger_num_std: default_bollinger_num_std(),
            ema_seed: EmaSeed::default(),
        }
    }
}

impl IndicatorParams {
    /// Bars needed before every indicator field can be defined.
    pub fn required_bars(&self) -> usize {
        let macd_signal = self.macd_slow_period + self.macd_signal_period.saturating_sub(1);
        [
            self.ma_period,
            self.ema_fast_period,
            self.ema_slow_period,
            self.rsi_period,
            macd_signal,
            self.bollinger_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("ma_period", self.ma_period),
            ("ema_fast_period", self.ema_fast_period),
            ("ema_slow_period", self.ema_slow_period),
            ("rsi_period", self.rsi_period),
            ("macd_fast_period", self.macd_fast_period),
            ("macd_slow_period", self.macd_slow_period),
            ("macd_signal_period", self.macd_signal_period),
            ("bollinger_period", self.bollinger_period),
        ];
        for (name, period) in periods {
            if period == 0 {
                bail!("{name} must be greater than zero");
            }
        }
        if self.macd_fast_period >= self.macd_slow_period {
            bail!(
                "macd_fast_period ({}) must be below macd_slow_period ({})",
                self.macd_fast_period,
                self.macd_slow_period
            );
        }
        if !self.bollinger_num_std.is_finite() || self.bollinger_num_std < 0.0 {
            bail!("bollinger_num_std must be a finite value >= 0");
        }
        Ok(())
    }
}

// =============================================================================
// WindowOptions
// =============================================================================

/// How much of a symbol's series a tick looks at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowOptions {
    /// Windows with fewer bars are skipped for the tick (no row, no error).
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,

    /// Keep only the trailing N bars. `None` evaluates the full history.
    #[serde(default)]
    pub lookback_bars: Option<usize>,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            min_bars: default_min_bars(),
            lookback_bars: None,
        }
    }
}

// =============================================================================
// SyntheticFeedConfig
// =============================================================================

/// Random-walk bar generator used when no live ingestion is attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticFeedConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Delay between generated bars (one bar per symbol per interval).
    #[serde(default = "default_feed_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_initial_price")]
    pub initial_price: f64,

    /// Standard deviation of the per-bar close-to-close return.
    #[serde(default = "default_return_std")]
    pub return_std: f64,
}

impl SyntheticFeedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            bail!("synthetic_feed.interval_ms must be greater than zero");
        }
        if !self.initial_price.is_finite() || self.initial_price <= 0.0 {
            bail!(
                "synthetic_feed.initial_price must be a finite value > 0, got {}",
                self.initial_price
            );
        }
        if !self.return_std.is_finite() || self.return_std < 0.0 {
            bail!(
                "synthetic_feed.return_std must be a finite value >= 0, got {}",
                self.return_std
            );
        }
        Ok(())
    }
}

impl Default for SyntheticFeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_feed_interval_ms(),
            initial_price: default_initial_price(),
            return_std: default_return_std(),
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level configuration for the indicator engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed set of symbols evaluated on every tick.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Scheduler period. Not adaptive.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Budget for evaluating one symbol within a tick.
    #[serde(default = "default_eval_timeout_ms")]
    pub eval_timeout_ms: u64,

    #[serde(default)]
    pub window: WindowOptions,

    #[serde(default)]
    pub indicators: IndicatorParams,

    /// JSON-lines file receiving indicator rows. `None` keeps rows in memory.
    #[serde(default = "default_output_path")]
    pub output_path: Option<String>,

    /// Optional JSON-lines file of bars loaded into the store at startup.
    #[serde(default)]
    pub seed_path: Option<String>,

    /// Bars retained per symbol by the in-process store.
    #[serde(default = "default_retention")]
    pub store_retention: usize,

    #[serde(default)]
    pub synthetic_feed: SyntheticFeedConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            tick_interval_ms: default_tick_interval_ms(),
            eval_timeout_ms: default_eval_timeout_ms(),
            window: WindowOptions::default(),
            indicators: IndicatorParams::default(),
            output_path: default_output_path(),
            seed_path: None,
            store_retention: default_retention(),
            synthetic_feed: SyntheticFeedConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            tick_interval_ms = config.tick_interval_ms,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }

    /// Apply `INDICATOR_SYMBOLS`, `INDICATOR_TICK_MS` and `INDICATOR_OUTPUT`
    /// from the environment on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(syms) = std::env::var("INDICATOR_SYMBOLS") {
            self.symbols = parse_symbol_list(&syms);
        }
        if let Ok(ms) = std::env::var("INDICATOR_TICK_MS") {
            self.tick_interval_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("INDICATOR_TICK_MS is not an integer: {ms}"))?;
        }
        if let Ok(path) = std::env::var("INDICATOR_OUTPUT") {
            let path = path.trim();
            self.output_path = (!path.is_empty()).then(|| path.to_string());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            bail!("at least one symbol must be tracked");
        }
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be greater than zero");
        }
        if self.eval_timeout_ms == 0 {
            bail!("eval_timeout_ms must be greater than zero");
        }
        if self.window.lookback_bars == Some(0) {
            bail!("window.lookback_bars must be greater than zero when set");
        }
        if self.synthetic_feed.enabled {
            self.synthetic_feed
                .validate()
                .context("invalid synthetic feed settings")?;
        }
        self.indicators
            .validate()
            .context("invalid indicator parameters")
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_millis(self.eval_timeout_ms)
    }
}

/// Split a comma-separated symbol list, trimming and upper-casing entries and
/// dropping empties and duplicates (first occurrence wins).
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for sym in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !sym.is_empty() && !out.contains(&sym) {
            out.push(sym);
        }
    }
    out
}
