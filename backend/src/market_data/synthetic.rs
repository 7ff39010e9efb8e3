// =============================================================================
// Synthetic Feed — random-walk bars for running without live ingestion
// =============================================================================
//
// Each step draws a Gaussian close-to-close return per symbol, jitters the
// high / low around the new close, picks the open uniformly between them and
// a random volume. Bars are appended to the `BarStore` like any ingestion
// path would.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SyntheticFeedConfig;

use super::{Bar, BarStore};

/// Standard deviation of the high / low jitter around the close.
const RANGE_STD: f64 = 0.002;
const MIN_VOLUME: u64 = 500_000;
const MAX_VOLUME: u64 = 5_000_000;

/// Random-walk bar generator.
pub struct SyntheticFeed {
    prices: HashMap<String, f64>,
    returns: Normal<f64>,
    range: Normal<f64>,
    rng: StdRng,
}

impl SyntheticFeed {
    /// Build a generator; `seed` makes the walk reproducible.
    pub fn new(symbols: &[String], cfg: &SyntheticFeedConfig, seed: Option<u64>) -> Result<Self> {
        let returns = Normal::new(0.0, cfg.return_std)
            .with_context(|| format!("invalid synthetic return_std {}", cfg.return_std))?;
        let range = Normal::new(0.0, RANGE_STD).context("invalid range distribution")?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            prices: symbols
                .iter()
                .map(|s| (s.clone(), cfg.initial_price))
                .collect(),
            returns,
            range,
            rng,
        })
    }

    /// Generate the next bar for `symbol`, advancing its random walk.
    pub fn next_bar(&mut self, symbol: &str) -> Bar {
        let prev = self.prices.get(symbol).copied().unwrap_or(100.0);
        let change = self.returns.sample(&mut self.rng);
        // Keep the walk strictly positive.
        let close = (prev * (1.0 + change)).max(0.01);
        let high = close * (1.0 + self.range.sample(&mut self.rng).abs());
        let low = close * (1.0 - self.range.sample(&mut self.rng).abs());
        let open = if high > low {
            self.rng.gen_range(low..high)
        } else {
            close
        };
        let volume = self.rng.gen_range(MIN_VOLUME..MAX_VOLUME) as f64;

        self.prices.insert(symbol.to_string(), close);

        Bar {
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Append one synthetic bar per symbol every `cfg.interval_ms` until
/// `shutdown` flips to `true`.
pub async fn run_synthetic_feed(
    store: Arc<BarStore>,
    symbols: Vec<String>,
    cfg: SyntheticFeedConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut feed = SyntheticFeed::new(&symbols, &cfg, None)?;
    let mut ticker = interval(Duration::from_millis(cfg.interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_ms = cfg.interval_ms,
        symbols = ?symbols,
        "synthetic feed started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        for symbol in &symbols {
            let bar = feed.next_bar(symbol);
            debug!(symbol = %symbol, close = bar.close, "synthetic bar");
            if let Err(e) = store.append(bar) {
                warn!(symbol = %symbol, error = %e, "synthetic bar rejected");
            }
        }
    }

    info!("synthetic feed stopped");
    Ok(())
}
