// =============================================================================
// Evaluation Scheduler — periodic per-symbol indicator evaluation
// =============================================================================
//
// Runs as a background Tokio task, waking every `tick_interval` to:
//   1. Take a snapshot window of every tracked symbol.
//   2. Run every indicator kernel over the window's closes.
//   3. Assemble one IndicatorRow from the last bar + last kernel values.
//   4. Append the row to the output sink.
//
// Each symbol is evaluated on the blocking pool under its own timeout, so a
// panic, a stalled source or a pathological computation only costs that
// symbol its row for this tick. Sink appends are issued afterwards from the
// scheduler task itself (single writer).
//
// A timed-out evaluation cannot be cancelled on the blocking pool. Its symbol
// stays in flight until the task really finishes, and later ticks report it
// as `Busy` instead of stacking another blocking task on top of it.
//
// Ticks never overlap: the loop awaits the whole tick before waiting on the
// timer again, and a fire missed during an overrunning tick is delayed rather
// than burst (`MissedTickBehavior::Delay`).
//
// The scheduler is designed to be spawned once at startup:
//
//   tokio::spawn(scheduler.clone().run(shutdown_rx));
//
// =============================================================================

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::time::{interval_at, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, IndicatorParams, WindowOptions};
use crate::error::{EngineError, Notice};
use crate::indicator_row::IndicatorRow;
use crate::indicators::IndicatorSnapshot;
use crate::market_data::{SeriesSource, SymbolWindow};
use crate::sink::OutputSink;

// =============================================================================
// Per-symbol evaluation
// =============================================================================

/// A completed evaluation of one symbol.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub row: IndicatorRow,
    pub notices: Vec<Notice>,
}

/// Fetch `symbol`'s window and compute its row.
///
/// `Ok(None)` means the window was empty (or below `min_bars`) and the symbol
/// is skipped for this tick.
pub fn evaluate_symbol(
    source: &dyn SeriesSource,
    symbol: &str,
    params: &IndicatorParams,
    window_opts: &WindowOptions,
) -> Result<Option<Evaluation>, EngineError> {
    let Some(window) = SymbolWindow::fetch(source, symbol, window_opts)? else {
        return Ok(None);
    };
    let Some(last) = window.last() else {
        return Ok(None);
    };

    let snapshot = IndicatorSnapshot::compute(&window.closes(), params);

    let mut notices = Vec::new();
    let required = params.required_bars();
    if !window.is_sufficient_for(required) {
        notices.push(Notice::InsufficientData {
            required,
            available: window.len(),
        });
    }
    notices.extend(snapshot.notices.iter().cloned());

    Ok(Some(Evaluation {
        row: IndicatorRow::assemble(last, &snapshot),
        notices,
    }))
}

// =============================================================================
// Tick report
// =============================================================================

/// One symbol that produced no row because of an error.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Symbols whose row reached the sink.
    pub emitted: Vec<String>,
    /// Symbols with no bars (no row, not an error).
    pub skipped: Vec<String>,
    pub failures: Vec<SymbolFailure>,
    /// Largest gap between an emitted row's bar timestamp and evaluation time.
    pub max_lag_ms: Option<i64>,
}

impl From<&EngineError> for SymbolFailure {
    fn from(err: &EngineError) -> Self {
        Self {
            symbol: err.symbol().to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl TickReport {
    pub fn failure_for(&self, symbol: &str) -> Option<&SymbolFailure> {
        self.failures.iter().find(|f| f.symbol == symbol)
    }
}

// =============================================================================
// Scheduler
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Evaluating,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Evaluating => write!(f, "Evaluating"),
        }
    }
}

pub struct EvaluationScheduler {
    symbols: Vec<String>,
    params: Arc<IndicatorParams>,
    window_opts: Arc<WindowOptions>,
    tick_interval: Duration,
    eval_timeout: Duration,
    source: Arc<dyn SeriesSource>,
    sink: Arc<dyn OutputSink>,
    state: RwLock<SchedulerState>,
    ticks_completed: AtomicU64,
    last_report: RwLock<Option<TickReport>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Marks a symbol as being evaluated; cleared when the blocking task ends,
/// including by panic.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    symbol: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<String>>>, symbol: &str) -> Option<Self> {
        if !in_flight.lock().insert(symbol.to_string()) {
            return None;
        }
        Some(Self {
            in_flight: Arc::clone(in_flight),
            symbol: symbol.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.symbol);
    }
}

impl EvaluationScheduler {
    /// Build a scheduler over the injected source and sink.
    pub fn new(
        config: &EngineConfig,
        source: Arc<dyn SeriesSource>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            symbols: config.symbols.clone(),
            params: Arc::new(config.indicators.clone()),
            window_opts: Arc::new(config.window.clone()),
            tick_interval: config.tick_interval(),
            eval_timeout: config.eval_timeout(),
            source,
            sink,
            state: RwLock::new(SchedulerState::Idle),
            ticks_completed: AtomicU64::new(0),
            last_report: RwLock::new(None),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.read()
    }

    pub fn ticks_completed(&self) -> u64 {
        self.ticks_completed.load(Ordering::SeqCst)
    }

    pub fn last_report(&self) -> Option<TickReport> {
        self.last_report.read().clone()
    }

    /// Run the loop until `shutdown` flips to `true` (or its sender drops).
    ///
    /// The first tick fires one interval after start. Shutdown is only
    /// observed while Idle; an in-flight tick always completes.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.tick_interval.as_millis() as u64,
            timeout_ms = self.eval_timeout.as_millis() as u64,
            symbols = ?self.symbols,
            "evaluation scheduler started"
        );

        let start = tokio::time::Instant::now() + self.tick_interval;
        let mut ticker = interval_at(start, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

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

            let report = self.run_tick().await;
            if Duration::from_millis(report.duration_ms) >= self.tick_interval {
                warn!(
                    tick = report.tick,
                    duration_ms = report.duration_ms,
                    interval_ms = self.tick_interval.as_millis() as u64,
                    "tick overran its interval — next tick delayed"
                );
            }
        }

        info!(ticks = self.ticks_completed(), "evaluation scheduler stopped");
    }

    /// Evaluate every tracked symbol once and append the resulting rows.
    pub async fn run_tick(&self) -> TickReport {
        *self.state.write() = SchedulerState::Evaluating;
        let tick = self.ticks_completed.load(Ordering::SeqCst) + 1;
        let started_at = Utc::now();
        let started = Instant::now();

        let outcomes = join_all(
            self.symbols
                .iter()
                .map(|symbol| self.evaluate_with_timeout(symbol.clone())),
        )
        .await;

        let mut emitted = Vec::new();
        let mut skipped = Vec::new();
        let mut failures = Vec::new();
        let mut max_lag_ms: Option<i64> = None;

        for (symbol, outcome) in outcomes {
            let result = match outcome {
                Ok(Some(evaluation)) => self.deliver(evaluation),
                Ok(None) => {
                    debug!(symbol = %symbol, "no bars yet — skipped");
                    skipped.push(symbol);
                    continue;
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(lag_ms) => {
                    max_lag_ms = Some(max_lag_ms.map_or(lag_ms, |m| m.max(lag_ms)));
                    emitted.push(symbol);
                }
                Err(e) => {
                    match &e {
                        EngineError::Panicked { .. } => {
                            error!(symbol = %e.symbol(), kind = e.kind(), error = %e, "symbol evaluation failed")
                        }
                        _ => warn!(symbol = %e.symbol(), kind = e.kind(), error = %e, "symbol evaluation failed"),
                    }
                    failures.push(SymbolFailure::from(&e));
                }
            }
        }

        let report = TickReport {
            tick,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            emitted,
            skipped,
            failures,
            max_lag_ms,
        };

        info!(
            tick = report.tick,
            emitted = report.emitted.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            duration_ms = report.duration_ms,
            "tick complete"
        );

        self.ticks_completed.store(tick, Ordering::SeqCst);
        *self.last_report.write() = Some(report.clone());
        *self.state.write() = SchedulerState::Idle;
        report
    }

    /// Append one evaluation's row; returns the processing lag in ms.
    fn deliver(&self, evaluation: Evaluation) -> Result<i64, EngineError> {
        let Evaluation { row, notices } = evaluation;
        let symbol = row.symbol.clone();
        for notice in &notices {
            debug!(symbol = %symbol, notice = %notice, "evaluation notice");
        }

        let lag_ms = (Utc::now() - row.timestamp).num_milliseconds();
        debug!(
            symbol = %symbol,
            close = row.close,
            rsi = ?row.rsi_14,
            macd = ?row.macd,
            macd_histogram = ?row.macd_histogram,
            defined = row.defined_indicators(),
            lag_ms,
            "indicator row ready"
        );

        self.sink
            .append(row)
            .map_err(|e| EngineError::SinkUnavailable {
                symbol,
                reason: format!("{e:#}"),
            })?;
        Ok(lag_ms)
    }

    async fn evaluate_with_timeout(
        &self,
        symbol: String,
    ) -> (String, Result<Option<Evaluation>, EngineError>) {
        let source = Arc::clone(&self.source);
        let params = Arc::clone(&self.params);
        let window_opts = Arc::clone(&self.window_opts);
        let sym = symbol.clone();

        let Some(guard) = InFlightGuard::acquire(&self.in_flight, &symbol) else {
            return (symbol.clone(), Err(EngineError::Busy { symbol }));
        };

        let handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            evaluate_symbol(source.as_ref(), &sym, &params, &window_opts)
        });

        let result = match tokio::time::timeout(self.eval_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(EngineError::Panicked {
                symbol: symbol.clone(),
                reason: join_error_reason(join_err),
            }),
            Err(_) => Err(EngineError::Timeout {
                symbol: symbol.clone(),
                timeout_ms: self.eval_timeout.as_millis() as u64,
            }),
        };

        (symbol, result)
    }
}

fn join_error_reason(err: JoinError) -> String {
    if err.is_cancelled() {
        return "task cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(msg) = payload.downcast_ref::<&str>() {
                (*msg).to_string()
            } else if let Some(msg) = payload.downcast_ref::<String>() {
                msg.clone()
            } else {
                "unknown panic payload".to_string()
            }
        }
        Err(err) => err.to_string(),
    }
}
