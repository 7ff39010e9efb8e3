// =============================================================================
// Engine error taxonomy
// =============================================================================
//
// `EngineError` is a per-symbol failure: the symbol gets no row this tick and
// the scheduler moves on. `Notice` is non-fatal: the row is still emitted.

use thiserror::Error;

/// A failure evaluating one symbol during one tick.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The bar source could not produce a series for the symbol.
    #[error("source unavailable for {symbol}: {reason}")]
    SourceUnavailable { symbol: String, reason: String },

    /// The series violated the store contract (ordering, foreign symbol).
    #[error("malformed series for {symbol}: {reason}")]
    MalformedData { symbol: String, reason: String },

    /// The sink rejected the row.
    #[error("sink unavailable for {symbol}: {reason}")]
    SinkUnavailable { symbol: String, reason: String },

    /// Evaluation exceeded the per-symbol budget.
    #[error("evaluation of {symbol} timed out after {timeout_ms}ms")]
    Timeout { symbol: String, timeout_ms: u64 },

    /// A previous evaluation of the symbol timed out and is still running.
    #[error("evaluation of {symbol} skipped: previous evaluation still running")]
    Busy { symbol: String },

    /// Evaluation panicked; the panic was contained to this symbol.
    #[error("evaluation of {symbol} panicked: {reason}")]
    Panicked { symbol: String, reason: String },
}

impl EngineError {
    /// The symbol this failure belongs to.
    pub fn symbol(&self) -> &str {
        match self {
            Self::SourceUnavailable { symbol, .. }
            | Self::MalformedData { symbol, .. }
            | Self::SinkUnavailable { symbol, .. }
            | Self::Timeout { symbol, .. }
            | Self::Busy { symbol }
            | Self::Panicked { symbol, .. } => symbol,
        }
    }

    /// Short machine-readable kind, used in logs and tick reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::MalformedData { .. } => "malformed_data",
            Self::SinkUnavailable { .. } => "sink_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Busy { .. } => "busy",
            Self::Panicked { .. } => "panicked",
        }
    }
}

/// A non-fatal condition observed while evaluating a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Fewer bars than the longest indicator period; some fields are undefined.
    InsufficientData { required: usize, available: usize },
    /// A zero denominator was replaced by its documented sentinel.
    NumericDegenerate { indicator: &'static str },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData {
                required,
                available,
            } => write!(f, "insufficient data: {available} bars < {required}"),
            Self::NumericDegenerate { indicator } => {
                write!(f, "degenerate {indicator}: sentinel used")
            }
        }
    }
}
