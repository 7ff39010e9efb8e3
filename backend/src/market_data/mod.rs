pub mod bar_store;
pub mod synthetic;
pub mod window;

use anyhow::Result;

// Re-export the Bar struct for convenient access (e.g. `use crate::market_data::Bar`).
pub use bar_store::{Bar, BarStore};
pub use window::SymbolWindow;

/// Read side of the bar store as seen by the evaluation engine.
///
/// `get_series` returns an owned snapshot ordered by timestamp (possibly
/// empty). Implementations must not hand out a view that later appends can
/// mutate.
pub trait SeriesSource: Send + Sync {
    fn get_series(&self, symbol: &str) -> Result<Vec<Bar>>;
}
