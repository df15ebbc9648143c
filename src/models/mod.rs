//! Domain models for the deal engine.
//!
//! Listings, costed deals, tier bands, price history and scheduled tasks.

pub mod deal;
pub mod price_history;
pub mod product;
pub mod task;
pub mod tier;

// Re-export all models for convenient access
pub use deal::{Deal, DealMetrics, DisqualificationReason, FeeBreakdown, FulfillmentMode};
pub use price_history::{PriceChange, PriceHistoryEntry, PriceStats};
pub use product::{Availability, Dimensions, Market, ProductObservation};
pub use task::{Task, TaskKind, TaskResult, TaskSpec, TaskStatus, DEFAULT_MAX_RETRIES};
pub use tier::{Classification, DealTier, TierBand, TierBands};
