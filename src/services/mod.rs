pub mod acquisition;
pub mod analyzer;
pub mod classifier;
pub mod deal_filter;
pub mod deal_tracker;
pub mod notifier;
pub mod price_history;
pub mod task_queue;

pub use acquisition::{
    AcquisitionError, AcquisitionErrorCode, CategoryListing, FetchOutcome, HttpProductSource, ProductSource,
};
pub use analyzer::{AnalysisOptions, DealAnalyzer};
pub use classifier::DealClassifier;
pub use deal_filter::{by_market, by_tier, sort_deals, summarize, top_n, DealFilter, DealSummary, SortDirection, SortKey};
pub use deal_tracker::{DealTracker, TrackOutcome};
pub use notifier::{DealAlert, DealNotifier, LogNotifier, WebhookNotifier};
pub use price_history::{default_stats_window, PriceHistoryTracker, MAX_HISTORY_ENTRIES};
pub use task_queue::{QueueStats, TaskQueue};
