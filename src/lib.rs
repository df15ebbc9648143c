//! Dealhound Backend Library
//!
//! This module exposes the engine components for use by tests and other consumers.

pub mod config;
pub mod error;
pub mod fees;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod settings;

// Re-export commonly used types
pub use config::{AppConfig, SchedulerConfig};
pub use error::{AppError, AppResult};
pub use scheduler::{CycleReport, Scheduler, SchedulerStats};
pub use settings::{EngineSettings, SettingsHandle};

use services::{DealAnalyzer, DealTracker, PriceHistoryTracker, TaskQueue};
use std::sync::Arc;

/// Engine state shared between the scheduler and its callers
#[derive(Clone)]
pub struct AppState {
    pub settings: SettingsHandle,
    pub queue: Arc<TaskQueue>,
    pub history: Arc<PriceHistoryTracker>,
    pub tracker: Arc<DealTracker>,
    pub analyzer: DealAnalyzer,
}

impl AppState {
    /// Create a new AppState around the given settings
    pub fn new(settings: SettingsHandle) -> Self {
        let history = Arc::new(PriceHistoryTracker::new());

        Self {
            queue: Arc::new(TaskQueue::new()),
            tracker: Arc::new(DealTracker::new(history.clone())),
            analyzer: DealAnalyzer::new(settings.clone()),
            history,
            settings,
        }
    }
}
