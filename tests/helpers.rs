#![allow(dead_code)]

use async_trait::async_trait;
use dealhound_backend::config::SchedulerConfig;
use dealhound_backend::models::*;
use dealhound_backend::services::*;
use dealhound_backend::settings::{EngineSettings, SettingsHandle};
use dealhound_backend::{AppResult, AppState, Scheduler};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory acquisition service with scripted failures
#[derive(Default)]
pub struct MockSource {
    prices: Mutex<HashMap<(String, Market), Decimal>>,
    categories: Mutex<HashMap<String, Vec<String>>>,
    failures: Mutex<HashMap<String, (AcquisitionErrorCode, u32)>>,
    calls: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, item_id: &str, market: Market, price: Decimal) {
        self.prices.lock().insert((item_id.to_string(), market), price);
    }

    pub fn set_category(&self, category_ref: &str, item_ids: &[&str]) {
        self.categories.lock().insert(
            category_ref.to_string(),
            item_ids.iter().map(|id| id.to_string()).collect(),
        );
    }

    /// Make the next `times` fetches of `target` fail with `code`
    pub fn fail_next(&self, target: &str, code: AcquisitionErrorCode, times: u32) {
        self.failures.lock().insert(target.to_string(), (code, times));
    }

    pub fn calls_for(&self, target: &str) -> usize {
        self.calls.lock().iter().filter(|t| t.as_str() == target).count()
    }

    fn scripted_failure(&self, target: &str) -> Option<AcquisitionErrorCode> {
        self.calls.lock().push(target.to_string());
        let mut failures = self.failures.lock();
        let (code, remaining) = failures.get_mut(target)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(*code)
    }
}

#[async_trait]
impl ProductSource for MockSource {
    async fn fetch_product(&self, item_id: &str, market: Market) -> FetchOutcome<ProductObservation> {
        if let Some(code) = self.scripted_failure(item_id) {
            return FetchOutcome::failure(code, format!("scripted failure for {}", item_id));
        }
        match self.prices.lock().get(&(item_id.to_string(), market)) {
            Some(price) => FetchOutcome::success(sample_product(item_id, market, *price)),
            None => FetchOutcome::failure(AcquisitionErrorCode::NotFound, format!("{} not listed", item_id)),
        }
    }

    async fn fetch_category(&self, category_ref: &str, market: Market, max_items: usize) -> FetchOutcome<CategoryListing> {
        if let Some(code) = self.scripted_failure(category_ref) {
            return FetchOutcome::failure(code, format!("scripted failure for {}", category_ref));
        }
        match self.categories.lock().get(category_ref) {
            Some(ids) => FetchOutcome::success(CategoryListing {
                item_ids: ids.iter().take(max_items).cloned().collect(),
                market,
                category_ref: category_ref.to_string(),
                total: ids.len(),
            }),
            None => FetchOutcome::failure(AcquisitionErrorCode::NotFound, "unknown category"),
        }
    }
}

/// Notifier that keeps every deal it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    deals: Mutex<Vec<Deal>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deals(&self) -> Vec<Deal> {
        self.deals.lock().clone()
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.deals.lock().iter().map(|d| d.item_id().to_string()).collect()
    }
}

#[async_trait]
impl DealNotifier for RecordingNotifier {
    async fn notify(&self, deal: &Deal) -> AppResult<()> {
        self.deals.lock().push(deal.clone());
        Ok(())
    }
}

/// Fully wired engine over the mock collaborators
pub struct TestEngine {
    pub state: AppState,
    pub source: Arc<MockSource>,
    pub notifier: Arc<RecordingNotifier>,
    pub scheduler: Scheduler,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        let state = AppState::new(SettingsHandle::new(EngineSettings::default()));
        let source = Arc::new(MockSource::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = Scheduler::new(
            state.queue.clone(),
            source.clone(),
            state.analyzer.clone(),
            state.tracker.clone(),
            notifier.clone(),
        )
        .with_config(config);

        Self {
            state,
            source,
            notifier,
            scheduler,
        }
    }

    /// Run cycles until the queue has nothing pending, bounded by `max_cycles`
    pub async fn drain(&self, max_cycles: usize) -> usize {
        let mut cycles = 0;
        while !self.state.queue.is_empty() && cycles < max_cycles {
            self.scheduler.run_cycle().await;
            cycles += 1;
        }
        cycles
    }
}

/// Observation with realistic optional fields filled in
pub fn sample_product(item_id: &str, market: Market, price: Decimal) -> ProductObservation {
    let mut product = ProductObservation::new(item_id, market, format!("Test listing {}", item_id), price);
    product.rating = Some(4.2);
    product.review_count = 128;
    product.popularity_rank = Some(1500);
    product.url = format!("https://shop.example/{}/dp/{}", market.as_str(), item_id);
    product
}

/// Analyze a single listing against default settings
pub fn sample_deal(item_id: &str, market: Market, price: Decimal, cost: Decimal, mode: FulfillmentMode) -> Deal {
    DealAnalyzer::new(SettingsHandle::default())
        .analyze(sample_product(item_id, market, price), &AnalysisOptions::new(cost, mode))
        .expect("sample deal analyzes")
}
