use crate::models::{Deal, DealTier, Market, PriceChange};
use crate::services::price_history::PriceHistoryTracker;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// What tracking a fresh deal revealed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// First deal seen for this item and market
    New,
    PriceChanged(PriceChange),
    TierChanged { from: DealTier, to: DealTier },
    Unchanged,
}

impl TrackOutcome {
    /// Qualifying deals are announced unless nothing about them moved
    pub fn should_notify(&self, deal: &Deal) -> bool {
        deal.qualifies && !matches!(self, TrackOutcome::Unchanged)
    }
}

/// Latest deal per (item, market), feeding every observation into price history
pub struct DealTracker {
    history: Arc<PriceHistoryTracker>,
    deals: Mutex<HashMap<(String, Market), Deal>>,
}

impl DealTracker {
    pub fn new(history: Arc<PriceHistoryTracker>) -> Self {
        Self {
            history,
            deals: Mutex::new(HashMap::new()),
        }
    }

    pub fn history(&self) -> &PriceHistoryTracker {
        &self.history
    }

    /// Record the deal's price and keep it as the latest deal for its key.
    /// Both happen under the deals lock, so the stored deal always carries the last recorded price.
    pub fn track(&self, deal: &Deal) -> TrackOutcome {
        let (previous, change) = {
            let mut deals = self.deals.lock();
            let change = self.history.record_observation(
                deal.item_id(),
                deal.market(),
                deal.product.price,
                deal.product.observed_at,
            );
            let previous = deals.insert((deal.item_id().to_string(), deal.market()), deal.clone());
            (previous, change)
        };

        let outcome = match (previous, change) {
            (None, _) => TrackOutcome::New,
            (Some(_), Some(change)) => TrackOutcome::PriceChanged(change),
            (Some(prev), None) if prev.tier != deal.tier || prev.qualifies != deal.qualifies => {
                TrackOutcome::TierChanged {
                    from: prev.tier,
                    to: deal.tier,
                }
            }
            (Some(_), None) => TrackOutcome::Unchanged,
        };

        if let TrackOutcome::PriceChanged(change) = &outcome {
            info!(
                item_id = deal.item_id(),
                market = %deal.market(),
                "Price moved {} -> {} ({:.2}%)",
                change.old_price,
                change.new_price,
                change.delta_pct
            );
        }
        outcome
    }

    pub fn get(&self, item_id: &str, market: Market) -> Option<Deal> {
        self.deals.lock().get(&(item_id.to_string(), market)).cloned()
    }

    /// Snapshot of all tracked deals
    pub fn all(&self) -> Vec<Deal> {
        self.deals.lock().values().cloned().collect()
    }

    /// Stop tracking a key, dropping its price history too
    pub fn remove(&self, item_id: &str, market: Market) -> Option<Deal> {
        let removed = self.deals.lock().remove(&(item_id.to_string(), market));
        self.history.clear(item_id, market);
        removed
    }

    pub fn len(&self) -> usize {
        self.deals.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FulfillmentMode, ProductObservation};
    use crate::services::analyzer::{AnalysisOptions, DealAnalyzer};
    use crate::settings::SettingsHandle;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Barrier;
    use std::thread;

    fn deal_at(analyzer: &DealAnalyzer, price: Decimal, cost: Decimal) -> Deal {
        let product = ProductObservation::new("B0TRACK", Market::De, "Tracked", price);
        analyzer
            .analyze(product, &AnalysisOptions::new(cost, FulfillmentMode::MerchantFulfilled))
            .unwrap()
    }

    #[test]
    fn test_track_outcomes() {
        let analyzer = DealAnalyzer::new(SettingsHandle::default());
        let tracker = DealTracker::new(Arc::new(PriceHistoryTracker::new()));

        let first = deal_at(&analyzer, dec!(100), dec!(20));
        assert_eq!(tracker.track(&first), TrackOutcome::New);
        assert!(TrackOutcome::New.should_notify(&first));

        let same = deal_at(&analyzer, dec!(100), dec!(20));
        let outcome = tracker.track(&same);
        assert_eq!(outcome, TrackOutcome::Unchanged);
        assert!(!outcome.should_notify(&same));

        let cheaper = deal_at(&analyzer, dec!(90), dec!(20));
        assert!(matches!(tracker.track(&cheaper), TrackOutcome::PriceChanged(c) if c.delta == dec!(-10)));

        // same price, worse cost basis: only the tier moves
        let squeezed = deal_at(&analyzer, dec!(90), dec!(60));
        assert!(matches!(tracker.track(&squeezed), TrackOutcome::TierChanged { .. }));

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.history().history("B0TRACK", Market::De, None).len(), 4);
    }

    #[test]
    fn test_remove_clears_history() {
        let analyzer = DealAnalyzer::new(SettingsHandle::default());
        let tracker = DealTracker::new(Arc::new(PriceHistoryTracker::new()));
        let deal = deal_at(&analyzer, dec!(50), dec!(10));
        tracker.track(&deal);

        assert!(tracker.remove("B0TRACK", Market::De).is_some());
        assert!(tracker.is_empty());
        assert!(tracker.history().last_price("B0TRACK", Market::De).is_none());
    }

    #[test]
    fn test_concurrent_tracking_keeps_deal_and_history_in_step() {
        let analyzer = DealAnalyzer::new(SettingsHandle::default());

        for _ in 0..20 {
            let tracker = Arc::new(DealTracker::new(Arc::new(PriceHistoryTracker::new())));
            let deals: Vec<Deal> = [dec!(100), dec!(90), dec!(95), dec!(80), dec!(100), dec!(85)]
                .into_iter()
                .map(|price| deal_at(&analyzer, price, dec!(20)))
                .collect();
            let barrier = Arc::new(Barrier::new(deals.len()));

            let handles: Vec<_> = deals
                .into_iter()
                .map(|deal| {
                    let tracker = tracker.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        tracker.track(&deal)
                    })
                })
                .collect();
            let outcomes: Vec<TrackOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            assert_eq!(outcomes.iter().filter(|o| **o == TrackOutcome::New).count(), 1);
            let stored = tracker.get("B0TRACK", Market::De).unwrap();
            assert_eq!(
                tracker.history().last_price("B0TRACK", Market::De),
                Some(stored.product.price)
            );
            assert_eq!(tracker.history().history("B0TRACK", Market::De, None).len(), 6);
        }
    }
}
