use crate::models::{Market, PriceChange, PriceHistoryEntry, PriceStats};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Per-key series cap; oldest entries are evicted first
pub const MAX_HISTORY_ENTRIES: usize = 1000;

/// Window used by the windowed aggregates when callers have no preference
pub fn default_stats_window() -> Duration {
    Duration::days(30)
}

/// Arithmetic mean. When the plain sum leaves the decimal range each value is
/// divided first. `None` for an empty slice.
pub(crate) fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let count = Decimal::from(values.len());
    match values.iter().try_fold(Decimal::ZERO, |sum, v| sum.checked_add(*v)) {
        Some(sum) => sum.checked_div(count),
        None => values
            .iter()
            .try_fold(Decimal::ZERO, |sum, v| sum.checked_add(v.checked_div(count)?)),
    }
}

type SeriesKey = (String, Market);

#[derive(Default)]
struct HistoryState {
    series: HashMap<SeriesKey, VecDeque<PriceHistoryEntry>>,
    last_prices: HashMap<SeriesKey, Decimal>,
}

/// Append-only price series per (item, market) with a last-price cache
pub struct PriceHistoryTracker {
    state: Mutex<HistoryState>,
    capacity: usize,
}

impl PriceHistoryTracker {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(HistoryState::default()),
            capacity: capacity.max(1),
        }
    }

    fn key(item_id: &str, market: Market) -> SeriesKey {
        (item_id.to_string(), market)
    }

    /// Append an observation. Returns a change event only when a previous price
    /// exists and differs from the new one.
    pub fn record_observation(
        &self,
        item_id: &str,
        market: Market,
        price: Decimal,
        observed_at: DateTime<Utc>,
    ) -> Option<PriceChange> {
        let key = Self::key(item_id, market);
        let mut state = self.state.lock();

        let series = state.series.entry(key.clone()).or_default();
        series.push_back(PriceHistoryEntry {
            item_id: item_id.to_string(),
            market,
            price,
            observed_at,
        });
        while series.len() > self.capacity {
            series.pop_front();
        }

        let previous = state.last_prices.insert(key, price);
        let change = previous
            .filter(|old| *old != price)
            .map(|old| PriceChange::between(old, price, observed_at));

        if let Some(change) = &change {
            debug!(
                item_id,
                market = %market,
                old = %change.old_price,
                new = %change.new_price,
                "Price changed"
            );
        }
        change
    }

    /// Full series, or only the most recent `limit` entries, oldest first
    pub fn history(&self, item_id: &str, market: Market, limit: Option<usize>) -> Vec<PriceHistoryEntry> {
        let state = self.state.lock();
        let Some(series) = state.series.get(&Self::key(item_id, market)) else {
            return Vec::new();
        };

        let skip = limit.map_or(0, |n| series.len().saturating_sub(n));
        series.iter().skip(skip).cloned().collect()
    }

    pub fn last_price(&self, item_id: &str, market: Market) -> Option<Decimal> {
        self.state.lock().last_prices.get(&Self::key(item_id, market)).copied()
    }

    /// Average/min/max over entries observed within `window` of now.
    /// `None` when nothing falls inside the window.
    pub fn window_stats(&self, item_id: &str, market: Market, window: Duration) -> Option<PriceStats> {
        self.window_stats_at(item_id, market, window, Utc::now())
    }

    pub fn window_stats_at(
        &self,
        item_id: &str,
        market: Market,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<PriceStats> {
        let cutoff = now - window;
        let state = self.state.lock();
        let series = state.series.get(&Self::key(item_id, market))?;

        let prices: Vec<Decimal> = series
            .iter()
            .filter(|entry| entry.observed_at >= cutoff)
            .map(|entry| entry.price)
            .collect();

        let min = prices.iter().min().copied()?;
        let max = prices.iter().max().copied()?;

        Some(PriceStats {
            average: mean(&prices)?,
            min,
            max,
            samples: prices.len(),
        })
    }

    pub fn average_price(&self, item_id: &str, market: Market, window: Duration) -> Option<Decimal> {
        self.window_stats(item_id, market, window).map(|s| s.average)
    }

    pub fn min_price(&self, item_id: &str, market: Market, window: Duration) -> Option<Decimal> {
        self.window_stats(item_id, market, window).map(|s| s.min)
    }

    pub fn max_price(&self, item_id: &str, market: Market, window: Duration) -> Option<Decimal> {
        self.window_stats(item_id, market, window).map(|s| s.max)
    }

    /// Drop series and cached price together. Returns whether the key existed.
    pub fn clear(&self, item_id: &str, market: Market) -> bool {
        let key = Self::key(item_id, market);
        let mut state = self.state.lock();
        let had_series = state.series.remove(&key).is_some();
        let had_price = state.last_prices.remove(&key).is_some();
        had_series || had_price
    }

    pub fn tracked_keys(&self) -> Vec<(String, Market)> {
        let mut keys: Vec<_> = self.state.lock().series.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for PriceHistoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_change_events() {
        let tracker = PriceHistoryTracker::new();
        let t0 = Utc::now() - Duration::hours(3);

        assert!(tracker.record_observation("B1", Market::De, dec!(100), t0).is_none());

        let drop = tracker
            .record_observation("B1", Market::De, dec!(90), t0 + Duration::hours(1))
            .unwrap();
        assert_eq!(drop.delta, dec!(-10));
        assert_eq!(drop.delta_pct, dec!(-10));
        assert!(drop.is_drop());

        let rise = tracker
            .record_observation("B1", Market::De, dec!(95), t0 + Duration::hours(2))
            .unwrap();
        assert_eq!(rise.delta, dec!(5));
        assert_eq!(rise.delta_pct.round_dp(3), dec!(5.556));

        let stats = tracker.window_stats("B1", Market::De, default_stats_window()).unwrap();
        assert_eq!(stats.average, dec!(95));
        assert_eq!(stats.min, dec!(90));
        assert_eq!(stats.max, dec!(100));
        assert_eq!(stats.samples, 3);
    }

    #[test]
    fn test_identical_price_emits_nothing() {
        let tracker = PriceHistoryTracker::new();
        let now = Utc::now();
        tracker.record_observation("B2", Market::Fr, dec!(12.50), now);
        assert!(tracker.record_observation("B2", Market::Fr, dec!(12.50), now).is_none());
        assert!(tracker.record_observation("B2", Market::Fr, dec!(12.500), now).is_none());
        assert_eq!(tracker.history("B2", Market::Fr, None).len(), 3);
    }

    #[test]
    fn test_zero_old_price_gives_zero_pct() {
        let tracker = PriceHistoryTracker::new();
        let now = Utc::now();
        tracker.record_observation("FREE", Market::Es, Decimal::ZERO, now);
        let change = tracker.record_observation("FREE", Market::Es, dec!(3), now).unwrap();
        assert_eq!(change.delta_pct, Decimal::ZERO);
        assert_eq!(change.delta, dec!(3));
    }

    #[test]
    fn test_stats_over_prices_near_the_decimal_limit() {
        let tracker = PriceHistoryTracker::new();
        let huge = dec!(50000000000000000000000000000);
        let t0 = Utc::now();
        tracker.record_observation("B0BIG", Market::It, huge, t0);
        tracker.record_observation("B0BIG", Market::It, huge, t0);

        let stats = tracker.window_stats("B0BIG", Market::It, default_stats_window()).unwrap();
        assert_eq!(stats.average, huge);
        assert_eq!(stats.samples, 2);
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[dec!(90), dec!(100), dec!(95)]), Some(dec!(95)));
    }

    #[test]
    fn test_keys_are_per_market() {
        let tracker = PriceHistoryTracker::new();
        let now = Utc::now();
        tracker.record_observation("B3", Market::De, dec!(10), now);
        assert!(tracker.record_observation("B3", Market::Uk, dec!(20), now).is_none());
        assert_eq!(tracker.last_price("B3", Market::De), Some(dec!(10)));
        assert_eq!(tracker.tracked_keys().len(), 2);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let tracker = PriceHistoryTracker::with_capacity(3);
        let now = Utc::now();
        for i in 1..=5 {
            tracker.record_observation("B4", Market::It, Decimal::from(i), now);
        }
        let prices: Vec<Decimal> = tracker
            .history("B4", Market::It, None)
            .into_iter()
            .map(|e| e.price)
            .collect();
        assert_eq!(prices, vec![dec!(3), dec!(4), dec!(5)]);
        assert_eq!(tracker.history("B4", Market::It, Some(2)).len(), 2);
        assert_eq!(tracker.history("B4", Market::It, Some(2))[0].price, dec!(4));
    }

    #[test]
    fn test_stale_series_has_no_stats() {
        let tracker = PriceHistoryTracker::new();
        let old = Utc::now() - Duration::days(45);
        tracker.record_observation("B5", Market::De, dec!(7), old);

        assert!(tracker.window_stats("B5", Market::De, default_stats_window()).is_none());
        assert!(tracker.average_price("missing", Market::De, default_stats_window()).is_none());
        assert_eq!(tracker.max_price("B5", Market::De, Duration::days(60)), Some(dec!(7)));
    }

    #[test]
    fn test_clear_removes_series_and_cache() {
        let tracker = PriceHistoryTracker::new();
        let now = Utc::now();
        tracker.record_observation("B6", Market::De, dec!(1), now);
        assert!(tracker.clear("B6", Market::De));
        assert!(tracker.last_price("B6", Market::De).is_none());
        assert!(tracker.history("B6", Market::De, None).is_empty());
        assert!(tracker.record_observation("B6", Market::De, dec!(2), now).is_none());
        assert!(!tracker.clear("nothing", Market::De));
    }
}
