use super::product::Market;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One recorded price observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub item_id: String,
    pub market: Market,
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Emitted when an observed price differs from the last known price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChange {
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub delta: Decimal,
    pub delta_pct: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl PriceChange {
    /// `delta_pct` is 0 when the old price is not positive.
    /// Both figures saturate at the decimal range instead of overflowing.
    pub fn between(old_price: Decimal, new_price: Decimal, observed_at: DateTime<Utc>) -> Self {
        let delta = new_price.saturating_sub(old_price);
        let delta_pct = if old_price <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            let bound = if delta.is_sign_negative() { Decimal::MIN } else { Decimal::MAX };
            delta
                .checked_div(old_price)
                .map_or(bound, |ratio| ratio.saturating_mul(Decimal::ONE_HUNDRED))
        };

        Self {
            old_price,
            new_price,
            delta,
            delta_pct,
            observed_at,
        }
    }

    pub fn is_drop(&self) -> bool {
        self.delta < Decimal::ZERO
    }
}

/// Aggregates over a time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceStats {
    pub average: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub samples: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_change_percentages() {
        let change = PriceChange::between(dec!(80), dec!(60), Utc::now());
        assert_eq!(change.delta, dec!(-20));
        assert_eq!(change.delta_pct, dec!(-25));
        assert!(change.is_drop());
    }

    #[test]
    fn test_change_from_tiny_price_saturates() {
        let change = PriceChange::between(Decimal::new(1, 28), dec!(100), Utc::now());
        assert_eq!(change.delta_pct, Decimal::MAX);
        assert!(!change.is_drop());

        let change = PriceChange::between(dec!(10), Decimal::MIN, Utc::now());
        assert_eq!(change.delta, Decimal::MIN);
        assert_eq!(change.delta_pct, Decimal::MIN);
    }
}
