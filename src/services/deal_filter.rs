//! Side-effect-free filtering, ranking and summaries over collections of deals.

use crate::error::{AppError, AppResult};
use crate::models::{Deal, DealTier, Market};
use crate::services::price_history::mean;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Conjunction of optional criteria; unset criteria accept everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealFilter {
    pub min_margin: Option<Decimal>,
    pub min_roi: Option<Decimal>,
    pub min_profit: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_rating: Option<f64>,
    /// 0 means unbounded
    #[serde(default)]
    pub max_popularity_rank: u32,
    pub allowed_markets: Option<Vec<Market>>,
}

impl DealFilter {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(max_price) = self.max_price {
            if max_price < Decimal::ZERO {
                return Err(AppError::Validation(format!("max_price must not be negative, got {}", max_price)));
            }
        }
        if let Some(rating) = self.min_rating {
            if !(0.0..=5.0).contains(&rating) {
                return Err(AppError::Validation(format!("min_rating must be within 0..=5, got {}", rating)));
            }
        }
        if let Some(markets) = &self.allowed_markets {
            if markets.is_empty() {
                return Err(AppError::Validation("allowed_markets must not be empty".to_string()));
            }
        }
        Ok(())
    }

    /// Whether a single deal passes every set criterion
    pub fn matches(&self, deal: &Deal) -> bool {
        let metrics = &deal.metrics;
        let product = &deal.product;

        self.min_margin.map_or(true, |min| metrics.margin_pct() >= min)
            && self.min_roi.map_or(true, |min| metrics.roi_pct() >= min)
            && self.min_profit.map_or(true, |min| metrics.profit() >= min)
            && self.max_price.map_or(true, |max| product.price <= max)
            && self
                .min_rating
                .map_or(true, |min| product.rating.map_or(false, |r| r >= min))
            && (self.max_popularity_rank == 0
                || product
                    .popularity_rank
                    .map_or(false, |rank| rank <= self.max_popularity_rank))
            && self
                .allowed_markets
                .as_ref()
                .map_or(true, |markets| markets.contains(&product.market))
    }

    /// Subset of `deals` matching every criterion, input order preserved
    pub fn apply(&self, deals: &[Deal]) -> AppResult<Vec<Deal>> {
        self.validate()?;
        Ok(deals.iter().filter(|d| self.matches(d)).cloned().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Margin,
    Roi,
    Profit,
    Price,
    PopularityRank,
    Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

// Missing ranks and ratings always sort after present ones.
fn compare_optional<T, F>(a: Option<T>, b: Option<T>, direction: SortDirection, cmp: F) -> Ordering
where
    F: Fn(&T, &T) -> Ordering,
{
    match (a, b) {
        (Some(a), Some(b)) => match direction {
            SortDirection::Ascending => cmp(&a, &b),
            SortDirection::Descending => cmp(&b, &a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare(a: &Deal, b: &Deal, key: SortKey, direction: SortDirection) -> Ordering {
    let directed = |ord: Ordering| match direction {
        SortDirection::Ascending => ord,
        SortDirection::Descending => ord.reverse(),
    };

    match key {
        SortKey::Margin => directed(a.metrics.margin_pct().cmp(&b.metrics.margin_pct())),
        SortKey::Roi => directed(a.metrics.roi_pct().cmp(&b.metrics.roi_pct())),
        SortKey::Profit => directed(a.metrics.profit().cmp(&b.metrics.profit())),
        SortKey::Price => directed(a.product.price.cmp(&b.product.price)),
        SortKey::PopularityRank => {
            compare_optional(a.product.popularity_rank, b.product.popularity_rank, direction, Ord::cmp)
        }
        SortKey::Rating => compare_optional(a.product.rating, b.product.rating, direction, f64::total_cmp),
    }
}

/// Stable sort in place; equal keys keep their relative order
pub fn sort_deals(deals: &mut [Deal], key: SortKey, direction: SortDirection) {
    deals.sort_by(|a, b| compare(a, b, key, direction));
}

/// Best `n` deals by `key`. Lower is better for price and popularity rank.
pub fn top_n(deals: &[Deal], n: usize, key: SortKey) -> Vec<Deal> {
    let direction = match key {
        SortKey::Price | SortKey::PopularityRank => SortDirection::Ascending,
        _ => SortDirection::Descending,
    };
    let mut sorted = deals.to_vec();
    sort_deals(&mut sorted, key, direction);
    sorted.truncate(n);
    sorted
}

pub fn by_tier(deals: &[Deal], tier: DealTier) -> Vec<Deal> {
    deals.iter().filter(|d| d.tier == tier).cloned().collect()
}

pub fn by_market(deals: &[Deal], market: Market) -> Vec<Deal> {
    deals.iter().filter(|d| d.product.market == market).cloned().collect()
}

/// Aggregate view of a deal collection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DealSummary {
    pub total: usize,
    pub qualifying: usize,
    pub per_tier: HashMap<DealTier, usize>,
    pub best_margin: Option<Decimal>,
    pub average_roi: Option<Decimal>,
    pub total_profit: Decimal,
}

pub fn summarize(deals: &[Deal]) -> DealSummary {
    let mut summary = DealSummary {
        total: deals.len(),
        ..Default::default()
    };

    for deal in deals {
        if deal.qualifies {
            summary.qualifying += 1;
            *summary.per_tier.entry(deal.tier).or_insert(0) += 1;
        }
        let margin = deal.metrics.margin_pct();
        summary.best_margin = Some(summary.best_margin.map_or(margin, |best| best.max(margin)));
        summary.total_profit = summary.total_profit.saturating_add(deal.metrics.profit());
    }

    let rois: Vec<Decimal> = deals.iter().map(|d| d.metrics.roi_pct()).collect();
    summary.average_roi = mean(&rois);
    summary
}
