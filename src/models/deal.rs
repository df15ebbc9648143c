use super::product::{Market, ProductObservation};
use super::tier::{DealTier, TierBand};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who stores and ships the goods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentMode {
    MerchantFulfilled,
    NetworkFulfilled,
}

impl FulfillmentMode {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "merchant" | "merchant_fulfilled" | "mfn" => Ok(FulfillmentMode::MerchantFulfilled),
            "network" | "network_fulfilled" | "fba" => Ok(FulfillmentMode::NetworkFulfilled),
            _ => Err(format!("Invalid fulfillment mode: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentMode::MerchantFulfilled => "merchant_fulfilled",
            FulfillmentMode::NetworkFulfilled => "network_fulfilled",
        }
    }
}

/// Itemized selling costs. `total` is always the sum of the five components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeBreakdown {
    referral_fee: Decimal,
    fulfillment_fee: Decimal,
    storage_fee: Decimal,
    tax: Decimal,
    shipping_cost: Decimal,
    total: Decimal,
}

impl FeeBreakdown {
    pub fn new(
        referral_fee: Decimal,
        fulfillment_fee: Decimal,
        storage_fee: Decimal,
        tax: Decimal,
        shipping_cost: Decimal,
    ) -> AppResult<Self> {
        let total = [fulfillment_fee, storage_fee, tax, shipping_cost]
            .into_iter()
            .try_fold(referral_fee, |sum, component| sum.checked_add(component))
            .ok_or_else(|| AppError::overflow("fee total"))?;

        Ok(Self {
            referral_fee,
            fulfillment_fee,
            storage_fee,
            tax,
            shipping_cost,
            total,
        })
    }

    pub fn referral_fee(&self) -> Decimal {
        self.referral_fee
    }

    pub fn fulfillment_fee(&self) -> Decimal {
        self.fulfillment_fee
    }

    pub fn storage_fee(&self) -> Decimal {
        self.storage_fee
    }

    pub fn tax(&self) -> Decimal {
        self.tax
    }

    pub fn shipping_cost(&self) -> Decimal {
        self.shipping_cost
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn total_without_tax(&self) -> Decimal {
        self.total - self.tax
    }
}

/// Profitability figures derived from sale price, cost price and fees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DealMetrics {
    sale_price: Decimal,
    cost_price: Decimal,
    total_fees: Decimal,
    profit: Decimal,
    margin_pct: Decimal,
    roi_pct: Decimal,
}

impl DealMetrics {
    /// Margin is 0 for a non-positive sale price, ROI is 0 for a non-positive cost price.
    /// Results outside the decimal range are an error, never a panic.
    pub fn compute(sale_price: Decimal, cost_price: Decimal, total_fees: Decimal) -> AppResult<Self> {
        let profit = sale_price
            .checked_sub(cost_price)
            .and_then(|p| p.checked_sub(total_fees))
            .ok_or_else(|| AppError::overflow("profit"))?;

        let margin_pct = percent_of(profit, sale_price).ok_or_else(|| AppError::overflow("margin"))?;
        let roi_pct = percent_of(profit, cost_price).ok_or_else(|| AppError::overflow("roi"))?;

        Ok(Self {
            sale_price,
            cost_price,
            total_fees,
            profit,
            margin_pct,
            roi_pct,
        })
    }

    pub fn sale_price(&self) -> Decimal {
        self.sale_price
    }

    pub fn cost_price(&self) -> Decimal {
        self.cost_price
    }

    pub fn total_fees(&self) -> Decimal {
        self.total_fees
    }

    pub fn profit(&self) -> Decimal {
        self.profit
    }

    pub fn margin_pct(&self) -> Decimal {
        self.margin_pct
    }

    pub fn roi_pct(&self) -> Decimal {
        self.roi_pct
    }
}

/// `part / base * 100`, zero when the base is not positive, `None` on overflow
fn percent_of(part: Decimal, base: Decimal) -> Option<Decimal> {
    if base <= Decimal::ZERO {
        return Some(Decimal::ZERO);
    }
    part.checked_div(base)?.checked_mul(Decimal::ONE_HUNDRED)
}

/// Why a deal did not reach the lowest tier band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DisqualificationReason {
    Unprofitable { profit: Decimal },
    MarginBelowMinimum { margin: Decimal, minimum: Decimal },
    MarginAboveMaximum { margin: Decimal, maximum: Decimal },
    RoiBelowMinimum { roi: Decimal, minimum: Decimal },
    RoiAboveMaximum { roi: Decimal, maximum: Decimal },
}

/// A costed, classified product observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deal {
    pub id: Uuid,
    pub product: ProductObservation,
    pub metrics: DealMetrics,
    pub fees: FeeBreakdown,
    pub tier: DealTier,
    pub qualifies: bool,
    pub fulfillment_mode: FulfillmentMode,
    pub detected_at: DateTime<Utc>,
}

impl Deal {
    pub fn item_id(&self) -> &str {
        &self.product.item_id
    }

    pub fn market(&self) -> Market {
        self.product.market
    }

    /// Reasons measured against the lowest configured band. Empty for qualifying deals.
    pub fn disqualification_reasons(&self, lowest: &TierBand) -> Vec<DisqualificationReason> {
        if self.qualifies {
            return Vec::new();
        }

        let margin = self.metrics.margin_pct();
        let roi = self.metrics.roi_pct();
        let mut reasons = Vec::new();

        if self.metrics.profit() <= Decimal::ZERO {
            reasons.push(DisqualificationReason::Unprofitable {
                profit: self.metrics.profit(),
            });
        }
        if margin < lowest.min_margin {
            reasons.push(DisqualificationReason::MarginBelowMinimum {
                margin,
                minimum: lowest.min_margin,
            });
        }
        if let Some(maximum) = lowest.max_margin.filter(|max| margin > *max) {
            reasons.push(DisqualificationReason::MarginAboveMaximum { margin, maximum });
        }
        if roi < lowest.min_roi {
            reasons.push(DisqualificationReason::RoiBelowMinimum {
                roi,
                minimum: lowest.min_roi,
            });
        }
        if let Some(maximum) = lowest.max_roi.filter(|max| roi > *max) {
            reasons.push(DisqualificationReason::RoiAboveMaximum { roi, maximum });
        }

        reasons
    }
}
