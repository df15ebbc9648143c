use super::schedule::{default_weight_kg, FeeSchedule, SizeTier};
use crate::error::{AppError, AppResult};
use crate::models::{Dimensions, FeeBreakdown, FulfillmentMode, Market};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Everything the fee computation depends on
#[derive(Debug, Clone, Copy)]
pub struct FeeInput<'a> {
    pub sale_price: Decimal,
    pub category: Option<&'a str>,
    pub fulfillment_mode: FulfillmentMode,
    pub market: Market,
    pub weight_kg: Option<Decimal>,
    pub dimensions: Option<&'a Dimensions>,
    pub restricted_media: bool,
}

impl<'a> FeeInput<'a> {
    pub fn new(sale_price: Decimal, fulfillment_mode: FulfillmentMode, market: Market) -> Self {
        Self {
            sale_price,
            category: None,
            fulfillment_mode,
            market,
            weight_kg: None,
            dimensions: None,
            restricted_media: false,
        }
    }

    fn weight(&self) -> Decimal {
        self.weight_kg.unwrap_or_else(default_weight_kg)
    }

    /// Size band the package is billed at under network fulfillment
    pub fn size_tier(&self) -> SizeTier {
        SizeTier::classify(self.dimensions, self.weight())
    }
}

fn cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn checked(value: Option<Decimal>, what: &str) -> AppResult<Decimal> {
    value.ok_or_else(|| AppError::overflow(what))
}

impl FeeSchedule {
    /// Itemized fees for one sale. Each component is rounded to cents before summing.
    pub fn compute_fees(&self, input: &FeeInput<'_>) -> AppResult<FeeBreakdown> {
        let market_fees = self.market(input.market);
        // percentage fees never go negative on a bogus price
        let price = input.sale_price.max(Decimal::ZERO);

        let mut referral_fee = checked(price.checked_mul(self.referral_rate(input.category)), "referral fee")?;
        if input.restricted_media {
            referral_fee = checked(referral_fee.checked_add(market_fees.closing_fee), "referral fee")?;
        }

        let weight = input.weight();
        let (fulfillment_fee, storage_fee, shipping_cost) = match input.fulfillment_mode {
            FulfillmentMode::NetworkFulfilled => {
                let rates = market_fees.network;
                let surcharge = if weight > dec!(1) {
                    checked((weight - dec!(1)).checked_mul(rates.per_kg_surcharge), "weight surcharge")?
                } else {
                    Decimal::ZERO
                };
                let fulfillment = checked(rates.base_fee(input.size_tier()).checked_add(surcharge), "fulfillment fee")?;
                let storage = match input.dimensions {
                    Some(dims) => checked(
                        dims.volume_cm3()
                            .and_then(|cm3| cm3.checked_div(dec!(1000000)))
                            .and_then(|m3| m3.checked_mul(rates.storage_rate_per_m3)),
                        "storage fee",
                    )?,
                    None => rates.storage_fallback,
                };
                (fulfillment, storage, Decimal::ZERO)
            }
            FulfillmentMode::MerchantFulfilled => (
                Decimal::ZERO,
                Decimal::ZERO,
                market_fees.merchant_shipping.for_weight(weight),
            ),
        };

        let tax = checked(price.checked_mul(market_fees.tax_rate), "tax")?;

        FeeBreakdown::new(
            cents(referral_fee),
            cents(fulfillment_fee),
            cents(storage_fee),
            cents(tax),
            cents(shipping_cost),
        )
    }
}
