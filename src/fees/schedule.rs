use crate::models::{Dimensions, Market};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Weight assumed when a listing carries none
pub fn default_weight_kg() -> Decimal {
    dec!(0.5)
}

/// Network fulfillment package size band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeTier {
    Envelope,
    SmallParcel,
    StandardParcel,
    Oversize,
}

/// (longest, median, shortest) edge limits in cm and weight limit in kg
struct SizeLimit {
    tier: SizeTier,
    edges: [Decimal; 3],
    max_weight_kg: Decimal,
}

fn size_ladder() -> [SizeLimit; 3] {
    [
        SizeLimit {
            tier: SizeTier::Envelope,
            edges: [dec!(33), dec!(23), dec!(2.5)],
            max_weight_kg: dec!(0.46),
        },
        SizeLimit {
            tier: SizeTier::SmallParcel,
            edges: [dec!(35), dec!(25), dec!(12)],
            max_weight_kg: dec!(1),
        },
        SizeLimit {
            tier: SizeTier::StandardParcel,
            edges: [dec!(45), dec!(34), dec!(26)],
            max_weight_kg: dec!(12),
        },
    ]
}

impl SizeTier {
    /// Smallest band whose edge and weight limits both hold.
    /// Without dimensions the package is treated as a standard parcel unless it is too heavy for one.
    pub fn classify(dimensions: Option<&Dimensions>, weight_kg: Decimal) -> SizeTier {
        let ladder = size_ladder();
        let Some(dims) = dimensions else {
            return if weight_kg <= ladder[2].max_weight_kg {
                SizeTier::StandardParcel
            } else {
                SizeTier::Oversize
            };
        };

        let edges = dims.sorted_edges();
        ladder
            .iter()
            .find(|limit| {
                weight_kg <= limit.max_weight_kg
                    && edges.iter().zip(limit.edges.iter()).all(|(edge, max)| edge <= max)
            })
            .map(|limit| limit.tier)
            .unwrap_or(SizeTier::Oversize)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeTier::Envelope => "envelope",
            SizeTier::SmallParcel => "small_parcel",
            SizeTier::StandardParcel => "standard_parcel",
            SizeTier::Oversize => "oversize",
        }
    }
}

/// Network fulfillment and storage rates for one market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRates {
    pub envelope: Decimal,
    pub small_parcel: Decimal,
    pub standard_parcel: Decimal,
    pub oversize: Decimal,
    /// Charged per kg above 1 kg
    pub per_kg_surcharge: Decimal,
    /// Monthly storage per cubic metre
    pub storage_rate_per_m3: Decimal,
    /// Storage charged when dimensions are unknown
    pub storage_fallback: Decimal,
}

impl NetworkRates {
    pub fn base_fee(&self, tier: SizeTier) -> Decimal {
        match tier {
            SizeTier::Envelope => self.envelope,
            SizeTier::SmallParcel => self.small_parcel,
            SizeTier::StandardParcel => self.standard_parcel,
            SizeTier::Oversize => self.oversize,
        }
    }
}

/// Merchant-fulfilled shipping by weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantShipping {
    pub up_to_1kg: Decimal,
    pub up_to_5kg: Decimal,
    pub heavy: Decimal,
}

impl MerchantShipping {
    pub fn for_weight(&self, weight_kg: Decimal) -> Decimal {
        if weight_kg <= dec!(1) {
            self.up_to_1kg
        } else if weight_kg <= dec!(5) {
            self.up_to_5kg
        } else {
            self.heavy
        }
    }
}

/// Tax and fee table for one market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketFees {
    pub tax_rate: Decimal,
    /// Flat fee on restricted media sales
    pub closing_fee: Decimal,
    pub network: NetworkRates,
    pub merchant_shipping: MerchantShipping,
}

impl MarketFees {
    fn eur(tax_rate: Decimal) -> Self {
        Self {
            tax_rate,
            closing_fee: dec!(1.01),
            network: NetworkRates {
                envelope: dec!(2.70),
                small_parcel: dec!(3.40),
                standard_parcel: dec!(4.20),
                oversize: dec!(7.50),
                per_kg_surcharge: dec!(0.40),
                storage_rate_per_m3: dec!(26.00),
                storage_fallback: dec!(0.10),
            },
            merchant_shipping: MerchantShipping {
                up_to_1kg: dec!(4.50),
                up_to_5kg: dec!(6.50),
                heavy: dec!(9.90),
            },
        }
    }

    fn gbp(tax_rate: Decimal) -> Self {
        Self {
            tax_rate,
            closing_fee: dec!(0.75),
            network: NetworkRates {
                envelope: dec!(2.35),
                small_parcel: dec!(2.95),
                standard_parcel: dec!(3.65),
                oversize: dec!(6.50),
                per_kg_surcharge: dec!(0.35),
                storage_rate_per_m3: dec!(22.00),
                storage_fallback: dec!(0.09),
            },
            merchant_shipping: MerchantShipping {
                up_to_1kg: dec!(3.90),
                up_to_5kg: dec!(5.60),
                heavy: dec!(8.50),
            },
        }
    }

    /// Built-in table for a market
    pub fn default_for(market: Market) -> Self {
        match market {
            Market::De => Self::eur(dec!(0.19)),
            Market::Fr => Self::eur(dec!(0.20)),
            Market::It => Self::eur(dec!(0.22)),
            Market::Es => Self::eur(dec!(0.21)),
            Market::Uk => Self::gbp(dec!(0.20)),
        }
    }
}

/// Referral rates per category plus per-market tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub default_referral_rate: Decimal,
    /// Keyed by lowercase category
    #[serde(default, deserialize_with = "lowercase_categories")]
    pub referral_rates: HashMap<String, Decimal>,
    #[serde(default)]
    pub markets: HashMap<Market, MarketFees>,
}

fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

fn lowercase_categories<'de, D>(deserializer: D) -> Result<HashMap<String, Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, Decimal>::deserialize(deserializer)?;
    let mut rates = HashMap::with_capacity(raw.len());
    for (category, rate) in raw {
        let key = normalize_category(&category);
        if rates.insert(key.clone(), rate).is_some() {
            return Err(serde::de::Error::custom(format!("duplicate referral category {}", key)));
        }
    }
    Ok(rates)
}

impl FeeSchedule {
    /// Referral rate for a category, case-insensitive, falling back to the default rate
    pub fn referral_rate(&self, category: Option<&str>) -> Decimal {
        category
            .and_then(|c| self.referral_rates.get(&normalize_category(c)))
            .copied()
            .unwrap_or(self.default_referral_rate)
    }

    /// Market table, falling back to the built-in one when the schedule omits the market
    pub fn market(&self, market: Market) -> MarketFees {
        self.markets
            .get(&market)
            .copied()
            .unwrap_or_else(|| MarketFees::default_for(market))
    }

    pub fn validate(&self) -> Result<(), String> {
        let unit = |rate: Decimal| rate >= Decimal::ZERO && rate <= Decimal::ONE;

        if !unit(self.default_referral_rate) {
            return Err(format!(
                "default_referral_rate must be within [0, 1], got {}",
                self.default_referral_rate
            ));
        }
        for (category, rate) in &self.referral_rates {
            if *category != normalize_category(category) {
                return Err(format!("referral category {:?} must be lowercase and trimmed", category));
            }
            if !unit(*rate) {
                return Err(format!("referral rate for {} must be within [0, 1], got {}", category, rate));
            }
        }
        for (market, fees) in &self.markets {
            if !unit(fees.tax_rate) {
                return Err(format!("tax rate for {} must be within [0, 1], got {}", market, fees.tax_rate));
            }
        }
        Ok(())
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        let referral_rates = [
            ("electronics", dec!(0.07)),
            ("computers", dec!(0.07)),
            ("camera", dec!(0.07)),
            ("video_games", dec!(0.08)),
            ("beauty", dec!(0.12)),
            ("health", dec!(0.12)),
            ("jewelry", dec!(0.20)),
            ("books", dec!(0.15)),
            ("music", dec!(0.15)),
            ("dvd", dec!(0.15)),
            ("toys", dec!(0.15)),
            ("home", dec!(0.15)),
            ("kitchen", dec!(0.15)),
            ("sports", dec!(0.15)),
            ("clothing", dec!(0.15)),
        ]
        .into_iter()
        .map(|(category, rate)| (category.to_string(), rate))
        .collect();

        let markets = Market::ALL
            .into_iter()
            .map(|market| (market, MarketFees::default_for(market)))
            .collect();

        Self {
            default_referral_rate: dec!(0.15),
            referral_rates,
            markets,
        }
    }
}
