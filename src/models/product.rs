use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Marketplace a listing was observed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    De,
    Fr,
    It,
    Es,
    Uk,
}

impl Market {
    pub const ALL: [Market; 5] = [Market::De, Market::Fr, Market::It, Market::Es, Market::Uk];

    /// Parse a market code ("de", "uk", ...)
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "de" => Ok(Market::De),
            "fr" => Ok(Market::Fr),
            "it" => Ok(Market::It),
            "es" => Ok(Market::Es),
            "uk" | "gb" => Ok(Market::Uk),
            _ => Err(format!("Invalid market: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::De => "de",
            Market::Fr => "fr",
            Market::It => "it",
            Market::Es => "es",
            Market::Uk => "uk",
        }
    }

    /// ISO currency code prices on this market are quoted in
    pub fn currency(&self) -> &'static str {
        match self {
            Market::Uk => "GBP",
            _ => "EUR",
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock state reported by the listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    LimitedStock,
    OutOfStock,
    Unknown,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::InStock => "in_stock",
            Availability::LimitedStock => "limited_stock",
            Availability::OutOfStock => "out_of_stock",
            Availability::Unknown => "unknown",
        }
    }
}

impl Default for Availability {
    fn default() -> Self {
        Availability::Unknown
    }
}

/// Package dimensions in centimetres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_cm: Decimal,
    pub width_cm: Decimal,
    pub height_cm: Decimal,
}

impl Dimensions {
    pub fn new(length_cm: Decimal, width_cm: Decimal, height_cm: Decimal) -> Self {
        Self {
            length_cm,
            width_cm,
            height_cm,
        }
    }

    /// Edges ordered longest, median, shortest
    pub fn sorted_edges(&self) -> [Decimal; 3] {
        let mut edges = [self.length_cm, self.width_cm, self.height_cm];
        edges.sort_by(|a, b| b.cmp(a));
        edges
    }

    /// `None` when the product leaves the decimal range
    pub fn volume_cm3(&self) -> Option<Decimal> {
        self.length_cm
            .checked_mul(self.width_cm)?
            .checked_mul(self.height_cm)
    }
}

/// Immutable snapshot of a listing as delivered by the acquisition service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductObservation {
    pub item_id: String,
    pub market: Market,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub popularity_rank: Option<u32>,
    #[serde(default)]
    pub seller: Option<String>,
    #[serde(default)]
    pub prime_eligible: bool,
    pub url: String,
    pub observed_at: DateTime<Utc>,
}

impl ProductObservation {
    /// Minimal observation stamped with the current time
    pub fn new(item_id: impl Into<String>, market: Market, title: impl Into<String>, price: Decimal) -> Self {
        let item_id = item_id.into();
        Self {
            url: format!("https://marketplace.{}/dp/{}", market.as_str(), item_id),
            item_id,
            market,
            title: title.into(),
            price,
            currency: market.currency().to_string(),
            availability: Availability::InStock,
            rating: None,
            review_count: 0,
            popularity_rank: None,
            seller: None,
            prime_eligible: false,
            observed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_conversion() {
        assert_eq!(Market::from_str("DE").unwrap(), Market::De);
        assert_eq!(Market::from_str("gb").unwrap(), Market::Uk);
        assert!(Market::from_str("jp").is_err());
        assert_eq!(Market::Uk.currency(), "GBP");
        assert_eq!(Market::Fr.as_str(), "fr");
    }

    #[test]
    fn test_sorted_edges() {
        let dims = Dimensions::new(dec!(10), dec!(30), dec!(2));
        assert_eq!(dims.sorted_edges(), [dec!(30), dec!(10), dec!(2)]);
        assert_eq!(dims.volume_cm3(), Some(dec!(600)));
    }

    #[test]
    fn test_volume_out_of_range() {
        let huge = Dimensions::new(dec!(100000000000000), dec!(100000000000000), dec!(100000000000000));
        assert!(huge.volume_cm3().is_none());
    }

    #[test]
    fn test_observation_deserializes_with_defaults() {
        let json = serde_json::json!({
            "itemId": "B000TEST01",
            "market": "de",
            "title": "Widget",
            "price": "19.99",
            "currency": "EUR",
            "url": "https://example.test/B000TEST01",
            "observedAt": "2026-01-01T00:00:00Z"
        });
        let obs: ProductObservation = serde_json::from_value(json).unwrap();
        assert_eq!(obs.item_id, "B000TEST01");
        assert_eq!(obs.price, dec!(19.99));
        assert_eq!(obs.availability, Availability::Unknown);
        assert!(obs.popularity_rank.is_none());
    }

    #[test]
    fn test_observation_wire_names_are_camel_case() {
        let mut obs = ProductObservation::new("B000TEST02", Market::Uk, "Kettle", dec!(24.50));
        obs.review_count = 12;
        obs.popularity_rank = Some(310);
        obs.prime_eligible = true;

        let value = serde_json::to_value(&obs).unwrap();
        assert_eq!(value["itemId"], "B000TEST02");
        assert_eq!(value["reviewCount"], 12);
        assert_eq!(value["popularityRank"], 310);
        assert_eq!(value["primeEligible"], true);
        assert!(value.get("observedAt").is_some());
        assert!(value.get("item_id").is_none());
    }
}
