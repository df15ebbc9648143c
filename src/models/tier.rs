use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Quality tier of a deal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealTier {
    Low,
    Medium,
    High,
}

impl DealTier {
    /// Evaluation order used by the classifier
    pub const PRIORITY: [DealTier; 3] = [DealTier::High, DealTier::Medium, DealTier::Low];

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "low" => Ok(DealTier::Low),
            "medium" => Ok(DealTier::Medium),
            "high" => Ok(DealTier::High),
            _ => Err(format!("Invalid tier: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DealTier::Low => "low",
            DealTier::Medium => "medium",
            DealTier::High => "high",
        }
    }
}

impl std::fmt::Display for DealTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Margin/ROI range mapped to a tier and its notification channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBand {
    pub min_margin: Decimal,
    #[serde(default)]
    pub max_margin: Option<Decimal>,
    pub min_roi: Decimal,
    #[serde(default)]
    pub max_roi: Option<Decimal>,
    pub notification_role: String,
    pub display_color: u32,
}

impl TierBand {
    /// All four bounds satisfied
    pub fn matches(&self, margin_pct: Decimal, roi_pct: Decimal) -> bool {
        margin_pct >= self.min_margin
            && self.max_margin.map_or(true, |max| margin_pct <= max)
            && roi_pct >= self.min_roi
            && self.max_roi.map_or(true, |max| roi_pct <= max)
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_margin {
            if max < self.min_margin {
                return Err(format!("max_margin {} is below min_margin {}", max, self.min_margin));
            }
        }
        if let Some(max) = self.max_roi {
            if max < self.min_roi {
                return Err(format!("max_roi {} is below min_roi {}", max, self.min_roi));
            }
        }
        Ok(())
    }
}

/// Tier assignment plus whether any band actually matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub tier: DealTier,
    pub qualifies: bool,
}

/// One band per tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBands {
    pub high: TierBand,
    pub medium: TierBand,
    pub low: TierBand,
}

impl TierBands {
    pub fn band(&self, tier: DealTier) -> &TierBand {
        match tier {
            DealTier::High => &self.high,
            DealTier::Medium => &self.medium,
            DealTier::Low => &self.low,
        }
    }

    /// First band matching in High, Medium, Low order wins.
    /// When nothing matches the deal gets the lowest tier and `qualifies = false`.
    pub fn classify(&self, margin_pct: Decimal, roi_pct: Decimal) -> Classification {
        DealTier::PRIORITY
            .into_iter()
            .find(|tier| self.band(*tier).matches(margin_pct, roi_pct))
            .map(|tier| Classification {
                tier,
                qualifies: true,
            })
            .unwrap_or(Classification {
                tier: DealTier::Low,
                qualifies: false,
            })
    }

    pub fn validate(&self) -> Result<(), String> {
        for tier in DealTier::PRIORITY {
            self.band(tier)
                .validate()
                .map_err(|e| format!("{} tier: {}", tier, e))?;
        }
        Ok(())
    }
}

impl Default for TierBands {
    fn default() -> Self {
        Self {
            high: TierBand {
                min_margin: dec!(30),
                max_margin: None,
                min_roi: dec!(50),
                max_roi: None,
                notification_role: "deals-high".to_string(),
                display_color: 0x2ECC71,
            },
            medium: TierBand {
                min_margin: dec!(20),
                max_margin: None,
                min_roi: dec!(30),
                max_roi: None,
                notification_role: "deals-medium".to_string(),
                display_color: 0xF1C40F,
            },
            low: TierBand {
                min_margin: dec!(10),
                max_margin: None,
                min_roi: dec!(15),
                max_roi: None,
                notification_role: "deals-low".to_string(),
                display_color: 0x3498DB,
            },
        }
    }
}
