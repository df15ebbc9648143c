use crate::models::{Classification, DealMetrics, DealTier, TierBand};
use crate::settings::SettingsHandle;
use rust_decimal::Decimal;

/// Assigns tiers against the tier bands in force at call time
#[derive(Clone)]
pub struct DealClassifier {
    settings: SettingsHandle,
}

impl DealClassifier {
    pub fn new(settings: SettingsHandle) -> Self {
        Self { settings }
    }

    /// First band matching in High, Medium, Low order wins.
    /// When nothing matches the deal gets the lowest tier and `qualifies = false`.
    pub fn classify(&self, metrics: &DealMetrics) -> Classification {
        self.classify_values(metrics.margin_pct(), metrics.roi_pct())
    }

    pub fn classify_values(&self, margin_pct: Decimal, roi_pct: Decimal) -> Classification {
        self.settings.current().tiers.classify(margin_pct, roi_pct)
    }

    /// Current band for a tier (notification role, color, bounds)
    pub fn band_for(&self, tier: DealTier) -> TierBand {
        self.settings.current().tiers.band(tier).clone()
    }
}
