use crate::error::{AppError, AppResult};
use crate::fees::FeeInput;
use crate::models::{Deal, DealMetrics, Dimensions, FulfillmentMode, ProductObservation};
use crate::services::classifier::DealClassifier;
use crate::settings::{EngineSettings, SettingsHandle};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Cost side of an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub cost_price: Decimal,
    pub fulfillment_mode: FulfillmentMode,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub restricted_media: bool,
}

impl AnalysisOptions {
    pub fn new(cost_price: Decimal, fulfillment_mode: FulfillmentMode) -> Self {
        Self {
            cost_price,
            fulfillment_mode,
            category: None,
            weight_kg: None,
            dimensions: None,
            restricted_media: false,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_weight(mut self, weight_kg: Decimal) -> Self {
        self.weight_kg = Some(weight_kg);
        self
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn restricted_media(mut self) -> Self {
        self.restricted_media = true;
        self
    }
}

/// Turns product observations into costed, classified deals
#[derive(Clone)]
pub struct DealAnalyzer {
    settings: SettingsHandle,
    classifier: DealClassifier,
}

impl DealAnalyzer {
    pub fn new(settings: SettingsHandle) -> Self {
        Self {
            classifier: DealClassifier::new(settings.clone()),
            settings,
        }
    }

    pub fn classifier(&self) -> &DealClassifier {
        &self.classifier
    }

    /// Cost, measure and classify one observation against the settings in force now
    pub fn analyze(&self, product: ProductObservation, options: &AnalysisOptions) -> AppResult<Deal> {
        self.analyze_with(&self.settings.current(), product, options)
    }

    /// Same as [`analyze`](Self::analyze) but against an explicit settings snapshot,
    /// so fees and tiers always come from the same object.
    pub fn analyze_with(
        &self,
        settings: &EngineSettings,
        product: ProductObservation,
        options: &AnalysisOptions,
    ) -> AppResult<Deal> {
        let input = FeeInput {
            sale_price: product.price,
            category: options.category.as_deref(),
            fulfillment_mode: options.fulfillment_mode,
            market: product.market,
            weight_kg: options.weight_kg,
            dimensions: options.dimensions.as_ref(),
            restricted_media: options.restricted_media,
        };
        let fees = settings.fees.compute_fees(&input)?;
        let metrics = DealMetrics::compute(product.price, options.cost_price, fees.total())?;
        let classification = settings.tiers.classify(metrics.margin_pct(), metrics.roi_pct());

        debug!(
            item_id = %product.item_id,
            market = %product.market,
            size_tier = ?input.size_tier(),
            profit = %metrics.profit(),
            margin = %metrics.margin_pct(),
            tier = %classification.tier,
            qualifies = classification.qualifies,
            "Analyzed product"
        );

        Ok(Deal {
            id: Uuid::new_v4(),
            product,
            metrics,
            fees,
            tier: classification.tier,
            qualifies: classification.qualifies,
            fulfillment_mode: options.fulfillment_mode,
            detected_at: Utc::now(),
        })
    }

    /// Analyze pairwise against one settings snapshot.
    /// Mismatched lengths are rejected before anything is analyzed.
    pub fn analyze_batch(
        &self,
        products: Vec<ProductObservation>,
        options: &[AnalysisOptions],
    ) -> AppResult<Vec<Deal>> {
        if products.len() != options.len() {
            return Err(AppError::Validation(format!(
                "Batch length mismatch: {} products but {} cost options",
                products.len(),
                options.len()
            )));
        }

        let settings = self.settings.current();
        products
            .into_iter()
            .zip(options)
            .map(|(product, opts)| self.analyze_with(&settings, product, opts))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DealTier, Market};
    use rust_decimal_macros::dec;

    fn analyzer() -> DealAnalyzer {
        DealAnalyzer::new(SettingsHandle::new(EngineSettings::default()))
    }

    #[test]
    fn test_analyze_reference_scenario() {
        let product = ProductObservation::new("B0REF", Market::De, "Reference item", dec!(100));
        let options = AnalysisOptions::new(dec!(50), FulfillmentMode::NetworkFulfilled);
        let deal = analyzer().analyze(product, &options).unwrap();

        assert_eq!(deal.fees.referral_fee(), dec!(15));
        assert_eq!(deal.fees.tax(), dec!(19));
        assert_eq!(deal.metrics.profit(), dec!(11.70));
        assert!(deal.metrics.profit() < dec!(50));
        assert!(deal.metrics.margin_pct() < dec!(50));
        assert_eq!(deal.tier, DealTier::Low);
        assert!(deal.qualifies);
        assert_eq!(deal.fulfillment_mode, FulfillmentMode::NetworkFulfilled);
    }

    #[test]
    fn test_profit_identity() {
        let analyzer = analyzer();
        for (sale, cost) in [(dec!(19.99), dec!(4.10)), (dec!(250), dec!(180)), (dec!(0), dec!(3))] {
            let product = ProductObservation::new("B0X", Market::It, "Item", sale);
            let deal = analyzer
                .analyze(product, &AnalysisOptions::new(cost, FulfillmentMode::MerchantFulfilled))
                .unwrap();
            assert_eq!(
                deal.metrics.profit(),
                deal.metrics.sale_price() - deal.metrics.cost_price() - deal.metrics.total_fees()
            );
            assert_eq!(deal.metrics.total_fees(), deal.fees.total());
        }
    }

    #[test]
    fn test_batch_length_mismatch_is_rejected() {
        let products = vec![
            ProductObservation::new("A", Market::De, "A", dec!(10)),
            ProductObservation::new("B", Market::De, "B", dec!(10)),
        ];
        let options = vec![AnalysisOptions::new(dec!(5), FulfillmentMode::MerchantFulfilled)];
        let err = analyzer().analyze_batch(products, &options).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_batch_ids_are_unique() {
        let products = vec![
            ProductObservation::new("A", Market::De, "A", dec!(10)),
            ProductObservation::new("A", Market::De, "A", dec!(10)),
        ];
        let opts = AnalysisOptions::new(dec!(2), FulfillmentMode::MerchantFulfilled);
        let deals = analyzer().analyze_batch(products, &[opts.clone(), opts]).unwrap();
        assert_eq!(deals.len(), 2);
        assert_ne!(deals[0].id, deals[1].id);
    }

    #[test]
    fn test_snapshot_drives_fees_and_tiers_together() {
        let handle = SettingsHandle::new(EngineSettings::default());
        let analyzer = DealAnalyzer::new(handle.clone());
        let snapshot = handle.current();

        // cheaper referral and a much stricter high band land after the snapshot was taken
        let mut updated = EngineSettings::default();
        updated.fees.default_referral_rate = dec!(0.05);
        updated.tiers.high.min_margin = dec!(60);
        handle.replace(updated).unwrap();

        let product = ProductObservation::new("B0SNAP", Market::De, "Snapshot", dec!(100));
        let options = AnalysisOptions::new(dec!(20), FulfillmentMode::MerchantFulfilled);

        let old = analyzer.analyze_with(&snapshot, product.clone(), &options).unwrap();
        assert_eq!(old.fees.referral_fee(), dec!(15));
        assert_eq!(old.tier, DealTier::High);

        let new = analyzer.analyze(product, &options).unwrap();
        assert_eq!(new.fees.referral_fee(), dec!(5));
        assert_eq!(new.metrics.margin_pct(), dec!(51.50));
        assert_eq!(new.tier, DealTier::Medium);
    }

    #[test]
    fn test_overflowing_metrics_are_an_error() {
        let product = ProductObservation::new("B0TINY", Market::De, "Tiny cost", dec!(100));
        let options = AnalysisOptions::new(Decimal::new(1, 28), FulfillmentMode::NetworkFulfilled);
        let err = analyzer().analyze(product, &options).unwrap_err();
        assert!(matches!(err, AppError::Overflow(_)));
    }
}
