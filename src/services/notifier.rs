use crate::error::{AppError, AppResult};
use crate::models::{Deal, DealTier, Market};
use crate::services::classifier::DealClassifier;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Sink for qualifying deals
#[async_trait]
pub trait DealNotifier: Send + Sync {
    async fn notify(&self, deal: &Deal) -> AppResult<()>;

    /// Pause between consecutive messages of a batch
    fn batch_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Send deals one after another, spaced by `batch_delay`. A failed message is
    /// logged and skipped; returns how many were delivered.
    async fn notify_batch(&self, deals: &[Deal]) -> usize {
        let mut delivered = 0;
        for (index, deal) in deals.iter().enumerate() {
            if index > 0 && !self.batch_delay().is_zero() {
                tokio::time::sleep(self.batch_delay()).await;
            }
            match self.notify(deal).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(item_id = deal.item_id(), "Failed to deliver deal notification: {}", e),
            }
        }
        delivered
    }
}

/// Writes deals to the log only
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    batch_delay: Duration,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }
}

#[async_trait]
impl DealNotifier for LogNotifier {
    async fn notify(&self, deal: &Deal) -> AppResult<()> {
        info!(
            deal_id = %deal.id,
            item_id = deal.item_id(),
            market = %deal.market(),
            tier = %deal.tier,
            profit = %deal.metrics.profit(),
            margin = %deal.metrics.margin_pct(),
            roi = %deal.metrics.roi_pct(),
            "Deal found: {}",
            deal.product.title
        );
        Ok(())
    }

    fn batch_delay(&self) -> Duration {
        self.batch_delay
    }
}

/// Message body posted to the webhook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealAlert {
    pub role: String,
    pub color: u32,
    pub tier: DealTier,
    pub item_id: String,
    pub market: Market,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    pub cost_price: Decimal,
    pub profit: Decimal,
    pub margin_pct: Decimal,
    pub roi_pct: Decimal,
    pub url: String,
    pub detected_at: DateTime<Utc>,
}

/// Posts deal alerts as JSON, routed by the tier's notification role
pub struct WebhookNotifier {
    client: Client,
    url: String,
    classifier: DealClassifier,
    batch_delay: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, classifier: DealClassifier) -> AppResult<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(AppError::Config("Webhook URL must not be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Notification(e.to_string()))?;

        Ok(Self {
            client,
            url,
            classifier,
            batch_delay: Duration::from_millis(500),
        })
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Alert for a deal using the band currently configured for its tier
    pub fn alert(&self, deal: &Deal) -> DealAlert {
        let band = self.classifier.band_for(deal.tier);
        DealAlert {
            role: band.notification_role,
            color: band.display_color,
            tier: deal.tier,
            item_id: deal.item_id().to_string(),
            market: deal.market(),
            title: deal.product.title.clone(),
            price: deal.product.price,
            currency: deal.product.currency.clone(),
            cost_price: deal.metrics.cost_price(),
            profit: deal.metrics.profit(),
            margin_pct: deal.metrics.margin_pct().round_dp(2),
            roi_pct: deal.metrics.roi_pct().round_dp(2),
            url: deal.product.url.clone(),
            detected_at: deal.detected_at,
        }
    }
}

#[async_trait]
impl DealNotifier for WebhookNotifier {
    async fn notify(&self, deal: &Deal) -> AppResult<()> {
        let alert = self.alert(deal);
        let response = self
            .client
            .post(&self.url)
            .json(&alert)
            .send()
            .await
            .map_err(|e| AppError::Notification(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Notification(format!(
                "Webhook returned {} for {}",
                response.status(),
                deal.item_id()
            )));
        }

        info!(item_id = deal.item_id(), role = %alert.role, "Deal notification sent");
        Ok(())
    }

    fn batch_delay(&self) -> Duration {
        self.batch_delay
    }
}
