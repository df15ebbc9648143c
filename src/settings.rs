//! Tier bands and fee tables.
//!
//! Settings are replaced as a whole object; readers take a snapshot with
//! [`SettingsHandle::current`] on every call so a replacement is visible on the
//! next classification or fee computation.

use crate::error::{AppError, AppResult};
use crate::fees::FeeSchedule;
use crate::models::TierBands;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{error, info};

/// Runtime-tunable engine tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub tiers: TierBands,
    #[serde(default)]
    pub fees: FeeSchedule,
}

impl EngineSettings {
    pub fn validate(&self) -> AppResult<()> {
        self.tiers.validate().map_err(AppError::Validation)?;
        self.fees.validate().map_err(AppError::Validation)?;
        Ok(())
    }

    /// Parse and validate a JSON settings document
    pub fn from_json(json: &str) -> AppResult<Self> {
        let settings: EngineSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Shared, replaceable settings
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Arc<EngineSettings>>>,
}

impl SettingsHandle {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(settings))),
        }
    }

    /// Snapshot of the settings in force right now
    pub fn current(&self) -> Arc<EngineSettings> {
        self.inner.read().clone()
    }

    /// Swap in a new settings object. Invalid settings leave the current ones untouched.
    pub fn replace(&self, settings: EngineSettings) -> AppResult<()> {
        settings.validate()?;
        *self.inner.write() = Arc::new(settings);
        Ok(())
    }

    /// Reload from disk, returning whether anything changed
    pub fn reload_from_file(&self, path: &Path) -> AppResult<bool> {
        let settings = EngineSettings::load_from_file(path)?;
        if *self.current() == settings {
            return Ok(false);
        }
        self.replace(settings)?;
        Ok(true)
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

/// Re-read the settings file on a fixed cadence until shutdown is signalled
pub async fn watch_file(
    handle: SettingsHandle,
    path: PathBuf,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(interval);
    info!("Settings watcher started for {:?}, checking every {:?}", path, interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        match handle.reload_from_file(&path) {
            Ok(true) => info!("Settings reloaded from {:?}", path),
            Ok(false) => {}
            Err(e) => error!("Failed to reload settings from {:?}: {}", path, e),
        }
    }

    info!("Settings watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_replace_is_visible_to_existing_clones() {
        let handle = SettingsHandle::default();
        let reader = handle.clone();

        let mut updated = EngineSettings::default();
        updated.tiers.high.min_margin = dec!(45);
        handle.replace(updated).unwrap();

        assert_eq!(reader.current().tiers.high.min_margin, dec!(45));
    }

    #[test]
    fn test_invalid_replacement_is_rejected() {
        let handle = SettingsHandle::default();
        let mut broken = EngineSettings::default();
        broken.tiers.low.max_margin = Some(dec!(1));

        let err = handle.replace(broken).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(handle.current().tiers.low.max_margin, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "tiers": {
                "high":   { "min_margin": "40", "min_roi": "60", "notification_role": "vip", "display_color": 1 },
                "medium": { "min_margin": "20", "min_roi": "30", "notification_role": "mid", "display_color": 2 },
                "low":    { "min_margin": "5",  "min_roi": "10", "notification_role": "all", "display_color": 3 }
            }
        }"#;
        let settings = EngineSettings::from_json(json).unwrap();
        assert_eq!(settings.tiers.high.notification_role, "vip");
        assert_eq!(settings.fees, FeeSchedule::default());
    }

    #[test]
    fn test_file_categories_match_case_insensitively() {
        let json = r#"{
            "fees": {
                "default_referral_rate": "0.15",
                "referral_rates": { "Electronics": "0.07" }
            }
        }"#;
        let settings = EngineSettings::from_json(json).unwrap();
        assert_eq!(settings.fees.referral_rate(Some("electronics")), dec!(0.07));
        assert_eq!(settings.fees.referral_rate(Some("Electronics")), dec!(0.07));

        let handle = SettingsHandle::default();
        handle.replace(settings).unwrap();
        assert_eq!(handle.current().fees.referral_rate(Some("ELECTRONICS")), dec!(0.07));
    }

    #[test]
    fn test_reload_from_file() {
        let dir = std::env::temp_dir().join(format!("dealhound-settings-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");

        let mut on_disk = EngineSettings::default();
        std::fs::write(&path, serde_json::to_string(&on_disk).unwrap()).unwrap();

        let handle = SettingsHandle::default();
        assert!(!handle.reload_from_file(&path).unwrap());

        on_disk.tiers.medium.min_roi = dec!(35);
        std::fs::write(&path, serde_json::to_string(&on_disk).unwrap()).unwrap();
        assert!(handle.reload_from_file(&path).unwrap());
        assert_eq!(handle.current().tiers.medium.min_roi, dec!(35));

        std::fs::remove_dir_all(&dir).ok();
    }
}
