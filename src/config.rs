use crate::models::{FulfillmentMode, Market, DEFAULT_MAX_RETRIES};
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub batch_size: usize,
    pub max_concurrent: usize,
    pub category_max_items: usize,
    pub task_max_retries: u32,
    pub default_fulfillment: FulfillmentMode,
    /// Fraction of the sale price assumed as cost when a task carries none
    pub estimated_cost_ratio: Decimal,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub log_level: String,
    pub log_format: String,
    pub environment: String,
    pub settings_path: Option<PathBuf>,
    pub settings_reload_secs: Option<u64>,
    pub acquisition_url: String,
    pub acquisition_max_concurrency: usize,
    pub acquisition_timeout_secs: u64,
    pub notify_webhook_url: Option<String>,
    pub notify_batch_delay_ms: u64,
    pub seed_categories: Vec<(Market, String)>,
    pub seed_items: Vec<(Market, String)>,
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("Invalid {}: {}", name, raw)),
        _ => Ok(default),
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a comma-separated list of `market:ref` pairs, e.g. `de:electronics,uk:B0001`
pub fn parse_seed_list(raw: &str) -> Result<Vec<(Market, String)>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (market, target) = entry
                .split_once(':')
                .ok_or_else(|| format!("Seed entry '{}' must look like market:ref", entry))?;
            let target = target.trim();
            if target.is_empty() {
                return Err(format!("Seed entry '{}' has an empty ref", entry));
            }
            Ok((Market::from_str(market.trim())?, target.to_string()))
        })
        .collect()
}

impl SchedulerConfig {
    /// Create scheduler config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let default_fulfillment = match optional_var("DEFAULT_FULFILLMENT") {
            Some(raw) => FulfillmentMode::from_str(&raw)?,
            None => defaults.default_fulfillment,
        };

        let config = Self {
            interval_secs: parse_var("SCHEDULER_INTERVAL_SECS", defaults.interval_secs)?,
            batch_size: parse_var("SCHEDULER_BATCH_SIZE", defaults.batch_size)?,
            max_concurrent: parse_var("SCHEDULER_MAX_CONCURRENT", defaults.max_concurrent)?,
            category_max_items: parse_var("CATEGORY_MAX_ITEMS", defaults.category_max_items)?,
            task_max_retries: parse_var("TASK_MAX_RETRIES", defaults.task_max_retries)?,
            default_fulfillment,
            estimated_cost_ratio: parse_var("ESTIMATED_COST_RATIO", defaults.estimated_cost_ratio)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("SCHEDULER_INTERVAL_SECS must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("SCHEDULER_BATCH_SIZE must be greater than 0".to_string());
        }
        if self.max_concurrent == 0 {
            return Err("SCHEDULER_MAX_CONCURRENT must be greater than 0".to_string());
        }
        if self.category_max_items == 0 {
            return Err("CATEGORY_MAX_ITEMS must be greater than 0".to_string());
        }
        if self.estimated_cost_ratio <= Decimal::ZERO || self.estimated_cost_ratio > Decimal::ONE {
            return Err(format!(
                "ESTIMATED_COST_RATIO must be within (0, 1], got {}",
                self.estimated_cost_ratio
            ));
        }
        Ok(())
    }

    /// Get cycle interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Tasks dispatched per cycle
    pub fn dispatch_limit(&self) -> usize {
        self.batch_size.min(self.max_concurrent)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            batch_size: 5,
            max_concurrent: 3,
            category_max_items: 50,
            task_max_retries: DEFAULT_MAX_RETRIES,
            default_fulfillment: FulfillmentMode::NetworkFulfilled,
            estimated_cost_ratio: Decimal::new(5, 1),
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let scheduler = SchedulerConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let valid_log_formats = ["text", "json"];
        if !valid_log_formats.contains(&log_format.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_FORMAT: {}. Must be one of: {:?}",
                log_format, valid_log_formats
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        let settings_reload_secs = match optional_var("SETTINGS_RELOAD_SECS") {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| format!("Invalid SETTINGS_RELOAD_SECS: {}", raw))?,
            ),
            None => None,
        };

        let acquisition_max_concurrency = parse_var("ACQUISITION_MAX_CONCURRENCY", 3usize)?;
        if acquisition_max_concurrency == 0 {
            return Err("ACQUISITION_MAX_CONCURRENCY must be greater than 0".to_string());
        }

        let acquisition_timeout_secs = parse_var("ACQUISITION_TIMEOUT_SECS", 30u64)?;
        if acquisition_timeout_secs == 0 {
            return Err("ACQUISITION_TIMEOUT_SECS must be greater than 0".to_string());
        }

        let config = Self {
            scheduler,
            log_level: log_level.to_lowercase(),
            log_format: log_format.to_lowercase(),
            environment: environment.to_lowercase(),
            settings_path: optional_var("SETTINGS_PATH").map(PathBuf::from),
            settings_reload_secs,
            acquisition_url: optional_var("ACQUISITION_URL").unwrap_or_else(|| "http://localhost:3001".to_string()),
            acquisition_max_concurrency,
            acquisition_timeout_secs,
            notify_webhook_url: optional_var("NOTIFY_WEBHOOK_URL"),
            notify_batch_delay_ms: parse_var("NOTIFY_BATCH_DELAY_MS", 500u64)?,
            seed_categories: parse_seed_list(&env::var("SEED_CATEGORIES").unwrap_or_default())?,
            seed_items: parse_seed_list(&env::var("SEED_ITEMS").unwrap_or_default())?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rules spanning several fields
    pub fn validate(&self) -> Result<(), String> {
        if self.is_production() && self.notify_webhook_url.is_none() {
            return Err("NOTIFY_WEBHOOK_URL is required in production".to_string());
        }
        Ok(())
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }

    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition_timeout_secs)
    }

    pub fn notify_batch_delay(&self) -> Duration {
        Duration::from_millis(self.notify_batch_delay_ms)
    }

    /// Reload cadence for the settings file, when both are configured
    pub fn settings_reload_interval(&self) -> Option<Duration> {
        self.settings_path.as_ref()?;
        self.settings_reload_secs.map(Duration::from_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            environment: "development".to_string(),
            settings_path: None,
            settings_reload_secs: None,
            acquisition_url: "http://localhost:3001".to_string(),
            acquisition_max_concurrency: 3,
            acquisition_timeout_secs: 30,
            notify_webhook_url: None,
            notify_batch_delay_ms: 500,
            seed_categories: Vec::new(),
            seed_items: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert_eq!(config.dispatch_limit(), 3);
        assert_eq!(config.estimated_cost_ratio, dec!(0.5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scheduler_config_validation() {
        let zero_batch = SchedulerConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(zero_batch.validate().is_err());

        let bad_ratio = SchedulerConfig {
            estimated_cost_ratio: dec!(1.5),
            ..Default::default()
        };
        assert!(bad_ratio.validate().is_err());
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.environment, "development");
        assert!(!config.is_production());
        assert!(!config.json_logs());
        assert_eq!(config.settings_reload_interval(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_webhook() {
        let mut config = AppConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(config.is_production());
        assert_eq!(
            config.validate().unwrap_err(),
            "NOTIFY_WEBHOOK_URL is required in production"
        );

        config.notify_webhook_url = Some("https://hooks.example/deals".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_seed_list() {
        let seeds = parse_seed_list("de:electronics, uk:B000123 ,").unwrap();
        assert_eq!(
            seeds,
            vec![
                (Market::De, "electronics".to_string()),
                (Market::Uk, "B000123".to_string())
            ]
        );
        assert!(parse_seed_list("").unwrap().is_empty());
        assert!(parse_seed_list("electronics").is_err());
        assert!(parse_seed_list("xx:toys").is_err());
        assert!(parse_seed_list("de:").is_err());
    }
}
