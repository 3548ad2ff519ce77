//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section falls back to the engine's documented constants, so a
//! partial file is valid. Secrets (the listings API token) are referenced
//! by env-var name in the config and resolved at runtime.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use crate::types::{ItemRecord, Rarity};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub listings_api: ListingsApiConfig,
    pub fetch: FetchConfig,
    pub trust: TrustConfig,
    pub outliers: OutlierConfig,
    pub sweep: SweepConfig,
    pub valuation: ValuationConfig,
    /// Canonical item name → external spelling.
    pub aliases: HashMap<String, String>,
    /// Trait name → multiplier, layered over the built-in table.
    pub traits: HashMap<String, Decimal>,
    /// Items refreshed periodically by the binary.
    pub items: Vec<ItemRecord>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub port: u16,
    /// Seconds between catalog refreshes. 0 disables the refresher.
    pub refresh_interval_secs: u64,
    pub state_file: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "APPRAISER-001".to_string(),
            port: 8080,
            refresh_interval_secs: 0,
            state_file: "appraiser_prices.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ListingsApiConfig {
    pub base_url: String,
    /// Item category sent with every query.
    pub category: String,
    pub page_size: u32,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Name of the env var holding the bearer token, if any.
    pub token_env: Option<String>,
}

impl Default for ListingsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.offers.example.com/v1".to_string(),
            category: "steal-a-brainrot".to_string(),
            page_size: 40,
            request_timeout_secs: 15,
            user_agent: "APPRAISER/0.1.0".to_string(),
            token_env: None,
        }
    }
}

impl ListingsApiConfig {
    /// Resolve the bearer token from the environment, if configured.
    pub fn resolve_token(&self) -> Option<SecretString> {
        self.token_env
            .as_deref()
            .and_then(|env| AppConfig::resolve_env(env).ok())
            .filter(|t| !t.is_empty())
            .map(SecretString::new)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    /// Attempts per fetch, including the first.
    pub max_attempts: u32,
    /// Linear backoff step: the wait after failed attempt `n` is `n × step`.
    pub backoff_step_secs: u64,
    /// Minimum price for rarest-tier queries; excludes decoy sub-listings.
    pub og_price_floor: Decimal,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_secs: 2,
            og_price_floor: dec!(300),
        }
    }
}

impl FetchConfig {
    pub fn backoff_step(&self) -> Duration {
        Duration::from_secs(self.backoff_step_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrustConfig {
    pub min_feedback_score: f64,
    pub min_rating_count: u32,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            min_feedback_score: 85.0,
            min_rating_count: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutlierConfig {
    /// Below this many trusted listings, outlier rejection is skipped.
    pub min_sample: usize,
    /// Listings under `floor_ratio × median` are dropped.
    pub floor_ratio: Decimal,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            min_sample: 3,
            floor_ratio: dec!(0.2),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SweepConfig {
    /// Pause between successive external calls within one sweep.
    pub pacing_ms: u64,
    /// Wall-time budget for sweeps triggered by HTTP requests.
    pub request_budget_secs: u64,
    /// Items swept concurrently by the refresher.
    pub max_parallel_items: usize,
    pub min_listings_og: usize,
    pub min_listings_secret: usize,
    pub min_listings_default: usize,
    /// Flag prices above `max_default_ratio × default price`.
    pub max_default_ratio: Decimal,
    /// Flag prices below `min_default_ratio × default price`.
    pub min_default_ratio: Decimal,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            pacing_ms: 500,
            request_budget_secs: 30,
            max_parallel_items: 2,
            min_listings_og: 3,
            min_listings_secret: 10,
            min_listings_default: 15,
            max_default_ratio: dec!(50),
            min_default_ratio: dec!(0.1),
        }
    }
}

impl SweepConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn request_budget(&self) -> Duration {
        Duration::from_secs(self.request_budget_secs)
    }

    /// Minimum listing count below which a result is flagged suspect.
    pub fn min_listings(&self, rarity: Rarity) -> usize {
        match rarity {
            Rarity::Og => self.min_listings_og,
            Rarity::Secret => self.min_listings_secret,
            _ => self.min_listings_default,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ValuationConfig {
    /// Lower bound on the combined trait multiplier.
    pub multiplier_floor: Decimal,
    /// Presentation units per market currency unit.
    pub presentation_rate: Decimal,
    /// Presentation prices are rounded to a multiple of this.
    pub presentation_step: Decimal,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            multiplier_floor: dec!(0.1),
            presentation_rate: dec!(100),
            presentation_step: dec!(50),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.fetch.max_attempts >= 1, "fetch.max_attempts must be at least 1");
        anyhow::ensure!(self.listings_api.page_size >= 1, "listings_api.page_size must be at least 1");
        anyhow::ensure!(
            self.valuation.presentation_step > Decimal::ZERO,
            "valuation.presentation_step must be positive"
        );
        anyhow::ensure!(
            !self.valuation.multiplier_floor.is_sign_negative(),
            "valuation.multiplier_floor must not be negative"
        );
        anyhow::ensure!(self.sweep.max_parallel_items >= 1, "sweep.max_parallel_items must be at least 1");
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
