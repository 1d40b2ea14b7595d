//! Environment-driven configuration.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

use crate::catalog::PagingDefaults;
use crate::pricing::{CustomerTier, PricingPolicy};
use crate::{CommerceError, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub port: u16,
    pub nats_url: Option<String>,
    pub currency: String,
    pub paging: PagingDefaults,
    pub dashboard_recent_limit: u32,
    pub pricing: PricingPolicy,
    pub run_migrations: bool,
    pub max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None, port: 8083, nats_url: None, currency: "INR".into(),
            paging: PagingDefaults::default(), dashboard_recent_limit: 8, pricing: PricingPolicy::default(),
            run_migrations: true, max_connections: 10,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut pricing = PricingPolicy::default();
        for tier in [CustomerTier::Retail, CustomerTier::Wholesale, CustomerTier::Distributor] {
            let key = format!("TIER_DISCOUNT_{}", tier.as_str().to_ascii_uppercase());
            if let Some(pct) = parse::<Decimal>(&key, get(&key))? {
                if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                    return Err(CommerceError::Config(format!("{} must be between 0 and 100, got {}", key, pct)));
                }
                pricing = pricing.with_tier_discount(tier, pct);
            }
        }

        let paging = PagingDefaults {
            per_page: parse("CATALOG_PER_PAGE", get("CATALOG_PER_PAGE"))?.unwrap_or(defaults.paging.per_page),
            max_per_page: parse("CATALOG_MAX_PER_PAGE", get("CATALOG_MAX_PER_PAGE"))?.unwrap_or(defaults.paging.max_per_page),
        };
        if paging.per_page == 0 || paging.per_page > paging.max_per_page {
            return Err(CommerceError::Config(format!(
                "CATALOG_PER_PAGE must be between 1 and CATALOG_MAX_PER_PAGE ({}), got {}",
                paging.max_per_page, paging.per_page
            )));
        }

        let config = Self {
            database_url: get("DATABASE_URL"),
            port: parse("PORT", get("PORT"))?.unwrap_or(defaults.port),
            nats_url: get("NATS_URL"),
            currency: get("CURRENCY").unwrap_or(defaults.currency),
            paging,
            dashboard_recent_limit: parse("DASHBOARD_RECENT_LIMIT", get("DASHBOARD_RECENT_LIMIT"))?.unwrap_or(defaults.dashboard_recent_limit),
            pricing,
            run_migrations: parse("RUN_MIGRATIONS", get("RUN_MIGRATIONS"))?.unwrap_or(defaults.run_migrations),
            max_connections: parse("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"))?.unwrap_or(defaults.max_connections),
        };
        tracing::info!(port = config.port, currency = %config.currency, "Configuration loaded");
        Ok(config)
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| CommerceError::Config("Missing environment variable 'DATABASE_URL'".into()))
    }
}

fn parse<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| v.parse::<T>().map_err(|e| CommerceError::Config(format!("Invalid {} value '{}': {}", key, v, e))))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = from(&[]).unwrap();
        assert_eq!(c.port, 8083);
        assert_eq!(c.currency, "INR");
        assert_eq!(c.paging, PagingDefaults { per_page: 12, max_per_page: 100 });
        assert_eq!(c.dashboard_recent_limit, 8);
        assert!(c.run_migrations);
        assert!(c.require_database_url().is_err());
    }

    #[test]
    fn test_tier_discounts() {
        let c = from(&[("TIER_DISCOUNT_WHOLESALE", "7.5"), ("PORT", "9000")]).unwrap();
        assert_eq!(c.pricing.tier_percentage(CustomerTier::Wholesale), Decimal::new(75, 1));
        assert_eq!(c.pricing.tier_percentage(CustomerTier::Retail), Decimal::ZERO);
        assert_eq!(c.port, 9000);
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(matches!(from(&[("PORT", "eighty")]), Err(CommerceError::Config(_))));
        assert!(matches!(from(&[("TIER_DISCOUNT_RETAIL", "120")]), Err(CommerceError::Config(_))));
        assert!(matches!(from(&[("CATALOG_PER_PAGE", "500")]), Err(CommerceError::Config(_))));
        assert!(matches!(from(&[("RUN_MIGRATIONS", "maybe")]), Err(CommerceError::Config(_))));
    }
}
