//! # Configuration Module
//!
//! This module defines configuration structures for the ordering flow,
//! delivery pricing, outbound gateway calls and the secrets the bot needs
//! at startup.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

// Constants for the ordering flow
pub const DEFAULT_PAGE_SIZE: usize = 3;
pub const DEFAULT_MENU_COLUMNS: usize = 3;
pub const DEFAULT_LINE_ITEM_QUANTITY: u32 = 1;
pub const DEFAULT_FOLLOW_UP_DELAY_SECS: u64 = 60 * 60; // one hour after dispatch
pub const DEFAULT_CURRENCY: &str = "RUB";
pub const DEFAULT_FULFILLMENT_FLOW: &str = "pizzeria";
pub const DEFAULT_CUSTOMER_ADDRESS_FLOW: &str = "customer-address";

// Delivery tier boundaries (km) and fees (major currency units)
pub const FREE_DELIVERY_RADIUS_KM: f64 = 0.5;
pub const NEAR_DELIVERY_RADIUS_KM: f64 = 3.0;
pub const MAX_DELIVERY_RADIUS_KM: f64 = 20.0;
pub const NEAR_DELIVERY_FEE: i64 = 100;
pub const FAR_DELIVERY_FEE: i64 = 300;

pub const DEFAULT_COMMERCE_BASE_URL: &str = "https://api.moltin.com";
pub const DEFAULT_GEOCODER_BASE_URL: &str = "https://geocode-maps.yandex.ru/1.x";

/// Delivery tier boundaries and fees
#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    /// Below this distance delivery is free and pickup is suggested
    pub free_radius_km: f64,
    /// Upper bound (exclusive) of the near tier
    pub near_radius_km: f64,
    /// Upper bound (exclusive) of the far tier, beyond it nothing is delivered
    pub max_radius_km: f64,
    /// Near tier fee in major currency units
    pub near_fee: i64,
    /// Far tier fee in major currency units
    pub far_fee: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            free_radius_km: FREE_DELIVERY_RADIUS_KM,
            near_radius_km: NEAR_DELIVERY_RADIUS_KM,
            max_radius_km: MAX_DELIVERY_RADIUS_KM,
            near_fee: NEAR_DELIVERY_FEE,
            far_fee: FAR_DELIVERY_FEE,
        }
    }
}

/// Parameters of the conversation flow
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Catalog items per page
    pub page_size: usize,
    /// Product buttons per keyboard row
    pub menu_columns: usize,
    /// Quantity added to the cart per "add to cart" press
    pub line_item_quantity: u32,
    /// Delay before the post-delivery follow-up message
    pub follow_up_delay: Duration,
    /// ISO currency code used for invoices
    pub currency: String,
    /// Backend flow holding fulfillment locations
    pub fulfillment_flow: String,
    /// Backend flow receiving customer delivery addresses
    pub customer_address_flow: String,
    pub pricing: PricingConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            menu_columns: DEFAULT_MENU_COLUMNS,
            line_item_quantity: DEFAULT_LINE_ITEM_QUANTITY,
            follow_up_delay: Duration::from_secs(DEFAULT_FOLLOW_UP_DELAY_SECS),
            currency: DEFAULT_CURRENCY.to_string(),
            fulfillment_flow: DEFAULT_FULFILLMENT_FLOW.to_string(),
            customer_address_flow: DEFAULT_CUSTOMER_ADDRESS_FLOW.to_string(),
            pricing: PricingConfig::default(),
        }
    }
}

impl FlowConfig {
    /// Read optional overrides from the environment, keeping defaults otherwise
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            page_size: parse_var("PAGE_SIZE")?.unwrap_or(defaults.page_size),
            menu_columns: parse_var("MENU_COLUMNS")?.unwrap_or(defaults.menu_columns),
            line_item_quantity: parse_var("LINE_ITEM_QUANTITY")?
                .unwrap_or(defaults.line_item_quantity),
            follow_up_delay: parse_var("FOLLOW_UP_DELAY_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.follow_up_delay),
            currency: env::var("CURRENCY").unwrap_or(defaults.currency),
            fulfillment_flow: env::var("FULFILLMENT_FLOW").unwrap_or(defaults.fulfillment_flow),
            customer_address_flow: env::var("CUSTOMER_ADDRESS_FLOW")
                .unwrap_or(defaults.customer_address_flow),
            pricing: defaults.pricing,
        })
    }
}

/// Settings for calls to the commerce backend
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Timeout for a single HTTP request in seconds
    pub request_timeout_secs: u64,
    /// Consecutive failures before the circuit opens
    pub circuit_breaker_threshold: u32,
    /// Seconds the circuit stays open before letting a request through
    pub circuit_breaker_reset_secs: u64,
    /// Seconds before expiry at which the access token is renewed
    pub token_refresh_margin_secs: i64,
    /// Seconds to wait after a failed token renewal
    pub token_retry_delay_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMMERCE_BASE_URL.to_string(),
            request_timeout_secs: 10,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60,
            token_refresh_margin_secs: 60,
            token_retry_delay_secs: 15,
        }
    }
}

/// Secrets and endpoints read at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    pub database_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub geocoder_api_key: String,
    pub geocoder_base_url: String,
    pub payment_provider_token: String,
    pub gateway: GatewayConfig,
    pub flow: FlowConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut gateway = GatewayConfig::default();
        if let Ok(base_url) = env::var("COMMERCE_BASE_URL") {
            gateway.base_url = base_url;
        }

        Ok(Self {
            telegram_token: required_var("TELEGRAM_BOT_TOKEN")?,
            database_url: required_var("DATABASE_URL")?,
            client_id: required_var("MOLTIN_CLIENT_ID")?,
            client_secret: required_var("MOLTIN_CLIENT_SECRET")?,
            geocoder_api_key: required_var("YANDEX_GEOCODER_API_KEY")?,
            geocoder_base_url: env::var("GEOCODER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GEOCODER_BASE_URL.to_string()),
            payment_provider_token: required_var("PAYMENT_PROVIDER_TOKEN")?,
            gateway,
            flow: FlowConfig::from_env()?,
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} must be set"))
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{name} has an invalid value: {raw}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_defaults_reasonable() {
        let config = FlowConfig::default();
        assert!((3..=6).contains(&config.page_size));
        assert_eq!(config.line_item_quantity, 1);
        assert!(config.follow_up_delay.as_secs() > 0);
        assert_eq!(config.currency, "RUB");
    }

    #[test]
    fn test_pricing_boundaries_ascending() {
        let pricing = PricingConfig::default();
        assert!(pricing.free_radius_km < pricing.near_radius_km);
        assert!(pricing.near_radius_km < pricing.max_radius_km);
        assert!(pricing.near_fee < pricing.far_fee);
    }

    #[test]
    fn test_gateway_defaults_reasonable() {
        let config = GatewayConfig::default();
        assert!(config.request_timeout_secs > 0);
        assert!(config.circuit_breaker_threshold > 0);
        assert!(config.token_refresh_margin_secs >= 0);
    }

    #[test]
    fn test_parse_var_reports_invalid_values() {
        env::set_var("PIZZERIA_TEST_PAGE_SIZE", "three");
        assert!(parse_var::<usize>("PIZZERIA_TEST_PAGE_SIZE").is_err());
        env::set_var("PIZZERIA_TEST_PAGE_SIZE", " 4 ");
        assert_eq!(parse_var::<usize>("PIZZERIA_TEST_PAGE_SIZE").unwrap(), Some(4));
        env::remove_var("PIZZERIA_TEST_PAGE_SIZE");
        assert_eq!(parse_var::<usize>("PIZZERIA_TEST_PAGE_SIZE").unwrap(), None);
    }
}
