use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub orders: OrderServiceConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

/// Static gateway credentials and endpoints.
///
/// Injected once at process start; never mutated at runtime.
#[derive(Deserialize, Clone, Debug)]
pub struct GatewayConfig {
    pub merchant_code: String,
    pub secret: Secret<String>,
    /// Base URL of the hosted checkout page the user is redirected to.
    pub pay_endpoint: String,
    /// Address the gateway redirects the browser back to.
    pub return_url: String,
    pub version: String,
    pub currency: String,
    pub order_type: String,
    pub default_locale: String,
    /// Window after which the gateway refuses the payment page.
    pub expiry_minutes: i64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct OrderServiceConfig {
    pub base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("PAYMENT_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PAYMENT_SERVICE_PORT")
            .unwrap_or_else(|_| "3003".to_string())
            .parse()?;

        let db_url =
            env::var("PAYMENT_DATABASE_URL").context("PAYMENT_DATABASE_URL must be set")?;
        let db_name =
            env::var("PAYMENT_DATABASE_NAME").unwrap_or_else(|_| "payment_db".to_string());

        let merchant_code =
            env::var("GATEWAY_MERCHANT_CODE").context("GATEWAY_MERCHANT_CODE must be set")?;
        let gateway_secret = env::var("GATEWAY_SECRET").context("GATEWAY_SECRET must be set")?;
        let pay_endpoint =
            env::var("GATEWAY_PAY_ENDPOINT").context("GATEWAY_PAY_ENDPOINT must be set")?;
        let return_url =
            env::var("GATEWAY_RETURN_URL").context("GATEWAY_RETURN_URL must be set")?;
        let version = env::var("GATEWAY_VERSION").unwrap_or_else(|_| "2.1.0".to_string());
        let currency = env::var("GATEWAY_CURRENCY").unwrap_or_else(|_| "VND".to_string());
        let order_type = env::var("GATEWAY_ORDER_TYPE").unwrap_or_else(|_| "ecommerce".to_string());
        let default_locale = env::var("GATEWAY_LOCALE").unwrap_or_else(|_| "en".to_string());
        let expiry_minutes = env::var("GATEWAY_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse()?;

        let orders_base_url =
            env::var("ORDER_SERVICE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            gateway: GatewayConfig {
                merchant_code,
                secret: Secret::new(gateway_secret),
                pay_endpoint,
                return_url,
                version,
                currency,
                order_type,
                default_locale,
                expiry_minutes,
            },
            orders: OrderServiceConfig {
                base_url: orders_base_url,
            },
            service_name: "payment-service".to_string(),
        })
    }
}
