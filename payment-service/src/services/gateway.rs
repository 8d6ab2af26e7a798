//! Hosted payment gateway client.
//!
//! Builds the signed redirect request handed to the user's browser and
//! re-derives signatures for inbound callbacks. The gateway never receives
//! a server-to-server call from us; it calls in.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use commerce_core::error::AppError;
use commerce_core::utils::signature;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::services::encoding;

/// Delimiter between the order id and the random suffix in a reference.
pub const REFERENCE_DELIMITER: char = '-';
const REFERENCE_SUFFIX_LEN: usize = 8;

/// Gateway timestamp layout (`yyyyMMddHHmmss`).
pub const GATEWAY_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Code the gateway uses for a successful result and a successful status.
pub const GATEWAY_SUCCESS_CODE: &str = "00";

/// Parameter names of the gateway wire contract.
pub mod params {
    pub const VERSION: &str = "version";
    pub const COMMAND: &str = "command";
    pub const MERCHANT_CODE: &str = "merchantCode";
    pub const AMOUNT: &str = "amount";
    pub const CURRENCY: &str = "currency";
    pub const REFERENCE: &str = "reference";
    pub const ORDER_INFO: &str = "orderInfo";
    pub const ORDER_TYPE: &str = "orderType";
    pub const LOCALE: &str = "locale";
    pub const RETURN_URL: &str = "returnUrl";
    pub const CLIENT_IP: &str = "clientIp";
    pub const CREATED_AT: &str = "createdAt";
    pub const EXPIRES_AT: &str = "expiresAt";
    pub const BANK_CODE: &str = "bankCode";
    pub const TRANSACTION_ID: &str = "transactionId";
    pub const CARD_TYPE: &str = "cardType";
    pub const PAY_TIME: &str = "payTime";
    pub const RESULT_CODE: &str = "resultCode";
    pub const STATUS_CODE: &str = "statusCode";
    pub const SIGNATURE: &str = "signature";
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("amount must be a positive integer, got {0}")]
    InvalidAmount(i64),

    #[error("failed to sign payment request: {0}")]
    Signing(#[source] anyhow::Error),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidAmount(_) => AppError::BadRequest(anyhow::Error::new(err)),
            PaymentError::Signing(_) => AppError::InternalError(anyhow::Error::new(err)),
        }
    }
}

/// A fully assembled outbound payment request.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub reference: String,
    pub amount_minor: i64,
    pub description: String,
    pub redirect_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct GatewayClient {
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Assemble and sign the outbound payment request.
    ///
    /// The caller must persist the `Pending` ledger row before handing the
    /// redirect URL out.
    pub fn build_payment_request(
        &self,
        order_id: &str,
        amount_major: i64,
        description: &str,
        bank_code: Option<&str>,
        locale: Option<&str>,
        client_ip: &str,
    ) -> Result<PaymentRequest, PaymentError> {
        if amount_major <= 0 {
            return Err(PaymentError::InvalidAmount(amount_major));
        }
        let amount_minor = amount_major
            .checked_mul(100)
            .ok_or(PaymentError::InvalidAmount(amount_major))?;

        let reference = self.mint_reference(order_id);
        let created_at = Utc::now();
        let expires_at = created_at + Duration::minutes(self.config.expiry_minutes);

        let mut p = BTreeMap::new();
        p.insert(params::VERSION.to_string(), self.config.version.clone());
        p.insert(params::COMMAND.to_string(), "pay".to_string());
        p.insert(
            params::MERCHANT_CODE.to_string(),
            self.config.merchant_code.clone(),
        );
        p.insert(params::AMOUNT.to_string(), amount_minor.to_string());
        p.insert(params::CURRENCY.to_string(), self.config.currency.clone());
        p.insert(params::REFERENCE.to_string(), reference.clone());
        p.insert(params::ORDER_INFO.to_string(), description.to_string());
        p.insert(
            params::ORDER_TYPE.to_string(),
            self.config.order_type.clone(),
        );
        p.insert(
            params::LOCALE.to_string(),
            locale.unwrap_or(&self.config.default_locale).to_string(),
        );
        p.insert(params::RETURN_URL.to_string(), self.config.return_url.clone());
        p.insert(params::CLIENT_IP.to_string(), client_ip.to_string());
        p.insert(
            params::CREATED_AT.to_string(),
            created_at.format(GATEWAY_TIMESTAMP_FORMAT).to_string(),
        );
        p.insert(
            params::EXPIRES_AT.to_string(),
            expires_at.format(GATEWAY_TIMESTAMP_FORMAT).to_string(),
        );
        if let Some(bank) = bank_code {
            p.insert(params::BANK_CODE.to_string(), bank.to_string());
        }

        // The signature rides alongside the signed set, never inside it.
        let canonical = encoding::signing_payload(&p);
        let digest = signature::sign(self.config.secret.expose_secret(), &canonical)
            .map_err(PaymentError::Signing)?;

        let redirect_url = format!(
            "{}?{}&{}={}",
            self.config.pay_endpoint,
            encoding::query_string(&p),
            params::SIGNATURE,
            digest
        );

        Ok(PaymentRequest {
            reference,
            amount_minor,
            description: description.to_string(),
            redirect_url,
            created_at,
            expires_at,
        })
    }

    /// Verify a callback's signature against its own parameters.
    ///
    /// The signature field is removed from the set before re-deriving the
    /// canonical payload. Missing or empty signatures fail verification.
    pub fn verify_callback(&self, received: &BTreeMap<String, String>) -> bool {
        let presented = match received.get(params::SIGNATURE) {
            Some(s) if !s.is_empty() => s,
            _ => return false,
        };

        let mut signed_set = received.clone();
        signed_set.remove(params::SIGNATURE);
        let canonical = encoding::signing_payload(&signed_set);

        signature::verify(self.config.secret.expose_secret(), &canonical, presented)
    }

    fn mint_reference(&self, order_id: &str) -> String {
        // The suffix comes from the OS entropy source: a guessable suffix
        // would let an attacker precompute a valid callback reference.
        let suffix: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(REFERENCE_SUFFIX_LEN)
            .map(char::from)
            .collect();
        format!("{}{}{}", order_id, REFERENCE_DELIMITER, suffix)
    }
}

/// Split a reference back into `(order_id, suffix)`.
///
/// Splits on the last delimiter occurrence: the suffix is alphanumeric and
/// therefore delimiter-free, but order ids may contain the delimiter.
pub fn split_reference(reference: &str) -> Option<(&str, &str)> {
    reference.rsplit_once(REFERENCE_DELIMITER)
}
