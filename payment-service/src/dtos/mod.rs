use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{PaymentTransaction, TransactionStatus};

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(length(min = 1))]
    pub order_id: String,
    /// Major-currency amount. Fetched from the order service when omitted.
    pub amount: Option<i64>,
    /// Fetched from the order service when omitted.
    pub description: Option<String>,
    pub bank_code: Option<String>,
    pub locale: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub reference: String,
    pub redirect_url: String,
    /// Major-currency amount echoed for confirmation.
    pub amount: i64,
    pub description: String,
}

/// Human-readable outcome returned on the browser return channel.
#[derive(Debug, Serialize)]
pub struct PaymentOutcomeResponse {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Minor-unit amount, present on a confirmed payment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

/// Fixed acknowledgement shape for the server notification channel.
///
/// The gateway keys its redelivery policy off `code`, so the shape never
/// varies with the outcome.
#[derive(Debug, Serialize)]
pub struct NotificationAck {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequest {
    #[validate(length(min = 1))]
    pub reason: String,
    /// Minor-unit amount; defaults to the full captured amount.
    pub amount_minor: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub order_id: String,
    pub reference: String,
    pub gateway_transaction_id: Option<String>,
    pub amount_minor: i64,
    pub description: String,
    pub bank_code: Option<String>,
    pub card_type: Option<String>,
    pub pay_timestamp: Option<String>,
    pub response_code: Option<String>,
    pub status: TransactionStatus,
    pub refunded: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PaymentTransaction> for TransactionResponse {
    fn from(t: PaymentTransaction) -> Self {
        Self {
            id: t.id,
            order_id: t.order_id,
            reference: t.gateway_reference,
            gateway_transaction_id: t.gateway_transaction_id,
            amount_minor: t.amount_minor,
            description: t.description,
            bank_code: t.bank_code,
            card_type: t.card_type,
            pay_timestamp: t.pay_timestamp,
            response_code: t.response_code,
            status: t.status,
            refunded: t.refunded,
            created_at: t.created_at.to_string(),
            updated_at: t.updated_at.to_string(),
        }
    }
}
