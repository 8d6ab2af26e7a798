use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single payment attempt against the hosted gateway.
///
/// Rows are the durable audit trail: created `Pending` before the redirect
/// URL leaves the process, settled exactly once by the callback processor
/// (or refunded by an administrator), never deleted.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentTransaction {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Order this attempt pays for. Not unique: an order may be retried,
    /// but at most one attempt reaches `Success`.
    pub order_id: String,
    /// Correlation id minted at request-build time, `{order_id}-{suffix}`.
    /// Globally unique; assigned once, never mutated.
    pub gateway_reference: String,
    /// Gateway-side transaction id, present only after a callback.
    pub gateway_transaction_id: Option<String>,
    /// Amount in the gateway's minor currency unit (major amount x 100).
    /// Immutable once set at creation.
    pub amount_minor: i64,
    pub description: String,
    pub bank_code: Option<String>,
    pub card_type: Option<String>,
    /// Fixed-width `yyyyMMddHHmmss` stamp echoed by the gateway.
    pub pay_timestamp: Option<String>,
    pub response_code: Option<String>,
    pub status: TransactionStatus,
    /// Payer, when authenticated.
    pub user_id: Option<String>,
    pub refunded: bool,
    pub refunded_at: Option<DateTime>,
    pub refund_reason: Option<String>,
    pub refund_amount_minor: Option<i64>,
    pub expires_at: DateTime,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

impl TransactionStatus {
    /// Whether the status machine allows the `self -> to` edge.
    ///
    /// Transitions are one-way: `Pending -> Success | Failed` and
    /// `Success -> Refunded`. Everything else is rejected.
    pub fn permits(self, to: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, to),
            (Pending, Success) | (Pending, Failed) | (Success, Refunded)
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::TransactionStatus::*;

    #[test]
    fn allowed_edges() {
        assert!(Pending.permits(Success));
        assert!(Pending.permits(Failed));
        assert!(Success.permits(Refunded));
    }

    #[test]
    fn rejected_edges() {
        assert!(!Success.permits(Pending));
        assert!(!Success.permits(Failed));
        assert!(!Failed.permits(Success));
        assert!(!Failed.permits(Refunded));
        assert!(!Refunded.permits(Success));
        assert!(!Pending.permits(Refunded));
        assert!(!Pending.permits(Pending));
    }

    #[test]
    fn terminal_states() {
        assert!(!Pending.is_terminal());
        assert!(Success.is_terminal());
        assert!(Failed.is_terminal());
        assert!(Refunded.is_terminal());
    }
}
