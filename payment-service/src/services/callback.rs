//! Callback verification and settlement.
//!
//! The gateway reports a payment result on two independent channels: the
//! user's browser is redirected back with the result in the query string,
//! and the gateway's servers deliver the same parameter contract directly.
//! Either channel may fire zero, one, or multiple times, in any order.
//! Both funnel into [`CallbackProcessor::process`]; the channel only
//! decides the response shape, never the algorithm.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{PaymentTransaction, TransactionStatus};
use crate::services::gateway::{self, params, GatewayClient, GATEWAY_SUCCESS_CODE};
use crate::services::metrics;
use crate::services::orders::OrderService;
use crate::services::repository::{
    TransactionStore, TransitionFields, TransitionOutcome,
};

/// Classified result of one callback delivery.
///
/// These are result values, not exceptions: nothing escapes the processor
/// boundary, every delivery gets an acknowledgement.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Fresh `Pending -> Success` transition; the order was notified.
    Confirmed(PaymentTransaction),
    /// Duplicate delivery of a success already recorded; replayed without
    /// mutation or a second notification.
    AlreadyConfirmed(PaymentTransaction),
    /// Gateway-reported failure, recorded as `Failed`.
    Declined(PaymentTransaction),
    /// Signature did not verify; the ledger was not touched.
    SignatureInvalid,
    /// No ledger row for the presented reference.
    UnknownTransaction { reference: String },
    /// Echoed amount differs from the stored amount. Tamper indicator:
    /// never transitions to `Success`, requires manual reconciliation.
    AmountMismatch {
        reference: String,
        expected: i64,
        received: Option<i64>,
    },
    /// Two different terminal outcomes observed for one reference.
    ConflictingDuplicate(PaymentTransaction),
    /// The ledger itself failed; the gateway should redeliver.
    StoreUnavailable,
}

pub struct CallbackProcessor {
    gateway: GatewayClient,
    store: Arc<dyn TransactionStore>,
    orders: Arc<dyn OrderService>,
}

impl CallbackProcessor {
    pub fn new(
        gateway: GatewayClient,
        store: Arc<dyn TransactionStore>,
        orders: Arc<dyn OrderService>,
    ) -> Self {
        Self {
            gateway,
            store,
            orders,
        }
    }

    /// Verify and settle one callback delivery.
    pub async fn process(&self, received: &BTreeMap<String, String>) -> CallbackOutcome {
        if !self.gateway.verify_callback(received) {
            tracing::warn!(params = ?received, "callback signature verification failed");
            metrics::record_callback("signature_invalid");
            return CallbackOutcome::SignatureInvalid;
        }

        let reference = match received.get(params::REFERENCE) {
            Some(r) if !r.is_empty() => r.clone(),
            _ => {
                tracing::warn!(params = ?received, "callback carries no reference");
                metrics::record_callback("unknown");
                return CallbackOutcome::UnknownTransaction {
                    reference: String::new(),
                };
            }
        };

        let stored = match self.store.find_by_reference(&reference).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                tracing::warn!(reference = %reference, "callback for unknown reference");
                metrics::record_callback("unknown");
                return CallbackOutcome::UnknownTransaction { reference };
            }
            Err(e) => {
                tracing::error!(reference = %reference, error = %e, "ledger lookup failed");
                metrics::record_callback("store_unavailable");
                return CallbackOutcome::StoreUnavailable;
            }
        };

        // The suffix is delimiter-free, the order id is not: split on the
        // last occurrence.
        let order_id = gateway::split_reference(&reference)
            .map(|(order_id, _)| order_id.to_string())
            .unwrap_or_else(|| stored.order_id.clone());

        let received_amount = received
            .get(params::AMOUNT)
            .and_then(|v| v.parse::<i64>().ok());
        if received_amount != Some(stored.amount_minor) {
            tracing::warn!(
                reference = %reference,
                expected = stored.amount_minor,
                received = ?received_amount,
                params = ?received,
                "callback amount does not match ledger; possible tamper"
            );
            metrics::record_callback("amount_mismatch");
            return CallbackOutcome::AmountMismatch {
                reference,
                expected: stored.amount_minor,
                received: received_amount,
            };
        }

        let result_code = received
            .get(params::RESULT_CODE)
            .map(String::as_str)
            .unwrap_or("");
        let status_code = received
            .get(params::STATUS_CODE)
            .map(String::as_str)
            .unwrap_or("");

        // Both codes must agree before the payment counts as captured.
        if result_code == GATEWAY_SUCCESS_CODE && status_code == GATEWAY_SUCCESS_CODE {
            self.settle_success(&reference, &order_id, received).await
        } else {
            self.settle_failure(&reference, result_code).await
        }
    }

    async fn settle_success(
        &self,
        reference: &str,
        order_id: &str,
        received: &BTreeMap<String, String>,
    ) -> CallbackOutcome {
        let fields = TransitionFields {
            gateway_transaction_id: received.get(params::TRANSACTION_ID).cloned(),
            bank_code: received.get(params::BANK_CODE).cloned(),
            card_type: received.get(params::CARD_TYPE).cloned(),
            pay_timestamp: received.get(params::PAY_TIME).cloned(),
            response_code: received.get(params::RESULT_CODE).cloned(),
            ..Default::default()
        };

        let outcome = self
            .store
            .transition(
                reference,
                TransactionStatus::Pending,
                TransactionStatus::Success,
                fields,
            )
            .await;

        match outcome {
            Ok(TransitionOutcome::Applied(tx)) => {
                tracing::info!(
                    reference = %reference,
                    order_id = %order_id,
                    amount_minor = tx.amount_minor,
                    gateway_transaction_id = ?tx.gateway_transaction_id,
                    "payment confirmed"
                );
                metrics::record_callback("confirmed");
                metrics::record_transaction("success");

                // Notify only after the transition is durably committed,
                // and only from the delivery that won the compare-and-set.
                if let Err(e) = self.orders.mark_order_paid(order_id).await {
                    tracing::error!(
                        reference = %reference,
                        order_id = %order_id,
                        error = %e,
                        "paid notification failed; needs reconciliation"
                    );
                }

                CallbackOutcome::Confirmed(tx)
            }
            Ok(TransitionOutcome::AlreadySettled(existing)) => match existing.status {
                TransactionStatus::Success => {
                    tracing::info!(
                        reference = %reference,
                        "duplicate success callback; replaying recorded outcome"
                    );
                    metrics::record_callback("replayed");
                    CallbackOutcome::AlreadyConfirmed(existing)
                }
                _ => {
                    tracing::error!(
                        reference = %reference,
                        stored_status = ?existing.status,
                        params = ?received,
                        "success callback for a transaction settled otherwise"
                    );
                    metrics::record_callback("conflict");
                    CallbackOutcome::ConflictingDuplicate(existing)
                }
            },
            Ok(TransitionOutcome::NotFound) => CallbackOutcome::UnknownTransaction {
                reference: reference.to_string(),
            },
            Err(e) => {
                tracing::error!(reference = %reference, error = %e, "ledger transition failed");
                metrics::record_callback("store_unavailable");
                CallbackOutcome::StoreUnavailable
            }
        }
    }

    async fn settle_failure(&self, reference: &str, result_code: &str) -> CallbackOutcome {
        let fields = TransitionFields {
            response_code: Some(result_code.to_string()),
            ..Default::default()
        };

        let outcome = self
            .store
            .transition(
                reference,
                TransactionStatus::Pending,
                TransactionStatus::Failed,
                fields,
            )
            .await;

        match outcome {
            Ok(TransitionOutcome::Applied(tx)) => {
                tracing::info!(
                    reference = %reference,
                    response_code = %result_code,
                    "payment declined by gateway"
                );
                metrics::record_callback("declined");
                metrics::record_transaction("failed");
                CallbackOutcome::Declined(tx)
            }
            Ok(TransitionOutcome::AlreadySettled(existing)) => match existing.status {
                TransactionStatus::Failed => {
                    tracing::info!(reference = %reference, "duplicate failure callback");
                    metrics::record_callback("replayed");
                    CallbackOutcome::Declined(existing)
                }
                _ => {
                    tracing::error!(
                        reference = %reference,
                        stored_status = ?existing.status,
                        "failure callback for a transaction settled otherwise"
                    );
                    metrics::record_callback("conflict");
                    CallbackOutcome::ConflictingDuplicate(existing)
                }
            },
            Ok(TransitionOutcome::NotFound) => CallbackOutcome::UnknownTransaction {
                reference: reference.to_string(),
            },
            Err(e) => {
                tracing::error!(reference = %reference, error = %e, "ledger transition failed");
                metrics::record_callback("store_unavailable");
                CallbackOutcome::StoreUnavailable
            }
        }
    }
}
