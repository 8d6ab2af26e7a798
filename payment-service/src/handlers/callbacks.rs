//! Inbound callback channels.
//!
//! Two channels deliver the same parameter contract: the browser return
//! redirect and the gateway's server-to-server notification. Both run the
//! same processor; only the response shape differs. Neither channel ever
//! surfaces an error status: the gateway expects a fixed acknowledgement
//! shape regardless of what happened.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::dtos::{NotificationAck, PaymentOutcomeResponse};
use crate::services::callback::CallbackOutcome;
use crate::AppState;

/// Browser return channel. Answers a human-readable outcome object.
pub async fn return_callback(
    State(state): State<AppState>,
    Query(received): Query<BTreeMap<String, String>>,
) -> Json<PaymentOutcomeResponse> {
    let outcome = state.callbacks.process(&received).await;
    Json(outcome_response(outcome))
}

/// Server notification channel.
///
/// Always HTTP 200 with the two-field ack; the gateway keys redelivery off
/// the code.
pub async fn notify_callback(
    State(state): State<AppState>,
    Query(received): Query<BTreeMap<String, String>>,
) -> Json<NotificationAck> {
    let outcome = state.callbacks.process(&received).await;
    Json(notification_ack(outcome))
}

fn outcome_response(outcome: CallbackOutcome) -> PaymentOutcomeResponse {
    match outcome {
        CallbackOutcome::Confirmed(tx) | CallbackOutcome::AlreadyConfirmed(tx) => {
            PaymentOutcomeResponse {
                success: true,
                code: "00".to_string(),
                message: "Payment successful".to_string(),
                reference: Some(tx.gateway_reference),
                amount: Some(tx.amount_minor),
            }
        }
        CallbackOutcome::Declined(tx) => PaymentOutcomeResponse {
            success: false,
            code: tx.response_code.clone().unwrap_or_else(|| "99".to_string()),
            message: "Payment was not completed".to_string(),
            reference: Some(tx.gateway_reference),
            amount: None,
        },
        CallbackOutcome::SignatureInvalid => PaymentOutcomeResponse {
            success: false,
            code: "97".to_string(),
            message: "Invalid signature".to_string(),
            reference: None,
            amount: None,
        },
        CallbackOutcome::UnknownTransaction { reference } => PaymentOutcomeResponse {
            success: false,
            code: "01".to_string(),
            message: "Transaction not found".to_string(),
            reference: (!reference.is_empty()).then_some(reference),
            amount: None,
        },
        CallbackOutcome::AmountMismatch { reference, .. } => PaymentOutcomeResponse {
            success: false,
            code: "04".to_string(),
            message: "Invalid amount".to_string(),
            reference: Some(reference),
            amount: None,
        },
        CallbackOutcome::ConflictingDuplicate(tx) => PaymentOutcomeResponse {
            success: false,
            code: "02".to_string(),
            message: "Transaction already settled".to_string(),
            reference: Some(tx.gateway_reference),
            amount: None,
        },
        CallbackOutcome::StoreUnavailable => PaymentOutcomeResponse {
            success: false,
            code: "99".to_string(),
            message: "Temporary error, please retry".to_string(),
            reference: None,
            amount: None,
        },
    }
}

fn notification_ack(outcome: CallbackOutcome) -> NotificationAck {
    let (code, message) = match outcome {
        // A recorded failure is still a processed delivery: the gateway
        // must stop retrying it.
        CallbackOutcome::Confirmed(_)
        | CallbackOutcome::AlreadyConfirmed(_)
        | CallbackOutcome::Declined(_) => ("00", "Confirm Success"),
        CallbackOutcome::UnknownTransaction { .. } => ("01", "Transaction not found"),
        CallbackOutcome::ConflictingDuplicate(_) => ("02", "Transaction already settled"),
        CallbackOutcome::AmountMismatch { .. } => ("04", "Invalid amount"),
        CallbackOutcome::SignatureInvalid => ("97", "Invalid signature"),
        CallbackOutcome::StoreUnavailable => ("99", "Unknown error"),
    };

    NotificationAck {
        code: code.to_string(),
        message: message.to_string(),
    }
}
