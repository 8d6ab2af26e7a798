//! Administrative refund action.
//!
//! Refunds live outside the callback hot path: an operator moves a
//! successful transaction to `Refunded` through the same conditional
//! transition the callback processor uses.

use axum::{
    extract::{Path, State},
    Json,
};
use commerce_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{RefundRequest, TransactionResponse},
    models::TransactionStatus,
    services::{
        metrics,
        repository::{TransactionStore, TransitionFields, TransitionOutcome},
    },
    AppState,
};

pub async fn refund_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(payload): Json<RefundRequest>,
) -> Result<Json<TransactionResponse>, AppError> {
    payload.validate()?;

    let transaction = state
        .store
        .find_by_reference(&reference)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

    let refund_amount = payload.amount_minor.unwrap_or(transaction.amount_minor);
    if refund_amount <= 0 || refund_amount > transaction.amount_minor {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Refund amount out of range"
        )));
    }

    let fields = TransitionFields {
        refund_reason: Some(payload.reason.clone()),
        refund_amount_minor: Some(refund_amount),
        ..Default::default()
    };

    match state
        .store
        .transition(
            &reference,
            TransactionStatus::Success,
            TransactionStatus::Refunded,
            fields,
        )
        .await?
    {
        TransitionOutcome::Applied(tx) => {
            tracing::info!(
                reference = %reference,
                refund_amount_minor = refund_amount,
                "transaction refunded"
            );
            metrics::record_transaction("refunded");
            Ok(Json(TransactionResponse::from(tx)))
        }
        TransitionOutcome::AlreadySettled(existing) => Err(AppError::Conflict(anyhow::anyhow!(
            "Transaction is {:?}; only successful payments can be refunded",
            existing.status
        ))),
        TransitionOutcome::NotFound => Err(AppError::NotFound(anyhow::anyhow!(
            "Transaction not found"
        ))),
    }
}
