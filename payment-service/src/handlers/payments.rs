//! Payment creation and status handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use commerce_core::error::AppError;
use mongodb::bson::DateTime;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{CreatePaymentRequest, CreatePaymentResponse, TransactionResponse},
    models::{PaymentTransaction, TransactionStatus},
    services::{
        metrics,
        orders::OrderService,
        repository::{StoreError, TransactionStore},
    },
    AppState,
};

/// Create a payment attempt and return the gateway redirect URL.
pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), AppError> {
    payload.validate()?;

    let client_ip = client_ip(&headers);

    // Resolve amount/description, falling back to the order collaborator
    // when the caller did not supply them.
    let (amount, description) = match (payload.amount, payload.description.clone()) {
        (Some(amount), Some(description)) => (amount, description),
        (amount, description) => {
            let summary = state
                .orders
                .order_summary(&payload.order_id)
                .await
                .map_err(AppError::InternalError)?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;
            (
                amount.unwrap_or(summary.amount),
                description.unwrap_or(summary.description),
            )
        }
    };

    tracing::info!(
        order_id = %payload.order_id,
        amount = amount,
        client_ip = %client_ip,
        "creating payment request"
    );

    let request = state.gateway.build_payment_request(
        &payload.order_id,
        amount,
        &description,
        payload.bank_code.as_deref(),
        payload.locale.as_deref(),
        &client_ip,
    )?;

    let now = DateTime::now();
    let transaction = PaymentTransaction {
        id: Uuid::new_v4(),
        order_id: payload.order_id.clone(),
        gateway_reference: request.reference.clone(),
        gateway_transaction_id: None,
        amount_minor: request.amount_minor,
        description: description.clone(),
        bank_code: payload.bank_code.clone(),
        card_type: None,
        pay_timestamp: None,
        response_code: None,
        status: TransactionStatus::Pending,
        user_id: payload.user_id.clone(),
        refunded: false,
        refunded_at: None,
        refund_reason: None,
        refund_amount_minor: None,
        expires_at: DateTime::from_chrono(request.expires_at),
        created_at: now,
        updated_at: now,
    };

    // The Pending row must exist before the redirect URL leaves this
    // process; a callback can never be allowed to race its own record.
    state.store.create(transaction).await.map_err(|e| {
        if matches!(e, StoreError::ReferenceCollision(_)) {
            tracing::error!(
                reference = %request.reference,
                "gateway reference collision; check randomness source"
            );
        }
        AppError::from(e)
    })?;

    metrics::record_transaction("pending");

    tracing::info!(
        reference = %request.reference,
        order_id = %payload.order_id,
        amount_minor = request.amount_minor,
        "payment request created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            reference: request.reference,
            redirect_url: request.redirect_url,
            amount,
            description,
        }),
    ))
}

/// Get a transaction by gateway reference.
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = state
        .store
        .find_by_reference(&reference)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

    Ok(Json(TransactionResponse::from(transaction)))
}

/// List the payment attempts recorded for an order.
pub async fn list_order_payments(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let transactions = state.store.find_by_order_id(&order_id).await?;
    Ok(Json(
        transactions
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
    ))
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}
