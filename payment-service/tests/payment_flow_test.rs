mod common;

use common::{create_pending, harness, signed_callback};
use payment_service::models::TransactionStatus;
use payment_service::services::callback::CallbackOutcome;
use payment_service::services::gateway::params;
use payment_service::services::repository::{StoreError, TransactionStore};

#[tokio::test]
async fn pending_row_is_recorded_in_minor_units() {
    let h = harness();

    let request = create_pending(&h, "ORD-1", 100_000).await;

    assert_eq!(request.amount_minor, 10_000_000);

    let stored = h
        .store
        .find_by_reference(&request.reference)
        .await
        .unwrap()
        .expect("pending row missing");
    assert_eq!(stored.amount_minor, 10_000_000);
    assert_eq!(stored.status, TransactionStatus::Pending);
    assert_eq!(stored.order_id, "ORD-1");
}

#[tokio::test]
async fn success_callback_confirms_and_notifies_once() {
    let h = harness();
    let request = create_pending(&h, "ORD-1", 100_000).await;

    let cb = signed_callback(&request.reference, request.amount_minor, "00", "00");
    let tx = match h.processor.process(&cb).await {
        CallbackOutcome::Confirmed(tx) => tx,
        other => panic!("expected Confirmed, got {:?}", other),
    };
    assert_eq!(tx.status, TransactionStatus::Success);
    assert_eq!(tx.gateway_transaction_id.as_deref(), Some("GW12345678"));
    assert_eq!(tx.bank_code.as_deref(), Some("NCB"));
    assert_eq!(tx.pay_timestamp.as_deref(), Some("20250301142530"));

    assert_eq!(h.orders.paid_orders(), vec!["ORD-1".to_string()]);
}

#[tokio::test]
async fn duplicate_success_callback_is_idempotent() {
    let h = harness();
    let request = create_pending(&h, "ORD-1", 100_000).await;
    let cb = signed_callback(&request.reference, request.amount_minor, "00", "00");

    let first = h.processor.process(&cb).await;
    assert!(matches!(first, CallbackOutcome::Confirmed(_)));

    let second = h.processor.process(&cb).await;
    assert!(matches!(second, CallbackOutcome::AlreadyConfirmed(_)));

    // Exactly one paid notification despite two deliveries.
    assert_eq!(h.orders.paid_orders().len(), 1);
}

#[tokio::test]
async fn concurrent_deliveries_settle_exactly_once() {
    let h = harness();
    let request = create_pending(&h, "ORD-1", 100_000).await;
    let cb = signed_callback(&request.reference, request.amount_minor, "00", "00");

    let (a, b) = tokio::join!(h.processor.process(&cb), h.processor.process(&cb));

    let outcomes = [a, b];
    let confirmed = outcomes
        .iter()
        .filter(|o| matches!(o, CallbackOutcome::Confirmed(_)))
        .count();
    let replayed = outcomes
        .iter()
        .filter(|o| matches!(o, CallbackOutcome::AlreadyConfirmed(_)))
        .count();

    assert_eq!(confirmed, 1);
    assert_eq!(replayed, 1);
    assert_eq!(h.orders.paid_orders().len(), 1);
}

#[tokio::test]
async fn tampered_amount_with_consistent_signature_is_rejected() {
    let h = harness();
    let request = create_pending(&h, "ORD-1", 100_000).await;

    // Internally consistent: signed over the tampered amount, so the
    // signature itself verifies. Only the ledger comparison can catch it.
    let cb = signed_callback(&request.reference, request.amount_minor + 1, "00", "00");
    let outcome = h.processor.process(&cb).await;

    assert!(matches!(
        outcome,
        CallbackOutcome::AmountMismatch {
            expected: 10_000_000,
            ..
        }
    ));

    let stored = h
        .store
        .find_by_reference(&request.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
    assert!(h.orders.paid_orders().is_empty());
}

#[tokio::test]
async fn invalid_signature_leaves_ledger_untouched() {
    let h = harness();
    let request = create_pending(&h, "ORD-1", 100_000).await;

    let mut cb = signed_callback(&request.reference, request.amount_minor, "00", "00");
    cb.insert(params::RESULT_CODE.to_string(), "07".to_string());

    let outcome = h.processor.process(&cb).await;
    assert!(matches!(outcome, CallbackOutcome::SignatureInvalid));

    let stored = h
        .store
        .find_by_reference(&request.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
    assert!(h.orders.paid_orders().is_empty());
}

#[tokio::test]
async fn unknown_reference_is_acknowledged_without_mutation() {
    let h = harness();

    let cb = signed_callback("ORD-404-aB3xQ9Zp", 10_000_000, "00", "00");
    let outcome = h.processor.process(&cb).await;

    assert!(matches!(
        outcome,
        CallbackOutcome::UnknownTransaction { .. }
    ));
    assert!(h.orders.paid_orders().is_empty());
}

#[tokio::test]
async fn failure_callback_records_failed() {
    let h = harness();
    let request = create_pending(&h, "ORD-1", 100_000).await;

    let cb = signed_callback(&request.reference, request.amount_minor, "24", "02");
    let tx = match h.processor.process(&cb).await {
        CallbackOutcome::Declined(tx) => tx,
        other => panic!("expected Declined, got {:?}", other),
    };
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(tx.response_code.as_deref(), Some("24"));
    assert!(h.orders.paid_orders().is_empty());
}

#[tokio::test]
async fn success_after_failure_is_a_conflicting_duplicate() {
    let h = harness();
    let request = create_pending(&h, "ORD-1", 100_000).await;

    let declined = signed_callback(&request.reference, request.amount_minor, "24", "02");
    assert!(matches!(
        h.processor.process(&declined).await,
        CallbackOutcome::Declined(_)
    ));

    let confirmed = signed_callback(&request.reference, request.amount_minor, "00", "00");
    let tx = match h.processor.process(&confirmed).await {
        CallbackOutcome::ConflictingDuplicate(tx) => tx,
        other => panic!("expected ConflictingDuplicate, got {:?}", other),
    };
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert!(h.orders.paid_orders().is_empty());
}

#[tokio::test]
async fn late_success_on_a_refunded_row_is_a_conflicting_duplicate() {
    use payment_service::services::repository::TransitionFields;

    let h = harness();
    let request = create_pending(&h, "ORD-1", 100_000).await;

    let cb = signed_callback(&request.reference, request.amount_minor, "00", "00");
    assert!(matches!(
        h.processor.process(&cb).await,
        CallbackOutcome::Confirmed(_)
    ));

    h.store
        .transition(
            &request.reference,
            TransactionStatus::Success,
            TransactionStatus::Refunded,
            TransitionFields {
                refund_reason: Some("customer request".to_string()),
                refund_amount_minor: Some(request.amount_minor),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let tx = match h.processor.process(&cb).await {
        CallbackOutcome::ConflictingDuplicate(tx) => tx,
        other => panic!("expected ConflictingDuplicate, got {:?}", other),
    };
    assert_eq!(tx.status, TransactionStatus::Refunded);
    // Still only the original notification.
    assert_eq!(h.orders.paid_orders().len(), 1);
}

#[tokio::test]
async fn reference_collision_fails_loudly() {
    let h = harness();
    let request = create_pending(&h, "ORD-1", 100_000).await;

    let duplicate = common::pending_row("ORD-1", &request);
    let err = h.store.create(duplicate).await.unwrap_err();

    assert!(matches!(err, StoreError::ReferenceCollision(_)));
}

#[tokio::test]
async fn callback_amount_round_trips_to_major_units() {
    let h = harness();
    let amount_major = 100_000;
    let request = create_pending(&h, "ORD-1", amount_major).await;

    let cb = signed_callback(&request.reference, request.amount_minor, "00", "00");
    let CallbackOutcome::Confirmed(tx) = h.processor.process(&cb).await else {
        panic!("expected Confirmed");
    };

    assert_eq!(tx.amount_minor / 100, amount_major);
}

#[tokio::test]
async fn order_ids_containing_the_delimiter_notify_the_right_order() {
    let h = harness();
    let request = create_pending(&h, "ORD-2024-0042", 5_000).await;

    let cb = signed_callback(&request.reference, request.amount_minor, "00", "00");
    assert!(matches!(
        h.processor.process(&cb).await,
        CallbackOutcome::Confirmed(_)
    ));

    assert_eq!(h.orders.paid_orders(), vec!["ORD-2024-0042".to_string()]);
}
