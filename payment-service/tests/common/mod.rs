use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mongodb::bson::DateTime;
use secrecy::Secret;
use uuid::Uuid;

use payment_service::config::GatewayConfig;
use payment_service::models::{PaymentTransaction, TransactionStatus};
use payment_service::services::callback::CallbackProcessor;
use payment_service::services::encoding;
use payment_service::services::gateway::{params, GatewayClient, PaymentRequest};
use payment_service::services::orders::{OrderService, OrderSummary};
use payment_service::services::repository::{MemoryTransactionStore, TransactionStore};

pub const TEST_SECRET: &str = "test-gateway-secret";

pub fn test_gateway_config() -> GatewayConfig {
    GatewayConfig {
        merchant_code: "MERCH001".to_string(),
        secret: Secret::new(TEST_SECRET.to_string()),
        pay_endpoint: "https://sandbox.gateway.example/pay".to_string(),
        return_url: "https://shop.example/payments/return".to_string(),
        version: "2.1.0".to_string(),
        currency: "VND".to_string(),
        order_type: "ecommerce".to_string(),
        default_locale: "en".to_string(),
        expiry_minutes: 15,
    }
}

/// Order collaborator double that records paid notifications.
#[derive(Default)]
pub struct RecordingOrderService {
    paid: Mutex<Vec<String>>,
}

impl RecordingOrderService {
    pub fn paid_orders(&self) -> Vec<String> {
        self.paid.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderService for RecordingOrderService {
    async fn order_summary(
        &self,
        order_id: &str,
    ) -> Result<Option<OrderSummary>, anyhow::Error> {
        Ok(Some(OrderSummary {
            amount: 100_000,
            description: format!("Order {}", order_id),
        }))
    }

    async fn mark_order_paid(&self, order_id: &str) -> Result<(), anyhow::Error> {
        self.paid.lock().unwrap().push(order_id.to_string());
        Ok(())
    }
}

pub struct TestHarness {
    pub gateway: GatewayClient,
    pub store: Arc<MemoryTransactionStore>,
    pub orders: Arc<RecordingOrderService>,
    pub processor: CallbackProcessor,
}

pub fn harness() -> TestHarness {
    let gateway = GatewayClient::new(test_gateway_config());
    let store = Arc::new(MemoryTransactionStore::new());
    let orders = Arc::new(RecordingOrderService::default());
    let processor = CallbackProcessor::new(gateway.clone(), store.clone(), orders.clone());

    TestHarness {
        gateway,
        store,
        orders,
        processor,
    }
}

/// Build a payment request and persist its `Pending` ledger row.
pub async fn create_pending(
    h: &TestHarness,
    order_id: &str,
    amount_major: i64,
) -> PaymentRequest {
    let request = h
        .gateway
        .build_payment_request(
            order_id,
            amount_major,
            &format!("Order {}", order_id),
            None,
            None,
            "203.0.113.7",
        )
        .expect("failed to build payment request");

    h.store
        .create(pending_row(order_id, &request))
        .await
        .expect("failed to persist pending transaction");

    request
}

pub fn pending_row(order_id: &str, request: &PaymentRequest) -> PaymentTransaction {
    let now = DateTime::now();
    PaymentTransaction {
        id: Uuid::new_v4(),
        order_id: order_id.to_string(),
        gateway_reference: request.reference.clone(),
        gateway_transaction_id: None,
        amount_minor: request.amount_minor,
        description: request.description.clone(),
        bank_code: None,
        card_type: None,
        pay_timestamp: None,
        response_code: None,
        status: TransactionStatus::Pending,
        user_id: None,
        refunded: false,
        refunded_at: None,
        refund_reason: None,
        refund_amount_minor: None,
        expires_at: DateTime::from_chrono(request.expires_at),
        created_at: now,
        updated_at: now,
    }
}

/// A callback parameter set signed with the test secret.
pub fn signed_callback(
    reference: &str,
    amount_minor: i64,
    result_code: &str,
    status_code: &str,
) -> BTreeMap<String, String> {
    let mut p = BTreeMap::new();
    p.insert(params::REFERENCE.to_string(), reference.to_string());
    p.insert(params::AMOUNT.to_string(), amount_minor.to_string());
    p.insert(params::TRANSACTION_ID.to_string(), "GW12345678".to_string());
    p.insert(params::BANK_CODE.to_string(), "NCB".to_string());
    p.insert(params::CARD_TYPE.to_string(), "ATM".to_string());
    p.insert(params::PAY_TIME.to_string(), "20250301142530".to_string());
    p.insert(params::RESULT_CODE.to_string(), result_code.to_string());
    p.insert(params::STATUS_CODE.to_string(), status_code.to_string());

    let digest =
        commerce_core::utils::signature::sign(TEST_SECRET, &encoding::signing_payload(&p))
            .expect("failed to sign test callback");
    p.insert(params::SIGNATURE.to_string(), digest);
    p
}
