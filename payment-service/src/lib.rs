pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use commerce_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use tower_http::trace::TraceLayer;

use config::Config;
use services::callback::CallbackProcessor;
use services::gateway::GatewayClient;
use services::orders::{HttpOrderService, OrderService};
use services::repository::{MongoTransactionStore, TransactionStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn TransactionStore>,
    pub orders: Arc<dyn OrderService>,
    pub gateway: GatewayClient,
    pub callbacks: Arc<CallbackProcessor>,
}

pub struct Application {
    port: u16,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let mut client_options = ClientOptions::parse(config.database.url.expose_secret()).await?;
        client_options.app_name = Some("payment-service".to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&config.database.db_name);

        let store = MongoTransactionStore::new(&db);
        store.init_indexes().await?;
        let store: Arc<dyn TransactionStore> = Arc::new(store);

        let orders: Arc<dyn OrderService> =
            Arc::new(HttpOrderService::new(config.orders.base_url.clone()));
        let gateway = GatewayClient::new(config.gateway.clone());
        let callbacks = Arc::new(CallbackProcessor::new(
            gateway.clone(),
            store.clone(),
            orders.clone(),
        ));

        services::init_metrics();

        let state = AppState {
            config: config.clone(),
            store,
            orders,
            gateway,
            callbacks,
        };

        Ok(Self {
            port: config.server.port,
            router: Self::router(state),
        })
    }

    /// Build the HTTP router over an already assembled state.
    ///
    /// Split out so tests can mount the full surface on in-memory
    /// collaborators.
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics_endpoint))
            .route("/payments", post(handlers::payments::create_payment))
            .route(
                "/payments/return",
                get(handlers::callbacks::return_callback),
            )
            .route("/payments/ipn", get(handlers::callbacks::notify_callback))
            .route(
                "/payments/:reference",
                get(handlers::payments::get_transaction),
            )
            .route(
                "/payments/:reference/refund",
                post(handlers::refunds::refund_payment),
            )
            .route(
                "/orders/:order_id/payments",
                get(handlers::payments::list_order_payments),
            )
            .layer(from_fn(metrics_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(state)
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        tracing::info!("Listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
