pub mod callback;
pub mod encoding;
pub mod gateway;
pub mod metrics;
pub mod orders;
pub mod repository;

pub use callback::CallbackProcessor;
pub use gateway::GatewayClient;
pub use metrics::{get_metrics, init_metrics};
pub use repository::{MemoryTransactionStore, MongoTransactionStore};
