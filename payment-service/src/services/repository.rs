//! Transaction ledger persistence.
//!
//! The ledger is the single source of truth for payment state. All
//! settlement coordination is expressed as a compare-and-set on one row
//! keyed by the gateway reference, which is what makes duplicate callback
//! delivery safe.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use commerce_core::error::AppError;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, DateTime};
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use thiserror::Error;

use crate::models::{PaymentTransaction, TransactionStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Creation-time uniqueness violation. Either the randomness source is
    /// broken or the same request was built twice; fatal, never retried.
    #[error("gateway reference collision: {0}")]
    ReferenceCollision(String),

    #[error("invalid status transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let integrity = matches!(
            err,
            StoreError::ReferenceCollision(_) | StoreError::InvalidTransition { .. }
        );
        if integrity {
            AppError::InternalError(anyhow::Error::new(err))
        } else {
            AppError::DatabaseError(anyhow::Error::new(err))
        }
    }
}

/// Fields applied alongside a status transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionFields {
    pub gateway_transaction_id: Option<String>,
    pub bank_code: Option<String>,
    pub card_type: Option<String>,
    pub pay_timestamp: Option<String>,
    pub response_code: Option<String>,
    pub refund_reason: Option<String>,
    pub refund_amount_minor: Option<i64>,
}

/// Result of a conditional transition.
#[derive(Debug)]
pub enum TransitionOutcome {
    /// The row matched the expected prior status and was updated.
    Applied(PaymentTransaction),
    /// The row exists but is no longer in the expected prior status;
    /// nothing was written.
    AlreadySettled(PaymentTransaction),
    NotFound,
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn create(&self, transaction: PaymentTransaction) -> Result<(), StoreError>;

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentTransaction>, StoreError>;

    async fn find_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Vec<PaymentTransaction>, StoreError>;

    /// Compare-and-set: apply `to` plus `fields` only if the stored status
    /// still equals `from` at the moment of write.
    async fn transition(
        &self,
        reference: &str,
        from: TransactionStatus,
        to: TransactionStatus,
        fields: TransitionFields,
    ) -> Result<TransitionOutcome, StoreError>;
}

#[derive(Clone)]
pub struct MongoTransactionStore {
    collection: Collection<PaymentTransaction>,
}

impl MongoTransactionStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("payment_transactions"),
        }
    }

    /// Unique index on the gateway reference plus a lookup index per order.
    ///
    /// Callback-path lookups must be O(1), and a colliding insert must
    /// fail loudly rather than overwrite the audit trail.
    pub async fn init_indexes(&self) -> Result<(), StoreError> {
        let reference_index = IndexModel::builder()
            .keys(doc! { "gateway_reference": 1 })
            .options(
                IndexOptions::builder()
                    .name("gateway_reference_unique_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let order_index = IndexModel::builder()
            .keys(doc! { "order_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("order_id_idx".to_string())
                    .build(),
            )
            .build();

        self.collection
            .create_indexes([reference_index, order_index], None)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        tracing::info!("payment ledger indexes initialized");
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_err)) => write_err.code == 11000,
        _ => false,
    }
}

#[async_trait]
impl TransactionStore for MongoTransactionStore {
    async fn create(&self, transaction: PaymentTransaction) -> Result<(), StoreError> {
        let reference = transaction.gateway_reference.clone();
        self.collection
            .insert_one(transaction, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::ReferenceCollision(reference.clone())
                } else {
                    StoreError::Backend(e.into())
                }
            })?;
        Ok(())
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentTransaction>, StoreError> {
        let filter = doc! { "gateway_reference": reference };
        self.collection
            .find_one(filter, None)
            .await
            .map_err(|e| StoreError::Backend(e.into()))
    }

    async fn find_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Vec<PaymentTransaction>, StoreError> {
        let filter = doc! { "order_id": order_id };
        let cursor = self
            .collection
            .find(filter, None)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| StoreError::Backend(e.into()))
    }

    async fn transition(
        &self,
        reference: &str,
        from: TransactionStatus,
        to: TransactionStatus,
        fields: TransitionFields,
    ) -> Result<TransitionOutcome, StoreError> {
        if !from.permits(to) {
            return Err(StoreError::InvalidTransition { from, to });
        }

        let to_bson =
            bson::to_bson(&to).map_err(|e| StoreError::Backend(e.into()))?;
        let from_bson =
            bson::to_bson(&from).map_err(|e| StoreError::Backend(e.into()))?;

        let mut set = doc! {
            "status": to_bson,
            "updated_at": DateTime::now(),
        };
        if let Some(v) = fields.gateway_transaction_id {
            set.insert("gateway_transaction_id", v);
        }
        if let Some(v) = fields.bank_code {
            set.insert("bank_code", v);
        }
        if let Some(v) = fields.card_type {
            set.insert("card_type", v);
        }
        if let Some(v) = fields.pay_timestamp {
            set.insert("pay_timestamp", v);
        }
        if let Some(v) = fields.response_code {
            set.insert("response_code", v);
        }
        if let Some(v) = fields.refund_reason {
            set.insert("refund_reason", v);
        }
        if let Some(v) = fields.refund_amount_minor {
            set.insert("refund_amount_minor", v);
        }
        if to == TransactionStatus::Refunded {
            set.insert("refunded", true);
            set.insert("refunded_at", DateTime::now());
        }

        // The filter on the prior status makes the write conditional: the
        // first delivery wins, every later one observes the settled row.
        let filter = doc! {
            "gateway_reference": reference,
            "status": from_bson,
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .collection
            .find_one_and_update(filter, doc! { "$set": set }, options)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        match updated {
            Some(tx) => Ok(TransitionOutcome::Applied(tx)),
            None => match self.find_by_reference(reference).await? {
                Some(existing) => Ok(TransitionOutcome::AlreadySettled(existing)),
                None => Ok(TransitionOutcome::NotFound),
            },
        }
    }
}

/// In-memory ledger for tests and local development.
///
/// A single mutex serializes writers, standing in for the database's
/// atomic conditional update.
#[derive(Default)]
pub struct MemoryTransactionStore {
    rows: Mutex<HashMap<String, PaymentTransaction>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, PaymentTransaction>>, StoreError> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("ledger lock poisoned")))
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn create(&self, transaction: PaymentTransaction) -> Result<(), StoreError> {
        let mut rows = self.lock()?;
        if rows.contains_key(&transaction.gateway_reference) {
            return Err(StoreError::ReferenceCollision(
                transaction.gateway_reference.clone(),
            ));
        }
        rows.insert(transaction.gateway_reference.clone(), transaction);
        Ok(())
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentTransaction>, StoreError> {
        Ok(self.lock()?.get(reference).cloned())
    }

    async fn find_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Vec<PaymentTransaction>, StoreError> {
        let rows = self.lock()?;
        let mut found: Vec<PaymentTransaction> = rows
            .values()
            .filter(|tx| tx.order_id == order_id)
            .cloned()
            .collect();
        found.sort_by_key(|tx| tx.created_at);
        Ok(found)
    }

    async fn transition(
        &self,
        reference: &str,
        from: TransactionStatus,
        to: TransactionStatus,
        fields: TransitionFields,
    ) -> Result<TransitionOutcome, StoreError> {
        if !from.permits(to) {
            return Err(StoreError::InvalidTransition { from, to });
        }

        let mut rows = self.lock()?;
        let Some(row) = rows.get_mut(reference) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if row.status != from {
            return Ok(TransitionOutcome::AlreadySettled(row.clone()));
        }

        row.status = to;
        row.updated_at = DateTime::now();
        if let Some(v) = fields.gateway_transaction_id {
            row.gateway_transaction_id = Some(v);
        }
        if let Some(v) = fields.bank_code {
            row.bank_code = Some(v);
        }
        if let Some(v) = fields.card_type {
            row.card_type = Some(v);
        }
        if let Some(v) = fields.pay_timestamp {
            row.pay_timestamp = Some(v);
        }
        if let Some(v) = fields.response_code {
            row.response_code = Some(v);
        }
        if let Some(v) = fields.refund_reason {
            row.refund_reason = Some(v);
        }
        if let Some(v) = fields.refund_amount_minor {
            row.refund_amount_minor = Some(v);
        }
        if to == TransactionStatus::Refunded {
            row.refunded = true;
            row.refunded_at = Some(DateTime::now());
        }

        Ok(TransitionOutcome::Applied(row.clone()))
    }
}
