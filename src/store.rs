use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::payment::Payment;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("payment store unavailable: {0}")]
    Unavailable(String),
}

/// Storage port for payments. Handlers only talk to this trait, so a
/// durable backend can replace [`InMemoryStore`] without touching
/// validation.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Payment>, StoreError>;

    /// All payments, newest `created_at` first. Payments sharing a
    /// timestamp come back in reverse insertion order.
    async fn list(&self) -> Result<Vec<Payment>, StoreError>;

    async fn put(&self, payment: Payment) -> Result<(), StoreError>;

    /// Removes everything and returns how many payments were dropped.
    async fn clear(&self) -> Result<usize, StoreError>;
}

struct Entry {
    seq: u64,
    payment: Payment,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    payments: HashMap<Uuid, Entry>,
}

/// Process-local store. Contents are lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.payments.get(&id).map(|entry| entry.payment.clone()))
    }

    async fn list(&self) -> Result<Vec<Payment>, StoreError> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&Entry> = inner.payments.values().collect();
        entries.sort_by(|a, b| {
            b.payment
                .created_at
                .cmp(&a.payment.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(entries.into_iter().map(|entry| entry.payment.clone()).collect())
    }

    async fn put(&self, payment: Payment) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.payments.insert(payment.id, Entry { seq, payment });
        Ok(())
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let removed = inner.payments.len();
        inner.payments.clear();
        Ok(removed)
    }
}
